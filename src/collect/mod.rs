//! Static collection of types defined in the target package.
//!
//! Before any module is transformed, every module in the package is
//! scanned for class definitions (including nested classes), explicit
//! type aliases and `from x import y` re-exports. The collected
//! (qualified name, import) pairs seed the name-resolution database.

use std::collections::BTreeMap;
use std::path::Path;

use tree_sitter::Node;

use crate::error::{Error, Result};
use crate::resolve::PyImport;

/// Collects known types from Python modules.
pub struct TypeCollector;

impl TypeCollector {
    /// Collects types declared in the module at `path`.
    pub fn collect_file(path: &Path, module_name: &str) -> Result<BTreeMap<String, PyImport>> {
        let source = std::fs::read_to_string(path)?;
        Self::collect(&source, module_name)
    }

    /// Collects types declared in `source`, a module named `module_name`.
    pub fn collect(source: &str, module_name: &str) -> Result<BTreeMap<String, PyImport>> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(tree_sitter_python::language())
            .map_err(|err| Error::parser_error(format!("failed to load language: {err}")))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| Error::parser_error("failed to parse source code"))?;

        let mut types = BTreeMap::new();
        let mut class_stack = Vec::new();
        collect_block(
            tree.root_node(),
            source.as_bytes(),
            module_name,
            &mut class_stack,
            &mut types,
        );
        Ok(types)
    }
}

fn collect_block(
    block: Node<'_>,
    source: &[u8],
    module_name: &str,
    class_stack: &mut Vec<String>,
    types: &mut BTreeMap<String, PyImport>,
) {
    let mut cursor = block.walk();
    for node in block.named_children(&mut cursor) {
        match node.kind() {
            "class_definition" => collect_class(node, source, module_name, class_stack, types),
            "decorated_definition" => {
                if let Some(definition) = node.child_by_field_name("definition") {
                    if definition.kind() == "class_definition" {
                        collect_class(definition, source, module_name, class_stack, types);
                    }
                }
            }
            "expression_statement" => {
                if class_stack.is_empty() {
                    if let Some(assignment) = named_child_of_kind(node, "assignment") {
                        collect_type_alias(assignment, source, module_name, types);
                    }
                }
            }
            "import_from_statement" => {
                if class_stack.is_empty() {
                    collect_from_import(node, source, types);
                }
            }
            _ => {}
        }
    }
}

fn collect_class(
    node: Node<'_>,
    source: &[u8],
    module_name: &str,
    class_stack: &mut Vec<String>,
    types: &mut BTreeMap<String, PyImport>,
) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    class_stack.push(name);

    // Nested classes are still imported via their top-level class.
    let top_level = class_stack[0].clone();
    let qualname = format!("{module_name}.{}", class_stack.join("."));
    types.insert(qualname, PyImport::from_import(module_name, top_level));

    if let Some(body) = node.child_by_field_name("body") {
        collect_block(body, source, module_name, class_stack, types);
    }
    class_stack.pop();
}

/// Records `name: TypeAlias = value` declarations as importable names.
fn collect_type_alias(
    assignment: Node<'_>,
    source: &[u8],
    module_name: &str,
    types: &mut BTreeMap<String, PyImport>,
) {
    let Some(annotation) = field_text(assignment, "type", source) else {
        return;
    };
    let annotation = annotation.trim().to_string();
    if annotation != "TypeAlias" && !annotation.ends_with(".TypeAlias") {
        return;
    }
    if assignment.child_by_field_name("right").is_none() {
        return;
    }
    let Some(left) = assignment.child_by_field_name("left") else {
        return;
    };
    if left.kind() != "identifier" {
        return;
    }
    if let Ok(name) = left.utf8_text(source) {
        types.insert(
            format!("{module_name}.{name}"),
            PyImport::from_import(module_name, name),
        );
    }
}

/// Records `from a.b import C` as the known type `a.b.C`.
fn collect_from_import(node: Node<'_>, source: &[u8], types: &mut BTreeMap<String, PyImport>) {
    let Some(module) = field_text(node, "module_name", source) else {
        return;
    };
    if module.starts_with('.') {
        // Relative imports can't be resolved without package context.
        return;
    }

    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        let imported = match child.kind() {
            "dotted_name" | "identifier" => child.utf8_text(source).ok().map(str::to_string),
            "aliased_import" => field_text(child, "name", source),
            _ => None,
        };
        if let Some(imported) = imported {
            types.insert(
                format!("{module}.{imported}"),
                PyImport::from_import(module.clone(), imported),
            );
        }
    }
}

fn named_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|n| n.kind() == kind);
    found
}

fn field_text(node: Node<'_>, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)?
        .utf8_text(source)
        .ok()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn classes() {
        let source = "
class TopLevelClass:
    class NestedClass:
        pass
";
        let types = TypeCollector::collect(source, "sub.module").unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(
            types["sub.module.TopLevelClass"],
            PyImport::from_import("sub.module", "TopLevelClass")
        );
        // The nested class is imported via the top-level class.
        assert_eq!(
            types["sub.module.TopLevelClass.NestedClass"],
            PyImport::from_import("sub.module", "TopLevelClass")
        );
    }

    #[test]
    fn type_alias() {
        let types =
            TypeCollector::collect("alias_name: TypeAlias = int", "sub.module").unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(
            types["sub.module.alias_name"],
            PyImport::from_import("sub.module", "alias_name")
        );
    }

    #[rstest]
    #[case("assign_name = 3")]
    #[case("assign_name: int")]
    #[case("assign_name: int = 3")]
    #[case("assign_name = int")]
    #[case("assign_name: TypeAlias")]
    fn ignores_plain_assigns(#[case] source: &str) {
        let types = TypeCollector::collect(source, "sub.module").unwrap();
        assert!(types.is_empty(), "{source:?} produced {types:?}");
    }

    #[test]
    fn from_imports() {
        let source = "
from calendar import gregorian
from calendar.gregorian import August as Aug, December
";
        let types = TypeCollector::collect(source, "sub.module").unwrap();
        assert_eq!(
            types["calendar.gregorian"],
            PyImport::from_import("calendar", "gregorian")
        );
        assert_eq!(
            types["calendar.gregorian.August"],
            PyImport::from_import("calendar.gregorian", "August")
        );
        assert_eq!(
            types["calendar.gregorian.December"],
            PyImport::from_import("calendar.gregorian", "December")
        );
        assert_eq!(types.len(), 3);
    }

    #[test]
    fn relative_imports_are_skipped() {
        let source = "
from . import January
from ..calendar import September
";
        let types = TypeCollector::collect(source, "sub.module").unwrap();
        assert!(types.is_empty());
    }

    #[test]
    fn functions_are_not_descended_into() {
        let source = "
def factory():
    class Hidden:
        pass
";
        let types = TypeCollector::collect(source, "sub.module").unwrap();
        assert!(types.is_empty());
    }
}
