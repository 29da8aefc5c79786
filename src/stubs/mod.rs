//! Transforming Python source modules into typed stub modules.
//!
//! The transformer walks the tree-sitter syntax tree of one module with an
//! explicit scope stack and emits stub text directly. Entering a class or
//! function parses its docstring into per-scope annotations; rewrite rules
//! replace bodies, defaults and values, filter decorators and accumulate
//! the imports the used annotations require. Any fault while rewriting a
//! single statement is caught at the statement boundary and the statement
//! passes through unchanged, so a module transformation always completes.

use std::collections::BTreeSet;
use std::mem;

use log::{error, warn};
use tree_sitter::Node;

use crate::docstrings::{
    collect_annotations, DocstringAnnotations, DoctypeConverter, ParamAnnotation,
};
use crate::error::{Error, Result};
use crate::report::{Context, Stats};
use crate::resolve::{PyImport, TypeMatcher};

/// Marker prepended to every generated stub; input files that already
/// carry it are passed through unchanged.
pub const STUB_HEADER_COMMENT: &str = "# File generated with stubcast";

/// Comments bracketing a region in which no rewrite rule applies.
const DIRECTIVE_OFF: &str = "stubcast: off";
const DIRECTIVE_ON: &str = "stubcast: on";

/// Decorators that survive into the stub.
const DECORATOR_ALLOWLIST: &[&str] = &[
    "abstractmethod",
    "classmethod",
    "coroutine",
    "dataclass",
    "property",
    "staticmethod",
];

/// The kind of a lexical scope on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Class,
    Func,
    Method,
    ClassMethod,
    StaticMethod,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    annotations: DocstringAnnotations,
    is_dataclass: bool,
    /// Names already declared in this scope's body.
    declared: BTreeSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            annotations: DocstringAnnotations::default(),
            is_dataclass: false,
            declared: BTreeSet::new(),
        }
    }

    fn has_self_or_cls(&self) -> bool {
        matches!(self.kind, ScopeKind::Method | ScopeKind::ClassMethod)
    }
}

/// Transforms Python source modules into stub text.
///
/// All per-call state is reset at the start of each
/// [`python_to_stub`](Self::python_to_stub) call, so one transformer value
/// is reusable across many sequential modules.
pub struct StubTransformer<'m> {
    matcher: &'m TypeMatcher,
    replacements: std::collections::BTreeMap<String, String>,
    stats: Stats,
    /// Test hook: force a node-rewrite fault for a function of this name.
    fail_function: Option<String>,
}

impl<'m> StubTransformer<'m> {
    pub fn new(matcher: &'m TypeMatcher) -> Self {
        Self {
            matcher,
            replacements: Default::default(),
            stats: Stats::default(),
            fail_function: None,
        }
    }

    /// Sets doctype substrings replaced before parsing.
    pub fn with_replacements(
        mut self,
        replacements: std::collections::BTreeMap<String, String>,
    ) -> Self {
        self.replacements = replacements;
        self
    }

    /// Converts Python source code into stub-file ready code.
    ///
    /// `ctx` carries the file path for log messages; `module_name` is the
    /// dotted module name used to elide self-imports.
    pub fn python_to_stub(
        &mut self,
        source: &str,
        ctx: &Context,
        module_name: Option<&str>,
    ) -> Result<String> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(tree_sitter_python::language())
            .map_err(|err| Error::parser_error(format!("failed to load language: {err}")))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| Error::parser_error("failed to parse source code"))?;
        if tree.root_node().has_error() {
            return Err(Error::parser_error(format!(
                "{ctx}: source is not parseable as Python"
            )));
        }

        let converter =
            DoctypeConverter::new(self.matcher).with_replacements(self.replacements.clone());
        let walk = Walk {
            bytes: source.as_bytes(),
            converter,
            ctx: ctx.clone(),
            module_name: module_name.map(str::to_string),
            scopes: Vec::new(),
            imports: BTreeSet::new(),
            stats: &mut self.stats,
            skip: Vec::new(),
            out: String::new(),
            fail_function: self.fail_function.clone(),
        };
        walk.run(tree.root_node())
    }

    /// Drains the statistics accumulated since the last call.
    pub fn collect_stats(&mut self) -> Stats {
        mem::take(&mut self.stats)
    }
}

/// Transient per-module walk state.
struct Walk<'a> {
    bytes: &'a [u8],
    converter: DoctypeConverter<'a>,
    ctx: Context,
    module_name: Option<String>,
    scopes: Vec<Scope>,
    imports: BTreeSet<PyImport>,
    stats: &'a mut Stats,
    /// Row ranges bracketed by off/on directives.
    skip: Vec<(usize, usize)>,
    out: String,
    fail_function: Option<String>,
}

impl<'a> Walk<'a> {
    fn run(mut self, root: Node<'_>) -> Result<String> {
        self.skip = collect_skip_regions(root, self.bytes);

        let mut scope = Scope::new(ScopeKind::Module);
        let docstring_stmt = self.parse_scope_docstring(root, &mut scope);
        self.scopes.push(scope);

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if Some(child.id()) == docstring_stmt {
                continue;
            }
            self.emit_statement(child, 0);
        }
        self.scopes.pop();

        // One import statement per distinct entry; self-imports elided.
        let module_name = self.module_name.as_deref();
        let mut lines: Vec<String> = self
            .imports
            .iter()
            .filter(|imp| imp.has_import())
            .filter(|imp| !(module_name.is_some() && imp.source_module() == module_name))
            .map(|imp| imp.to_string())
            .collect();
        lines.sort();
        lines.dedup();

        let mut stub = String::new();
        if !lines.is_empty() {
            stub.push_str(&lines.join("\n"));
            stub.push('\n');
            if !self.out.is_empty() {
                stub.push('\n');
            }
        }
        stub.push_str(&self.out);
        if !stub.is_empty() && !stub.ends_with('\n') {
            stub.push('\n');
        }
        Ok(stub)
    }

    // -- statement dispatch -----------------------------------------------

    /// Emits one statement with per-statement fault isolation: on any
    /// error the partial output is rolled back, the scope stack unwound
    /// and the statement passed through verbatim.
    fn emit_statement(&mut self, node: Node<'_>, indent: usize) {
        if self.in_skip_region(node) {
            self.push_verbatim(node, indent);
            return;
        }

        let checkpoint = self.out.len();
        let depth = self.scopes.len();
        if let Err(err) = self.try_emit_statement(node, indent) {
            let line = node.start_position().row + 1;
            error!(
                "{}: error while rewriting node, passing it through unchanged: {err}",
                self.ctx.with_line(line)
            );
            self.out.truncate(checkpoint);
            self.scopes.truncate(depth);
            self.push_verbatim(node, indent);
        }
    }

    fn try_emit_statement(&mut self, node: Node<'_>, indent: usize) -> Result<()> {
        match node.kind() {
            "comment" => {
                let text = self.text(node);
                let inner = text.trim_start_matches('#').trim_start();
                if inner.starts_with("type:") {
                    self.push_verbatim(node, indent);
                }
                Ok(())
            }
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                self.push_verbatim(node, indent);
                Ok(())
            }
            "expression_statement" => {
                if let Some(assignment) = named_child_of_kind(node, "assignment") {
                    self.emit_assignment(node, assignment, indent)
                } else {
                    // Docstrings, calls and other expressions are dropped.
                    Ok(())
                }
            }
            "function_definition" => self.emit_function(node, indent, &[]),
            "class_definition" => self.emit_class(node, indent, &[]),
            "decorated_definition" => {
                let mut cursor = node.walk();
                let decorators: Vec<Node<'_>> = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() == "decorator")
                    .collect();
                let definition = node
                    .child_by_field_name("definition")
                    .ok_or_else(|| Error::parser_error("decorated definition without definition"))?;
                match definition.kind() {
                    "class_definition" => self.emit_class(definition, indent, &decorators),
                    _ => self.emit_function(definition, indent, &decorators),
                }
            }
            "pass_statement" => Ok(()),
            _ => {
                // Unknown constructs pass through untouched.
                self.push_verbatim(node, indent);
                Ok(())
            }
        }
    }

    // -- functions --------------------------------------------------------

    fn emit_function(
        &mut self,
        node: Node<'_>,
        indent: usize,
        decorators: &[Node<'_>],
    ) -> Result<()> {
        let name = self.field_text(node, "name")?;
        if self.fail_function.as_deref() == Some(name.as_str()) {
            return Err(Error::Other(format!("forced fault in {name}")));
        }

        let decorator_exprs: Vec<String> = decorators
            .iter()
            .map(|d| self.text(*d).trim_start_matches('@').trim().to_string())
            .collect();
        let kind = self.function_kind(&decorator_exprs);

        let mut scope = Scope::new(kind);
        if let Some(body) = node.child_by_field_name("body") {
            self.parse_scope_docstring(body, &mut scope);
        }
        if name == "__init__" && scope.annotations.parameters.is_empty() {
            self.apply_constructor_fallback(&mut scope);
        }
        self.scopes.push(scope);

        let result = self.emit_function_inner(node, indent, &name, &decorator_exprs);
        self.scopes.pop();

        if let Some(parent) = self.scopes.last_mut() {
            parent.declared.insert(name);
        }
        result
    }

    fn emit_function_inner(
        &mut self,
        node: Node<'_>,
        indent: usize,
        name: &str,
        decorator_exprs: &[String],
    ) -> Result<()> {
        for expr in decorator_exprs {
            if keep_decorator(expr) {
                self.push_line(indent, &format!("@{expr}"));
            }
        }

        let params = self.format_params(node)?;
        let returns = self.format_return(node);
        let is_async = node
            .child(0)
            .map(|c| c.kind() == "async")
            .unwrap_or(false);
        let prefix = if is_async { "async def" } else { "def" };
        self.push_line(
            indent,
            &format!("{prefix} {name}({params}) -> {returns}: ..."),
        );
        Ok(())
    }

    /// A constructor without its own parameter documentation falls back
    /// to the enclosing class's documented parameters and attributes.
    fn apply_constructor_fallback(&self, scope: &mut Scope) {
        let Some(class_scope) = self.scopes.last() else {
            return;
        };
        if class_scope.kind != ScopeKind::Class {
            return;
        }
        scope.annotations.parameters = class_scope.annotations.parameters.clone();
        for (name, annotation) in &class_scope.annotations.attributes {
            scope
                .annotations
                .parameters
                .entry(name.clone())
                .or_insert_with(|| ParamAnnotation {
                    annotation: annotation.clone(),
                    is_optional: false,
                });
        }
    }

    fn function_kind(&self, decorator_exprs: &[String]) -> ScopeKind {
        let in_class = self
            .scopes
            .last()
            .is_some_and(|scope| scope.kind == ScopeKind::Class);
        if !in_class {
            return ScopeKind::Func;
        }
        for expr in decorator_exprs {
            match decorator_name(expr) {
                "classmethod" => return ScopeKind::ClassMethod,
                "staticmethod" => return ScopeKind::StaticMethod,
                _ => {}
            }
        }
        ScopeKind::Method
    }

    fn format_params(&mut self, node: Node<'_>) -> Result<String> {
        let params_node = node
            .child_by_field_name("parameters")
            .ok_or_else(|| Error::parser_error("function without parameter list"))?;
        let line = params_node.start_position().row + 1;

        let (documented, has_self_or_cls) = match self.scopes.last() {
            Some(scope) => (scope.annotations.parameters.clone(), scope.has_self_or_cls()),
            None => (Default::default(), false),
        };

        let mut parts = Vec::new();
        let mut index = 0usize;
        let mut cursor = params_node.walk();
        for child in params_node.named_children(&mut cursor) {
            let (name, inline, default) = match child.kind() {
                "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                    (self.text(child).to_string(), None, None)
                }
                "typed_parameter" => {
                    let mut inner = child.walk();
                    let pattern = child
                        .named_children(&mut inner)
                        .find(|n| n.kind() != "type")
                        .ok_or_else(|| Error::parser_error("typed parameter without name"))?;
                    (
                        self.text(pattern).to_string(),
                        self.field_text(child, "type").ok(),
                        None,
                    )
                }
                "default_parameter" => (
                    self.field_text(child, "name")?,
                    None,
                    self.field_text(child, "value").ok(),
                ),
                "typed_default_parameter" => (
                    self.field_text(child, "name")?,
                    self.field_text(child, "type").ok(),
                    self.field_text(child, "value").ok(),
                ),
                _ => {
                    // Bare `*` and `/` separators.
                    parts.push(self.text(child).to_string());
                    continue;
                }
            };

            let is_self_or_cls = index == 0 && has_self_or_cls;
            parts.push(self.format_param(
                &name,
                inline,
                default,
                is_self_or_cls,
                &documented,
                line,
            ));
            index += 1;
        }
        Ok(parts.join(", "))
    }

    fn format_param(
        &mut self,
        name: &str,
        inline: Option<String>,
        default: Option<String>,
        is_self_or_cls: bool,
        documented: &std::collections::BTreeMap<String, ParamAnnotation>,
        line: usize,
    ) -> String {
        let lookup = name.trim_start_matches('*');

        let mut annotation: Option<String> = None;
        if let Some(param) = documented.get(lookup) {
            let mut value = param.annotation.value.clone();
            // `optional` only unions with `None` when the real default is
            // literally `None`.
            if param.is_optional && default.as_deref() == Some("None") && !union_has_none(&value) {
                value.push_str(" | None");
            }
            if let Some(inline) = &inline {
                if inline.trim() != value {
                    warn!(
                        "{}: documented type {value:?} for parameter {lookup:?} \
                         overrides existing annotation {:?}",
                        self.ctx.with_line(line),
                        inline.trim(),
                    );
                }
            }
            self.imports.extend(param.annotation.imports.iter().cloned());
            annotation = Some(value);
        } else if let Some(inline) = &inline {
            annotation = Some(inline.trim().to_string());
        } else if !is_self_or_cls {
            self.imports.insert(PyImport::typeshed_incomplete());
            annotation = Some("Incomplete".to_string());
        }

        let mut out = name.to_string();
        if let Some(annotation) = &annotation {
            out.push_str(": ");
            out.push_str(annotation);
        }
        // Default values are never reproduced.
        if default.is_some() {
            out.push_str(if annotation.is_some() { " = ..." } else { "=..." });
        }
        out
    }

    fn format_return(&mut self, node: Node<'_>) -> String {
        let inline = self.field_text(node, "return_type").ok();
        let documented = self
            .scopes
            .last()
            .and_then(|scope| scope.annotations.returns.clone());
        match documented {
            Some(annotation) => {
                if let Some(inline) = &inline {
                    if inline.trim() != annotation.value {
                        warn!(
                            "{}: documented return type {:?} overrides existing annotation {:?}",
                            self.ctx.with_line(node.start_position().row + 1),
                            annotation.value,
                            inline.trim(),
                        );
                    }
                }
                self.imports.extend(annotation.imports.iter().cloned());
                annotation.value
            }
            None => inline
                .map(|text| text.trim().to_string())
                .unwrap_or_else(|| "None".to_string()),
        }
    }

    // -- classes ----------------------------------------------------------

    fn emit_class(&mut self, node: Node<'_>, indent: usize, decorators: &[Node<'_>]) -> Result<()> {
        let name = self.field_text(node, "name")?;
        let decorator_exprs: Vec<String> = decorators
            .iter()
            .map(|d| self.text(*d).trim_start_matches('@').trim().to_string())
            .collect();
        let bases = self
            .field_text(node, "superclasses")
            .unwrap_or_default();

        if let Some(parent) = self.scopes.last_mut() {
            parent.declared.insert(name.clone());
        }

        let mut scope = Scope::new(ScopeKind::Class);
        scope.is_dataclass = decorator_exprs
            .iter()
            .any(|expr| decorator_name(expr) == "dataclass");
        let body = node.child_by_field_name("body");
        let docstring_stmt = match body {
            Some(body) => self.parse_scope_docstring(body, &mut scope),
            None => None,
        };
        self.scopes.push(scope);

        // The body is emitted into its own buffer so an empty class can
        // collapse to `...`.
        let saved = mem::take(&mut self.out);
        if let Some(body) = body {
            let mut cursor = body.walk();
            for child in body.named_children(&mut cursor) {
                if Some(child.id()) == docstring_stmt {
                    continue;
                }
                self.emit_statement(child, indent + 1);
            }
        }

        // Documented attributes that never appeared as fields are added
        // on the way out.
        let scope = match self.scopes.pop() {
            Some(scope) => scope,
            None => Scope::new(ScopeKind::Class),
        };
        for (attr_name, annotation) in &scope.annotations.attributes {
            if scope.declared.contains(attr_name) {
                continue;
            }
            self.imports.extend(annotation.imports.iter().cloned());
            self.push_line(indent + 1, &format!("{attr_name}: {}", annotation.value));
        }
        let body_out = mem::replace(&mut self.out, saved);

        for expr in &decorator_exprs {
            if keep_decorator(expr) {
                self.push_line(indent, &format!("@{expr}"));
            }
        }
        if body_out.trim().is_empty() {
            self.push_line(indent, &format!("class {name}{bases}: ..."));
        } else {
            self.push_line(indent, &format!("class {name}{bases}:"));
            self.out.push_str(&body_out);
        }
        Ok(())
    }

    // -- assignments ------------------------------------------------------

    fn emit_assignment(
        &mut self,
        statement: Node<'_>,
        assignment: Node<'_>,
        indent: usize,
    ) -> Result<()> {
        let left = assignment
            .child_by_field_name("left")
            .ok_or_else(|| Error::parser_error("assignment without target"))?;
        let left_text = self.text(left).to_string();

        // The public export list keeps its value, always.
        if left_text == "__all__" {
            self.declare(&left_text);
            self.push_verbatim(statement, indent);
            return Ok(());
        }

        if let Some(type_node) = assignment.child_by_field_name("type") {
            return self.emit_annotated_assignment(statement, assignment, type_node, indent);
        }

        // Plain assignment: one annotated statement per target.
        let mut targets = Vec::new();
        if !collect_targets(left, &mut targets) {
            self.push_verbatim(statement, indent);
            return Ok(());
        }
        let mut right = assignment.child_by_field_name("right");
        while let Some(value) = right {
            if value.kind() != "assignment" {
                break;
            }
            if let Some(chained) = value.child_by_field_name("left") {
                if !collect_targets(chained, &mut targets) {
                    self.push_verbatim(statement, indent);
                    return Ok(());
                }
            }
            right = value.child_by_field_name("right");
        }

        for target in targets {
            let name = self.text(target).to_string();
            let annotation = self.attribute_annotation(&name);
            self.declare(&name);
            self.push_line(indent, &format!("{name}: {annotation}"));
        }
        Ok(())
    }

    fn emit_annotated_assignment(
        &mut self,
        statement: Node<'_>,
        assignment: Node<'_>,
        type_node: Node<'_>,
        indent: usize,
    ) -> Result<()> {
        let left = assignment
            .child_by_field_name("left")
            .ok_or_else(|| Error::parser_error("assignment without target"))?;
        let name = self.text(left).to_string();
        let annotation_text = self.text(type_node).trim().to_string();
        self.declare(&name);

        // Type aliases keep their value.
        if annotation_text == "TypeAlias" || annotation_text.ends_with(".TypeAlias") {
            self.push_verbatim(statement, indent);
            return Ok(());
        }

        let documented = self
            .scopes
            .last()
            .and_then(|scope| scope.annotations.attributes.get(&name).cloned());
        let annotation = match documented {
            Some(doc) if doc.value != annotation_text => {
                warn!(
                    "{}: documented type {:?} for {name:?} overrides existing annotation {:?}",
                    self.ctx.with_line(statement.start_position().row + 1),
                    doc.value,
                    annotation_text,
                );
                self.imports.extend(doc.imports.iter().cloned());
                doc.value
            }
            _ => annotation_text,
        };

        let is_dataclass_field = self
            .scopes
            .last()
            .is_some_and(|scope| scope.kind == ScopeKind::Class && scope.is_dataclass);
        if is_dataclass_field && assignment.child_by_field_name("right").is_some() {
            // Keeping a placeholder value preserves field-ness.
            self.push_line(indent, &format!("{name}: {annotation} = ..."));
        } else {
            self.push_line(indent, &format!("{name}: {annotation}"));
        }
        Ok(())
    }

    fn attribute_annotation(&mut self, name: &str) -> String {
        let documented = self
            .scopes
            .last()
            .and_then(|scope| scope.annotations.attributes.get(name).cloned());
        match documented {
            Some(annotation) => {
                self.imports.extend(annotation.imports.iter().cloned());
                annotation.value
            }
            None => {
                self.imports.insert(PyImport::typeshed_incomplete());
                "Incomplete".to_string()
            }
        }
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.declared.insert(name.to_string());
        }
    }

    // -- docstrings -------------------------------------------------------

    /// Parses the docstring at the start of `body` into `scope` and
    /// returns the id of the docstring statement so it can be skipped.
    fn parse_scope_docstring(&mut self, body: Node<'_>, scope: &mut Scope) -> Option<usize> {
        let (statement, string_node) = docstring_of(body)?;
        let raw = self.text(string_node);
        let docstring = string_inner(raw);
        let ctx = self
            .ctx
            .with_line(string_node.start_position().row + 1);
        scope.annotations = collect_annotations(docstring, &self.converter, &ctx, self.stats);
        Some(statement.id())
    }

    // -- low level emission -----------------------------------------------

    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.bytes).unwrap_or("")
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Result<String> {
        let child = node
            .child_by_field_name(field)
            .ok_or_else(|| Error::parser_error(format!("missing {field:?} field")))?;
        Ok(self.text(child).to_string())
    }

    fn push_line(&mut self, indent: usize, line: &str) {
        for _ in 0..indent {
            self.out.push_str("    ");
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    /// Emits a node's source text unchanged, re-anchored to the stub's
    /// indentation.
    fn push_verbatim(&mut self, node: Node<'_>, indent: usize) {
        let column = node.start_position().column;
        let text = self.text(node);
        for (i, line) in text.lines().enumerate() {
            if i == 0 {
                self.push_line(indent, line);
            } else {
                let stripped = strip_leading_spaces(line, column);
                self.push_line(indent, stripped);
            }
        }
    }

    fn in_skip_region(&self, node: Node<'_>) -> bool {
        let row = node.start_position().row;
        self.skip.iter().any(|(off, on)| row > *off && row < *on)
    }
}

// -- helpers ---------------------------------------------------------------

/// Locates `# stubcast: off` / `# stubcast: on` comment pairs, in document
/// order, as row ranges. An unclosed `off` extends to the end of the file.
fn collect_skip_regions(root: Node<'_>, source: &[u8]) -> Vec<(usize, usize)> {
    let mut regions = Vec::new();
    let mut open: Option<usize> = None;
    collect_directives(root, source, &mut open, &mut regions);
    if let Some(off) = open {
        regions.push((off, usize::MAX));
    }
    regions
}

fn collect_directives(
    node: Node<'_>,
    source: &[u8],
    open: &mut Option<usize>,
    regions: &mut Vec<(usize, usize)>,
) {
    if node.kind() == "comment" {
        let text = node.utf8_text(source).unwrap_or("");
        let inner = text.trim_start_matches('#').trim();
        if inner == DIRECTIVE_OFF && open.is_none() {
            *open = Some(node.start_position().row);
        } else if inner == DIRECTIVE_ON {
            if let Some(off) = open.take() {
                regions.push((off, node.start_position().row));
            }
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_directives(child, source, open, regions);
    }
}

/// The first statement of a block if it is a docstring, together with its
/// string node.
fn docstring_of(body: Node<'_>) -> Option<(Node<'_>, Node<'_>)> {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let mut inner = first.walk();
    let string = first.named_children(&mut inner).next()?;
    (string.kind() == "string").then_some((first, string))
}

/// Strips string prefixes and quotes from a string literal's source text.
fn string_inner(raw: &str) -> &str {
    let text = raw.trim_start_matches(|c| "rRbBuUfF".contains(c));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if text.len() >= 2 * quote.len() && text.starts_with(quote) && text.ends_with(quote) {
            return &text[quote.len()..text.len() - quote.len()];
        }
    }
    text
}

/// Collects identifier targets of a (possibly unpacking) assignment.
/// Returns `false` when a target is not a plain identifier.
fn collect_targets<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) -> bool {
    match node.kind() {
        "identifier" => {
            out.push(node);
            true
        }
        "pattern_list" | "tuple_pattern" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() != "identifier" {
                    return false;
                }
                out.push(child);
            }
            true
        }
        _ => false,
    }
}

fn named_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|n| n.kind() == kind);
    found
}

/// The last dotted segment of a decorator expression's callee.
fn decorator_name(expr: &str) -> &str {
    let callee = expr.split('(').next().unwrap_or(expr).trim();
    callee.rsplit('.').next().unwrap_or(callee)
}

fn keep_decorator(expr: &str) -> bool {
    let callee = expr.split('(').next().unwrap_or(expr).trim();
    if callee.ends_with(".setter") {
        return true;
    }
    DECORATOR_ALLOWLIST.contains(&decorator_name(expr))
}

fn union_has_none(value: &str) -> bool {
    value == "None" || value.split(" | ").any(|part| part == "None")
}

fn strip_leading_spaces(line: &str, up_to: usize) -> &str {
    let strippable = line
        .bytes()
        .take(up_to)
        .take_while(|b| *b == b' ')
        .count();
    &line[strippable..]
}
