//! Extraction of annotations from narrative docstrings.
//!
//! One scope's docstring is split into its numpydoc sections
//! (`Parameters`, `Other Parameters`, `Attributes`, `Returns`, `Yields`,
//! `Receives`), and every `name : doctype` field is translated through the
//! doctype grammar and the name resolver into a [`DocstringAnnotations`]
//! value. Errors stay scoped to the field they occur in; a broken doctype
//! never aborts the surrounding scope or module.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::doctype::{parse_doctype, TokenKind};
use crate::error::Result;
use crate::report::{Context, Stats};
use crate::resolve::{PyImport, TypeMatcher};
use crate::utils::{dedent, escape_qualname};

/// A stub-ready annotation with the imports it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub value: String,
    pub imports: BTreeSet<PyImport>,
}

impl Annotation {
    pub fn new(value: impl Into<String>, imports: BTreeSet<PyImport>) -> Self {
        Self {
            value: value.into(),
            imports,
        }
    }

    /// The generic incomplete-type placeholder.
    pub fn incomplete() -> Self {
        Self::new(
            "Incomplete",
            BTreeSet::from([PyImport::typeshed_incomplete()]),
        )
    }

    /// Concatenates annotations, wrapping in `tuple[...]` when there is
    /// more than one.
    pub fn many_as_tuple(annotations: Vec<Annotation>) -> Option<Annotation> {
        let mut annotations = annotations;
        match annotations.len() {
            0 => None,
            1 => annotations.pop(),
            _ => {
                let mut imports = BTreeSet::new();
                let values: Vec<String> = annotations
                    .into_iter()
                    .map(|mut a| {
                        imports.append(&mut a.imports);
                        a.value
                    })
                    .collect();
                Some(Self::new(format!("tuple[{}]", values.join(", ")), imports))
            }
        }
    }
}

impl std::fmt::Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A documented parameter: its annotation plus the deferred `optional`
/// marker from the doctype suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamAnnotation {
    pub annotation: Annotation,
    pub is_optional: bool,
}

/// All annotations extracted from one scope's docstring.
#[derive(Debug, Clone, Default)]
pub struct DocstringAnnotations {
    pub parameters: BTreeMap<String, ParamAnnotation>,
    pub attributes: BTreeMap<String, Annotation>,
    pub returns: Option<Annotation>,
}

impl DocstringAnnotations {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.attributes.is_empty() && self.returns.is_none()
    }
}

/// The result of converting one doctype string.
#[derive(Debug, Clone)]
pub struct ConvertedDoctype {
    pub annotation: Annotation,
    /// Unresolved names with their byte positions in the doctype.
    pub unknown_names: Vec<(String, usize, usize)>,
    pub is_optional: bool,
}

/// Translates doctype strings into annotations against a fixed matcher
/// and an optional textual replace-map.
#[derive(Debug)]
pub struct DoctypeConverter<'a> {
    matcher: &'a TypeMatcher,
    replacements: BTreeMap<String, String>,
}

impl<'a> DoctypeConverter<'a> {
    pub fn new(matcher: &'a TypeMatcher) -> Self {
        Self {
            matcher,
            replacements: BTreeMap::new(),
        }
    }

    /// Sets doctype substrings that are textually replaced before parsing.
    pub fn with_replacements(mut self, replacements: BTreeMap<String, String>) -> Self {
        self.replacements = replacements;
        self
    }

    /// Converts one doctype into an annotation with imports attached.
    ///
    /// Unknown names resolve to their escaped form aliased to the
    /// incomplete-type placeholder, so the stub stays valid.
    pub fn doctype_to_annotation(&self, doctype: &str) -> Result<ConvertedDoctype> {
        let mut doctype = doctype.to_string();
        for (needle, replacement) in &self.replacements {
            doctype = doctype.replace(needle, replacement);
        }

        let parsed = parse_doctype(&doctype)?;

        let mut value = String::new();
        let mut imports = BTreeSet::new();
        let mut unknown_names = Vec::new();
        for token in parsed.expression.tokens() {
            if token.kind != TokenKind::Name {
                value.push_str(&token.text);
                continue;
            }
            match self.matcher.query(&token.text) {
                Some((name, py_import)) => {
                    value.push_str(&name);
                    if py_import.has_import() {
                        imports.insert(py_import);
                    }
                }
                None => {
                    let escaped = escape_qualname(&token.text);
                    imports.insert(PyImport::typeshed_incomplete_as(&escaped));
                    value.push_str(&escaped);
                    let (start, end) = token.span.unwrap_or((0, 0));
                    unknown_names.push((token.text.clone(), start, end));
                }
            }
        }

        Ok(ConvertedDoctype {
            annotation: Annotation::new(value, imports),
            unknown_names,
            is_optional: parsed.is_optional,
        })
    }

    fn generator_import(&self) -> (String, PyImport) {
        self.matcher
            .query("Generator")
            .unwrap_or_else(|| {
                (
                    "Generator".to_string(),
                    PyImport::from_import("collections.abc", "Generator"),
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Parameters,
    OtherParameters,
    Attributes,
    Returns,
    Yields,
    Receives,
    Other,
}

impl Section {
    fn from_header(header: &str) -> Self {
        match header {
            "Parameters" => Self::Parameters,
            "Other Parameters" => Self::OtherParameters,
            "Attributes" => Self::Attributes,
            "Returns" => Self::Returns,
            "Yields" => Self::Yields,
            "Receives" => Self::Receives,
            _ => Self::Other,
        }
    }

    /// Whether fields in this section name parameters or attributes, as
    /// opposed to (possibly anonymous) returned values.
    fn is_named(self) -> bool {
        matches!(
            self,
            Self::Parameters | Self::OtherParameters | Self::Attributes
        )
    }
}

#[derive(Debug)]
struct Field {
    names: Vec<String>,
    doctype: Option<String>,
    /// 0-based line offset inside the docstring.
    line: usize,
}

/// Collects every annotation documented in one docstring.
///
/// Field-scoped problems (doctype syntax errors, reserved keywords,
/// unknown names) are logged with `ctx` and tallied in `stats`; a field
/// whose doctype is rejected is omitted, never fabricated.
pub fn collect_annotations(
    docstring: &str,
    converter: &DoctypeConverter<'_>,
    ctx: &Context,
    stats: &mut Stats,
) -> DocstringAnnotations {
    let mut out = DocstringAnnotations::default();
    let mut returns: Vec<Annotation> = Vec::new();
    let mut yields: Vec<Annotation> = Vec::new();
    let mut receives: Vec<Annotation> = Vec::new();

    for (section, fields) in split_sections(&dedent(docstring)) {
        if section == Section::Other {
            continue;
        }
        for field in fields {
            let field_ctx = ctx.with_line_offset(field.line);
            let converted = match &field.doctype {
                None => None,
                Some(doctype) => match converter.doctype_to_annotation(doctype) {
                    Ok(converted) => {
                        stats.matched += 1;
                        for (name, _, _) in &converted.unknown_names {
                            stats.record_unknown(name);
                            warn!("{field_ctx}: unknown type name {name:?}");
                        }
                        Some(converted)
                    }
                    Err(err) => {
                        stats.syntax_errors += 1;
                        log::error!("{field_ctx}: can't parse doctype {doctype:?}: {err}");
                        continue;
                    }
                },
            };

            match section {
                Section::Parameters | Section::OtherParameters => {
                    let (annotation, is_optional) = match &converted {
                        Some(c) => (c.annotation.clone(), c.is_optional),
                        None => (Annotation::incomplete(), false),
                    };
                    for name in &field.names {
                        if out.parameters.contains_key(name) {
                            warn!("{field_ctx}: duplicate parameter {name:?}, keeping first");
                            continue;
                        }
                        out.parameters.insert(
                            name.clone(),
                            ParamAnnotation {
                                annotation: annotation.clone(),
                                is_optional,
                            },
                        );
                    }
                }
                Section::Attributes => {
                    let annotation = match &converted {
                        Some(c) => c.annotation.clone(),
                        None => Annotation::incomplete(),
                    };
                    for name in &field.names {
                        if out.attributes.contains_key(name) {
                            warn!("{field_ctx}: duplicate attribute {name:?}, keeping first");
                            continue;
                        }
                        out.attributes.insert(name.clone(), annotation.clone());
                    }
                }
                Section::Returns | Section::Yields | Section::Receives => {
                    let Some(converted) = converted else { continue };
                    let target = match section {
                        Section::Returns => &mut returns,
                        Section::Yields => &mut yields,
                        _ => &mut receives,
                    };
                    target.push(converted.annotation);
                }
                Section::Other => {}
            }
        }
    }

    if !receives.is_empty() && yields.is_empty() {
        warn!("{ctx}: 'Receives' section without 'Yields' section");
    }

    out.returns = assemble_returns(converter, returns, yields, receives);
    out
}

/// Combines `Returns`/`Yields`/`Receives` into a single return annotation.
fn assemble_returns(
    converter: &DoctypeConverter<'_>,
    returns: Vec<Annotation>,
    yields: Vec<Annotation>,
    receives: Vec<Annotation>,
) -> Option<Annotation> {
    let returns = Annotation::many_as_tuple(returns);
    let yields = Annotation::many_as_tuple(yields);
    let receives = Annotation::many_as_tuple(receives);

    let Some(yields) = yields else {
        return returns;
    };

    let (name, py_import) = converter.generator_import();
    let mut imports = yields.imports.clone();
    imports.insert(py_import);

    let mut args = vec![yields.value];
    match (&receives, &returns) {
        (Some(receives), _) => args.push(receives.value.clone()),
        (None, Some(_)) => args.push("None".to_string()),
        (None, None) => {}
    }
    if let Some(returns) = &returns {
        args.push(returns.value.clone());
    }
    if let Some(receives) = receives {
        imports.extend(receives.imports);
    }
    if let Some(returns) = returns {
        imports.extend(returns.imports);
    }

    Some(Annotation::new(
        format!("{name}[{}]", args.join(", ")),
        imports,
    ))
}

/// Splits a dedented docstring into its sections and fields.
fn split_sections(docstring: &str) -> Vec<(Section, Vec<Field>)> {
    let lines: Vec<&str> = docstring.lines().collect();
    let mut sections = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !is_section_header(&lines, i) {
            i += 1;
            continue;
        }
        let section = Section::from_header(lines[i].trim());
        let mut fields = Vec::new();
        let mut j = i + 2;
        while j < lines.len() && !is_section_header(&lines, j) {
            let line = lines[j];
            if !line.trim().is_empty() && !line.starts_with(' ') {
                if let Some(field) = parse_field(line, j, section) {
                    fields.push(field);
                }
            }
            j += 1;
        }
        sections.push((section, fields));
        i = j;
    }

    sections
}

fn is_section_header(lines: &[&str], i: usize) -> bool {
    if lines[i].trim().is_empty() || lines[i].starts_with(' ') {
        return false;
    }
    match lines.get(i + 1) {
        Some(next) => {
            let underline = next.trim();
            !underline.is_empty() && underline.chars().all(|c| c == '-')
        }
        None => false,
    }
}

/// Parses one `name : doctype` field line.
fn parse_field(line: &str, line_index: usize, section: Section) -> Option<Field> {
    let line = line.trim_end();

    let (names_part, doctype) = if let Some((left, right)) = line.split_once(" : ") {
        (left.trim(), non_empty(right))
    } else if let Some(left) = line.strip_suffix(" :") {
        (left.trim(), None)
    } else if !section.is_named() {
        // Anonymous returned value, the whole line is the doctype.
        return Some(Field {
            names: Vec::new(),
            doctype: non_empty(line),
            line: line_index,
        });
    } else if let Some((left, right)) = line.split_once(':') {
        warn!("possibly missing whitespace before ':' in field {line:?}");
        (left.trim(), non_empty(right))
    } else {
        (line, None)
    };

    if names_part.is_empty() {
        return None;
    }
    let names = names_part
        .split(',')
        .map(|name| name.trim().trim_start_matches('*').to_string())
        .filter(|name| !name.is_empty())
        .collect();
    Some(Field {
        names,
        doctype,
        line: line_index,
    })
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
