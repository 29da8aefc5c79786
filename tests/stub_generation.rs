//! End-to-end tests driving source modules through the full pipeline.

use pretty_assertions::assert_eq;
use rstest::rstest;

use stubcast::docstrings::DoctypeConverter;
use stubcast::report::Context;
use stubcast::resolve::{PyImport, TypeMatcher};
use stubcast::stubs::StubTransformer;

fn stub(source: &str) -> String {
    let matcher = TypeMatcher::new();
    let mut transformer = StubTransformer::new(&matcher);
    transformer
        .python_to_stub(source, &Context::new(), None)
        .unwrap()
}

#[rstest]
#[case("list[float]", "list[float]")]
#[case("int | None", "int | None")]
#[case("list of int", "list[int]")]
#[case("list of int(s)", "list[int]")]
#[case("tuple of (float, ...)", "tuple[float, ...]")]
#[case("dict of {str: int}", "dict[str, int]")]
#[case("int or float", "int | float")]
fn canonical_syntax_is_a_fixed_point(#[case] doctype: &str, #[case] expected: &str) {
    let matcher = TypeMatcher::new();
    let converter = DoctypeConverter::new(&matcher);
    let converted = converter.doctype_to_annotation(doctype).unwrap();
    assert_eq!(converted.annotation.value, expected);
}

#[test]
fn module_stub_with_import_preamble() {
    let source = r#""""Module docs.

Attributes
----------
count : int
"""

import os

__all__ = ["f"]

count = 0


def f(a, b=None):
    """Do things.

    Parameters
    ----------
    a : Sequence[int]
    b : str, optional

    Returns
    -------
    out : list of str
    """
    return []
"#;
    let expected = "from collections.abc import Sequence\n\n\
                    import os\n\
                    __all__ = [\"f\"]\n\
                    count: int\n\
                    def f(a: Sequence[int], b: str | None = ...) -> list[str]: ...\n";
    assert_eq!(stub(source), expected);
}

#[test]
fn class_attributes_and_constructor_fallback() {
    let source = r#"
class ExampleClass:
    """Dummy.

    Parameters
    ----------
    a1 : str
    a2 : float, optional

    Attributes
    ----------
    b1 : Sized
    """

    b1: int

    def __init__(self, a1, a2=None):
        pass

    @staticmethod
    def some_staticmethod(a1, a2="uno"):
        """Dummy.

        Parameters
        ----------
        a1 : float
        a2 : str, optional
        """
"#;
    let result = stub(source);
    // The documented attribute type replaces the inline annotation.
    assert!(result.contains("b1: Sized"), "{result}");
    assert!(result.contains("from collections.abc import Sized"), "{result}");
    // The undocumented constructor falls back to the class docstring;
    // `optional` only unions None because the default is None.
    assert!(
        result.contains("def __init__(self, a1: str, a2: float | None = ...) -> None: ..."),
        "{result}"
    );
    // A non-None default never gains `| None`.
    assert!(
        result.contains("def some_staticmethod(a1: float, a2: str = ...) -> None: ..."),
        "{result}"
    );
    assert!(result.contains("@staticmethod"), "{result}");
    // The docstring itself is gone.
    assert!(!result.contains("Dummy."), "{result}");
}

#[test]
fn documented_attribute_is_appended_when_missing() {
    let source = r#"
class Holder:
    """Holds things.

    Attributes
    ----------
    items : list of str
    """

    def clear(self):
        pass
"#;
    let result = stub(source);
    assert!(result.contains("items: list[str]"), "{result}");
}

#[test]
fn dataclass_fields_keep_a_placeholder_value() {
    let source = r#"
from dataclasses import dataclass


@dataclass
class Config:
    retries: int = 3
    name: str = "x"
    frozen_default: bool
"#;
    let result = stub(source);
    assert!(result.contains("from dataclasses import dataclass"), "{result}");
    assert!(result.contains("@dataclass"), "{result}");
    assert!(result.contains("retries: int = ..."), "{result}");
    assert!(result.contains("name: str = ..."), "{result}");
    assert!(result.contains("frozen_default: bool\n"), "{result}");
    assert!(!result.contains("= 3"), "{result}");
}

#[test]
fn unpacking_targets_resolve_independently() {
    let source = r#""""Module.

Attributes
----------
a : int
"""

a, b = 1, 2
"#;
    let result = stub(source);
    assert!(result.contains("a: int"), "{result}");
    assert!(result.contains("b: Incomplete"), "{result}");
    assert!(result.contains("from _typeshed import Incomplete"), "{result}");
}

#[test]
fn type_alias_keeps_its_value() {
    let source = "from typing import TypeAlias\n\nPathLike: TypeAlias = str\n";
    let result = stub(source);
    assert!(result.contains("PathLike: TypeAlias = str"), "{result}");
}

#[test]
fn yields_produce_a_generator_return() {
    let source = r#"
def gen():
    """Yield numbers.

    Yields
    ------
    x : int
    """
"#;
    let result = stub(source);
    assert!(result.contains("def gen() -> Generator[int]: ..."), "{result}");
    assert!(
        result.contains("from collections.abc import Generator"),
        "{result}"
    );
}

#[test]
fn self_imports_are_elided() {
    let mut matcher = TypeMatcher::new();
    matcher.add_types([(
        "pkg.mod.Thing".to_string(),
        PyImport::from_import("pkg.mod", "Thing"),
    )]);
    let mut transformer = StubTransformer::new(&matcher);

    let source = r#"
def f(a):
    """
    Parameters
    ----------
    a : pkg.mod.Thing
    """
"#;
    let result = transformer
        .python_to_stub(source, &Context::new(), Some("pkg.mod"))
        .unwrap();
    assert!(result.contains("def f(a: Thing) -> None: ..."), "{result}");
    assert!(!result.contains("from pkg.mod import Thing"), "{result}");

    // The same annotation from another module keeps its import.
    let result = transformer
        .python_to_stub(source, &Context::new(), Some("pkg.other"))
        .unwrap();
    assert!(result.contains("from pkg.mod import Thing"), "{result}");
}

#[test]
fn abbreviated_names_resolve_against_declared_entries() {
    let mut matcher = TypeMatcher::new();
    matcher.add_types([(
        "foo.bar.Baz".to_string(),
        PyImport::from_import("foo.bar", "Baz"),
    )]);
    let mut transformer = StubTransformer::new(&matcher);

    let source = r#"
def f(a, b):
    """
    Parameters
    ----------
    a : ~.Baz
    b : ~.Gul
    """
"#;
    let result = transformer
        .python_to_stub(source, &Context::new(), None)
        .unwrap();
    assert!(result.contains("a: Baz"), "{result}");
    assert!(result.contains("from foo.bar import Baz"), "{result}");
    // Undeclared nested members never match abbreviated queries; the
    // unknown name falls back to an escaped placeholder alias.
    assert!(result.contains("b: _Gul"), "{result}");
    assert!(
        result.contains("from _typeshed import Incomplete as _Gul"),
        "{result}"
    );
}

#[test]
fn doctype_syntax_error_never_fabricates_an_annotation() {
    let source = r#"
def f(a, b):
    """
    Parameters
    ----------
    a : (, )
    b : int
    """
"#;
    let matcher = TypeMatcher::new();
    let mut transformer = StubTransformer::new(&matcher);
    let result = transformer
        .python_to_stub(source, &Context::new(), None)
        .unwrap();
    // The broken field falls back to the placeholder, the sibling field
    // is unaffected.
    assert!(result.contains("a: Incomplete"), "{result}");
    assert!(result.contains("b: int"), "{result}");
    let stats = transformer.collect_stats();
    assert_eq!(stats.syntax_errors, 1);
    assert_eq!(stats.matched, 1);
}

#[test]
fn unknown_names_are_tallied() {
    let source = r#"
def f(a, b):
    """
    Parameters
    ----------
    a : made_up
    b : made_up
    """
"#;
    let matcher = TypeMatcher::new();
    let mut transformer = StubTransformer::new(&matcher);
    transformer
        .python_to_stub(source, &Context::new(), None)
        .unwrap();
    let stats = transformer.collect_stats();
    assert_eq!(stats.unknown_names["made_up"], 2);
}

#[test]
fn transformer_is_reusable_across_modules() {
    let matcher = TypeMatcher::new();
    let mut transformer = StubTransformer::new(&matcher);
    let first = transformer
        .python_to_stub("def f(a): pass\n", &Context::new(), None)
        .unwrap();
    let second = transformer
        .python_to_stub("def f(a): pass\n", &Context::new(), None)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn property_and_setter_survive() {
    let source = r#"
class A:
    @property
    def value(self):
        """
        Returns
        -------
        out : str
        """
        return self._value

    @value.setter
    def value(self, value):
        """
        Parameters
        ----------
        value : str
        """
"#;
    let result = stub(source);
    assert!(result.contains("@property"), "{result}");
    assert!(result.contains("def value(self) -> str: ..."), "{result}");
    assert!(result.contains("@value.setter"), "{result}");
    assert!(
        result.contains("def value(self, value: str) -> None: ..."),
        "{result}"
    );
}

#[test]
fn classmethod_cls_is_not_annotated() {
    let source = r#"
class A:
    @classmethod
    def build(cls, config):
        """
        Parameters
        ----------
        config : dict

        Returns
        -------
        out : Self
        """
"#;
    let result = stub(source);
    assert!(
        result.contains("def build(cls, config: dict) -> Self: ..."),
        "{result}"
    );
    assert!(result.contains("from typing import Self"), "{result}");
}

#[test]
fn async_functions_keep_the_async_keyword() {
    let source = r#"
async def fetch(url):
    """
    Parameters
    ----------
    url : str
    """
"#;
    let result = stub(source);
    assert!(
        result.contains("async def fetch(url: str) -> None: ..."),
        "{result}"
    );
}
