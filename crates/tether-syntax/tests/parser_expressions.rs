mod common;
use common::*;
use expect_test::expect;

#[test]
fn member_chains() {
    expect![[r#"(. (. (. a b) c) [0])"#]].assert_eq(&snapshot_parse("a.b.c[0]"));
    expect![[r#"(?? (?. a b) "none")"#]].assert_eq(&snapshot_parse("a?.b ?? 'none'"));
}

#[test]
fn comparison_and_logic() {
    expect![[r#"(&& (=== (typeof x) "string") (! y))"#]]
        .assert_eq(&snapshot_parse("typeof x === 'string' && !y"));
}

#[test]
fn assignment_is_right_associative() {
    expect![[r#"(= x (= y 1))"#]].assert_eq(&snapshot_parse("x = y = 1"));
}

#[test]
fn sequence_and_new() {
    expect![[r#"(, a b)"#]].assert_eq(&snapshot_parse("a, b"));
    expect![[r#"(new (. Foo Bar) 1)"#]].assert_eq(&snapshot_parse("new Foo.Bar(1)"));
}

#[test]
fn object_literal_needs_parentheses() {
    expect![[r#"(statement block)"#]].assert_eq(&snapshot_parse("{a: 1}"));
    expect![[r#"(object (a 1) ([k] v) (... o))"#]]
        .assert_eq(&snapshot_parse("({a: 1, [k]: v, ...o})"));
}

#[test]
fn array_holes_and_spread() {
    expect![[r#"(array 1 <hole> (... xs))"#]].assert_eq(&snapshot_parse("[1, , ...xs]"));
}

#[test]
fn functions_are_opaque() {
    expect![[r#"(function)"#]].assert_eq(&snapshot_parse("x => x + 1"));
    expect![[r#"(function)"#]].assert_eq(&snapshot_parse("(function () { return 1 })"));
    expect![[r#"(statement function)"#]].assert_eq(&snapshot_parse("function () {}"));
}

#[test]
fn templates() {
    expect![[r#"(tagged tag (template "a" b ""))"#]].assert_eq(&snapshot_parse("tag`a${b}`"));
    expect![[r#"(++postfix i)"#]].assert_eq(&snapshot_parse("i++"));
    expect![[r#"1500"#]].assert_eq(&snapshot_parse("1.5e3"));
}

#[test]
fn syntax_errors_carry_positions() {
    expect![[r#"error: Unexpected token (1:3)"#]].assert_eq(&snapshot_parse("a +* b"));
    expect![[r#"error: Unexpected token (2:2)"#]].assert_eq(&snapshot_parse("a +\n  )"));
    expect![[r#"error: Unterminated template (1:0)"#]].assert_eq(&snapshot_parse("`abc"));
}
