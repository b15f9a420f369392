mod common;

use common::PRODUCT_VARS;
use stencil::{ErrorKind, Template, VarDescriptor};

fn compile_error(source: &str) -> String {
    Template::compile_string(source, &PRODUCT_VARS)
        .unwrap_err()
        .to_string()
}

#[test]
fn test_mismatched_close_tag() {
    assert_eq!(
        compile_error("{{#reviews}}{{/name}}"),
        "expecting IDENTIFIER `reviews` but found `name`"
    );
}

#[test]
fn test_unknown_variable() {
    static NO_VARS: [VarDescriptor<()>; 0] = [];
    let err = Template::compile_string("{{unknown}}", &NO_VARS).unwrap_err();
    assert_eq!(err.to_string(), "Unknown variable: unknown");
}

#[test]
fn test_escaping_a_non_string() {
    assert_eq!(
        compile_error("{{{price}}}"),
        "Variable must be string to be escaped"
    );
}

#[test]
fn test_action_spanning_lines() {
    assert_eq!(compile_error("{{\n}}"), "actions cannot span multiple lines");
}

#[test]
fn test_stray_close_sequence() {
    assert_eq!(
        compile_error("some }} text"),
        "unexpected action close sequence"
    );
}

#[test]
fn test_eof_inside_action() {
    assert_eq!(
        compile_error("{{name"),
        "unexpected EOF while scanning action"
    );
}

#[test]
fn test_eof_inside_comment() {
    assert_eq!(
        compile_error("{{! still open"),
        "unexpected EOF while scanning comment end"
    );
}

#[test]
fn test_unclosed_iteration_at_eof() {
    assert_eq!(
        compile_error("{{#reviews}}dangling"),
        "EOF while looking for matching {{/reviews}}"
    );
}

#[test]
fn test_unclosed_conditional_at_eof() {
    assert_eq!(
        compile_error("{{name?}}dangling"),
        "EOF while looking for matching {{/name}}"
    );
}

#[test]
fn test_dangling_negation() {
    assert_eq!(compile_error("{{^name}}"), "unmatched negation");
}

#[test]
fn test_dangling_quote() {
    assert_eq!(
        compile_error("{{{name}?}}x{{/name?}}"),
        "unmatched quote"
    );
}

#[test]
fn test_iterating_a_scalar() {
    assert_eq!(
        compile_error("{{#price}}x{{/price}}"),
        "Couldn't find descriptor for variable `price`"
    );
}

#[test]
fn test_conditional_over_an_iterable() {
    assert_eq!(
        compile_error("{{reviews?}}x{{/reviews?}}"),
        "Variable `reviews` cannot be tested for emptiness"
    );
}

#[test]
fn test_iterable_as_plain_variable() {
    assert_eq!(
        compile_error("{{reviews}}"),
        "Invalid variable descriptor: `reviews`"
    );
}

#[test]
fn test_close_without_any_open() {
    assert_eq!(compile_error("{{/reviews}}"), "unexpected {{/reviews}}");
}

#[test]
fn test_iteration_close_for_a_conditional_open() {
    assert_eq!(
        compile_error("{{name?}}{{/name}}"),
        "Could not find {{#name}}"
    );
}

#[test]
fn test_conditional_close_for_an_iteration_open() {
    assert_eq!(
        compile_error("{{#reviews}}{{/reviews?}}"),
        "Could not find {{reviews?}}"
    );
}

#[test]
fn test_identifier_longer_than_the_limit() {
    let long = "a".repeat(65);
    assert_eq!(
        compile_error(&format!("{{{{{}}}}}", long)),
        "Lexeme exceeds 64 characters"
    );
}

#[test]
fn test_unexpected_character_inside_action() {
    assert_eq!(
        compile_error("{{ a%b }}"),
        "unexpected character: %"
    );
}

#[test]
fn test_unexpected_lexeme_reporting() {
    // A hash with no identifier after it.
    assert_eq!(
        compile_error("{{#}}"),
        "unexpected lexeme: RIGHT_META [}}]"
    );
}

#[test]
fn test_missing_file_is_an_io_error() {
    let err = Template::compile_file("definitely/not/here.tpl", &PRODUCT_VARS).unwrap_err();
    match err.kind {
        ErrorKind::Io(_) => {}
        ref kind => panic!("expected an I/O error, got {:?}", kind),
    }
}
