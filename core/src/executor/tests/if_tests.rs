//! Tests for If statements

use super::helpers::{binary, ident, lit, log_stmt, run, run_with, test_context};
use crate::executor::Val;
use maplit::hashmap;
use serde_json::{json, Value as JsonValue};

fn if_else(condition: JsonValue, then_value: JsonValue, else_value: JsonValue) -> JsonValue {
    json!([{
        "type": "if",
        "condition": condition,
        "thenBody": [{"type": "return", "value": then_value}],
        "elseBody": [{"type": "return", "value": else_value}]
    }])
}

#[test]
fn test_if_true_no_else() {
    let (ctx, _) = test_context();
    let result = run(
        &ctx,
        json!([{
            "type": "if",
            "condition": lit(json!(true)),
            "thenBody": [{"type": "return", "value": lit(json!(42))}]
        }]),
    );
    assert_eq!(result, Ok(Val::Num(42.0)));
}

#[test]
fn test_if_false_no_else() {
    let (ctx, _) = test_context();
    let result = run(
        &ctx,
        json!([
            {
                "type": "if",
                "condition": lit(json!(false)),
                "thenBody": [{"type": "return", "value": lit(json!(42))}]
            },
            {"type": "return", "value": lit(json!(99))}
        ]),
    );
    assert_eq!(result, Ok(Val::Num(99.0)));
}

#[test]
fn test_if_with_else() {
    let (ctx, _) = test_context();
    assert_eq!(
        run(&ctx, if_else(lit(json!(true)), lit(json!(42)), lit(json!(99)))),
        Ok(Val::Num(42.0))
    );
    assert_eq!(
        run(&ctx, if_else(lit(json!(false)), lit(json!(42)), lit(json!(99)))),
        Ok(Val::Num(99.0))
    );
}

#[test]
fn test_if_truthiness() {
    let (ctx, _) = test_context();
    for (condition, expected) in [
        (json!(42), "truthy"),
        (json!(0), "falsy"),
        (json!(""), "falsy"),
        (json!("x"), "truthy"),
        (json!(null), "falsy"),
        (json!([]), "truthy"),
    ] {
        let result = run(
            &ctx,
            if_else(lit(condition.clone()), lit(json!("truthy")), lit(json!("falsy"))),
        );
        assert_eq!(result, Ok(Val::str(expected)), "condition {}", condition);
    }
}

#[test]
fn test_if_with_variable_condition() {
    let (ctx, _) = test_context();
    let result = run_with(
        &ctx,
        if_else(
            binary(">", ident("count"), lit(json!(3))),
            lit(json!("many")),
            lit(json!("few")),
        ),
        hashmap! { "count".to_string() => Val::Num(5.0) },
    );
    assert_eq!(result, Ok(Val::str("many")));
}

#[test]
fn test_branch_bindings_do_not_leak() {
    let (ctx, _) = test_context();
    let result = run(
        &ctx,
        json!([
            {
                "type": "if",
                "condition": lit(json!(true)),
                "thenBody": [{"type": "let", "name": "inner", "value": lit(json!(1))}]
            },
            {"type": "return", "value": ident("inner")}
        ]),
    );
    let err = result.unwrap_err();
    assert_eq!(err.path, vec![1]);
    assert_eq!(err.to_string(), "statement 1 (return): unbound name 'inner'");
}

#[test]
fn test_branch_can_assign_outer_binding() {
    let (ctx, _) = test_context();
    let result = run(
        &ctx,
        json!([
            {"type": "let", "name": "status", "value": lit(json!("open"))},
            {
                "type": "if",
                "condition": lit(json!(true)),
                "thenBody": [{"type": "assign", "name": "status", "value": lit(json!("closed"))}]
            },
            {"type": "return", "value": ident("status")}
        ]),
    );
    assert_eq!(result, Ok(Val::str("closed")));
}

#[test]
fn test_branch_let_shadows_without_touching_outer() {
    let (ctx, _) = test_context();
    let result = run(
        &ctx,
        json!([
            {"type": "let", "name": "status", "value": lit(json!("open"))},
            {
                "type": "if",
                "condition": lit(json!(true)),
                "thenBody": [{"type": "let", "name": "status", "value": lit(json!("shadow"))}]
            },
            {"type": "return", "value": ident("status")}
        ]),
    );
    assert_eq!(result, Ok(Val::str("open")));
}

#[test]
fn test_return_in_nested_if_skips_rest() {
    let (ctx, sink) = test_context();
    let result = run(
        &ctx,
        json!([
            {
                "type": "if",
                "condition": lit(json!(true)),
                "thenBody": [
                    {
                        "type": "if",
                        "condition": lit(json!(true)),
                        "thenBody": [{"type": "return", "value": lit(json!("inner"))}]
                    },
                    log_stmt(vec![lit(json!("after inner if"))])
                ]
            },
            log_stmt(vec![lit(json!("after outer if"))]),
            {"type": "return", "value": lit(json!("outer"))}
        ]),
    );
    assert_eq!(result, Ok(Val::str("inner")));
    assert!(sink.lines().is_empty());
}
