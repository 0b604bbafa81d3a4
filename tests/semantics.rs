use mica::{
    error::ErrorKind,
    frontend::{SourceFile, SourceFileOrigin},
};

// ── Semantic error detection ─────────────────────────────────────────────
// Each test verifies that an invalid program produces the correct error kind.

fn source(text: &str) -> SourceFile {
    SourceFile {
        contents: text.to_string(),
        origin: SourceFileOrigin::Memory,
    }
}

fn first_error(text: &str) -> ErrorKind {
    let failure = mica::compile(&source(text)).expect_err("expected a compile failure");
    failure
        .errors
        .first()
        .expect("failure carries no error")
        .kind
        .clone()
}

fn compiles(text: &str) {
    if let Err(failure) = mica::compile(&source(text)) {
        panic!("expected a successful compile, got {:?}", failure.errors);
    }
}

#[test]
fn comparing_integer_and_bool_is_a_type_mismatch() {
    let kind = first_error(
        "fn main() bool { let x i32 = 1; let y bool = true; return x == y; }",
    );
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn statement_after_break_is_unreachable() {
    let kind = first_error("fn main() i32 { while true { break; break; } return 0; }");
    assert!(matches!(
        kind,
        ErrorKind::CanNotGiveInstructionAfterBreakOrReturn
    ));
}

#[test]
fn statement_after_return_is_unreachable() {
    let kind = first_error("fn main() i32 { return 0; return 1; }");
    assert!(matches!(
        kind,
        ErrorKind::CanNotGiveInstructionAfterBreakOrReturn
    ));
}

#[test]
fn integer_literal_one_past_i64_max_is_too_large() {
    let kind = first_error("fn main() i32 { let x = 9223372036854775808; return 0; }");
    assert!(matches!(kind, ErrorKind::ConstantTooLarge));
}

#[test]
fn u8_binding_rejects_out_of_range_literal() {
    let kind = first_error("fn main() i32 { let x u8 = 256; return 0; }");
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn break_outside_a_loop_is_invalid() {
    let kind = first_error("fn main() i32 { break; return 0; }");
    assert!(matches!(kind, ErrorKind::InvalidBreak));
}

#[test]
fn inferred_binding_rejects_out_of_i32_literal() {
    let kind = first_error("fn main() i32 { let x = 4294967296; return 0; }");
    assert!(matches!(kind, ErrorKind::ConstantTooLarge));
}

#[test]
fn negating_int64_min_overflows() {
    let kind = first_error("fn main() i32 { let x = -(-9223372036854775807 - 1); return 0; }");
    assert!(matches!(kind, ErrorKind::ConstantTooLarge));
}

#[test]
fn double_negation_is_identity() {
    compiles("fn main() i32 { return -(-42); }");
}

#[test]
fn arguments_are_read_only() {
    let kind = first_error("fn f(n i32) i32 { n = 2; return n; }");
    assert!(matches!(kind, ErrorKind::CanNotOverwriteArgument));
}

#[test]
fn unknown_variable() {
    let kind = first_error("fn main() i32 { return x; }");
    assert!(matches!(kind, ErrorKind::UndefinedSymbol));
}

#[test]
fn unknown_function() {
    let kind = first_error("fn main() i32 { return f(); }");
    assert!(matches!(kind, ErrorKind::UndefinedSymbol));
}

#[test]
fn too_few_call_arguments() {
    let kind = first_error("fn f(a i32) i32 { return a; } fn main() i32 { return f(); }");
    assert!(matches!(kind, ErrorKind::InvalidCallArgumentLength));
}

#[test]
fn too_many_call_arguments() {
    let kind = first_error("fn f(a i32) i32 { return a; } fn main() i32 { return f(1, 2); }");
    assert!(matches!(kind, ErrorKind::InvalidCallArgumentLength));
}

#[test]
fn variadic_declarations_accept_extra_arguments() {
    compiles(
        r#"extern "C" { fn printf(fmt i8*, ...) i32; }
           fn main() i32 { printf("%d %d\n", 1, 2); return 0; }"#,
    );
}

#[test]
fn missing_return_in_non_void_function() {
    let kind = first_error("fn main() i32 { let x = 1; }");
    assert!(matches!(kind, ErrorKind::MissingReturn));
}

#[test]
fn both_arms_returning_satisfies_the_function() {
    compiles("fn main() i32 { if true { return 1; } else { return 2; } }");
}

#[test]
fn an_if_without_else_does_not_count_as_returning() {
    let kind = first_error("fn main() i32 { if true { return 1; } }");
    assert!(matches!(kind, ErrorKind::MissingReturn));
}

#[test]
fn void_functions_may_fall_through() {
    compiles("fn f() { let x = 1; } fn main() i32 { f(); return 0; }");
}

#[test]
fn returning_a_value_from_a_void_function_is_a_mismatch() {
    let kind = first_error("fn f() { return 1; }");
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn bare_return_in_a_non_void_function_is_a_mismatch() {
    let kind = first_error("fn f() i32 { return; }");
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn sized_integer_types_do_not_mix() {
    let kind = first_error("fn f() i64 { let x i32 = 1; return x; }");
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn condition_must_be_boolean() {
    let kind = first_error("fn main() i32 { while 1 { } return 0; }");
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn array_sizes_must_be_constant() {
    let kind = first_error("fn main() i32 { let n = 3; let xs [n]i32; return 0; }");
    assert!(matches!(kind, ErrorKind::ArraySizeMustBeConstantInteger));
}

#[test]
fn array_sizes_must_be_positive() {
    let kind = first_error("fn main() i32 { let xs [0]i32; return 0; }");
    assert!(matches!(kind, ErrorKind::ArraySizeMustBeConstantInteger));
}

#[test]
fn aggregate_elements_must_agree() {
    let kind = first_error("fn main() i32 { let xs [2]i32 = [1, true]; return 0; }");
    assert!(matches!(kind, ErrorKind::EachElementMustHaveIdenticallyType));
}

#[test]
fn empty_aggregates_are_rejected() {
    let kind = first_error("fn main() i32 { let xs [1]i32 = []; return 0; }");
    assert!(matches!(kind, ErrorKind::EachElementMustHaveIdenticallyType));
}

#[test]
fn aggregate_length_must_match_the_declared_type() {
    let kind = first_error("fn main() i32 { let xs [2]i32 = [1, 2, 3]; return 0; }");
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn aggregate_elements_must_fit_the_declared_element_type() {
    let kind = first_error("fn main() i32 { let xs [2]u8 = [1, 256]; return 0; }");
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn void_references_are_invalid() {
    let kind = first_error("fn f() void& { }");
    assert!(matches!(kind, ErrorKind::InvalidReferenceType));
}

#[test]
fn unknown_struct_member() {
    let kind = first_error(
        "struct Point { x i32 }
         fn main() i32 { let p = new Point; return p.y; }",
    );
    assert!(matches!(kind, ErrorKind::UndefinedSymbol));
}

#[test]
fn pointer_casts_are_rejected() {
    let kind = first_error(r#"fn f(s i8*) i32 { return i32(s); }"#);
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn logical_operators_require_booleans() {
    let kind = first_error("fn main() bool { return 1 && true; }");
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn arithmetic_on_strings_is_rejected() {
    let kind = first_error(r#"fn main() i32 { let s = "a" + "b"; return 0; }"#);
    assert!(matches!(kind, ErrorKind::NotArithmeticType { .. }));
}

#[test]
fn constant_division_by_zero_fails_folding() {
    let kind = first_error("fn main() i32 { let x = 1 / 0; return 0; }");
    assert!(matches!(kind, ErrorKind::ConstantTooLarge));
}

#[test]
fn errors_carry_source_positions() {
    let failure = mica::compile(&source("fn main() i32 {\n    return x;\n}"))
        .expect_err("expected a compile failure");
    let error = &failure.errors[0];
    assert_eq!(error.token.line, 2);
    assert!(error.token.column > 1);
    assert_eq!(error.name(), "UndefinedSymbol");
}
