use mica::frontend::{SourceFile, SourceFileOrigin};

// ── End-to-end IR shape ──────────────────────────────────────────────────

fn compile(text: &str) -> String {
    let source = SourceFile {
        contents: text.to_string(),
        origin: SourceFileOrigin::Memory,
    };

    match mica::compile(&source) {
        Ok(output) => output.ir_text,
        Err(failure) => panic!("compile failed: {:?}", failure.errors),
    }
}

/// Every basic block of every function body ends with exactly one
/// terminator.
fn assert_blocks_terminate(ir: &str) {
    let mut in_body = false;
    let mut block: Vec<&str> = Vec::new();

    fn check(block: &[&str]) {
        assert!(!block.is_empty(), "empty basic block");

        let terminators = block.iter().filter(|line| is_terminator(line)).count();
        assert_eq!(terminators, 1, "expected exactly one terminator in {block:?}");
        assert!(
            is_terminator(block.last().unwrap()),
            "block does not end with its terminator: {block:?}"
        );
    }

    fn is_terminator(line: &str) -> bool {
        line.starts_with("ret ") || line == "ret void" || line.starts_with("br ") || line == "unreachable"
    }

    for line in ir.lines() {
        if line.starts_with("define ") {
            in_body = true;
            continue;
        }

        if !in_body {
            continue;
        }

        if line == "}" {
            check(&block);
            block.clear();
            in_body = false;
        } else if line.ends_with(':') {
            if !block.is_empty() {
                check(&block);
                block.clear();
            }
        } else {
            block.push(line.trim());
        }
    }
}

#[test]
fn hello_world_calls_printf() {
    let ir = compile(
        r#"extern "C" { fn printf(fmt i8*, ...) i32; }
           fn main() i32 { printf("hello\n"); return 0; }"#,
    );

    assert!(ir.contains("declare i32 @printf(ptr, ...)"));
    assert!(ir.contains(r#"c"hello\0A\00""#));
    assert!(ir.contains("call i32 (ptr, ...) @printf(ptr @str.0)"));
    assert!(ir.contains("ret i32 0"));
    assert_blocks_terminate(&ir);
}

#[test]
fn call_argument_literals_coerce_to_the_parameter_type() {
    let ir = compile("fn f(n i32) i32 { return n + 1; } fn main() i32 { return f(41); }");

    assert!(ir.contains("define i32 @f(i32 %a0)"));
    assert!(ir.contains("add i32 %a0, 1"));
    assert!(ir.contains("call i32 @f(i32 41)"));
    assert_blocks_terminate(&ir);
}

#[test]
fn array_literals_materialise_at_the_declared_element_type() {
    let ir = compile("fn main() i32 { let xs [3]i32 = [1, 2, 3]; return xs[1]; }");

    assert!(ir.contains("alloca [3 x i32]"));
    assert!(ir.contains("store [3 x i32] [i32 1, i32 2, i32 3]"));
    assert!(ir.contains("getelementptr [3 x i32]"));
    assert!(ir.contains("load i32"));
    assert_blocks_terminate(&ir);
}

#[test]
fn let_inference_defaults() {
    let ir = compile("fn main() i32 { let x = 1; let y f64 = 2; return 0; }");

    assert!(ir.contains("alloca i32"));
    assert!(ir.contains("store i32 1"));
    assert!(ir.contains("alloca double"));
    assert!(ir.contains("store double 2.0"));
    assert_blocks_terminate(&ir);
}

#[test]
fn while_loops_branch_through_a_condition_block() {
    let ir = compile(
        "fn main() i32 {
             let i = 0;
             while i < 10 {
                 i = i + 1;
             }
             return i;
         }",
    );

    assert!(ir.contains("icmp slt i32"));
    assert!(ir.contains("br i1"));
    assert!(ir.contains("br label"));
    assert_blocks_terminate(&ir);
}

#[test]
fn break_jumps_to_the_loop_exit() {
    let ir = compile(
        "fn main() i32 {
             while true {
                 break;
             }
             return 0;
         }",
    );

    assert_blocks_terminate(&ir);
}

#[test]
fn if_with_both_arms_returning_terminates_every_block() {
    let ir = compile("fn main() i32 { if true { return 1; } else { return 2; } }");

    assert!(ir.contains("unreachable"));
    assert_blocks_terminate(&ir);
}

#[test]
fn new_allocates_and_writes_the_header() {
    let ir = compile(
        "struct Point { x i32 y i32 }
         fn main() i32 {
             let p = new Point;
             p.x = 3;
             return p.x;
         }",
    );

    assert!(ir.contains("%Point = type { i64, i32, i32, i32 }"));
    assert!(ir.contains("declare ptr @malloc(i64)"));
    assert!(ir.contains("call ptr @malloc"));
    // refcount 1 into the first header word
    assert!(ir.contains("store i64 1"));
    assert!(ir.contains("getelementptr %Point"));
    assert_blocks_terminate(&ir);
}

#[test]
fn boxed_builtins_carry_the_header_struct() {
    let ir = compile("fn main() i32 { let x = new i32 5; return 0; }");

    assert!(ir.contains("%.i32 = type { i64, i32, i32 }"));
    assert!(ir.contains("call ptr @malloc"));
    assert!(ir.contains("store i32 5"));
    assert_blocks_terminate(&ir);
}

#[test]
fn unsigned_types_select_unsigned_instructions() {
    let ir = compile(
        "fn main() i32 {
             let a u32 = 10;
             let b u32 = 3;
             let q u32 = 0;
             q = a / b;
             let lt bool = a < b;
             return 0;
         }",
    );

    assert!(ir.contains("udiv i32"));
    assert!(ir.contains("icmp ult i32"));
    assert_blocks_terminate(&ir);
}

#[test]
fn float_arithmetic_uses_float_instructions() {
    let ir = compile(
        "fn main() i32 {
             let a f64 = 1.5;
             let b f64 = 2.5;
             let c f64 = 0.0;
             c = a * b;
             let eq bool = a == b;
             return 0;
         }",
    );

    assert!(ir.contains("fmul double"));
    assert!(ir.contains("fcmp oeq double"));
    assert_blocks_terminate(&ir);
}

#[test]
fn casts_lower_to_conversions() {
    let ir = compile(
        "fn main() i32 {
             let a f64 = 1.5;
             let b i32 = 0;
             b = i32(a);
             let c f32 = 0.0;
             c = f32(a);
             return 0;
         }",
    );

    assert!(ir.contains("fptosi double"));
    assert!(ir.contains("fptrunc double"));
    assert_blocks_terminate(&ir);
}

#[test]
fn logical_operators_lower_to_boolean_and_or() {
    let ir = compile(
        "fn main() bool {
             let a bool = true;
             let b bool = false;
             return a && b || a;
         }",
    );

    assert!(ir.contains("and i1"));
    assert!(ir.contains("or i1"));
    assert_blocks_terminate(&ir);
}

#[test]
fn string_globals_are_null_terminated_private_constants() {
    let ir = compile(
        r#"extern "C" { fn puts(s i8*) i32; }
           fn main() i32 { puts("ab\t"); return 0; }"#,
    );

    assert!(ir.contains(r#"@str.0 = private unnamed_addr constant [4 x i8] c"ab\09\00""#));
    assert_blocks_terminate(&ir);
}

#[test]
fn allocas_group_in_the_entry_block() {
    let ir = compile(
        "fn main() i32 {
             let a = 1;
             if true {
                 let b = 2;
             }
             return a;
         }",
    );

    // Both allocas precede the first store in the entry block
    let entry_start = ir.find("bb0:").expect("entry block label");
    let body = &ir[entry_start..];
    let first_store = body.find("store").expect("a store instruction");
    let allocas: Vec<usize> = body.match_indices("alloca").map(|(i, _)| i).collect();

    assert_eq!(allocas.len(), 2);
    assert!(allocas.iter().all(|&offset| offset < first_store));
    assert_blocks_terminate(&ir);
}

#[test]
fn the_ast_dump_is_stable_prose() {
    let source = SourceFile {
        contents: r#"extern "C" { fn printf(fmt i8*, ...) i32; }
fn main() i32 { let x = 1 + 2; return x; }"#
            .to_string(),
        origin: SourceFileOrigin::Memory,
    };

    let output = mica::compile(&source).expect("compile failed");

    assert!(output.ast_dump.contains("extern \"C\" {"));
    assert!(output.ast_dump.contains("fn printf(fmt i8*, ...) i32;"));
    assert!(output.ast_dump.contains("let x  = (1) + (2);"));
    assert!(output.ast_dump.contains("return x;"));
}
