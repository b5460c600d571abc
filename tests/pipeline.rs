//! End-to-end pipeline tests: source → lexer → parser → optimizer →
//! interpreter, plus the cache and safe-mode entry points.

use indoc::indoc;

use cobra::cache::AstCache;
use cobra::interpreter::{Interpreter, InterpreterError};
use cobra::{compile, optimizer, run_safe, semantic, CompileError, RunError};

fn run_unsafe(statements: &[cobra::ast::Statement]) -> Vec<String> {
    let mut interpreter = Interpreter::new(false);
    interpreter.run(statements).expect("run failed");
    interpreter.take_output()
}

#[test]
fn compiles_optimizes_and_runs_a_program() {
    let source = indoc! {"
        func cuadrado(x):
            retorno x * x
        fin
        var total = 0
        para n in rango(1, 4):
            total = total + cuadrado(n)
        fin
        imprimir(total)
    "};
    let statements = optimizer::optimize(compile(source).expect("compile failed"));
    assert_eq!(run_unsafe(&statements), vec!["14"]);
}

#[test]
fn optimization_preserves_program_output() {
    let source = indoc! {"
        func uno():
            retorno 1
        fin
        var a = 1 + 2
        var b = a + a
        var c = a + a
        si verdadero:
            imprimir(uno() + b + c)
        sino:
            imprimir(0)
        fin
    "};
    let plain = compile(source).expect("compile failed");
    let optimized = optimizer::optimize(plain.clone());
    assert_eq!(run_unsafe(&plain), run_unsafe(&optimized));

    // Idempotence of the composed pipeline over parsed source.
    assert_eq!(optimizer::optimize(optimized.clone()), optimized);
}

#[test]
fn optimized_inlining_drops_the_pure_function() {
    let source = indoc! {"
        func uno():
            retorno 1
        fin
        imprimir(uno())
        imprimir(uno())
    "};
    let optimized = optimizer::optimize(compile(source).expect("compile failed"));
    assert!(
        !optimized
            .iter()
            .any(|s| matches!(s, cobra::ast::Statement::FunctionDef { .. })),
        "inlined function should be removed: {optimized:?}"
    );
    assert_eq!(run_unsafe(&optimized), vec!["1", "1"]);
}

#[test]
fn cache_round_trips_the_parsed_tree() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let cache = AstCache::new(dir.path());
    let source = indoc! {"
        clase Caja:
            metodo inicializar(self, valor):
                self.valor = valor
            fin
        fin
        var caja = Caja(7)
        imprimir(caja.valor)
    "};
    let direct = compile(source).expect("compile failed");
    let first = cache.get_ast(source).expect("first get_ast failed");
    let second = cache.get_ast(source).expect("second get_ast failed");
    assert_eq!(direct, first);
    assert_eq!(first, second);
    assert_eq!(run_unsafe(&second), vec!["7"]);
}

#[test]
fn run_safe_rejects_forbidden_primitives_and_runs_clean_programs() {
    let output = run_safe("imprimir(1 + 2)", Vec::new()).expect("safe run failed");
    assert_eq!(output, "3");

    let err = run_safe("imprimir(leer_archivo('x.txt'))", Vec::new())
        .expect_err("expected forbidden primitive");
    assert!(matches!(
        err,
        RunError::Runtime(InterpreterError::Forbidden(_))
    ));
}

#[test]
fn compile_surfaces_lexer_and_parser_errors() {
    assert!(matches!(
        compile("var x = 1 $"),
        Err(CompileError::Lexer(_))
    ));
    match compile("var fin = 1") {
        Err(CompileError::Parser(error)) => {
            assert!(error.message.contains("palabra reservada"));
        }
        other => panic!("expected parser error, got {other:?}"),
    }
}

#[test]
fn interpreter_type_errors_name_the_operation() {
    let statements = compile("imprimir('a' + 1)").expect("compile failed");
    let mut interpreter = Interpreter::new(false);
    let err = interpreter.run(&statements).expect_err("expected mismatch");
    match err {
        InterpreterError::TypeMismatch(mismatch) => assert_eq!(mismatch.operation, "+"),
        other => panic!("expected type mismatch, got {other:?}"),
    }
}

#[test]
fn semantic_analysis_covers_compiled_programs() {
    let source = indoc! {"
        var x = 1
        func f(a):
            retorno a
        fin
        clase C:
            pasar
        fin
    "};
    let table = semantic::analyze(&compile(source).expect("compile failed"))
        .expect("analysis failed");
    assert!(table.resolve("x").is_some());
    assert!(table.resolve("f").is_some());
    assert!(table.resolve("C").is_some());
}
