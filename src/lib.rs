pub mod ast;
pub mod backend;
pub mod cache;
pub mod interpreter;
pub mod keywords;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod semantic;
pub mod token;
pub mod validators;

use thiserror::Error;

use ast::Statement;
use interpreter::{Interpreter, InterpreterError};
use validators::Validator;

/// Front-end failure: lexing or parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Lexer(#[from] lexer::LexerError),
    #[error(transparent)]
    Parser(#[from] parser::ParserError),
}

/// Any failure on the source-to-execution path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RunError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] InterpreterError),
}

/// Source text to a validated top-level node sequence.
pub fn compile(source: &str) -> Result<Vec<Statement>, CompileError> {
    let tokens = lexer::tokenize(source)?;
    Ok(parser::parse_tokens(tokens)?)
}

/// Compiles and executes `source` in safe mode, with any caller-supplied
/// validators appended to the chain. Returns the captured print output.
pub fn run_safe(
    source: &str,
    extra_validators: Vec<Box<dyn Validator>>,
) -> Result<String, RunError> {
    let statements = compile(source)?;
    let mut interpreter = Interpreter::with_validators(true, extra_validators);
    interpreter.run(&statements)?;
    Ok(interpreter.take_output().join("\n"))
}
