//! Safe-mode validation chain.
//!
//! Each validator inspects a single concern and the chain is an explicit
//! ordered list of trait objects: callers assemble it with [`build_chain`]
//! and may append their own validators. Validation walks every node
//! depth-first and stops at the first violation; it has no side effects.

use thiserror::Error;

use crate::ast::{AssignTarget, Case, Expression, Statement};

/// A node in safe mode attempted a capability the chain forbids.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ForbiddenPrimitiveError {
    pub message: String,
}

impl ForbiddenPrimitiveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Borrowed view of a single AST node handed to each validator.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Stmt(&'a Statement),
    Expr(&'a Expression),
}

pub trait Validator {
    fn check(&self, node: NodeRef<'_>) -> Result<(), ForbiddenPrimitiveError>;
}

/// Process execution, network access, and thread spawning.
pub struct DangerousPrimitives;

const DANGEROUS_CALLS: &[&str] = &["ejecutar", "sistema", "obtener_url", "enviar_http", "hilo"];

impl Validator for DangerousPrimitives {
    fn check(&self, node: NodeRef<'_>) -> Result<(), ForbiddenPrimitiveError> {
        if let NodeRef::Expr(Expression::Call { name, .. }) = node {
            if DANGEROUS_CALLS.contains(&name.as_str()) {
                return Err(ForbiddenPrimitiveError::new(format!(
                    "Primitiva peligrosa no permitida en modo seguro: '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// Module imports outside an explicit whitelist.
#[derive(Default)]
pub struct RestrictedImports {
    allowed: Vec<String>,
}

impl RestrictedImports {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    fn permit(&self, path: &str) -> bool {
        self.allowed.iter().any(|entry| entry == path)
    }
}

impl Validator for RestrictedImports {
    fn check(&self, node: NodeRef<'_>) -> Result<(), ForbiddenPrimitiveError> {
        let path = match node {
            NodeRef::Stmt(Statement::Import { path }) => path,
            NodeRef::Stmt(Statement::Use { module }) => module,
            NodeRef::Stmt(Statement::ImportFrom { module, .. }) => module,
            _ => return Ok(()),
        };
        if self.permit(path) {
            Ok(())
        } else {
            Err(ForbiddenPrimitiveError::new(format!(
                "Importación de módulo no permitida: {path}"
            )))
        }
    }
}

/// File reads and writes.
pub struct FilesystemAccess;

const FILESYSTEM_CALLS: &[&str] = &[
    "leer_archivo",
    "escribir_archivo",
    "abrir_archivo",
    "borrar_archivo",
];

impl Validator for FilesystemAccess {
    fn check(&self, node: NodeRef<'_>) -> Result<(), ForbiddenPrimitiveError> {
        if let NodeRef::Expr(Expression::Call { name, .. }) = node {
            if FILESYSTEM_CALLS.contains(&name.as_str()) {
                return Err(ForbiddenPrimitiveError::new(format!(
                    "Acceso al sistema de archivos no permitido en modo seguro: '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// Reflective primitives and dynamic code loading.
pub struct NoReflection;

const REFLECTION_CALLS: &[&str] = &["eval", "reflejar", "importar_dinamico", "compilar"];

impl Validator for NoReflection {
    fn check(&self, node: NodeRef<'_>) -> Result<(), ForbiddenPrimitiveError> {
        if let NodeRef::Expr(Expression::Call { name, .. }) = node {
            if REFLECTION_CALLS.contains(&name.as_str()) {
                return Err(ForbiddenPrimitiveError::new(format!(
                    "Uso de reflexión no permitido en modo seguro: '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// Assembles the default chain, appending any caller-supplied validators.
pub fn build_chain(extra: Vec<Box<dyn Validator>>) -> Vec<Box<dyn Validator>> {
    let mut chain: Vec<Box<dyn Validator>> = vec![
        Box::new(DangerousPrimitives),
        Box::new(RestrictedImports::default()),
        Box::new(FilesystemAccess),
        Box::new(NoReflection),
    ];
    chain.extend(extra);
    chain
}

/// Runs every validator over `statement` and all of its descendants.
pub fn validate_statement(
    chain: &[Box<dyn Validator>],
    statement: &Statement,
) -> Result<(), ForbiddenPrimitiveError> {
    for validator in chain {
        validator.check(NodeRef::Stmt(statement))?;
    }
    match statement {
        Statement::Assign { target, value, .. } => {
            match target {
                AssignTarget::Name(_) => {}
                AssignTarget::Attribute { object, .. } => validate_expression(chain, object)?,
                AssignTarget::Index { object, index } => {
                    validate_expression(chain, object)?;
                    validate_expression(chain, index)?;
                }
            }
            validate_expression(chain, value)
        }
        Statement::If {
            condition,
            then_body,
            else_body,
        } => {
            validate_expression(chain, condition)?;
            validate_block(chain, then_body)?;
            validate_block(chain, else_body)
        }
        Statement::While { condition, body } => {
            validate_expression(chain, condition)?;
            validate_block(chain, body)
        }
        Statement::For {
            iterable, body, ..
        } => {
            validate_expression(chain, iterable)?;
            validate_block(chain, body)
        }
        Statement::FunctionDef {
            decorators, body, ..
        } => {
            for decorator in decorators {
                validate_expression(chain, decorator)?;
            }
            validate_block(chain, body)
        }
        Statement::MethodDef { body, .. } => validate_block(chain, body),
        Statement::ClassDef { body, .. } => validate_block(chain, body),
        Statement::InterfaceDef { .. } | Statement::EnumDef { .. } => Ok(()),
        Statement::Return(value) => match value {
            Some(expr) => validate_expression(chain, expr),
            None => Ok(()),
        },
        Statement::Throw(expr) => validate_expression(chain, expr),
        Statement::TryCatch {
            try_body,
            catch_body,
            finally_body,
            ..
        } => {
            validate_block(chain, try_body)?;
            validate_block(chain, catch_body)?;
            validate_block(chain, finally_body)
        }
        Statement::Import { .. }
        | Statement::Use { .. }
        | Statement::ImportFrom { .. }
        | Statement::Export { .. } => Ok(()),
        Statement::Print(expr) => validate_expression(chain, expr),
        Statement::Break | Statement::Continue | Statement::Pass => Ok(()),
        Statement::Assert { condition, message } => {
            validate_expression(chain, condition)?;
            match message {
                Some(expr) => validate_expression(chain, expr),
                None => Ok(()),
            }
        }
        Statement::Del { target } => validate_expression(chain, target),
        Statement::Global { .. } | Statement::NonLocal { .. } => Ok(()),
        Statement::With { context, body, .. } => {
            validate_expression(chain, context)?;
            validate_block(chain, body)
        }
        Statement::MacroDef { body, .. } => validate_block(chain, body),
        Statement::Switch {
            subject,
            cases,
            default,
        } => {
            validate_expression(chain, subject)?;
            for Case { guard, body, .. } in cases {
                if let Some(guard) = guard {
                    validate_expression(chain, guard)?;
                }
                validate_block(chain, body)?;
            }
            validate_block(chain, default)
        }
        Statement::Expr(expr) => validate_expression(chain, expr),
    }
}

pub fn validate_expression(
    chain: &[Box<dyn Validator>],
    expression: &Expression,
) -> Result<(), ForbiddenPrimitiveError> {
    for validator in chain {
        validator.check(NodeRef::Expr(expression))?;
    }
    match expression {
        Expression::Literal(_) | Expression::Identifier(_) => Ok(()),
        Expression::List(elements) => {
            for element in elements {
                validate_expression(chain, element)?;
            }
            Ok(())
        }
        Expression::Dict(entries) => {
            for (key, value) in entries {
                validate_expression(chain, key)?;
                validate_expression(chain, value)?;
            }
            Ok(())
        }
        Expression::OptionValue(value) => match value {
            Some(inner) => validate_expression(chain, inner),
            None => Ok(()),
        },
        Expression::BinaryOp { left, right, .. } => {
            validate_expression(chain, left)?;
            validate_expression(chain, right)
        }
        Expression::UnaryOp { operand, .. } => validate_expression(chain, operand),
        Expression::Call { args, .. } => {
            for arg in args {
                validate_expression(chain, arg)?;
            }
            Ok(())
        }
        Expression::MethodCall { object, args, .. } => {
            validate_expression(chain, object)?;
            for arg in args {
                validate_expression(chain, arg)?;
            }
            Ok(())
        }
        Expression::Attribute { object, .. } => validate_expression(chain, object),
        Expression::Index { object, index } => {
            validate_expression(chain, object)?;
            validate_expression(chain, index)
        }
        Expression::Instantiation { args, .. } => {
            for arg in args {
                validate_expression(chain, arg)?;
            }
            Ok(())
        }
        Expression::Lambda { body, .. } => validate_expression(chain, body),
        Expression::Await(operand) => validate_expression(chain, operand),
    }
}

fn validate_block(
    chain: &[Box<dyn Validator>],
    statements: &[Statement],
) -> Result<(), ForbiddenPrimitiveError> {
    for statement in statements {
        validate_statement(chain, statement)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;

    fn parse(input: &str) -> Vec<Statement> {
        parse_tokens(tokenize(input).expect("tokenize failed")).expect("parse failed")
    }

    fn validate(input: &str) -> Result<(), ForbiddenPrimitiveError> {
        let chain = build_chain(Vec::new());
        for statement in parse(input) {
            validate_statement(&chain, &statement)?;
        }
        Ok(())
    }

    #[test]
    fn rejects_file_reads() {
        let err = validate("var datos = leer_archivo('x.txt')").expect_err("expected rejection");
        assert!(err.message.contains("leer_archivo"));
    }

    #[test]
    fn rejects_nested_dangerous_calls() {
        let err = validate(indoc::indoc! {"
            si verdadero:
                imprimir(ejecutar('rm'))
            fin
        "})
        .expect_err("expected rejection");
        assert!(err.message.contains("ejecutar"));
    }

    #[test]
    fn rejects_non_whitelisted_imports() {
        let err = validate("import 'cualquiera.co'").expect_err("expected rejection");
        assert!(err.message.contains("Importación de módulo no permitida"));
    }

    #[test]
    fn whitelisted_import_passes() {
        let chain: Vec<Box<dyn Validator>> = vec![Box::new(RestrictedImports::new(vec![
            "modulos/util.co".to_string(),
        ]))];
        let statements = parse("import 'modulos/util.co'");
        assert!(validate_statement(&chain, &statements[0]).is_ok());
    }

    #[test]
    fn rejects_reflection() {
        let err = validate("eval('1 + 1')").expect_err("expected rejection");
        assert!(err.message.contains("reflexión"));
    }

    #[test]
    fn accepts_plain_programs_and_runs_extra_validators() {
        assert!(validate("var x = 1 + 2\nimprimir(x)").is_ok());

        struct NoPrints;
        impl Validator for NoPrints {
            fn check(&self, node: NodeRef<'_>) -> Result<(), ForbiddenPrimitiveError> {
                if let NodeRef::Stmt(Statement::Print(_)) = node {
                    return Err(ForbiddenPrimitiveError::new("impresión prohibida"));
                }
                Ok(())
            }
        }
        let chain = build_chain(vec![Box::new(NoPrints)]);
        let statements = parse("imprimir(1)");
        let err = validate_statement(&chain, &statements[0]).expect_err("expected rejection");
        assert_eq!(err.message, "impresión prohibida");
    }
}
