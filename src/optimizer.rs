//! AST-to-AST optimization passes.
//!
//! Four independent, idempotent rewrites that never fail: anything a pass
//! cannot safely rewrite is passed through unchanged. [`optimize`] composes
//! them in the order the interpreter applies before execution.

use crate::ast::{AssignTarget, Case, Expression, Statement};

mod common_subexpr;
mod constant_folding;
mod dead_code;
mod inlining;

pub use common_subexpr::eliminate_common_subexpressions;
pub use constant_folding::fold_constants;
pub use dead_code::remove_dead_code;
pub use inlining::inline_functions;

pub fn optimize(statements: Vec<Statement>) -> Vec<Statement> {
    remove_dead_code(inline_functions(eliminate_common_subexpressions(
        fold_constants(statements),
    )))
}

/// Applies `f` to every expression tree in `statement`, recursing into all
/// nested statement bodies. `f` owns recursion within each expression.
pub(crate) fn map_statement(
    statement: Statement,
    f: &mut dyn FnMut(Expression) -> Expression,
) -> Statement {
    match statement {
        Statement::Assign {
            target,
            value,
            inferred,
        } => {
            let target = match target {
                AssignTarget::Name(name) => AssignTarget::Name(name),
                AssignTarget::Attribute { object, name } => AssignTarget::Attribute {
                    object: f(object),
                    name,
                },
                AssignTarget::Index { object, index } => AssignTarget::Index {
                    object: f(object),
                    index: f(index),
                },
            };
            Statement::Assign {
                target,
                value: f(value),
                inferred,
            }
        }
        Statement::If {
            condition,
            then_body,
            else_body,
        } => Statement::If {
            condition: f(condition),
            then_body: map_block(then_body, f),
            else_body: map_block(else_body, f),
        },
        Statement::While { condition, body } => Statement::While {
            condition: f(condition),
            body: map_block(body, f),
        },
        Statement::For {
            variable,
            iterable,
            body,
        } => Statement::For {
            variable,
            iterable: f(iterable),
            body: map_block(body, f),
        },
        Statement::FunctionDef {
            name,
            params,
            type_params,
            decorators,
            body,
            is_async,
        } => Statement::FunctionDef {
            name,
            params,
            type_params,
            decorators: decorators.into_iter().map(&mut *f).collect(),
            body: map_block(body, f),
            is_async,
        },
        Statement::MethodDef {
            name,
            params,
            type_params,
            body,
            is_async,
        } => Statement::MethodDef {
            name,
            params,
            type_params,
            body: map_block(body, f),
            is_async,
        },
        Statement::ClassDef {
            name,
            type_params,
            bases,
            body,
        } => Statement::ClassDef {
            name,
            type_params,
            bases,
            body: map_block(body, f),
        },
        Statement::Return(value) => Statement::Return(value.map(&mut *f)),
        Statement::Throw(value) => Statement::Throw(f(value)),
        Statement::TryCatch {
            try_body,
            exception_name,
            catch_body,
            finally_body,
        } => Statement::TryCatch {
            try_body: map_block(try_body, f),
            exception_name,
            catch_body: map_block(catch_body, f),
            finally_body: map_block(finally_body, f),
        },
        Statement::Print(value) => Statement::Print(f(value)),
        Statement::Assert { condition, message } => Statement::Assert {
            condition: f(condition),
            message: message.map(&mut *f),
        },
        Statement::Del { target } => Statement::Del { target: f(target) },
        Statement::With {
            context,
            alias,
            body,
        } => Statement::With {
            context: f(context),
            alias,
            body: map_block(body, f),
        },
        Statement::MacroDef { name, body } => Statement::MacroDef {
            name,
            body: map_block(body, f),
        },
        Statement::Switch {
            subject,
            cases,
            default,
        } => Statement::Switch {
            subject: f(subject),
            cases: cases
                .into_iter()
                .map(|case| Case {
                    pattern: case.pattern,
                    guard: case.guard.map(&mut *f),
                    body: map_block(case.body, f),
                })
                .collect(),
            default: map_block(default, f),
        },
        Statement::Expr(value) => Statement::Expr(f(value)),
        passthrough @ (Statement::InterfaceDef { .. }
        | Statement::EnumDef { .. }
        | Statement::Import { .. }
        | Statement::Use { .. }
        | Statement::ImportFrom { .. }
        | Statement::Export { .. }
        | Statement::Break
        | Statement::Continue
        | Statement::Pass
        | Statement::Global { .. }
        | Statement::NonLocal { .. }) => passthrough,
    }
}

pub(crate) fn map_block(
    statements: Vec<Statement>,
    f: &mut dyn FnMut(Expression) -> Expression,
) -> Vec<Statement> {
    statements
        .into_iter()
        .map(|statement| map_statement(statement, f))
        .collect()
}

/// Visits every expression tree in `statement` read-only, recursing into
/// all nested statement bodies.
pub(crate) fn visit_statement_expressions(
    statement: &Statement,
    f: &mut dyn FnMut(&Expression),
) {
    match statement {
        Statement::Assign { target, value, .. } => {
            match target {
                AssignTarget::Name(_) => {}
                AssignTarget::Attribute { object, .. } => f(object),
                AssignTarget::Index { object, index } => {
                    f(object);
                    f(index);
                }
            }
            f(value);
        }
        Statement::If {
            condition,
            then_body,
            else_body,
        } => {
            f(condition);
            visit_block_expressions(then_body, f);
            visit_block_expressions(else_body, f);
        }
        Statement::While { condition, body } => {
            f(condition);
            visit_block_expressions(body, f);
        }
        Statement::For {
            iterable, body, ..
        } => {
            f(iterable);
            visit_block_expressions(body, f);
        }
        Statement::FunctionDef {
            decorators, body, ..
        } => {
            for decorator in decorators {
                f(decorator);
            }
            visit_block_expressions(body, f);
        }
        Statement::MethodDef { body, .. }
        | Statement::ClassDef { body, .. }
        | Statement::MacroDef { body, .. }
        | Statement::With { body, .. } => {
            if let Statement::With { context, .. } = statement {
                f(context);
            }
            visit_block_expressions(body, f);
        }
        Statement::Return(value) => {
            if let Some(value) = value {
                f(value);
            }
        }
        Statement::Throw(value) => f(value),
        Statement::TryCatch {
            try_body,
            catch_body,
            finally_body,
            ..
        } => {
            visit_block_expressions(try_body, f);
            visit_block_expressions(catch_body, f);
            visit_block_expressions(finally_body, f);
        }
        Statement::Print(value) => f(value),
        Statement::Assert { condition, message } => {
            f(condition);
            if let Some(message) = message {
                f(message);
            }
        }
        Statement::Del { target } => f(target),
        Statement::Switch {
            subject,
            cases,
            default,
        } => {
            f(subject);
            for case in cases {
                if let Some(guard) = &case.guard {
                    f(guard);
                }
                visit_block_expressions(&case.body, f);
            }
            visit_block_expressions(default, f);
        }
        Statement::Expr(value) => f(value),
        Statement::InterfaceDef { .. }
        | Statement::EnumDef { .. }
        | Statement::Import { .. }
        | Statement::Use { .. }
        | Statement::ImportFrom { .. }
        | Statement::Export { .. }
        | Statement::Break
        | Statement::Continue
        | Statement::Pass
        | Statement::Global { .. }
        | Statement::NonLocal { .. } => {}
    }
}

pub(crate) fn visit_block_expressions(statements: &[Statement], f: &mut dyn FnMut(&Expression)) {
    for statement in statements {
        visit_statement_expressions(statement, f);
    }
}

/// Rebuilds an expression with `f` applied to each child subtree, leaving
/// the node itself for the caller.
pub(crate) fn map_subexpressions(
    expression: Expression,
    f: &mut dyn FnMut(Expression) -> Expression,
) -> Expression {
    match expression {
        Expression::BinaryOp { left, op, right } => Expression::BinaryOp {
            left: Box::new(f(*left)),
            op,
            right: Box::new(f(*right)),
        },
        Expression::UnaryOp { op, operand } => Expression::UnaryOp {
            op,
            operand: Box::new(f(*operand)),
        },
        Expression::List(elements) => {
            Expression::List(elements.into_iter().map(&mut *f).collect())
        }
        Expression::Dict(entries) => Expression::Dict(
            entries
                .into_iter()
                .map(|(key, value)| (f(key), f(value)))
                .collect(),
        ),
        Expression::OptionValue(value) => {
            Expression::OptionValue(value.map(|inner| Box::new(f(*inner))))
        }
        Expression::Call { name, args } => Expression::Call {
            name,
            args: args.into_iter().map(&mut *f).collect(),
        },
        Expression::MethodCall {
            object,
            method,
            args,
        } => Expression::MethodCall {
            object: Box::new(f(*object)),
            method,
            args: args.into_iter().map(&mut *f).collect(),
        },
        Expression::Attribute { object, name } => Expression::Attribute {
            object: Box::new(f(*object)),
            name,
        },
        Expression::Index { object, index } => Expression::Index {
            object: Box::new(f(*object)),
            index: Box::new(f(*index)),
        },
        Expression::Instantiation { class_name, args } => Expression::Instantiation {
            class_name,
            args: args.into_iter().map(&mut *f).collect(),
        },
        Expression::Lambda { params, body } => Expression::Lambda {
            params,
            body: Box::new(f(*body)),
        },
        Expression::Await(operand) => Expression::Await(Box::new(f(*operand))),
        leaf @ (Expression::Literal(_) | Expression::Identifier(_)) => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;

    pub(super) fn parse(input: &str) -> Vec<Statement> {
        parse_tokens(tokenize(input).expect("tokenize failed")).expect("parse failed")
    }

    #[test]
    fn composed_pipeline_is_idempotent() {
        let input = indoc::indoc! {"
            func uno():
                retorno 1
            fin
            var a = 1 + 2
            var b = a + a
            var c = a + a
            si verdadero:
                imprimir(uno())
            sino:
                imprimir(0)
            fin
        "};
        let once = optimize(parse(input));
        let twice = optimize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn individual_passes_are_idempotent() {
        let statements = parse(indoc::indoc! {"
            var a = 1 + 2
            var b = x + y
            var c = x + y
            mientras verdadero:
                romper
            fin
        "});
        let folded = fold_constants(statements.clone());
        assert_eq!(folded.clone(), fold_constants(folded));

        let hoisted = eliminate_common_subexpressions(statements.clone());
        assert_eq!(
            hoisted.clone(),
            eliminate_common_subexpressions(hoisted)
        );

        let inlined = inline_functions(statements.clone());
        assert_eq!(inlined.clone(), inline_functions(inlined));

        let pruned = remove_dead_code(statements);
        assert_eq!(pruned.clone(), remove_dead_code(pruned));
    }
}
