//! Dead-code elimination: statements after an unconditional exit are
//! dropped, literal-boolean conditionals collapse to the taken branch, and
//! trivial `mientras` loops lose their wrapper.

use crate::ast::{Expression, Literal, Statement};

pub fn remove_dead_code(statements: Vec<Statement>) -> Vec<Statement> {
    clean_block(statements)
}

fn clean_block(statements: Vec<Statement>) -> Vec<Statement> {
    let mut cleaned = Vec::new();
    for statement in statements {
        for result in clean_statement(statement) {
            let exits = is_exit(&result);
            cleaned.push(result);
            if exits {
                return cleaned;
            }
        }
    }
    cleaned
}

/// Rewrites one statement; collapsing a conditional or loop can splice
/// several statements into the enclosing block.
fn clean_statement(statement: Statement) -> Vec<Statement> {
    match statement {
        Statement::If {
            condition,
            then_body,
            else_body,
        } => {
            let then_body = clean_block(then_body);
            let else_body = clean_block(else_body);
            if let Expression::Literal(Literal::Bool(value)) = condition {
                return if value { then_body } else { else_body };
            }
            vec![Statement::If {
                condition,
                then_body,
                else_body,
            }]
        }
        Statement::While { condition, body } => {
            let body = clean_block(body);
            if let Expression::Literal(Literal::Bool(value)) = condition {
                if !value {
                    return Vec::new();
                }
                // `mientras verdadero` ending in a bare break: keep only the
                // statements ahead of the break. Requires no other
                // loop-level break/continue that would escape the wrapper.
                if matches!(body.last(), Some(Statement::Break)) {
                    let preceding = &body[..body.len() - 1];
                    if !contains_loop_exit(preceding) {
                        return preceding.to_vec();
                    }
                }
            }
            vec![Statement::While { condition, body }]
        }
        Statement::For {
            variable,
            iterable,
            body,
        } => vec![Statement::For {
            variable,
            iterable,
            body: clean_block(body),
        }],
        Statement::FunctionDef {
            name,
            params,
            type_params,
            decorators,
            body,
            is_async,
        } => vec![Statement::FunctionDef {
            name,
            params,
            type_params,
            decorators,
            body: clean_block(body),
            is_async,
        }],
        Statement::MethodDef {
            name,
            params,
            type_params,
            body,
            is_async,
        } => vec![Statement::MethodDef {
            name,
            params,
            type_params,
            body: clean_block(body),
            is_async,
        }],
        Statement::ClassDef {
            name,
            type_params,
            bases,
            body,
        } => vec![Statement::ClassDef {
            name,
            type_params,
            bases,
            body: clean_block(body),
        }],
        Statement::TryCatch {
            try_body,
            exception_name,
            catch_body,
            finally_body,
        } => vec![Statement::TryCatch {
            try_body: clean_block(try_body),
            exception_name,
            catch_body: clean_block(catch_body),
            finally_body: clean_block(finally_body),
        }],
        Statement::With {
            context,
            alias,
            body,
        } => vec![Statement::With {
            context,
            alias,
            body: clean_block(body),
        }],
        Statement::MacroDef { name, body } => vec![Statement::MacroDef {
            name,
            body: clean_block(body),
        }],
        Statement::Switch {
            subject,
            cases,
            default,
        } => vec![Statement::Switch {
            subject,
            cases: cases
                .into_iter()
                .map(|mut case| {
                    case.body = clean_block(case.body);
                    case
                })
                .collect(),
            default: clean_block(default),
        }],
        other => vec![other],
    }
}

/// Whether execution can never continue past this statement.
fn is_exit(statement: &Statement) -> bool {
    match statement {
        Statement::Return(_) | Statement::Break | Statement::Continue | Statement::Throw(_) => {
            true
        }
        Statement::If {
            then_body,
            else_body,
            ..
        } => {
            !then_body.is_empty()
                && !else_body.is_empty()
                && then_body.last().is_some_and(is_exit)
                && else_body.last().is_some_and(is_exit)
        }
        _ => false,
    }
}

/// Looks for a break/continue bound to the current loop level; nested
/// loops own their exits, while conditional and try bodies do not.
fn contains_loop_exit(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Break | Statement::Continue => true,
        Statement::If {
            then_body,
            else_body,
            ..
        } => contains_loop_exit(then_body) || contains_loop_exit(else_body),
        Statement::TryCatch {
            try_body,
            catch_body,
            finally_body,
            ..
        } => {
            contains_loop_exit(try_body)
                || contains_loop_exit(catch_body)
                || contains_loop_exit(finally_body)
        }
        Statement::With { body, .. } => contains_loop_exit(body),
        Statement::Switch { cases, default, .. } => {
            cases.iter().any(|case| contains_loop_exit(&case.body))
                || contains_loop_exit(default)
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AssignTarget;
    use crate::optimizer::tests::parse;

    #[test]
    fn drops_statements_after_return() {
        let statements = remove_dead_code(parse(indoc::indoc! {"
            func f():
                retorno 1
                x = 2
            fin
        "}));
        match &statements[0] {
            Statement::FunctionDef { body, .. } => {
                assert_eq!(body, &vec![Statement::Return(Some(Expression::int(1)))]);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn collapses_literal_conditionals_to_taken_branch() {
        let statements = remove_dead_code(parse(indoc::indoc! {"
            si verdadero:
                imprimir(1)
            sino:
                imprimir(2)
            fin
            si falso:
                imprimir(3)
            sino:
                imprimir(4)
            fin
        "}));
        assert_eq!(
            statements,
            vec![
                Statement::Print(Expression::int(1)),
                Statement::Print(Expression::int(4)),
            ]
        );
    }

    #[test]
    fn removes_while_false_and_unwraps_while_true_with_trailing_break() {
        let statements = remove_dead_code(parse(indoc::indoc! {"
            mientras falso:
                imprimir(1)
            fin
            mientras verdadero:
                x = 1
                romper
            fin
        "}));
        assert_eq!(
            statements,
            vec![Statement::Assign {
                target: AssignTarget::Name("x".to_string()),
                value: Expression::int(1),
                inferred: false,
            }]
        );
    }

    #[test]
    fn keeps_while_true_with_conditional_break_before_the_trailing_one() {
        let statements = remove_dead_code(parse(indoc::indoc! {"
            mientras verdadero:
                si listo:
                    romper
                fin
                romper
            fin
        "}));
        assert!(matches!(statements[0], Statement::While { .. }));
    }

    #[test]
    fn drops_statements_after_break_inside_loop_bodies() {
        let statements = remove_dead_code(parse(indoc::indoc! {"
            mientras activo:
                romper
                imprimir(1)
            fin
        "}));
        match &statements[0] {
            Statement::While { body, .. } => assert_eq!(body, &vec![Statement::Break]),
            other => panic!("expected loop, got {other:?}"),
        }
    }

    #[test]
    fn treats_fully_exiting_conditionals_as_exits() {
        let statements = remove_dead_code(parse(indoc::indoc! {"
            func f(x):
                si x:
                    retorno 1
                sino:
                    retorno 2
                fin
                imprimir('inalcanzable')
            fin
        "}));
        match &statements[0] {
            Statement::FunctionDef { body, .. } => {
                assert_eq!(body.len(), 1);
                assert!(matches!(body[0], Statement::If { .. }));
            }
            other => panic!("expected function, got {other:?}"),
        }
    }
}
