//! Common-subexpression elimination.
//!
//! Within each independent scope (the top level, and each function, method,
//! class, or macro body), pure binary subtrees that occur more than once are
//! hoisted into `_cseN` temporaries inserted ahead of the scope body; later
//! occurrences read the temporary. Matching is structural. Lambda bodies are
//! left alone: they run in their own frame and cannot see scope temporaries.

use crate::ast::{Expression, Statement};

pub fn eliminate_common_subexpressions(statements: Vec<Statement>) -> Vec<Statement> {
    process_scope(statements)
}

fn process_scope(statements: Vec<Statement>) -> Vec<Statement> {
    // Nested definition bodies are scopes of their own, with numbering
    // restarting at `_cse0`.
    let statements: Vec<Statement> = statements
        .into_iter()
        .map(|statement| match statement {
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
                decorators,
                body: process_scope(body),
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
                body: process_scope(body),
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
                body: process_scope(body),
            },
            Statement::MacroDef { name, body } => Statement::MacroDef {
                name,
                body: process_scope(body),
            },
            other => other,
        })
        .collect();

    let mut counts: Vec<(Expression, usize)> = Vec::new();
    for statement in &statements {
        visit_scope_expressions(statement, &mut |expression| {
            count_subtrees(expression, &mut counts);
        });
    }
    if !counts.iter().any(|(_, count)| *count > 1) {
        return statements;
    }

    // Each temporary is inserted immediately before the statement holding
    // its first occurrence.
    let mut state = ScopeState::default();
    let mut result = Vec::new();
    for statement in statements {
        let rewritten = map_scope_expressions(statement, &mut |expression| {
            rewrite(&expression, &counts, &mut state)
        });
        result.append(&mut state.hoisted);
        result.push(rewritten);
    }
    result
}

#[derive(Default)]
struct ScopeState {
    /// Original subtree -> temporary name, in hoisting order.
    temps: Vec<(Expression, String)>,
    hoisted: Vec<Statement>,
}

impl ScopeState {
    /// Temporary for `key`, allocating (and hoisting `value`) on first use.
    fn temp_for(&mut self, key: &Expression, value: Expression) -> String {
        if let Some((_, name)) = self.temps.iter().find(|(existing, _)| existing == key) {
            return name.clone();
        }
        let name = format!("_cse{}", self.temps.len());
        self.temps.push((key.clone(), name.clone()));
        self.hoisted.push(Statement::Assign {
            target: crate::ast::AssignTarget::Name(name.clone()),
            value,
            inferred: false,
        });
        name
    }
}

/// Counts every pure binary subtree, descending through the whole
/// expression except lambda bodies.
fn count_subtrees(expression: &Expression, counts: &mut Vec<(Expression, usize)>) {
    if is_pure_binary(expression) {
        match counts.iter_mut().find(|(existing, _)| existing == expression) {
            Some((_, count)) => *count += 1,
            None => counts.push((expression.clone(), 1)),
        }
    }
    match expression {
        Expression::Lambda { .. } | Expression::Literal(_) | Expression::Identifier(_) => {}
        Expression::List(elements) => {
            for element in elements {
                count_subtrees(element, counts);
            }
        }
        Expression::Dict(entries) => {
            for (key, value) in entries {
                count_subtrees(key, counts);
                count_subtrees(value, counts);
            }
        }
        Expression::OptionValue(value) => {
            if let Some(inner) = value {
                count_subtrees(inner, counts);
            }
        }
        Expression::BinaryOp { left, right, .. } => {
            count_subtrees(left, counts);
            count_subtrees(right, counts);
        }
        Expression::UnaryOp { operand, .. } => count_subtrees(operand, counts),
        Expression::Call { args, .. } | Expression::Instantiation { args, .. } => {
            for arg in args {
                count_subtrees(arg, counts);
            }
        }
        Expression::MethodCall { object, args, .. } => {
            count_subtrees(object, counts);
            for arg in args {
                count_subtrees(arg, counts);
            }
        }
        Expression::Attribute { object, .. } => count_subtrees(object, counts),
        Expression::Index { object, index } => {
            count_subtrees(object, counts);
            count_subtrees(index, counts);
        }
        Expression::Await(operand) => count_subtrees(operand, counts),
    }
}

/// Bottom-up rewrite. Lookup uses the node's structure in the *input*
/// tree, while the hoisted value reuses already-rewritten children, so
/// temporaries reference earlier temporaries in dependency order.
fn rewrite(
    expression: &Expression,
    counts: &[(Expression, usize)],
    state: &mut ScopeState,
) -> Expression {
    match expression {
        Expression::BinaryOp { left, op, right } => {
            let new_left = rewrite(left, counts, state);
            let new_right = rewrite(right, counts, state);
            let rebuilt = Expression::BinaryOp {
                left: Box::new(new_left),
                op: *op,
                right: Box::new(new_right),
            };
            if occurrence_count(expression, counts) > 1 {
                let name = state.temp_for(expression, rebuilt);
                return Expression::Identifier(name);
            }
            rebuilt
        }
        Expression::UnaryOp { op, operand } => Expression::UnaryOp {
            op: *op,
            operand: Box::new(rewrite(operand, counts, state)),
        },
        Expression::List(elements) => Expression::List(
            elements
                .iter()
                .map(|element| rewrite(element, counts, state))
                .collect(),
        ),
        Expression::Dict(entries) => Expression::Dict(
            entries
                .iter()
                .map(|(key, value)| (rewrite(key, counts, state), rewrite(value, counts, state)))
                .collect(),
        ),
        Expression::OptionValue(value) => Expression::OptionValue(
            value
                .as_ref()
                .map(|inner| Box::new(rewrite(inner, counts, state))),
        ),
        Expression::Call { name, args } => Expression::Call {
            name: name.clone(),
            args: args.iter().map(|arg| rewrite(arg, counts, state)).collect(),
        },
        Expression::MethodCall {
            object,
            method,
            args,
        } => Expression::MethodCall {
            object: Box::new(rewrite(object, counts, state)),
            method: method.clone(),
            args: args.iter().map(|arg| rewrite(arg, counts, state)).collect(),
        },
        Expression::Attribute { object, name } => Expression::Attribute {
            object: Box::new(rewrite(object, counts, state)),
            name: name.clone(),
        },
        Expression::Index { object, index } => Expression::Index {
            object: Box::new(rewrite(object, counts, state)),
            index: Box::new(rewrite(index, counts, state)),
        },
        Expression::Instantiation { class_name, args } => Expression::Instantiation {
            class_name: class_name.clone(),
            args: args.iter().map(|arg| rewrite(arg, counts, state)).collect(),
        },
        Expression::Await(operand) => {
            Expression::Await(Box::new(rewrite(operand, counts, state)))
        }
        leaf @ (Expression::Literal(_) | Expression::Identifier(_) | Expression::Lambda { .. }) => {
            leaf.clone()
        }
    }
}

fn occurrence_count(expression: &Expression, counts: &[(Expression, usize)]) -> usize {
    counts
        .iter()
        .find(|(existing, _)| existing == expression)
        .map(|(_, count)| *count)
        .unwrap_or(0)
}

fn is_pure_binary(expression: &Expression) -> bool {
    matches!(expression, Expression::BinaryOp { .. }) && is_pure(expression)
}

fn is_pure(expression: &Expression) -> bool {
    match expression {
        Expression::Literal(_) | Expression::Identifier(_) => true,
        Expression::BinaryOp { left, right, .. } => is_pure(left) && is_pure(right),
        Expression::UnaryOp { operand, .. } => is_pure(operand),
        _ => false,
    }
}

/// Applies `f` to this scope's expressions, recursing into control-flow
/// bodies but never into nested definition scopes, wherever they appear.
fn map_scope_expressions(
    statement: Statement,
    f: &mut dyn FnMut(Expression) -> Expression,
) -> Statement {
    match statement {
        nested @ (Statement::FunctionDef { .. }
        | Statement::MethodDef { .. }
        | Statement::ClassDef { .. }
        | Statement::MacroDef { .. }) => nested,
        Statement::If {
            condition,
            then_body,
            else_body,
        } => Statement::If {
            condition: f(condition),
            then_body: map_scope_block(then_body, f),
            else_body: map_scope_block(else_body, f),
        },
        Statement::While { condition, body } => Statement::While {
            condition: f(condition),
            body: map_scope_block(body, f),
        },
        Statement::For {
            variable,
            iterable,
            body,
        } => Statement::For {
            variable,
            iterable: f(iterable),
            body: map_scope_block(body, f),
        },
        Statement::TryCatch {
            try_body,
            exception_name,
            catch_body,
            finally_body,
        } => Statement::TryCatch {
            try_body: map_scope_block(try_body, f),
            exception_name,
            catch_body: map_scope_block(catch_body, f),
            finally_body: map_scope_block(finally_body, f),
        },
        Statement::With {
            context,
            alias,
            body,
        } => Statement::With {
            context: f(context),
            alias,
            body: map_scope_block(body, f),
        },
        Statement::Switch {
            subject,
            cases,
            default,
        } => Statement::Switch {
            subject: f(subject),
            cases: cases
                .into_iter()
                .map(|mut case| {
                    case.guard = case.guard.map(&mut *f);
                    case.body = map_scope_block(case.body, f);
                    case
                })
                .collect(),
            default: map_scope_block(default, f),
        },
        leaf => super::map_statement(leaf, f),
    }
}

fn map_scope_block(
    statements: Vec<Statement>,
    f: &mut dyn FnMut(Expression) -> Expression,
) -> Vec<Statement> {
    statements
        .into_iter()
        .map(|statement| map_scope_expressions(statement, f))
        .collect()
}

fn visit_scope_expressions(statement: &Statement, f: &mut dyn FnMut(&Expression)) {
    match statement {
        Statement::FunctionDef { .. }
        | Statement::MethodDef { .. }
        | Statement::ClassDef { .. }
        | Statement::MacroDef { .. } => {}
        Statement::If {
            condition,
            then_body,
            else_body,
        } => {
            f(condition);
            visit_scope_block(then_body, f);
            visit_scope_block(else_body, f);
        }
        Statement::While { condition, body } => {
            f(condition);
            visit_scope_block(body, f);
        }
        Statement::For {
            iterable, body, ..
        } => {
            f(iterable);
            visit_scope_block(body, f);
        }
        Statement::TryCatch {
            try_body,
            catch_body,
            finally_body,
            ..
        } => {
            visit_scope_block(try_body, f);
            visit_scope_block(catch_body, f);
            visit_scope_block(finally_body, f);
        }
        Statement::With { context, body, .. } => {
            f(context);
            visit_scope_block(body, f);
        }
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
                visit_scope_block(&case.body, f);
            }
            visit_scope_block(default, f);
        }
        leaf => super::visit_statement_expressions(leaf, f),
    }
}

fn visit_scope_block(statements: &[Statement], f: &mut dyn FnMut(&Expression)) {
    for statement in statements {
        visit_scope_expressions(statement, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignTarget, BinaryOperator};
    use crate::optimizer::tests::parse;

    #[test]
    fn hoists_repeated_pure_binary_expression() {
        let statements = eliminate_common_subexpressions(parse(indoc::indoc! {"
            var x = a + b
            var y = a + b
        "}));
        let temp = Expression::binary(
            Expression::identifier("a"),
            BinaryOperator::Add,
            Expression::identifier("b"),
        );
        assert_eq!(
            statements,
            vec![
                Statement::Assign {
                    target: AssignTarget::Name("_cse0".to_string()),
                    value: temp,
                    inferred: false,
                },
                Statement::Assign {
                    target: AssignTarget::Name("x".to_string()),
                    value: Expression::identifier("_cse0"),
                    inferred: false,
                },
                Statement::Assign {
                    target: AssignTarget::Name("y".to_string()),
                    value: Expression::identifier("_cse0"),
                    inferred: false,
                },
            ]
        );
    }

    #[test]
    fn single_occurrences_are_untouched() {
        let input = "var x = a + b\nvar y = a - b";
        assert_eq!(eliminate_common_subexpressions(parse(input)), parse(input));
    }

    #[test]
    fn impure_expressions_are_never_hoisted() {
        let input = indoc::indoc! {"
            var x = f(1) + 2
            var y = f(1) + 2
        "};
        assert_eq!(eliminate_common_subexpressions(parse(input)), parse(input));
    }

    #[test]
    fn function_bodies_are_independent_scopes_with_fresh_numbering() {
        let statements = eliminate_common_subexpressions(parse(indoc::indoc! {"
            var x = a + b
            var y = a + b
            func f():
                var u = c * d
                var v = c * d
                retorno u
            fin
        "}));
        assert!(matches!(
            &statements[0],
            Statement::Assign { target: AssignTarget::Name(name), .. } if name == "_cse0"
        ));
        let function = statements
            .iter()
            .find(|statement| matches!(statement, Statement::FunctionDef { .. }))
            .expect("function kept");
        match function {
            Statement::FunctionDef { body, .. } => {
                assert!(matches!(
                    &body[0],
                    Statement::Assign { target: AssignTarget::Name(name), .. } if name == "_cse0"
                ));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn nested_duplicates_hoist_in_dependency_order() {
        let statements = eliminate_common_subexpressions(parse(indoc::indoc! {"
            var x = a + b
            var y = a + b
            var u = (a + b) * c
            var v = (a + b) * c
        "}));
        // _cse0 = a + b lands before `x`; _cse1 = _cse0 * c before `u`.
        assert!(matches!(
            &statements[0],
            Statement::Assign { target: AssignTarget::Name(name), .. } if name == "_cse0"
        ));
        assert_eq!(
            statements[3],
            Statement::Assign {
                target: AssignTarget::Name("_cse1".to_string()),
                value: Expression::binary(
                    Expression::identifier("_cse0"),
                    BinaryOperator::Mul,
                    Expression::identifier("c"),
                ),
                inferred: false,
            }
        );
        let repeated = eliminate_common_subexpressions(statements.clone());
        assert_eq!(repeated, statements);
    }

    #[test]
    fn counts_duplicates_across_conditional_bodies_in_same_scope() {
        let statements = eliminate_common_subexpressions(parse(indoc::indoc! {"
            si a + b > 0:
                imprimir(a + b)
            fin
        "}));
        assert!(matches!(
            &statements[0],
            Statement::Assign { target: AssignTarget::Name(name), .. } if name == "_cse0"
        ));
    }
}
