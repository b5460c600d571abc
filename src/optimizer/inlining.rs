//! Function inlining: a top-level function whose body is a single
//! `retorno <expr>` with no side effects inside the expression is expanded
//! at every call site with matching arity. Definitions left without any
//! reference afterwards are removed from the top-level sequence.

use std::collections::HashMap;

use crate::ast::{Expression, Statement};

use super::{map_block, map_subexpressions};

pub fn inline_functions(statements: Vec<Statement>) -> Vec<Statement> {
    let inlinable = collect_inlinable(&statements);
    if inlinable.is_empty() {
        return statements;
    }

    let mut rewrite = |expression: Expression| inline_expression(expression, &inlinable);
    let statements = map_block(statements, &mut rewrite);

    // Only drop a definition once nothing references it anymore: a call
    // with mismatched arity, or the bare name used as a value, keeps it.
    let mut references: HashMap<&str, usize> =
        inlinable.keys().map(|name| (name.as_str(), 0)).collect();
    for statement in &statements {
        count_statement_references(statement, &mut references);
    }

    statements
        .into_iter()
        .filter(|statement| match statement {
            Statement::FunctionDef { name, .. } => {
                !(inlinable.contains_key(name) && references.get(name.as_str()) == Some(&0))
            }
            _ => true,
        })
        .collect()
}

struct InlinableFunction {
    params: Vec<String>,
    body: Expression,
}

fn collect_inlinable(statements: &[Statement]) -> HashMap<String, InlinableFunction> {
    let mut inlinable = HashMap::new();
    for statement in statements {
        if let Statement::FunctionDef {
            name,
            params,
            decorators,
            body,
            is_async,
            ..
        } = statement
        {
            if *is_async || !decorators.is_empty() {
                continue;
            }
            if let [Statement::Return(Some(expression))] = body.as_slice() {
                if !has_side_effects(expression) {
                    inlinable.insert(
                        name.clone(),
                        InlinableFunction {
                            params: params.clone(),
                            body: expression.clone(),
                        },
                    );
                }
            }
        }
    }
    inlinable
}

/// Anything that could observe or mutate state disqualifies inlining:
/// calls of every kind, awaits, and instantiations.
fn has_side_effects(expression: &Expression) -> bool {
    match expression {
        Expression::Call { .. }
        | Expression::MethodCall { .. }
        | Expression::Instantiation { .. }
        | Expression::Await(_) => true,
        Expression::Literal(_) | Expression::Identifier(_) => false,
        Expression::List(elements) => elements.iter().any(has_side_effects),
        Expression::Dict(entries) => entries
            .iter()
            .any(|(key, value)| has_side_effects(key) || has_side_effects(value)),
        Expression::OptionValue(value) => {
            value.as_ref().is_some_and(|inner| has_side_effects(inner))
        }
        Expression::BinaryOp { left, right, .. } => {
            has_side_effects(left) || has_side_effects(right)
        }
        Expression::UnaryOp { operand, .. } => has_side_effects(operand),
        Expression::Attribute { object, .. } => has_side_effects(object),
        Expression::Index { object, index } => {
            has_side_effects(object) || has_side_effects(index)
        }
        Expression::Lambda { .. } => false,
    }
}

fn inline_expression(
    expression: Expression,
    inlinable: &HashMap<String, InlinableFunction>,
) -> Expression {
    let expression =
        map_subexpressions(expression, &mut |child| inline_expression(child, inlinable));
    if let Expression::Call { name, args } = &expression {
        if let Some(function) = inlinable.get(name) {
            if function.params.len() == args.len() {
                let substitutions: HashMap<&str, &Expression> = function
                    .params
                    .iter()
                    .map(String::as_str)
                    .zip(args.iter())
                    .collect();
                return substitute(function.body.clone(), &substitutions);
            }
        }
    }
    expression
}

fn substitute(expression: Expression, substitutions: &HashMap<&str, &Expression>) -> Expression {
    if let Expression::Identifier(name) = &expression {
        if let Some(replacement) = substitutions.get(name.as_str()) {
            return (*replacement).clone();
        }
    }
    map_subexpressions(expression, &mut |child| substitute(child, substitutions))
}

fn count_statement_references(statement: &Statement, references: &mut HashMap<&str, usize>) {
    crate::optimizer::visit_statement_expressions(statement, &mut |expression| {
        count_expression_references(expression, references);
    });
}

fn count_expression_references(expression: &Expression, references: &mut HashMap<&str, usize>) {
    match expression {
        Expression::Call { name, args } => {
            if let Some(count) = references.get_mut(name.as_str()) {
                *count += 1;
            }
            for arg in args {
                count_expression_references(arg, references);
            }
        }
        Expression::Identifier(name) => {
            if let Some(count) = references.get_mut(name.as_str()) {
                *count += 1;
            }
        }
        Expression::Literal(_) => {}
        Expression::List(elements) => {
            for element in elements {
                count_expression_references(element, references);
            }
        }
        Expression::Dict(entries) => {
            for (key, value) in entries {
                count_expression_references(key, references);
                count_expression_references(value, references);
            }
        }
        Expression::OptionValue(value) => {
            if let Some(inner) = value {
                count_expression_references(inner, references);
            }
        }
        Expression::BinaryOp { left, right, .. } => {
            count_expression_references(left, references);
            count_expression_references(right, references);
        }
        Expression::UnaryOp { operand, .. } => count_expression_references(operand, references),
        Expression::MethodCall { object, args, .. } => {
            count_expression_references(object, references);
            for arg in args {
                count_expression_references(arg, references);
            }
        }
        Expression::Attribute { object, .. } => count_expression_references(object, references),
        Expression::Index { object, index } => {
            count_expression_references(object, references);
            count_expression_references(index, references);
        }
        Expression::Instantiation { args, .. } => {
            for arg in args {
                count_expression_references(arg, references);
            }
        }
        Expression::Lambda { body, .. } => count_expression_references(body, references),
        Expression::Await(operand) => count_expression_references(operand, references),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignTarget, BinaryOperator};
    use crate::optimizer::tests::parse;

    #[test]
    fn inlines_pure_single_return_function_and_removes_it() {
        let statements = inline_functions(parse(indoc::indoc! {"
            func uno():
                retorno 1
            fin
            imprimir(uno())
            imprimir(uno())
        "}));
        assert_eq!(
            statements,
            vec![
                Statement::Print(Expression::int(1)),
                Statement::Print(Expression::int(1)),
            ]
        );
    }

    #[test]
    fn substitutes_parameters_at_each_call_site() {
        let statements = inline_functions(parse(indoc::indoc! {"
            func suma(a, b):
                retorno a + b
            fin
            var x = suma(1, 2)
            var y = suma(x, 10)
        "}));
        assert_eq!(
            statements,
            vec![
                Statement::Assign {
                    target: AssignTarget::Name("x".to_string()),
                    value: Expression::binary(
                        Expression::int(1),
                        BinaryOperator::Add,
                        Expression::int(2)
                    ),
                    inferred: false,
                },
                Statement::Assign {
                    target: AssignTarget::Name("y".to_string()),
                    value: Expression::binary(
                        Expression::identifier("x"),
                        BinaryOperator::Add,
                        Expression::int(10)
                    ),
                    inferred: false,
                },
            ]
        );
    }

    #[test]
    fn a_call_inside_the_body_disqualifies_inlining() {
        let input = indoc::indoc! {"
            func lector():
                retorno leer_archivo('x')
            fin
            imprimir(lector())
        "};
        let statements = inline_functions(parse(input));
        assert_eq!(statements, parse(input));
    }

    #[test]
    fn multi_statement_bodies_are_not_inlined() {
        let input = indoc::indoc! {"
            func f():
                x = 1
                retorno 1
            fin
            imprimir(f())
        "};
        let statements = inline_functions(parse(input));
        assert_eq!(statements, parse(input));
    }

    #[test]
    fn arity_mismatch_keeps_the_definition() {
        let statements = inline_functions(parse(indoc::indoc! {"
            func uno():
                retorno 1
            fin
            imprimir(uno(9))
        "}));
        assert!(statements
            .iter()
            .any(|statement| matches!(statement, Statement::FunctionDef { name, .. } if name == "uno")));
    }

    #[test]
    fn bare_name_reference_keeps_the_definition() {
        let statements = inline_functions(parse(indoc::indoc! {"
            func uno():
                retorno 1
            fin
            var alias = uno
        "}));
        assert!(statements
            .iter()
            .any(|statement| matches!(statement, Statement::FunctionDef { name, .. } if name == "uno")));
    }
}
