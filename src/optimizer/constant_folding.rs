//! Constant folding: binary and unary operations whose operands are
//! literals evaluate eagerly. Anything that would fail at runtime
//! (division by zero, mixed types) is left untouched.

use num_traits::{ToPrimitive, Zero};

use crate::ast::{BinaryOperator, Expression, Literal, Statement, UnaryOperator};

use super::{map_block, map_subexpressions};

pub fn fold_constants(statements: Vec<Statement>) -> Vec<Statement> {
    map_block(statements, &mut fold_expression)
}

pub(crate) fn fold_expression(expression: Expression) -> Expression {
    let expression = map_subexpressions(expression, &mut fold_expression);
    match expression {
        Expression::BinaryOp { left, op, right } => {
            if let (Expression::Literal(lhs), Expression::Literal(rhs)) =
                (left.as_ref(), right.as_ref())
            {
                if let Some(folded) = eval_binary(lhs, op, rhs) {
                    return Expression::Literal(folded);
                }
            }
            Expression::BinaryOp { left, op, right }
        }
        Expression::UnaryOp { op, operand } => {
            if let Expression::Literal(value) = operand.as_ref() {
                if let Some(folded) = eval_unary(op, value) {
                    return Expression::Literal(folded);
                }
            }
            Expression::UnaryOp { op, operand }
        }
        other => other,
    }
}

fn eval_binary(lhs: &Literal, op: BinaryOperator, rhs: &Literal) -> Option<Literal> {
    use BinaryOperator::*;
    use Literal::*;

    match (lhs, rhs) {
        (Integer(a), Integer(b)) => match op {
            Add => Some(Integer(a + b)),
            Sub => Some(Integer(a - b)),
            Mul => Some(Integer(a * b)),
            Div => (!b.is_zero()).then(|| Integer(a / b)),
            Mod => (!b.is_zero()).then(|| Integer(a % b)),
            Greater => Some(Bool(a > b)),
            Less => Some(Bool(a < b)),
            GreaterEqual => Some(Bool(a >= b)),
            LessEqual => Some(Bool(a <= b)),
            Equal => Some(Bool(a == b)),
            NotEqual => Some(Bool(a != b)),
            And | Or => None,
        },
        (Float(_), Float(_)) | (Integer(_), Float(_)) | (Float(_), Integer(_)) => {
            let a = literal_f64(lhs)?;
            let b = literal_f64(rhs)?;
            match op {
                Add => Some(Float(a + b)),
                Sub => Some(Float(a - b)),
                Mul => Some(Float(a * b)),
                Div => (b != 0.0).then(|| Float(a / b)),
                Mod => (b != 0.0).then(|| Float(a % b)),
                Greater => Some(Bool(a > b)),
                Less => Some(Bool(a < b)),
                GreaterEqual => Some(Bool(a >= b)),
                LessEqual => Some(Bool(a <= b)),
                Equal => Some(Bool(a == b)),
                NotEqual => Some(Bool(a != b)),
                And | Or => None,
            }
        }
        (Str(a), Str(b)) => match op {
            Add => Some(Str(format!("{a}{b}"))),
            Equal => Some(Bool(a == b)),
            NotEqual => Some(Bool(a != b)),
            _ => None,
        },
        (Bool(a), Bool(b)) => match op {
            And => Some(Bool(*a && *b)),
            Or => Some(Bool(*a || *b)),
            Equal => Some(Bool(a == b)),
            NotEqual => Some(Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

fn eval_unary(op: UnaryOperator, value: &Literal) -> Option<Literal> {
    match (op, value) {
        (UnaryOperator::Not, Literal::Bool(b)) => Some(Literal::Bool(!b)),
        (UnaryOperator::Neg, Literal::Integer(n)) => Some(Literal::Integer(-n)),
        (UnaryOperator::Neg, Literal::Float(f)) => Some(Literal::Float(-f)),
        _ => None,
    }
}

fn literal_f64(literal: &Literal) -> Option<f64> {
    match literal {
        Literal::Integer(n) => n.to_f64(),
        Literal::Float(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AssignTarget;
    use crate::optimizer::tests::parse;

    #[test]
    fn folds_integer_arithmetic() {
        let statements = fold_constants(parse("var x = 1 + 2"));
        assert_eq!(
            statements[0],
            Statement::Assign {
                target: AssignTarget::Name("x".to_string()),
                value: Expression::int(3),
                inferred: false,
            }
        );
    }

    #[test]
    fn folds_boolean_logic() {
        let statements = fold_constants(parse("var x = verdadero && falso"));
        assert_eq!(
            statements[0],
            Statement::Assign {
                target: AssignTarget::Name("x".to_string()),
                value: Expression::boolean(false),
                inferred: false,
            }
        );
    }

    #[test]
    fn folds_nested_operations_bottom_up() {
        let statements = fold_constants(parse("var x = (1 + 2) * (10 - 4)"));
        assert_eq!(
            statements[0],
            Statement::Assign {
                target: AssignTarget::Name("x".to_string()),
                value: Expression::int(18),
                inferred: false,
            }
        );
    }

    #[test]
    fn leaves_division_by_zero_untouched() {
        let statements = fold_constants(parse("var x = 1 / 0"));
        assert_eq!(
            statements[0],
            Statement::Assign {
                target: AssignTarget::Name("x".to_string()),
                value: Expression::binary(
                    Expression::int(1),
                    BinaryOperator::Div,
                    Expression::int(0)
                ),
                inferred: false,
            }
        );
    }

    #[test]
    fn leaves_non_literal_operands_untouched() {
        let statements = fold_constants(parse("var x = a + 2"));
        assert_eq!(
            statements[0],
            Statement::Assign {
                target: AssignTarget::Name("x".to_string()),
                value: Expression::binary(
                    Expression::identifier("a"),
                    BinaryOperator::Add,
                    Expression::int(2)
                ),
                inferred: false,
            }
        );
    }

    #[test]
    fn folds_inside_function_bodies_and_conditions() {
        let statements = fold_constants(parse(indoc::indoc! {"
            func f():
                retorno 2 * 3
            fin
            si 1 < 2:
                pasar
            fin
        "}));
        match &statements[0] {
            Statement::FunctionDef { body, .. } => {
                assert_eq!(body[0], Statement::Return(Some(Expression::int(6))));
            }
            other => panic!("expected function, got {other:?}"),
        }
        match &statements[1] {
            Statement::If { condition, .. } => {
                assert_eq!(condition, &Expression::boolean(true));
            }
            other => panic!("expected conditional, got {other:?}"),
        }
    }

    #[test]
    fn folds_string_concatenation_and_negation() {
        let statements = fold_constants(parse("var s = 'a' + 'b'\nvar n = -(3 + 4)"));
        assert_eq!(
            statements[0],
            Statement::Assign {
                target: AssignTarget::Name("s".to_string()),
                value: Expression::string("ab"),
                inferred: false,
            }
        );
        assert_eq!(
            statements[1],
            Statement::Assign {
                target: AssignTarget::Name("n".to_string()),
                value: Expression::int(-7),
                inferred: false,
            }
        );
    }
}
