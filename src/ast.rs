//! Shared syntax tree for the whole pipeline.
//!
//! The parser builds these nodes once; optimizer passes may rewrite them in
//! place, after which the interpreter and any code-generation backend walk
//! them read-only. Every node owns its children, so a parsed program is a
//! true tree. Serialization is field-exact to make cached artifacts a
//! faithful copy of the in-memory tree.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(BigInt),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    List(Vec<Expression>),
    Dict(Vec<(Expression, Expression)>),
    /// `Some(expr)` / `None`.
    OptionValue(Option<Box<Expression>>),
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Call {
        name: String,
        args: Vec<Expression>,
    },
    MethodCall {
        object: Box<Expression>,
        method: String,
        args: Vec<Expression>,
    },
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    /// Only built when re-parsing foreign syntaxes; Cobra source
    /// instantiates by calling the class name.
    Instantiation {
        class_name: String,
        args: Vec<Expression>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expression>,
    },
    Await(Box<Expression>),
}

/// Assignment target forms accepted by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssignTarget {
    Name(String),
    Attribute {
        object: Expression,
        name: String,
    },
    Index {
        object: Expression,
        index: Expression,
    },
}

/// Switch-case patterns: literals, tuple destructuring, name bindings,
/// and the `_` wildcard. Guards live on the enclosing [`Case`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard,
    Literal(Literal),
    Binding(String),
    Tuple(Vec<Pattern>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub pattern: Pattern,
    pub guard: Option<Expression>,
    pub body: Vec<Statement>,
}

/// Abstract method signature inside an `interface` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Assign {
        target: AssignTarget,
        value: Expression,
        /// `variable nombre := expr` type-inferred form.
        inferred: bool,
    },
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    For {
        variable: String,
        iterable: Expression,
        body: Vec<Statement>,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        type_params: Vec<String>,
        decorators: Vec<Expression>,
        body: Vec<Statement>,
        is_async: bool,
    },
    MethodDef {
        name: String,
        params: Vec<String>,
        type_params: Vec<String>,
        body: Vec<Statement>,
        is_async: bool,
    },
    ClassDef {
        name: String,
        type_params: Vec<String>,
        bases: Vec<String>,
        body: Vec<Statement>,
    },
    InterfaceDef {
        name: String,
        methods: Vec<MethodSignature>,
    },
    EnumDef {
        name: String,
        variants: Vec<String>,
    },
    Return(Option<Expression>),
    Throw(Expression),
    TryCatch {
        try_body: Vec<Statement>,
        exception_name: Option<String>,
        catch_body: Vec<Statement>,
        finally_body: Vec<Statement>,
    },
    Import {
        path: String,
    },
    Use {
        module: String,
    },
    ImportFrom {
        module: String,
        name: String,
        alias: Option<String>,
    },
    Export {
        name: String,
    },
    Print(Expression),
    Break,
    Continue,
    Pass,
    Assert {
        condition: Expression,
        message: Option<Expression>,
    },
    Del {
        target: Expression,
    },
    Global {
        names: Vec<String>,
    },
    NonLocal {
        names: Vec<String>,
    },
    With {
        context: Expression,
        alias: Option<String>,
        body: Vec<Statement>,
    },
    MacroDef {
        name: String,
        body: Vec<Statement>,
    },
    Switch {
        subject: Expression,
        cases: Vec<Case>,
        default: Vec<Statement>,
    },
    Expr(Expression),
}

impl Expression {
    pub fn int(value: impl Into<BigInt>) -> Self {
        Expression::Literal(Literal::Integer(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Bool(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::Str(value.into()))
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier(name.into())
    }

    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_round_trips_field_for_field() {
        let statements = vec![
            Statement::FunctionDef {
                name: "suma".to_string(),
                params: vec!["a".to_string(), "b".to_string()],
                type_params: vec!["T".to_string()],
                decorators: vec![Expression::identifier("memoizar")],
                body: vec![Statement::Return(Some(Expression::binary(
                    Expression::identifier("a"),
                    BinaryOperator::Add,
                    Expression::identifier("b"),
                )))],
                is_async: false,
            },
            Statement::Switch {
                subject: Expression::identifier("x"),
                cases: vec![Case {
                    pattern: Pattern::Tuple(vec![
                        Pattern::Literal(Literal::Integer(1.into())),
                        Pattern::Binding("resto".to_string()),
                    ]),
                    guard: Some(Expression::boolean(true)),
                    body: vec![Statement::Pass],
                }],
                default: vec![Statement::Print(Expression::string("otro"))],
            },
            Statement::Expr(Expression::OptionValue(Some(Box::new(Expression::int(
                7,
            ))))),
        ];

        let encoded = serde_json::to_string(&statements).expect("serialize failed");
        let decoded: Vec<Statement> = serde_json::from_str(&encoded).expect("deserialize failed");
        assert_eq!(decoded, statements);
    }
}
