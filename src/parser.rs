use crate::ast::{
    AssignTarget, BinaryOperator, Case, Expression, Literal, MethodSignature, Pattern, Statement,
    UnaryOperator,
};
use crate::keywords::{is_reserved, suggest_keyword};
use crate::token::{Token, TokenKind};

mod error;

pub use error::ParserError;

type ParseResult<T> = Result<T, ParserError>;

/// Recursive-descent parser over a lexed token sequence.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    /// Stacked block diagnostics for the `si`/`mientras` separator/closer
    /// cases; reported joined once the program has been consumed.
    pending: Vec<String>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(Token::kind), Some(TokenKind::Eof)) {
            let (line, column) = tokens
                .last()
                .map(|token| (token.line, token.column))
                .unwrap_or((1, 1));
            tokens.push(Token::new(TokenKind::Eof, line, column));
        }
        Self {
            tokens,
            position: 0,
            pending: Vec::new(),
        }
    }

    pub fn parse(mut self) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            statements.push(self.statement()?);
        }
        if !self.pending.is_empty() {
            return Err(ParserError::new(self.pending.join("\n")));
        }
        Ok(statements)
    }

    // -- Statements ---------------------------------------------------------

    fn statement(&mut self) -> ParseResult<Statement> {
        match self.current_kind() {
            TokenKind::At => self.decorated_function(),
            TokenKind::Async => {
                self.bump();
                if !matches!(self.current_kind(), TokenKind::Func) {
                    return Err(self.error("Se esperaba 'func' después de 'asincronico'"));
                }
                self.function_def(Vec::new(), true)
            }
            TokenKind::Func => self.function_def(Vec::new(), false),
            TokenKind::Class => self.class_def(),
            TokenKind::Interface => self.interface_def(),
            TokenKind::Enum => self.enum_def(),
            TokenKind::Var | TokenKind::VarInfer => self.var_assignment(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Switch => self.switch_statement(),
            TokenKind::Try => self.try_statement(),
            TokenKind::Throw => {
                self.bump();
                Ok(Statement::Throw(self.expression()?))
            }
            TokenKind::Return => {
                self.bump();
                if self.return_value_follows() {
                    Ok(Statement::Return(Some(self.expression()?)))
                } else {
                    Ok(Statement::Return(None))
                }
            }
            TokenKind::Import => {
                self.bump();
                let path = self.expect_string("Se esperaba una ruta de módulo entre comillas")?;
                Ok(Statement::Import { path })
            }
            TokenKind::Use => {
                self.bump();
                let module = self.expect_string("Se esperaba una ruta de módulo entre comillas")?;
                Ok(Statement::Use { module })
            }
            TokenKind::From => self.import_from(),
            TokenKind::Print => self.print_statement(),
            TokenKind::Break => {
                self.bump();
                Ok(Statement::Break)
            }
            TokenKind::Continue => {
                self.bump();
                Ok(Statement::Continue)
            }
            TokenKind::Pass => {
                self.bump();
                Ok(Statement::Pass)
            }
            TokenKind::Assert => {
                self.bump();
                let condition = self.expression()?;
                let message = if matches!(self.current_kind(), TokenKind::Comma) {
                    self.bump();
                    Some(self.expression()?)
                } else {
                    None
                };
                Ok(Statement::Assert { condition, message })
            }
            TokenKind::Del => {
                self.bump();
                Ok(Statement::Del {
                    target: self.expression()?,
                })
            }
            TokenKind::Global => {
                self.bump();
                let names =
                    self.name_list("Se esperaba al menos un identificador después de 'global'")?;
                Ok(Statement::Global { names })
            }
            TokenKind::NonLocal => {
                self.bump();
                let names =
                    self.name_list("Se esperaba al menos un identificador después de 'nolocal'")?;
                Ok(Statement::NonLocal { names })
            }
            TokenKind::With => self.with_statement(),
            TokenKind::Macro => self.macro_def(),
            TokenKind::Await => {
                self.bump();
                let operand = self.expression()?;
                Ok(Statement::Expr(Expression::Await(Box::new(operand))))
            }
            TokenKind::Identifier(name) => {
                // A statement-leading identifier close to a keyword is far
                // more likely a typo than a bare expression statement.
                if let Some(suggestion) = suggest_keyword(name) {
                    return Err(self.error_plain(format!(
                        "Token inesperado. ¿Quiso decir '{suggestion}'?"
                    )));
                }
                self.assignment_or_expression()
            }
            _ => self.assignment_or_expression(),
        }
    }

    fn decorated_function(&mut self) -> ParseResult<Statement> {
        let mut decorators = Vec::new();
        while matches!(self.current_kind(), TokenKind::At) {
            self.bump();
            decorators.push(self.expression()?);
        }
        let is_async = if matches!(self.current_kind(), TokenKind::Async) {
            self.bump();
            true
        } else {
            false
        };
        if !matches!(self.current_kind(), TokenKind::Func) {
            return Err(self.error("Un decorador debe preceder a una función"));
        }
        self.function_def(decorators, is_async)
    }

    fn function_def(
        &mut self,
        decorators: Vec<Expression>,
        is_async: bool,
    ) -> ParseResult<Statement> {
        self.bump(); // 'func'
        let name = self.declaration_name("El nombre de función '{}' es una palabra reservada")?;
        let type_params = self.type_param_list()?;
        self.expect(TokenKind::LParen, "Se esperaba '(' tras el nombre de la función")?;
        let params = self.param_list()?;
        self.expect(TokenKind::RParen, "Se esperaba ')' tras los parámetros")?;
        self.expect(
            TokenKind::Colon,
            "Se esperaba ':' después de la declaración de la función",
        )?;
        let body = self.block(&[TokenKind::End])?;
        self.expect_end(&format!("Se esperaba 'fin' para cerrar la función '{name}'"))?;
        Ok(Statement::FunctionDef {
            name,
            params,
            type_params,
            decorators,
            body,
            is_async,
        })
    }

    fn method_def(&mut self) -> ParseResult<Statement> {
        let is_async = if matches!(self.current_kind(), TokenKind::Async) {
            self.bump();
            true
        } else {
            false
        };
        // Both 'metodo' and 'func' open a method inside a class body.
        self.bump();
        let name = self.declaration_name("El nombre del método '{}' es una palabra reservada")?;
        let type_params = self.type_param_list()?;
        self.expect(TokenKind::LParen, "Se esperaba '(' tras el nombre del método")?;
        let params = self.param_list()?;
        self.expect(TokenKind::RParen, "Se esperaba ')' tras los parámetros")?;
        self.expect(
            TokenKind::Colon,
            "Se esperaba ':' después de la cabecera del método",
        )?;
        let body = self.block(&[TokenKind::End])?;
        self.expect_end("Se esperaba 'fin' para cerrar el método")?;
        Ok(Statement::MethodDef {
            name,
            params,
            type_params,
            body,
            is_async,
        })
    }

    fn class_def(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'clase'
        let name = self.declaration_name("El nombre de clase '{}' es una palabra reservada")?;
        let type_params = self.type_param_list()?;
        let mut bases = Vec::new();
        if matches!(self.current_kind(), TokenKind::LParen) {
            self.bump();
            while !matches!(self.current_kind(), TokenKind::RParen) {
                bases.push(self.expect_identifier("Se esperaba un nombre de clase base")?);
                if matches!(self.current_kind(), TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "Se esperaba ')' tras las clases base")?;
        }
        self.expect(
            TokenKind::Colon,
            "Se esperaba ':' después del encabezado de la clase",
        )?;

        let mut body = Vec::new();
        while !matches!(self.current_kind(), TokenKind::End | TokenKind::Eof) {
            if matches!(
                self.current_kind(),
                TokenKind::Func | TokenKind::Method | TokenKind::Async
            ) {
                body.push(self.method_def()?);
            } else {
                body.push(self.statement()?);
            }
        }
        self.expect_end("Se esperaba 'fin' para cerrar la clase")?;
        Ok(Statement::ClassDef {
            name,
            type_params,
            bases,
            body,
        })
    }

    fn interface_def(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'interface'
        let name = self.declaration_name("El nombre de interfaz '{}' es una palabra reservada")?;
        self.expect(TokenKind::Colon, "Se esperaba ':' después de 'interface'")?;
        let mut methods = Vec::new();
        while matches!(self.current_kind(), TokenKind::Method | TokenKind::Func) {
            self.bump();
            let method_name =
                self.declaration_name("El nombre del método '{}' es una palabra reservada")?;
            self.expect(TokenKind::LParen, "Se esperaba '(' tras el nombre del método")?;
            let params = self.param_list()?;
            self.expect(TokenKind::RParen, "Se esperaba ')' tras los parámetros")?;
            methods.push(MethodSignature {
                name: method_name,
                params,
            });
        }
        self.expect_end("Se esperaba 'fin' para cerrar la interfaz")?;
        Ok(Statement::InterfaceDef { name, methods })
    }

    fn enum_def(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'enum'
        let name = self.declaration_name("El nombre de enum '{}' es una palabra reservada")?;
        self.expect(TokenKind::Colon, "Se esperaba ':' después del nombre del enum")?;
        let mut variants = Vec::new();
        while let TokenKind::Identifier(variant) = self.current_kind() {
            variants.push(variant.clone());
            self.bump();
            if matches!(self.current_kind(), TokenKind::Comma) {
                self.bump();
            }
        }
        self.expect_end("Se esperaba 'fin' para cerrar el enum")?;
        Ok(Statement::EnumDef { name, variants })
    }

    fn var_assignment(&mut self) -> ParseResult<Statement> {
        let inferred = matches!(self.current_kind(), TokenKind::VarInfer);
        self.bump(); // 'var' / 'variable'
        let name = self.declaration_name("El identificador '{}' es una palabra reservada")?;
        if inferred {
            self.expect(TokenKind::InferAssign, "Se esperaba ':=' en la asignación inferida")?;
        } else {
            self.expect(TokenKind::Assign, "Se esperaba '=' en la asignación")?;
        }
        let value = self.expression()?;
        Ok(Statement::Assign {
            target: AssignTarget::Name(name),
            value,
            inferred,
        })
    }

    /// Parses `objetivo = expr`, or falls back to a bare expression
    /// statement when no `=` follows.
    fn assignment_or_expression(&mut self) -> ParseResult<Statement> {
        let expr = self.expression()?;
        if !matches!(self.current_kind(), TokenKind::Assign) {
            return Ok(Statement::Expr(expr));
        }
        self.bump(); // '='
        let target = match expr {
            Expression::Identifier(name) => AssignTarget::Name(name),
            Expression::Attribute { object, name } => AssignTarget::Attribute {
                object: *object,
                name,
            },
            Expression::Index { object, index } => AssignTarget::Index {
                object: *object,
                index: *index,
            },
            _ => return Err(self.error("Objetivo de asignación inválido")),
        };
        let value = self.expression()?;
        Ok(Statement::Assign {
            target,
            value,
            inferred: false,
        })
    }

    fn if_statement(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'si'
        let condition = self.expression()?;
        self.block_separator("Se esperaba ':' después de la condición del 'si'");
        let then_body = self.block(&[TokenKind::Else, TokenKind::End])?;
        let mut else_body = Vec::new();
        if matches!(self.current_kind(), TokenKind::Else) {
            self.bump();
            self.block_separator("Se esperaba ':' después del 'sino'");
            else_body = self.block(&[TokenKind::End])?;
        }
        self.block_closer("Se esperaba 'fin' para cerrar el bloque condicional");
        Ok(Statement::If {
            condition,
            then_body,
            else_body,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'mientras'
        let condition = self.expression()?;
        self.block_separator("Se esperaba ':' después de la condición del bucle 'mientras'");
        let body = self.block(&[TokenKind::End])?;
        self.block_closer("Se esperaba 'fin' para cerrar el bucle 'mientras'");
        Ok(Statement::While { condition, body })
    }

    fn for_statement(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'para'
        let variable = self.expect_identifier("Se esperaba un identificador después de 'para'")?;
        self.expect(
            TokenKind::In,
            "Se esperaba 'in' después del identificador en 'para'",
        )?;
        let iterable = self.expression()?;
        self.expect(TokenKind::Colon, "Se esperaba ':' después del iterable en 'para'")?;
        let body = self.block(&[TokenKind::End])?;
        self.expect_end("Se esperaba 'fin' para cerrar el bucle 'para'")?;
        Ok(Statement::For {
            variable,
            iterable,
            body,
        })
    }

    fn switch_statement(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'switch'
        let subject = self.expression()?;
        self.expect(TokenKind::Colon, "Se esperaba ':' después de 'switch'")?;

        let mut cases = Vec::new();
        while matches!(self.current_kind(), TokenKind::Case) {
            self.bump();
            let pattern = self.pattern()?;
            let guard = if matches!(self.current_kind(), TokenKind::If) {
                self.bump();
                Some(self.expression()?)
            } else {
                None
            };
            self.expect(TokenKind::Colon, "Se esperaba ':' después de 'case'")?;
            let body = self.block(&[TokenKind::Case, TokenKind::Else, TokenKind::End])?;
            cases.push(Case {
                pattern,
                guard,
                body,
            });
        }

        let mut default = Vec::new();
        if matches!(self.current_kind(), TokenKind::Else) {
            self.bump();
            self.expect(TokenKind::Colon, "Se esperaba ':' después de 'sino'")?;
            default = self.block(&[TokenKind::End])?;
        }
        self.expect_end("Se esperaba 'fin' para cerrar el switch")?;
        Ok(Statement::Switch {
            subject,
            cases,
            default,
        })
    }

    fn pattern(&mut self) -> ParseResult<Pattern> {
        match self.current_kind().clone() {
            TokenKind::LParen => {
                self.bump();
                let mut elements = Vec::new();
                if !matches!(self.current_kind(), TokenKind::RParen) {
                    elements.push(self.pattern()?);
                    while matches!(self.current_kind(), TokenKind::Comma) {
                        self.bump();
                        elements.push(self.pattern()?);
                    }
                }
                self.expect(TokenKind::RParen, "Se esperaba ')' para cerrar el patrón")?;
                Ok(Pattern::Tuple(elements))
            }
            TokenKind::Identifier(name) if name == "_" => {
                self.bump();
                Ok(Pattern::Wildcard)
            }
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(Pattern::Binding(name))
            }
            TokenKind::Integer(value) => {
                self.bump();
                Ok(Pattern::Literal(Literal::Integer(value)))
            }
            TokenKind::Float(value) => {
                self.bump();
                Ok(Pattern::Literal(Literal::Float(value)))
            }
            TokenKind::Str(value) => {
                self.bump();
                Ok(Pattern::Literal(Literal::Str(value)))
            }
            TokenKind::Bool(value) => {
                self.bump();
                Ok(Pattern::Literal(Literal::Bool(value)))
            }
            TokenKind::Minus => {
                self.bump();
                match self.current_kind().clone() {
                    TokenKind::Integer(value) => {
                        self.bump();
                        Ok(Pattern::Literal(Literal::Integer(-value)))
                    }
                    TokenKind::Float(value) => {
                        self.bump();
                        Ok(Pattern::Literal(Literal::Float(-value)))
                    }
                    _ => Err(self.error("Se esperaba un literal numérico en el patrón")),
                }
            }
            _ => Err(self.error("Patrón no válido en 'case'")),
        }
    }

    fn try_statement(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'intentar'
        self.expect(TokenKind::Colon, "Se esperaba ':' después de 'try'")?;
        let try_body = self.block(&[TokenKind::Catch, TokenKind::Finally, TokenKind::End])?;

        let mut exception_name = None;
        let mut catch_body = Vec::new();
        if matches!(self.current_kind(), TokenKind::Catch) {
            self.bump();
            if let TokenKind::Identifier(name) = self.current_kind() {
                exception_name = Some(name.clone());
                self.bump();
            }
            self.expect(TokenKind::Colon, "Se esperaba ':' después de 'catch/capturar'")?;
            catch_body = self.block(&[TokenKind::Finally, TokenKind::End])?;
        }

        let mut finally_body = Vec::new();
        if matches!(self.current_kind(), TokenKind::Finally) {
            self.bump();
            self.expect(TokenKind::Colon, "Se esperaba ':' después de 'finalmente'")?;
            finally_body = self.block(&[TokenKind::End])?;
        }
        self.expect_end("Se esperaba 'fin' para cerrar el bloque try/catch")?;
        Ok(Statement::TryCatch {
            try_body,
            exception_name,
            catch_body,
            finally_body,
        })
    }

    fn import_from(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'desde'
        let module = self.expect_string("Se esperaba una ruta de módulo entre comillas")?;
        self.expect(TokenKind::Import, "Se esperaba 'import' después de 'desde'")?;
        let name = self.expect_identifier("Se esperaba un nombre a importar")?;
        let alias = if matches!(self.current_kind(), TokenKind::As) {
            self.bump();
            Some(self.expect_identifier("Se esperaba un alias después de 'como'")?)
        } else {
            None
        };
        Ok(Statement::ImportFrom {
            module,
            name,
            alias,
        })
    }

    fn print_statement(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'imprimir'
        if matches!(self.current_kind(), TokenKind::LParen) {
            self.bump();
            let expr = self.expression()?;
            self.expect(
                TokenKind::RParen,
                "Se esperaba ')' al final de la instrucción 'imprimir'",
            )?;
            Ok(Statement::Print(expr))
        } else {
            Ok(Statement::Print(self.expression()?))
        }
    }

    fn with_statement(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'con'
        let context = self.expression()?;
        let alias = if matches!(self.current_kind(), TokenKind::As) {
            self.bump();
            Some(self.expect_identifier("Se esperaba un identificador luego de 'como'")?)
        } else {
            None
        };
        self.expect(TokenKind::Colon, "Se esperaba ':' después de 'con'")?;
        let body = self.block(&[TokenKind::End])?;
        self.expect_end("Se esperaba 'fin' para cerrar el bloque 'con'")?;
        Ok(Statement::With {
            context,
            alias,
            body,
        })
    }

    /// `macro nombre { … }`: the brace-delimited token block is collected
    /// with tracked depth and re-parsed as a program.
    fn macro_def(&mut self) -> ParseResult<Statement> {
        self.bump(); // 'macro'
        let name = self.declaration_name("El nombre de macro '{}' es una palabra reservada")?;
        self.expect(TokenKind::LBrace, "Se esperaba '{' tras el nombre de la macro")?;
        let mut depth = 1usize;
        let mut collected = Vec::new();
        loop {
            match self.current_kind() {
                TokenKind::Eof => {
                    return Err(self.error("Se esperaba '}' para cerrar la macro"));
                }
                TokenKind::LBrace => {
                    depth += 1;
                    collected.push(self.bump());
                }
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        break;
                    }
                    collected.push(self.bump());
                }
                _ => collected.push(self.bump()),
            }
        }
        let body = Parser::new(collected).parse()?;
        Ok(Statement::MacroDef { name, body })
    }

    fn block(&mut self, terminators: &[TokenKind]) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            let current = self.current_kind();
            if matches!(current, TokenKind::Eof) || terminators.contains(current) {
                return Ok(statements);
            }
            statements.push(self.statement()?);
        }
    }

    // -- Expressions --------------------------------------------------------

    fn expression(&mut self) -> ParseResult<Expression> {
        self.or_expression()
    }

    fn or_expression(&mut self) -> ParseResult<Expression> {
        let mut node = self.and_expression()?;
        while matches!(self.current_kind(), TokenKind::OrOr) {
            self.bump();
            let right = self.and_expression()?;
            node = Expression::binary(node, BinaryOperator::Or, right);
        }
        Ok(node)
    }

    fn and_expression(&mut self) -> ParseResult<Expression> {
        let mut node = self.equality()?;
        while matches!(self.current_kind(), TokenKind::AndAnd) {
            self.bump();
            let right = self.equality()?;
            node = Expression::binary(node, BinaryOperator::And, right);
        }
        Ok(node)
    }

    fn equality(&mut self) -> ParseResult<Expression> {
        let mut node = self.comparison()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };
            self.bump();
            let right = self.comparison()?;
            node = Expression::binary(node, op, right);
        }
        Ok(node)
    }

    /// Relational operators. `a < b < c` normalizes into the conjunction
    /// `(a < b) && (b < c)`, associated to the left.
    fn comparison(&mut self) -> ParseResult<Expression> {
        let first = self.addition()?;
        let mut links: Vec<(BinaryOperator, Expression)> = Vec::new();
        loop {
            let op = match self.current_kind() {
                TokenKind::Greater => BinaryOperator::Greater,
                TokenKind::Less => BinaryOperator::Less,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                _ => break,
            };
            self.bump();
            links.push((op, self.addition()?));
        }

        match links.len() {
            0 => Ok(first),
            1 => {
                let (op, right) = links.into_iter().next().expect("one comparison link");
                Ok(Expression::binary(first, op, right))
            }
            _ => {
                let mut operands = vec![first];
                let mut ops = Vec::new();
                for (op, operand) in links {
                    ops.push(op);
                    operands.push(operand);
                }
                let mut conjunction: Option<Expression> = None;
                for (i, op) in ops.into_iter().enumerate() {
                    let pair = Expression::binary(
                        operands[i].clone(),
                        op,
                        operands[i + 1].clone(),
                    );
                    conjunction = Some(match conjunction {
                        None => pair,
                        Some(left) => Expression::binary(left, BinaryOperator::And, pair),
                    });
                }
                Ok(conjunction.expect("at least two comparison links"))
            }
        }
    }

    fn addition(&mut self) -> ParseResult<Expression> {
        let mut node = self.multiplication()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.bump();
            let right = self.multiplication()?;
            node = Expression::binary(node, op, right);
        }
        Ok(node)
    }

    fn multiplication(&mut self) -> ParseResult<Expression> {
        let mut node = self.unary()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => break,
            };
            self.bump();
            let right = self.unary()?;
            node = Expression::binary(node, op, right);
        }
        Ok(node)
    }

    fn unary(&mut self) -> ParseResult<Expression> {
        match self.current_kind() {
            TokenKind::Not => {
                self.bump();
                let operand = self.unary()?;
                Ok(Expression::UnaryOp {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Minus => {
                self.bump();
                let operand = self.unary()?;
                Ok(Expression::UnaryOp {
                    op: UnaryOperator::Neg,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Await => {
                self.bump();
                let operand = self.unary()?;
                Ok(Expression::Await(Box::new(operand)))
            }
            _ => self.postfix(),
        }
    }

    /// Dotted attribute access, method calls, and indexing chained onto a
    /// primary term.
    fn postfix(&mut self) -> ParseResult<Expression> {
        let mut node = self.term()?;
        loop {
            match self.current_kind() {
                TokenKind::Dot => {
                    self.bump();
                    let name = self.expect_identifier("Se esperaba el nombre del atributo")?;
                    if matches!(self.current_kind(), TokenKind::LParen) {
                        self.bump();
                        let args = self.argument_list()?;
                        node = Expression::MethodCall {
                            object: Box::new(node),
                            method: name,
                            args,
                        };
                    } else {
                        node = Expression::Attribute {
                            object: Box::new(node),
                            name,
                        };
                    }
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket, "Se esperaba ']' tras el índice")?;
                    node = Expression::Index {
                        object: Box::new(node),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    fn term(&mut self) -> ParseResult<Expression> {
        match self.current_kind().clone() {
            TokenKind::Integer(value) => {
                self.bump();
                Ok(Expression::Literal(Literal::Integer(value)))
            }
            TokenKind::Float(value) => {
                self.bump();
                Ok(Expression::Literal(Literal::Float(value)))
            }
            TokenKind::Str(value) => {
                self.bump();
                Ok(Expression::Literal(Literal::Str(value)))
            }
            TokenKind::Bool(value) => {
                self.bump();
                Ok(Expression::Literal(Literal::Bool(value)))
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "Se esperaba ')' para cerrar la expresión")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.bump();
                let mut elements = Vec::new();
                if !matches!(self.current_kind(), TokenKind::RBracket) {
                    elements.push(self.expression()?);
                    while matches!(self.current_kind(), TokenKind::Comma) {
                        self.bump();
                        elements.push(self.expression()?);
                    }
                }
                self.expect(TokenKind::RBracket, "Se esperaba ']' para cerrar la lista")?;
                Ok(Expression::List(elements))
            }
            TokenKind::LBrace => {
                self.bump();
                let mut entries = Vec::new();
                if !matches!(self.current_kind(), TokenKind::RBrace) {
                    loop {
                        let key = self.expression()?;
                        self.expect(TokenKind::Colon, "Se esperaba ':' entre clave y valor")?;
                        let value = self.expression()?;
                        entries.push((key, value));
                        if matches!(self.current_kind(), TokenKind::Comma) {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBrace, "Se esperaba '}' para cerrar el diccionario")?;
                Ok(Expression::Dict(entries))
            }
            TokenKind::Lambda => {
                self.bump();
                let mut params = Vec::new();
                while let TokenKind::Identifier(param) = self.current_kind() {
                    params.push(param.clone());
                    self.bump();
                    if matches!(self.current_kind(), TokenKind::Comma) {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::Colon, "Se esperaba ':' en la expresión lambda")?;
                let body = self.expression()?;
                Ok(Expression::Lambda {
                    params,
                    body: Box::new(body),
                })
            }
            TokenKind::Identifier(name) if name == "Some" => {
                self.bump();
                self.expect(TokenKind::LParen, "Se esperaba '(' después de 'Some'")?;
                let value = self.expression()?;
                self.expect(TokenKind::RParen, "Se esperaba ')' para cerrar 'Some'")?;
                Ok(Expression::OptionValue(Some(Box::new(value))))
            }
            TokenKind::Identifier(name) if name == "None" => {
                self.bump();
                Ok(Expression::OptionValue(None))
            }
            TokenKind::Identifier(name) => {
                self.bump();
                if matches!(self.current_kind(), TokenKind::LParen) {
                    self.bump();
                    let args = self.argument_list()?;
                    Ok(Expression::Call { name, args })
                } else {
                    Ok(Expression::Identifier(name))
                }
            }
            other => Err(self.error(format!("Token inesperado en término: {other}"))),
        }
    }

    fn argument_list(&mut self) -> ParseResult<Vec<Expression>> {
        let mut args = Vec::new();
        if !matches!(self.current_kind(), TokenKind::RParen) {
            args.push(self.expression()?);
            while matches!(self.current_kind(), TokenKind::Comma) {
                self.bump();
                args.push(self.expression()?);
            }
        }
        self.expect(TokenKind::RParen, "Se esperaba ')' tras los argumentos")?;
        Ok(args)
    }

    fn param_list(&mut self) -> ParseResult<Vec<String>> {
        let mut params: Vec<String> = Vec::new();
        loop {
            match self.current_kind() {
                TokenKind::Identifier(name) => {
                    if is_reserved(name) {
                        return Err(self.error_plain(format!(
                            "El nombre del parámetro '{name}' es una palabra reservada"
                        )));
                    }
                    if params.iter().any(|existing| existing == name) {
                        return Err(self.error_plain(format!(
                            "El parámetro '{name}' ya está definido"
                        )));
                    }
                    params.push(name.clone());
                    self.bump();
                    if matches!(self.current_kind(), TokenKind::Comma) {
                        self.bump();
                    } else {
                        break;
                    }
                }
                kind => {
                    if let Some(word) = keyword_text(kind) {
                        return Err(self.error_plain(format!(
                            "El nombre del parámetro '{word}' es una palabra reservada"
                        )));
                    }
                    break;
                }
            }
        }
        Ok(params)
    }

    /// Optional `<T, U>` generic suffix on declarations.
    fn type_param_list(&mut self) -> ParseResult<Vec<String>> {
        let mut params = Vec::new();
        if matches!(self.current_kind(), TokenKind::Less) {
            self.bump();
            while !matches!(self.current_kind(), TokenKind::Greater) {
                params.push(
                    self.expect_identifier("Se esperaba un nombre de parámetro de tipo")?,
                );
                if matches!(self.current_kind(), TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            self.expect(
                TokenKind::Greater,
                "Se esperaba '>' para cerrar los parámetros de tipo",
            )?;
        }
        Ok(params)
    }

    fn name_list(&mut self, missing: &str) -> ParseResult<Vec<String>> {
        let mut names = Vec::new();
        while let TokenKind::Identifier(name) = self.current_kind() {
            names.push(name.clone());
            self.bump();
            if matches!(self.current_kind(), TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        if names.is_empty() {
            return Err(self.error(missing));
        }
        Ok(names)
    }

    // -- Token plumbing -----------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        self.current().kind()
    }

    fn at_eof(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn bump(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if *self.current_kind() == kind {
            Ok(self.bump())
        } else {
            Err(self.error(message))
        }
    }

    fn expect_end(&mut self, message: &str) -> ParseResult<()> {
        self.expect(TokenKind::End, message).map(|_| ())
    }

    fn expect_identifier(&mut self, message: &str) -> ParseResult<String> {
        match self.current_kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.error(message)),
        }
    }

    fn expect_string(&mut self, message: &str) -> ParseResult<String> {
        match self.current_kind() {
            TokenKind::Str(value) => {
                let value = value.clone();
                self.bump();
                Ok(value)
            }
            _ => Err(self.error(message)),
        }
    }

    /// Reads a declaration name, rejecting reserved words with the given
    /// message template (`{}` is replaced by the keyword). Words reserved
    /// for future use lex as identifiers but are rejected here too.
    fn declaration_name(&mut self, reserved_template: &str) -> ParseResult<String> {
        match self.current_kind() {
            TokenKind::Identifier(name) => {
                if is_reserved(name) {
                    return Err(
                        self.error_plain(reserved_template.replacen("{}", name, 1))
                    );
                }
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            kind => {
                if let Some(word) = keyword_text(kind) {
                    Err(self.error_plain(reserved_template.replacen("{}", word, 1)))
                } else {
                    Err(self.error("Se esperaba un identificador"))
                }
            }
        }
    }

    /// Missing-`:` fragment for the stacked `si`/`mientras` diagnostics.
    fn block_separator(&mut self, message: &str) {
        if matches!(self.current_kind(), TokenKind::Colon) {
            self.bump();
        } else {
            self.pending.push(message.to_string());
        }
    }

    /// Missing-`fin` fragment for the stacked `si`/`mientras` diagnostics.
    fn block_closer(&mut self, message: &str) {
        if matches!(self.current_kind(), TokenKind::End) {
            self.bump();
        } else {
            self.pending.push(message.to_string());
        }
    }

    fn return_value_follows(&self) -> bool {
        !matches!(
            self.current_kind(),
            TokenKind::Eof
                | TokenKind::End
                | TokenKind::Else
                | TokenKind::Case
                | TokenKind::Catch
                | TokenKind::Finally
        )
    }

    fn error(&self, message: impl Into<String>) -> ParserError {
        let token = self.current().clone();
        let message = message.into();
        ParserError::at(
            format!(
                "{message}, pero se encontró {} en línea {}, columna {}",
                token.kind, token.line, token.column
            ),
            token,
        )
    }

    /// An error that stands on its own, without the "pero se encontró"
    /// suffix (reserved words, typo suggestions, duplicate parameters).
    fn error_plain(&self, message: impl Into<String>) -> ParserError {
        ParserError::at(message.into(), self.current().clone())
    }
}

/// Canonical keyword text for reserved-word diagnostics.
fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    let word = match kind {
        TokenKind::Var => "var",
        TokenKind::VarInfer => "variable",
        TokenKind::Func => "func",
        TokenKind::Method => "metodo",
        TokenKind::Class => "clase",
        TokenKind::Interface => "interface",
        TokenKind::Enum => "enum",
        TokenKind::If => "si",
        TokenKind::Else => "sino",
        TokenKind::While => "mientras",
        TokenKind::For => "para",
        TokenKind::In => "in",
        TokenKind::Import => "import",
        TokenKind::Use => "usar",
        TokenKind::From => "desde",
        TokenKind::As => "como",
        TokenKind::Print => "imprimir",
        TokenKind::Return => "retorno",
        TokenKind::End => "fin",
        TokenKind::Try => "intentar",
        TokenKind::Catch => "capturar",
        TokenKind::Throw => "lanzar",
        TokenKind::Finally => "finalmente",
        TokenKind::Break => "romper",
        TokenKind::Continue => "continuar",
        TokenKind::Pass => "pasar",
        TokenKind::Assert => "afirmar",
        TokenKind::Del => "eliminar",
        TokenKind::Global => "global",
        TokenKind::NonLocal => "nolocal",
        TokenKind::Lambda => "lambda",
        TokenKind::With => "con",
        TokenKind::Switch => "switch",
        TokenKind::Case => "case",
        TokenKind::Macro => "macro",
        TokenKind::Async => "asincronico",
        TokenKind::Await => "esperar",
        TokenKind::Bool(true) => "verdadero",
        TokenKind::Bool(false) => "falso",
        _ => return None,
    };
    Some(word)
}

pub fn parse_tokens(tokens: Vec<Token>) -> Result<Vec<Statement>, ParserError> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use indoc::indoc;

    fn parse(input: &str) -> Result<Vec<Statement>, ParserError> {
        parse_tokens(tokenize(input).expect("tokenize failed"))
    }

    fn parse_ok(input: &str) -> Vec<Statement> {
        parse(input).expect("parse failed")
    }

    #[test]
    fn parses_function_and_call() {
        let input = indoc! {"
            func doble(x):
                retorno x + x
            fin
            imprimir(doble(4))
        "};
        let expected = vec![
            Statement::FunctionDef {
                name: "doble".to_string(),
                params: vec!["x".to_string()],
                type_params: vec![],
                decorators: vec![],
                body: vec![Statement::Return(Some(Expression::binary(
                    Expression::identifier("x"),
                    BinaryOperator::Add,
                    Expression::identifier("x"),
                )))],
                is_async: false,
            },
            Statement::Print(Expression::Call {
                name: "doble".to_string(),
                args: vec![Expression::int(4)],
            }),
        ];
        assert_eq!(parse_ok(input), expected);
    }

    #[test]
    fn rejects_reserved_declaration_names() {
        let err = parse("var fin = 1").expect_err("expected reserved-word error");
        assert!(err.message.contains("'fin' es una palabra reservada"));

        let err = parse("func lambda():\npasar\nfin").expect_err("expected reserved-word error");
        assert!(err.message.contains("'lambda' es una palabra reservada"));
    }

    #[test]
    fn suggests_closest_keyword_for_leading_typo() {
        let err = parse("imprimer(1)").expect_err("expected suggestion error");
        assert!(err.message.contains("¿Quiso decir 'imprimir'?"), "{}", err.message);
    }

    #[test]
    fn stacks_separator_and_closer_diagnostics() {
        let err = parse("mientras x\nimprimir(x)").expect_err("expected stacked diagnostics");
        assert!(err
            .message
            .contains("Se esperaba ':' después de la condición del bucle 'mientras'"));
        assert!(err
            .message
            .contains("Se esperaba 'fin' para cerrar el bucle 'mientras'"));
    }

    #[test]
    fn parses_generic_type_parameters() {
        let statements = parse_ok("func identidad<T, U>(x):\nretorno x\nfin");
        match &statements[0] {
            Statement::FunctionDef { type_params, .. } => {
                assert_eq!(type_params, &vec!["T".to_string(), "U".to_string()]);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn captures_decorators_left_to_right() {
        let input = indoc! {"
            @registrar
            @medir
            func f():
                pasar
            fin
        "};
        match &parse_ok(input)[0] {
            Statement::FunctionDef { decorators, .. } => {
                assert_eq!(
                    decorators,
                    &vec![
                        Expression::identifier("registrar"),
                        Expression::identifier("medir"),
                    ]
                );
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn normalizes_chained_comparisons_into_conjunction() {
        let statements = parse_ok("imprimir(a < b < c)");
        let expected = Expression::binary(
            Expression::binary(
                Expression::identifier("a"),
                BinaryOperator::Less,
                Expression::identifier("b"),
            ),
            BinaryOperator::And,
            Expression::binary(
                Expression::identifier("b"),
                BinaryOperator::Less,
                Expression::identifier("c"),
            ),
        );
        assert_eq!(statements[0], Statement::Print(expected));
    }

    #[test]
    fn parses_switch_with_patterns_and_guard() {
        let input = indoc! {"
            switch punto:
            case (0, 0):
                imprimir('origen')
            case (x, y) si x == y:
                imprimir('diagonal')
            case _:
                pasar
            sino:
                imprimir('otro')
            fin
        "};
        match &parse_ok(input)[0] {
            Statement::Switch { cases, default, .. } => {
                assert_eq!(cases.len(), 3);
                assert_eq!(
                    cases[0].pattern,
                    Pattern::Tuple(vec![
                        Pattern::Literal(Literal::Integer(0.into())),
                        Pattern::Literal(Literal::Integer(0.into())),
                    ])
                );
                assert!(cases[0].guard.is_none());
                assert_eq!(
                    cases[1].pattern,
                    Pattern::Tuple(vec![
                        Pattern::Binding("x".to_string()),
                        Pattern::Binding("y".to_string()),
                    ])
                );
                assert!(cases[1].guard.is_some());
                assert_eq!(cases[2].pattern, Pattern::Wildcard);
                assert_eq!(default.len(), 1);
            }
            other => panic!("expected switch, got {other:?}"),
        }
    }

    #[test]
    fn parses_try_catch_finally() {
        let input = indoc! {"
            intentar:
                lanzar 'falla'
            capturar e:
                imprimir(e)
            finalmente:
                imprimir('listo')
            fin
        "};
        match &parse_ok(input)[0] {
            Statement::TryCatch {
                exception_name,
                catch_body,
                finally_body,
                ..
            } => {
                assert_eq!(exception_name.as_deref(), Some("e"));
                assert_eq!(catch_body.len(), 1);
                assert_eq!(finally_body.len(), 1);
            }
            other => panic!("expected try/catch, got {other:?}"),
        }
    }

    #[test]
    fn parses_imports_and_aliases() {
        let statements = parse_ok(indoc! {"
            import 'modulos/util.co'
            usar 'matematicas'
            desde 'geometria' import area como superficie
        "});
        assert_eq!(
            statements,
            vec![
                Statement::Import {
                    path: "modulos/util.co".to_string()
                },
                Statement::Use {
                    module: "matematicas".to_string()
                },
                Statement::ImportFrom {
                    module: "geometria".to_string(),
                    name: "area".to_string(),
                    alias: Some("superficie".to_string()),
                },
            ]
        );
    }

    #[test]
    fn parses_lambda_option_and_collections() {
        let statements = parse_ok(indoc! {"
            var f = lambda a, b: a + b
            var alguno = Some(3)
            var nada = None
            var xs = [1, 2]
            var d = {'clave': 1}
        "});
        match &statements[0] {
            Statement::Assign { value, .. } => {
                assert!(matches!(value, Expression::Lambda { params, .. } if params.len() == 2));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
        match &statements[1] {
            Statement::Assign { value, .. } => {
                assert_eq!(
                    value,
                    &Expression::OptionValue(Some(Box::new(Expression::int(3))))
                );
            }
            other => panic!("expected assignment, got {other:?}"),
        }
        match &statements[2] {
            Statement::Assign { value, .. } => {
                assert_eq!(value, &Expression::OptionValue(None));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn parses_attribute_and_index_assignment_targets() {
        let statements = parse_ok(indoc! {"
            p.x = 3
            xs[0] = 1
        "});
        assert!(matches!(
            &statements[0],
            Statement::Assign {
                target: AssignTarget::Attribute { .. },
                ..
            }
        ));
        assert!(matches!(
            &statements[1],
            Statement::Assign {
                target: AssignTarget::Index { .. },
                ..
            }
        ));
    }

    #[test]
    fn parses_class_with_bases_and_methods() {
        let input = indoc! {"
            clase Punto(Base):
                metodo inicializar(self, x):
                    self.x = x
                fin
                func mover(self, dx):
                    self.x = self.x + dx
                fin
            fin
        "};
        match &parse_ok(input)[0] {
            Statement::ClassDef { name, bases, body, .. } => {
                assert_eq!(name, "Punto");
                assert_eq!(bases, &vec!["Base".to_string()]);
                assert_eq!(body.len(), 2);
                assert!(matches!(body[0], Statement::MethodDef { .. }));
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn parses_macro_body_as_program() {
        let statements = parse_ok("macro saluda { imprimir('hola') }");
        match &statements[0] {
            Statement::MacroDef { name, body } => {
                assert_eq!(name, "saluda");
                assert_eq!(body, &vec![Statement::Print(Expression::string("hola"))]);
            }
            other => panic!("expected macro, got {other:?}"),
        }
    }

    #[test]
    fn parses_inferred_assignment() {
        let statements = parse_ok("variable x := 5");
        assert_eq!(
            statements[0],
            Statement::Assign {
                target: AssignTarget::Name("x".to_string()),
                value: Expression::int(5),
                inferred: true,
            }
        );
    }

    #[test]
    fn unexpected_token_reports_position() {
        let err = parse("var x = )").expect_err("expected term error");
        assert!(err.message.contains("línea 1"));
        assert!(err.token.is_some());
    }
}
