use std::{iter::Peekable, str::CharIndices};

use num_bigint::BigInt;

use crate::token::{Token, TokenKind};

mod error;

pub use error::LexerError;

/// Saved cursor position, used by the parser for speculative consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerState {
    cursor: usize,
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    cursor: usize,
    lexed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
            tokens: Vec::new(),
            cursor: 0,
            lexed: false,
        }
    }

    /// Scans the whole input into a token sequence ending in `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        self.ensure_lexed()?;
        Ok(self.tokens.clone())
    }

    // -- Cursor API over the lexed buffer -----------------------------------

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<Token>, LexerError> {
        self.ensure_lexed()?;
        Ok(self.tokens.get(self.cursor).cloned())
    }

    /// Consumes and returns the next token.
    pub fn advance(&mut self) -> Result<Option<Token>, LexerError> {
        self.ensure_lexed()?;
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        Ok(token)
    }

    /// Steps the cursor back one token.
    pub fn pushback(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn save_state(&self) -> LexerState {
        LexerState {
            cursor: self.cursor,
        }
    }

    pub fn restore_state(&mut self, state: LexerState) {
        self.cursor = state.cursor;
    }

    pub fn has_more(&mut self) -> Result<bool, LexerError> {
        self.ensure_lexed()?;
        Ok(self.cursor < self.tokens.len())
    }

    fn ensure_lexed(&mut self) -> Result<(), LexerError> {
        if self.lexed {
            return Ok(());
        }
        let mut tokens = Vec::new();
        while let Some(token) = self.scan_token()? {
            tokens.push(token);
        }
        tokens.push(Token::new(TokenKind::Eof, self.line, self.column));
        self.tokens = tokens;
        self.lexed = true;
        Ok(())
    }

    // -- Scanner ------------------------------------------------------------

    fn scan_token(&mut self) -> Result<Option<Token>, LexerError> {
        self.skip_trivia()?;

        let (start_idx, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => return Ok(None),
        };
        let line = self.line;
        let column = self.column;

        let kind = match ch {
            '"' | '\'' => return self.scan_string(ch, line, column).map(Some),
            c if c.is_alphabetic() || c == '_' => {
                return Ok(Some(self.scan_identifier(start_idx, line, column)));
            }
            c if c.is_ascii_digit() => return Ok(Some(self.scan_number(start_idx, line, column))),
            '>' => {
                self.advance_char();
                if self.peek_char() == Some('=') {
                    self.advance_char();
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '<' => {
                self.advance_char();
                if self.peek_char() == Some('=') {
                    self.advance_char();
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '=' => {
                self.advance_char();
                if self.peek_char() == Some('=') {
                    self.advance_char();
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                self.advance_char();
                if self.peek_char() == Some('=') {
                    self.advance_char();
                    TokenKind::NotEqual
                } else {
                    TokenKind::Not
                }
            }
            ':' => {
                self.advance_char();
                if self.peek_char() == Some('=') {
                    self.advance_char();
                    TokenKind::InferAssign
                } else {
                    TokenKind::Colon
                }
            }
            '&' => {
                self.advance_char();
                if self.peek_char() == Some('&') {
                    self.advance_char();
                    TokenKind::AndAnd
                } else {
                    return Err(LexerError::InvalidToken { line, column });
                }
            }
            '|' => {
                self.advance_char();
                if self.peek_char() == Some('|') {
                    self.advance_char();
                    TokenKind::OrOr
                } else {
                    return Err(LexerError::InvalidToken { line, column });
                }
            }
            '+' => {
                self.advance_char();
                TokenKind::Plus
            }
            '-' => {
                self.advance_char();
                TokenKind::Minus
            }
            '*' => {
                self.advance_char();
                TokenKind::Star
            }
            '/' => {
                self.advance_char();
                TokenKind::Slash
            }
            '%' => {
                self.advance_char();
                TokenKind::Percent
            }
            '(' => {
                self.advance_char();
                TokenKind::LParen
            }
            ')' => {
                self.advance_char();
                TokenKind::RParen
            }
            '{' => {
                self.advance_char();
                TokenKind::LBrace
            }
            '}' => {
                self.advance_char();
                TokenKind::RBrace
            }
            '[' => {
                self.advance_char();
                TokenKind::LBracket
            }
            ']' => {
                self.advance_char();
                TokenKind::RBracket
            }
            ',' => {
                self.advance_char();
                TokenKind::Comma
            }
            '.' => {
                self.advance_char();
                TokenKind::Dot
            }
            '@' => {
                self.advance_char();
                TokenKind::At
            }
            _ => return Err(LexerError::InvalidToken { line, column }),
        };

        Ok(Some(Token::new(kind, line, column)))
    }

    /// Skips whitespace plus line and nested block comments.
    fn skip_trivia(&mut self) -> Result<(), LexerError> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance_char();
                }
                Some('#') => self.skip_line_comment(),
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some(&(_, '/')) => self.skip_line_comment(),
                        Some(&(_, '*')) => self.skip_block_comment()?,
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexerError> {
        let line = self.line;
        let column = self.column;
        self.advance_char(); // '/'
        self.advance_char(); // '*'
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek_char() {
                Some('/') => {
                    self.advance_char();
                    if self.peek_char() == Some('*') {
                        self.advance_char();
                        depth += 1;
                    }
                }
                Some('*') => {
                    self.advance_char();
                    if self.peek_char() == Some('/') {
                        self.advance_char();
                        depth -= 1;
                    }
                }
                Some(_) => {
                    self.advance_char();
                }
                None => return Err(LexerError::UnclosedBlockComment { line, column }),
            }
        }
        Ok(())
    }

    fn scan_identifier(&mut self, start: usize, line: usize, column: usize) -> Token {
        self.advance_char();
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }
        let end = self.current_index();
        let ident = &self.input[start..end];
        let kind = keyword_kind(ident).unwrap_or_else(|| TokenKind::Identifier(ident.to_string()));
        Token::new(kind, line, column)
    }

    fn scan_number(&mut self, start: usize, line: usize, column: usize) -> Token {
        self.advance_char();
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.advance_char();
        }

        // A '.' only extends the literal when a digit follows; `1.metodo()`
        // keeps the dot as its own token.
        let mut is_float = false;
        if self.peek_char() == Some('.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some(&(_, c)) if c.is_ascii_digit()) {
                is_float = true;
                self.advance_char();
                while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                    self.advance_char();
                }
            }
        }

        let end = self.current_index();
        let text = &self.input[start..end];
        let kind = if is_float {
            TokenKind::Float(text.parse().expect("digit-only float literal"))
        } else {
            TokenKind::Integer(text.parse::<BigInt>().expect("digit-only integer literal"))
        };
        Token::new(kind, line, column)
    }

    fn scan_string(
        &mut self,
        quote: char,
        line: usize,
        column: usize,
    ) -> Result<Token, LexerError> {
        self.advance_char(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_char() {
                Some(c) if c == quote => {
                    self.advance_char();
                    return Ok(Token::new(TokenKind::Str(value), line, column));
                }
                Some('\\') => {
                    self.advance_char();
                    match self.peek_char() {
                        Some(escaped) => {
                            self.advance_char();
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                '0' => '\0',
                                other => other,
                            });
                        }
                        None => return Err(LexerError::UnclosedString { line, column }),
                    }
                }
                Some(c) => {
                    self.advance_char();
                    value.push(c);
                }
                None => return Err(LexerError::UnclosedString { line, column }),
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(idx, _)| idx)
            .unwrap_or(self.input.len())
    }
}

fn keyword_kind(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "var" => TokenKind::Var,
        "variable" => TokenKind::VarInfer,
        "func" | "definir" => TokenKind::Func,
        "metodo" => TokenKind::Method,
        "clase" => TokenKind::Class,
        "interface" => TokenKind::Interface,
        "enum" | "enumeracion" => TokenKind::Enum,
        "si" => TokenKind::If,
        "sino" => TokenKind::Else,
        "mientras" => TokenKind::While,
        "para" => TokenKind::For,
        "in" => TokenKind::In,
        "import" => TokenKind::Import,
        "usar" => TokenKind::Use,
        "desde" => TokenKind::From,
        "como" | "as" => TokenKind::As,
        "imprimir" => TokenKind::Print,
        "retorno" => TokenKind::Return,
        "fin" => TokenKind::End,
        "try" | "intentar" => TokenKind::Try,
        "catch" | "capturar" => TokenKind::Catch,
        "throw" | "lanzar" => TokenKind::Throw,
        "finalmente" => TokenKind::Finally,
        "romper" => TokenKind::Break,
        "continuar" => TokenKind::Continue,
        "pasar" => TokenKind::Pass,
        "afirmar" => TokenKind::Assert,
        "eliminar" => TokenKind::Del,
        "global" => TokenKind::Global,
        "nolocal" => TokenKind::NonLocal,
        "lambda" => TokenKind::Lambda,
        "con" | "with" => TokenKind::With,
        "switch" | "segun" => TokenKind::Switch,
        "case" | "caso" => TokenKind::Case,
        "macro" => TokenKind::Macro,
        "asincronico" => TokenKind::Async,
        "esperar" => TokenKind::Await,
        "verdadero" => TokenKind::Bool(true),
        "falso" => TokenKind::Bool(false),
        _ => return None,
    };
    Some(kind)
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn tokenizes_simple_program() {
        let input = indoc! {"
            func doble(x):
                retorno x * 2
            fin
            imprimir(doble(4))
        "};
        let expected = vec![
            TokenKind::Func,
            TokenKind::Identifier("doble".to_string()),
            TokenKind::LParen,
            TokenKind::Identifier("x".to_string()),
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Return,
            TokenKind::Identifier("x".to_string()),
            TokenKind::Star,
            TokenKind::Integer(2.into()),
            TokenKind::End,
            TokenKind::Print,
            TokenKind::LParen,
            TokenKind::Identifier("doble".to_string()),
            TokenKind::LParen,
            TokenKind::Integer(4.into()),
            TokenKind::RParen,
            TokenKind::RParen,
            TokenKind::Eof,
        ];
        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = tokenize("var x = 1\nx = 2\n").expect("tokenize failed");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 5));
        let second_line_x = &tokens[4];
        assert_eq!((second_line_x.line, second_line_x.column), (2, 1));
    }

    #[test]
    fn supports_unicode_identifiers() {
        let kinds = kinds("var año = 1");
        assert_eq!(kinds[1], TokenKind::Identifier("año".to_string()));
    }

    #[test]
    fn reads_arbitrary_precision_integers() {
        let huge = "99999999999999999999999999999999999999";
        let kinds = kinds(&format!("var n = {huge}"));
        assert_eq!(
            kinds[3],
            TokenKind::Integer(huge.parse::<BigInt>().unwrap())
        );
    }

    #[test]
    fn distinguishes_floats_from_attribute_dots() {
        assert_eq!(
            kinds("3.14")[0],
            TokenKind::Float(3.14)
        );
        assert_eq!(
            kinds("x.longitud")[1],
            TokenKind::Dot
        );
    }

    #[test]
    fn processes_string_escapes_in_both_quote_styles() {
        assert_eq!(
            kinds("\"hola\\nmundo\"")[0],
            TokenKind::Str("hola\nmundo".to_string())
        );
        assert_eq!(
            kinds("'it\\'s'")[0],
            TokenKind::Str("it's".to_string())
        );
    }

    #[test]
    fn skips_line_and_nested_block_comments() {
        let input = indoc! {"
            // comentario
            # otro
            /* exterior /* interior */ sigue */ var x = 1
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Assign,
                TokenKind::Integer(1.into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn errors_on_unclosed_block_comment() {
        let err = tokenize("/* sin cierre").expect_err("expected failure");
        assert_eq!(
            err,
            LexerError::UnclosedBlockComment { line: 1, column: 1 }
        );
    }

    #[test]
    fn errors_on_unclosed_string() {
        let err = tokenize("var s = \"abierta").expect_err("expected failure");
        assert_eq!(err, LexerError::UnclosedString { line: 1, column: 9 });
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("var x = 1 $ 2").expect_err("expected failure");
        assert_eq!(err, LexerError::InvalidToken { line: 1, column: 11 });
    }

    #[test]
    fn cursor_supports_pushback_and_state_restore() {
        let mut lexer = Lexer::new("var x = 1");
        let first = lexer.advance().expect("lex failed").expect("token");
        assert_eq!(first.kind, TokenKind::Var);

        let state = lexer.save_state();
        let second = lexer.advance().expect("lex failed").expect("token");
        assert_eq!(second.kind, TokenKind::Identifier("x".to_string()));

        lexer.pushback();
        let again = lexer.peek().expect("lex failed").expect("token");
        assert_eq!(again.kind, TokenKind::Identifier("x".to_string()));

        lexer.restore_state(state);
        let restored = lexer.advance().expect("lex failed").expect("token");
        assert_eq!(restored.kind, TokenKind::Identifier("x".to_string()));
        assert!(lexer.has_more().expect("lex failed"));
    }
}
