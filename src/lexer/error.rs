use thiserror::Error;

/// Positional errors raised while scanning Cobra source text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexerError {
    #[error("Token no reconocido en línea {line}, columna {column}")]
    InvalidToken { line: usize, column: usize },
    #[error("Cadena sin cerrar en línea {line}, columna {column}")]
    UnclosedString { line: usize, column: usize },
    #[error("Comentario de bloque sin cerrar en línea {line}, columna {column}")]
    UnclosedBlockComment { line: usize, column: usize },
}

impl LexerError {
    pub fn line(&self) -> usize {
        match self {
            LexerError::InvalidToken { line, .. }
            | LexerError::UnclosedString { line, .. }
            | LexerError::UnclosedBlockComment { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            LexerError::InvalidToken { column, .. }
            | LexerError::UnclosedString { column, .. }
            | LexerError::UnclosedBlockComment { column, .. } => *column,
        }
    }
}
