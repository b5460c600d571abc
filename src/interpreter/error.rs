use thiserror::Error;

use crate::validators::ForbiddenPrimitiveError;

use super::value::Value;

/// An operator was applied to operands of incompatible types. Carries the
/// operation symbol so messages can name it.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Tipos incompatibles para la operación '{operation}': {message}")]
pub struct TypeMismatchError {
    pub operation: String,
    pub message: String,
}

impl TypeMismatchError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while executing a program. Everything propagates to the
/// caller unchanged; the interpreter never retries or suppresses.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InterpreterError {
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),
    #[error(transparent)]
    Forbidden(#[from] ForbiddenPrimitiveError),
    #[error("Variable no definida: '{name}'")]
    UndefinedVariable { name: String },
    #[error("Función no definida: '{name}'")]
    UndefinedFunction { name: String },
    #[error("Clase no definida: '{name}'")]
    UndefinedClass { name: String },
    #[error("La función '{name}' esperaba {expected} argumentos, recibió {found}")]
    FunctionArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Objeto de tipo {type_name} no es invocable")]
    NotCallable { type_name: String },
    #[error("Método '{method}' no encontrado para {type_name}")]
    UnknownMethod { method: String, type_name: String },
    #[error("Atributo '{attribute}' no encontrado para {type_name}")]
    UnknownAttribute {
        attribute: String,
        type_name: String,
    },
    #[error("División por cero")]
    DivisionByZero,
    #[error("Índice {index} fuera de rango (longitud {len})")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("Se esperaba un índice entero, se obtuvo {got}")]
    ExpectedIntegerIndex { got: String },
    #[error("Clave no encontrada en el diccionario: {key}")]
    KeyNotFound { key: String },
    #[error("Objeto de tipo {type_name} no es indexable")]
    NotIndexable { type_name: String },
    #[error("Objeto de tipo {type_name} no es iterable")]
    NotIterable { type_name: String },
    #[error("Afirmación fallida: {message}")]
    AssertionFailed { message: String },
    #[error("Excepción no capturada: {}", .value.to_output())]
    Thrown { value: Value },
    #[error("'retorno' fuera de una función")]
    ReturnOutsideFunction,
    #[error("'romper' o 'continuar' fuera de un bucle")]
    LoopControlOutsideLoop,
    #[error("Módulo no encontrado: {path}")]
    ModuleNotFound { path: String },
    #[error("Error al cargar el módulo {path}: {message}")]
    ModuleLoadFailed { path: String, message: String },
    #[error("En la clase '{class}' solo se permiten métodos y 'pasar'")]
    UnsupportedClassMember { class: String },
    #[error("Objetivo de 'eliminar' inválido")]
    InvalidDeleteTarget,
    #[error("Error de E/S: {message}")]
    Io { message: String },
}
