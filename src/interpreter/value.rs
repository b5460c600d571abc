use std::cell::RefCell;
use std::rc::Rc;

use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::ast::{Expression, Statement};

/// Runtime values. Compound values share structure through `Rc<RefCell<_>>`
/// so aliasing assignments observe mutation, like the surface language
/// expects of lists, dictionaries, and instances.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<Vec<(Value, Value)>>>),
    OptionVal(Option<Box<Value>>),
    Function(Rc<FunctionData>),
    Lambda(Rc<LambdaData>),
    Class(Rc<ClassData>),
    Instance(Rc<RefCell<InstanceData>>),
    EnumType(Rc<EnumData>),
    Builtin(Builtin),
}

#[derive(Debug, PartialEq)]
pub struct FunctionData {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    pub is_async: bool,
}

#[derive(Debug, PartialEq)]
pub struct LambdaData {
    pub params: Vec<String>,
    pub body: Expression,
}

#[derive(Debug, PartialEq)]
pub struct ClassData {
    pub name: String,
    pub bases: Vec<Rc<ClassData>>,
    pub methods: FxHashMap<String, Rc<FunctionData>>,
}

impl ClassData {
    /// Method lookup through the class and then its bases, depth-first.
    pub fn find_method(&self, name: &str) -> Option<Rc<FunctionData>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        self.bases.iter().find_map(|base| base.find_method(name))
    }
}

#[derive(Debug, PartialEq)]
pub struct InstanceData {
    pub class: Rc<ClassData>,
    pub attributes: FxHashMap<String, Value>,
}

#[derive(Debug, PartialEq)]
pub struct EnumData {
    pub name: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Longitud,
    Rango,
    Tipo,
    LeerArchivo,
    EscribirArchivo,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "longitud" => Some(Builtin::Longitud),
            "rango" => Some(Builtin::Rango),
            "tipo" => Some(Builtin::Tipo),
            "leer_archivo" => Some(Builtin::LeerArchivo),
            "escribir_archivo" => Some(Builtin::EscribirArchivo),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Longitud => "longitud",
            Builtin::Rango => "rango",
            Builtin::Tipo => "tipo",
            Builtin::LeerArchivo => "leer_archivo",
            Builtin::EscribirArchivo => "escribir_archivo",
        }
    }
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != BigInt::from(0),
            Value::Float(value) => *value != 0.0,
            Value::Str(value) => !value.is_empty(),
            Value::List(values) => !values.borrow().is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::OptionVal(value) => value.is_some(),
            Value::Function(_)
            | Value::Lambda(_)
            | Value::Class(_)
            | Value::Instance(_)
            | Value::EnumType(_)
            | Value::Builtin(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "nada",
            Value::Bool(_) => "booleano",
            Value::Int(_) => "entero",
            Value::Float(_) => "flotante",
            Value::Str(_) => "cadena",
            Value::List(_) => "lista",
            Value::Dict(_) => "diccionario",
            Value::OptionVal(_) => "option",
            Value::Function(_) => "función",
            Value::Lambda(_) => "lambda",
            Value::Class(_) => "clase",
            Value::Instance(_) => "instancia",
            Value::EnumType(_) => "enum",
            Value::Builtin(_) => "función nativa",
        }
    }

    /// Rendering used by `imprimir` and error messages.
    pub fn to_output(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "verdadero".to_string(),
            Value::Bool(false) => "falso".to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Str(value) => value.clone(),
            Value::List(values) => {
                let rendered = values
                    .borrow()
                    .iter()
                    .map(Value::to_output)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{rendered}]")
            }
            Value::Dict(entries) => {
                let rendered = entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key.to_output(), value.to_output()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{rendered}}}")
            }
            Value::OptionVal(Some(value)) => format!("Some({})", value.to_output()),
            Value::OptionVal(None) => "None".to_string(),
            Value::Function(function) => format!("<función {}>", function.name),
            Value::Lambda(_) => "<lambda>".to_string(),
            Value::Class(class) => format!("<clase {}>", class.name),
            Value::Instance(instance) => {
                format!("<instancia de {}>", instance.borrow().class.name)
            }
            Value::EnumType(data) => format!("<enum {}>", data.name),
            Value::Builtin(builtin) => format!("<función nativa {}>", builtin.name()),
        }
    }

    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Value::Int(value.into())
    }
}
