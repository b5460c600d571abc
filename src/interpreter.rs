//! Tree-walking interpreter.
//!
//! Execution state is a global environment plus a stack of call frames.
//! There are no lexical closures: a name resolves in the current frame and
//! then in the globals, and only explicit `global`/`nolocal` declarations
//! redirect writes elsewhere. In safe mode, every node is walked through
//! the validator chain before anything executes.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use num_traits::{ToPrimitive, Zero};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{
    AssignTarget, BinaryOperator, Expression, Literal, Pattern, Statement, UnaryOperator,
};
use crate::lexer;
use crate::parser;
use crate::validators::{
    self, DangerousPrimitives, FilesystemAccess, ForbiddenPrimitiveError, NoReflection,
    RestrictedImports, Validator,
};

mod error;
mod value;

pub use error::{InterpreterError, TypeMismatchError};
pub use value::{Builtin, Value};

use value::{ClassData, EnumData, FunctionData, InstanceData, LambdaData};

type ExecOutcome = Result<ExecResult, InterpreterError>;
type EvalOutcome = Result<Value, InterpreterError>;

/// Control-flow marker for statement execution.
enum ExecResult {
    Continue,
    Return(Value),
    Break,
    Next,
}

#[derive(Default)]
struct Frame {
    locals: FxHashMap<String, Value>,
    global_names: FxHashSet<String>,
    nonlocal_names: FxHashSet<String>,
}

enum StoreSlot {
    CurrentFrame,
    Globals,
    EnclosingFrame(usize),
}

pub struct Interpreter {
    safe_mode: bool,
    chain: Vec<Box<dyn Validator>>,
    import_whitelist: Vec<String>,
    globals: FxHashMap<String, Value>,
    frames: Vec<Frame>,
    macros: FxHashMap<String, Vec<Statement>>,
    output: Vec<String>,
}

impl Interpreter {
    pub fn new(safe_mode: bool) -> Self {
        Self::with_config(safe_mode, Vec::new(), Vec::new())
    }

    pub fn with_validators(safe_mode: bool, extra: Vec<Box<dyn Validator>>) -> Self {
        Self::with_config(safe_mode, Vec::new(), extra)
    }

    /// Full configuration: the import whitelist feeds both the chain's
    /// import link and the module loader, so validation and execution
    /// agree on which paths are permitted.
    pub fn with_config(
        safe_mode: bool,
        import_whitelist: Vec<String>,
        extra: Vec<Box<dyn Validator>>,
    ) -> Self {
        let chain: Vec<Box<dyn Validator>> = if safe_mode {
            let mut chain: Vec<Box<dyn Validator>> = vec![
                Box::new(DangerousPrimitives),
                Box::new(RestrictedImports::new(import_whitelist.clone())),
                Box::new(FilesystemAccess),
                Box::new(NoReflection),
            ];
            chain.extend(extra);
            chain
        } else {
            Vec::new()
        };
        Self {
            safe_mode,
            chain,
            import_whitelist,
            globals: FxHashMap::default(),
            frames: Vec::new(),
            macros: FxHashMap::default(),
            output: Vec::new(),
        }
    }

    /// Executes top-level statements in order, stopping at the first
    /// unhandled error. In safe mode the whole tree is validated before
    /// any side effect occurs.
    pub fn run(&mut self, statements: &[Statement]) -> Result<(), InterpreterError> {
        if self.safe_mode {
            for statement in statements {
                validators::validate_statement(&self.chain, statement)?;
            }
        }
        for statement in statements {
            match self.exec_statement(statement)? {
                ExecResult::Continue => {}
                ExecResult::Return(_) => return Err(InterpreterError::ReturnOutsideFunction),
                ExecResult::Break | ExecResult::Next => {
                    return Err(InterpreterError::LoopControlOutsideLoop)
                }
            }
        }
        Ok(())
    }

    /// Validates (in safe mode) and executes a single statement; the REPL
    /// entry point.
    pub fn eval_node(&mut self, statement: &Statement) -> Result<(), InterpreterError> {
        self.run(std::slice::from_ref(statement))
    }

    /// Lines produced by `imprimir` since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    // -- Environment --------------------------------------------------------

    fn load(&self, name: &str) -> Option<Value> {
        if let Some(frame) = self.frames.last() {
            if frame.global_names.contains(name) {
                return self.globals.get(name).cloned();
            }
            if frame.nonlocal_names.contains(name) {
                for enclosing in self.frames.iter().rev().skip(1) {
                    if let Some(value) = enclosing.locals.get(name) {
                        return Some(value.clone());
                    }
                }
                return self.globals.get(name).cloned();
            }
            if let Some(value) = frame.locals.get(name) {
                return Some(value.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    fn store(&mut self, name: &str, value: Value) {
        let slot = match self.frames.last() {
            None => StoreSlot::Globals,
            Some(frame) if frame.global_names.contains(name) => StoreSlot::Globals,
            Some(frame) if frame.nonlocal_names.contains(name) => {
                let enclosing = (0..self.frames.len() - 1)
                    .rev()
                    .find(|&i| self.frames[i].locals.contains_key(name));
                match enclosing {
                    Some(index) => StoreSlot::EnclosingFrame(index),
                    None if self.frames.len() >= 2 => {
                        StoreSlot::EnclosingFrame(self.frames.len() - 2)
                    }
                    None => StoreSlot::Globals,
                }
            }
            Some(_) => StoreSlot::CurrentFrame,
        };
        match slot {
            StoreSlot::Globals => {
                self.globals.insert(name.to_string(), value);
            }
            StoreSlot::CurrentFrame => {
                self.frames
                    .last_mut()
                    .expect("current frame present")
                    .locals
                    .insert(name.to_string(), value);
            }
            StoreSlot::EnclosingFrame(index) => {
                self.frames[index].locals.insert(name.to_string(), value);
            }
        }
    }

    fn remove_binding(&mut self, name: &str) -> bool {
        if let Some(frame) = self.frames.last_mut() {
            if frame.locals.remove(name).is_some() {
                return true;
            }
        }
        self.globals.remove(name).is_some()
    }

    // -- Statements ---------------------------------------------------------

    fn exec_block(&mut self, body: &[Statement]) -> ExecOutcome {
        for statement in body {
            match self.exec_statement(statement)? {
                ExecResult::Continue => {}
                other => return Ok(other),
            }
        }
        Ok(ExecResult::Continue)
    }

    fn exec_statement(&mut self, statement: &Statement) -> ExecOutcome {
        match statement {
            Statement::Assign { target, value, .. } => {
                let value = self.eval_expression(value)?;
                self.assign(target, value)?;
                Ok(ExecResult::Continue)
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.eval_expression(condition)?;
                if condition.is_truthy() {
                    self.exec_block(then_body)
                } else {
                    self.exec_block(else_body)
                }
            }
            Statement::While { condition, body } => {
                loop {
                    if !self.eval_expression(condition)?.is_truthy() {
                        break;
                    }
                    match self.exec_block(body)? {
                        ExecResult::Continue | ExecResult::Next => {}
                        ExecResult::Break => break,
                        result @ ExecResult::Return(_) => return Ok(result),
                    }
                }
                Ok(ExecResult::Continue)
            }
            Statement::For {
                variable,
                iterable,
                body,
            } => {
                let iterable = self.eval_expression(iterable)?;
                for item in self.iterate(iterable)? {
                    self.store(variable, item);
                    match self.exec_block(body)? {
                        ExecResult::Continue | ExecResult::Next => {}
                        ExecResult::Break => break,
                        result @ ExecResult::Return(_) => return Ok(result),
                    }
                }
                Ok(ExecResult::Continue)
            }
            Statement::FunctionDef {
                name,
                params,
                decorators,
                body,
                is_async,
                ..
            } => {
                let mut value = Value::Function(Rc::new(FunctionData {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    is_async: *is_async,
                }));
                // First decorator is outermost: apply inner ones first.
                for decorator in decorators.iter().rev() {
                    let wrapper = self.eval_expression(decorator)?;
                    value = self.call_value(wrapper, vec![value])?;
                }
                self.store(name, value);
                Ok(ExecResult::Continue)
            }
            Statement::MethodDef {
                name,
                params,
                body,
                is_async,
                ..
            } => {
                let value = Value::Function(Rc::new(FunctionData {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    is_async: *is_async,
                }));
                self.store(name, value);
                Ok(ExecResult::Continue)
            }
            Statement::ClassDef {
                name, bases, body, ..
            } => {
                let mut resolved_bases = Vec::with_capacity(bases.len());
                for base in bases {
                    match self.load(base) {
                        Some(Value::Class(class)) => resolved_bases.push(class),
                        _ => {
                            return Err(InterpreterError::UndefinedClass { name: base.clone() })
                        }
                    }
                }
                let mut methods = FxHashMap::default();
                for member in body {
                    match member {
                        Statement::MethodDef {
                            name: method_name,
                            params,
                            body,
                            is_async,
                            ..
                        }
                        | Statement::FunctionDef {
                            name: method_name,
                            params,
                            body,
                            is_async,
                            ..
                        } => {
                            methods.insert(
                                method_name.clone(),
                                Rc::new(FunctionData {
                                    name: method_name.clone(),
                                    params: params.clone(),
                                    body: body.clone(),
                                    is_async: *is_async,
                                }),
                            );
                        }
                        Statement::Pass => {}
                        _ => {
                            return Err(InterpreterError::UnsupportedClassMember {
                                class: name.clone(),
                            })
                        }
                    }
                }
                let class = Rc::new(ClassData {
                    name: name.clone(),
                    bases: resolved_bases,
                    methods,
                });
                self.store(name, Value::Class(class));
                Ok(ExecResult::Continue)
            }
            Statement::InterfaceDef { .. } => Ok(ExecResult::Continue),
            Statement::EnumDef { name, variants } => {
                self.store(
                    name,
                    Value::EnumType(Rc::new(EnumData {
                        name: name.clone(),
                        variants: variants.clone(),
                    })),
                );
                Ok(ExecResult::Continue)
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(expression) => self.eval_expression(expression)?,
                    None => Value::None,
                };
                Ok(ExecResult::Return(value))
            }
            Statement::Throw(expression) => {
                let value = self.eval_expression(expression)?;
                Err(InterpreterError::Thrown { value })
            }
            Statement::TryCatch {
                try_body,
                exception_name,
                catch_body,
                finally_body,
            } => {
                let outcome = match self.exec_block(try_body) {
                    Err(InterpreterError::Thrown { value }) => {
                        if let Some(name) = exception_name {
                            self.store(name, value);
                        }
                        self.exec_block(catch_body)
                    }
                    other => other,
                };
                match self.exec_block(finally_body)? {
                    ExecResult::Continue => outcome,
                    overriding => Ok(overriding),
                }
            }
            Statement::Import { path } => {
                self.exec_import(path, path)?;
                Ok(ExecResult::Continue)
            }
            Statement::Use { module } => {
                // `usar modulo` is whitelisted by module name and resolved
                // to the module's source file.
                self.exec_import(module, &format!("{module}.co"))?;
                Ok(ExecResult::Continue)
            }
            Statement::ImportFrom {
                module,
                name,
                alias,
            } => {
                self.exec_import_from(module, name, alias.as_deref())?;
                Ok(ExecResult::Continue)
            }
            Statement::Export { .. } => Ok(ExecResult::Continue),
            Statement::Print(expression) => {
                let value = self.eval_expression(expression)?;
                self.output.push(value.to_output());
                Ok(ExecResult::Continue)
            }
            Statement::Break => Ok(ExecResult::Break),
            Statement::Continue => Ok(ExecResult::Next),
            Statement::Pass => Ok(ExecResult::Continue),
            Statement::Assert { condition, message } => {
                if self.eval_expression(condition)?.is_truthy() {
                    return Ok(ExecResult::Continue);
                }
                let message = match message {
                    Some(expression) => self.eval_expression(expression)?.to_output(),
                    None => "afirmación falsa".to_string(),
                };
                Err(InterpreterError::AssertionFailed { message })
            }
            Statement::Del { target } => {
                self.exec_delete(target)?;
                Ok(ExecResult::Continue)
            }
            Statement::Global { names } => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.global_names.extend(names.iter().cloned());
                }
                Ok(ExecResult::Continue)
            }
            Statement::NonLocal { names } => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.nonlocal_names.extend(names.iter().cloned());
                }
                Ok(ExecResult::Continue)
            }
            Statement::With {
                context,
                alias,
                body,
            } => {
                let value = self.eval_expression(context)?;
                if let Some(alias) = alias {
                    self.store(alias, value);
                }
                self.exec_block(body)
            }
            Statement::MacroDef { name, body } => {
                self.macros.insert(name.clone(), body.clone());
                Ok(ExecResult::Continue)
            }
            Statement::Switch {
                subject,
                cases,
                default,
            } => {
                let subject = self.eval_expression(subject)?;
                for case in cases {
                    let Some(bindings) = match_pattern(&case.pattern, &subject) else {
                        continue;
                    };
                    for (name, value) in bindings {
                        self.store(&name, value);
                    }
                    if let Some(guard) = &case.guard {
                        if !self.eval_expression(guard)?.is_truthy() {
                            continue;
                        }
                    }
                    return self.exec_block(&case.body);
                }
                self.exec_block(default)
            }
            Statement::Expr(expression) => {
                self.eval_expression(expression)?;
                Ok(ExecResult::Continue)
            }
        }
    }

    fn assign(&mut self, target: &AssignTarget, value: Value) -> Result<(), InterpreterError> {
        match target {
            AssignTarget::Name(name) => {
                self.store(name, value);
                Ok(())
            }
            AssignTarget::Attribute { object, name } => {
                let object = self.eval_expression(object)?;
                match object {
                    Value::Instance(instance) => {
                        instance.borrow_mut().attributes.insert(name.clone(), value);
                        Ok(())
                    }
                    other => Err(InterpreterError::UnknownAttribute {
                        attribute: name.clone(),
                        type_name: other.type_name().to_string(),
                    }),
                }
            }
            AssignTarget::Index { object, index } => {
                let object = self.eval_expression(object)?;
                let index = self.eval_expression(index)?;
                match object {
                    Value::List(values) => {
                        let position = list_index(&index, values.borrow().len())?;
                        values.borrow_mut()[position] = value;
                        Ok(())
                    }
                    Value::Dict(entries) => {
                        let mut entries = entries.borrow_mut();
                        match entries
                            .iter_mut()
                            .find(|(key, _)| values_equal(key, &index))
                        {
                            Some((_, existing)) => *existing = value,
                            None => entries.push((index, value)),
                        }
                        Ok(())
                    }
                    other => Err(InterpreterError::NotIndexable {
                        type_name: other.type_name().to_string(),
                    }),
                }
            }
        }
    }

    fn exec_delete(&mut self, target: &Expression) -> Result<(), InterpreterError> {
        match target {
            Expression::Identifier(name) => {
                if self.remove_binding(name) {
                    Ok(())
                } else {
                    Err(InterpreterError::UndefinedVariable { name: name.clone() })
                }
            }
            Expression::Index { object, index } => {
                let object = self.eval_expression(object)?;
                let index = self.eval_expression(index)?;
                match object {
                    Value::List(values) => {
                        let position = list_index(&index, values.borrow().len())?;
                        values.borrow_mut().remove(position);
                        Ok(())
                    }
                    Value::Dict(entries) => {
                        let mut entries = entries.borrow_mut();
                        let position = entries
                            .iter()
                            .position(|(key, _)| values_equal(key, &index))
                            .ok_or_else(|| InterpreterError::KeyNotFound {
                                key: index.to_output(),
                            })?;
                        entries.remove(position);
                        Ok(())
                    }
                    other => Err(InterpreterError::NotIndexable {
                        type_name: other.type_name().to_string(),
                    }),
                }
            }
            Expression::Attribute { object, name } => {
                let object = self.eval_expression(object)?;
                match object {
                    Value::Instance(instance) => {
                        instance.borrow_mut().attributes.remove(name);
                        Ok(())
                    }
                    other => Err(InterpreterError::UnknownAttribute {
                        attribute: name.clone(),
                        type_name: other.type_name().to_string(),
                    }),
                }
            }
            _ => Err(InterpreterError::InvalidDeleteTarget),
        }
    }

    // -- Imports ------------------------------------------------------------

    fn exec_import(&mut self, spec: &str, file_path: &str) -> Result<(), InterpreterError> {
        let statements = self.load_module(spec, file_path)?;
        // Module statements run against the caller's global environment.
        let saved_frames = std::mem::take(&mut self.frames);
        let result = self.run_module_body(&statements);
        self.frames = saved_frames;
        result
    }

    fn exec_import_from(
        &mut self,
        module: &str,
        name: &str,
        alias: Option<&str>,
    ) -> Result<(), InterpreterError> {
        let statements = self.load_module(module, module)?;
        // The module executes in isolation; only the requested binding is
        // copied into the caller's environment.
        let saved_globals = std::mem::take(&mut self.globals);
        let saved_frames = std::mem::take(&mut self.frames);
        let result = self.run_module_body(&statements);
        let module_globals = std::mem::replace(&mut self.globals, saved_globals);
        self.frames = saved_frames;
        result?;
        let value = module_globals
            .get(name)
            .cloned()
            .ok_or_else(|| InterpreterError::UndefinedVariable {
                name: name.to_string(),
            })?;
        self.store(alias.unwrap_or(name), value);
        Ok(())
    }

    fn run_module_body(&mut self, statements: &[Statement]) -> Result<(), InterpreterError> {
        for statement in statements {
            match self.exec_statement(statement)? {
                ExecResult::Continue => {}
                ExecResult::Return(_) => return Err(InterpreterError::ReturnOutsideFunction),
                ExecResult::Break | ExecResult::Next => {
                    return Err(InterpreterError::LoopControlOutsideLoop)
                }
            }
        }
        Ok(())
    }

    fn load_module(
        &mut self,
        spec: &str,
        path: &str,
    ) -> Result<Vec<Statement>, InterpreterError> {
        if self.safe_mode && !self.import_whitelist.iter().any(|entry| entry == spec) {
            return Err(ForbiddenPrimitiveError::new(format!(
                "Importación de módulo no permitida: {spec}"
            ))
            .into());
        }
        let source = fs::read_to_string(path).map_err(|_| InterpreterError::ModuleNotFound {
            path: path.to_string(),
        })?;
        let tokens = lexer::tokenize(&source).map_err(|error| {
            InterpreterError::ModuleLoadFailed {
                path: path.to_string(),
                message: error.to_string(),
            }
        })?;
        let statements =
            parser::parse_tokens(tokens).map_err(|error| InterpreterError::ModuleLoadFailed {
                path: path.to_string(),
                message: error.to_string(),
            })?;
        if self.safe_mode {
            for statement in &statements {
                validators::validate_statement(&self.chain, statement)?;
            }
        }
        Ok(statements)
    }

    // -- Expressions --------------------------------------------------------

    fn eval_expression(&mut self, expression: &Expression) -> EvalOutcome {
        match expression {
            Expression::Literal(literal) => Ok(literal_value(literal)),
            Expression::Identifier(name) => match self.load(name) {
                Some(value) => Ok(value),
                // Builtins resolve by name unless shadowed by a binding.
                None => Builtin::from_name(name)
                    .map(Value::Builtin)
                    .ok_or_else(|| InterpreterError::UndefinedVariable { name: name.clone() }),
            },
            Expression::List(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expression(element)?);
                }
                Ok(Value::list(values))
            }
            Expression::Dict(entries) => {
                let mut values = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    values.push((self.eval_expression(key)?, self.eval_expression(value)?));
                }
                Ok(Value::Dict(Rc::new(RefCell::new(values))))
            }
            Expression::OptionValue(value) => match value {
                Some(inner) => Ok(Value::OptionVal(Some(Box::new(
                    self.eval_expression(inner)?,
                )))),
                None => Ok(Value::OptionVal(None)),
            },
            Expression::BinaryOp { left, op, right } => {
                let left = self.eval_expression(left)?;
                let right = self.eval_expression(right)?;
                apply_binary(*op, left, right)
            }
            Expression::UnaryOp { op, operand } => {
                let operand = self.eval_expression(operand)?;
                apply_unary(*op, operand)
            }
            Expression::Call { name, args } => self.eval_call(name, args),
            Expression::MethodCall {
                object,
                method,
                args,
            } => self.eval_method_call(object, method, args),
            Expression::Attribute { object, name } => {
                let object = self.eval_expression(object)?;
                self.eval_attribute(object, name)
            }
            Expression::Index { object, index } => {
                let object = self.eval_expression(object)?;
                let index = self.eval_expression(index)?;
                self.eval_index(object, index)
            }
            Expression::Instantiation { class_name, args } => match self.load(class_name) {
                Some(Value::Class(class)) => {
                    let args = self.eval_args(args)?;
                    self.instantiate(class, args)
                }
                _ => Err(InterpreterError::UndefinedClass {
                    name: class_name.clone(),
                }),
            },
            Expression::Lambda { params, body } => Ok(Value::Lambda(Rc::new(LambdaData {
                params: params.clone(),
                body: (**body).clone(),
            }))),
            // Synchronous in place; there is no event loop to yield to.
            Expression::Await(operand) => self.eval_expression(operand),
        }
    }

    fn eval_args(&mut self, args: &[Expression]) -> Result<Vec<Value>, InterpreterError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expression(arg)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, name: &str, args: &[Expression]) -> EvalOutcome {
        // Macros expand in place: the body runs in the caller's scope and
        // a `retorno` inside it becomes the call's value.
        if args.is_empty() {
            if let Some(body) = self.macros.get(name).cloned() {
                return match self.exec_block(&body)? {
                    ExecResult::Return(value) => Ok(value),
                    ExecResult::Continue => Ok(Value::None),
                    ExecResult::Break | ExecResult::Next => {
                        Err(InterpreterError::LoopControlOutsideLoop)
                    }
                };
            }
        }
        if let Some(value) = self.load(name) {
            let args = self.eval_args(args)?;
            return self.call_value(value, args);
        }
        if let Some(builtin) = Builtin::from_name(name) {
            let args = self.eval_args(args)?;
            return self.call_builtin(builtin, args);
        }
        Err(InterpreterError::UndefinedFunction {
            name: name.to_string(),
        })
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> EvalOutcome {
        match callee {
            Value::Function(function) => self.call_function(function, args),
            Value::Lambda(lambda) => self.call_lambda(lambda, args),
            Value::Class(class) => self.instantiate(class, args),
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            other => Err(InterpreterError::NotCallable {
                type_name: other.type_name().to_string(),
            }),
        }
    }

    fn call_function(&mut self, function: Rc<FunctionData>, args: Vec<Value>) -> EvalOutcome {
        if function.params.len() != args.len() {
            return Err(InterpreterError::FunctionArityMismatch {
                name: function.name.clone(),
                expected: function.params.len(),
                found: args.len(),
            });
        }
        let mut frame = Frame::default();
        for (param, value) in function.params.iter().zip(args) {
            frame.locals.insert(param.clone(), value);
        }
        self.frames.push(frame);
        let result = self.exec_block(&function.body);
        self.frames.pop();
        match result? {
            ExecResult::Return(value) => Ok(value),
            ExecResult::Continue => Ok(Value::None),
            ExecResult::Break | ExecResult::Next => Err(InterpreterError::LoopControlOutsideLoop),
        }
    }

    fn call_lambda(&mut self, lambda: Rc<LambdaData>, args: Vec<Value>) -> EvalOutcome {
        if lambda.params.len() != args.len() {
            return Err(InterpreterError::FunctionArityMismatch {
                name: "lambda".to_string(),
                expected: lambda.params.len(),
                found: args.len(),
            });
        }
        let mut frame = Frame::default();
        for (param, value) in lambda.params.iter().zip(args) {
            frame.locals.insert(param.clone(), value);
        }
        self.frames.push(frame);
        let result = self.eval_expression(&lambda.body);
        self.frames.pop();
        result
    }

    fn instantiate(&mut self, class: Rc<ClassData>, args: Vec<Value>) -> EvalOutcome {
        let instance = Rc::new(RefCell::new(InstanceData {
            class: class.clone(),
            attributes: FxHashMap::default(),
        }));
        if let Some(init) = class.find_method("inicializar") {
            self.call_method(init, Value::Instance(instance.clone()), args)?;
        } else if !args.is_empty() {
            return Err(InterpreterError::FunctionArityMismatch {
                name: class.name.clone(),
                expected: 0,
                found: args.len(),
            });
        }
        Ok(Value::Instance(instance))
    }

    fn call_method(
        &mut self,
        method: Rc<FunctionData>,
        receiver: Value,
        args: Vec<Value>,
    ) -> EvalOutcome {
        if method.params.len() != args.len() + 1 {
            return Err(InterpreterError::FunctionArityMismatch {
                name: method.name.clone(),
                expected: method.params.len().saturating_sub(1),
                found: args.len(),
            });
        }
        let mut frame = Frame::default();
        let mut params = method.params.iter();
        if let Some(self_param) = params.next() {
            frame.locals.insert(self_param.clone(), receiver);
        }
        for (param, value) in params.zip(args) {
            frame.locals.insert(param.clone(), value);
        }
        self.frames.push(frame);
        let result = self.exec_block(&method.body);
        self.frames.pop();
        match result? {
            ExecResult::Return(value) => Ok(value),
            ExecResult::Continue => Ok(Value::None),
            ExecResult::Break | ExecResult::Next => Err(InterpreterError::LoopControlOutsideLoop),
        }
    }

    fn eval_method_call(
        &mut self,
        object: &Expression,
        method: &str,
        args: &[Expression],
    ) -> EvalOutcome {
        let object = self.eval_expression(object)?;
        match &object {
            Value::Instance(instance) => {
                let found = instance.borrow().class.find_method(method);
                match found {
                    Some(function) => {
                        let args = self.eval_args(args)?;
                        self.call_method(function, object.clone(), args)
                    }
                    None => Err(InterpreterError::UnknownMethod {
                        method: method.to_string(),
                        type_name: object.type_name().to_string(),
                    }),
                }
            }
            Value::List(values) => match method {
                "agregar" => {
                    let args = self.eval_args(args)?;
                    if args.len() != 1 {
                        return Err(InterpreterError::FunctionArityMismatch {
                            name: "agregar".to_string(),
                            expected: 1,
                            found: args.len(),
                        });
                    }
                    values
                        .borrow_mut()
                        .push(args.into_iter().next().expect("one argument"));
                    Ok(Value::None)
                }
                _ => Err(InterpreterError::UnknownMethod {
                    method: method.to_string(),
                    type_name: "lista".to_string(),
                }),
            },
            other => Err(InterpreterError::UnknownMethod {
                method: method.to_string(),
                type_name: other.type_name().to_string(),
            }),
        }
    }

    fn eval_attribute(&mut self, object: Value, name: &str) -> EvalOutcome {
        match &object {
            Value::Instance(instance) => instance
                .borrow()
                .attributes
                .get(name)
                .cloned()
                .ok_or_else(|| InterpreterError::UnknownAttribute {
                    attribute: name.to_string(),
                    type_name: object.type_name().to_string(),
                }),
            Value::EnumType(data) => data
                .variants
                .iter()
                .position(|variant| variant == name)
                .map(Value::int)
                .ok_or_else(|| InterpreterError::UnknownAttribute {
                    attribute: name.to_string(),
                    type_name: data.name.clone(),
                }),
            other => Err(InterpreterError::UnknownAttribute {
                attribute: name.to_string(),
                type_name: other.type_name().to_string(),
            }),
        }
    }

    fn eval_index(&mut self, object: Value, index: Value) -> EvalOutcome {
        match object {
            Value::List(values) => {
                let position = list_index(&index, values.borrow().len())?;
                Ok(values.borrow()[position].clone())
            }
            Value::Str(text) => {
                let chars: Vec<char> = text.chars().collect();
                let position = list_index(&index, chars.len())?;
                Ok(Value::Str(chars[position].to_string()))
            }
            Value::Dict(entries) => entries
                .borrow()
                .iter()
                .find(|(key, _)| values_equal(key, &index))
                .map(|(_, value)| value.clone())
                .ok_or_else(|| InterpreterError::KeyNotFound {
                    key: index.to_output(),
                }),
            other => Err(InterpreterError::NotIndexable {
                type_name: other.type_name().to_string(),
            }),
        }
    }

    fn iterate(&mut self, value: Value) -> Result<Vec<Value>, InterpreterError> {
        match value {
            Value::List(values) => Ok(values.borrow().clone()),
            Value::Str(text) => Ok(text
                .chars()
                .map(|c| Value::Str(c.to_string()))
                .collect()),
            Value::Dict(entries) => Ok(entries
                .borrow()
                .iter()
                .map(|(key, _)| key.clone())
                .collect()),
            other => Err(InterpreterError::NotIterable {
                type_name: other.type_name().to_string(),
            }),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> EvalOutcome {
        let arity = |expected: usize, found: usize| InterpreterError::FunctionArityMismatch {
            name: builtin.name().to_string(),
            expected,
            found,
        };
        match builtin {
            Builtin::Longitud => {
                let [value] = <[Value; 1]>::try_from(args).map_err(|a| arity(1, a.len()))?;
                let length = match &value {
                    Value::List(values) => values.borrow().len(),
                    Value::Str(text) => text.chars().count(),
                    Value::Dict(entries) => entries.borrow().len(),
                    other => {
                        return Err(TypeMismatchError::new(
                            "longitud",
                            format!("no aplicable a {}", other.type_name()),
                        )
                        .into())
                    }
                };
                Ok(Value::int(length as i64))
            }
            Builtin::Rango => {
                if args.is_empty() || args.len() > 2 {
                    return Err(arity(2, args.len()));
                }
                let bounds: Vec<i64> = args
                    .iter()
                    .map(|value| match value {
                        Value::Int(n) => n.to_i64().ok_or_else(|| {
                            TypeMismatchError::new("rango", "límite fuera de rango").into()
                        }),
                        other => Err(TypeMismatchError::new(
                            "rango",
                            format!("se esperaba entero, se obtuvo {}", other.type_name()),
                        )
                        .into()),
                    })
                    .collect::<Result<_, InterpreterError>>()?;
                let (start, end) = match bounds.as_slice() {
                    [end] => (0, *end),
                    [start, end] => (*start, *end),
                    _ => unreachable!("bounds checked above"),
                };
                Ok(Value::list((start..end).map(Value::int).collect()))
            }
            Builtin::Tipo => {
                let [value] = <[Value; 1]>::try_from(args).map_err(|a| arity(1, a.len()))?;
                Ok(Value::Str(value.type_name().to_string()))
            }
            Builtin::LeerArchivo => {
                let [path] = <[Value; 1]>::try_from(args).map_err(|a| arity(1, a.len()))?;
                let Value::Str(path) = path else {
                    return Err(TypeMismatchError::new(
                        "leer_archivo",
                        format!("se esperaba cadena, se obtuvo {}", path.type_name()),
                    )
                    .into());
                };
                fs::read_to_string(&path)
                    .map(Value::Str)
                    .map_err(|error| InterpreterError::Io {
                        message: format!("{path}: {error}"),
                    })
            }
            Builtin::EscribirArchivo => {
                let [path, content] =
                    <[Value; 2]>::try_from(args).map_err(|a| arity(2, a.len()))?;
                let (Value::Str(path), Value::Str(content)) = (&path, &content) else {
                    return Err(TypeMismatchError::new(
                        "escribir_archivo",
                        "se esperaban cadenas (ruta y contenido)",
                    )
                    .into());
                };
                fs::write(path, content).map_err(|error| InterpreterError::Io {
                    message: format!("{path}: {error}"),
                })?;
                Ok(Value::None)
            }
        }
    }
}

// -- Operators ---------------------------------------------------------------

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Integer(value) => Value::Int(value.clone()),
        Literal::Float(value) => Value::Float(*value),
        Literal::Str(value) => Value::Str(value.clone()),
        Literal::Bool(value) => Value::Bool(*value),
    }
}

fn operator_symbol(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "+",
        BinaryOperator::Sub => "-",
        BinaryOperator::Mul => "*",
        BinaryOperator::Div => "/",
        BinaryOperator::Mod => "%",
        BinaryOperator::Greater => ">",
        BinaryOperator::Less => "<",
        BinaryOperator::GreaterEqual => ">=",
        BinaryOperator::LessEqual => "<=",
        BinaryOperator::Equal => "==",
        BinaryOperator::NotEqual => "!=",
        BinaryOperator::And => "&&",
        BinaryOperator::Or => "||",
    }
}

fn apply_binary(op: BinaryOperator, left: Value, right: Value) -> EvalOutcome {
    use BinaryOperator::*;

    let mismatch = |left: &Value, right: &Value| {
        TypeMismatchError::new(
            operator_symbol(op),
            format!(
                "no se puede operar {} y {}",
                left.type_name(),
                right.type_name()
            ),
        )
    };

    match op {
        Equal => return Ok(Value::Bool(values_equal(&left, &right))),
        NotEqual => return Ok(Value::Bool(!values_equal(&left, &right))),
        And | Or => {
            return match (&left, &right) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if matches!(op, And) {
                    *a && *b
                } else {
                    *a || *b
                })),
                _ => Err(mismatch(&left, &right).into()),
            };
        }
        _ => {}
    }

    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => match op {
            Add => Ok(Value::Int(a + b)),
            Sub => Ok(Value::Int(a - b)),
            Mul => Ok(Value::Int(a * b)),
            Div => {
                if b.is_zero() {
                    Err(InterpreterError::DivisionByZero)
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            Mod => {
                if b.is_zero() {
                    Err(InterpreterError::DivisionByZero)
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            Greater => Ok(Value::Bool(a > b)),
            Less => Ok(Value::Bool(a < b)),
            GreaterEqual => Ok(Value::Bool(a >= b)),
            LessEqual => Ok(Value::Bool(a <= b)),
            Equal | NotEqual | And | Or => unreachable!("handled above"),
        },
        (Value::Int(_), Value::Float(_))
        | (Value::Float(_), Value::Int(_))
        | (Value::Float(_), Value::Float(_)) => {
            let a = numeric_f64(&left).ok_or_else(|| mismatch(&left, &right))?;
            let b = numeric_f64(&right).ok_or_else(|| mismatch(&left, &right))?;
            match op {
                Add => Ok(Value::Float(a + b)),
                Sub => Ok(Value::Float(a - b)),
                Mul => Ok(Value::Float(a * b)),
                Div => {
                    if b == 0.0 {
                        Err(InterpreterError::DivisionByZero)
                    } else {
                        Ok(Value::Float(a / b))
                    }
                }
                Mod => {
                    if b == 0.0 {
                        Err(InterpreterError::DivisionByZero)
                    } else {
                        Ok(Value::Float(a % b))
                    }
                }
                Greater => Ok(Value::Bool(a > b)),
                Less => Ok(Value::Bool(a < b)),
                GreaterEqual => Ok(Value::Bool(a >= b)),
                LessEqual => Ok(Value::Bool(a <= b)),
                Equal | NotEqual | And | Or => unreachable!("handled above"),
            }
        }
        (Value::Str(a), Value::Str(b)) => match op {
            Add => Ok(Value::Str(format!("{a}{b}"))),
            _ => Err(mismatch(&left, &right).into()),
        },
        (Value::List(a), Value::List(b)) => match op {
            Add => {
                let mut combined = a.borrow().clone();
                combined.extend(b.borrow().iter().cloned());
                Ok(Value::list(combined))
            }
            _ => Err(mismatch(&left, &right).into()),
        },
        _ => Err(mismatch(&left, &right).into()),
    }
}

fn apply_unary(op: UnaryOperator, operand: Value) -> EvalOutcome {
    match (op, &operand) {
        (UnaryOperator::Not, Value::Bool(value)) => Ok(Value::Bool(!value)),
        (UnaryOperator::Not, other) => Err(TypeMismatchError::new(
            "!",
            format!("se esperaba booleano, se obtuvo {}", other.type_name()),
        )
        .into()),
        (UnaryOperator::Neg, Value::Int(value)) => Ok(Value::Int(-value)),
        (UnaryOperator::Neg, Value::Float(value)) => Ok(Value::Float(-value)),
        (UnaryOperator::Neg, other) => Err(TypeMismatchError::new(
            "-",
            format!("se esperaba un número, se obtuvo {}", other.type_name()),
        )
        .into()),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
            a.to_f64().is_some_and(|a| a == *b)
        }
        _ => left == right,
    }
}

fn numeric_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => n.to_f64(),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn list_index(index: &Value, len: usize) -> Result<usize, InterpreterError> {
    let Value::Int(raw) = index else {
        return Err(InterpreterError::ExpectedIntegerIndex {
            got: index.type_name().to_string(),
        });
    };
    let position = raw.to_i64().unwrap_or(i64::MAX);
    if position < 0 || position as usize >= len {
        return Err(InterpreterError::IndexOutOfBounds {
            index: position,
            len,
        });
    }
    Ok(position as usize)
}

fn match_pattern(pattern: &Pattern, value: &Value) -> Option<Vec<(String, Value)>> {
    match pattern {
        Pattern::Wildcard => Some(Vec::new()),
        Pattern::Literal(literal) => {
            values_equal(&literal_value(literal), value).then(Vec::new)
        }
        Pattern::Binding(name) => Some(vec![(name.clone(), value.clone())]),
        Pattern::Tuple(patterns) => {
            let Value::List(values) = value else {
                return None;
            };
            let values = values.borrow();
            if values.len() != patterns.len() {
                return None;
            }
            let mut bindings = Vec::new();
            for (pattern, value) in patterns.iter().zip(values.iter()) {
                bindings.extend(match_pattern(pattern, value)?);
            }
            Some(bindings)
        }
    }
}
