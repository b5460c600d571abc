//! Hierarchical symbol table and the declaration analysis built on it.
//!
//! Scopes nest with parent lookup; each symbol records whether the name is
//! a variable, function, or class. The analysis declares every definition
//! a program introduces and rejects duplicate function/class definitions
//! in the same scope. Variables may be re-assigned freely.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ast::Statement;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("Símbolo ya declarado en este ámbito: {name}")]
    DuplicateSymbol { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

#[derive(Default, Debug)]
struct Scope {
    symbols: FxHashMap<String, Symbol>,
}

/// Stack of scopes: the first entry is the global scope, later entries are
/// definition bodies. Resolution walks from the innermost scope outward.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declares `name` in the current scope. Functions and classes may not
    /// be declared twice in one scope; variables overwrite silently.
    pub fn declare(&mut self, name: &str, kind: SymbolKind) -> Result<(), SemanticError> {
        let scope = self.scopes.last_mut().expect("global scope present");
        if let Some(existing) = scope.symbols.get(name) {
            if kind != SymbolKind::Variable || existing.kind != SymbolKind::Variable {
                return Err(SemanticError::DuplicateSymbol {
                    name: name.to_string(),
                });
            }
        }
        scope.symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                kind,
            },
        );
        Ok(())
    }

    /// Resolves `name` in this scope or any enclosing one.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
    }

    /// Resolves `name` in the current scope only.
    pub fn resolve_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .last()
            .and_then(|scope| scope.symbols.get(name))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the symbol table for a parsed program.
pub fn analyze(statements: &[Statement]) -> Result<SymbolTable, SemanticError> {
    let mut table = SymbolTable::new();
    declare_block(&mut table, statements)?;
    Ok(table)
}

fn declare_block(table: &mut SymbolTable, statements: &[Statement]) -> Result<(), SemanticError> {
    for statement in statements {
        declare_statement(table, statement)?;
    }
    Ok(())
}

fn declare_statement(table: &mut SymbolTable, statement: &Statement) -> Result<(), SemanticError> {
    match statement {
        Statement::Assign { target, .. } => {
            if let crate::ast::AssignTarget::Name(name) = target {
                table.declare(name, SymbolKind::Variable)?;
            }
            Ok(())
        }
        Statement::FunctionDef {
            name, params, body, ..
        }
        | Statement::MethodDef {
            name, params, body, ..
        } => {
            table.declare(name, SymbolKind::Function)?;
            table.push_scope();
            for param in params {
                table.declare(param, SymbolKind::Variable)?;
            }
            let result = declare_block(table, body);
            table.pop_scope();
            result
        }
        Statement::ClassDef { name, body, .. } => {
            table.declare(name, SymbolKind::Class)?;
            table.push_scope();
            let result = declare_block(table, body);
            table.pop_scope();
            result
        }
        Statement::InterfaceDef { name, .. } | Statement::EnumDef { name, .. } => {
            table.declare(name, SymbolKind::Class)
        }
        Statement::MacroDef { name, body } => {
            table.declare(name, SymbolKind::Function)?;
            table.push_scope();
            let result = declare_block(table, body);
            table.pop_scope();
            result
        }
        Statement::For { variable, body, .. } => {
            table.declare(variable, SymbolKind::Variable)?;
            declare_block(table, body)
        }
        Statement::If {
            then_body,
            else_body,
            ..
        } => {
            declare_block(table, then_body)?;
            declare_block(table, else_body)
        }
        Statement::While { body, .. } | Statement::With { body, .. } => {
            declare_block(table, body)
        }
        Statement::TryCatch {
            try_body,
            exception_name,
            catch_body,
            finally_body,
        } => {
            declare_block(table, try_body)?;
            if let Some(name) = exception_name {
                table.declare(name, SymbolKind::Variable)?;
            }
            declare_block(table, catch_body)?;
            declare_block(table, finally_body)
        }
        Statement::Switch { cases, default, .. } => {
            for case in cases {
                declare_block(table, &case.body)?;
            }
            declare_block(table, default)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;
    use indoc::indoc;

    fn parse(input: &str) -> Vec<Statement> {
        parse_tokens(tokenize(input).expect("tokenize failed")).expect("parse failed")
    }

    #[test]
    fn records_variables_functions_and_classes() {
        let table = analyze(&parse(indoc! {"
            var x = 1
            func f():
                pasar
            fin
            clase C:
                pasar
            fin
        "}))
        .expect("analysis failed");
        assert_eq!(table.resolve("x").map(|s| s.kind), Some(SymbolKind::Variable));
        assert_eq!(table.resolve("f").map(|s| s.kind), Some(SymbolKind::Function));
        assert_eq!(table.resolve("C").map(|s| s.kind), Some(SymbolKind::Class));
    }

    #[test]
    fn rejects_duplicate_function_definitions() {
        let err = analyze(&parse(indoc! {"
            func f():
                pasar
            fin
            func f():
                pasar
            fin
        "}))
        .expect_err("expected duplicate");
        assert_eq!(
            err,
            SemanticError::DuplicateSymbol {
                name: "f".to_string()
            }
        );
    }

    #[test]
    fn variables_may_be_reassigned() {
        assert!(analyze(&parse("var x = 1\nx = 2")).is_ok());
    }

    #[test]
    fn function_locals_stay_out_of_the_global_scope() {
        let table = analyze(&parse(indoc! {"
            func f(a):
                var local = 1
            fin
        "}))
        .expect("analysis failed");
        assert!(table.resolve("local").is_none());
        assert!(table.resolve("a").is_none());
    }

    #[test]
    fn parent_lookup_resolves_outer_symbols() {
        let mut table = SymbolTable::new();
        table.declare("global_x", SymbolKind::Variable).unwrap();
        table.push_scope();
        assert!(table.resolve("global_x").is_some());
        assert!(table.resolve_local("global_x").is_none());
        table.pop_scope();
    }
}
