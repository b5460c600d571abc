//! Contract for code-generation backends.
//!
//! A backend receives the optimized (and, when the caller asked for it,
//! validated) top-level node sequence and renders target-language source
//! text. Every target-syntax decision belongs to the backend; the core
//! only guarantees the shape of the tree it hands over.

use anyhow::Result;

use crate::ast::Statement;

pub trait Backend {
    fn name(&self) -> &'static str;
    fn generate_code(&self, statements: &[Statement]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression;

    /// Minimal renderer proving the contract is implementable from
    /// outside the core: it writes one line per top-level statement kind.
    struct OutlineBackend;

    impl Backend for OutlineBackend {
        fn name(&self) -> &'static str {
            "outline"
        }

        fn generate_code(&self, statements: &[Statement]) -> Result<String> {
            let mut lines = Vec::new();
            for statement in statements {
                let line = match statement {
                    Statement::FunctionDef { name, params, .. } => {
                        format!("fn {name}/{}", params.len())
                    }
                    Statement::Assign { .. } => "assign".to_string(),
                    Statement::Print(_) => "print".to_string(),
                    _ => "stmt".to_string(),
                };
                lines.push(line);
            }
            Ok(lines.join("\n"))
        }
    }

    #[test]
    fn backends_consume_the_top_level_node_sequence() {
        let statements = vec![
            Statement::FunctionDef {
                name: "doble".to_string(),
                params: vec!["x".to_string()],
                type_params: vec![],
                decorators: vec![],
                body: vec![Statement::Return(Some(Expression::identifier("x")))],
                is_async: false,
            },
            Statement::Print(Expression::int(1)),
        ];
        let backend = OutlineBackend;
        assert_eq!(backend.name(), "outline");
        assert_eq!(
            backend.generate_code(&statements).expect("render failed"),
            "fn doble/1\nprint"
        );
    }
}
