//! Content-addressed cache for token streams and ASTs.
//!
//! Artifacts are keyed by the SHA-256 of the exact source text, so a cached
//! entry can never go stale: different text hashes to a different key, and
//! identical text always serializes to identical bytes, which also makes
//! concurrent writers of the same key benign. Tokens (`.tok`), full-program
//! ASTs (`.ast`), and REPL fragments (`fragmentos/`) live in separate
//! namespaces. The directory is caller-configurable and created lazily.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::ast::Statement;
use crate::lexer::{self, LexerError};
use crate::parser::{self, ParserError};
use crate::token::Token;

/// Environment variable overriding the default cache directory.
pub const CACHE_DIR_ENV: &str = "COBRA_AST_CACHE";

const TOKEN_EXT: &str = "tok";
const AST_EXT: &str = "ast";
const FRAGMENT_DIR: &str = "fragmentos";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Error de E/S en la caché: {0}")]
    Io(#[from] std::io::Error),
    #[error("Artefacto de caché inválido: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parser(#[from] ParserError),
}

pub struct AstCache {
    dir: PathBuf,
}

impl AstCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Honors `COBRA_AST_CACHE`, falling back to `cache/` in the working
    /// directory.
    pub fn from_env() -> Self {
        let dir = std::env::var(CACHE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("cache"));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached token stream for `source`, lexing and persisting on a miss.
    pub fn get_tokens(&self, source: &str) -> Result<Vec<Token>, CacheError> {
        self.tokens_at(self.artifact_path(&self.dir, source, TOKEN_EXT), source)
    }

    /// Cached AST for `source`, computing (via the token cache) on a miss.
    pub fn get_ast(&self, source: &str) -> Result<Vec<Statement>, CacheError> {
        let path = self.artifact_path(&self.dir, source, AST_EXT);
        if path.exists() {
            return Ok(serde_json::from_str(&fs::read_to_string(&path)?)?);
        }
        let tokens = self.get_tokens(source)?;
        let ast = parser::parse_tokens(tokens)?;
        self.persist(&path, &ast)?;
        Ok(ast)
    }

    /// Token stream for a partial program, cached under the fragment
    /// namespace.
    pub fn get_fragment_tokens(&self, source: &str) -> Result<Vec<Token>, CacheError> {
        let dir = self.dir.join(FRAGMENT_DIR);
        self.tokens_at(self.artifact_path(&dir, source, TOKEN_EXT), source)
    }

    /// AST for a partial program, cached under the fragment namespace.
    pub fn get_fragment_ast(&self, source: &str) -> Result<Vec<Statement>, CacheError> {
        let dir = self.dir.join(FRAGMENT_DIR);
        let path = self.artifact_path(&dir, source, AST_EXT);
        if path.exists() {
            return Ok(serde_json::from_str(&fs::read_to_string(&path)?)?);
        }
        let tokens = self.get_fragment_tokens(source)?;
        let ast = parser::parse_tokens(tokens)?;
        self.persist(&path, &ast)?;
        Ok(ast)
    }

    /// Removes every cache artifact, fragments included.
    pub fn clear_cache(&self) -> Result<(), CacheError> {
        if !self.dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                let known = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == TOKEN_EXT || ext == AST_EXT);
                if known {
                    fs::remove_file(&path)?;
                }
            } else if path.is_dir() && path.file_name().is_some_and(|name| name == FRAGMENT_DIR) {
                fs::remove_dir_all(&path)?;
            }
        }
        Ok(())
    }

    fn tokens_at(&self, path: PathBuf, source: &str) -> Result<Vec<Token>, CacheError> {
        if path.exists() {
            return Ok(serde_json::from_str(&fs::read_to_string(&path)?)?);
        }
        let tokens = lexer::tokenize(source)?;
        self.persist(&path, &tokens)?;
        Ok(tokens)
    }

    fn persist<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(value)?)?;
        Ok(())
    }

    fn artifact_path(&self, dir: &Path, source: &str, extension: &str) -> PathBuf {
        dir.join(format!("{}.{extension}", content_hash(source)))
    }
}

fn content_hash(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PROGRAM: &str = "var x = 1 + 2\nimprimir(x)";

    #[test]
    fn caches_tokens_and_ast_on_first_use() {
        let dir = tempdir().expect("tempdir failed");
        let cache = AstCache::new(dir.path());

        let first = cache.get_ast(PROGRAM).expect("first get_ast failed");
        let key = content_hash(PROGRAM);
        assert!(dir.path().join(format!("{key}.tok")).exists());
        assert!(dir.path().join(format!("{key}.ast")).exists());

        let second = cache.get_ast(PROGRAM).expect("second get_ast failed");
        assert_eq!(first, second);
    }

    #[test]
    fn hit_reads_the_artifact_instead_of_reparsing() {
        let dir = tempdir().expect("tempdir failed");
        let cache = AstCache::new(dir.path());
        cache.get_ast(PROGRAM).expect("get_ast failed");

        // Replace the artifact with a different program's AST; a cache hit
        // must return the replaced content untouched.
        let planted = cache.get_fragment_ast("imprimir(99)").expect("fragment failed");
        let path = dir.path().join(format!("{}.ast", content_hash(PROGRAM)));
        std::fs::write(&path, serde_json::to_string(&planted).unwrap()).unwrap();

        let loaded = cache.get_ast(PROGRAM).expect("cached get_ast failed");
        assert_eq!(loaded, planted);
    }

    #[test]
    fn fragments_use_their_own_namespace() {
        let dir = tempdir().expect("tempdir failed");
        let cache = AstCache::new(dir.path());
        let key = content_hash(PROGRAM);

        cache
            .get_fragment_ast(PROGRAM)
            .expect("fragment get_ast failed");
        assert!(dir
            .path()
            .join(FRAGMENT_DIR)
            .join(format!("{key}.ast"))
            .exists());
        assert!(!dir.path().join(format!("{key}.ast")).exists());
    }

    #[test]
    fn clear_cache_removes_all_artifacts() {
        let dir = tempdir().expect("tempdir failed");
        let cache = AstCache::new(dir.path());
        cache.get_ast(PROGRAM).expect("get_ast failed");
        cache.get_fragment_tokens("1 + 1").expect("fragment failed");

        cache.clear_cache().expect("clear failed");
        let remaining: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir failed")
            .collect();
        assert!(remaining.is_empty());
    }

    #[test]
    fn lexer_and_parser_errors_pass_through() {
        let dir = tempdir().expect("tempdir failed");
        let cache = AstCache::new(dir.path());
        assert!(matches!(
            cache.get_tokens("var $ = 1"),
            Err(CacheError::Lexer(_))
        ));
        assert!(matches!(
            cache.get_ast("var fin = 1"),
            Err(CacheError::Parser(_))
        ));
    }

    #[test]
    fn round_trips_every_parsed_construct() {
        let dir = tempdir().expect("tempdir failed");
        let cache = AstCache::new(dir.path());
        let source = indoc::indoc! {"
            @decorado
            func media<T>(a, b):
                retorno (a + b) / 2
            fin
            clase Punto(Base):
                metodo inicializar(self, x):
                    self.x = x
                fin
            fin
            switch p:
            case (0, y) si y > 0:
                imprimir(y)
            sino:
                pasar
            fin
            intentar:
                lanzar 'x'
            capturar e:
                pasar
            finalmente:
                pasar
            fin
            var o = Some(3.5)
            esperar tarea()
        "};
        let direct = parser::parse_tokens(lexer::tokenize(source).unwrap()).unwrap();
        let via_cache = cache.get_ast(source).expect("get_ast failed");
        assert_eq!(direct, via_cache);

        let reloaded = cache.get_ast(source).expect("cached get_ast failed");
        assert_eq!(direct, reloaded);
    }
}
