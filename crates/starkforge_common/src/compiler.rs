//! Interface to the contract compiler.

use std::path::{Path, PathBuf};

use crate::class::ContractClass;

/// Errors returned by a [`Compiler`].
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("contract {} not found", path.display())]
    NotFound { path: PathBuf },
}

/// Compiles contract sources.
///
/// The test collector only needs [`Compiler::function_names`]; the execution
/// environment compiles test suites and declared contracts with
/// [`Compiler::compile_contract`].
pub trait Compiler: Send + Sync {
    fn compile_contract(&self, path: &Path) -> Result<ContractClass, CompileError>;

    /// Names of all functions defined in the file, in declaration order.
    fn function_names(&self, path: &Path) -> Result<Vec<String>, CompileError>;
}
