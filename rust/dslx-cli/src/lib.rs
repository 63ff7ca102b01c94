//! DSLX CLI
//!
//! Library half of the `dslx` binary: configuration lookup, logging setup,
//! the file-level commands and the parallel test runner. `main.rs` only
//! parses arguments and maps results to exit codes.

pub mod colors;
pub mod commands;
pub mod config;
pub mod logging;
pub mod test_cmd;

use dslx_bytecode::LoadError;
use dslx_core::ErrorKind;
use dslx_vm::VmError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
    #[error(transparent)]
    Vm(#[from] VmError),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no .bc files found in {}", .0.display())]
    NoSources(PathBuf),
}

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CliError::Load { source, .. } => source.kind(),
            CliError::Vm(e) => e.kind(),
            CliError::InvalidArgument(_) => ErrorKind::Parse,
            CliError::Io { .. } | CliError::Config(_) | CliError::Json(_) | CliError::NoSources(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }
}
