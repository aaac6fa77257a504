//! jinsql project layer
//!
//! Turns a directory of templated SQL into compiled SQL:
//! - `catalog`: discovers macro, model and test files and indexes their names
//! - `workpool`: runs per-file work on a fixed number of threads
//! - `compiler`: renders models and tests with the project functions bound

pub mod catalog;
pub mod compiler;
pub mod error;
pub mod file;
pub mod workpool;

pub use catalog::FileCatalog;
pub use compiler::{CompiledProject, ProjectCompiler};
pub use error::{CatalogError, CompileError, ProjectError};
pub use file::{File, FileType};
pub use workpool::{PoolOutcome, WorkPool};
