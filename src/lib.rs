pub mod analysis;
pub mod builtin;
pub mod codegen;
pub mod generate;
pub mod lexer;
pub mod loader;
pub mod manifest;
pub mod parser;
pub mod sources;
pub mod types;

pub use analysis::solve::Solution;
pub use analysis::AnalysisError;
pub use generate::{check, diff, generate, show, DiffOutcome, Options};
pub use loader::{load_workspace, LoadError, Workspace};
pub use manifest::Manifest;
pub use types::{TypeId, TypeStore};
