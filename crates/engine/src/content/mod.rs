mod compiler;
mod database;
mod hashing;

pub use compiler::{compile_def_database, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{DefDatabase, LevelDef};
pub use hashing::sha256_hex;
