//! Porcelain commands (user-facing operations)
//!
//! ## Commands
//!
//! - `init`: Initialize a new repository
//! - `reflog`: Expire reflogs, delete single entries, check for a reflog
//! - `prune`: Remove unreachable loose objects

pub mod init;
pub mod prune;
pub mod reflog;
