//! Command implementations
//!
//! Each command is an `impl Repository` block under `porcelain`; the binary
//! only parses arguments and hands them over.

pub mod porcelain;
