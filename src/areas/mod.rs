//! Core repository components
//!
//! This module contains the on-disk building blocks of a repository:
//!
//! - `config`: `.git/bit.toml` settings for expiry and pruning
//! - `database`: Loose object database for blobs, trees, commits and tags
//! - `object_store`: The read interface every traversal goes through
//! - `refs`: Reference and reflog management (branches, HEAD, tags)
//! - `repository`: High-level repository handle tying the areas together

pub mod config;
pub mod database;
pub mod object_store;
pub mod refs;
pub mod repository;
