//! Git data structures and algorithms
//!
//! - `database`: Tree entry types
//! - `objects`: Git object types (blob, tree, commit, tag)
//! - `reachable`: Completeness checks, reachability marking and recent objects
//! - `reflog`: Reflog entries, expiry dates and the expiry policy

pub mod database;
pub mod objects;
pub mod reachable;
pub mod reflog;
