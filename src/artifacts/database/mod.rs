//! Database entry types
//!
//! Types used when reading tree objects back from the object store: each entry
//! names an object together with its mode.

pub mod database_entry;
pub mod entry_mode;
