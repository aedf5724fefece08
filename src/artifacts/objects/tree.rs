//! Git tree object
//!
//! Trees represent directory snapshots. They contain entries for files (blobs),
//! subdirectories (other trees) and submodules, along with their names and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! Entries are ordered by name, with directory names compared as if they
//! carried a trailing `/`.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::database::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<DatabaseEntry>,
}

impl Tree {
    pub fn new(mut entries: Vec<DatabaseEntry>) -> Self {
        entries.sort_by_key(Self::sort_key);
        Self { entries }
    }

    fn sort_key(entry: &DatabaseEntry) -> String {
        if entry.is_tree() {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &DatabaseEntry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = DatabaseEntry> {
        self.entries.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Packable for Tree {
    fn serialize_payload(&self) -> anyhow::Result<Bytes> {
        let mut content_bytes = Vec::new();

        for entry in &self.entries {
            let header = format!("{} {}", entry.mode.as_str(), entry.name);
            content_bytes.write_all(header.as_bytes())?;
            content_bytes.push(0);
            entry.oid.write_h40_to(&mut content_bytes)?;
        }

        Ok(content_bytes.into())
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = Vec::new();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in mode"));
            }

            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in name"));
            }
            let name = std::str::from_utf8(&name_bytes)?.to_owned();

            let oid =
                ObjectId::read_h40_from(&mut reader).context("unexpected EOF in object id")?;

            entries.push(DatabaseEntry::new(name, oid, mode));
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}
