//! In-memory object and ref stores for unit tests
//!
//! Objects are kept serialized so every lookup goes through the same parsing
//! as on disk, and every read is counted.

use crate::Timestamp;
use crate::areas::object_store::{ObjectStore, PackInfo, RawObject, StoreError};
use crate::areas::refs::{RefStore, RefValue};
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::database::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object::{Object, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::reflog::entry::ReflogEntry;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RefCell<HashMap<ObjectId, RawObject>>,
    corrupt: RefCell<HashSet<ObjectId>>,
    mtimes: RefCell<HashMap<ObjectId, Timestamp>>,
    packed: RefCell<BTreeMap<ObjectId, PackInfo>>,
    reads: Cell<usize>,
    counter: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, object: &impl Object) -> ObjectId {
        let oid = object.object_id().unwrap();
        let payload = object.serialize_payload().unwrap();

        self.objects
            .borrow_mut()
            .insert(oid.clone(), RawObject::new(object.object_type(), payload));
        oid
    }

    pub fn blob(&self, content: &str) -> ObjectId {
        self.insert(&Blob::from(content))
    }

    pub fn tree(&self, entries: &[DatabaseEntry]) -> ObjectId {
        self.insert(&Tree::new(entries.to_vec()))
    }

    /// A commit dated `date` with a tree of its own holding one unique blob
    pub fn commit(&self, parents: &[ObjectId], date: Timestamp) -> ObjectId {
        let n = self.counter.get();
        self.counter.set(n + 1);

        let blob = self.blob(&format!("content {n}"));
        let tree = self.tree(&[file_entry("file.txt", blob)]);
        self.commit_with_tree(parents, tree, date)
    }

    pub fn commit_with_tree(
        &self,
        parents: &[ObjectId],
        tree: ObjectId,
        date: Timestamp,
    ) -> ObjectId {
        let n = self.counter.get();
        self.counter.set(n + 1);

        let author = Author::at_epoch("A U Thor".into(), "author@example.com".into(), date).unwrap();
        self.insert(&Commit::new(
            parents.to_vec(),
            tree,
            author,
            format!("commit {n}\n"),
        ))
    }

    pub fn tag(&self, target: &ObjectId, target_type: ObjectType) -> ObjectId {
        let n = self.counter.get();
        self.counter.set(n + 1);

        self.insert(&Tag::new(
            target.clone(),
            target_type,
            format!("v{n}"),
            String::new(),
        ))
    }

    pub fn tree_of(&self, commit: &ObjectId) -> ObjectId {
        let raw = self.objects.borrow()[commit].clone();
        let commit = Commit::deserialize(std::io::Cursor::new(raw.payload)).unwrap();
        commit.tree_oid().clone()
    }

    pub fn remove(&self, oid: &ObjectId) {
        self.objects.borrow_mut().remove(oid);
    }

    pub fn corrupt(&self, oid: &ObjectId) {
        self.corrupt.borrow_mut().insert(oid.clone());
    }

    pub fn set_mtime(&self, oid: &ObjectId, mtime: Timestamp) {
        self.mtimes.borrow_mut().insert(oid.clone(), mtime);
    }

    /// Move an object from the loose set into a pack
    pub fn pack(&self, oid: &ObjectId, pack: PackInfo) {
        self.packed.borrow_mut().insert(oid.clone(), pack);
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl ObjectStore for MemoryStore {
    fn read_object(&self, oid: &ObjectId) -> Result<Option<RawObject>, StoreError> {
        self.reads.set(self.reads.get() + 1);

        if self.corrupt.borrow().contains(oid) {
            return Err(StoreError::Corrupt {
                oid: oid.clone(),
                reason: "damaged in test".into(),
            });
        }

        Ok(self.objects.borrow().get(oid).cloned())
    }

    fn object_exists(&self, oid: &ObjectId) -> bool {
        self.objects.borrow().contains_key(oid)
    }

    fn for_each_loose_object(
        &self,
        visit: &mut dyn FnMut(&ObjectId, Timestamp) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let mut loose = self
            .objects
            .borrow()
            .keys()
            .filter(|oid| !self.packed.borrow().contains_key(*oid))
            .cloned()
            .collect::<Vec<_>>();
        loose.sort();

        for oid in loose {
            let mtime = self.mtimes.borrow().get(&oid).copied().unwrap_or_default();
            visit(&oid, mtime)?;
        }

        Ok(())
    }

    fn for_each_packed_object(
        &self,
        visit: &mut dyn FnMut(&ObjectId, &PackInfo) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let packed = self.packed.borrow().clone();
        for (oid, pack) in &packed {
            visit(oid, pack)?;
        }

        Ok(())
    }
}

pub fn file_entry(name: &str, oid: ObjectId) -> DatabaseEntry {
    DatabaseEntry::new(name.into(), oid, EntryMode::File(FileMode::Regular))
}

pub fn dir_entry(name: &str, oid: ObjectId) -> DatabaseEntry {
    DatabaseEntry::new(name.into(), oid, EntryMode::Directory)
}

pub fn reflog_entry(old: &ObjectId, new: &ObjectId, timestamp: Timestamp) -> ReflogEntry {
    ReflogEntry::new(
        old.clone(),
        new.clone(),
        "A U Thor <author@example.com>".into(),
        timestamp,
        "+0000".into(),
        format!("update to {}", new.to_short_oid()),
    )
}

#[derive(Debug, Default)]
pub struct MemoryRefs {
    refs: RefCell<BTreeMap<String, RefValue>>,
    reflogs: RefCell<BTreeMap<String, Vec<ReflogEntry>>>,
}

impl MemoryRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, refname: &str, oid: &ObjectId) {
        self.refs
            .borrow_mut()
            .insert(refname.into(), RefValue::Direct(oid.clone()));
    }

    pub fn set_symbolic(&self, refname: &str, target: &str) {
        self.refs
            .borrow_mut()
            .insert(refname.into(), RefValue::Symbolic(target.into()));
    }

    pub fn delete(&self, refname: &str) {
        self.refs.borrow_mut().remove(refname);
    }

    pub fn log(&self, refname: &str, entry: ReflogEntry) {
        self.reflogs
            .borrow_mut()
            .entry(refname.into())
            .or_default()
            .push(entry);
    }
}

impl RefStore for MemoryRefs {
    fn for_each_ref(
        &self,
        visit: &mut dyn FnMut(&str, &RefValue) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let refs = self.refs.borrow().clone();
        for (name, value) in refs.iter().filter(|(name, _)| name.starts_with("refs/")) {
            visit(name, value)?;
        }

        Ok(())
    }

    fn resolve_ref(&self, refname: &str) -> anyhow::Result<Option<ObjectId>> {
        let mut current = refname.to_string();

        loop {
            match self.read_ref_value(&current)? {
                Some(RefValue::Direct(oid)) => return Ok(Some(oid)),
                Some(RefValue::Symbolic(target)) => current = target,
                None => return Ok(None),
            }
        }
    }

    fn read_ref_value(&self, refname: &str) -> anyhow::Result<Option<RefValue>> {
        Ok(self.refs.borrow().get(refname).cloned())
    }

    fn update_ref(&self, refname: &str, oid: &ObjectId) -> anyhow::Result<()> {
        match self.read_ref_value(refname)? {
            Some(RefValue::Symbolic(target)) => self.update_ref(&target, oid),
            _ => {
                self.set(refname, oid);
                Ok(())
            }
        }
    }

    fn read_reflog(&self, refname: &str) -> anyhow::Result<Vec<ReflogEntry>> {
        Ok(self
            .reflogs
            .borrow()
            .get(refname)
            .cloned()
            .unwrap_or_default())
    }

    fn write_reflog(&self, refname: &str, entries: &[ReflogEntry]) -> anyhow::Result<()> {
        self.reflogs
            .borrow_mut()
            .insert(refname.into(), entries.to_vec());
        Ok(())
    }

    fn reflog_exists(&self, refname: &str) -> bool {
        self.reflogs.borrow().contains_key(refname)
    }

    fn list_reflogs(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.reflogs.borrow().keys().cloned().collect())
    }
}
