//! Deduplicating object lookup
//!
//! Every traversal reads objects through one [`ObjectPool`]: commits are parsed
//! once and shared, tags are peeled on demand and trees are read without being
//! retained. Each lookup says whether the object was found, is missing, has
//! another type, or is corrupt; only I/O failures come back as errors.

use crate::areas::object_store::{ObjectStore, StoreError};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;
use tracing::{debug, warn};

/// Tags pointing at tags are peeled at most this deep
const MAX_PEEL_DEPTH: usize = 16;

/// Outcome of looking an object up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
    WrongType(ObjectType),
    Corrupt,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

pub struct ObjectPool<'s> {
    store: &'s dyn ObjectStore,
    commits: RefCell<HashMap<ObjectId, Rc<Commit>>>,
}

impl<'s> ObjectPool<'s> {
    pub fn new(store: &'s dyn ObjectStore) -> Self {
        Self {
            store,
            commits: RefCell::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &'s dyn ObjectStore {
        self.store
    }

    pub fn exists(&self, oid: &ObjectId) -> bool {
        self.store.object_exists(oid)
    }

    /// Type of an object, reading as little of it as the store allows
    pub fn object_type(&self, oid: &ObjectId) -> anyhow::Result<Lookup<ObjectType>> {
        if self.commits.borrow().contains_key(oid) {
            return Ok(Lookup::Found(ObjectType::Commit));
        }

        match self.store.object_type(oid) {
            Ok(Some(object_type)) => Ok(Lookup::Found(object_type)),
            Ok(None) => Ok(Lookup::Missing),
            Err(err) => Self::classify(oid, err),
        }
    }

    /// Parse the commit named by `oid`
    pub fn commit(&self, oid: &ObjectId) -> anyhow::Result<Lookup<Rc<Commit>>> {
        if let Some(commit) = self.commits.borrow().get(oid) {
            return Ok(Lookup::Found(commit.clone()));
        }

        let commit = match self.parse(oid, ObjectType::Commit, |reader| Commit::deserialize(reader))? {
            Lookup::Found(commit) => Rc::new(commit),
            Lookup::Missing => return Ok(Lookup::Missing),
            Lookup::WrongType(actual) => return Ok(Lookup::WrongType(actual)),
            Lookup::Corrupt => return Ok(Lookup::Corrupt),
        };

        self.commits
            .borrow_mut()
            .insert(oid.clone(), commit.clone());

        Ok(Lookup::Found(commit))
    }

    /// Peel tags until a commit is reached; returns the commit id with the commit
    pub fn commit_reference(
        &self,
        oid: &ObjectId,
    ) -> anyhow::Result<Lookup<(ObjectId, Rc<Commit>)>> {
        let mut current = oid.clone();

        for _ in 0..MAX_PEEL_DEPTH {
            match self.commit(&current)? {
                Lookup::Found(commit) => return Ok(Lookup::Found((current, commit))),
                Lookup::WrongType(ObjectType::Tag) => {}
                Lookup::WrongType(actual) => return Ok(Lookup::WrongType(actual)),
                Lookup::Missing => return Ok(Lookup::Missing),
                Lookup::Corrupt => return Ok(Lookup::Corrupt),
            }

            match self.tag(&current)? {
                Lookup::Found(tag) => current = tag.target().clone(),
                Lookup::Missing => return Ok(Lookup::Missing),
                Lookup::WrongType(actual) => return Ok(Lookup::WrongType(actual)),
                Lookup::Corrupt => return Ok(Lookup::Corrupt),
            }
        }

        warn!(oid = %oid, "tag chain too deep to peel");
        Ok(Lookup::Corrupt)
    }

    pub fn tag(&self, oid: &ObjectId) -> anyhow::Result<Lookup<Tag>> {
        self.parse(oid, ObjectType::Tag, |reader| Tag::deserialize(reader))
    }

    /// Read a tree; the buffer is not kept once the caller drops it
    pub fn tree(&self, oid: &ObjectId) -> anyhow::Result<Lookup<Tree>> {
        self.parse(oid, ObjectType::Tree, |reader| Tree::deserialize(reader))
    }

    fn parse<T>(
        &self,
        oid: &ObjectId,
        expected: ObjectType,
        deserialize: impl FnOnce(Cursor<bytes::Bytes>) -> anyhow::Result<T>,
    ) -> anyhow::Result<Lookup<T>> {
        let raw = match self.store.read_object(oid) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(oid = %oid, "object missing from store");
                return Ok(Lookup::Missing);
            }
            Err(err) => return Self::classify(oid, err),
        };

        if raw.object_type != expected {
            return Ok(Lookup::WrongType(raw.object_type));
        }

        match deserialize(Cursor::new(raw.payload)) {
            Ok(object) => Ok(Lookup::Found(object)),
            Err(err) => {
                warn!(oid = %oid, object_type = %expected, error = %err, "unparseable object");
                Ok(Lookup::Corrupt)
            }
        }
    }

    fn classify<T>(oid: &ObjectId, err: StoreError) -> anyhow::Result<Lookup<T>> {
        match err {
            StoreError::Corrupt { reason, .. } => {
                warn!(oid = %oid, reason = %reason, "corrupt object in store");
                Ok(Lookup::Corrupt)
            }
            StoreError::Io(err) => {
                Err(anyhow::Error::new(err).context(format!("Unable to read object {oid}")))
            }
        }
    }
}
