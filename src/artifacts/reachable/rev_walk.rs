//! Object graph traversal
//!
//! A [`RevWalk`] starts from pending roots and visits every object reachable
//! from them: commits lead to their parents and trees, tags to their targets,
//! trees to their entries. Each object is visited at most once per walk; the
//! set of visited objects is the walk's SEEN set and survives between
//! traversals, so roots added later only contribute what is new.
//!
//! Links to objects that cannot be read are ignored rather than fatal. Blobs
//! are recorded from the tree entry alone and never read.

use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::reachable::pool::{Lookup, ObjectPool};
use std::collections::HashSet;
use tracing::debug;

pub struct RevWalk<'p> {
    pool: &'p ObjectPool<'p>,
    pending: Vec<(ObjectId, Option<ObjectType>)>,
    seen: HashSet<ObjectId>,
}

impl<'p> RevWalk<'p> {
    pub fn new(pool: &'p ObjectPool<'p>) -> Self {
        Self {
            pool,
            pending: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn pool(&self) -> &'p ObjectPool<'p> {
        self.pool
    }

    /// Add a root whose type will be looked up when it is reached
    pub fn add_pending(&mut self, oid: ObjectId) {
        if !oid.is_null() {
            self.pending.push((oid, None));
        }
    }

    /// Add a root of known type; trees and blobs are then not read up front
    pub fn add_pending_typed(&mut self, oid: ObjectId, object_type: ObjectType) {
        if !oid.is_null() {
            self.pending.push((oid, Some(object_type)));
        }
    }

    pub fn pending_roots(&self) -> Vec<ObjectId> {
        self.pending.iter().map(|(oid, _)| oid.clone()).collect()
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn is_seen(&self, oid: &ObjectId) -> bool {
        self.seen.contains(oid)
    }

    pub fn mark_seen(&mut self, oid: ObjectId) -> bool {
        self.seen.insert(oid)
    }

    pub fn seen(&self) -> &HashSet<ObjectId> {
        &self.seen
    }

    pub fn into_seen(self) -> HashSet<ObjectId> {
        self.seen
    }

    /// Visit everything reachable from the pending roots, draining them
    pub fn traverse(
        &mut self,
        per_commit: &mut dyn FnMut(&ObjectId, &Commit) -> anyhow::Result<()>,
        per_object: &mut dyn FnMut(&ObjectId, ObjectType) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let mut stack = std::mem::take(&mut self.pending);
        stack.reverse();

        while let Some((oid, hint)) = stack.pop() {
            if self.seen.contains(&oid) {
                continue;
            }

            let object_type = match hint {
                Some(object_type) => object_type,
                None => match self.pool.object_type(&oid)? {
                    Lookup::Found(object_type) => object_type,
                    _ => {
                        debug!(oid = %oid, "skipping unreadable root");
                        continue;
                    }
                },
            };

            match object_type {
                ObjectType::Commit => match self.pool.commit(&oid)? {
                    Lookup::Found(commit) => {
                        self.seen.insert(oid.clone());
                        per_commit(&oid, &commit)?;

                        stack.push((commit.tree_oid().clone(), Some(ObjectType::Tree)));
                        for parent in commit.parents().iter().rev() {
                            stack.push((parent.clone(), Some(ObjectType::Commit)));
                        }
                    }
                    Lookup::WrongType(actual) => stack.push((oid, Some(actual))),
                    Lookup::Missing | Lookup::Corrupt => {}
                },
                ObjectType::Tag => match self.pool.tag(&oid)? {
                    Lookup::Found(tag) => {
                        self.seen.insert(oid.clone());
                        per_object(&oid, ObjectType::Tag)?;

                        stack.push((tag.target().clone(), Some(tag.target_type())));
                    }
                    Lookup::WrongType(actual) => stack.push((oid, Some(actual))),
                    Lookup::Missing | Lookup::Corrupt => {}
                },
                ObjectType::Tree => match self.pool.tree(&oid)? {
                    Lookup::Found(tree) => {
                        self.seen.insert(oid.clone());
                        per_object(&oid, ObjectType::Tree)?;

                        for entry in tree.into_entries() {
                            if entry.mode.is_gitlink() {
                                continue;
                            }

                            let entry_type = if entry.is_tree() {
                                ObjectType::Tree
                            } else {
                                ObjectType::Blob
                            };
                            stack.push((entry.oid, Some(entry_type)));
                        }
                    }
                    Lookup::WrongType(actual) => stack.push((oid, Some(actual))),
                    Lookup::Missing | Lookup::Corrupt => {}
                },
                ObjectType::Blob => {
                    self.seen.insert(oid.clone());
                    per_object(&oid, ObjectType::Blob)?;
                }
            }
        }

        Ok(())
    }
}
