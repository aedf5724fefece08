//! Completeness checking
//!
//! A tree is complete when every object it names is present in the store and
//! every subtree is itself complete. A commit is complete when it and all of
//! its ancestors parse and every one of them has a complete tree.
//!
//! Results are memoized per checker: a verified object is never read again and
//! a known-incomplete one fails immediately. Reflog expiry asks about the same
//! commits once per entry, so after the first full walk of a subgraph every
//! later question about it is answered from the state map.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::reachable::pool::{Lookup, ObjectPool};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalState {
    #[default]
    Unvisited,
    /// On the worklist of the commit check in progress
    Studying,
    Complete,
    Incomplete,
}

#[derive(Debug, Default)]
pub struct CompletenessChecker {
    states: HashMap<ObjectId, TraversalState>,
}

impl CompletenessChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from objects already known to be complete, e.g. everything reachable from refs
    pub fn with_known_complete(oids: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            states: oids
                .into_iter()
                .map(|oid| (oid, TraversalState::Complete))
                .collect(),
        }
    }

    pub fn state(&self, oid: &ObjectId) -> TraversalState {
        self.states.get(oid).copied().unwrap_or_default()
    }

    fn set_state(&mut self, oid: &ObjectId, state: TraversalState) {
        self.states.insert(oid.clone(), state);
    }

    pub fn is_tree_complete(&mut self, pool: &ObjectPool, tree_oid: &ObjectId) -> anyhow::Result<bool> {
        match self.state(tree_oid) {
            TraversalState::Complete => return Ok(true),
            TraversalState::Incomplete => return Ok(false),
            TraversalState::Unvisited | TraversalState::Studying => {}
        }

        let Lookup::Found(tree) = pool.tree(tree_oid)? else {
            self.set_state(tree_oid, TraversalState::Incomplete);
            return Ok(false);
        };

        let mut complete = true;
        for entry in tree.entries() {
            // submodule commits live in another repository
            if entry.mode.is_gitlink() {
                continue;
            }

            if !pool.exists(&entry.oid)
                || (entry.is_tree() && !self.is_tree_complete(pool, &entry.oid)?)
            {
                complete = false;
                break;
            }
        }

        let state = if complete {
            TraversalState::Complete
        } else {
            TraversalState::Incomplete
        };
        self.set_state(tree_oid, state);

        Ok(complete)
    }

    pub fn is_commit_complete(
        &mut self,
        pool: &ObjectPool,
        commit_oid: &ObjectId,
    ) -> anyhow::Result<bool> {
        match self.state(commit_oid) {
            TraversalState::Complete => return Ok(true),
            TraversalState::Incomplete => return Ok(false),
            TraversalState::Unvisited | TraversalState::Studying => {}
        }

        let mut study = vec![commit_oid.clone()];
        let mut found = vec![commit_oid.clone()];
        self.set_state(commit_oid, TraversalState::Studying);

        let mut complete = self.study_ancestors(pool, &mut study, &mut found)?;

        if complete {
            for oid in &found {
                if self.state(oid) == TraversalState::Complete {
                    continue;
                }

                // parsed by the ancestor walk, so served from the pool cache
                let Lookup::Found(commit) = pool.commit(oid)? else {
                    complete = false;
                    continue;
                };

                if !self.is_tree_complete(pool, commit.tree_oid())? {
                    complete = false;
                    self.set_state(oid, TraversalState::Incomplete);
                }
            }
        }

        for oid in &found {
            let next = match self.state(oid) {
                TraversalState::Studying if complete => TraversalState::Complete,
                TraversalState::Studying => TraversalState::Unvisited,
                state => state,
            };
            self.set_state(oid, next);
        }

        if !complete {
            self.set_state(commit_oid, TraversalState::Incomplete);
        }

        debug!(
            commit = %commit_oid,
            visited = found.len(),
            complete,
            "checked commit completeness"
        );

        Ok(complete)
    }

    /// Walk every ancestor of the worklist; false as soon as one cannot be parsed
    fn study_ancestors(
        &mut self,
        pool: &ObjectPool,
        study: &mut Vec<ObjectId>,
        found: &mut Vec<ObjectId>,
    ) -> anyhow::Result<bool> {
        while let Some(oid) = study.pop() {
            let Lookup::Found(commit) = pool.commit(&oid)? else {
                self.set_state(&oid, TraversalState::Incomplete);
                return Ok(false);
            };

            for parent in commit.parents() {
                match self.state(parent) {
                    TraversalState::Complete | TraversalState::Studying => {}
                    TraversalState::Incomplete => return Ok(false),
                    TraversalState::Unvisited => {
                        self.set_state(parent, TraversalState::Studying);
                        study.push(parent.clone());
                        found.push(parent.clone());
                    }
                }
            }
        }

        Ok(true)
    }
}
