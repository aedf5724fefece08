//! Age-bounded, restartable reachability marking
//!
//! The marker walks parent links from a set of tip commits. Commits older than
//! the current limit are marked but not expanded; they are kept as the frontier
//! so a later call with a lower limit resumes from there instead of starting
//! over from the tips.

use crate::Timestamp;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::reachable::pool::{Lookup, ObjectPool};
use std::collections::HashSet;
use tracing::debug;

/// How deep the marker is allowed to walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigState {
    /// Commits dated before the limit are deferred
    Shallow(Timestamp),
    /// No age limit; the walk goes all the way to the roots
    Exhausted,
}

impl DigState {
    fn from_limit(limit: Timestamp) -> Self {
        if limit == 0 {
            DigState::Exhausted
        } else {
            DigState::Shallow(limit)
        }
    }

    fn limit(self) -> Timestamp {
        match self {
            DigState::Shallow(limit) => limit,
            DigState::Exhausted => 0,
        }
    }
}

#[derive(Debug)]
pub struct ReachabilityMarker {
    mark_list: Vec<ObjectId>,
    reached: HashSet<ObjectId>,
    dig: DigState,
}

impl ReachabilityMarker {
    pub fn new(tips: impl IntoIterator<Item = ObjectId>, limit: Timestamp) -> Self {
        Self {
            mark_list: tips.into_iter().collect(),
            reached: HashSet::new(),
            dig: DigState::from_limit(limit),
        }
    }

    pub fn dig_state(&self) -> DigState {
        self.dig
    }

    /// Commits deferred by the last walk
    pub fn pending(&self) -> &[ObjectId] {
        &self.mark_list
    }

    pub fn is_reachable(&self, oid: &ObjectId) -> bool {
        self.reached.contains(oid)
    }

    pub fn reached(&self) -> &HashSet<ObjectId> {
        &self.reached
    }

    /// Lower the age limit; a limit of zero removes it for good
    pub fn lower_limit(&mut self, limit: Timestamp) {
        if let DigState::Shallow(current) = self.dig
            && limit < current
        {
            self.dig = DigState::from_limit(limit);
        }
    }

    pub(crate) fn dig_to_root(&mut self) {
        self.dig = DigState::Exhausted;
    }

    /// Mark everything reachable from the pending commits down to the age limit
    pub fn mark_reachable(&mut self, pool: &ObjectPool) -> anyhow::Result<()> {
        let limit = self.dig.limit();
        let mut pending = std::mem::take(&mut self.mark_list);
        let mut leftover = Vec::new();

        // the frontier was marked before it was deferred
        for oid in &pending {
            self.reached.remove(oid);
        }

        while let Some(oid) = pending.pop() {
            if self.reached.contains(&oid) {
                continue;
            }

            let Lookup::Found(commit) = pool.commit(&oid)? else {
                continue;
            };

            self.reached.insert(oid.clone());

            if commit.date() < limit {
                leftover.push(oid);
                continue;
            }

            pending.extend(
                commit
                    .parents()
                    .iter()
                    .filter(|parent| !self.reached.contains(*parent))
                    .cloned(),
            );
        }

        debug!(
            reached = self.reached.len(),
            deferred = leftover.len(),
            limit,
            "marked reachable commits"
        );

        self.mark_list = leftover;
        Ok(())
    }
}
