//! Unreachability queries on top of [`ReachabilityMarker`]

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::reachable::marker::{DigState, ReachabilityMarker};
use crate::artifacts::reachable::pool::{Lookup, ObjectPool};
use tracing::debug;

impl ReachabilityMarker {
    /// Whether `oid` is known not to be reachable from the tips
    ///
    /// Null ids and objects that do not peel to a commit are never reported
    /// unreachable. The first query that misses the shallow marking digs to the
    /// roots once; every later query is answered from the full marking.
    pub fn unreachable(&mut self, pool: &ObjectPool, oid: &ObjectId) -> anyhow::Result<bool> {
        if oid.is_null() {
            return Ok(false);
        }

        let Lookup::Found((commit_oid, _)) = pool.commit_reference(oid)? else {
            return Ok(false);
        };

        if self.is_reachable(&commit_oid) {
            return Ok(false);
        }

        if !self.pending().is_empty() && matches!(self.dig_state(), DigState::Shallow(_)) {
            debug!(commit = %commit_oid, "digging to root");
            self.dig_to_root();
            self.mark_reachable(pool)?;
        }

        Ok(!self.is_reachable(&commit_oid))
    }
}
