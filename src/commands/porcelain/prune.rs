use crate::Timestamp;
use crate::areas::object_store::ObjectStore;
use crate::areas::repository::Repository;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::reachable::mark_objects::{MarkOptions, mark_reachable_objects};
use crate::artifacts::reachable::pool::ObjectPool;
use crate::artifacts::reflog::expiry_date::parse_expiry_date;
use anyhow::Context;
use std::io::Write;
use tracing::{debug, info};

const PROGRESS_INTERVAL: usize = 1024;

#[derive(Debug, Clone)]
pub struct PruneRequest {
    pub dry_run: bool,
    pub verbose: bool,
    /// Only loose objects at least this old go; defaults to `gc.prune_expire`
    pub expire: Option<String>,
    pub now: Timestamp,
}

impl Repository {
    /// Remove unreachable loose objects and return their ids
    pub fn prune(&self, request: &PruneRequest) -> anyhow::Result<Vec<ObjectId>> {
        let cutoff = match request.expire.as_deref() {
            Some(date) => parse_expiry_date(date, request.now).context("invalid --expire date")?,
            None => self.config().prune_expire(request.now)?,
        };

        let pool = ObjectPool::new(self.database());
        let options = MarkOptions {
            include_reflogs: true,
            recent_cutoff: Some(cutoff),
            recent_hooks: self.config().recent_objects_hooks().to_vec(),
            bitmap: None,
        };
        let seen = mark_reachable_objects(&pool, self.refs(), &options, &mut |count| {
            if count % PROGRESS_INTERVAL == 0 {
                debug!(count, "checking connectivity");
            }
        })?;

        let mut doomed = Vec::new();
        self.database().for_each_loose_object(&mut |oid, mtime| {
            if !seen.contains(oid) && mtime <= cutoff {
                doomed.push(oid.clone());
            }
            Ok(())
        })?;
        doomed.sort();

        for oid in &doomed {
            if request.dry_run || request.verbose {
                let object_type = match self.database().object_type(oid) {
                    Ok(Some(object_type)) => object_type.to_string(),
                    _ => "unknown".to_string(),
                };
                writeln!(self.writer(), "{} {}", oid, object_type)?;
            }
            if !request.dry_run {
                self.database().remove(oid)?;
            }
        }

        info!(
            pruned = doomed.len(),
            reachable = seen.len(),
            dry_run = request.dry_run,
            "pruned loose objects"
        );

        Ok(doomed)
    }
}
