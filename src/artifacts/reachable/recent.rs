//! Recent-object collection
//!
//! Before pruning, objects that no ref reaches but that are younger than a
//! cutoff are added to the traversal as extra roots, so that whatever they
//! reference survives with them. Retention hooks can name further objects to
//! keep regardless of age; they are shell commands printing one object id per
//! line.
//!
//! Hooks fail closed: a hook that cannot be run, exits with an error, or prints
//! anything that is not an object id fails the whole collection. Running the
//! hooks blocks until every one of them has exited.

use crate::Timestamp;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::reachable::pool::Lookup;
use crate::artifacts::reachable::rev_walk::RevWalk;
use std::collections::HashSet;
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("unable to run recent-objects hook `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("recent-objects hook `{command}` failed with {status}")]
    Failed { command: String, status: ExitStatus },

    #[error("invalid object id '{line}' from recent-objects hook `{command}`")]
    InvalidLine { command: String, line: String },
}

/// Run one hook and collect the object ids it prints
pub fn run_recent_objects_hook(command: &str) -> Result<HashSet<ObjectId>, HookError> {
    debug!(command, "running recent-objects hook");

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|source| HookError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut oids = HashSet::new();
    for line in stdout.lines() {
        let oid = ObjectId::try_parse(line.trim().to_string()).map_err(|_| {
            HookError::InvalidLine {
                command: command.to_string(),
                line: line.to_string(),
            }
        })?;
        oids.insert(oid);
    }

    if !output.status.success() {
        return Err(HookError::Failed {
            command: command.to_string(),
            status: output.status,
        });
    }

    Ok(oids)
}

/// Session state for one collection pass
#[derive(Debug)]
pub struct RecentData {
    cutoff: Timestamp,
    ignore_in_core_kept_packs: bool,
    hooks: Vec<String>,
    extra_recent_oids: Option<HashSet<ObjectId>>,
}

impl RecentData {
    pub fn new(cutoff: Timestamp, hooks: Vec<String>, ignore_in_core_kept_packs: bool) -> Self {
        Self {
            cutoff,
            ignore_in_core_kept_packs,
            hooks,
            extra_recent_oids: None,
        }
    }

    /// Newer than the cutoff, or named by a hook; hooks run on first need only
    pub fn is_recent(&mut self, oid: &ObjectId, mtime: Timestamp) -> Result<bool, HookError> {
        if mtime > self.cutoff {
            return Ok(true);
        }

        if self.extra_recent_oids.is_none() {
            let mut extra = HashSet::new();
            for hook in &self.hooks {
                extra.extend(run_recent_objects_hook(hook)?);
            }
            self.extra_recent_oids = Some(extra);
        }

        Ok(self
            .extra_recent_oids
            .as_ref()
            .is_some_and(|extra| extra.contains(oid)))
    }
}

pub type RecentCallback<'a> = &'a mut dyn FnMut(&ObjectId, ObjectType, Timestamp);

/// Add every recent object the walk has not seen yet as a traversal root
///
/// Loose objects are judged by their own modification time, packed ones by the
/// time of their pack. Objects in packs kept in core are skipped when the
/// session asks for it.
pub fn add_unseen_recent_objects_to_traversal(
    walk: &mut RevWalk<'_>,
    recent: &mut RecentData,
    mut report: Option<RecentCallback<'_>>,
) -> anyhow::Result<()> {
    let store = walk.pool().store();
    let mut added = 0usize;

    store.for_each_loose_object(&mut |oid, mtime| {
        if walk.is_seen(oid) {
            return Ok(());
        }

        if let Some(object_type) = add_recent_object(walk, recent, oid, mtime)? {
            if let Some(report) = report.as_mut() {
                report(oid, object_type, mtime);
            }
            added += 1;
        }
        Ok(())
    })?;

    store.for_each_packed_object(&mut |oid, pack| {
        if walk.is_seen(oid) || (recent.ignore_in_core_kept_packs && pack.kept_in_core) {
            return Ok(());
        }

        if let Some(object_type) = add_recent_object(walk, recent, oid, pack.mtime)? {
            if let Some(report) = report.as_mut() {
                report(oid, object_type, pack.mtime);
            }
            added += 1;
        }
        Ok(())
    })?;

    debug!(added, cutoff = recent.cutoff, "added recent objects to traversal");
    Ok(())
}

/// Queue `oid` when it is recent; returns its type if it was queued
fn add_recent_object(
    walk: &mut RevWalk<'_>,
    recent: &mut RecentData,
    oid: &ObjectId,
    mtime: Timestamp,
) -> anyhow::Result<Option<ObjectType>> {
    if !recent.is_recent(oid, mtime)? {
        return Ok(None);
    }

    let pool = walk.pool();
    let object_type = match pool.object_type(oid)? {
        Lookup::Found(object_type) => object_type,
        _ => return Ok(None),
    };

    // commits and tags must parse to be walked; trees and blobs are taken on trust
    let usable = match object_type {
        ObjectType::Commit => pool.commit(oid)?.is_found(),
        ObjectType::Tag => pool.tag(oid)?.is_found(),
        ObjectType::Tree | ObjectType::Blob => true,
    };
    if !usable {
        return Ok(None);
    }

    walk.add_pending_typed(oid.clone(), object_type);
    Ok(Some(object_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::object_store::PackInfo;
    use crate::artifacts::reachable::memory::MemoryStore;
    use crate::artifacts::reachable::pool::ObjectPool;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const NOW: Timestamp = 1_700_000_000;
    const HOUR: Timestamp = 3600;

    fn collect(
        store: &MemoryStore,
        hooks: Vec<String>,
        ignore_in_core_kept_packs: bool,
    ) -> anyhow::Result<Vec<ObjectId>> {
        let pool = ObjectPool::new(store);
        let mut walk = RevWalk::new(&pool);
        let mut recent = RecentData::new(NOW - HOUR, hooks, ignore_in_core_kept_packs);
        let mut added = Vec::new();
        let report: RecentCallback =
            &mut |oid: &ObjectId, _: ObjectType, _: Timestamp| added.push(oid.clone());

        add_unseen_recent_objects_to_traversal(&mut walk, &mut recent, Some(report))?;

        assert_eq!(walk.pending_roots(), added);
        Ok(added)
    }

    #[test]
    fn test_recent_loose_kept_old_packed_dropped() {
        let store = MemoryStore::new();
        let loose = store.blob("loose");
        let packed = store.blob("packed");
        store.set_mtime(&loose, NOW - HOUR / 2);
        store.pack(&packed, PackInfo::new("pack-1".into(), NOW - 2 * HOUR, false));

        assert_eq!(collect(&store, vec![], false).unwrap(), vec![loose]);
    }

    #[test]
    fn test_hook_output_keeps_old_objects() {
        let store = MemoryStore::new();
        let loose = store.blob("loose");
        let packed = store.blob("packed");
        store.set_mtime(&loose, NOW - HOUR / 2);
        store.pack(&packed, PackInfo::new("pack-1".into(), NOW - 2 * HOUR, false));

        let added = collect(&store, vec![format!("echo {packed}")], false).unwrap();

        assert_eq!(added, vec![loose, packed]);
    }

    #[test]
    fn test_in_core_kept_packs_can_be_ignored() {
        let store = MemoryStore::new();
        let packed = store.blob("packed");
        store.pack(&packed, PackInfo::new("pack-1".into(), NOW, true));

        assert_eq!(collect(&store, vec![], true).unwrap(), vec![]);
        assert_eq!(collect(&store, vec![], false).unwrap(), vec![packed]);
    }

    #[test]
    fn test_seen_objects_are_not_added() {
        let store = MemoryStore::new();
        let blob = store.blob("seen");
        store.set_mtime(&blob, NOW);
        let pool = ObjectPool::new(&store);
        let mut walk = RevWalk::new(&pool);
        walk.mark_seen(blob);
        let mut recent = RecentData::new(NOW - HOUR, vec![], false);

        add_unseen_recent_objects_to_traversal(&mut walk, &mut recent, None).unwrap();

        assert!(walk.pending_roots().is_empty());
    }

    #[test]
    fn test_hooks_only_run_when_needed() {
        let store = MemoryStore::new();
        let blob = store.blob("fresh");
        store.set_mtime(&blob, NOW);

        // would fail if it ran
        let added = collect(&store, vec!["exit 1".into()], false).unwrap();
        assert_eq!(added, vec![blob]);
    }

    #[rstest]
    #[case("exit 3")]
    #[case("echo not-an-oid")]
    #[case("false")]
    fn test_failing_hook_fails_collection(#[case] hook: &str) {
        let store = MemoryStore::new();
        let blob = store.blob("old");
        store.set_mtime(&blob, NOW - 2 * HOUR);

        let err = collect(&store, vec![hook.to_string()], false).unwrap_err();
        assert!(err.downcast_ref::<HookError>().is_some());
    }
}
