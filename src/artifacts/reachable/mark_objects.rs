//! Whole-repository marking
//!
//! Everything reachable from HEAD and every ref, and optionally from every
//! reflog entry, ends up in the SEEN set; whatever is left out is garbage.

use crate::Timestamp;
use crate::areas::refs::{HEAD_REF_NAME, RefStore, RefValue};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::reachable::bitmap::BitmapIndex;
use crate::artifacts::reachable::pool::ObjectPool;
use crate::artifacts::reachable::recent::{RecentData, add_unseen_recent_objects_to_traversal};
use crate::artifacts::reachable::rev_walk::RevWalk;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use tracing::debug;

#[derive(Default)]
pub struct MarkOptions<'a> {
    /// Also keep everything named by any reflog entry
    pub include_reflogs: bool,
    /// Also keep unreachable objects newer than this
    pub recent_cutoff: Option<Timestamp>,
    pub recent_hooks: Vec<String>,
    pub bitmap: Option<&'a dyn BitmapIndex>,
}

pub fn mark_reachable_objects(
    pool: &ObjectPool,
    refs: &dyn RefStore,
    options: &MarkOptions,
    progress: &mut dyn FnMut(usize),
) -> anyhow::Result<HashSet<ObjectId>> {
    let mut walk = RevWalk::new(pool);
    let mut count = 0usize;

    refs.for_each_ref(&mut |refname, value| {
        let oid = match value {
            RefValue::Direct(oid) => Some(oid.clone()),
            RefValue::Symbolic(_) => refs.resolve_ref(refname)?,
        };
        if let Some(oid) = oid {
            walk.add_pending(oid);
        }
        Ok(())
    })?;

    // a detached HEAD is not under refs/
    if let Some(head) = refs.resolve_ref(HEAD_REF_NAME)? {
        walk.add_pending(head);
    }

    if options.include_reflogs {
        for refname in refs.list_reflogs()? {
            refs.for_each_reflog_entry(&refname, &mut |entry| {
                walk.add_pending(entry.old_oid.clone());
                walk.add_pending(entry.new_oid.clone());
                Ok(())
            })?;
        }
    }

    let answered = match options.bitmap {
        Some(bitmap) => {
            let roots = walk.pending_roots();
            let answered = bitmap.traverse(&roots, &mut |oid, _| {
                if walk.mark_seen(oid.clone()) {
                    count += 1;
                    progress(count);
                }
            })?;
            if answered {
                walk.clear_pending();
            }
            answered
        }
        None => false,
    };

    if !answered {
        traverse_counting(&mut walk, &mut count, progress)?;
    }

    if let Some(cutoff) = options.recent_cutoff {
        let mut recent = RecentData::new(cutoff, options.recent_hooks.clone(), false);
        add_unseen_recent_objects_to_traversal(&mut walk, &mut recent, None)?;
        traverse_counting(&mut walk, &mut count, progress)?;
    }

    debug!(marked = count, bitmap = answered, "marked reachable objects");
    Ok(walk.into_seen())
}

fn traverse_counting(
    walk: &mut RevWalk<'_>,
    count: &mut usize,
    progress: &mut dyn FnMut(usize),
) -> anyhow::Result<()> {
    let counter = Cell::new(*count);
    let progress = RefCell::new(progress);
    let tick = || {
        counter.set(counter.get() + 1);
        let mut progress = progress.borrow_mut();
        (*progress)(counter.get());
    };

    walk.traverse(
        &mut |_, _| {
            tick();
            Ok(())
        },
        &mut |_, _| {
            tick();
            Ok(())
        },
    )?;

    *count = counter.get();
    Ok(())
}
