//! Rewriting a reflog through an [`ExpirePolicy`]

use crate::areas::refs::{RefStore, RefValue};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::reachable::completeness::CompletenessChecker;
use crate::artifacts::reachable::pool::ObjectPool;
use crate::artifacts::reflog::policy::{ExpireOptions, ExpirePolicy};
use bitflags::bitflags;
use std::io::Write;
use tracing::info;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExpireFlags: u8 {
        /// Decide and report, but leave the reflog and the ref untouched
        const DRY_RUN = 0b0001;
        /// Chain each kept entry's old id to the new id of the kept entry before it
        const REWRITE = 0b0010;
        /// Point the ref at the new id of the last kept entry
        const UPDATE_REF = 0b0100;
        const VERBOSE = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpireReport {
    pub kept: usize,
    pub pruned: usize,
}

/// Expire the reflog of `refname`; a ref without a reflog is left alone
///
/// Every entry is decided before anything is written, so a failure part way
/// through leaves the reflog as it was.
pub fn expire_reflog(
    pool: &ObjectPool,
    refs: &dyn RefStore,
    completeness: &mut CompletenessChecker,
    refname: &str,
    options: ExpireOptions,
    flags: ExpireFlags,
    out: &mut dyn Write,
) -> anyhow::Result<ExpireReport> {
    if !refs.reflog_exists(refname) {
        return Ok(ExpireReport::default());
    }

    let entries = refs.read_reflog(refname)?;
    let tip = refs.resolve_ref(refname)?;
    let dry_run = flags.contains(ExpireFlags::DRY_RUN);
    let verbose = flags.contains(ExpireFlags::VERBOSE);

    let mut policy = ExpirePolicy::prepare(pool, completeness, refs, refname, tip.as_ref(), options)?;
    let mut report = ExpireReport::default();
    let mut kept = Vec::with_capacity(entries.len());
    let mut last_kept_oid = ObjectId::null();

    for mut entry in entries {
        if flags.contains(ExpireFlags::REWRITE) {
            entry.old_oid = last_kept_oid.clone();
        }

        if policy.should_expire(&entry)? {
            report.pruned += 1;
            if dry_run {
                writeln!(out, "would prune {}", entry.message)?;
            } else if verbose {
                writeln!(out, "prune {}", entry.message)?;
            }
        } else {
            report.kept += 1;
            if verbose {
                writeln!(out, "keep {}", entry.message)?;
            }
            last_kept_oid = entry.new_oid.clone();
            kept.push(entry);
        }
    }

    policy.cleanup();

    if !dry_run {
        refs.write_reflog(refname, &kept)?;

        let symbolic = matches!(refs.read_ref_value(refname)?, Some(RefValue::Symbolic(_)));
        if flags.contains(ExpireFlags::UPDATE_REF) && !last_kept_oid.is_null() && !symbolic {
            refs.update_ref(refname, &last_kept_oid)?;
        }
    }

    info!(
        refname,
        kept = report.kept,
        pruned = report.pruned,
        dry_run,
        "expired reflog"
    );

    Ok(report)
}
