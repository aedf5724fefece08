//! Per-ref reflog expiry policy
//!
//! One [`ExpirePolicy`] is prepared per ref, asked about each entry of that
//! ref's reflog in order, and then cleaned up. Preparation decides once how
//! reachability is judged for the ref:
//!
//! - `Head`: from the tips of every ref, for HEAD itself or when no
//!   unreachable window is configured
//! - `Normal`: from the ref's own tip commit
//! - `Always`: reachability never saves an entry, either because the ref has
//!   no tip commit or because the unreachable window is empty
//!
//! Each entry is then judged, in this order: older than the total window;
//! stale (stale-fix only); older than the unreachable window and unreachable;
//! selected by the `recno` countdown.

use crate::Timestamp;
use crate::areas::refs::{RefStore, RefValue, is_head};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::reachable::completeness::CompletenessChecker;
use crate::artifacts::reachable::marker::ReachabilityMarker;
use crate::artifacts::reachable::pool::{Lookup, ObjectPool};
use crate::artifacts::reflog::entry::ReflogEntry;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpireOptions {
    /// Expire entries whose commits are missing or incomplete
    pub stalefix: bool,
    /// Entries older than this always expire
    pub expire_total: Timestamp,
    /// Entries older than this expire when they are not reachable
    pub expire_unreachable: Timestamp,
    /// When positive, the entry at which the countdown hits zero expires
    pub recno: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreachableExpireKind {
    Normal,
    Always,
    Head,
}

pub struct ExpirePolicy<'a> {
    pool: &'a ObjectPool<'a>,
    completeness: &'a mut CompletenessChecker,
    options: ExpireOptions,
    kind: UnreachableExpireKind,
    marker: Option<ReachabilityMarker>,
    tips: Vec<ObjectId>,
}

impl<'a> ExpirePolicy<'a> {
    /// Classify the ref and mark what is reachable within the total window
    pub fn prepare(
        pool: &'a ObjectPool<'a>,
        completeness: &'a mut CompletenessChecker,
        refs: &dyn RefStore,
        refname: &str,
        tip: Option<&ObjectId>,
        options: ExpireOptions,
    ) -> anyhow::Result<Self> {
        let tip = tip.filter(|oid| !oid.is_null());

        let mut kind = if options.expire_unreachable == 0 || is_head(refname) {
            UnreachableExpireKind::Head
        } else {
            match tip {
                Some(oid) if pool.commit(oid)?.is_found() => UnreachableExpireKind::Normal,
                _ => UnreachableExpireKind::Always,
            }
        };

        if options.expire_unreachable <= options.expire_total {
            kind = UnreachableExpireKind::Always;
        }

        let tips = match (kind, tip) {
            (UnreachableExpireKind::Head, _) => Self::ref_tips(pool, refs)?,
            (UnreachableExpireKind::Normal, Some(oid)) => vec![oid.clone()],
            _ => Vec::new(),
        };

        let marker = match kind {
            UnreachableExpireKind::Always => None,
            UnreachableExpireKind::Normal | UnreachableExpireKind::Head => {
                let mut marker = ReachabilityMarker::new(tips.iter().cloned(), options.expire_total);
                marker.mark_reachable(pool)?;
                Some(marker)
            }
        };

        debug!(refname, ?kind, tips = tips.len(), "prepared reflog expiry");

        Ok(Self {
            pool,
            completeness,
            options,
            kind,
            marker,
            tips,
        })
    }

    /// Commits at the tips of every non-symbolic ref, tags peeled
    fn ref_tips(pool: &ObjectPool, refs: &dyn RefStore) -> anyhow::Result<Vec<ObjectId>> {
        let mut tips = Vec::new();

        refs.for_each_ref(&mut |_, value| {
            let RefValue::Direct(oid) = value else {
                return Ok(());
            };
            if let Lookup::Found((commit_oid, _)) = pool.commit_reference(oid)? {
                tips.push(commit_oid);
            }
            Ok(())
        })?;

        Ok(tips)
    }

    pub fn kind(&self) -> UnreachableExpireKind {
        self.kind
    }

    pub fn tips(&self) -> &[ObjectId] {
        &self.tips
    }

    pub fn marker(&self) -> Option<&ReachabilityMarker> {
        self.marker.as_ref()
    }

    pub fn should_expire(&mut self, entry: &ReflogEntry) -> anyhow::Result<bool> {
        if entry.timestamp < self.options.expire_total {
            return Ok(true);
        }

        if self.options.stalefix
            && (!self.keep_entry(&entry.old_oid)? || !self.keep_entry(&entry.new_oid)?)
        {
            return Ok(true);
        }

        if entry.timestamp < self.options.expire_unreachable {
            match self.kind {
                UnreachableExpireKind::Always => return Ok(true),
                UnreachableExpireKind::Normal | UnreachableExpireKind::Head => {
                    if let Some(marker) = self.marker.as_mut()
                        && (marker.unreachable(self.pool, &entry.old_oid)?
                            || marker.unreachable(self.pool, &entry.new_oid)?)
                    {
                        return Ok(true);
                    }
                }
            }
        }

        if self.options.recno > 0 {
            self.options.recno -= 1;
            if self.options.recno == 0 {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// A null id always passes; anything else must name a complete commit
    fn keep_entry(&mut self, oid: &ObjectId) -> anyhow::Result<bool> {
        if oid.is_null() {
            return Ok(true);
        }

        let Lookup::Found((commit_oid, _)) = self.pool.commit_reference(oid)? else {
            return Ok(false);
        };

        self.completeness.is_commit_complete(self.pool, &commit_oid)
    }

    /// Drop the reachability marking of this ref
    pub fn cleanup(self) {
        let reached = self.marker.as_ref().map_or(0, |marker| marker.reached().len());
        debug!(tips = self.tips.len(), reached, "cleared reflog expiry marks");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::reachable::memory::{MemoryRefs, MemoryStore, reflog_entry};
    use crate::artifacts::reachable::marker::DigState;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const NOW: Timestamp = 1_700_000_000;
    const DAY: Timestamp = 86_400;

    /// C1..C5 on main, one day apart, with a reflog entry per fast-forward
    struct Linear {
        store: MemoryStore,
        refs: MemoryRefs,
        commits: Vec<ObjectId>,
    }

    impl Linear {
        fn new() -> Self {
            let store = MemoryStore::new();
            let refs = MemoryRefs::new();
            let mut commits: Vec<ObjectId> = Vec::new();

            for i in 0..5 {
                let date = NOW - (50 - i) * DAY;
                let parents = commits.last().cloned().into_iter().collect::<Vec<_>>();
                let commit = store.commit(&parents, date);
                let old = commits.last().cloned().unwrap_or_else(ObjectId::null);
                refs.log("HEAD", reflog_entry(&old, &commit, date));
                refs.log("refs/heads/main", reflog_entry(&old, &commit, date));
                commits.push(commit);
            }

            refs.set("refs/heads/main", &commits[4]);
            refs.set_symbolic("HEAD", "refs/heads/main");

            Self {
                store,
                refs,
                commits,
            }
        }

        fn decisions(&self, refname: &str, options: ExpireOptions) -> Vec<bool> {
            let pool = ObjectPool::new(&self.store);
            let mut completeness = CompletenessChecker::new();
            let tip = self.refs.resolve_ref(refname).unwrap();
            let mut policy = ExpirePolicy::prepare(
                &pool,
                &mut completeness,
                &self.refs,
                refname,
                tip.as_ref(),
                options,
            )
            .unwrap();

            let decisions = self
                .refs
                .read_reflog(refname)
                .unwrap()
                .iter()
                .map(|entry| policy.should_expire(entry).unwrap())
                .collect();
            policy.cleanup();
            decisions
        }
    }

    #[test]
    fn test_reachable_history_is_kept() {
        let linear = Linear::new();
        let options = ExpireOptions {
            expire_total: 0,
            expire_unreachable: NOW,
            ..Default::default()
        };

        assert_eq!(linear.decisions("HEAD", options), vec![false; 5]);
        assert_eq!(linear.decisions("refs/heads/main", options), vec![false; 5]);
    }

    #[test]
    fn test_deleted_branch_expires_unconditionally() {
        let linear = Linear::new();
        let fork = &linear.commits[2];
        let f4 = linear.store.commit(&[fork.clone()], NOW - 20 * DAY);
        let f5 = linear.store.commit(&[f4.clone()], NOW - 5 * DAY);
        linear.refs.log("refs/heads/feature", reflog_entry(fork, &f4, NOW - 20 * DAY));
        linear.refs.log("refs/heads/feature", reflog_entry(&f4, &f5, NOW - 5 * DAY));
        linear.refs.delete("refs/heads/feature");

        let options = ExpireOptions {
            expire_total: NOW - 90 * DAY,
            expire_unreachable: NOW - 10 * DAY,
            ..Default::default()
        };

        let pool = ObjectPool::new(&linear.store);
        let mut completeness = CompletenessChecker::new();
        let policy = ExpirePolicy::prepare(
            &pool,
            &mut completeness,
            &linear.refs,
            "refs/heads/feature",
            None,
            options,
        )
        .unwrap();
        assert_eq!(policy.kind(), UnreachableExpireKind::Always);
        policy.cleanup();

        assert_eq!(
            linear.decisions("refs/heads/feature", options),
            vec![true, false]
        );
    }

    #[test]
    fn test_stale_fix_expires_entries_with_missing_commits() {
        let linear = Linear::new();
        linear.store.remove(&linear.commits[1]);

        let options = ExpireOptions {
            stalefix: true,
            expire_total: NOW - 90 * DAY,
            expire_unreachable: NOW - 60 * DAY,
            ..Default::default()
        };

        // every later commit has the missing one as an ancestor
        assert_eq!(
            linear.decisions("refs/heads/main", options),
            vec![false, true, true, true, true]
        );
    }

    #[test]
    fn test_stale_fix_trusts_known_complete_commits() {
        let linear = Linear::new();
        let tree = linear.store.tree_of(&linear.commits[0]);
        linear.store.remove(&tree);
        let pool = ObjectPool::new(&linear.store);
        let mut completeness = CompletenessChecker::with_known_complete(linear.commits.clone());

        let options = ExpireOptions {
            stalefix: true,
            expire_total: 0,
            expire_unreachable: 0,
            ..Default::default()
        };
        let mut policy = ExpirePolicy::prepare(
            &pool,
            &mut completeness,
            &linear.refs,
            "refs/heads/main",
            Some(&linear.commits[4]),
            options,
        )
        .unwrap();

        for entry in linear.refs.read_reflog("refs/heads/main").unwrap() {
            assert!(!policy.should_expire(&entry).unwrap());
        }
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_total_window_is_absolute(#[case] stalefix: bool) {
        let linear = Linear::new();
        let options = ExpireOptions {
            stalefix,
            expire_total: NOW - 47 * DAY,
            expire_unreachable: NOW,
            ..Default::default()
        };

        assert_eq!(
            linear.decisions("HEAD", options),
            vec![true, true, true, false, false]
        );
    }

    #[test]
    fn test_unreachable_entries_expire_for_normal_refs() {
        let linear = Linear::new();
        let stray = linear.store.commit(&[linear.commits[2].clone()], NOW - 40 * DAY);
        linear
            .refs
            .log("refs/heads/main", reflog_entry(&linear.commits[4], &stray, NOW - 40 * DAY));
        linear
            .refs
            .log("refs/heads/main", reflog_entry(&stray, &linear.commits[4], NOW - 39 * DAY));

        let options = ExpireOptions {
            expire_total: NOW - 90 * DAY,
            expire_unreachable: NOW - 30 * DAY,
            ..Default::default()
        };

        assert_eq!(
            linear.decisions("refs/heads/main", options),
            vec![false, false, false, false, false, true, true]
        );
    }

    #[test]
    fn test_first_miss_digs_to_root_once() {
        let linear = Linear::new();
        let pool = ObjectPool::new(&linear.store);
        let mut completeness = CompletenessChecker::new();
        let options = ExpireOptions {
            expire_total: NOW - 48 * DAY,
            expire_unreachable: NOW - DAY,
            ..Default::default()
        };
        let mut policy = ExpirePolicy::prepare(
            &pool,
            &mut completeness,
            &linear.refs,
            "refs/heads/main",
            Some(&linear.commits[4]),
            options,
        )
        .unwrap();
        assert_eq!(policy.kind(), UnreachableExpireKind::Normal);
        assert_eq!(
            policy.marker().map(|marker| marker.dig_state()),
            Some(DigState::Shallow(NOW - 48 * DAY))
        );

        // both ends were marked by the shallow walk
        let entries = linear.refs.read_reflog("refs/heads/main").unwrap();
        assert!(!policy.should_expire(&entries[3]).unwrap());
        assert_eq!(
            policy.marker().map(|marker| marker.dig_state()),
            Some(DigState::Shallow(NOW - 48 * DAY))
        );

        // the root lies behind the frontier
        let reset = reflog_entry(&linear.commits[0], &linear.commits[4], NOW - 2 * DAY);
        assert!(!policy.should_expire(&reset).unwrap());
        assert_eq!(
            policy.marker().map(|marker| marker.dig_state()),
            Some(DigState::Exhausted)
        );
    }

    #[test]
    fn test_empty_unreachable_window_means_always() {
        let linear = Linear::new();
        let pool = ObjectPool::new(&linear.store);
        let mut completeness = CompletenessChecker::new();
        let options = ExpireOptions {
            expire_total: NOW - 10 * DAY,
            expire_unreachable: NOW - 20 * DAY,
            ..Default::default()
        };

        let policy = ExpirePolicy::prepare(
            &pool,
            &mut completeness,
            &linear.refs,
            "HEAD",
            Some(&linear.commits[4]),
            options,
        )
        .unwrap();

        assert_eq!(policy.kind(), UnreachableExpireKind::Always);
        assert!(policy.marker().is_none());
        assert!(policy.tips().is_empty());
    }

    #[test]
    fn test_head_is_judged_from_every_ref() {
        let linear = Linear::new();
        let side = linear.store.commit(&[], NOW - 3 * DAY);
        let tag = linear
            .store
            .tag(&side, crate::artifacts::objects::object_type::ObjectType::Commit);
        linear.refs.set("refs/tags/side", &tag);
        let pool = ObjectPool::new(&linear.store);
        let mut completeness = CompletenessChecker::new();
        let options = ExpireOptions {
            expire_total: 0,
            expire_unreachable: NOW,
            ..Default::default()
        };

        let mut policy = ExpirePolicy::prepare(
            &pool,
            &mut completeness,
            &linear.refs,
            "HEAD",
            Some(&linear.commits[4]),
            options,
        )
        .unwrap();

        assert_eq!(policy.kind(), UnreachableExpireKind::Head);
        assert_eq!(policy.tips(), &[linear.commits[4].clone(), side.clone()]);
        let entry = reflog_entry(&linear.commits[4], &side, NOW - DAY);
        assert!(!policy.should_expire(&entry).unwrap());
    }

    #[rstest]
    #[case(1, vec![true, false, false, false, false])]
    #[case(3, vec![false, false, true, false, false])]
    #[case(5, vec![false, false, false, false, true])]
    fn test_recno_selects_one_entry(#[case] recno: usize, #[case] expected: Vec<bool>) {
        let linear = Linear::new();
        let options = ExpireOptions {
            recno,
            ..Default::default()
        };

        assert_eq!(linear.decisions("refs/heads/main", options), expected);
    }
}
