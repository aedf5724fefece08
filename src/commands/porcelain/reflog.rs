use crate::Timestamp;
use crate::areas::refs::RefStore;
use crate::areas::repository::Repository;
use crate::artifacts::reachable::completeness::CompletenessChecker;
use crate::artifacts::reachable::mark_objects::{MarkOptions, mark_reachable_objects};
use crate::artifacts::reachable::pool::ObjectPool;
use crate::artifacts::reflog::expire::{ExpireFlags, ExpireReport, expire_reflog};
use crate::artifacts::reflog::expiry_date::parse_expiry_date;
use crate::artifacts::reflog::policy::ExpireOptions;
use crate::artifacts::reflog::selector::parse_reflog_selector;
use anyhow::Context;
use std::io::Write;
use tracing::error;

#[derive(Debug, Clone)]
pub struct ReflogExpireRequest {
    pub refs: Vec<String>,
    pub all: bool,
    pub expire: Option<String>,
    pub expire_unreachable: Option<String>,
    pub stale_fix: bool,
    pub flags: ExpireFlags,
    pub now: Timestamp,
}

#[derive(Debug, Clone)]
pub struct ReflogDeleteRequest {
    /// `<ref>@{N}` or `<ref>@{<date>}`
    pub entries: Vec<String>,
    pub flags: ExpireFlags,
    pub now: Timestamp,
}

impl Repository {
    pub fn reflog_expire(&self, request: &ReflogExpireRequest) -> anyhow::Result<ExpireReport> {
        let explicit_total = parse_explicit(request.expire.as_deref(), request.now)?;
        let explicit_unreachable = parse_explicit(request.expire_unreachable.as_deref(), request.now)?;

        let mut nowhere = Vec::new();
        let refnames = if request.all {
            self.refs().list_reflogs()?
        } else {
            if request.refs.is_empty() {
                anyhow::bail!("no reflog specified to expire");
            }
            let mut refnames = Vec::new();
            for name in &request.refs {
                match self.refs().dwim_log(name) {
                    Some(refname) => refnames.push(refname),
                    None => {
                        error!(%name, "ref points nowhere");
                        nowhere.push(format!("{} points nowhere!", name));
                    }
                }
            }
            refnames
        };

        let pool = ObjectPool::new(self.database());
        let mut completeness = if request.stale_fix {
            if request.flags.contains(ExpireFlags::VERBOSE) {
                writeln!(self.writer(), "Marking reachable objects...")?;
            }
            let seen =
                mark_reachable_objects(&pool, self.refs(), &MarkOptions::default(), &mut |_| {})?;
            CompletenessChecker::with_known_complete(seen)
        } else {
            CompletenessChecker::new()
        };

        let mut total = ExpireReport::default();
        for refname in refnames {
            let window =
                self.config()
                    .reflog_expiry(&refname, request.now, explicit_total, explicit_unreachable)?;
            let options = ExpireOptions {
                stalefix: request.stale_fix,
                expire_total: window.total,
                expire_unreachable: window.unreachable,
                recno: 0,
            };

            let mut writer = self.writer();
            let report = expire_reflog(
                &pool,
                self.refs(),
                &mut completeness,
                &refname,
                options,
                request.flags,
                &mut **writer,
            )
            .with_context(|| format!("failed to expire reflog of {}", refname))?;

            total.kept += report.kept;
            total.pruned += report.pruned;
        }

        // the resolvable refs are expired even when some names point nowhere
        if !nowhere.is_empty() {
            anyhow::bail!(nowhere.join("\n"));
        }

        Ok(total)
    }

    pub fn reflog_delete(&self, request: &ReflogDeleteRequest) -> anyhow::Result<ExpireReport> {
        if request.entries.is_empty() {
            anyhow::bail!("no reflog specified to delete");
        }

        let pool = ObjectPool::new(self.database());
        let mut completeness = CompletenessChecker::new();
        let mut total = ExpireReport::default();

        for spec in &request.entries {
            let (name, selector) = parse_reflog_selector(spec, request.now)?;
            let refname = self
                .refs()
                .dwim_log(&name)
                .with_context(|| format!("{} points nowhere!", spec))?;

            let entries = self.refs().read_reflog(&refname)?;
            let options = ExpireOptions {
                recno: selector.recno(&entries),
                ..Default::default()
            };

            let mut writer = self.writer();
            let report = expire_reflog(
                &pool,
                self.refs(),
                &mut completeness,
                &refname,
                options,
                request.flags,
                &mut **writer,
            )?;

            total.kept += report.kept;
            total.pruned += report.pruned;
        }

        Ok(total)
    }

    /// The name must be a full ref name; no short-name expansion happens
    pub fn reflog_exists(&self, refname: &str) -> bool {
        self.refs().reflog_exists(refname)
    }
}

fn parse_explicit(date: Option<&str>, now: Timestamp) -> anyhow::Result<Option<Timestamp>> {
    date.map(|date| parse_expiry_date(date, now))
        .transpose()
        .context("invalid expiry date")
}
