use crate::Timestamp;
use crate::artifacts::reflog::entry::ReflogEntry;
use crate::artifacts::reflog::expiry_date::parse_expiry_date;
use anyhow::{Context, bail};

/// The part of `<ref>@{...}` naming an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflogSelector {
    /// `@{N}`, counted from the newest entry
    Nth(usize),
    /// `@{<date>}`, the newest entry older than the date
    Before(Timestamp),
}

/// Split `main@{2}` into `("main", Nth(2))`
pub fn parse_reflog_selector(spec: &str, now: Timestamp) -> anyhow::Result<(String, ReflogSelector)> {
    let Some((refname, rest)) = spec.split_once("@{") else {
        bail!("'{}' is not a reflog selector", spec);
    };
    let Some(inner) = rest.strip_suffix('}') else {
        bail!("'{}' is not a reflog selector", spec);
    };
    if refname.is_empty() {
        bail!("no ref given in '{}'", spec);
    }

    let selector = if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
        ReflogSelector::Nth(
            inner
                .parse()
                .with_context(|| format!("invalid reflog index in '{}'", spec))?,
        )
    } else {
        ReflogSelector::Before(parse_expiry_date(inner, now)?)
    };

    Ok((refname.to_string(), selector))
}

impl ReflogSelector {
    /// Countdown that expires exactly the selected entry when entries are
    /// visited oldest first; 0 selects nothing, as does an index past the
    /// oldest entry
    pub fn recno(&self, entries: &[ReflogEntry]) -> usize {
        match *self {
            ReflogSelector::Nth(n) => entries.len().saturating_sub(n),
            ReflogSelector::Before(date) => entries
                .iter()
                .filter(|entry| entry.timestamp < date)
                .count(),
        }
    }
}
