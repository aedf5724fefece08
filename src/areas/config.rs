//! Repository configuration, read from `.git/bit.toml`
//!
//! ```toml
//! [gc]
//! reflog_expire = "90.days.ago"
//! reflog_expire_unreachable = "30.days.ago"
//! prune_expire = "2.weeks.ago"
//! recent_objects_hook = ["cat extra-oids.txt"]
//!
//! [[gc.reflog]]
//! pattern = "refs/remotes/*"
//! expire = "never"
//! expire_unreachable = "7.days.ago"
//! ```

use crate::Timestamp;
use crate::artifacts::reflog::expiry_date::parse_expiry_date;
use anyhow::Context;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "bit.toml";

const DEFAULT_REFLOG_EXPIRE: &str = "90.days.ago";
const DEFAULT_REFLOG_EXPIRE_UNREACHABLE: &str = "30.days.ago";
const DEFAULT_PRUNE_EXPIRE: &str = "2.weeks.ago";
const STASH_REF_NAME: &str = "refs/stash";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gc: GcConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GcConfig {
    #[serde(default)]
    pub reflog_expire: Option<String>,
    #[serde(default)]
    pub reflog_expire_unreachable: Option<String>,
    #[serde(default)]
    pub prune_expire: Option<String>,
    #[serde(default)]
    pub recent_objects_hook: Vec<String>,
    /// Per-ref overrides; the first matching pattern wins
    #[serde(default)]
    pub reflog: Vec<ReflogExpireRule>,
}

/// A window left out of a matching rule expires nothing
#[derive(Debug, Clone, Deserialize)]
pub struct ReflogExpireRule {
    pub pattern: String,
    #[serde(default)]
    pub expire: Option<String>,
    #[serde(default)]
    pub expire_unreachable: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryWindow {
    pub total: Timestamp,
    pub unreachable: Timestamp,
}

impl Config {
    pub fn load(git_dir: &Path) -> anyhow::Result<Self> {
        let path = git_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Expiry windows for the reflog of `refname`
    ///
    /// Explicit values win. Otherwise the first rule whose pattern matches
    /// supplies both windows; `refs/stash` never expires unless a rule says
    /// so; everything else gets the repository defaults.
    pub fn reflog_expiry(
        &self,
        refname: &str,
        now: Timestamp,
        explicit_total: Option<Timestamp>,
        explicit_unreachable: Option<Timestamp>,
    ) -> anyhow::Result<ExpiryWindow> {
        if let (Some(total), Some(unreachable)) = (explicit_total, explicit_unreachable) {
            return Ok(ExpiryWindow { total, unreachable });
        }

        let (total, unreachable) = match self.matching_rule(refname)? {
            Some(rule) => (
                expiry_or_zero(rule.expire.as_deref(), now)?,
                expiry_or_zero(rule.expire_unreachable.as_deref(), now)?,
            ),
            None if refname == STASH_REF_NAME => (0, 0),
            None => (
                expiry_or(self.gc.reflog_expire.as_deref(), DEFAULT_REFLOG_EXPIRE, now)?,
                expiry_or(
                    self.gc.reflog_expire_unreachable.as_deref(),
                    DEFAULT_REFLOG_EXPIRE_UNREACHABLE,
                    now,
                )?,
            ),
        };

        Ok(ExpiryWindow {
            total: explicit_total.unwrap_or(total),
            unreachable: explicit_unreachable.unwrap_or(unreachable),
        })
    }

    /// Loose objects newer than this survive `prune`
    pub fn prune_expire(&self, now: Timestamp) -> anyhow::Result<Timestamp> {
        expiry_or(self.gc.prune_expire.as_deref(), DEFAULT_PRUNE_EXPIRE, now)
    }

    pub fn recent_objects_hooks(&self) -> &[String] {
        &self.gc.recent_objects_hook
    }

    fn matching_rule(&self, refname: &str) -> anyhow::Result<Option<&ReflogExpireRule>> {
        for rule in &self.gc.reflog {
            if glob_to_regex(&rule.pattern)?.is_match(refname) {
                return Ok(Some(rule));
            }
        }

        Ok(None)
    }
}

fn expiry_or(value: Option<&str>, default: &str, now: Timestamp) -> anyhow::Result<Timestamp> {
    let value = value.unwrap_or(default);
    parse_expiry_date(value, now).with_context(|| format!("invalid expiry '{}' in configuration", value))
}

fn expiry_or_zero(value: Option<&str>, now: Timestamp) -> anyhow::Result<Timestamp> {
    let Some(value) = value else {
        return Ok(0);
    };
    parse_expiry_date(value, now).with_context(|| format!("invalid expiry '{}' in configuration", value))
}

/// `*` matches any run of characters, `/` included; `?` matches one
fn glob_to_regex(pattern: &str) -> anyhow::Result<Regex> {
    let mut source = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            c => source.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');

    Regex::new(&source).with_context(|| format!("invalid ref pattern '{}'", pattern))
}
