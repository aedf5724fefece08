//! Reflog entries
//!
//! One line per ref update, oldest first:
//!
//! ```text
//! <old-sha> <new-sha> <name> <<email>> <timestamp> <timezone>\t<message>
//! ```
//!
//! A null old id records ref creation, a null new id records deletion.

use crate::Timestamp;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use derive_new::new;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct ReflogEntry {
    pub old_oid: ObjectId,
    pub new_oid: ObjectId,
    /// "Name <email>"
    pub identity: String,
    pub timestamp: Timestamp,
    /// "+hhmm" / "-hhmm"
    pub timezone: String,
    pub message: String,
}

impl ReflogEntry {
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}\t{}\n",
            self.old_oid,
            self.new_oid,
            self.identity,
            self.timestamp,
            self.timezone,
            self.message.trim_end_matches('\n')
        )
    }

    pub fn parse_line(line: &str) -> anyhow::Result<Self> {
        let line = line.trim_end_matches('\n');
        let (head, message) = line.split_once('\t').unwrap_or((line, ""));

        let old_oid = head
            .get(..OBJECT_ID_LENGTH)
            .context("Invalid reflog entry: truncated old id")?;
        let new_oid = head
            .get(OBJECT_ID_LENGTH + 1..2 * OBJECT_ID_LENGTH + 1)
            .context("Invalid reflog entry: truncated new id")?;
        let rest = head
            .get(2 * OBJECT_ID_LENGTH + 2..)
            .context("Invalid reflog entry: missing identity")?;

        let parts = rest.rsplitn(3, ' ').collect::<Vec<_>>();
        let [timezone, timestamp, identity] = parts[..] else {
            anyhow::bail!("Invalid reflog entry: missing timestamp");
        };

        Ok(ReflogEntry {
            old_oid: ObjectId::try_parse(old_oid.to_string())?,
            new_oid: ObjectId::try_parse(new_oid.to_string())?,
            identity: identity.to_string(),
            timestamp: timestamp
                .parse()
                .with_context(|| format!("Invalid reflog timestamp {timestamp}"))?,
            timezone: timezone.to_string(),
            message: message.to_string(),
        })
    }
}
