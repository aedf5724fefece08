//! Git annotated tag object
//!
//! ```text
//! object <sha>
//! type <type>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```
//!
//! Only the target is needed to peel a tag down to the commit it names.

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Tag {
    target: ObjectId,
    target_type: ObjectType,
    name: String,
    message: String,
}

impl Tag {
    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Packable for Tag {
    fn serialize_payload(&self) -> anyhow::Result<Bytes> {
        Ok(Bytes::from(format!(
            "object {}\ntype {}\ntag {}\n\n{}",
            self.target, self.target_type, self.name, self.message
        )))
    }
}

impl Unpackable for Tag {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        let content = String::from_utf8(content)?;
        let (headers, message) = content.split_once("\n\n").unwrap_or((&content, ""));
        let mut lines = headers.lines();

        let target = lines
            .next()
            .and_then(|line| line.strip_prefix("object "))
            .context("Invalid tag object: missing object line")?;
        let target_type = lines
            .next()
            .and_then(|line| line.strip_prefix("type "))
            .context("Invalid tag object: missing type line")?;
        let name = lines
            .next()
            .and_then(|line| line.strip_prefix("tag "))
            .unwrap_or_default();

        Ok(Tag {
            target: ObjectId::try_parse(target.to_string())?,
            target_type: ObjectType::try_from(target_type)?,
            name: name.to_string(),
            message: message.to_string(),
        })
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }
}
