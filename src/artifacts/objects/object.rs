use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Result;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{BufRead, Write};

/// Serialize the payload of an object (without the `<type> <size>\0` header)
pub trait Packable {
    fn serialize_payload(&self) -> Result<Bytes>;
}

/// Deserialize an object from its payload; the header has already been consumed
pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    /// Full serialized form, header included
    fn serialize(&self) -> Result<Bytes> {
        let payload = self.serialize_payload()?;

        let mut object_bytes = Vec::with_capacity(payload.len() + 32);
        let header = format!("{} {}\0", self.object_type().as_str(), payload.len());
        object_bytes.write_all(header.as_bytes())?;
        object_bytes.write_all(&payload)?;

        Ok(Bytes::from(object_bytes))
    }

    fn object_id(&self) -> Result<ObjectId> {
        let content = self.serialize()?;
        let mut hasher = Sha1::new();
        hasher.update(&content);

        let oid = hasher.finalize();
        ObjectId::try_parse(format!("{oid:x}"))
    }
}
