//! Object store seam
//!
//! The reachability engine never touches files directly; it reads objects
//! through [`ObjectStore`]. Absence is a normal answer (`Ok(None)`), corruption
//! is reported separately from absence, and only real I/O failures are fatal.

use crate::Timestamp;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use derive_new::new;

/// An object as read from storage: its type and its payload without header
#[derive(Debug, Clone, new)]
pub struct RawObject {
    pub object_type: ObjectType,
    pub payload: Bytes,
}

/// A pack as seen by object enumeration
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct PackInfo {
    pub name: String,
    pub mtime: Timestamp,
    /// Marked as kept for the duration of this process only
    pub kept_in_core: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object {oid} is corrupt: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait ObjectStore {
    /// Read an object; `Ok(None)` when it does not exist
    fn read_object(&self, oid: &ObjectId) -> Result<Option<RawObject>, StoreError>;

    fn object_exists(&self, oid: &ObjectId) -> bool;

    /// Type of an object without materializing its payload when the store can avoid it
    fn object_type(&self, oid: &ObjectId) -> Result<Option<ObjectType>, StoreError> {
        Ok(self.read_object(oid)?.map(|raw| raw.object_type))
    }

    /// Visit every loose object with its modification time
    fn for_each_loose_object(
        &self,
        visit: &mut dyn FnMut(&ObjectId, Timestamp) -> anyhow::Result<()>,
    ) -> anyhow::Result<()>;

    /// Visit every packed object together with the pack holding it
    ///
    /// The loose [`Database`](crate::areas::database::Database) has no packs and
    /// visits nothing.
    fn for_each_packed_object(
        &self,
        _visit: &mut dyn FnMut(&ObjectId, &PackInfo) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
