use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;

/// Precomputed reachability index used as a fast path for whole-repository marking
pub trait BitmapIndex {
    /// Report every object reachable from `roots` through `mark_seen`
    ///
    /// Returns `Ok(false)` without reporting anything when the index does not
    /// cover the roots; the caller then falls back to a full walk.
    fn traverse(
        &self,
        roots: &[ObjectId],
        mark_seen: &mut dyn FnMut(&ObjectId, ObjectType),
    ) -> anyhow::Result<bool>;
}
