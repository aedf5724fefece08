//! Reachability analysis
//!
//! - `pool`: deduplicating object lookup shared by every traversal
//! - `completeness`: memoized check that a commit or tree has all its objects
//! - `marker`: age-bounded, restartable marking from tip commits
//! - `oracle`: "is this commit unreachable" on top of the marker
//! - `rev_walk`: full object graph traversal with a SEEN set
//! - `recent`: recent-object collection and retention hooks
//! - `mark_objects`: whole-repository marking before pruning
//! - `bitmap`: seam for a precomputed reachability index

pub mod bitmap;
pub mod completeness;
pub mod mark_objects;
pub mod marker;
pub mod oracle;
pub mod pool;
pub mod recent;
pub mod rev_walk;

#[cfg(test)]
pub(crate) mod memory;
