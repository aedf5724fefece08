//! Reflog expiry
//!
//! - `entry`: the reflog line format
//! - `expiry_date`: `90.days.ago` style cut-off dates
//! - `policy`: per-entry expire-or-keep decisions for one ref
//! - `expire`: rewriting a reflog through a policy
//! - `selector`: `<ref>@{N}` and `<ref>@{<date>}`

pub mod entry;
pub mod expire;
pub mod expiry_date;
pub mod policy;
pub mod selector;
