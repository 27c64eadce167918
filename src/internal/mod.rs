//! Internal implementation details.

pub(crate) mod construction;

pub(crate) use construction::{enter, ChainGuard, Entry};
