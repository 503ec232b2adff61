//! Constants and error plumbing shared by every kernel crate.
pub mod constants;
