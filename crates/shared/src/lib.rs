#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! StudioDir shared types
//!
//! Domain enums used by every crate in the workspace, plus database pool helpers.

pub mod db;
pub mod types;

pub use db::create_pool;
pub use types::{MembershipTier, ParseEnumError, StudioStatus, StudioType};
