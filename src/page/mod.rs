//! Page identifiers and decoded page records
//!
//! This module provides:
//! - Page id normalization into `"<major>-<minor>"` form
//! - Internal link encoding used by decoded markup
//! - The immutable [`PageEntity`] produced by the decoder

mod entity;
mod id;

pub use entity::{ExpiryPolicy, Navigation, PageEntity};
pub use id::{PageId, HOME_PAGE, INTERNAL_LINK_PREFIX};
