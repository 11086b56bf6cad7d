//! Decoded page records and their expiry policy

use crate::page::PageId;
use chrono::{DateTime, Duration, Utc};

/// Decides how long a decoded page stays valid
///
/// Pages whose major number starts with the volatile prefix (ticker-like
/// content) expire quickly; all other pages use the default TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Prefix of page ids that get the short TTL
    pub volatile_prefix: String,

    /// TTL for volatile pages
    pub volatile_ttl: Duration,

    /// TTL for all other pages
    pub default_ttl: Duration,
}

impl ExpiryPolicy {
    /// Returns the TTL that applies to the given page
    pub fn ttl_for(&self, page_id: &PageId) -> Duration {
        if !self.volatile_prefix.is_empty() && page_id.major().starts_with(&self.volatile_prefix) {
            self.volatile_ttl
        } else {
            self.default_ttl
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            volatile_prefix: "8".to_string(),
            volatile_ttl: Duration::seconds(60),
            default_ttl: Duration::seconds(300),
        }
    }
}

/// Navigation metadata read from a page header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    pub prev_page_id: Option<PageId>,
    pub next_page_id: Option<PageId>,
    pub prev_sub_page_id: Option<PageId>,
    pub next_sub_page_id: Option<PageId>,

    /// The fastext shortcuts in header order
    pub fast_link_page_ids: Vec<PageId>,
}

/// One decoded teletext page
///
/// Built once per successful decode and never mutated afterwards; the
/// loader shares it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PageEntity {
    page_id: PageId,
    html_data: String,
    navigation: Navigation,
    linked_page_ids: Vec<PageId>,
    expires_at: DateTime<Utc>,
}

impl PageEntity {
    /// Creates a page entity that expires `policy.ttl_for(page_id)` from now
    pub fn new(
        page_id: PageId,
        navigation: Navigation,
        html_data: String,
        linked_page_ids: Vec<PageId>,
        policy: &ExpiryPolicy,
    ) -> Self {
        let expires_at = Utc::now() + policy.ttl_for(&page_id);
        Self {
            page_id,
            html_data,
            navigation,
            linked_page_ids,
            expires_at,
        }
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    /// The decoded markup, rows in order
    pub fn html_data(&self) -> &str {
        &self.html_data
    }

    pub fn next_page_id(&self) -> Option<&PageId> {
        self.navigation.next_page_id.as_ref()
    }

    pub fn prev_page_id(&self) -> Option<&PageId> {
        self.navigation.prev_page_id.as_ref()
    }

    pub fn next_sub_page_id(&self) -> Option<&PageId> {
        self.navigation.next_sub_page_id.as_ref()
    }

    pub fn prev_sub_page_id(&self) -> Option<&PageId> {
        self.navigation.prev_sub_page_id.as_ref()
    }

    pub fn fast_link_page_ids(&self) -> &[PageId] {
        &self.navigation.fast_link_page_ids
    }

    /// Page references found in the body text, in order of first occurrence
    pub fn linked_page_ids(&self) -> &[PageId] {
        &self.linked_page_ids
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true while the entity may still be served from cache
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Returns true if the entity is still valid at `now`
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Every page this one points at, in preload order
    ///
    /// Navigation ids come first (next, prev, next subpage, prev subpage),
    /// followed by the fastext links and then the inline body links.
    pub fn referenced_page_ids(&self) -> impl Iterator<Item = &PageId> {
        let nav = &self.navigation;
        nav.next_page_id
            .iter()
            .chain(nav.prev_page_id.iter())
            .chain(nav.next_sub_page_id.iter())
            .chain(nav.prev_sub_page_id.iter())
            .chain(nav.fast_link_page_ids.iter())
            .chain(self.linked_page_ids.iter())
    }
}
