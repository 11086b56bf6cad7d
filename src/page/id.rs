use std::fmt;

/// Page shown when no page id is given
pub const HOME_PAGE: &str = "101-0";

/// Anchor prefix used for links between pages in decoded markup
pub const INTERNAL_LINK_PREFIX: &str = "http://foo.bar/#";

/// A canonical teletext page identifier in `"<major>-<minor>"` form
///
/// Construct one through [`PageId::normalize`]; the inner string is always
/// in canonical form afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(String);

impl PageId {
    /// Normalizes a raw page identifier
    ///
    /// # Normalization Steps
    ///
    /// 1. An empty id becomes the home page `101-0`
    /// 2. Every `/` is replaced with `-`
    /// 3. An id without a `-` gets subpage `-0` appended
    ///
    /// The function is total and idempotent.
    ///
    /// # Examples
    ///
    /// ```
    /// use teletekst::page::PageId;
    ///
    /// assert_eq!(PageId::normalize("100/1").as_str(), "100-1");
    /// assert_eq!(PageId::normalize("100").as_str(), "100-0");
    /// assert_eq!(PageId::normalize("").as_str(), "101-0");
    /// ```
    pub fn normalize(raw: &str) -> Self {
        if raw.is_empty() {
            return Self(HOME_PAGE.to_string());
        }

        let mut id = raw.replace('/', "-");
        if !id.contains('-') {
            id.push_str("-0");
        }
        Self(id)
    }

    /// Returns the canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the major page number part (before the `-`)
    pub fn major(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    /// Renders the anchor target used for this page in decoded markup
    pub fn to_internal_link(&self) -> String {
        format!("{}{}", INTERNAL_LINK_PREFIX, self.0)
    }

    /// Recovers a page id from an anchor target produced by [`PageId::to_internal_link`]
    ///
    /// Returns `None` for targets that do not point at a teletext page.
    pub fn from_internal_link(target: &str) -> Option<Self> {
        target
            .strip_prefix(INTERNAL_LINK_PREFIX)
            .filter(|id| !id.is_empty())
            .map(Self::normalize)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
