//! Header scan: navigation metadata preceding the `<pre>` body marker

use crate::decoder::DecodeError;
use crate::page::{Navigation, PageId};

/// Marker that opens the videotext body
pub const BODY_MARKER: &[u8] = b"<pre>";

/// Maximum number of fastext shortcuts on a page
pub const MAX_FAST_LINKS: usize = 4;

/// Result of scanning the header lines
#[derive(Debug, Clone)]
pub(crate) struct Header {
    pub navigation: Navigation,

    /// Offset of the first byte after the body marker
    pub body_start: usize,
}

/// Scans `\n`-delimited header lines until the body marker
///
/// # Recognized Lines
///
/// | Prefix  | Field              |
/// |---------|--------------------|
/// | `pn=p_` | previous page      |
/// | `pn=n_` | next page          |
/// | `pn=ps` | previous subpage   |
/// | `pn=ns` | next subpage       |
/// | `ftl=`  | next fastext link  |
///
/// All other lines are ignored.
pub(crate) fn scan(bytes: &[u8]) -> Result<Header, DecodeError> {
    let mut navigation = Navigation::default();
    let mut mark = 0;

    for index in 0..bytes.len() {
        if bytes[index..].starts_with(BODY_MARKER) {
            return Ok(Header {
                navigation,
                body_start: index + BODY_MARKER.len(),
            });
        }

        if bytes[index] != b'\n' {
            continue;
        }

        let line = String::from_utf8_lossy(&bytes[mark..index]);
        mark = index + 1;
        apply_line(&mut navigation, &line);
    }

    Err(DecodeError::MissingBodyMarker)
}

fn apply_line(navigation: &mut Navigation, line: &str) {
    if let Some(value) = line.strip_prefix("pn=p_") {
        navigation.prev_page_id = page_value(value);
    } else if let Some(value) = line.strip_prefix("pn=n_") {
        navigation.next_page_id = page_value(value);
    } else if let Some(value) = line.strip_prefix("pn=ps") {
        navigation.prev_sub_page_id = page_value(value);
    } else if let Some(value) = line.strip_prefix("pn=ns") {
        navigation.next_sub_page_id = page_value(value);
    } else if let Some(value) = line.strip_prefix("ftl=") {
        if navigation.fast_link_page_ids.len() < MAX_FAST_LINKS {
            // Slots are positional: an empty value still takes its color
            navigation
                .fast_link_page_ids
                .push(PageId::normalize(value.trim()));
        } else {
            tracing::trace!("Ignoring extra fastext link: {}", value);
        }
    }
}

fn page_value(value: &str) -> Option<PageId> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(PageId::normalize(value))
    }
}
