//! Teletext page decoder
//!
//! This module turns the raw bytes of a teletext page into a [`PageEntity`]:
//! - Pass 1 scans the header lines for navigation and fastext links
//! - Pass 2 runs the 24×40 control-code state machine over the body,
//!   emitting positioned markup cells and collecting inline page links

mod body;
mod header;
mod links;

pub use body::{COLS, GRID_SIZE, ROWS};
pub use header::{BODY_MARKER, MAX_FAST_LINKS};
pub use links::{is_excluded, EXCLUDED_LINK_PREFIXES};

use crate::page::{ExpiryPolicy, PageEntity, PageId};
use body::BodyWriter;
use links::LinkMatcher;
use thiserror::Error;

/// Errors that make a byte stream undecodable
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Body marker <pre> not found")]
    MissingBodyMarker,

    #[error("Body truncated: expected {expected} bytes, got {actual}")]
    TruncatedBody { expected: usize, actual: usize },

    #[error("Invalid link pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Decoder behavior switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Skip the 40-byte status row that follows the body marker
    pub skip_header_row: bool,
}

/// Decodes teletext pages
///
/// Holds compiled matchers and a row buffer that are reused across calls.
/// A decoder is meant to be owned by a single worker; `decode` takes
/// `&mut self` so the scratch state is never shared.
pub struct TeletextDecoder {
    matcher: LinkMatcher,
    options: DecoderOptions,
    expiry: ExpiryPolicy,
    run: String,
}

impl TeletextDecoder {
    /// Creates a decoder
    ///
    /// # Arguments
    ///
    /// * `options` - Decoder behavior switches
    /// * `expiry` - TTL policy stamped onto every decoded page
    pub fn new(options: DecoderOptions, expiry: ExpiryPolicy) -> Result<Self, DecodeError> {
        Ok(Self {
            matcher: LinkMatcher::new()?,
            options,
            expiry,
            run: String::with_capacity(COLS),
        })
    }

    /// Decodes one page
    ///
    /// # Returns
    ///
    /// * `Ok(PageEntity)` - The decoded page with its navigation and links
    /// * `Err(DecodeError)` - No body marker, or fewer than 24×40 body bytes
    ///
    /// # Example
    ///
    /// ```
    /// use teletekst::decoder::{DecoderOptions, TeletextDecoder, GRID_SIZE};
    /// use teletekst::page::{ExpiryPolicy, PageId};
    ///
    /// let mut bytes = b"pn=n_102\n<pre>".to_vec();
    /// bytes.extend(std::iter::repeat(b' ').take(GRID_SIZE));
    ///
    /// let mut decoder = TeletextDecoder::new(DecoderOptions::default(), ExpiryPolicy::default()).unwrap();
    /// let page = decoder.decode(&PageId::normalize("101"), &bytes).unwrap();
    /// assert_eq!(page.next_page_id().map(PageId::as_str), Some("102-0"));
    /// ```
    pub fn decode(&mut self, page_id: &PageId, bytes: &[u8]) -> Result<PageEntity, DecodeError> {
        let header = header::scan(bytes)?;

        let mut start = header.body_start;
        if self.options.skip_header_row {
            start += COLS;
        }

        let grid = bytes
            .get(start..start + GRID_SIZE)
            .ok_or(DecodeError::TruncatedBody {
                expected: GRID_SIZE,
                actual: bytes.len().saturating_sub(start),
            })?;

        let mut writer = BodyWriter::new(
            &self.matcher,
            &header.navigation.fast_link_page_ids,
            &mut self.run,
        );
        writer.render(grid);
        let (html, linked) = writer.finish();

        tracing::trace!(
            "Decoded {}: {} bytes of markup, {} linked pages",
            page_id,
            html.len(),
            linked.len()
        );

        Ok(PageEntity::new(
            page_id.clone(),
            header.navigation,
            html,
            linked,
            &self.expiry,
        ))
    }
}
