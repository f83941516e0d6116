//! Pagination Engine (C4).
//!
//! Cursors are opaque to callers: a `bincode`-encoded, `flate2`-compressed,
//! base64-url-safe-no-pad string carrying a per-backend offset vector and
//! the `view_epoch` the cursor was minted against (§6).

use std::collections::BTreeSet;
use std::io::{Read, Write};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::merge::DedupKey;

/// Errors decoding a caller-supplied cursor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    /// The cursor's `view_epoch` does not match the currently loaded roster;
    /// the import group was reloaded since this cursor was minted (§6.3).
    #[error("cursor view_epoch is stale")]
    StaleEpoch,
    /// The cursor failed to decode as valid base64/zlib/bincode.
    #[error("malformed cursor: {0}")]
    Malformed(String),
}

/// This backend's read position within one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerBackendOffset {
    /// The backend's name.
    pub backend_name: String,
    /// Number of items already consumed from this backend for this request.
    pub offset: usize,
}

/// The decoded contents of a pagination cursor (§6.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// The import-group roster generation this cursor was minted against.
    pub view_epoch: u64,
    /// Per-backend read offsets, in backend-priority order.
    pub offsets: Vec<PerBackendOffset>,
    /// A hash of the original request shape (variables/entities/etc.), so a
    /// cursor cannot be replayed against a different logical request.
    pub request_fingerprint: u64,
}

impl Cursor {
    /// Encodes this cursor as an opaque, URL-safe string.
    pub fn encode(&self) -> String {
        let bytes = bincode::serialize(self).expect("Cursor always serializes");
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&bytes)
            .expect("writing to an in-memory buffer cannot fail");
        let compressed = encoder
            .finish()
            .expect("finishing an in-memory zlib stream cannot fail");
        URL_SAFE_NO_PAD.encode(compressed)
    }

    /// Decodes a cursor previously produced by [`Cursor::encode`], validating
    /// it against the currently live `view_epoch`.
    pub fn decode(raw: &str, current_view_epoch: u64) -> Result<Self, PaginationError> {
        let compressed = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|e| PaginationError::Malformed(e.to_string()))?;
        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut bytes = Vec::new();
        decoder
            .read_to_end(&mut bytes)
            .map_err(|e| PaginationError::Malformed(e.to_string()))?;
        let cursor: Cursor = bincode::deserialize(&bytes)
            .map_err(|e| PaginationError::Malformed(e.to_string()))?;
        if cursor.view_epoch != current_view_epoch {
            return Err(PaginationError::StaleEpoch);
        }
        Ok(cursor)
    }

    /// Returns the stored offset for a named backend, or 0 if absent.
    pub fn offset_for(&self, backend_name: &str) -> usize {
        self.offsets
            .iter()
            .find(|o| o.backend_name == backend_name)
            .map(|o| o.offset)
            .unwrap_or(0)
    }
}

/// One page of merged results, plus the cursor to fetch the next page (if
/// any) and the set of dedup keys already yielded so the caller can keep
/// excluding them across calls within a single streaming session.
pub struct Page<T> {
    /// The items in this page, in merge order.
    pub items: Vec<T>,
    /// Present iff more results may exist beyond this page.
    pub next_cursor: Option<String>,
}

/// Slices a merged, already-deduplicated result list into one page.
///
/// Per §6.2/§9 (REDESIGN FLAGS): a cursor is emitted whenever the page is
/// exactly `page_size` long, even if that happens to exactly exhaust every
/// backend — the caller pays for one extra round trip that comes back
/// empty, rather than the engine risking a false "no more results" when a
/// backend's true exhaustion can't be distinguished from "got lucky and
/// landed on a boundary".
pub fn paginate<T: DedupKey>(
    merged: Vec<T>,
    page_size: usize,
    view_epoch: u64,
    request_fingerprint: u64,
    backend_offsets_after: Vec<PerBackendOffset>,
) -> Page<T> {
    if merged.len() < page_size {
        return Page {
            items: merged,
            next_cursor: None,
        };
    }
    let mut items = merged;
    items.truncate(page_size);
    let cursor = Cursor {
        view_epoch,
        offsets: backend_offsets_after,
        request_fingerprint,
    };
    Page {
        items,
        next_cursor: Some(cursor.encode()),
    }
}

/// Builds the `already_yielded` set a subsequent page's merge pass must
/// exclude, from the items already returned on prior pages.
pub fn already_yielded_keys<T: DedupKey>(previous_pages: &[T]) -> BTreeSet<T::Key> {
    previous_pages.iter().map(DedupKey::dedup_key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let cursor = Cursor {
            view_epoch: 7,
            offsets: vec![PerBackendOffset {
                backend_name: "b1".to_string(),
                offset: 42,
            }],
            request_fingerprint: 123,
        };
        let encoded = cursor.encode();
        let decoded = Cursor::decode(&encoded, 7).unwrap();
        assert_eq!(cursor, decoded);
    }

    #[test]
    fn stale_epoch_is_rejected() {
        let cursor = Cursor {
            view_epoch: 7,
            offsets: vec![],
            request_fingerprint: 1,
        };
        let encoded = cursor.encode();
        let result = Cursor::decode(&encoded, 8);
        assert_eq!(result, Err(PaginationError::StaleEpoch));
    }

    #[test]
    fn malformed_cursor_is_rejected() {
        let result = Cursor::decode("not a real cursor!!", 1);
        assert!(matches!(result, Err(PaginationError::Malformed(_))));
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Item(u32);

    impl DedupKey for Item {
        type Key = u32;
        fn dedup_key(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn exact_page_boundary_still_emits_cursor() {
        let items: Vec<Item> = (0..3).map(Item).collect();
        let page = paginate(items, 3, 1, 0, vec![]);
        assert_eq!(page.items.len(), 3);
        assert!(page.next_cursor.is_some());
    }

    #[test]
    fn short_page_emits_no_cursor() {
        let items: Vec<Item> = (0..2).map(Item).collect();
        let page = paginate(items, 3, 1, 0, vec![]);
        assert_eq!(page.items.len(), 2);
        assert!(page.next_cursor.is_none());
    }
}
