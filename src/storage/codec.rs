//! Image marker extraction and restoration
//!
//! Generated messages can carry embedded image payloads inline in their
//! text, either as a typed `IMG_DATA:<mime>,<payload>` marker or as a bare
//! `data:image/<type>;base64,<payload>` URI. Keeping those payloads in the
//! fast metadata tier would blow its size budget, so the codec pulls them
//! out into [`ImageBlob`] records before persistence and reassembles the
//! resolved view on read.
//!
//! `extract` is a pure transform: it never touches a store. Persisting the
//! produced blobs is the storage manager's job.

use crate::storage::types::{ChatMessage, ImageBlob};
use regex::Regex;

/// Typed marker pattern, matched first. The generic data-URI pattern is
/// only applied to regions the typed pattern did not claim, so a single
/// image is never extracted twice.
const TYPED_MARKER: &str = r"IMG_DATA:([A-Za-z0-9.+-]+),([A-Za-z0-9+/=]+)";
const DATA_URI_MARKER: &str = r"data:image/([A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=]+)";

/// Extracts embedded image payloads out of message text and reverses the
/// transform on read
pub struct ImageCodec {
    typed: Regex,
    data_uri: Regex,
}

/// One recognized marker occurrence inside a text
struct MarkerMatch {
    start: usize,
    end: usize,
    mime_type: String,
    payload: String,
}

impl ImageCodec {
    /// Create a codec with both marker patterns compiled
    pub fn new() -> Self {
        Self {
            // Both patterns are literals known to compile
            typed: Regex::new(TYPED_MARKER).expect("typed marker pattern is valid"),
            data_uri: Regex::new(DATA_URI_MARKER).expect("data uri marker pattern is valid"),
        }
    }

    /// Extract every embedded image from a message
    ///
    /// Markers are collected in left-to-right scan order, removed from the
    /// text (replaced with nothing, so the surrounding text reflows), and
    /// each produces a fresh [`ImageBlob`] whose id is recorded on the
    /// returned message. Running `extract` on already-stripped text is a
    /// no-op that produces zero blobs.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatvault::storage::{ChatMessage, ImageCodec};
    ///
    /// let codec = ImageCodec::new();
    /// let msg = ChatMessage::bot("here: IMG_DATA:png,QQ== done");
    /// let (stripped, blobs) = codec.extract(&msg);
    /// assert_eq!(stripped.text, "here:  done");
    /// assert_eq!(blobs.len(), 1);
    /// assert_eq!(blobs[0].mime_type, "png");
    /// ```
    pub fn extract(&self, message: &ChatMessage) -> (ChatMessage, Vec<ImageBlob>) {
        let matches = self.scan(&message.text);

        if matches.is_empty() {
            let mut stripped = message.clone();
            stripped.images.clear();
            return (stripped, Vec::new());
        }

        let mut blobs = Vec::with_capacity(matches.len());
        let mut text = String::with_capacity(message.text.len());
        let mut cursor = 0;

        for m in &matches {
            text.push_str(&message.text[cursor..m.start]);
            cursor = m.end;
            blobs.push(ImageBlob::new(&message.id, &m.mime_type, &m.payload));
        }
        text.push_str(&message.text[cursor..]);

        let mut stripped = message.clone();
        stripped.text = text;
        stripped.images.clear();
        stripped
            .image_ids
            .extend(blobs.iter().map(|b| b.id.clone()));

        tracing::debug!(
            message_id = %message.id,
            extracted = blobs.len(),
            "Extracted image payloads from message text"
        );

        (stripped, blobs)
    }

    /// Rebuild the resolved view of a stripped message
    ///
    /// Each referenced blob is looked up through `lookup`; found payloads
    /// are reassembled into `IMG_DATA:<mime>,<payload>` entries on the
    /// message's `images` list, in the order the blob ids were recorded.
    /// Missing blobs (evicted or deleted) are skipped silently; the text is
    /// returned untouched either way. Duplicate payloads are deduplicated
    /// by content at this final assembly only.
    pub fn restore<F>(&self, message: &ChatMessage, lookup: F) -> ChatMessage
    where
        F: Fn(&str) -> Option<ImageBlob>,
    {
        let mut restored = message.clone();
        restored.images.clear();

        for blob_id in &message.image_ids {
            match lookup(blob_id) {
                Some(blob) => {
                    let marker = format!("IMG_DATA:{},{}", blob.mime_type, blob.payload);
                    if !restored.images.contains(&marker) {
                        restored.images.push(marker);
                    }
                }
                None => {
                    tracing::debug!(
                        message_id = %message.id,
                        blob_id = %blob_id,
                        "Referenced blob missing, skipping"
                    );
                }
            }
        }

        restored
    }

    /// Collect marker occurrences in left-to-right order
    ///
    /// Typed markers take priority; generic data-URI matches overlapping a
    /// typed match are dropped.
    fn scan(&self, text: &str) -> Vec<MarkerMatch> {
        let mut matches: Vec<MarkerMatch> = Vec::new();

        for caps in self.typed.captures_iter(text) {
            let whole = caps.get(0).expect("match has a whole capture");
            matches.push(MarkerMatch {
                start: whole.start(),
                end: whole.end(),
                mime_type: caps[1].to_string(),
                payload: caps[2].to_string(),
            });
        }

        for caps in self.data_uri.captures_iter(text) {
            let whole = caps.get(0).expect("match has a whole capture");
            let overlaps = matches
                .iter()
                .any(|m| whole.start() < m.end && m.start < whole.end());
            if overlaps {
                continue;
            }
            matches.push(MarkerMatch {
                start: whole.start(),
                end: whole.end(),
                mime_type: caps[1].to_string(),
                payload: caps[2].to_string(),
            });
        }

        matches.sort_by_key(|m| m.start);
        matches
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new()
    }
}
