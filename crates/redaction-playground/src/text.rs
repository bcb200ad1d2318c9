//! UTF-16 offset indexing over input text.
//!
//! Every span in this crate is measured in UTF-16 code units, the unit used by
//! the remote assist endpoint. Rust strings are indexed by byte, so slicing
//! always goes through a [`TextIndex`] built from the live text.

/// Length of `text` in UTF-16 code units.
#[must_use]
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Bidirectional map between UTF-16 offsets and byte offsets of a string.
///
/// Only offsets that fall on a char boundary are addressable. An offset that
/// lands between the two halves of a surrogate pair has no byte equivalent.
#[derive(Debug, Clone)]
pub struct TextIndex<'a> {
    text: &'a str,
    /// `(byte, utf16)` for every char boundary, including the end of the text.
    boundaries: Vec<(usize, usize)>,
}

impl<'a> TextIndex<'a> {
    /// Build an index for `text`.
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        let mut boundaries = Vec::with_capacity(text.len() + 1);
        let mut utf16 = 0;
        for (byte, ch) in text.char_indices() {
            boundaries.push((byte, utf16));
            utf16 += ch.len_utf16();
        }
        boundaries.push((text.len(), utf16));
        Self { text, boundaries }
    }

    /// The indexed text.
    #[must_use]
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Length of the text in UTF-16 code units.
    #[must_use]
    pub fn len_utf16(&self) -> usize {
        self.boundaries.last().map_or(0, |&(_, utf16)| utf16)
    }

    /// Check if the indexed text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Convert a UTF-16 offset to a byte offset.
    ///
    /// Returns `None` past the end of the text or inside a surrogate pair.
    #[must_use]
    pub fn utf16_to_byte(&self, offset: usize) -> Option<usize> {
        self.boundaries
            .binary_search_by_key(&offset, |&(_, utf16)| utf16)
            .ok()
            .map(|i| self.boundaries[i].0)
    }

    /// Convert a byte offset to a UTF-16 offset.
    ///
    /// Returns `None` if `byte` is not a char boundary of the text.
    #[must_use]
    pub fn byte_to_utf16(&self, byte: usize) -> Option<usize> {
        self.boundaries
            .binary_search_by_key(&byte, |&(b, _)| b)
            .ok()
            .map(|i| self.boundaries[i].1)
    }

    /// Byte range for the UTF-16 range `[start, end)`.
    #[must_use]
    pub fn byte_range(&self, start: usize, end: usize) -> Option<std::ops::Range<usize>> {
        let start = self.utf16_to_byte(start)?;
        let end = self.utf16_to_byte(end)?;
        (start <= end).then_some(start..end)
    }

    /// Slice the text by a UTF-16 range `[start, end)`.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Option<&'a str> {
        self.byte_range(start, end).map(|range| &self.text[range])
    }
}
