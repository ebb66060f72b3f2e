//! Content digests using blake3.
//!
//! Used for remote source tokens (full 256-bit hex) and for the option
//! digest embedded in asset keys (first 128 bits).

/// A 256-bit content digest (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Number of hex chars kept by [`Digest::short_hex`] (128 bits).
    pub const SHORT_HEX_LEN: usize = 32;

    /// Digest a single byte slice.
    #[inline]
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        Self(*blake3::hash(data.as_ref()).as_bytes())
    }

    /// Digest a sequence of fields without ambiguity between
    /// `["ab", "c"]` and `["a", "bc"]`: every field is length-prefixed.
    pub fn of_fields<'a>(fields: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for field in fields {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Get the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex string (64 chars).
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// First 128 bits as hex (32 chars), used inside file names.
    pub fn short_hex(self) -> String {
        hex::encode(&self.0[..Self::SHORT_HEX_LEN / 2])
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display first 16 chars of hex for brevity
        write!(f, "{}", &self.to_hex()[..16])
    }
}
