//! Owned, 16-byte-aligned fragment buffers
//!
//! Every buffer handed to a coding kernel is aligned to 16 bytes so the
//! word-wide XOR and multiply loops never straddle an unaligned boundary.
//! The fragment header is 80 bytes (5 x 16), which keeps the payload region
//! aligned whenever the buffer itself is.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

use crate::fragment::header::{self, HEADER_SIZE};

const FRAGMENT_ALIGN: usize = 16;

/// An owned erasure-coded fragment: an 80-byte header followed by the
/// payload region (payload bytes plus any backend metadata bytes).
///
/// Fragments are produced by `encode` and `reconstruct_fragment`; their
/// backing memory is reclaimed when the value is dropped.
pub struct Fragment {
    ptr: NonNull<u8>,
    len: usize,
}

// The buffer is uniquely owned and never aliased.
unsafe impl Send for Fragment {}
unsafe impl Sync for Fragment {}

impl Fragment {
    fn layout(len: usize) -> Layout {
        // len is bounded by blocksize + header, both well under isize::MAX
        Layout::from_size_align(len, FRAGMENT_ALIGN).expect("fragment layout")
    }

    /// Allocate a zeroed fragment buffer for `payload_len` payload bytes and
    /// write the header magic, leaving the rest of the header for `stamp`.
    pub(crate) fn alloc(payload_len: usize) -> Self {
        let mut frag = Self::alloc_raw(HEADER_SIZE + payload_len);
        header::write_magic(frag.as_mut_bytes());
        frag
    }

    /// Allocate a zeroed aligned buffer of exactly `len` bytes, no header.
    pub(crate) fn alloc_raw(len: usize) -> Self {
        assert!(len > 0, "zero-length fragment buffer");
        let layout = Self::layout(len);
        let raw = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };
        Self { ptr, len }
    }

    /// Copy caller-provided fragment bytes into a fresh aligned buffer.
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        let mut frag = Self::alloc_raw(bytes.len());
        frag.as_mut_bytes().copy_from_slice(bytes);
        frag
    }

    /// Total on-wire length (header + payload region)
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the buffer holds no bytes (only the `Default` placeholder)
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The full fragment bytes, header included
    pub fn as_bytes(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable view of the full fragment bytes
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// The payload region (everything past the header)
    pub fn payload(&self) -> &[u8] {
        &self.as_bytes()[HEADER_SIZE..]
    }

    /// Mutable view of the payload region
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.as_mut_bytes()[HEADER_SIZE..]
    }

    /// Decode and verify this fragment's header metadata
    pub fn metadata(&self) -> crate::error::Result<crate::fragment::FragmentMetadata> {
        header::read_metadata(self.as_bytes())
    }
}

impl Default for Fragment {
    /// A zero-length placeholder; used to temporarily move a fragment out of
    /// a stripe while its siblings are borrowed as dot-product sources.
    fn default() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
        }
    }
}

impl Clone for Fragment {
    fn clone(&self) -> Self {
        if self.len == 0 {
            return Self::default();
        }
        Self::from_bytes(self.as_bytes())
    }
}

impl Drop for Fragment {
    fn drop(&mut self) {
        if self.len > 0 {
            unsafe { dealloc(self.ptr.as_ptr(), Self::layout(self.len)) };
        }
    }
}

impl std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragment").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_zeroed_and_aligned() {
        let frag = Fragment::alloc(1024);
        assert_eq!(frag.len(), HEADER_SIZE + 1024);
        assert_eq!(frag.as_bytes().as_ptr() as usize % FRAGMENT_ALIGN, 0);
        assert_eq!(frag.payload().as_ptr() as usize % FRAGMENT_ALIGN, 0);
        assert!(frag.payload().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_bytes_roundtrip() {
        let src: Vec<u8> = (0..200u16).map(|v| v as u8).collect();
        let frag = Fragment::from_bytes(&src);
        assert_eq!(frag.as_bytes(), src.as_slice());
        let cloned = frag.clone();
        assert_eq!(cloned.as_bytes(), src.as_slice());
    }

    #[test]
    fn test_default_placeholder_is_empty() {
        let frag = Fragment::default();
        assert!(frag.is_empty());
        assert_eq!(frag.as_bytes(), &[] as &[u8]);
    }
}
