//! String and blob heap writers (spec §4.5).

use crate::buffer::ByteWriter;
use crate::types::{GramforgeError, GramforgeResult, Map};

const HEAP_SIZE_CAP: usize = (1 << 24) - 1;

/// A byte offset into a heap. `0` always denotes the empty entry.
pub type HeapHandle = u32;

/// Deduplicating, NUL-terminated UTF-8 string heap (spec §4.5). Offset `0`
/// is reserved for the empty string.
#[derive(Default)]
pub struct StringHeap {
  bytes:  Vec<u8>,
  lookup: Map<String, HeapHandle>,
}

impl StringHeap {
  pub fn new() -> Self {
    let mut heap = Self::default();
    heap.bytes.push(0); // offset 0: the empty string's terminator
    heap
  }

  /// Interns `value`, returning its byte offset. Repeated interning of the
  /// same string returns the same handle (spec §8 scenario 6, "the writer
  /// deduplicates the string").
  pub fn intern(&mut self, value: &str) -> GramforgeResult<HeapHandle> {
    if value.is_empty() {
      return Ok(0);
    }
    if value.as_bytes().contains(&0) {
      return Err(GramforgeError::EmbeddedNul);
    }
    if let Some(&handle) = self.lookup.get(value) {
      return Ok(handle);
    }
    let handle = self.bytes.len() as HeapHandle;
    if self.bytes.len() + value.len() + 1 > HEAP_SIZE_CAP {
      return Err(GramforgeError::HeapOverflow { heap: "string", attempted: self.bytes.len() + value.len() + 1 });
    }
    self.bytes.extend_from_slice(value.as_bytes());
    self.bytes.push(0);
    self.lookup.insert(value.to_string(), handle);
    Ok(handle)
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.len() <= 1
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.bytes
  }
}

/// Deduplicating, length-prefixed blob heap (spec §4.5, §6). Offset `0` is
/// reserved for the empty blob.
#[derive(Default)]
pub struct BlobHeap {
  writer: ByteWriter,
  lookup: Map<Vec<u8>, HeapHandle>,
}

impl BlobHeap {
  pub fn new() -> Self {
    let mut heap = Self::default();
    heap.writer.write_compressed_length(0).expect("writing a zero length never overflows");
    heap
  }

  pub fn intern(&mut self, blob: &[u8]) -> GramforgeResult<HeapHandle> {
    if blob.is_empty() {
      return Ok(0);
    }
    if let Some(&handle) = self.lookup.get(blob) {
      return Ok(handle);
    }
    let handle = self.writer.len() as HeapHandle;
    if self.writer.len() + blob.len() + 4 > HEAP_SIZE_CAP {
      return Err(GramforgeError::HeapOverflow { heap: "blob", attempted: self.writer.len() + blob.len() + 4 });
    }
    self.writer.write_compressed_length(blob.len() as u32)?;
    self.writer.write_bytes(blob);
    self.lookup.insert(blob.to_vec(), handle);
    Ok(handle)
  }

  pub fn len(&self) -> usize {
    self.writer.len()
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.writer.into_bytes()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn string_heap_interns_and_deduplicates() {
    let mut heap = StringHeap::new();
    let a = heap.intern("hello").unwrap();
    let b = heap.intern("world").unwrap();
    let a_again = heap.intern("hello").unwrap();
    assert_eq!(a, a_again);
    assert_ne!(a, b);
    assert_eq!(heap.intern("").unwrap(), 0);
  }

  #[test]
  fn string_heap_rejects_embedded_nul() {
    let mut heap = StringHeap::new();
    assert!(matches!(heap.intern("a\0b"), Err(GramforgeError::EmbeddedNul)));
  }

  #[test]
  fn blob_heap_interns_and_deduplicates() {
    let mut heap = BlobHeap::new();
    let a = heap.intern(&[1, 2, 3]).unwrap();
    let b = heap.intern(&[4, 5]).unwrap();
    let a_again = heap.intern(&[1, 2, 3]).unwrap();
    assert_eq!(a, a_again);
    assert_ne!(a, b);
    assert_eq!(heap.intern(&[]).unwrap(), 0);
  }
}
