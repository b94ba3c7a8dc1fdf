//! Frame payload masking (RFC 6455 §5.3).
//!
//! Generalized from the teacher's `crate::mask::unmask` (referenced from
//! `fastwebsockets`'s public re-export); XORs 8 bytes at a time where
//! possible and falls back to a byte loop for the remainder.

/// Unmasks `buf` in place using the 4-byte `mask`, starting at mask index 0.
pub fn unmask(buf: &mut [u8], mask: [u8; 4]) {
  let mask64 = u64::from_ne_bytes([
    mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
  ]);

  let mut chunks = buf.chunks_exact_mut(8);
  for chunk in &mut chunks {
    let bytes: [u8; 8] = chunk.try_into().unwrap();
    let word = u64::from_ne_bytes(bytes) ^ mask64;
    chunk.copy_from_slice(&word.to_ne_bytes());
  }
  for (i, b) in chunks.into_remainder().iter_mut().enumerate() {
    *b ^= mask[i % 4];
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unmask_is_its_own_inverse() {
    let mask = [0x12, 0x34, 0x56, 0x78];
    let original = b"the quick brown fox jumps over 13 lazy dogs!".to_vec();
    let mut buf = original.clone();
    unmask(&mut buf, mask);
    assert_ne!(buf, original);
    unmask(&mut buf, mask);
    assert_eq!(buf, original);
  }

  #[test]
  fn unmask_handles_short_payloads() {
    let mask = [0xaa, 0xbb, 0xcc, 0xdd];
    let mut buf = vec![1, 2, 3];
    let expected = vec![1 ^ 0xaa, 2 ^ 0xbb, 3 ^ 0xcc];
    unmask(&mut buf, mask);
    assert_eq!(buf, expected);
  }
}
