//! Per-connection scratch buffer pool.
//!
//! The original server bump-allocates every per-request object out of a
//! pool owned by the connection, freeing the whole pool in one shot when
//! the connection closes (spec §4.1). In Rust, the allocator already gives
//! us per-object bump allocation and the `Drop` of `Connection` already
//! frees everything transitively — there is no separate free list to
//! manage. What's left of the original contract is the single piece that
//! *is* still useful: a reusable scratch buffer so repeated handshakes and
//! frame reads on the same connection don't reallocate every time.
use bytes::BytesMut;

use crate::error::PoolError;

/// A connection-scoped reusable buffer.
///
/// Mutations go through `&mut self`, so unlike the original's spinlock-
/// guarded pool, exclusivity is enforced at compile time: only the task
/// that owns the `Connection` can touch its pool.
pub struct ConnPool {
  scratch: BytesMut,
  max_size: usize,
}

impl ConnPool {
  pub fn new(initial_capacity: usize, max_size: usize) -> Self {
    ConnPool {
      scratch: BytesMut::with_capacity(initial_capacity),
      max_size,
    }
  }

  /// Resets the cursor without releasing the underlying allocation, mirroring
  /// `stu_http_wait_request_handler`'s `buf->last = buf->start`.
  pub fn reset(&mut self) {
    self.scratch.clear();
  }

  pub fn scratch_mut(&mut self) -> &mut BytesMut {
    &mut self.scratch
  }

  /// Reserves `additional` bytes, failing instead of growing past
  /// `max_size` — the Rust analogue of the original's null-sentinel
  /// allocator failure (spec §4.1's "internal-server-error" failure mode).
  pub fn reserve(&mut self, additional: usize) -> Result<(), PoolError> {
    if self.scratch.len() + additional > self.max_size {
      return Err(PoolError::Exhausted);
    }
    self.scratch.reserve(additional);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reserve_fails_past_max_size() {
    let mut pool = ConnPool::new(16, 32);
    assert!(pool.reserve(16).is_ok());
    pool.scratch_mut().extend_from_slice(&[0u8; 16]);
    assert!(matches!(pool.reserve(32), Err(PoolError::Exhausted)));
  }

  #[test]
  fn reset_keeps_capacity() {
    let mut pool = ConnPool::new(8, 1024);
    pool.scratch_mut().extend_from_slice(b"hello");
    let cap = pool.scratch_mut().capacity();
    pool.reset();
    assert_eq!(pool.scratch_mut().len(), 0);
    assert!(pool.scratch_mut().capacity() >= cap);
  }
}
