/*!

The counter word that heads every block.

*/

use std::sync::atomic::{
  AtomicUsize,
  Ordering::{Relaxed, Release}
};

/// An atomic owner count. Starts at one.
#[repr(transparent)]
pub struct RefCount(AtomicUsize);

impl RefCount {
  #[inline(always)]
  pub const fn new() -> Self {
    RefCount(AtomicUsize::new(1))
  }

  /// Current number of owners. Only meaningful while the caller holds one of them.
  #[inline(always)]
  pub fn get(&self) -> usize {
    self.0.load(Relaxed)
  }

  /// Adds an owner and returns the count before the increment.
  #[inline(always)]
  pub fn increment(&self) -> usize {
    self.0.fetch_add(1, Relaxed)
  }

  /// Drops an owner. Returns `true` for the one caller that took the count to zero.
  #[inline(always)]
  pub fn decrement(&self) -> bool {
    self.0.fetch_sub(1, Relaxed) == 1
  }

  /// Like `decrement`, but with release ordering so that a later acquire fence by the last owner sees every write
  /// made by the other owners before they let go.
  #[inline(always)]
  pub fn decrement_release(&self) -> bool {
    self.0.fetch_sub(1, Release) == 1
  }

  #[inline(always)]
  pub(crate) fn as_atomic(&self) -> &AtomicUsize {
    &self.0
  }
}

impl Default for RefCount {
  fn default() -> Self {
    RefCount::new()
  }
}

impl std::fmt::Debug for RefCount {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("RefCount").field(&self.get()).finish()
  }
}
