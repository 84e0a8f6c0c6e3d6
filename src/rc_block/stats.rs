/*!

Operation counters for an allocator. Compiled to no-ops unless the `arc_stats` feature is on.

*/

use std::fmt::{Display, Formatter};
#[cfg(feature = "arc_stats")]
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

#[derive(Debug, Default)]
pub struct AllocStats {
  #[cfg(feature = "arc_stats")]
  allocations       : AtomicUsize,
  #[cfg(feature = "arc_stats")]
  failed_allocations: AtomicUsize,
  #[cfg(feature = "arc_stats")]
  retains           : AtomicUsize,
  #[cfg(feature = "arc_stats")]
  releases          : AtomicUsize,
  #[cfg(feature = "arc_stats")]
  frees             : AtomicUsize,
}

/// A point in time copy of `AllocStats`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StatsSnapshot {
  pub allocations       : usize,
  pub failed_allocations: usize,
  pub retains           : usize,
  pub releases          : usize,
  pub frees             : usize,
}

#[cfg(feature = "arc_stats")]
impl AllocStats {
  #[inline(always)]
  pub(crate) fn record_allocation(&self) {
    self.allocations.fetch_add(1, Relaxed);
  }

  #[inline(always)]
  pub(crate) fn record_failed_allocation(&self) {
    self.failed_allocations.fetch_add(1, Relaxed);
  }

  #[inline(always)]
  pub(crate) fn record_retain(&self) {
    self.retains.fetch_add(1, Relaxed);
  }

  #[inline(always)]
  pub(crate) fn record_release(&self) {
    self.releases.fetch_add(1, Relaxed);
  }

  #[inline(always)]
  pub(crate) fn record_free(&self) {
    self.frees.fetch_add(1, Relaxed);
  }

  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      allocations       : self.allocations.load(Relaxed),
      failed_allocations: self.failed_allocations.load(Relaxed),
      retains           : self.retains.load(Relaxed),
      releases          : self.releases.load(Relaxed),
      frees             : self.frees.load(Relaxed),
    }
  }
}

#[cfg(not(feature = "arc_stats"))]
impl AllocStats {
  #[inline(always)]
  pub(crate) fn record_allocation(&self) {}
  #[inline(always)]
  pub(crate) fn record_failed_allocation(&self) {}
  #[inline(always)]
  pub(crate) fn record_retain(&self) {}
  #[inline(always)]
  pub(crate) fn record_release(&self) {}
  #[inline(always)]
  pub(crate) fn record_free(&self) {}

  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot::default()
  }
}

impl StatsSnapshot {
  /// Blocks allocated and not yet freed.
  pub fn live_blocks(&self) -> usize {
    self.allocations.saturating_sub(self.frees)
  }
}

impl Display for StatsSnapshot {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "Allocations: {}\tFailed: {}\tRetains: {}\tReleases: {}\tFrees: {}\tLive: {}",
      self.allocations,
      self.failed_allocations,
      self.retains,
      self.releases,
      self.frees,
      self.live_blocks()
    )
  }
}
