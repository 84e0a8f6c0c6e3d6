/*!

The reference counted allocator. Three operations over one shared counter per block:

 1. `allocate` reserves a block from the heap and sets its count to one.
 2. `retain` adds an owner with a relaxed `fetch_add`. The caller already owns a reference, so the block cannot be
    freed underneath it and no ordering beyond atomicity is needed.
 3. `release` removes an owner with a relaxed `fetch_sub` and frees the block if the value it replaced was one.
    Reading the old value and writing the new one is a single instruction, so two racing releases can never both
    see themselves as the last owner.

None of them lock or block. The only way any of them touches the heap besides `allocate` is the one `free` issued by
the last `release`.

*/

use std::ptr::null_mut;

use log::{info, trace, warn};
use once_cell::sync::Lazy;

use crate::{
  config::RuntimeConfig,
  error::AllocError,
  rc_block::{
    AllocStats,
    BlockPtr,
    Handle,
    Heap,
    RefCount,
    StatsSnapshot,
    SystemHeap,
    REF_COUNT_SIZE
  }
};

static GLOBAL_ALLOCATOR: Lazy<RcAllocator<SystemHeap>> = Lazy::new(|| {
  let config = match RuntimeConfig::from_env() {
    Ok(config) => config,
    Err(e) => {
      warn!("ignoring arc runtime environment: {}", e);
      RuntimeConfig::default()
    }
  };
  RcAllocator::with_config(SystemHeap, config)
});

/// The allocator behind the C entry points, configured from the environment on first use.
#[inline(always)]
pub fn global_allocator() -> &'static RcAllocator<SystemHeap> {
  &GLOBAL_ALLOCATOR
}

pub struct RcAllocator<H: Heap = SystemHeap> {
  heap  : H,
  config: RuntimeConfig,
  stats : AllocStats,
}

impl<H: Heap> RcAllocator<H> {
  pub fn new(heap: H) -> Self {
    RcAllocator::with_config(heap, RuntimeConfig::default())
  }

  pub fn with_config(heap: H, config: RuntimeConfig) -> Self {
    RcAllocator {
      heap,
      config,
      stats: AllocStats::default(),
    }
  }

  #[inline(always)]
  pub fn heap(&self) -> &H {
    &self.heap
  }

  #[inline(always)]
  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Allocates a block of `size` bytes, counter included, with a count of one.
  pub fn try_allocate(&self, size: usize) -> Result<Handle, AllocError> {
    if size < REF_COUNT_SIZE {
      self.stats.record_failed_allocation();
      return Err(AllocError::TooSmall { size, minimum: REF_COUNT_SIZE });
    }
    if size > self.config.max_block_size {
      self.stats.record_failed_allocation();
      return Err(AllocError::TooLarge { size, maximum: self.config.max_block_size });
    }

    let handle = match Handle::from_ptr(self.heap.reserve(size)) {
      Some(handle) => handle,
      None => {
        self.stats.record_failed_allocation();
        return Err(AllocError::OutOfMemory { size });
      }
    };

    // The heap hands out at least word aligned memory of at least `REF_COUNT_SIZE` bytes.
    unsafe {
      (handle.as_ptr() as *mut RefCount).write(RefCount::new());
    }

    self.stats.record_allocation();
    if self.config.trace_operations() {
      trace!("allocate({}) -> {}", size, handle);
    }

    Ok(handle)
  }

  /// Allocates a block of `size` bytes, counter included. Any failure gives `None`; nothing aborts.
  #[inline]
  pub fn allocate(&self, size: usize) -> Option<Handle> {
    match self.try_allocate(size) {
      Ok(handle) => Some(handle),
      Err(e) => {
        warn!("allocate: {}", e);
        None
      }
    }
  }

  /// Adds an owner to the block. `None` is ignored.
  ///
  /// # Safety
  /// The block must be live, and the caller must own one of its references (or otherwise know it cannot be freed
  /// during the call).
  #[inline(always)]
  pub unsafe fn retain(&self, handle: Option<Handle>) {
    let Some(handle) = handle else {
      return;
    };
    handle.ref_count_word().increment();
    self.stats.record_retain();
  }

  /// Gives up one owner's reference. Frees the block if it was the last one and returns whether it did. `None` is
  /// ignored and returns `false`.
  ///
  /// # Safety
  /// The block must be live and the caller must own the reference it is giving up. After a `true` return no handle to
  /// the block may be used again.
  #[inline(always)]
  pub unsafe fn release(&self, handle: Option<Handle>) -> bool {
    let Some(handle) = handle else {
      return false;
    };
    self.stats.record_release();

    if !handle.ref_count_word().decrement() {
      return false;
    }

    if self.config.trace_operations() {
      trace!("free {}", handle);
    }
    self.heap.free(handle.as_ptr());
    self.stats.record_free();

    true
  }

  /// Stores `new` into `slot`, moving the slot's ownership from its old block to `new`. The new block is retained
  /// before the old one is released, so assigning a block to a slot that already holds it is harmless.
  ///
  /// # Safety
  /// Both `new` and the block currently in `slot` (if any) must be live. The slot must own one reference to its
  /// current block.
  pub unsafe fn assign(&self, slot: &mut Option<Handle>, new: Option<Handle>) {
    self.retain(new);
    let old = std::mem::replace(slot, new);
    self.release(old);
  }

  /// Counters accumulated so far.
  #[inline(always)]
  pub fn stats(&self) -> StatsSnapshot {
    self.stats.snapshot()
  }

  /// Logs the counters if the `ShowStats` flag is set.
  pub fn report(&self) {
    if self.config.show_stats() {
      info!("{}", self.stats());
    }
  }

  /// `allocate` in raw pointer form.
  #[inline(always)]
  pub fn allocate_raw(&self, size: usize) -> BlockPtr {
    self.allocate(size).map_or(null_mut(), Handle::as_ptr)
  }
}

impl Default for RcAllocator<SystemHeap> {
  fn default() -> Self {
    RcAllocator::new(SystemHeap)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::Ordering::SeqCst,
    Barrier
  };

  use rand::Rng;

  use super::*;
  use crate::{
    config::RuntimeFlag,
    rc_block::heap::testing::{CountingHeap, ExhaustedHeap}
  };

  fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
  }

  #[test]
  fn fresh_block_has_one_owner() {
    init();
    let allocator = RcAllocator::new(CountingHeap::default());

    for size in [REF_COUNT_SIZE, 16, 17, 4096] {
      let handle = allocator.allocate(size).expect("allocation failed");
      assert_eq!(unsafe { handle.ref_count() }, 1);
      assert!(unsafe { allocator.release(Some(handle)) });
    }

    assert_eq!(allocator.heap().reserved(), 4);
    assert_eq!(allocator.heap().freed(), 4);
  }

  #[test]
  fn payload_is_usable() {
    init();
    let allocator = RcAllocator::new(CountingHeap::default());
    let handle    = allocator.allocate(REF_COUNT_SIZE + 2 * size_of::<u64>()).unwrap();

    unsafe {
      let payload = handle.payload_ptr() as *mut u64;
      payload.write(0xDEAD_BEEF);
      payload.add(1).write(42);

      assert_eq!(handle.ref_count(), 1);
      assert_eq!(payload.read(), 0xDEAD_BEEF);
      assert_eq!(payload.add(1).read(), 42);

      allocator.release(Some(handle));
    }
  }

  #[test]
  fn undersized_blocks_are_rejected() {
    init();
    let allocator = RcAllocator::new(CountingHeap::default());

    for size in 0..REF_COUNT_SIZE {
      assert_eq!(
        allocator.try_allocate(size),
        Err(AllocError::TooSmall { size, minimum: REF_COUNT_SIZE })
      );
      assert_eq!(allocator.allocate(size), None);
    }
    assert_eq!(allocator.heap().reserved(), 0);
  }

  #[test]
  fn oversized_blocks_are_rejected() {
    init();
    let config    = RuntimeConfig::default().with_max_block_size(64);
    let allocator = RcAllocator::with_config(CountingHeap::default(), config);

    assert_eq!(allocator.try_allocate(65), Err(AllocError::TooLarge { size: 65, maximum: 64 }));
    let handle = allocator.allocate(64).unwrap();
    unsafe { allocator.release(Some(handle)); }
  }

  #[test]
  fn heap_exhaustion_gives_null() {
    init();
    let allocator = RcAllocator::new(ExhaustedHeap::default());

    assert_eq!(allocator.try_allocate(16), Err(AllocError::OutOfMemory { size: 16 }));
    assert_eq!(allocator.allocate(16), None);
    assert!(allocator.allocate_raw(16).is_null());
    assert_eq!(allocator.heap().attempts.load(SeqCst), 3);
    #[cfg(feature = "arc_stats")]
    assert_eq!(allocator.stats().failed_allocations, 3);
  }

  #[test]
  fn absent_handles_are_ignored() {
    init();
    let allocator = RcAllocator::new(ExhaustedHeap::default());
    unsafe {
      allocator.retain(None);
      assert!(!allocator.release(None));
    }
    assert_eq!(allocator.stats().retains, 0);
    assert_eq!(allocator.stats().releases, 0);
  }

  #[test]
  fn freed_on_last_release_only() {
    init();
    let allocator = RcAllocator::new(CountingHeap::default());
    let mut rng   = rand::thread_rng();

    let counts = (0..8).chain((0..8).map(|_| rng.gen_range(8..256)));
    for n in counts {
      let handle = allocator.allocate(32).unwrap();
      let freed  = allocator.heap().freed();

      unsafe {
        for _ in 0..n {
          allocator.retain(Some(handle));
        }
        assert_eq!(handle.ref_count(), n + 1);

        for remaining in (1..=n).rev() {
          assert!(!allocator.release(Some(handle)));
          assert_eq!(handle.ref_count(), remaining);
          assert_eq!(allocator.heap().freed(), freed);
        }
        assert!(allocator.release(Some(handle)));
      }

      assert_eq!(allocator.heap().freed(), freed + 1);
    }
  }

  #[test]
  fn allocate_retain_release_release() {
    init();
    let allocator = RcAllocator::new(CountingHeap::default());
    let handle    = allocator.allocate(16).unwrap();

    unsafe {
      assert_eq!(handle.ref_count(), 1);
      allocator.retain(Some(handle));
      assert_eq!(handle.ref_count(), 2);
      assert!(!allocator.release(Some(handle)));
      assert_eq!(handle.ref_count(), 1);
      assert_eq!(allocator.heap().freed(), 0);
      assert!(allocator.release(Some(handle)));
    }
    assert_eq!(allocator.heap().freed(), 1);

    #[cfg(feature = "arc_stats")]
    assert_eq!(
      allocator.stats(),
      StatsSnapshot {
        allocations       : 1,
        failed_allocations: 0,
        retains           : 1,
        releases          : 2,
        frees             : 1,
      }
    );
  }

  #[test]
  fn assign_moves_ownership() {
    init();
    let allocator = RcAllocator::new(CountingHeap::default());
    let first     = allocator.allocate(16).unwrap();
    let second    = allocator.allocate(16).unwrap();

    // The slot takes over the reference `allocate` gave us for `first`.
    let mut slot = Some(first);

    unsafe {
      // Self assignment keeps the block alive.
      allocator.assign(&mut slot, Some(first));
      assert_eq!(first.ref_count(), 1);
      assert_eq!(allocator.heap().freed(), 0);

      // The slot lets go of `first`, which has no other owner.
      allocator.assign(&mut slot, Some(second));
      assert_eq!(slot, Some(second));
      assert_eq!(second.ref_count(), 2);
      assert_eq!(allocator.heap().freed(), 1);

      allocator.assign(&mut slot, None);
      assert_eq!(slot, None);
      assert_eq!(second.ref_count(), 1);

      assert!(allocator.release(Some(second)));
    }
    assert_eq!(allocator.heap().freed(), 2);
  }

  #[test]
  fn concurrent_owners_free_once() {
    init();
    const THREADS: usize = 8;
    let allocator = RcAllocator::new(CountingHeap::default());

    for _ in 0..64 {
      let handle   = allocator.allocate(64).unwrap();
      let retained = Barrier::new(THREADS + 1);
      let freed_by_threads: usize = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
              let allocator = &allocator;
              let retained  = &retained;
              scope.spawn(move || unsafe {
                allocator.retain(Some(handle));
                retained.wait();
                allocator.release(Some(handle)) as usize
              })
            })
            .collect();

        // Every worker owns a reference before the original owner lets go of its own.
        retained.wait();
        let mine = unsafe { allocator.release(Some(handle)) } as usize;
        mine + workers.into_iter().map(|w| w.join().unwrap()).sum::<usize>()
      });

      assert_eq!(freed_by_threads, 1);
    }

    assert_eq!(allocator.heap().freed(), 64);
  }

  #[test]
  fn racing_releases_free_once() {
    init();
    let allocator = RcAllocator::new(CountingHeap::default());

    for round in 1..=256 {
      let handle = allocator.allocate(16).unwrap();
      unsafe { allocator.retain(Some(handle)); }
      let start = Barrier::new(2);

      let frees: usize = std::thread::scope(|scope| {
        let racers: Vec<_> = (0..2)
            .map(|_| {
              let allocator = &allocator;
              let start     = &start;
              scope.spawn(move || {
                start.wait();
                unsafe { allocator.release(Some(handle)) as usize }
              })
            })
            .collect();
        racers.into_iter().map(|r| r.join().unwrap()).sum()
      });

      assert_eq!(frees, 1);
      assert_eq!(allocator.heap().freed(), round);
    }
  }

  #[test]
  fn report_respects_flag() {
    init();
    let config    = RuntimeConfig::default().with_flag(RuntimeFlag::ShowStats);
    let allocator = RcAllocator::with_config(CountingHeap::default(), config);
    assert!(allocator.config().show_stats());

    let handle = allocator.allocate(16).unwrap();
    allocator.report();
    unsafe { allocator.release(Some(handle)); }
    allocator.report();
  }

  #[test]
  fn global_allocator_uses_system_heap() {
    init();
    let handle = global_allocator().allocate(24).unwrap();
    unsafe {
      global_allocator().retain(Some(handle));
      assert!(!global_allocator().release(Some(handle)));
      assert!(global_allocator().release(Some(handle)));
    }
  }
}
