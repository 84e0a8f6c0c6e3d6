/*!

Where blocks come from. The allocator only needs two things from a heap: a pointer to `size` bytes aligned for a
`usize`, or null when none are available, and a way to give that pointer back without being told its size. The
second requirement is why the system heap is `malloc`/`free` rather than `std::alloc`, which needs the layout again
on deallocation and would force a second header word.

*/

use crate::rc_block::Void;

pub trait Heap {
  /// Reserves `size` bytes aligned at least to `align_of::<usize>()`. Returns null on exhaustion. Must not abort.
  fn reserve(&self, size: usize) -> *mut Void;

  /// Returns a block to the heap.
  ///
  /// # Safety
  /// `ptr` must have come from `reserve` on this heap and must not have been freed already.
  unsafe fn free(&self, ptr: *mut Void);
}

/// The host's general purpose heap.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemHeap;

impl Heap for SystemHeap {
  #[inline(always)]
  fn reserve(&self, size: usize) -> *mut Void {
    unsafe { libc::malloc(size) as *mut Void }
  }

  #[inline(always)]
  unsafe fn free(&self, ptr: *mut Void) {
    libc::free(ptr as *mut libc::c_void);
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn system_heap_round_trip() {
    let ptr = SystemHeap.reserve(64);
    assert!(!ptr.is_null());
    assert_eq!(ptr.align_offset(align_of::<usize>()), 0);
    unsafe {
      ptr.write_bytes(0xAB, 64);
      SystemHeap.free(ptr);
    }
  }
}
