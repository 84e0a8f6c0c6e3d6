use std::{
  fmt::{Display, Formatter},
  ptr::NonNull
};

use crate::rc_block::{BlockPtr, RefCount, Void, PAYLOAD_OFFSET};

/// An opaque reference to the start of a live block. The absent handle is `Option::<Handle>::None`, which has the
/// same representation as a null `BlockPtr`.
///
/// A `Handle` is a plain address. Copying one does not add an owner; only `RcAllocator::retain` does.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(NonNull<RefCount>);

// A handle is an address. Every dereference goes through an `unsafe` operation whose caller vouches for liveness.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
  /// Wraps a raw block pointer. Null gives `None`.
  #[inline(always)]
  pub fn from_ptr(ptr: BlockPtr) -> Option<Handle> {
    NonNull::new(ptr as *mut RefCount).map(Handle)
  }

  #[inline(always)]
  pub fn as_ptr(self) -> BlockPtr {
    self.0.as_ptr() as BlockPtr
  }

  /// Address of the first payload byte, just past the counter word.
  #[inline(always)]
  pub fn payload_ptr(self) -> *mut Void {
    self.as_ptr().wrapping_add(PAYLOAD_OFFSET)
  }

  /// The counter of the block.
  ///
  /// # Safety
  /// The block must be live for all of `'a`.
  #[inline(always)]
  pub unsafe fn ref_count_word<'a>(self) -> &'a RefCount {
    self.0.as_ref()
  }

  /// Current owner count of the block.
  ///
  /// # Safety
  /// The block must be live, which the caller normally guarantees by owning one of the counted references.
  #[inline(always)]
  pub unsafe fn ref_count(self) -> usize {
    self.ref_count_word().get()
  }
}

impl Display for Handle {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "block<{:p}>", self.0)
  }
}
