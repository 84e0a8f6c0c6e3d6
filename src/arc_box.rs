/*!

`ArcBox<T>` is a reference counted block with a typed payload. It keeps the block layout of the raw allocator, a
`RefCount` followed by the value in one allocation, but makes ownership a Rust value: cloning is `retain`, dropping
is `release`, and the last drop runs `T`'s destructor and frees the block.

Unlike the raw operations, a safe wrapper runs arbitrary destructors on whatever thread drops last, so the final
decrement must see every other owner's writes. Drop therefore decrements with release ordering and issues an acquire
fence before destroying the value. Clone stays relaxed.

*/

use std::{
  fmt::{Debug, Display, Formatter},
  marker::PhantomData,
  ops::Deref,
  ptr::NonNull,
  sync::atomic::{
    fence,
    Ordering::{Acquire, Relaxed}
  }
};

use crate::rc_block::RefCount;

/// A soft limit on the owner count. Crossing it means references are being leaked in a loop, and continuing would
/// risk wrapping the counter to zero while owners remain.
const MAX_REF_COUNT: usize = isize::MAX as usize;

#[repr(C)]
struct ArcBlock<T> {
  ref_count: RefCount,
  value    : T,
}

pub struct ArcBox<T> {
  ptr    : NonNull<ArcBlock<T>>,
  _marker: PhantomData<ArcBlock<T>>,
}

unsafe impl<T: Send + Sync> Send for ArcBox<T> {}
unsafe impl<T: Send + Sync> Sync for ArcBox<T> {}

impl<T> ArcBox<T> {
  pub fn new(value: T) -> ArcBox<T> {
    let block = Box::new(ArcBlock {
      ref_count: RefCount::new(),
      value,
    });
    ArcBox {
      // `Box::into_raw` never returns null.
      ptr    : unsafe { NonNull::new_unchecked(Box::into_raw(block)) },
      _marker: PhantomData,
    }
  }

  #[inline(always)]
  fn block(&self) -> &ArcBlock<T> {
    // While `self` exists it owns a reference, so the block is live.
    unsafe { self.ptr.as_ref() }
  }

  /// Current number of owners.
  #[inline(always)]
  pub fn ref_count(this: &Self) -> usize {
    this.block().ref_count.get()
  }

  /// Whether both point to the same block.
  #[inline(always)]
  pub fn ptr_eq(this: &Self, other: &Self) -> bool {
    this.ptr == other.ptr
  }

  /// Mutable access to the value if `this` is its only owner.
  pub fn get_mut(this: &mut Self) -> Option<&mut T> {
    if this.block().ref_count.as_atomic().load(Acquire) != 1 {
      return None;
    }
    // Sole owner, and `&mut this` keeps anyone from cloning it meanwhile.
    Some(unsafe { &mut this.ptr.as_mut().value })
  }

  /// Takes the value out if `this` is its only owner, freeing the block. Otherwise gives `this` back.
  pub fn try_unwrap(this: Self) -> Result<T, Self> {
    if this.block().ref_count.as_atomic().compare_exchange(1, 0, Acquire, Relaxed).is_err() {
      return Err(this);
    }

    let ptr = this.ptr;
    std::mem::forget(this);
    let ArcBlock { value, .. } = *unsafe { Box::from_raw(ptr.as_ptr()) };
    Ok(value)
  }
}

impl<T> Clone for ArcBox<T> {
  #[inline]
  fn clone(&self) -> Self {
    if self.block().ref_count.increment() > MAX_REF_COUNT {
      std::process::abort();
    }
    ArcBox {
      ptr    : self.ptr,
      _marker: PhantomData,
    }
  }
}

impl<T> Drop for ArcBox<T> {
  #[inline]
  fn drop(&mut self) {
    if !self.block().ref_count.decrement_release() {
      return;
    }
    fence(Acquire);
    drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
  }
}

impl<T> Deref for ArcBox<T> {
  type Target = T;

  #[inline(always)]
  fn deref(&self) -> &T {
    &self.block().value
  }
}

impl<T> AsRef<T> for ArcBox<T> {
  fn as_ref(&self) -> &T {
    self
  }
}

impl<T: Default> Default for ArcBox<T> {
  fn default() -> Self {
    ArcBox::new(T::default())
  }
}

impl<T> From<T> for ArcBox<T> {
  fn from(value: T) -> Self {
    ArcBox::new(value)
  }
}

impl<T: Display> Display for ArcBox<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    Display::fmt(&**self, f)
  }
}

impl<T: Debug> Debug for ArcBox<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    Debug::fmt(&**self, f)
  }
}

impl<T: PartialEq> PartialEq for ArcBox<T> {
  fn eq(&self, other: &Self) -> bool {
    **self == **other
  }
}

impl<T: Eq> Eq for ArcBox<T> {}
