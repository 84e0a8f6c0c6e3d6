//! C entry points for compiled code. Generated programs lay their objects out as a reference count word followed by
//! their fields, call `__obj_alloc` with the total size, and pair every copy of an object pointer with
//! `__obj_retain`/`__obj_release`. All three go through the process-wide allocator.

use crate::rc_block::{global_allocator, BlockPtr, Handle};

/// Allocates `size` bytes with the leading count word set to one. Returns null if the heap is exhausted or `size`
/// cannot hold the count.
#[no_mangle]
pub extern "C" fn __obj_alloc(size: usize) -> BlockPtr {
  global_allocator().allocate_raw(size)
}

/// Adds an owner. Null is ignored.
///
/// # Safety
/// `ptr` must be null or a live block from `__obj_alloc` that the caller holds a reference to.
#[no_mangle]
pub unsafe extern "C" fn __obj_retain(ptr: BlockPtr) {
  global_allocator().retain(Handle::from_ptr(ptr));
}

/// Drops an owner, freeing the block when it was the last. Null is ignored.
///
/// # Safety
/// `ptr` must be null or a live block from `__obj_alloc`, and the caller must give up the reference it held.
#[no_mangle]
pub unsafe extern "C" fn __obj_release(ptr: BlockPtr) {
  global_allocator().release(Handle::from_ptr(ptr));
}
