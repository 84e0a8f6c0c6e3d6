/*!

An atomic reference counting runtime. Heap blocks carry their owner count in their first machine word; `allocate`
creates a block owned once, `retain` adds an owner, and `release` removes one and frees the block when none are left.

 - `RcAllocator` exposes the three operations over a pluggable `Heap`. `global_allocator()` is the process-wide
   instance over the system heap.
 - `ffi` exports the same operations under the C names compiled programs link against.
 - `ArcBox<T>` is the same single-allocation layout wrapped as an owning Rust value.

*/

mod arc_box;
mod config;
mod error;
pub mod ffi;
mod rc_block;

pub use arc_box::ArcBox;
pub use config::{RuntimeConfig, RuntimeFlag, RuntimeFlags};
pub use error::{AllocError, ConfigError};
pub use rc_block::{
  global_allocator,
  AllocStats,
  BlockPtr,
  Handle,
  Heap,
  RcAllocator,
  RefCount,
  StatsSnapshot,
  SystemHeap,
  Void,
  PAYLOAD_OFFSET,
  REF_COUNT_OFFSET,
  REF_COUNT_SIZE
};
