/*!

Reference counted heap blocks. A block is a single heap allocation whose first machine word is an atomic reference
count. Everything after the counter is payload owned by the caller.

|  offset              | contents                             |
|:---------------------|:-------------------------------------|
| 0                    | `RefCount` (one `usize`)             |
| `REF_COUNT_SIZE`     | payload, `size - REF_COUNT_SIZE` bytes |

A block is created with a count of one, which belongs to the caller of `allocate`. `retain` adds an owner and
`release` removes one. The `release` whose decrement takes the count from one to zero frees the block on the calling
thread. Exactly one `release` can observe that transition because the decrement and the read of the old value are
the same atomic instruction.

Only the counter is synchronized. All counter operations use relaxed ordering, so publishing the payload to another
thread is up to whatever channel carries the handle there.

*/

mod allocator;
mod handle;
mod heap;
mod ref_count;
mod stats;

pub use allocator::{global_allocator, RcAllocator};
pub use handle::Handle;
pub use heap::{Heap, SystemHeap};
pub use ref_count::RefCount;
pub use stats::{AllocStats, StatsSnapshot};

/// A `*mut Void` is a pointer to a `u8`
pub type Void = u8;

/// The raw form of a handle as it crosses the C boundary. Null means "no block".
pub type BlockPtr = *mut Void;

/// Size of the counter word at the start of every block. Also the smallest block `allocate` accepts.
pub const REF_COUNT_SIZE: usize = size_of::<RefCount>();

/// Offset of the counter from the start of the block.
pub const REF_COUNT_OFFSET: usize = 0;

/// Offset of the first payload byte from the start of the block.
pub const PAYLOAD_OFFSET: usize = REF_COUNT_OFFSET + REF_COUNT_SIZE;
