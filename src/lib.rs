//! # rfreelist - A First-Fit Free-List Memory Allocator
//!
//! This crate provides a general purpose allocator that manages one
//! contiguous region grown incrementally with the `sbrk` system call (or any
//! other [`RegionGrower`]), and recycles released blocks through a free list.
//!
//! ## Overview
//!
//! ```text
//!   Managed region (only ever grows):
//!
//!   ┌────┬────────┬────┬──────────────┬────┬──────┬────┬────────────┐
//!   │ H  │ used   │ H  │ free         │ H  │ used │ H  │ free       │
//!   └────┴────────┴────┴──────────────┴────┴──────┴────┴────────────┘
//!                  ▲                              ▲
//!                  │           ┌──────────────────┘
//!   head ──────────┼───────────┘   (most recently released first)
//!                  └── next ◄──────────────────────────────────────
//!
//!   H = header { size, next }. `next` only means something while free.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rfreelist
//!   ├── align      - Alignment granularity and checked rounding
//!   ├── block      - Embedded headers, free/used block handles, splitting (internal)
//!   ├── free_list  - First-fit lookup, neighbour scans, coalescing (internal)
//!   ├── region     - RegionGrower trait, Sbrk and FixedRegion
//!   ├── allocator  - FreeListAllocator: allocate, zero_allocate, resize, release
//!   ├── global     - LockedAllocator, the GlobalAlloc front end
//!   └── ffi        - malloc, free, memalign and the rest of the C allocator (feature `c-abi`)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rfreelist::{FreeListAllocator, Sbrk};
//!
//! fn main() {
//!     let mut heap = FreeListAllocator::new(Sbrk::new());
//!
//!     unsafe {
//!         let ptr = heap.allocate(24).unwrap();
//!         ptr.as_ptr().write_bytes(0xAB, 24);
//!
//!         let ptr = heap.resize(Some(ptr), 200).unwrap();
//!         heap.release(ptr);
//!     }
//! }
//! ```
//!
//! ## How It Works
//!
//! Allocation rounds the request up to 16 bytes and walks the free list for
//! the first block that either fits exactly or has room to spare for another
//! header:
//!
//! ```text
//!   Split on a free-list hit (request = 32):
//!
//!   before: ┌────┬──────────────────────────────┐
//!           │ H  │ 160                          │   on the free list
//!           └────┴──────────────────────────────┘
//!   after:  ┌────┬──────┬────┬──────────────────┐
//!           │ H  │ 32   │ H  │ 112              │
//!           └────┴──────┴────┴──────────────────┘
//!             handed out    takes the old list slot
//! ```
//!
//! Alignments above 16 bytes over-allocate by `align + header`, place the
//! payload on the first aligned address that leaves room for a header in
//! front, and give the skipped front and the unused tail back as free blocks.
//!
//! A miss grows the region by exactly one header plus the payload. Releasing
//! pushes the block on the list and merges it with free blocks that touch it
//! on either side:
//!
//! ```text
//!   ┌────┬──────┬────┬──────┬────┬──────┐        ┌────┬────────────────────┐
//!   │ H  │ free │ H  │ rel. │ H  │ free │   ──►  │ H  │ free               │
//!   └────┴──────┴────┴──────┴────┴──────┘        └────┴────────────────────┘
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded core**: [`FreeListAllocator`] has no locking; share it
//!   through [`LockedAllocator`]
//! - **No give-back**: the region never shrinks and resizing never shrinks a block
//! - **Over-alignment costs padding**: blocks are 16-byte aligned; stricter
//!   requests over-allocate and hand the unused front and tail back
//! - **No misuse detection**: double release or foreign pointers are undefined
//!   behaviour
//!
//! ## Safety
//!
//! Every operation that hands out or takes back raw memory is `unsafe`.

pub mod align;
mod allocator;
mod block;
mod error;
#[cfg(feature = "c-abi")]
pub mod ffi;
mod free_list;
mod global;
mod region;

pub use allocator::{FreeListAllocator, HeapStats};
pub use block::HEADER_SIZE;
pub use error::{AllocError, AllocResult};
pub use global::LockedAllocator;
pub use region::{FixedRegion, RegionGrower, Sbrk};
