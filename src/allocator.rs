use std::{fmt, ptr, ptr::NonNull};

use crate::{
  align::{ALIGNMENT, align_up},
  block::{FreeBlock, HEADER_SIZE, UsedBlock},
  error::{AllocError, AllocResult},
  free_list::FreeList,
  region::RegionGrower,
};

/// Snapshot of the allocator's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
  /// Bytes obtained from the grower so far, headers included.
  pub region_bytes: usize,
  /// Entries on the free list.
  pub free_blocks: usize,
  /// Payload bytes held by free blocks.
  pub free_bytes: usize,
}

impl fmt::Display for HeapStats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "region = {} bytes, free = {} bytes in {} blocks",
      self.region_bytes, self.free_bytes, self.free_blocks
    )
  }
}

/// First-fit free-list allocator over a region that only ever grows.
///
/// Every block carries an embedded header; released blocks are pushed on a
/// single free list and merged with free address neighbours. The allocator is
/// a plain value: wrap it in [`LockedAllocator`](crate::LockedAllocator) to
/// share it.
pub struct FreeListAllocator<G> {
  grower: G,
  free_list: FreeList,
  region_bytes: usize,
  lowest: usize,
  highest: usize,
}

// The raw block pointers all point into memory the allocator owns exclusively.
unsafe impl<G: Send> Send for FreeListAllocator<G> {}

impl<G: RegionGrower> FreeListAllocator<G> {
  pub const fn new(grower: G) -> Self {
    Self {
      grower,
      free_list: FreeList::new(),
      region_bytes: 0,
      lowest: usize::MAX,
      highest: 0,
    }
  }

  /// Returns at least `size` bytes, rounded up to the alignment granularity.
  ///
  /// The free list is searched first; an oversized hit is split and its
  /// remainder stays listed. On a miss the region grows by exactly one block.
  ///
  /// # Safety
  ///
  /// The grower must uphold the [`RegionGrower`] contract.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    let size = align_up(size).ok_or(AllocError::InvalidSize)?;

    if let Some(block) = self.free_list.find_fit(size) {
      match block.split(size) {
        Some((fitted, remainder)) => self.free_list.replace(fitted, remainder),
        None => self.free_list.remove(block),
      }

      log::debug!(
        "reusing free block {:#x} ({} bytes) for {} bytes",
        block.address(),
        block.size(),
        size
      );

      return Ok(block.claim().payload());
    }

    let total = size.checked_add(HEADER_SIZE).ok_or(AllocError::InvalidSize)?;
    let address = unsafe { self.grower.grow(total)? };

    self.region_bytes += total;
    self.lowest = self.lowest.min(address.as_ptr() as usize);
    self.highest = self.highest.max(address.as_ptr() as usize + total);

    let block = unsafe { UsedBlock::init(address, size) };

    Ok(block.payload())
  }

  /// Like [`allocate`](Self::allocate), with the payload aligned to `align`.
  ///
  /// Alignments up to [`ALIGNMENT`] hold for every block already. Stricter
  /// ones over-allocate by `align + HEADER_SIZE`; the bytes in front of the
  /// aligned payload and any tail past `size` go back on the free list.
  ///
  /// # Safety
  ///
  /// Same as [`FreeListAllocator::allocate`].
  pub unsafe fn allocate_aligned(
    &mut self,
    size: usize,
    align: usize,
  ) -> AllocResult<NonNull<u8>> {
    if !align.is_power_of_two() {
      return Err(AllocError::UnsupportedAlignment { align });
    }
    if align <= ALIGNMENT {
      return unsafe { self.allocate(size) };
    }

    let size = align_up(size).ok_or(AllocError::InvalidSize)?;
    let padded = size
      .checked_add(align)
      .and_then(|bytes| bytes.checked_add(HEADER_SIZE))
      .ok_or(AllocError::InvalidSize)?;

    let payload = unsafe { self.allocate(padded)? };
    let block = unsafe { UsedBlock::from_payload(payload) }.release();

    // The skipped span needs room for its own header, so the aligned payload
    // sits at least one header past the original one. `lead <= align`.
    let start = payload.as_ptr() as usize;
    let lead = HEADER_SIZE + ((start + HEADER_SIZE).wrapping_neg() & (align - 1));

    let Some((front, aligned)) = block.split_front(lead) else {
      self.recycle(block);
      return Err(AllocError::InvalidSize);
    };

    if let Some((_, tail)) = aligned.split(size) {
      self.recycle(tail);
    }
    self.recycle(front);

    log::trace!(
      "aligned {} bytes to {} at {:#x}",
      size,
      align,
      aligned.address() + HEADER_SIZE
    );

    Ok(aligned.claim().payload())
  }

  /// Allocates `count * size` bytes and zeroes the whole payload.
  ///
  /// # Safety
  ///
  /// Same as [`FreeListAllocator::allocate`].
  pub unsafe fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    unsafe { self.zero_allocate_aligned(count, size, ALIGNMENT) }
  }

  /// [`zero_allocate`](Self::zero_allocate) with the payload aligned to `align`.
  ///
  /// # Safety
  ///
  /// Same as [`FreeListAllocator::allocate`].
  pub unsafe fn zero_allocate_aligned(
    &mut self,
    count: usize,
    size: usize,
    align: usize,
  ) -> AllocResult<NonNull<u8>> {
    let total = count.checked_mul(size).ok_or(AllocError::InvalidSize)?;

    unsafe {
      let payload = self.allocate_aligned(total, align)?;
      let block_size = UsedBlock::from_payload(payload).size();
      payload.as_ptr().write_bytes(0, block_size);

      Ok(payload)
    }
  }

  /// Grows an allocation, keeping its contents.
  ///
  /// `None` behaves like [`allocate`](Self::allocate); a `new_size` of zero
  /// releases `ptr` and returns `None`. Blocks are never shrunk: if the block
  /// already holds `new_size` bytes, `ptr` comes back unchanged. When a fresh
  /// block cannot be obtained the old one is left untouched.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this allocator and not released since.
  pub unsafe fn resize(
    &mut self,
    ptr: Option<NonNull<u8>>,
    new_size: usize,
  ) -> AllocResult<Option<NonNull<u8>>> {
    unsafe { self.resize_aligned(ptr, new_size, ALIGNMENT) }
  }

  /// [`resize`](Self::resize) for a block that was allocated with `align`.
  /// A moved block keeps that alignment.
  ///
  /// # Safety
  ///
  /// Same as [`FreeListAllocator::resize`].
  pub unsafe fn resize_aligned(
    &mut self,
    ptr: Option<NonNull<u8>>,
    new_size: usize,
    align: usize,
  ) -> AllocResult<Option<NonNull<u8>>> {
    let Some(ptr) = ptr else {
      return unsafe { self.allocate_aligned(new_size, align) }.map(Some);
    };

    if new_size == 0 {
      unsafe { self.release(Some(ptr)) };
      return Ok(None);
    }

    debug_assert!(self.owns(ptr), "resize of foreign pointer {:?}", ptr);

    unsafe {
      let old_size = UsedBlock::from_payload(ptr).size();
      if old_size >= new_size {
        return Ok(Some(ptr));
      }

      let new_ptr = self.allocate_aligned(new_size, align)?;
      ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size);
      self.release(Some(ptr));

      Ok(Some(new_ptr))
    }
  }

  /// Returns a block to the free list and merges it with free neighbours.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this allocator and not released since.
  /// Neither is checked.
  pub unsafe fn release(
    &mut self,
    ptr: Option<NonNull<u8>>,
  ) {
    let Some(ptr) = ptr else {
      return;
    };

    debug_assert!(self.owns(ptr), "release of foreign pointer {:?}", ptr);

    self.recycle(unsafe { UsedBlock::from_payload(ptr) }.release());
  }

  /// Payload bytes recorded for a live allocation.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this allocator and not released since.
  pub unsafe fn block_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    unsafe { UsedBlock::from_payload(ptr) }.size()
  }

  pub fn stats(&self) -> HeapStats {
    let (free_blocks, free_bytes) = self
      .free_list
      .iter()
      .fold((0, 0), |(count, bytes), block| (count + 1, bytes + block.size()));

    HeapStats {
      region_bytes: self.region_bytes,
      free_blocks,
      free_bytes,
    }
  }

  /// `(header address, payload size)` of every free block, in list order.
  pub fn free_blocks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
    self.free_list.iter().map(|block: FreeBlock| (block.address(), block.size()))
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  fn owns(
    &self,
    ptr: NonNull<u8>,
  ) -> bool {
    let address = ptr.as_ptr() as usize;
    address >= self.lowest.saturating_add(HEADER_SIZE) && address <= self.highest
  }

  fn recycle(
    &mut self,
    block: FreeBlock,
  ) {
    self.free_list.push_front(block);
    self.free_list.coalesce(block);
  }
}
