use std::{mem, ptr::NonNull};

/// Metadata embedded in front of every block of the managed region.
///
/// `next` is only meaningful while the block is free. The typed handles below
/// make sure it is never read through an allocated block.
#[repr(C, align(16))]
pub struct Header {
  size: usize,
  next: Option<NonNull<Header>>,
}

/// Bytes occupied by a block header; the user pointer sits this far past it.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

/// A block handed out to a caller. Only its payload size is visible.
#[derive(Debug)]
pub struct UsedBlock(NonNull<Header>);

/// A block owned by the free list, header doubling as the list node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock(NonNull<Header>);

impl UsedBlock {
  /// Writes a fresh header at `address` recording a payload of `size` bytes.
  ///
  /// # Safety
  ///
  /// `address` must be aligned for [`Header`] and valid for writes of
  /// `HEADER_SIZE + size` bytes that no other block covers.
  pub unsafe fn init(
    address: NonNull<u8>,
    size: usize,
  ) -> Self {
    let header = address.cast::<Header>();
    unsafe {
      header.as_ptr().write(Header { size, next: None });
    }
    Self(header)
  }

  /// Recovers the block behind a user pointer.
  ///
  /// # Safety
  ///
  /// `payload` must come from [`UsedBlock::payload`] of a block that has not
  /// been released since.
  pub unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    Self(unsafe { payload.sub(HEADER_SIZE) }.cast())
  }

  pub fn size(&self) -> usize {
    unsafe { (*self.0.as_ptr()).size }
  }

  pub fn payload(&self) -> NonNull<u8> {
    unsafe { self.0.cast::<u8>().add(HEADER_SIZE) }
  }

  /// Returns the block to the free state with an empty link.
  pub fn release(self) -> FreeBlock {
    unsafe {
      (*self.0.as_ptr()).next = None;
    }
    FreeBlock(self.0)
  }
}

impl FreeBlock {
  pub fn address(self) -> usize {
    self.0.as_ptr() as usize
  }

  /// First address past this block's payload.
  pub fn end(self) -> usize {
    self.address() + HEADER_SIZE + self.size()
  }

  pub fn size(self) -> usize {
    unsafe { (*self.0.as_ptr()).size }
  }

  pub fn next(self) -> Option<FreeBlock> {
    unsafe { (*self.0.as_ptr()).next.map(FreeBlock) }
  }

  pub fn set_next(
    self,
    next: Option<FreeBlock>,
  ) {
    unsafe {
      (*self.0.as_ptr()).next = next.map(|block| block.0);
    }
  }

  /// Takes over `other`'s bytes, header included. `other` must start at
  /// [`FreeBlock::end`] and must already be gone from the free list.
  pub fn absorb(
    self,
    other: FreeBlock,
  ) {
    debug_assert_eq!(self.end(), other.address());
    unsafe {
      (*self.0.as_ptr()).size += other.size() + HEADER_SIZE;
    }
  }

  /// Carves `self` into an exact `size`-byte block and a free remainder
  /// starting right after it.
  ///
  /// The remainder inherits `self`'s link but is not put on the list here.
  /// Returns `None` when there is no room for the remainder's header, in which
  /// case the block has to be handed out whole.
  pub fn split(
    self,
    size: usize,
  ) -> Option<(FreeBlock, FreeBlock)> {
    let remainder_size = self.size().checked_sub(size)?.checked_sub(HEADER_SIZE)?;

    let remainder = unsafe {
      let header = self.0.cast::<u8>().add(HEADER_SIZE + size).cast::<Header>();
      header.as_ptr().write(Header {
        size: remainder_size,
        next: (*self.0.as_ptr()).next,
      });
      (*self.0.as_ptr()).size = size;
      FreeBlock(header)
    };

    log::trace!(
      "split block {:#x} into {} + {} bytes",
      self.address(),
      size,
      remainder_size
    );

    Some((self, remainder))
  }

  /// Moves the block's start `lead` bytes forward. The skipped bytes become
  /// a free block of their own, returned first; `lead` covers its header.
  pub fn split_front(
    self,
    lead: usize,
  ) -> Option<(FreeBlock, FreeBlock)> {
    self.split(lead.checked_sub(HEADER_SIZE)?)
  }

  /// Hands the block out. The caller must have unlinked it from the list.
  pub fn claim(self) -> UsedBlock {
    UsedBlock(self.0)
  }
}
