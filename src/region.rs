use std::ptr::NonNull;

use libc::{c_void, intptr_t, sbrk};

use crate::{
  align::ALIGNMENT,
  error::{AllocError, AllocResult},
};

/// Source of fresh memory appended to the managed region.
pub trait RegionGrower {
  /// Extends the region by exactly `bytes` bytes and returns where the new
  /// span starts. The span must be aligned to [`ALIGNMENT`] and stay valid
  /// for as long as the grower is alive.
  ///
  /// # Safety
  ///
  /// Implementations hand out raw memory; the caller becomes its sole owner.
  unsafe fn grow(
    &mut self,
    bytes: usize,
  ) -> AllocResult<NonNull<u8>>;
}

/// Grows the program break with `sbrk(2)`.
#[derive(Debug, Default)]
pub struct Sbrk;

impl Sbrk {
  pub const fn new() -> Self {
    Self
  }

  unsafe fn extend(increment: intptr_t) -> Option<*mut u8> {
    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return None;
    }

    Some(address.cast())
  }
}

impl RegionGrower for Sbrk {
  unsafe fn grow(
    &mut self,
    bytes: usize,
  ) -> AllocResult<NonNull<u8>> {
    let increment = intptr_t::try_from(bytes).map_err(|_| AllocError::InvalidSize)?;

    unsafe {
      // Anyone else moving the break may leave it misaligned.
      let current = sbrk(0) as usize;
      let padding = current.wrapping_neg() & (ALIGNMENT - 1);
      if padding != 0 && Self::extend(padding as intptr_t).is_none() {
        log::warn!("sbrk could not pad the program break by {} bytes", padding);
        return Err(AllocError::ResourceExhausted { requested: bytes });
      }

      let address = Self::extend(increment).and_then(NonNull::new).ok_or_else(|| {
        log::warn!("sbrk refused to grow the program break by {} bytes", bytes);
        AllocError::ResourceExhausted { requested: bytes }
      })?;

      log::trace!("sbrk grew the program break by {} bytes at {:?}", bytes, address);

      Ok(address)
    }
  }
}

/// Hands out a fixed span of memory front to back, failing once it runs dry.
///
/// Useful where there is no program break to move, and for simulating
/// exhaustion.
#[derive(Debug)]
pub struct FixedRegion {
  base: NonNull<u8>,
  capacity: usize,
  used: usize,
}

// The region is the only user of its span.
unsafe impl Send for FixedRegion {}

impl FixedRegion {
  /// Wraps `len` bytes starting at `base`. The start is rounded up to
  /// [`ALIGNMENT`], which may cost a few bytes of capacity.
  ///
  /// # Safety
  ///
  /// The span must be valid for reads and writes, outlive the region, and
  /// not be used by anything else while the region is alive.
  pub unsafe fn new(
    base: NonNull<u8>,
    len: usize,
  ) -> Self {
    let padding = base.align_offset(ALIGNMENT).min(len);

    Self {
      base: unsafe { base.add(padding) },
      capacity: len - padding,
      used: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn remaining(&self) -> usize {
    self.capacity - self.used
  }
}

impl RegionGrower for FixedRegion {
  unsafe fn grow(
    &mut self,
    bytes: usize,
  ) -> AllocResult<NonNull<u8>> {
    if bytes > self.remaining() {
      log::warn!(
        "fixed region exhausted: {} bytes requested, {} left",
        bytes,
        self.remaining()
      );
      return Err(AllocError::ResourceExhausted { requested: bytes });
    }

    let address = unsafe { self.base.add(self.used) };
    self.used += bytes;

    Ok(address)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fixed_region_hands_out_in_order() {
    let mut words = vec![0u128; 8];
    let base = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
    let mut region = unsafe { FixedRegion::new(base, 128) };

    unsafe {
      let first = region.grow(48).unwrap();
      let second = region.grow(64).unwrap();

      assert_eq!(first, base);
      assert_eq!(second.as_ptr() as usize, base.as_ptr() as usize + 48);
      assert_eq!(region.remaining(), 16);

      assert_eq!(region.grow(32), Err(AllocError::ResourceExhausted { requested: 32 }));
      assert_eq!(region.remaining(), 16);
      assert!(region.grow(16).is_ok());
    }
  }

  #[test]
  fn test_fixed_region_aligns_base() {
    let mut words = vec![0u128; 8];
    let base = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
    let region = unsafe { FixedRegion::new(base.add(3), 125) };

    assert_eq!(region.base.as_ptr() as usize % ALIGNMENT, 0);
    assert_eq!(region.capacity(), 112);
  }

  #[test]
  fn test_sbrk_rejects_oversized_increment() {
    let mut grower = Sbrk::new();

    assert_eq!(unsafe { grower.grow(usize::MAX) }, Err(AllocError::InvalidSize));
  }
}
