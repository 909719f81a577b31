use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
  sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
  allocator::{FreeListAllocator, HeapStats},
  error::AllocResult,
  region::RegionGrower,
};

/// A [`FreeListAllocator`] behind a single lock, held for the whole of every
/// call.
///
/// This is what gets installed with `#[global_allocator]`:
///
/// ```rust,ignore
/// use rfreelist::{LockedAllocator, Sbrk};
///
/// #[global_allocator]
/// static HEAP: LockedAllocator<Sbrk> = LockedAllocator::new(Sbrk::new());
/// ```
///
/// When installed globally, a `log` backend that allocates while formatting
/// would re-enter the lock; leave logging disabled or use a non-allocating
/// logger.
pub struct LockedAllocator<G> {
  inner: Mutex<FreeListAllocator<G>>,
}

impl<G: RegionGrower> LockedAllocator<G> {
  pub const fn new(grower: G) -> Self {
    Self {
      inner: Mutex::new(FreeListAllocator::new(grower)),
    }
  }

  /// Runs `f` with exclusive access to the allocator.
  pub fn with<R>(
    &self,
    f: impl FnOnce(&mut FreeListAllocator<G>) -> R,
  ) -> R {
    f(&mut self.lock())
  }

  pub fn stats(&self) -> HeapStats {
    self.lock().stats()
  }

  // Nothing panics between free-list updates, so a poisoned list is intact.
  fn lock(&self) -> MutexGuard<'_, FreeListAllocator<G>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

fn or_null(result: AllocResult<NonNull<u8>>) -> *mut u8 {
  match result {
    Ok(ptr) => ptr.as_ptr(),
    Err(error) => {
      log::debug!("allocation failed: {}", error);
      ptr::null_mut()
    }
  }
}

unsafe impl<G: RegionGrower + Send> GlobalAlloc for LockedAllocator<G> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    or_null(unsafe { self.lock().allocate_aligned(layout.size(), layout.align()) })
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    or_null(unsafe {
      self
        .lock()
        .zero_allocate_aligned(1, layout.size(), layout.align())
    })
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.lock().release(NonNull::new(ptr)) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    let result =
      unsafe { self.lock().resize_aligned(NonNull::new(ptr), new_size, layout.align()) };

    match result {
      Ok(Some(ptr)) => ptr.as_ptr(),
      Ok(None) => ptr::null_mut(),
      Err(error) => {
        log::debug!("reallocation failed: {}", error);
        ptr::null_mut()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::region::FixedRegion;

  fn locked(words: &mut [u128]) -> LockedAllocator<FixedRegion> {
    let base = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
    LockedAllocator::new(unsafe { FixedRegion::new(base, words.len() * 16) })
  }

  #[test]
  fn test_global_alloc_surface() {
    let mut words = vec![0u128; 256];
    let heap = locked(&mut words);

    unsafe {
      let layout = Layout::new::<[u64; 4]>();
      let ptr = heap.alloc(layout) as *mut u64;
      assert!(!ptr.is_null());

      for i in 0..4 {
        ptr.add(i).write(i as u64 * 3);
      }

      let grown = heap.realloc(ptr.cast(), layout, 128) as *mut u64;
      assert!(!grown.is_null());
      for i in 0..4 {
        assert_eq!(grown.add(i).read(), i as u64 * 3);
      }

      heap.dealloc(grown.cast(), Layout::from_size_align(128, 8).unwrap());
      assert_eq!(heap.stats().free_blocks, 1);
    }
  }

  #[test]
  fn test_alloc_zeroed_reuses_dirty_block() {
    let mut words = vec![0u128; 256];
    let heap = locked(&mut words);
    let layout = Layout::from_size_align(64, 16).unwrap();

    unsafe {
      let dirty = heap.alloc(layout);
      dirty.write_bytes(0xEE, 64);
      heap.dealloc(dirty, layout);

      let zeroed = heap.alloc_zeroed(layout);

      assert_eq!(zeroed, dirty);
      assert!(std::slice::from_raw_parts(zeroed, 64).iter().all(|&b| b == 0));
    }
  }

  #[test]
  fn test_failures_become_null() {
    let mut words = vec![0u128; 4];
    let heap = locked(&mut words);

    unsafe {
      assert!(heap.alloc(Layout::from_size_align(8, 4096).unwrap()).is_null());
      assert!(heap.alloc(Layout::from_size_align(1024, 8).unwrap()).is_null());
    }
    assert_eq!(heap.stats(), HeapStats::default());
  }

  #[test]
  fn test_over_aligned_layouts() {
    let mut words = vec![0u128; 256];
    let heap = locked(&mut words);
    let layout = Layout::from_size_align(64, 128).unwrap();

    unsafe {
      let ptr = heap.alloc(layout);
      assert!(!ptr.is_null());
      assert_eq!(ptr as usize % 128, 0);
      ptr.write_bytes(0x42, 64);

      let grown = heap.realloc(ptr, layout, 1024);
      assert!(!grown.is_null());
      assert_eq!(grown as usize % 128, 0);
      assert!(std::slice::from_raw_parts(grown, 64).iter().all(|&b| b == 0x42));

      let zeroed_layout = Layout::from_size_align(48, 256).unwrap();
      let zeroed = heap.alloc_zeroed(zeroed_layout);
      assert_eq!(zeroed as usize % 256, 0);
      assert!(std::slice::from_raw_parts(zeroed, 48).iter().all(|&b| b == 0));

      heap.dealloc(grown, Layout::from_size_align(1024, 128).unwrap());
      heap.dealloc(zeroed, zeroed_layout);
    }

    assert_eq!(heap.stats().free_blocks, 1);
  }

  #[test]
  fn test_with_exposes_allocator() {
    let mut words = vec![0u128; 16];
    let heap = locked(&mut words);

    let size = heap.with(|allocator| unsafe {
      let ptr = allocator.allocate(20).unwrap();
      allocator.block_size(ptr)
    });

    assert_eq!(size, 32);
  }
}
