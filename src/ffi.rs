//! C allocator entry points over a process-wide heap grown with `sbrk`.
//!
//! Linking a binary against this library with the `c-abi` feature enabled
//! replaces `malloc` and friends for the whole process, C code included.
//! Every glibc entry point that hands out heap memory is covered, so no
//! foreign pointer ever reaches [`free`].

use std::{
  mem,
  ptr::{self, NonNull},
};

use libc::{EINVAL, ENOMEM, _SC_PAGESIZE, c_int, c_void, size_t, sysconf};

use crate::{align::align_up_to, global::LockedAllocator, region::Sbrk};

static HEAP: LockedAllocator<Sbrk> = LockedAllocator::new(Sbrk::new());

fn to_c(ptr: Option<NonNull<u8>>) -> *mut c_void {
  ptr.map_or(ptr::null_mut(), |ptr| ptr.as_ptr().cast())
}

fn page_size() -> usize {
  match unsafe { sysconf(_SC_PAGESIZE) } {
    size if size > 0 => size as usize,
    _ => 4096,
  }
}

fn aligned(
  size: size_t,
  align: size_t,
) -> *mut c_void {
  to_c(HEAP.with(|heap| unsafe { heap.allocate_aligned(size, align) }).ok())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc(size: size_t) -> *mut c_void {
  to_c(HEAP.with(|heap| unsafe { heap.allocate(size) }).ok())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn calloc(
  count: size_t,
  size: size_t,
) -> *mut c_void {
  to_c(HEAP.with(|heap| unsafe { heap.zero_allocate(count, size) }).ok())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(
  ptr: *mut c_void,
  size: size_t,
) -> *mut c_void {
  let ptr = NonNull::new(ptr.cast::<u8>());
  to_c(HEAP.with(|heap| unsafe { heap.resize(ptr, size) }).ok().flatten())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn reallocarray(
  ptr: *mut c_void,
  count: size_t,
  size: size_t,
) -> *mut c_void {
  match count.checked_mul(size) {
    Some(total) => unsafe { realloc(ptr, total) },
    None => ptr::null_mut(),
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
  HEAP.with(|heap| unsafe { heap.release(NonNull::new(ptr.cast())) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn aligned_alloc(
  align: size_t,
  size: size_t,
) -> *mut c_void {
  aligned(size, align)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn memalign(
  align: size_t,
  size: size_t,
) -> *mut c_void {
  aligned(size, align)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn posix_memalign(
  out: *mut *mut c_void,
  align: size_t,
  size: size_t,
) -> c_int {
  if !align.is_power_of_two() || align % mem::size_of::<*mut c_void>() != 0 {
    return EINVAL;
  }

  let ptr = aligned(size, align);
  if ptr.is_null() {
    return ENOMEM;
  }

  unsafe { out.write(ptr) };
  0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn valloc(size: size_t) -> *mut c_void {
  aligned(size, page_size())
}

/// Page-aligned, with the size rounded up to whole pages (at least one).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pvalloc(size: size_t) -> *mut c_void {
  let page = page_size();
  match align_up_to(size.max(1), page) {
    Some(size) => aligned(size, page),
    None => ptr::null_mut(),
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> size_t {
  match NonNull::new(ptr.cast::<u8>()) {
    Some(ptr) => HEAP.with(|heap| unsafe { heap.block_size(ptr) }),
    None => 0,
  }
}
