/// Granularity every allocation size is rounded up to, in bytes.
pub const ALIGNMENT: usize = 16;

/// Rounds `value` up to the allocator's [`ALIGNMENT`], or `None` on overflow.
///
/// # Examples
///
/// ```rust
/// use rfreelist::align::align_up;
///
/// assert_eq!(align_up(0), Some(0));
/// assert_eq!(align_up(13), Some(16));
/// assert_eq!(align_up(32), Some(32));
/// assert_eq!(align_up(usize::MAX), None);
/// ```
pub const fn align_up(value: usize) -> Option<usize> {
  align_up_to(value, ALIGNMENT)
}

/// Rounds `value` up to a multiple of `align`, which must be a power of two.
pub const fn align_up_to(
  value: usize,
  align: usize,
) -> Option<usize> {
  debug_assert!(align.is_power_of_two());

  match value.checked_add(align - 1) {
    Some(padded) => Some(padded & !(align - 1)),
    None => None,
  }
}
