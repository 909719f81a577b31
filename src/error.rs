use thiserror::Error;

/// Reasons an allocation request can fail.
///
/// Misuse such as releasing a pointer twice is not represented here: it is
/// undefined behaviour, see the `# Safety` sections of the allocator methods.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The region grower could not extend the managed region.
  #[error("region grower could not supply {requested} more bytes")]
  ResourceExhausted { requested: usize },

  /// A size computation overflowed `usize`.
  #[error("requested size overflows the address space")]
  InvalidSize,

  /// The requested alignment is not a power of two.
  #[error("alignment {align} is not a power of two")]
  UnsupportedAlignment { align: usize },
}

pub type AllocResult<T = ()> = Result<T, AllocError>;
