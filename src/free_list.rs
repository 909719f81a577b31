use crate::block::{FreeBlock, HEADER_SIZE};

/// Singly linked list of released blocks, most recently released first.
///
/// Blocks are linked through their own headers, so the list owns no memory of
/// its own. It is not ordered by address: the adjacency lookups used when
/// coalescing scan the whole list.
#[derive(Debug, Default)]
pub struct FreeList {
  head: Option<FreeBlock>,
}

/// Walks a [`FreeList`] in list order.
pub struct Iter {
  current: Option<FreeBlock>,
}

impl Iterator for Iter {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<FreeBlock> {
    let block = self.current?;
    self.current = block.next();
    Some(block)
  }
}

impl FreeList {
  pub const fn new() -> Self {
    Self { head: None }
  }

  pub fn iter(&self) -> Iter {
    Iter { current: self.head }
  }

  /// First block that can serve `size` bytes: either an exact fit, or one
  /// large enough to be split with a header to spare.
  pub fn find_fit(
    &self,
    size: usize,
  ) -> Option<FreeBlock> {
    self.iter().find(|block| {
      block.size() == size
        || size
          .checked_add(HEADER_SIZE)
          .is_some_and(|needed| block.size() >= needed)
    })
  }

  pub fn push_front(
    &mut self,
    block: FreeBlock,
  ) {
    block.set_next(self.head);
    self.head = Some(block);
  }

  /// Unlinks `block`. Does nothing if it is not on the list.
  pub fn remove(
    &mut self,
    block: FreeBlock,
  ) {
    self.relink(block, block.next());
  }

  /// Puts `with` in the slot `block` occupies. `with` must already carry the
  /// link that should follow it.
  pub fn replace(
    &mut self,
    block: FreeBlock,
    with: FreeBlock,
  ) {
    self.relink(block, Some(with));
  }

  /// The listed block whose bytes end exactly where `block` starts.
  pub fn find_prev(
    &self,
    block: FreeBlock,
  ) -> Option<FreeBlock> {
    self.iter().find(|candidate| candidate.end() == block.address())
  }

  /// The listed block that starts exactly where `block` ends.
  pub fn find_next(
    &self,
    block: FreeBlock,
  ) -> Option<FreeBlock> {
    let end = block.end();
    self.iter().find(|candidate| candidate.address() == end)
  }

  /// Merges a freshly listed `block` with its free address neighbours.
  ///
  /// Every absorbed block leaves the list, so at most one entry remains for
  /// the merged span. Returns that block.
  pub fn coalesce(
    &mut self,
    block: FreeBlock,
  ) -> FreeBlock {
    let mut merged = block;

    if let Some(prev) = self.find_prev(merged) {
      self.remove(merged);
      prev.absorb(merged);
      log::trace!(
        "coalesced {:#x} into predecessor {:#x}",
        merged.address(),
        prev.address()
      );
      merged = prev;
    }

    if let Some(next) = self.find_next(merged) {
      self.remove(next);
      merged.absorb(next);
      log::trace!(
        "coalesced successor {:#x} into {:#x}",
        next.address(),
        merged.address()
      );
    }

    merged
  }

  fn relink(
    &mut self,
    target: FreeBlock,
    to: Option<FreeBlock>,
  ) {
    if self.head == Some(target) {
      self.head = to;
      return;
    }

    let mut current = self.head;
    while let Some(block) = current {
      if block.next() == Some(target) {
        block.set_next(to);
        return;
      }
      current = block.next();
    }
  }
}

#[cfg(test)]
mod tests {
  use std::ptr::NonNull;

  use super::*;
  use crate::block::UsedBlock;

  /// Lays out consecutive free blocks of the given payload sizes.
  fn blocks(
    words: &mut Vec<u128>,
    sizes: &[usize],
  ) -> Vec<FreeBlock> {
    let total: usize = sizes.iter().map(|size| size + HEADER_SIZE).sum();
    *words = vec![0u128; total / 16];
    let mut address = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();

    sizes
      .iter()
      .map(|&size| unsafe {
        let block = UsedBlock::init(address, size).release();
        address = address.add(HEADER_SIZE + size);
        block
      })
      .collect()
  }

  fn addresses(list: &FreeList) -> Vec<usize> {
    list.iter().map(FreeBlock::address).collect()
  }

  #[test]
  fn test_push_front_orders_by_recency() {
    let mut words = Vec::new();
    let b = blocks(&mut words, &[16, 32, 48]);
    let mut list = FreeList::new();

    assert!(addresses(&list).is_empty());

    list.push_front(b[0]);
    list.push_front(b[2]);
    list.push_front(b[1]);

    assert_eq!(addresses(&list), vec![b[1].address(), b[2].address(), b[0].address()]);
  }

  #[test]
  fn test_remove() {
    let mut words = Vec::new();
    let b = blocks(&mut words, &[16, 32, 48]);
    let mut list = FreeList::new();
    for &block in &b {
      list.push_front(block);
    }

    list.remove(b[1]);
    assert_eq!(addresses(&list), vec![b[2].address(), b[0].address()]);

    list.remove(b[2]);
    assert_eq!(addresses(&list), vec![b[0].address()]);

    list.remove(b[1]);
    assert_eq!(addresses(&list), vec![b[0].address()]);

    list.remove(b[0]);
    assert!(addresses(&list).is_empty());
  }

  #[test]
  fn test_find_fit_is_first_fit() {
    let mut words = Vec::new();
    let b = blocks(&mut words, &[64, 256, 32, 128]);
    let mut list = FreeList::new();
    for &block in &b {
      list.push_front(block);
    }

    // list order: 128, 32, 256, 64
    assert_eq!(list.find_fit(32), Some(b[3]));
    assert_eq!(list.find_fit(128), Some(b[3]));
    assert_eq!(list.find_fit(144), Some(b[1]));
    assert_eq!(list.find_fit(256), Some(b[1]));
    assert_eq!(list.find_fit(512), None);
  }

  #[test]
  fn test_find_fit_needs_exact_or_split_room() {
    let mut words = Vec::new();
    let b = blocks(&mut words, &[48]);
    let mut list = FreeList::new();
    list.push_front(b[0]);

    assert_eq!(list.find_fit(48), Some(b[0]));
    assert_eq!(list.find_fit(48 - HEADER_SIZE), Some(b[0]));
    assert_eq!(list.find_fit(40), None);
    assert_eq!(list.find_fit(usize::MAX), None);
  }

  #[test]
  fn test_neighbour_lookup() {
    let mut words = Vec::new();
    let b = blocks(&mut words, &[16, 32, 48]);
    let mut list = FreeList::new();
    list.push_front(b[0]);
    list.push_front(b[2]);

    assert_eq!(list.find_prev(b[1]), Some(b[0]));
    assert_eq!(list.find_next(b[1]), Some(b[2]));
    assert_eq!(list.find_prev(b[0]), None);
    assert_eq!(list.find_next(b[2]), None);
  }

  #[test]
  fn test_coalesce_both_sides() {
    let mut words = Vec::new();
    let b = blocks(&mut words, &[16, 32, 48]);
    let mut list = FreeList::new();
    list.push_front(b[2]);
    list.push_front(b[0]);
    list.push_front(b[1]);

    let merged = list.coalesce(b[1]);

    assert_eq!(merged, b[0]);
    assert_eq!(merged.size(), 16 + 32 + 48 + 2 * HEADER_SIZE);
    assert_eq!(addresses(&list), vec![b[0].address()]);
  }

  #[test]
  fn test_coalesce_successor_deep_in_list() {
    let mut words = Vec::new();
    let b = blocks(&mut words, &[16, 32, 48, 64]);
    let mut list = FreeList::new();
    // b[1] is released last; its successor b[2] sits behind an unrelated block
    list.push_front(b[2]);
    list.push_front(b[3]);
    list.push_front(b[1]);

    let merged = list.coalesce(b[1]);

    assert_eq!(merged, b[1]);
    assert_eq!(merged.size(), 32 + HEADER_SIZE + 48);
    assert_eq!(addresses(&list), vec![b[1].address(), b[3].address()]);
    assert_eq!(b[3].next(), None);
  }

  #[test]
  fn test_coalesce_without_neighbours() {
    let mut words = Vec::new();
    let b = blocks(&mut words, &[16, 32, 48]);
    let mut list = FreeList::new();
    list.push_front(b[2]);
    list.push_front(b[0]);

    let merged = list.coalesce(b[0]);

    assert_eq!(merged, b[0]);
    assert_eq!(merged.size(), 16);
    assert_eq!(addresses(&list), vec![b[0].address(), b[2].address()]);
  }

  #[test]
  fn test_replace_keeps_position() {
    let mut words = Vec::new();
    let b = blocks(&mut words, &[16, 96, 48]);
    let mut list = FreeList::new();
    list.push_front(b[0]);
    list.push_front(b[1]);
    list.push_front(b[2]);

    let (_, remainder) = b[1].split(32).unwrap();
    list.replace(b[1], remainder);

    assert_eq!(
      addresses(&list),
      vec![b[2].address(), remainder.address(), b[0].address()]
    );
  }
}
