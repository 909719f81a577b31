use std::{io::Read, ptr::NonNull};

use libc::sbrk;
use rfreelist::{FreeListAllocator, HEADER_SIZE, LockedAllocator, Sbrk};

// Everything the demo itself allocates (stdout buffers, Vec, String) goes
// through a second heap on the same program break.
#[global_allocator]
static GLOBAL: LockedAllocator<Sbrk> = LockedAllocator::new(Sbrk::new());

/// Waits until the user presses ENTER.
/// Handy for inspecting the program break with `pmap` or `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_heap(heap: &FreeListAllocator<Sbrk>) {
  println!("    {}", heap.stats());
  for (address, size) in heap.free_blocks() {
    println!("    free block at {:#x}: {} bytes", address, size);
  }
}

fn print_alloc(
  heap: &FreeListAllocator<Sbrk>,
  requested: usize,
  ptr: NonNull<u8>,
) {
  println!(
    "Allocated {} bytes (block of {}), address = {:?}",
    requested,
    unsafe { heap.block_size(ptr) },
    ptr
  );
}

fn main() {
  let mut heap = FreeListAllocator::new(Sbrk::new());

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // 1) Three neighbouring blocks, all fresh from sbrk.
    let a = heap.allocate(48).unwrap();
    let b = heap.allocate(48).unwrap();
    let c = heap.allocate(48).unwrap();
    println!("\n[1] Allocate three 48-byte blocks");
    for ptr in [a, b, c] {
      print_alloc(&heap, 48, ptr);
    }
    print_program_break("after [1]");
    block_until_enter_pressed();

    // 2) Release the middle one, then reuse it for the same size.
    heap.release(Some(b));
    println!("\n[2] Released b");
    print_heap(&heap);

    let reused = heap.allocate(40).unwrap();
    println!(
      "[2] allocate(40) == b? {}",
      if reused == b { "Yes, the free list served it" } else { "No" }
    );
    block_until_enter_pressed();

    // 3) Release a then the reused block: they merge into one free block.
    heap.release(Some(a));
    heap.release(Some(reused));
    println!("\n[3] Released a and b, expecting one merged block");
    print_heap(&heap);

    let merged = heap.allocate(2 * 48 + HEADER_SIZE).unwrap();
    print_alloc(&heap, 2 * 48 + HEADER_SIZE, merged);
    println!("[3] merged block starts at a? {}", merged == a);
    block_until_enter_pressed();

    // 4) Zeroed memory and growth through resize.
    let zeroed = heap.zero_allocate(10, 4).unwrap();
    let bytes = std::slice::from_raw_parts(zeroed.as_ptr(), 40);
    println!("\n[4] zero_allocate(10, 4) all zero? {}", bytes.iter().all(|&b| b == 0));

    zeroed.as_ptr().write_bytes(0x7F, 40);
    let grown = heap.resize(Some(zeroed), 4096).unwrap().unwrap();
    print_alloc(&heap, 4096, grown);
    println!("[4] first byte after resize = {:#x}", *grown.as_ptr());
    print_program_break("after [4]");
    block_until_enter_pressed();

    // 5) The process-wide heap served every String and Vec above.
    let words: Vec<String> = (0..8).map(|i| format!("word-{}", i)).collect();
    println!("\n[5] global heap after building {} strings: {}", words.len(), GLOBAL.stats());

    println!("\n[6] End of example. The OS reclaims everything on exit.");
    heap.release(Some(grown));
    heap.release(Some(c));
    print_heap(&heap);
  }
}
