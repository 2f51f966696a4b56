//! Arena allocator
//!
//! Bump allocation out of fixed-size blocks. Individual allocations are
//! never freed; every block is released together when the arena drops,
//! which is what lets readers hold node pointers without reference counts.

use std::alloc::{self, Layout};
use std::cell::UnsafeCell;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Size of a regular arena block
pub const BLOCK_SIZE: usize = 4096;

/// Alignment guaranteed by `allocate_aligned` and by every block
pub const ALIGN: usize = 8;

const _: () = assert!(ALIGN.is_power_of_two());

struct Blocks {
    /// Next free byte in the current block
    alloc_ptr: *mut u8,
    /// Bytes left in the current block
    remaining: usize,
    /// Every block ever handed out, freed on drop
    owned: Vec<(NonNull<u8>, Layout)>,
}

/// Block-based bump allocator.
///
/// Allocation requires exclusive access (one allocator at a time), but the
/// memory it hands out stays valid, at a stable address, until the arena
/// itself is dropped.
pub struct Arena {
    blocks: UnsafeCell<Blocks>,
    memory_usage: AtomicUsize,
}

// SAFETY: the mutable allocation state is only touched through `allocate*`,
// whose contract requires callers to serialize. Handed-out memory is plain
// bytes owned by the arena.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new() -> Self {
        Self {
            blocks: UnsafeCell::new(Blocks {
                alloc_ptr: ptr::null_mut(),
                remaining: 0,
                owned: Vec::new(),
            }),
            memory_usage: AtomicUsize::new(0),
        }
    }

    /// Allocate `bytes` bytes with no alignment guarantee.
    ///
    /// # Safety
    /// No other call to `allocate` or `allocate_aligned` on this arena may
    /// run concurrently.
    pub unsafe fn allocate(&self, bytes: usize) -> NonNull<u8> {
        assert!(bytes > 0, "zero-sized arena allocation");
        let blocks = &mut *self.blocks.get();

        if bytes <= blocks.remaining {
            let result = blocks.alloc_ptr;
            blocks.alloc_ptr = blocks.alloc_ptr.add(bytes);
            blocks.remaining -= bytes;
            return NonNull::new_unchecked(result);
        }
        self.allocate_fallback(blocks, bytes)
    }

    /// Allocate `bytes` bytes aligned to [`ALIGN`].
    ///
    /// # Safety
    /// Same contract as [`Arena::allocate`].
    pub unsafe fn allocate_aligned(&self, bytes: usize) -> NonNull<u8> {
        assert!(bytes > 0, "zero-sized arena allocation");
        let blocks = &mut *self.blocks.get();

        let current_mod = blocks.alloc_ptr as usize & (ALIGN - 1);
        let slop = if current_mod == 0 { 0 } else { ALIGN - current_mod };
        let needed = bytes + slop;

        let result = if needed <= blocks.remaining {
            let aligned = blocks.alloc_ptr.add(slop);
            blocks.alloc_ptr = blocks.alloc_ptr.add(needed);
            blocks.remaining -= needed;
            NonNull::new_unchecked(aligned)
        } else {
            // Fresh blocks are always ALIGN-aligned
            self.allocate_fallback(blocks, bytes)
        };

        debug_assert_eq!(result.as_ptr() as usize & (ALIGN - 1), 0);
        result
    }

    /// Total bytes reserved from the system allocator (approximate)
    pub fn memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }

    fn allocate_fallback(&self, blocks: &mut Blocks, bytes: usize) -> NonNull<u8> {
        if bytes > BLOCK_SIZE / 4 {
            // Large objects get their own block so the current one keeps its tail
            return self.allocate_new_block(blocks, bytes);
        }

        let block = self.allocate_new_block(blocks, BLOCK_SIZE);
        // SAFETY: `bytes <= BLOCK_SIZE / 4`, so the offset stays in the block
        unsafe {
            blocks.alloc_ptr = block.as_ptr().add(bytes);
        }
        blocks.remaining = BLOCK_SIZE - bytes;
        block
    }

    fn allocate_new_block(&self, blocks: &mut Blocks, block_bytes: usize) -> NonNull<u8> {
        let layout = match Layout::from_size_align(block_bytes, ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("arena block of {} bytes has no valid layout", block_bytes),
        };
        // SAFETY: layout has a non-zero size (callers assert `bytes > 0`)
        let raw = unsafe { alloc::alloc(layout) };
        let block = match NonNull::new(raw) {
            Some(block) => block,
            None => alloc::handle_alloc_error(layout),
        };

        blocks.owned.push((block, layout));
        self.memory_usage.fetch_add(
            block_bytes + std::mem::size_of::<(NonNull<u8>, Layout)>(),
            Ordering::Relaxed,
        );
        block
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for (block, layout) in self.blocks.get_mut().owned.drain(..) {
            // SAFETY: each block was produced by `alloc::alloc` with this layout
            unsafe { alloc::dealloc(block.as_ptr(), layout) };
        }
    }
}
