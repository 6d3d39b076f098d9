use core::ptr::{self, null_mut};

use crate::block::{
    align_up, header_of, next_block, payload_of, BlockHeader, ALIGNMENT, HEADER_SIZE,
    MAX_REQUEST_SIZE,
};
use crate::heap_println;

const MIN_PAYLOAD: usize = ALIGNMENT;

/// Allocator that discovers free blocks by walking the segment header by
/// header. Blocks tile the segment exactly; a block is the unit
/// `header + payload`, and the walk steps by `payload size + HEADER_SIZE`.
///
/// Freed blocks are never coalesced, so long-running workloads fragment;
/// the trade is that `free` touches nothing beyond the one header.
pub struct ImplicitAllocator {
    base: *mut u8,
    end: *mut u8,
    length: usize,
    used_bytes: usize,
    used_blocks: usize,
    free_blocks: usize,
    ready: bool,
}

// Safety: the raw segment pointers are only dereferenced by the owning
// instance, and the init contract gives it exclusive access to the segment.
unsafe impl Send for ImplicitAllocator {}

impl ImplicitAllocator {
    pub const fn new() -> Self {
        ImplicitAllocator {
            base: null_mut(),
            end: null_mut(),
            length: 0,
            used_bytes: 0,
            used_blocks: 0,
            free_blocks: 0,
            ready: false,
        }
    }

    /// Take over the segment `[base, base + length)` and reset it to one
    /// free block spanning the whole range. Any earlier allocations from a
    /// previous init are discarded. Returns false when the segment is too
    /// small for a single minimal block or is not `ALIGNMENT`-aligned.
    ///
    /// # Safety
    /// The segment must be valid, writable, and exclusive to this allocator
    /// for as long as it serves requests.
    pub unsafe fn init(&mut self, base: *mut u8, length: usize) -> bool {
        if length < HEADER_SIZE + MIN_PAYLOAD {
            return false;
        }
        if base as usize % ALIGNMENT != 0 || length % ALIGNMENT != 0 {
            return false;
        }

        self.base = base;
        // Safety: length bytes past base stay inside the caller's segment.
        self.end = unsafe { base.add(length) };
        self.length = length;
        self.used_bytes = 0;
        self.used_blocks = 0;
        self.free_blocks = 1;

        // Safety: base is aligned and the segment holds at least one header.
        unsafe {
            (*(base as *mut BlockHeader)).set(length - HEADER_SIZE, false);
        }
        self.ready = true;
        true
    }

    /// First-fit allocation. Null when the request is zero, oversized, or
    /// no free block can hold it.
    pub fn malloc(&mut self, requested: usize) -> *mut u8 {
        if !self.ready || requested == 0 || requested > MAX_REQUEST_SIZE {
            return null_mut();
        }

        let need = align_up(requested, ALIGNMENT);
        if need + self.used_bytes > self.length {
            return null_mut();
        }

        let block = self.find_first_free(need);
        if block.is_null() {
            return null_mut();
        }

        // Safety: block came from the segment walk, so it is a live free
        // header with at least `need` bytes of payload.
        unsafe {
            self.split(block, need);
            (*block).mark_used();
            self.used_bytes += (*block).size() + HEADER_SIZE;
            self.used_blocks += 1;
            self.free_blocks -= 1;
            payload_of(block)
        }
    }

    /// Return a block to the free set. Null is a no-op. The block stays in
    /// place; neighbours are not merged.
    ///
    /// # Safety
    /// `ptr` must be null or a payload pointer obtained from this
    /// allocator's `malloc`/`realloc` and not freed since.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() || !self.ready {
            return;
        }
        // Safety: per contract ptr is a live payload pointer of ours.
        unsafe {
            let header = header_of(ptr);
            (*header).mark_free();
            self.used_bytes -= (*header).size() + HEADER_SIZE;
        }
        self.used_blocks -= 1;
        self.free_blocks += 1;
    }

    /// Resize by moving: allocate fresh, copy the surviving prefix, free the
    /// old block. A null `ptr` acts as `malloc`; a zero `new_size` acts as
    /// `free` and returns null. On allocation failure the original block is
    /// left untouched and null is returned.
    ///
    /// # Safety
    /// `ptr` must be null or a live payload pointer of ours, as for `free`.
    pub unsafe fn realloc(&mut self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        if ptr.is_null() {
            return self.malloc(new_size);
        }
        if new_size == 0 {
            // Safety: ptr is live per contract.
            unsafe { self.free(ptr) };
            return null_mut();
        }

        let new_ptr = self.malloc(new_size);
        if new_ptr.is_null() {
            return null_mut();
        }

        // Safety: both blocks are live and distinct, and the copy length is
        // bounded by both payload sizes.
        unsafe {
            let old_size = (*header_of(ptr)).size();
            let copy = if new_size < old_size { new_size } else { old_size };
            ptr::copy_nonoverlapping(ptr, new_ptr, copy);
            self.free(ptr);
        }
        new_ptr
    }

    /// Check every bookkeeping invariant. Read-only; emits one diagnostic
    /// line per failure through the report sink.
    pub fn validate(&self) -> bool {
        if !self.ready {
            return true;
        }
        if self.used_bytes > self.length {
            heap_println!("bytes in use {} exceed segment length {}", self.used_bytes, self.length);
            return false;
        }

        let mut free_seen = 0usize;
        let mut used_seen = 0usize;
        let mut used_sum = 0usize;
        let mut cursor = self.base as *mut BlockHeader;
        while (cursor as *mut u8) < self.end {
            // Safety: the walk starts at base and only advances by sizes it
            // has just bounds-checked, so cursor stays inside the segment.
            unsafe {
                let size = (*cursor).size();
                if size < MIN_PAYLOAD {
                    heap_println!("block at {:p} has undersized payload {}", cursor, size);
                    return false;
                }
                let next = next_block(cursor);
                if (next as *mut u8) > self.end {
                    heap_println!("block at {:p} overruns the segment end", cursor);
                    return false;
                }
                if (*cursor).is_used() {
                    used_seen += 1;
                    used_sum += size + HEADER_SIZE;
                } else {
                    free_seen += 1;
                }
                cursor = next;
            }
        }

        if used_seen != self.used_blocks {
            heap_println!("found {} used blocks, counter says {}", used_seen, self.used_blocks);
            return false;
        }
        if free_seen != self.free_blocks {
            heap_println!("found {} free blocks, counter says {}", free_seen, self.free_blocks);
            return false;
        }
        if used_sum != self.used_bytes {
            heap_println!("used blocks total {} bytes, counter says {}", used_sum, self.used_bytes);
            return false;
        }
        true
    }

    /// Write the segment range and one line per block to the report sink.
    pub fn dump(&self) {
        if !self.ready {
            heap_println!("heap not initialized");
            return;
        }
        heap_println!(
            "Heap starts at {:p}, ends at {:p}. {} bytes currently used.",
            self.base,
            self.end,
            self.used_bytes
        );
        let mut cursor = self.base as *mut BlockHeader;
        while (cursor as *mut u8) < self.end {
            // Safety: same in-bounds walk as validate.
            unsafe {
                let size = (*cursor).size();
                let state = if (*cursor).is_used() { "used" } else { "free" };
                heap_println!("  {:p}: {} {}", cursor, size, state);
                cursor = next_block(cursor);
            }
        }
    }

    fn find_first_free(&self, need: usize) -> *mut BlockHeader {
        let mut cursor = self.base as *mut BlockHeader;
        // Safety: blocks tile the segment, so every step lands on the next
        // header until the cursor reaches the segment end.
        unsafe {
            while (cursor as *mut u8) < self.end {
                if !(*cursor).is_used() && (*cursor).size() >= need {
                    return cursor;
                }
                cursor = next_block(cursor);
            }
        }
        null_mut()
    }

    /// Carve `need` bytes off the front of `block` when the remainder can
    /// still form a legal block; otherwise leave the padding in place.
    ///
    /// # Safety
    /// `block` must be a live header with size of at least `need`.
    unsafe fn split(&mut self, block: *mut BlockHeader, need: usize) {
        unsafe {
            let old = (*block).size();
            if old - need >= HEADER_SIZE + MIN_PAYLOAD {
                let tail = (block as *mut u8).add(HEADER_SIZE + need) as *mut BlockHeader;
                (*tail).set(old - need - HEADER_SIZE, false);
                (*block).set(need, (*block).is_used());
                self.free_blocks += 1;
            }
        }
    }
}
