use core::alloc::{GlobalAlloc, Layout};
use core::ptr::null_mut;

use spin::Mutex;

use crate::block::ALIGNMENT;
use crate::explicit::ExplicitAllocator;
use crate::implicit::ImplicitAllocator;

/// Process-wide instance of the segment-walking variant.
pub static IMPLICIT_HEAP: LockedImplicit = LockedImplicit::new();

/// Process-wide instance of the free-list variant.
pub static EXPLICIT_HEAP: LockedExplicit = LockedExplicit::new();

/// [`ImplicitAllocator`] behind a lock, so it can live in a static. The
/// allocator semantics stay single-threaded; the lock only serializes
/// access to the shared instance.
pub struct LockedImplicit {
    inner: Mutex<ImplicitAllocator>,
}

impl LockedImplicit {
    pub const fn new() -> Self {
        LockedImplicit {
            inner: Mutex::new(ImplicitAllocator::new()),
        }
    }

    /// # Safety
    /// See [`ImplicitAllocator::init`].
    pub unsafe fn init(&self, base: *mut u8, length: usize) -> bool {
        unsafe { self.inner.lock().init(base, length) }
    }

    pub fn malloc(&self, requested: usize) -> *mut u8 {
        self.inner.lock().malloc(requested)
    }

    /// # Safety
    /// See [`ImplicitAllocator::free`].
    pub unsafe fn free(&self, ptr: *mut u8) {
        unsafe { self.inner.lock().free(ptr) }
    }

    /// # Safety
    /// See [`ImplicitAllocator::realloc`].
    pub unsafe fn realloc(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        unsafe { self.inner.lock().realloc(ptr, new_size) }
    }

    pub fn validate(&self) -> bool {
        self.inner.lock().validate()
    }

    pub fn dump(&self) {
        self.inner.lock().dump()
    }
}

/// [`ExplicitAllocator`] behind a lock. Also usable as a [`GlobalAlloc`]
/// over the caller-supplied segment once `init` has run.
pub struct LockedExplicit {
    inner: Mutex<ExplicitAllocator>,
}

impl LockedExplicit {
    pub const fn new() -> Self {
        LockedExplicit {
            inner: Mutex::new(ExplicitAllocator::new()),
        }
    }

    /// # Safety
    /// See [`ExplicitAllocator::init`].
    pub unsafe fn init(&self, base: *mut u8, length: usize) -> bool {
        unsafe { self.inner.lock().init(base, length) }
    }

    pub fn malloc(&self, requested: usize) -> *mut u8 {
        self.inner.lock().malloc(requested)
    }

    /// # Safety
    /// See [`ExplicitAllocator::free`].
    pub unsafe fn free(&self, ptr: *mut u8) {
        unsafe { self.inner.lock().free(ptr) }
    }

    /// # Safety
    /// See [`ExplicitAllocator::realloc`].
    pub unsafe fn realloc(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        unsafe { self.inner.lock().realloc(ptr, new_size) }
    }

    pub fn validate(&self) -> bool {
        self.inner.lock().validate()
    }

    pub fn dump(&self) {
        self.inner.lock().dump()
    }
}

unsafe impl GlobalAlloc for LockedExplicit {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // Payloads are only ever ALIGNMENT-aligned; stricter layouts
        // cannot be honoured and fail cleanly.
        if layout.align() > ALIGNMENT {
            return null_mut();
        }
        self.inner.lock().malloc(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        // Safety: the GlobalAlloc contract guarantees ptr came from alloc
        // on this allocator with this layout.
        unsafe { self.inner.lock().free(ptr) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return null_mut();
        }
        // Safety: same provenance guarantee as dealloc.
        unsafe { self.inner.lock().realloc(ptr, new_size) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr;

    fn segment(len: usize) -> Vec<u64> {
        assert_eq!(len % 8, 0);
        vec![0u64; len / 8]
    }

    #[test]
    fn locked_explicit_serves_the_full_operation_set() {
        let mut memory = segment(256);
        let heap = LockedExplicit::new();
        unsafe {
            assert!(heap.init(memory.as_mut_ptr() as *mut u8, 256));
            let ptr = heap.malloc(32);
            assert!(!ptr.is_null());
            let grown = heap.realloc(ptr, 64);
            assert!(!grown.is_null());
            heap.free(grown);
        }
        assert!(heap.validate());
    }

    #[test]
    fn global_alloc_adapter_allocates_and_frees() {
        let mut memory = segment(256);
        let heap = LockedExplicit::new();
        unsafe {
            assert!(heap.init(memory.as_mut_ptr() as *mut u8, 256));
            let layout = Layout::from_size_align(64, 8).unwrap();
            let ptr = heap.alloc(layout);
            assert!(!ptr.is_null());
            ptr::write_bytes(ptr, 0xDD, 64);
            assert!(core::slice::from_raw_parts(ptr, 64)
                .iter()
                .all(|&byte| byte == 0xDD));
            heap.dealloc(ptr, layout);
        }
        assert!(heap.validate());
    }

    #[test]
    fn global_alloc_adapter_refuses_oversized_alignment() {
        let mut memory = segment(256);
        let heap = LockedExplicit::new();
        unsafe {
            assert!(heap.init(memory.as_mut_ptr() as *mut u8, 256));
            let layout = Layout::from_size_align(64, 64).unwrap();
            assert!(heap.alloc(layout).is_null());
        }
        assert!(heap.validate());
    }

    #[test]
    fn global_alloc_adapter_reallocates_in_place_when_possible() {
        let mut memory = segment(256);
        let heap = LockedExplicit::new();
        unsafe {
            assert!(heap.init(memory.as_mut_ptr() as *mut u8, 256));
            let layout = Layout::from_size_align(16, 8).unwrap();
            let ptr = heap.alloc(layout);
            assert!(!ptr.is_null());
            // Nothing sits to the right but the free tail, so growth
            // keeps the address.
            let grown = GlobalAlloc::realloc(&heap, ptr, layout, 64);
            assert_eq!(grown, ptr);
            heap.dealloc(grown, Layout::from_size_align(64, 8).unwrap());
        }
        assert!(heap.validate());
    }

    // The two statics are process-wide, so exactly one test touches each.
    #[test]
    fn static_explicit_instance_works_end_to_end() {
        let mut memory = segment(256);
        unsafe {
            assert!(EXPLICIT_HEAP.init(memory.as_mut_ptr() as *mut u8, 256));
            let ptr = EXPLICIT_HEAP.malloc(40);
            assert!(!ptr.is_null());
            assert!(EXPLICIT_HEAP.validate());
            EXPLICIT_HEAP.free(ptr);
        }
        assert!(EXPLICIT_HEAP.validate());
    }

    #[test]
    fn static_implicit_instance_works_end_to_end() {
        let mut memory = segment(256);
        unsafe {
            assert!(IMPLICIT_HEAP.init(memory.as_mut_ptr() as *mut u8, 256));
            let ptr = IMPLICIT_HEAP.malloc(40);
            assert!(!ptr.is_null());
            assert!(IMPLICIT_HEAP.validate());
            IMPLICIT_HEAP.free(ptr);
        }
        assert!(IMPLICIT_HEAP.validate());
    }
}
