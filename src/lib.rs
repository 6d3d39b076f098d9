//! Heap allocators that carve blocks out of one fixed, caller-supplied
//! memory segment.
//!
//! Two variants share the same six-operation surface (`init`, `malloc`,
//! `free`, `realloc`, `validate`, `dump`):
//!
//! - [`ImplicitAllocator`] finds free blocks by walking the segment header
//!   by header. Simple, no per-block bookkeeping beyond the tagged header.
//! - [`ExplicitAllocator`] additionally threads every free block onto a
//!   doubly linked LIFO list, coalesces eagerly to the right on `free`, and
//!   reallocates in place when the neighbouring space allows it.
//!
//! The segment is owned by the caller; the allocators never touch memory
//! outside it and never allocate on their own behalf.

#![cfg_attr(not(test), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod block;
pub mod explicit;
pub mod global;
pub mod implicit;
pub mod report;

pub use block::{ALIGNMENT, HEADER_SIZE, MAX_REQUEST_SIZE};
pub use explicit::ExplicitAllocator;
pub use global::{LockedExplicit, LockedImplicit, EXPLICIT_HEAP, IMPLICIT_HEAP};
pub use implicit::ImplicitAllocator;
pub use report::{set_report_sink, ReportSink};
#[cfg(feature = "std")]
pub use report::StdoutSink;
