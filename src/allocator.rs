//! Global memory allocator configuration.
//!
//! This module configures the global memory allocator for the crate. We use
//! `mimalloc` (Microsoft's high-performance allocator) instead of the system
//! allocator, which handles the engine's bursty allocation pattern well:
//! compaction and `rehash_file` both materialize a whole-heap-sized buffer
//! for the duration of a single call, then drop it.

use mimalloc::MiMalloc;

/// The global allocator instance.
///
/// We use the default `MiMalloc` configuration. This static instance is
/// registered as the `#[global_allocator]`, replacing the standard library's
/// default system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
