//! File Codec: positioned reads/writes over the binary vault format.
//!
//! Header, slot table, and entry heap are each addressed by byte offset;
//! this module never interprets slot states or ciphertext semantics — that
//! belongs to the index and engine layers above it.

pub mod entry;
pub mod header;
pub mod slot;
