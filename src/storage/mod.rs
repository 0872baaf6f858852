//! Object storage backends.
//!
//! The [`backend::ObjectStore`] trait abstracts over where file bytes
//! physically live.  Implementations include local disk and process
//! memory.

pub mod backend;
pub mod local;
pub mod memory;
