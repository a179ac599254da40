//! Core use-case services.
//!
//! # Responsibility
//! - Own the live tracker state (`RecordStore`) and its mutations.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod patch;
pub mod record_store;
pub mod timeline;
