//! Pure transformations over libvirt domain XML.
//!
//! Each operation takes the current domain document as a string, applies one
//! edit, and returns the full re-serialized document.  Nothing here talks to
//! libvirt: the caller fetches the document, calls an operation, and persists
//! the result back.

pub mod boot_order;
pub mod disk;
pub mod error;
pub mod media;
pub mod memory;
pub mod spice;
pub mod target;
pub mod xml;
