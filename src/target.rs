//! Disk target-device name allocation.
//!
//! Libvirt names disk targets `vda`, `vdb`, … for virtio buses and `sda`,
//! `sdb`, … for everything else.  When a disk migrates to a different bus it
//! needs a fresh name that follows the new bus's convention and does not
//! collide with any target already defined on the machine.

use crate::error::VirtDomError;

/// Pick the first free target name for `bus`, avoiding `existing`.
///
/// Fails with `NoFreeTarget` once all 26 letter suffixes are taken.
pub fn next_available_target(existing: &[String], bus: &str) -> Result<String, VirtDomError> {
    let prefix = if bus == "virtio" { "vd" } else { "sd" };
    for letter in 'a'..='z' {
        let candidate = format!("{prefix}{letter}");
        if !existing.iter().any(|t| *t == candidate) {
            return Ok(candidate);
        }
    }
    Err(VirtDomError::NoFreeTarget {
        bus: bus.to_string(),
    })
}
