//! Disk attribute reconciliation: readonly/shareable markers, cache policy,
//! and bus migration with target-name reallocation.

use serde::{Deserialize, Serialize};
use xmltree::{Element, XMLNode};

use crate::error::VirtDomError;
use crate::media::disk_has_target;
use crate::target::next_available_target;
use crate::xml::{self, attr};

/// Desired state for one disk, keyed by its current target device name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskUpdate {
    pub target: String,
    pub readonly: bool,
    pub shareable: bool,
    /// New bus type.  A value different from the disk's current bus triggers
    /// a bus migration: fresh target name, stale `<address>` dropped.
    pub bus: Option<String>,
    /// Target names already defined on the machine, for collision avoidance
    /// when a bus migration allocates a new name.
    pub existing_targets: Vec<String>,
    pub cache: Option<String>,
}

/// Reconcile the matching disk's attributes with `update`.
///
/// The operation is atomic: either the fully-updated document is returned or
/// an error is raised, never a half-edited document.
pub fn update_disk(dom_xml: &str, update: &DiskUpdate) -> Result<String, VirtDomError> {
    let mut root = xml::parse_document(dom_xml)?;

    if let Some(devices) = xml::find_optional_child_mut(&mut root, "devices")? {
        for node in devices.children.iter_mut() {
            let Some(disk) = node.as_mut_element() else {
                continue;
            };
            if disk.name != "disk" || !disk_has_target(disk, &update.target)? {
                continue;
            }
            apply_update(disk, update)?;
        }
    }

    xml::serialize_document(&root)
}

fn apply_update(disk: &mut Element, update: &DiskUpdate) -> Result<(), VirtDomError> {
    set_marker(disk, "shareable", update.shareable)?;
    set_marker(disk, "readonly", update.readonly)?;

    if let Some(bus) = update.bus.as_deref() {
        let bus_changed =
            xml::find_optional_child(disk, "target")?.and_then(|t| attr(t, "bus")) != Some(bus);
        if bus_changed {
            // Allocate before touching the tree so an exhausted naming
            // scheme leaves the document unmodified.
            let new_target = next_available_target(&update.existing_targets, bus)?;
            if let Some(target_elem) = xml::find_optional_child_mut(disk, "target")? {
                target_elem
                    .attributes
                    .insert("bus".to_string(), bus.to_string());
                target_elem.attributes.insert("dev".to_string(), new_target);
            }
            // A slot address assigned for the old bus is invalid on the new
            // one; libvirt assigns a fresh address on define.
            disk.take_child("address");
        }
    }

    if let Some(cache) = update.cache.as_deref() {
        let driver = xml::ensure_child(disk, "driver")?;
        driver
            .attributes
            .insert("cache".to_string(), cache.to_string());
    }

    Ok(())
}

/// Add or remove an empty marker child (`<readonly/>`, `<shareable/>`) so
/// its presence matches `desired`.
fn set_marker(disk: &mut Element, tag: &str, desired: bool) -> Result<(), VirtDomError> {
    let present = xml::find_optional_child(disk, tag)?.is_some();
    if desired && !present {
        disk.children.push(XMLNode::Element(Element::new(tag)));
    } else if !desired && present {
        disk.take_child(tag);
    }
    Ok(())
}
