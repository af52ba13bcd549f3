//! Global boot-priority recomputation.
//!
//! The console shows one ordered list of bootable devices; this module
//! rewrites the per-device `<boot order="N"/>` annotations to match it.
//! Four device families participate: disks, network interfaces,
//! host-passthrough devices (five sub-types, each with its own identity
//! key) and USB-redirection devices.  A device named in the desired order
//! gets `order = index + 1`; every other device loses its annotation.

use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::error::VirtDomError;
use crate::xml::{self, attr};

/// One entry of the desired boot order, carrying the identity key used to
/// match it back to a device element in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootOrderDevice {
    /// Disks match by target device name (`<target dev=…>`).
    Disk { target: String },
    /// Network interfaces match by MAC address.
    Network { mac: String },
    /// USB-redirection devices match by port address.
    Redirdev { port: String },
    /// Host-passthrough devices match by a sub-type-specific key.
    Hostdev(HostdevIdentity),
}

/// Identity key of a host-passthrough device, per hostdev sub-type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostdevIdentity {
    /// USB device identified by vendor and product ID.
    Usb {
        vendor_id: String,
        product_id: String,
    },
    /// USB device without vendor/product IDs, identified by port address.
    UsbPort { port: String },
    Pci {
        domain: String,
        bus: String,
        slot: String,
        function: String,
    },
    /// SCSI device on a host adapter.
    Scsi {
        bus: String,
        target: String,
        unit: String,
        adapter: String,
    },
    /// SCSI device reached over a protocol (iSCSI-style source).
    ScsiIscsi { protocol: String, name: String },
    ScsiHost { wwpn: String, protocol: String },
    Mdev { uuid: String },
}

/// Rewrite all boot annotations so they reflect `devices` (index 0 = boots
/// first).
///
/// A non-empty desired order supersedes any legacy `<boot dev=…>` hints in
/// the `<os>` section, which are removed.  Devices listed in `devices` but
/// absent from the document are ignored; document devices not listed lose
/// their annotation.  When duplicate entries match the same device, the
/// first entry in the desired order is authoritative.
pub fn update_boot_order(
    dom_xml: &str,
    devices: &[BootOrderDevice],
) -> Result<String, VirtDomError> {
    let mut root = xml::parse_document(dom_xml)?;

    // Only the per-device boot order shall be used, boot options in <os>
    // therefore have to go.
    if !devices.is_empty()
        && let Some(os) = xml::find_optional_child_mut(&mut root, "os")?
    {
        while os.take_child("boot").is_some() {}
    }

    if let Some(devices_elem) = xml::find_optional_child_mut(&mut root, "devices")? {
        for node in devices_elem.children.iter_mut() {
            let Some(dev) = node.as_mut_element() else {
                continue;
            };
            let key = match dev.name.as_str() {
                "disk" => disk_identity(dev)?,
                "interface" => interface_identity(dev)?,
                "redirdev" => redirdev_identity(dev)?,
                "hostdev" => hostdev_identity(dev)?.map(BootOrderDevice::Hostdev),
                _ => continue,
            };
            // First match in the desired order is authoritative.
            let index = key.and_then(|k| devices.iter().position(|d| *d == k));
            set_annotation(dev, index)?;
        }
    }

    xml::serialize_document(&root)
}

fn set_annotation(dev: &mut Element, index: Option<usize>) -> Result<(), VirtDomError> {
    match index {
        Some(i) => {
            let boot = xml::ensure_child(dev, "boot")?;
            boot.attributes
                .insert("order".to_string(), (i + 1).to_string());
        }
        None => {
            dev.take_child("boot");
        }
    }
    Ok(())
}

fn disk_identity(disk: &Element) -> Result<Option<BootOrderDevice>, VirtDomError> {
    Ok(xml::find_optional_child(disk, "target")?
        .and_then(|t| attr(t, "dev"))
        .map(|dev| BootOrderDevice::Disk {
            target: dev.to_string(),
        }))
}

fn interface_identity(iface: &Element) -> Result<Option<BootOrderDevice>, VirtDomError> {
    Ok(xml::find_optional_child(iface, "mac")?
        .and_then(|m| attr(m, "address"))
        .map(|mac| BootOrderDevice::Network {
            mac: mac.to_string(),
        }))
}

fn redirdev_identity(redirdev: &Element) -> Result<Option<BootOrderDevice>, VirtDomError> {
    Ok(xml::find_optional_child(redirdev, "address")?
        .and_then(|a| attr(a, "port"))
        .map(|port| BootOrderDevice::Redirdev {
            port: port.to_string(),
        }))
}

/// Compute a hostdev's identity from its sub-type.  Sub-types without a
/// matching strategy (or nodes missing their key elements) have no identity
/// and therefore never match.
fn hostdev_identity(hostdev: &Element) -> Result<Option<HostdevIdentity>, VirtDomError> {
    let Some(source) = xml::find_optional_child(hostdev, "source")? else {
        return Ok(None);
    };

    match attr(hostdev, "type") {
        Some("usb") => {
            let vendor = xml::find_optional_child(source, "vendor")?.and_then(|v| attr(v, "id"));
            let product = xml::find_optional_child(source, "product")?.and_then(|p| attr(p, "id"));
            if let (Some(vendor_id), Some(product_id)) = (vendor, product) {
                return Ok(Some(HostdevIdentity::Usb {
                    vendor_id: vendor_id.to_string(),
                    product_id: product_id.to_string(),
                }));
            }
            Ok(xml::find_optional_child(hostdev, "address")?
                .and_then(|a| attr(a, "port"))
                .map(|port| HostdevIdentity::UsbPort {
                    port: port.to_string(),
                }))
        }
        Some("pci") => {
            let Some(address) = xml::find_optional_child(source, "address")? else {
                return Ok(None);
            };
            match (
                attr(address, "domain"),
                attr(address, "bus"),
                attr(address, "slot"),
                attr(address, "function"),
            ) {
                (Some(domain), Some(bus), Some(slot), Some(function)) => {
                    Ok(Some(HostdevIdentity::Pci {
                        domain: domain.to_string(),
                        bus: bus.to_string(),
                        slot: slot.to_string(),
                        function: function.to_string(),
                    }))
                }
                _ => Ok(None),
            }
        }
        Some("scsi") => {
            let address = xml::find_optional_child(source, "address")?;
            let adapter = xml::find_optional_child(source, "adapter")?;
            if let (Some(address), Some(adapter)) = (address, adapter)
                && let (Some(bus), Some(target), Some(unit), Some(name)) = (
                    attr(address, "bus"),
                    attr(address, "target"),
                    attr(address, "unit"),
                    attr(adapter, "name"),
                )
            {
                return Ok(Some(HostdevIdentity::Scsi {
                    bus: bus.to_string(),
                    target: target.to_string(),
                    unit: unit.to_string(),
                    adapter: name.to_string(),
                }));
            }
            if let Some(address) = address
                && let (Some(protocol), Some(name)) =
                    (attr(address, "protocol"), attr(address, "name"))
            {
                return Ok(Some(HostdevIdentity::ScsiIscsi {
                    protocol: protocol.to_string(),
                    name: name.to_string(),
                }));
            }
            Ok(None)
        }
        Some("scsi_host") => match (attr(source, "wwpn"), attr(source, "protocol")) {
            (Some(wwpn), Some(protocol)) => Ok(Some(HostdevIdentity::ScsiHost {
                wwpn: wwpn.to_string(),
                protocol: protocol.to_string(),
            })),
            _ => Ok(None),
        },
        Some("mdev") => Ok(xml::find_optional_child(source, "address")?
            .and_then(|a| attr(a, "uuid"))
            .map(|uuid| HostdevIdentity::Mdev {
                uuid: uuid.to_string(),
            })),
        _ => Ok(None),
    }
}
