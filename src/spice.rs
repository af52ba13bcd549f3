//! SPICE-to-VNC compatibility rewrite.
//!
//! Machine types on newer hosts no longer ship SPICE support; a domain
//! configured with SPICE display devices fails to start there.  This rewrite
//! strips the SPICE device set and substitutes a supported equivalent
//! (see <https://access.redhat.com/solutions/6955095>):
//!
//! - spice audio, spicevmc redirdev and spicevmc channel devices are removed,
//! - qxl video models are downgraded to vga,
//! - the spice graphics device becomes a vnc one, unless a vnc device already
//!   exists, in which case the spice device is simply dropped.
//!
//! Running the rewrite on an already-migrated document changes nothing.

use xmltree::XMLNode;

use crate::error::VirtDomError;
use crate::xml::{self, attr};

/// Replace the legacy SPICE display/audio/channel configuration with a VNC
/// equivalent.  Idempotent.
pub fn replace_spice(dom_xml: &str) -> Result<String, VirtDomError> {
    tracing::debug!(xml = dom_xml, "replace_spice original");

    let mut root = xml::parse_document(dom_xml)?;

    if let Some(devices) = xml::find_optional_child_mut(&mut root, "devices")? {
        devices.children.retain(|node| {
            let Some(elem) = node.as_element() else {
                return true;
            };
            let spice_only = (elem.name == "audio" && attr(elem, "type") == Some("spice"))
                || (elem.name == "redirdev" && attr(elem, "type") == Some("spicevmc"))
                || (elem.name == "channel" && attr(elem, "type") == Some("spicevmc"));
            !spice_only
        });

        for node in devices.children.iter_mut() {
            let Some(video) = node.as_mut_element() else {
                continue;
            };
            if video.name != "video" {
                continue;
            }
            let Some(model) = xml::find_optional_child_mut(video, "model")? else {
                continue;
            };
            if attr(model, "type") == Some("qxl") {
                // qxl-specific attributes (ram, vram, vgamem, heads, …) make
                // no sense on vga; only the primary flag carries over.
                model.attributes.retain(|name, _| name.as_str() == "primary");
                model
                    .attributes
                    .insert("type".to_string(), "vga".to_string());
            }
        }

        let has_vnc = devices
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .any(|e| e.name == "graphics" && attr(e, "type") == Some("vnc"));

        if has_vnc {
            // A second display device would conflict, drop the spice one.
            devices.children.retain(|node| {
                !node
                    .as_element()
                    .is_some_and(|e| e.name == "graphics" && attr(e, "type") == Some("spice"))
            });
        } else {
            for node in devices.children.iter_mut() {
                let Some(graphics) = node.as_mut_element() else {
                    continue;
                };
                if graphics.name != "graphics" || attr(graphics, "type") != Some("spice") {
                    continue;
                }
                graphics
                    .attributes
                    .insert("type".to_string(), "vnc".to_string());
                // -1 asks libvirt to auto-assign the port
                graphics
                    .attributes
                    .insert("port".to_string(), "-1".to_string());
                graphics.take_child("image");
            }
        }
    }

    let result = xml::serialize_document(&root)?;
    tracing::debug!(xml = result, "replace_spice updated");
    Ok(result)
}
