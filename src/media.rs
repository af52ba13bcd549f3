//! Disk media change: insert new backing media into a disk or eject it.

use serde::{Deserialize, Serialize};

use crate::error::VirtDomError;
use crate::xml::{self, attr};

/// New backing media for a disk, addressed either by file path or by a
/// storage pool volume.  The two modes are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSource {
    File { file: String },
    Volume { pool: String, volume: String },
}

/// Change the media of the disk whose target device is `target`.
///
/// With `eject` the disk's `<source>` is dropped; otherwise a `<source>` is
/// ensured and rewritten to point at `source`.  Writing one addressing mode
/// clears the attributes of the other, so a disk never carries both a file
/// path and a pool/volume reference.
///
/// A `target` that matches no disk is a silent no-op: the input document is
/// returned unchanged.
pub fn change_media(
    dom_xml: &str,
    target: &str,
    eject: bool,
    source: Option<&MediaSource>,
) -> Result<String, VirtDomError> {
    let mut root = xml::parse_document(dom_xml)?;
    let mut matched = false;

    if let Some(devices) = xml::find_optional_child_mut(&mut root, "devices")? {
        for node in devices.children.iter_mut() {
            let Some(disk) = node.as_mut_element() else {
                continue;
            };
            if disk.name != "disk" || !disk_has_target(disk, target)? {
                continue;
            }
            matched = true;

            if eject {
                disk.take_child("source");
                continue;
            }

            let source_elem = xml::ensure_child(disk, "source")?;
            match source {
                Some(MediaSource::File { file }) => {
                    source_elem.attributes.shift_remove("pool");
                    source_elem.attributes.shift_remove("volume");
                    source_elem
                        .attributes
                        .insert("file".to_string(), file.clone());
                }
                Some(MediaSource::Volume { pool, volume }) => {
                    source_elem.attributes.shift_remove("file");
                    source_elem
                        .attributes
                        .insert("pool".to_string(), pool.clone());
                    source_elem
                        .attributes
                        .insert("volume".to_string(), volume.clone());
                }
                None => {}
            }
        }
    }

    if !matched {
        return Ok(dom_xml.to_string());
    }
    xml::serialize_document(&root)
}

pub(crate) fn disk_has_target(
    disk: &xmltree::Element,
    target: &str,
) -> Result<bool, VirtDomError> {
    Ok(xml::find_optional_child(disk, "target")?.and_then(|t| attr(t, "dev")) == Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<domain>
      <devices>
        <disk type="file" device="cdrom">
          <target dev="sda" bus="sata"/>
          <source file="/a.iso"/>
        </disk>
        <disk type="file" device="disk">
          <target dev="vda" bus="virtio"/>
          <source file="/root.qcow2"/>
        </disk>
      </devices>
    </domain>"#;

    fn disk_source(doc: &str, target: &str) -> Option<xmltree::Element> {
        let root = xml::parse_document(doc).unwrap();
        let devices = xml::find_optional_child(&root, "devices").unwrap().unwrap();
        devices
            .children
            .iter()
            .filter_map(xmltree::XMLNode::as_element)
            .filter(|d| d.name == "disk")
            .find(|d| disk_has_target(d, target).unwrap())
            .and_then(|d| xml::find_optional_child(d, "source").unwrap().cloned())
    }

    #[test]
    fn eject_removes_source() {
        let out = change_media(DOC, "sda", true, None).unwrap();
        assert!(disk_source(&out, "sda").is_none());
        // other disks untouched
        let other = disk_source(&out, "vda").unwrap();
        assert_eq!(attr(&other, "file"), Some("/root.qcow2"));
    }

    #[test]
    fn insert_file_after_eject() {
        let ejected = change_media(DOC, "sda", true, None).unwrap();
        let out = change_media(
            &ejected,
            "sda",
            false,
            Some(&MediaSource::File {
                file: "/b.iso".to_string(),
            }),
        )
        .unwrap();
        let source = disk_source(&out, "sda").unwrap();
        assert_eq!(attr(&source, "file"), Some("/b.iso"));
    }

    #[test]
    fn file_and_volume_addressing_stay_exclusive() {
        let volume = change_media(
            DOC,
            "sda",
            false,
            Some(&MediaSource::Volume {
                pool: "isos".to_string(),
                volume: "b.iso".to_string(),
            }),
        )
        .unwrap();
        let source = disk_source(&volume, "sda").unwrap();
        assert_eq!(attr(&source, "pool"), Some("isos"));
        assert_eq!(attr(&source, "volume"), Some("b.iso"));
        assert_eq!(attr(&source, "file"), None);

        let back_to_file = change_media(
            &volume,
            "sda",
            false,
            Some(&MediaSource::File {
                file: "/c.iso".to_string(),
            }),
        )
        .unwrap();
        let source = disk_source(&back_to_file, "sda").unwrap();
        assert_eq!(attr(&source, "file"), Some("/c.iso"));
        assert_eq!(attr(&source, "pool"), None);
        assert_eq!(attr(&source, "volume"), None);
    }

    #[test]
    fn unknown_target_returns_input_unchanged() {
        let out = change_media(DOC, "sdz", true, None).unwrap();
        assert_eq!(out, DOC);
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            change_media("<domain><devices>", "sda", true, None),
            Err(VirtDomError::MalformedDocument { .. })
        ));
    }
}
