//! Document accessor layer: parse a domain document into a mutable element
//! tree, look up optional single children, serialize back to text.
//!
//! Children of a given tag are expected to be unique within their parent in
//! libvirt domain XML.  The lookup helpers enforce that: zero matches is
//! `None`, one match is `Some`, more than one is an `AmbiguousChild` fault.

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::VirtDomError;

/// Parse domain XML into its root element.
pub fn parse_document(xml: &str) -> Result<Element, VirtDomError> {
    Element::parse(xml.as_bytes()).map_err(|e| VirtDomError::MalformedDocument {
        reason: e.to_string(),
    })
}

/// Serialize a document back to text, indented.
///
/// Output is deterministic: attribute order is preserved by the tree, so
/// parse → mutate → serialize cycles are self-consistent.
pub fn serialize_document(root: &Element) -> Result<String, VirtDomError> {
    let mut out = Vec::new();
    root.write_with_config(
        &mut out,
        EmitterConfig {
            perform_indent: true,
            ..Default::default()
        },
    )
    .map_err(|source| VirtDomError::Serialize { source })?;
    String::from_utf8(out).map_err(|source| VirtDomError::NonUtf8Output { source })
}

/// Look up the single optional `tag` child of `parent`.
pub fn find_optional_child<'a>(
    parent: &'a Element,
    tag: &str,
) -> Result<Option<&'a Element>, VirtDomError> {
    let count = count_children(parent, tag);
    if count > 1 {
        return Err(VirtDomError::AmbiguousChild {
            tag: tag.to_string(),
            count,
        });
    }
    Ok(parent
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find(|c| c.name == tag))
}

/// Mutable twin of [`find_optional_child`].
pub fn find_optional_child_mut<'a>(
    parent: &'a mut Element,
    tag: &str,
) -> Result<Option<&'a mut Element>, VirtDomError> {
    let count = count_children(parent, tag);
    if count > 1 {
        return Err(VirtDomError::AmbiguousChild {
            tag: tag.to_string(),
            count,
        });
    }
    Ok(parent
        .children
        .iter_mut()
        .filter_map(XMLNode::as_mut_element)
        .find(|c| c.name == tag))
}

/// Look up the single `tag` child of `parent`, creating it if absent.
pub fn ensure_child<'a>(
    parent: &'a mut Element,
    tag: &str,
) -> Result<&'a mut Element, VirtDomError> {
    let count = count_children(parent, tag);
    if count > 1 {
        return Err(VirtDomError::AmbiguousChild {
            tag: tag.to_string(),
            count,
        });
    }
    if count == 0 {
        parent.children.push(XMLNode::Element(Element::new(tag)));
    }
    Ok(parent
        .children
        .iter_mut()
        .filter_map(XMLNode::as_mut_element)
        .find(|c| c.name == tag)
        .expect("child exists after ensure"))
}

/// Attribute value of `elem`, if set.
pub fn attr<'a>(elem: &'a Element, name: &str) -> Option<&'a str> {
    elem.attributes.get(name).map(String::as_str)
}

fn count_children(parent: &Element, tag: &str) -> usize {
    parent
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|c| c.name == tag)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_malformed_text() {
        assert!(matches!(
            parse_document("<domain><devices></domain>"),
            Err(VirtDomError::MalformedDocument { .. })
        ));
        assert!(matches!(
            parse_document("not xml at all"),
            Err(VirtDomError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn find_optional_child_absent_and_present() {
        let root = parse_document("<domain><devices/></domain>").unwrap();
        assert!(find_optional_child(&root, "devices").unwrap().is_some());
        assert!(find_optional_child(&root, "os").unwrap().is_none());
    }

    #[test]
    fn find_optional_child_faults_on_duplicates() {
        let root = parse_document("<domain><devices/><devices/></domain>").unwrap();
        assert!(matches!(
            find_optional_child(&root, "devices"),
            Err(VirtDomError::AmbiguousChild { count: 2, .. })
        ));
    }

    #[test]
    fn ensure_child_creates_missing_child() {
        let mut root = parse_document("<disk/>").unwrap();
        ensure_child(&mut root, "source")
            .unwrap()
            .attributes
            .insert("file".to_string(), "/a.iso".to_string());
        let source = find_optional_child(&root, "source").unwrap().unwrap();
        assert_eq!(attr(source, "file"), Some("/a.iso"));
    }

    #[test]
    fn serialize_preserves_multibyte_text() {
        let xml = r#"<domain><name>vm-café</name><memory unit="KiB">1024</memory></domain>"#;
        let out = serialize_document(&parse_document(xml).unwrap()).unwrap();
        assert!(out.contains("vm-café"));
        let root = parse_document(&out).unwrap();
        let name = find_optional_child(&root, "name").unwrap().unwrap();
        assert_eq!(name.get_text().as_deref(), Some("vm-café"));
    }

    #[test]
    fn serialize_is_self_consistent() {
        let xml = r#"<domain type="kvm"><devices><disk type="file"><target dev="vda" bus="virtio"/></disk></devices></domain>"#;
        let once = serialize_document(&parse_document(xml).unwrap()).unwrap();
        let twice = serialize_document(&parse_document(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }
}
