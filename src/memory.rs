//! Offline maximum-memory edit.

use xmltree::XMLNode;

use crate::error::VirtDomError;
use crate::xml;

/// Set the domain's maximum memory, in KiB.
///
/// Rewrites the text content of the `<memory>` element; its attributes
/// (the `unit`) stay as they are.
pub fn update_max_memory(dom_xml: &str, max_memory_kib: u64) -> Result<String, VirtDomError> {
    let mut root = xml::parse_document(dom_xml)?;

    let Some(memory) = xml::find_optional_child_mut(&mut root, "memory")? else {
        return Err(VirtDomError::MalformedDocument {
            reason: "domain has no memory element".to_string(),
        });
    };
    memory.children.clear();
    memory
        .children
        .push(XMLNode::Text(max_memory_kib.to_string()));

    xml::serialize_document(&root)
}
