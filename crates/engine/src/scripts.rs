//! Script normalization for hosts with the inert-inserted-script quirk: a
//! `<script>` arriving in merged content must be rebuilt as a fresh element
//! before the host will execute it. The rebuild is idempotent per physical
//! node via a marker attribute, and the whole pass is a no-op unless the
//! quirk is enabled in `Options`.

use dom::{Document, Id, Node};

pub const SCRIPT_PROCESSED_ATTR: &str = "data-seam-script-processed";

pub(crate) fn normalize_inserted(document: &mut Document, root: Id, enabled: bool) {
    if !enabled {
        return;
    }
    let scripts = {
        let Some(node) = document.find_node(root) else {
            return;
        };
        let mut scripts = Vec::new();
        collect_scripts(node, &mut scripts);
        scripts
    };
    for script_id in scripts {
        let rebuilt = {
            let Some(node) = document.find_node(script_id) else {
                continue;
            };
            if node.has_attr(SCRIPT_PROCESSED_ATTR) {
                // second sighting: the rebuilt node re-entering the document
                document.remove_attr_node(script_id, SCRIPT_PROCESSED_ATTR);
                continue;
            }
            rebuild_script(node)
        };
        document.replace_node(script_id, rebuilt);
    }
}

fn collect_scripts(node: &Node, out: &mut Vec<Id>) {
    if node.is_element_named("script") {
        out.push(node.id());
    }
    for c in node.children() {
        collect_scripts(c, out);
    }
}

fn rebuild_script(node: &Node) -> Node {
    let Node::Element {
        attributes, children, ..
    } = node
    else {
        unreachable!("collect_scripts only yields script elements");
    };
    let mut attributes = attributes.clone();
    attributes.push((SCRIPT_PROCESSED_ATTR.to_string(), Some(String::new())));
    Node::Element {
        id: Id::UNSET,
        name: "script".to_string(),
        attributes,
        children: children.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_quirk_is_a_no_op() {
        let mut doc = Document::parse(r#"<div id=d><script>x()</script></div>"#);
        doc.discard_journal();
        let root = doc.root().id();
        normalize_inserted(&mut doc, root, false);
        assert!(doc.take_journal().is_empty());
    }

    #[test]
    fn rebuilds_each_script_exactly_once() {
        let mut doc = Document::parse(r#"<div id=d><script src="/a.js">x()</script></div>"#);
        doc.discard_journal();
        let root = doc.root().id();

        normalize_inserted(&mut doc, root, true);
        let script = doc.find("d").unwrap().children()[0].clone();
        assert!(script.has_attr(SCRIPT_PROCESSED_ATTR));
        assert_eq!(script.attr("src"), Some("/a.js"));
        assert_eq!(script.text_content(), "x()");
        // the rebuild itself journals a removal and an addition
        assert_eq!(doc.take_journal().len(), 2);

        // the rebuilt node's own journal record only strips the marker
        let script_id = doc.find("d").unwrap().children()[0].id();
        normalize_inserted(&mut doc, script_id, true);
        let script = &doc.find("d").unwrap().children()[0];
        assert!(!script.has_attr(SCRIPT_PROCESSED_ATTR));
        assert!(doc.take_journal().is_empty());
    }
}
