//! Element registry and lifecycle: depth-first scans that register
//! action-declaring elements, the matching unscans, and the per-element
//! registration record (frozen config plus the element interceptor bag).

use std::collections::HashMap;

use dom::{Document, Id, Node};

use crate::attrs::{self, TriggerConfig};
use crate::callbacks::{DocumentCallbacks, ElementCallbacks};
use crate::error::EngineError;

pub(crate) struct Registration {
    pub(crate) config: TriggerConfig,
    pub(crate) callbacks: ElementCallbacks,
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<String, Registration>,
}

impl Registry {
    pub(crate) fn get(&self, element_id: &str) -> Option<&Registration> {
        self.entries.get(element_id)
    }

    pub(crate) fn get_mut(&mut self, element_id: &str) -> Option<&mut Registration> {
        self.entries.get_mut(element_id)
    }

    pub(crate) fn contains(&self, element_id: &str) -> bool {
        self.entries.contains_key(element_id)
    }

    /// Register or re-register. Re-registration refreshes the frozen config
    /// but keeps the element's interceptor bag.
    pub(crate) fn upsert(&mut self, element_id: String, config: TriggerConfig) {
        use std::collections::hash_map::Entry;
        match self.entries.entry(element_id) {
            Entry::Occupied(mut occupied) => occupied.get_mut().config = config,
            Entry::Vacant(vacant) => {
                vacant.insert(Registration {
                    config,
                    callbacks: ElementCallbacks::default(),
                });
            }
        }
    }

    pub(crate) fn remove(&mut self, element_id: &str) {
        self.entries.remove(element_id);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Depth-first scan from `root` (inclusive). An effective `ignore` on the
/// root's ancestor chain, or on any node during descent, prunes that subtree.
/// Returns the element ids registered, in document order.
pub(crate) fn scan_from(
    document: &mut Document,
    registry: &mut Registry,
    callbacks: &mut DocumentCallbacks,
    root: Id,
) -> Result<Vec<String>, EngineError> {
    let candidates = {
        let Some(path) = document.path_to_node(root) else {
            return Ok(Vec::new());
        };
        for cut in 0..path.len() {
            let ancestor = document.node_at(&path[..cut]).expect("prefix of a resolved path");
            if attrs::ignore_flag(ancestor) == Some(true) {
                return Ok(Vec::new());
            }
        }
        let node = document.node_at(&path).expect("path just resolved");
        let mut candidates = Vec::new();
        collect_candidates(node, &mut candidates);
        candidates
    };

    let mut registered = Vec::with_capacity(candidates.len());
    for node_id in candidates {
        if let Some(element_id) = register_element(document, registry, callbacks, node_id, true)? {
            registered.push(element_id);
        }
    }
    Ok(registered)
}

fn collect_candidates(node: &Node, out: &mut Vec<Id>) {
    if attrs::ignore_flag(node) == Some(true) {
        return;
    }
    if node.attr(attrs::ACTION_ATTR).is_some() {
        out.push(node.id());
    }
    for c in node.children() {
        collect_candidates(c, out);
    }
}

/// Register one element: consult the cancellable initialize hook, parse and
/// freeze its configuration, write the defaulted trigger event back onto the
/// element, then notify. `consult_before_hook` is false on the hoist path,
/// which re-registers explicitly.
pub(crate) fn register_element(
    document: &mut Document,
    registry: &mut Registry,
    callbacks: &mut DocumentCallbacks,
    node_id: Id,
    consult_before_hook: bool,
) -> Result<Option<String>, EngineError> {
    let config = {
        let Some(node) = document.find_node(node_id) else {
            return Ok(None);
        };
        if consult_before_hook
            && let Some(cb) = callbacks.before_initialize_element.as_mut()
            && !cb(node)
        {
            return Ok(None);
        }
        TriggerConfig::from_element(node)?
    };
    document.set_attr_node(node_id, attrs::TRIGGER_ATTR, Some(config.trigger()));
    let element_id = config.id().to_string();
    registry.upsert(element_id.clone(), config);
    if let Some(node) = document.find_node(node_id)
        && let Some(cb) = callbacks.after_initialize_element.as_mut()
    {
        cb(node);
    }
    Ok(Some(element_id))
}

/// Detach registrations across a subtree that has left the document.
pub(crate) fn unscan_detached(registry: &mut Registry, node: &Node) {
    if let Node::Element { .. } = node
        && let Some(element_id) = node.html_id()
    {
        registry.remove(element_id);
    }
    for c in node.children() {
        unscan_detached(registry, c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Document;

    fn scan_all(document: &mut Document, registry: &mut Registry) -> Result<Vec<String>, EngineError> {
        let root = document.root().id();
        scan_from(document, registry, &mut DocumentCallbacks::default(), root)
    }

    #[test]
    fn registers_action_elements_in_document_order() {
        let mut doc = Document::parse(concat!(
            r#"<div><button id=b1 data-seam-action="/one"></button></div>"#,
            r#"<form id=f1 data-seam-action="/two"></form>"#,
        ));
        let mut registry = Registry::default();
        let ids = scan_all(&mut doc, &mut registry).expect("valid document");
        assert_eq!(ids, vec!["b1".to_string(), "f1".to_string()]);
        assert_eq!(registry.get("f1").unwrap().config.trigger(), "submit");
        // the defaulted trigger is written back onto the element
        assert_eq!(doc.find("b1").unwrap().attr(attrs::TRIGGER_ATTR), Some("click"));
    }

    #[test]
    fn ignored_subtrees_are_skipped_unless_explicitly_false() {
        let mut doc = Document::parse(concat!(
            r#"<div data-seam-ignore><button id=skip data-seam-action="/x"></button></div>"#,
            r#"<div data-seam-ignore=false><button id=keep data-seam-action="/x"></button></div>"#,
        ));
        let mut registry = Registry::default();
        let ids = scan_all(&mut doc, &mut registry).expect("valid document");
        assert_eq!(ids, vec!["keep".to_string()]);
        assert!(!registry.contains("skip"));
    }

    #[test]
    fn subtree_scan_honors_ancestor_ignore() {
        let mut doc = Document::parse(
            r#"<div data-seam-ignore><section id=s><button id=b data-seam-action="/x"></button></section></div>"#,
        );
        let root = doc.find("s").unwrap().id();
        let mut registry = Registry::default();
        let ids = scan_from(&mut doc, &mut registry, &mut DocumentCallbacks::default(), root)
            .expect("scan succeeds");
        assert!(ids.is_empty());
    }

    #[test]
    fn missing_identifier_fails_the_scan() {
        let mut doc = Document::parse(r#"<button data-seam-action="/x"></button>"#);
        let mut registry = Registry::default();
        assert!(matches!(
            scan_all(&mut doc, &mut registry),
            Err(EngineError::MissingIdentifier { .. })
        ));
    }

    #[test]
    fn before_initialize_hook_cancels_registration() {
        let mut doc = Document::parse(r#"<button id=b data-seam-action="/x"></button>"#);
        let mut registry = Registry::default();
        let mut callbacks = DocumentCallbacks::default();
        callbacks.before_initialize_element = Some(Box::new(|_| false));
        let root = doc.root().id();
        let ids = scan_from(&mut doc, &mut registry, &mut callbacks, root).expect("scan succeeds");
        assert!(ids.is_empty());
        assert!(!registry.contains("b"));
    }

    #[test]
    fn unscan_detached_drops_subtree_registrations() {
        let mut doc = Document::parse(
            r#"<div id=host><button id=b data-seam-action="/x"></button></div>"#,
        );
        let mut registry = Registry::default();
        scan_all(&mut doc, &mut registry).expect("valid document");
        assert!(registry.contains("b"));

        doc.remove_element("host");
        let journal = doc.take_journal();
        let dom::Mutation::Removed(node) = &journal[0] else {
            panic!("expected a removal record");
        };
        unscan_detached(&mut registry, node);
        assert!(!registry.contains("b"));
    }
}
