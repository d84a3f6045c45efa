//! Owned document: tree, node identity, mutation journal, and the form value
//! overlay that carries live control state beside the markup.
//!
//! Invariants:
//! - Every node in the document has a non-UNSET, never-reused `Id`.
//! - Adopted nodes always get fresh identity, even if they carried ids before.
//! - Child-list mutations are journaled in the order they happen; removals
//!   journal the detached subtree, additions journal the adopted root's `Id`.
//! - Attribute and text edits are not journaled (child-list subscription only).

use std::collections::HashMap;

use crate::builder::build_tree;
use crate::tokenizer::tokenize;
use crate::types::{Id, Node, NodeId};

/// One child-list change, in document order as it happened.
#[derive(Debug)]
pub enum Mutation {
    /// Detached subtree, ownership transferred to the journal.
    Removed(Node),
    /// Root of a newly inserted subtree, alive in the document.
    Added(Id),
}

#[derive(Clone, Debug, PartialEq)]
pub enum FormValue {
    Text(String),
    File(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPosition {
    BeforeBegin,
    AfterBegin,
    BeforeEnd,
    AfterEnd,
}

#[derive(Debug, Default)]
pub(crate) struct DocState {
    pub(crate) next_id: NodeId,
    pub(crate) journal: Vec<Mutation>,
    pub(crate) values: HashMap<Id, String>,
    pub(crate) checks: HashMap<Id, bool>,
}

impl DocState {
    pub(crate) fn alloc(&mut self) -> Id {
        let id = Id(self.next_id);
        self.next_id += 1;
        id
    }
}

#[derive(Debug)]
pub struct Document {
    root: Node,
    state: DocState,
    active_element: Option<String>,
}

impl Document {
    pub fn parse(html: &str) -> Document {
        let mut doc = Document {
            root: build_tree(tokenize(html)),
            state: DocState {
                next_id: 1,
                ..DocState::default()
            },
            active_element: None,
        };
        let mut root = std::mem::replace(&mut doc.root, Node::text(""));
        adopt(&mut doc.state, &mut root);
        doc.root = root;
        doc.state.journal.clear();
        doc
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    // --- lookup ---

    pub fn path_to(&self, html_id: &str) -> Option<Vec<usize>> {
        find_path(&self.root, &|n| n.html_id() == Some(html_id))
    }

    pub fn path_to_node(&self, id: Id) -> Option<Vec<usize>> {
        if id == Id::UNSET {
            return None;
        }
        find_path(&self.root, &|n| n.id() == id)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let mut node = &self.root;
        for &idx in path {
            node = node.children().get(idx)?;
        }
        Some(node)
    }

    pub fn find(&self, html_id: &str) -> Option<&Node> {
        self.path_to(html_id).and_then(|p| self.node_at(&p))
    }

    pub fn find_node(&self, id: Id) -> Option<&Node> {
        self.path_to_node(id).and_then(|p| self.node_at(&p))
    }

    /// Nearest ancestor-or-self of `html_id` matching the predicate.
    pub fn closest(&self, html_id: &str, pred: impl Fn(&Node) -> bool) -> Option<&Node> {
        let path = self.path_to(html_id)?;
        for cut in (0..=path.len()).rev() {
            let node = self.node_at(&path[..cut])?;
            if matches!(node, Node::Element { .. }) && pred(node) {
                return Some(node);
            }
        }
        None
    }

    /// Form owner: the element's explicit `form` attribute reference wins,
    /// else the nearest ancestor-or-self `<form>`.
    pub fn enclosing_form(&self, html_id: &str) -> Option<&Node> {
        let node = self.find(html_id)?;
        if let Some(form_ref) = node.attr("form") {
            let form_ref = form_ref.trim();
            if !form_ref.is_empty()
                && let Some(form) = self.find(form_ref)
                && form.is_element_named("form")
            {
                return Some(form);
            }
        }
        self.closest(html_id, |n| n.is_element_named("form"))
    }

    // --- child-list mutations ---

    pub fn remove_element(&mut self, html_id: &str) -> bool {
        let Some(path) = self.path_to(html_id) else {
            return false;
        };
        let Some((&idx, parent_path)) = path.split_last() else {
            return false;
        };
        let parent = node_at_mut(&mut self.root, parent_path);
        let children = parent.children_mut().expect("parent of a live node holds children");
        let removed = children.remove(idx);
        self.state.journal.push(Mutation::Removed(removed));
        true
    }

    pub fn insert_adjacent(&mut self, target_html_id: &str, position: InsertPosition, nodes: Vec<Node>) -> bool {
        let Some(path) = self.path_to(target_html_id) else {
            return false;
        };
        let mut nodes = nodes;
        let mut added = Vec::with_capacity(nodes.len());
        for n in &mut nodes {
            adopt(&mut self.state, n);
            added.push(n.id());
        }
        match position {
            InsertPosition::AfterBegin | InsertPosition::BeforeEnd => {
                let target = node_at_mut(&mut self.root, &path);
                let Some(children) = target.children_mut() else {
                    return false;
                };
                match position {
                    InsertPosition::AfterBegin => {
                        for (k, n) in nodes.into_iter().enumerate() {
                            children.insert(k, n);
                        }
                    }
                    _ => children.extend(nodes),
                }
            }
            InsertPosition::BeforeBegin | InsertPosition::AfterEnd => {
                let Some((&idx, parent_path)) = path.split_last() else {
                    return false;
                };
                let parent = node_at_mut(&mut self.root, parent_path);
                let children = parent.children_mut().expect("parent of a live node holds children");
                let base = match position {
                    InsertPosition::BeforeBegin => idx,
                    _ => idx + 1,
                };
                for (k, n) in nodes.into_iter().enumerate() {
                    children.insert(base + k, n);
                }
            }
        }
        for id in added {
            self.state.journal.push(Mutation::Added(id));
        }
        true
    }

    /// Whole-element replace: the target is removed and the nodes take its place.
    pub fn replace_element(&mut self, target_html_id: &str, nodes: Vec<Node>) -> bool {
        let Some(path) = self.path_to(target_html_id) else {
            return false;
        };
        let Some((&idx, parent_path)) = path.split_last() else {
            return false;
        };
        let mut nodes = nodes;
        let mut added = Vec::with_capacity(nodes.len());
        for n in &mut nodes {
            adopt(&mut self.state, n);
            added.push(n.id());
        }
        let parent = node_at_mut(&mut self.root, parent_path);
        let children = parent.children_mut().expect("parent of a live node holds children");
        let removed = children.remove(idx);
        for (k, n) in nodes.into_iter().enumerate() {
            children.insert(idx + k, n);
        }
        self.state.journal.push(Mutation::Removed(removed));
        for id in added {
            self.state.journal.push(Mutation::Added(id));
        }
        true
    }

    /// Replace one node by internal identity, keeping its position.
    pub fn replace_node(&mut self, id: Id, replacement: Node) -> bool {
        let Some(path) = self.path_to_node(id) else {
            return false;
        };
        let Some((&idx, parent_path)) = path.split_last() else {
            return false;
        };
        let mut replacement = replacement;
        adopt(&mut self.state, &mut replacement);
        let new_id = replacement.id();
        let parent = node_at_mut(&mut self.root, parent_path);
        let children = parent.children_mut().expect("parent of a live node holds children");
        let removed = std::mem::replace(&mut children[idx], replacement);
        self.state.journal.push(Mutation::Removed(removed));
        self.state.journal.push(Mutation::Added(new_id));
        true
    }

    pub fn replace_head(&mut self, title: &str) -> bool {
        let Some(path) = find_path(&self.root, &|n| n.is_element_named("head")) else {
            return false;
        };
        let title_node = Node::element("title", Vec::new(), vec![Node::text(title)]);
        self.replace_children_at(&path, vec![title_node]);
        true
    }

    pub fn replace_body(&mut self, nodes: Vec<Node>) -> bool {
        let Some(path) = find_path(&self.root, &|n| n.is_element_named("body")) else {
            return false;
        };
        self.replace_children_at(&path, nodes);
        true
    }

    fn replace_children_at(&mut self, path: &[usize], nodes: Vec<Node>) {
        let mut nodes = nodes;
        let mut added = Vec::with_capacity(nodes.len());
        for n in &mut nodes {
            adopt(&mut self.state, n);
            added.push(n.id());
        }
        let node = node_at_mut(&mut self.root, path);
        let Some(children) = node.children_mut() else {
            return;
        };
        let old = std::mem::replace(children, nodes);
        for o in old {
            self.state.journal.push(Mutation::Removed(o));
        }
        for id in added {
            self.state.journal.push(Mutation::Added(id));
        }
    }

    // --- attribute edits (not journaled) ---

    pub fn set_attr(&mut self, html_id: &str, name: &str, value: Option<&str>) -> bool {
        let Some(path) = self.path_to(html_id) else {
            return false;
        };
        node_at_mut(&mut self.root, &path).set_attr(name, value);
        true
    }

    pub fn set_attr_node(&mut self, id: Id, name: &str, value: Option<&str>) -> bool {
        let Some(path) = self.path_to_node(id) else {
            return false;
        };
        node_at_mut(&mut self.root, &path).set_attr(name, value);
        true
    }

    pub fn remove_attr_node(&mut self, id: Id, name: &str) -> bool {
        let Some(path) = self.path_to_node(id) else {
            return false;
        };
        node_at_mut(&mut self.root, &path).remove_attr(name);
        true
    }

    // --- journal ---

    pub fn take_journal(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.state.journal)
    }

    pub fn discard_journal(&mut self) {
        self.state.journal.clear();
    }

    // --- form value overlay ---

    pub fn set_value(&mut self, html_id: &str, value: &str) -> bool {
        let Some(node) = self.find(html_id) else {
            return false;
        };
        let id = node.id();
        self.state.values.insert(id, value.to_string());
        true
    }

    pub fn set_checked(&mut self, html_id: &str, checked: bool) -> bool {
        let Some(node) = self.find(html_id) else {
            return false;
        };
        let id = node.id();
        self.state.checks.insert(id, checked);
        true
    }

    /// Live value of a form control: overlay first, markup defaults second.
    pub fn current_value(&self, node: &Node) -> Option<String> {
        if let Some(v) = self.state.values.get(&node.id()) {
            return Some(v.clone());
        }
        match node.tag()? {
            "input" => Some(node.attr("value").unwrap_or("").to_string()),
            "textarea" => Some(node.text_content()),
            "select" => {
                let mut first = None;
                for opt in node.children().iter().filter(|c| c.is_element_named("option")) {
                    if first.is_none() {
                        first = Some(opt);
                    }
                    if opt.has_attr("selected") {
                        return Some(option_value(opt));
                    }
                }
                first.map(option_value)
            }
            _ => None,
        }
    }

    pub fn is_checked(&self, node: &Node) -> bool {
        self.state
            .checks
            .get(&node.id())
            .copied()
            .unwrap_or_else(|| node.has_attr("checked"))
    }

    /// Drop overlay state for every control under the form, restoring defaults.
    pub fn reset_form(&mut self, form_html_id: &str) -> bool {
        let Some(path) = self.path_to(form_html_id) else {
            return false;
        };
        let mut ids = Vec::new();
        collect_node_ids(self.node_at(&path).expect("path just resolved"), &mut ids);
        for id in ids {
            self.state.values.remove(&id);
            self.state.checks.remove(&id);
        }
        true
    }

    /// Close an open `<dialog>`, optionally recording a close result (the
    /// host-visible return value); returns whether it was open.
    pub fn close_dialog(&mut self, dialog_id: &str, return_value: Option<&str>) -> bool {
        let Some(path) = self.path_to(dialog_id) else {
            return false;
        };
        let id = {
            let node = node_at_mut(&mut self.root, &path);
            if !node.is_element_named("dialog") || !node.has_attr("open") {
                return false;
            }
            node.remove_attr("open");
            node.id()
        };
        if let Some(value) = return_value {
            self.state.values.insert(id, value.to_string());
        }
        true
    }

    /// Close result recorded by `close_dialog`, if any.
    pub fn dialog_return_value(&self, dialog_id: &str) -> Option<&str> {
        let node = self.find(dialog_id)?;
        self.state.values.get(&node.id()).map(String::as_str)
    }

    // --- focus ---

    pub fn set_active_element(&mut self, html_id: Option<&str>) {
        self.active_element = html_id.map(str::to_string);
    }

    pub fn active_element(&self) -> Option<&str> {
        self.active_element.as_deref()
    }

    // --- form data ---

    /// Collect successful controls of a form in document order, appending the
    /// submitter's own name/value when given.
    pub fn collect_form_data(&self, form: Option<&Node>, submitter: Option<&str>) -> Vec<(String, FormValue)> {
        let mut out = Vec::new();
        if let Some(form) = form {
            self.collect_controls(form, &mut out);
        }
        if let Some(sid) = submitter
            && let Some(s) = self.find(sid)
            && let Some(name) = s.attr("name").map(str::trim).filter(|n| !n.is_empty())
        {
            let value = s.attr("value").unwrap_or("").to_string();
            out.push((name.to_string(), FormValue::Text(value)));
        }
        out
    }

    fn collect_controls(&self, node: &Node, out: &mut Vec<(String, FormValue)>) {
        if let Some(tag) = node.tag() {
            if matches!(tag, "input" | "select" | "textarea") {
                if node.has_attr("disabled") {
                    return;
                }
                let Some(name) = node.attr("name").map(str::trim).filter(|n| !n.is_empty()) else {
                    return;
                };
                let name = name.to_string();
                match tag {
                    "input" => {
                        let ty = node.attr("type").unwrap_or("").trim().to_ascii_lowercase();
                        match ty.as_str() {
                            "checkbox" | "radio" => {
                                if self.is_checked(node) {
                                    let value = node.attr("value").unwrap_or("on");
                                    let value = if value.is_empty() { "on" } else { value };
                                    out.push((name, FormValue::Text(value.to_string())));
                                }
                            }
                            "file" => {
                                out.push((name, FormValue::File(node.attr("value").unwrap_or("").to_string())));
                            }
                            "submit" | "button" | "reset" | "image" => {}
                            _ => {
                                let value = self.current_value(node).unwrap_or_default();
                                out.push((name, FormValue::Text(value)));
                            }
                        }
                    }
                    _ => {
                        let value = self.current_value(node).unwrap_or_default();
                        out.push((name, FormValue::Text(value)));
                    }
                }
                return;
            }
        }
        for c in node.children() {
            self.collect_controls(c, out);
        }
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Node, &mut DocState) {
        (&mut self.root, &mut self.state)
    }
}

fn option_value(opt: &Node) -> String {
    match opt.attr("value") {
        Some(v) => v.to_string(),
        None => opt.text_content().trim().to_string(),
    }
}

/// Parse response-body markup into free-standing nodes (identity unassigned).
/// Parsing is inert: nothing executes at parse time.
pub fn parse_fragments(html: &str) -> Vec<Node> {
    let mut root = build_tree(tokenize(html));
    root.children_mut().map(std::mem::take).unwrap_or_default()
}

pub(crate) fn adopt(state: &mut DocState, node: &mut Node) {
    node.set_id(state.alloc());
    if let Some(children) = node.children_mut() {
        for c in children {
            adopt(state, c);
        }
    }
}

pub(crate) fn find_path(node: &Node, pred: &impl Fn(&Node) -> bool) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    if find_path_inner(node, pred, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn find_path_inner(node: &Node, pred: &impl Fn(&Node) -> bool, path: &mut Vec<usize>) -> bool {
    if pred(node) {
        return true;
    }
    for (i, c) in node.children().iter().enumerate() {
        path.push(i);
        if find_path_inner(c, pred, path) {
            return true;
        }
        path.pop();
    }
    false
}

pub(crate) fn node_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> &'a mut Node {
    let mut node = root;
    for &idx in path {
        node = &mut node
            .children_mut()
            .expect("path steps through parents")[idx];
    }
    node
}

fn collect_node_ids(node: &Node, out: &mut Vec<Id>) {
    out.push(node.id());
    for c in node.children() {
        collect_node_ids(c, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::outer_html;

    fn doc(html: &str) -> Document {
        Document::parse(html)
    }

    #[test]
    fn parse_assigns_unique_ids() {
        let d = doc("<div id=a><span id=b></span></div>");
        let mut ids = Vec::new();
        collect_node_ids(d.root(), &mut ids);
        let mut deduped = ids.clone();
        deduped.sort_by_key(|i| i.0);
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
        assert!(ids.iter().all(|i| *i != Id::UNSET));
    }

    #[test]
    fn find_and_closest() {
        let d = doc("<form id=f><fieldset><button id=go name=x></button></fieldset></form>");
        assert!(d.find("go").is_some());
        assert!(d.closest("go", |n| n.is_element_named("fieldset")).is_some());
        assert!(d.enclosing_form("go").unwrap().html_id() == Some("f"));
    }

    #[test]
    fn explicit_form_reference_wins_over_ancestor() {
        let d = doc("<form id=outer><input id=i name=n form=other></form><form id=other></form>");
        assert_eq!(d.enclosing_form("i").unwrap().html_id(), Some("other"));
    }

    #[test]
    fn insert_adjacent_preserves_order() {
        let mut d = doc("<ul id=list><li id=keep></li></ul>");
        let nodes = parse_fragments("<li>1</li><li>2</li><li>3</li>");
        assert!(d.insert_adjacent("list", InsertPosition::BeforeEnd, nodes));
        let list = d.find("list").unwrap();
        assert_eq!(list.children().len(), 4);
        assert_eq!(list.children()[3].text_content(), "3");

        let nodes = parse_fragments("<li>a</li><li>b</li>");
        assert!(d.insert_adjacent("keep", InsertPosition::BeforeBegin, nodes));
        let list = d.find("list").unwrap();
        assert_eq!(outer_html(&list.children()[0]), "<li>a</li>");
        assert_eq!(outer_html(&list.children()[1]), "<li>b</li>");
    }

    #[test]
    fn replace_element_journals_removal_then_additions() {
        let mut d = doc("<div id=host><p id=old></p></div>");
        d.discard_journal();
        let nodes = parse_fragments("<p id=new>fresh</p>");
        assert!(d.replace_element("old", nodes));
        assert!(d.find("old").is_none());
        assert_eq!(d.find("new").unwrap().text_content(), "fresh");
        let journal = d.take_journal();
        assert_eq!(journal.len(), 2);
        assert!(matches!(&journal[0], Mutation::Removed(n) if n.html_id() == Some("old")));
        assert!(matches!(journal[1], Mutation::Added(_)));
    }

    #[test]
    fn collect_form_data_covers_control_kinds() {
        let mut d = doc(concat!(
            "<form id=f>",
            "<input id=t name=q value=hello>",
            "<input type=checkbox name=c value=yes checked>",
            "<input type=checkbox name=c2 value=no>",
            "<input type=file name=doc value=a.txt>",
            "<textarea name=msg>body</textarea>",
            "<select name=pick><option value=one></option><option value=two selected></option></select>",
            "<input name=dead disabled value=x>",
            "</form>"
        ));
        d.set_value("t", "typed");
        let data = d.collect_form_data(d.find("f"), None);
        assert_eq!(
            data,
            vec![
                ("q".to_string(), FormValue::Text("typed".to_string())),
                ("c".to_string(), FormValue::Text("yes".to_string())),
                ("doc".to_string(), FormValue::File("a.txt".to_string())),
                ("msg".to_string(), FormValue::Text("body".to_string())),
                ("pick".to_string(), FormValue::Text("two".to_string())),
            ]
        );
    }

    #[test]
    fn submitter_is_appended_last() {
        let d = doc("<form id=f><input name=a value=1><button id=go name=act value=save></button></form>");
        let data = d.collect_form_data(d.find("f"), Some("go"));
        assert_eq!(data.last().unwrap(), &("act".to_string(), FormValue::Text("save".to_string())));
    }

    #[test]
    fn reset_form_restores_markup_defaults() {
        let mut d = doc("<form id=f><input id=i name=n value=default></form>");
        d.set_value("i", "typed");
        let node_path = d.path_to("i").unwrap();
        let node = d.node_at(&node_path).unwrap();
        assert_eq!(d.current_value(node).as_deref(), Some("typed"));
        assert!(d.reset_form("f"));
        let node = d.find("i").unwrap();
        assert_eq!(d.current_value(node).as_deref(), Some("default"));
    }

    #[test]
    fn close_dialog_only_when_open() {
        let mut d = doc("<dialog id=m open><p>hi</p></dialog>");
        assert!(d.close_dialog("m", Some("saved")));
        assert!(!d.find("m").unwrap().has_attr("open"));
        assert_eq!(d.dialog_return_value("m"), Some("saved"));
        assert!(!d.close_dialog("m", None));
    }

    #[test]
    fn replace_head_leaves_only_title() {
        let mut d = doc("<html><head><meta charset=utf-8><title>App</title></head><body></body></html>");
        assert!(d.replace_head("Error"));
        let head_path = find_path(d.root(), &|n| n.is_element_named("head")).unwrap();
        let head = d.node_at(&head_path).unwrap();
        assert_eq!(outer_html(head), "<head><title>Error</title></head>");
    }
}
