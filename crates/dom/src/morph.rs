//! In-place reconciliation of a live subtree against new markup.
//!
//! Contract:
//! - Elements are matched by html `id` attribute when the new side carries
//!   one, else by tag at the current position; matched elements keep their
//!   internal identity and update in place.
//! - Mismatches replace: the old node is journaled as removed, the new one is
//!   adopted and journaled as added, exactly like any other child-list edit.
//! - Text and comment content updates in place and is not journaled.
//! - The returned ids are the resulting top-level nodes of the morph target,
//!   not every touched descendant.
//! - A control's overlay value is dropped when its attributes change (the
//!   server wins), unless `ignore_active_value` is set and the control is the
//!   document's active element.

use crate::document::{adopt, find_path, node_at_mut, DocState, Document, Mutation};
use crate::types::{Id, Node};

#[derive(Clone, Copy, Debug)]
pub struct MorphOptions {
    /// Reconcile the target element itself (outerHTML style) rather than only
    /// its children.
    pub outer_html: bool,
    pub ignore_active_value: bool,
}

impl Default for MorphOptions {
    fn default() -> Self {
        MorphOptions {
            outer_html: true,
            ignore_active_value: false,
        }
    }
}

#[derive(Debug)]
pub enum MorphError {
    TargetMissing(String),
}

impl std::fmt::Display for MorphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MorphError::TargetMissing(id) => write!(f, "morph target #{id} is not in the document"),
        }
    }
}

impl std::error::Error for MorphError {}

struct MorphCtx<'a> {
    state: &'a mut DocState,
    active: Option<String>,
    ignore_active_value: bool,
}

pub fn morph(
    document: &mut Document,
    target: &str,
    new_children: Vec<Node>,
    options: &MorphOptions,
) -> Result<Vec<Id>, MorphError> {
    let active = document.active_element().map(str::to_string);
    let (root, state) = document.parts_mut();
    let Some(path) = find_path(root, &|n| n.html_id() == Some(target)) else {
        return Err(MorphError::TargetMissing(target.to_string()));
    };
    let mut ctx = MorphCtx {
        state,
        active,
        ignore_active_value: options.ignore_active_value,
    };

    if !options.outer_html {
        let node = node_at_mut(root, &path);
        let Some(children) = node.children_mut() else {
            return Ok(Vec::new());
        };
        reconcile_children(&mut ctx, children, new_children);
        return Ok(vec![node.id()]);
    }

    let Some((&idx, parent_path)) = path.split_last() else {
        return Err(MorphError::TargetMissing(target.to_string()));
    };
    let parent = node_at_mut(root, parent_path);
    let children = parent
        .children_mut()
        .expect("parent of a live node holds children");
    // outerHTML morph: reconcile the single target slot against the new
    // content, which may fan out to several top-level nodes.
    let target_node = children.remove(idx);
    let mut slot = vec![target_node];
    reconcile_children(&mut ctx, &mut slot, new_children);
    let ids = slot.iter().map(Node::id).collect();
    for (k, n) in slot.into_iter().enumerate() {
        children.insert(idx + k, n);
    }
    Ok(ids)
}

fn reconcile_children(ctx: &mut MorphCtx<'_>, old: &mut Vec<Node>, new: Vec<Node>) {
    let mut remaining = std::mem::take(old);
    let mut result = Vec::with_capacity(new.len());
    for new_child in new {
        match take_match(&mut remaining, &new_child) {
            Some(mut matched) => {
                update_node(ctx, &mut matched, new_child);
                result.push(matched);
            }
            None => {
                let mut fresh = new_child;
                adopt(ctx.state, &mut fresh);
                ctx.state.journal.push(Mutation::Added(fresh.id()));
                result.push(fresh);
            }
        }
    }
    for leftover in remaining {
        ctx.state.journal.push(Mutation::Removed(leftover));
    }
    *old = result;
}

/// Pull the old node the new one should update: same html id anywhere ahead,
/// else a compatible node at the front of the remaining list.
fn take_match(remaining: &mut Vec<Node>, new: &Node) -> Option<Node> {
    if let Some(new_id) = new.html_id() {
        let pos = remaining.iter().position(|n| n.html_id() == Some(new_id))?;
        let candidate = &remaining[pos];
        if candidate.tag() == new.tag() {
            return Some(remaining.remove(pos));
        }
        return None;
    }
    let front = remaining.first()?;
    let compatible = match (front, new) {
        (Node::Element { name: a, .. }, Node::Element { name: b, .. }) => a == b,
        (Node::Text { .. }, Node::Text { .. }) => true,
        (Node::Comment { .. }, Node::Comment { .. }) => true,
        _ => false,
    };
    if compatible {
        Some(remaining.remove(0))
    } else {
        None
    }
}

fn update_node(ctx: &mut MorphCtx<'_>, old: &mut Node, new: Node) {
    match (old, new) {
        (
            Node::Element {
                id,
                attributes,
                children,
                name,
            },
            Node::Element {
                attributes: new_attributes,
                children: new_children,
                ..
            },
        ) => {
            if *attributes != new_attributes {
                let is_control = matches!(name.as_str(), "input" | "textarea" | "select");
                *attributes = new_attributes;
                if is_control {
                    let html_id = attributes
                        .iter()
                        .find(|(k, _)| k == "id")
                        .and_then(|(_, v)| v.as_deref());
                    let keep = ctx.ignore_active_value
                        && html_id.is_some()
                        && html_id == ctx.active.as_deref();
                    if !keep {
                        ctx.state.values.remove(id);
                        ctx.state.checks.remove(id);
                    }
                }
            }
            reconcile_children(ctx, children, new_children);
        }
        (Node::Text { text, .. }, Node::Text { text: new_text, .. }) => {
            *text = new_text;
        }
        (Node::Comment { text, .. }, Node::Comment { text: new_text, .. }) => {
            *text = new_text;
        }
        // take_match only pairs like with like
        _ => {}
    }
}
