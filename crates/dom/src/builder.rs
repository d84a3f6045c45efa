//! Token stream to tree construction via an open-element stack.
//!
//! Lenient by design: void elements never open, an end tag with no matching
//! open element is dropped, and elements left open at end of input are closed
//! implicitly. No HTML5 tree-construction rules (no implied tbody and the
//! like); the fragment protocol does not rely on them.

use crate::types::{Id, Node, is_void_element};
use crate::tokenizer::Token;

pub fn build_tree(tokens: Vec<Token>) -> Node {
    // stack[0] is always the document root; elements above it are open.
    let mut stack: Vec<Node> = vec![Node::Document {
        id: Id::UNSET,
        doctype: None,
        children: Vec::new(),
    }];

    for token in tokens {
        match token {
            Token::Doctype(s) => {
                if let Node::Document { doctype, .. } = &mut stack[0] {
                    *doctype = Some(s);
                }
            }
            Token::Comment(text) => {
                attach(&mut stack, Node::Comment { id: Id::UNSET, text });
            }
            Token::Text(text) => {
                if !text.is_empty() {
                    attach(&mut stack, Node::Text { id: Id::UNSET, text });
                }
            }
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let element = Node::Element {
                    id: Id::UNSET,
                    name: name.clone(),
                    attributes,
                    children: Vec::new(),
                };
                if self_closing || is_void_element(&name) {
                    attach(&mut stack, element);
                } else {
                    stack.push(element);
                }
            }
            Token::EndTag(name) => {
                let Some(depth) = stack
                    .iter()
                    .skip(1)
                    .rposition(|n| n.is_element_named(&name))
                    .map(|p| p + 1)
                else {
                    continue;
                };
                while stack.len() > depth {
                    let closed = stack.pop().expect("open element above match depth");
                    attach(&mut stack, closed);
                }
            }
        }
    }

    while stack.len() > 1 {
        let closed = stack.pop().expect("open element above document root");
        attach(&mut stack, closed);
    }
    stack.pop().expect("document root")
}

fn attach(stack: &mut Vec<Node>, node: Node) {
    let parent = stack.last_mut().expect("builder stack is never empty");
    parent
        .children_mut()
        .expect("open elements can hold children")
        .push(node);
}
