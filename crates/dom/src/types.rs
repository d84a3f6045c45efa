pub type NodeId = u32;

/// Document-unique internal node identity, assigned by the owning `Document`.
/// `Id::UNSET` marks nodes that have not been adopted into a document yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Id(pub NodeId);

impl Id {
    pub const UNSET: Id = Id(0);
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Document {
        id: Id,
        doctype: Option<String>,
        children: Vec<Node>,
    },
    Element {
        id: Id,
        name: String,
        attributes: Vec<(String, Option<String>)>,
        children: Vec<Node>,
    },
    Text {
        id: Id,
        text: String,
    },
    Comment {
        id: Id,
        text: String,
    },
}

impl Node {
    pub fn element(name: &str, attributes: Vec<(String, Option<String>)>, children: Vec<Node>) -> Node {
        Node::Element {
            id: Id::UNSET,
            name: name.to_ascii_lowercase(),
            attributes,
            children,
        }
    }

    pub fn text(text: &str) -> Node {
        Node::Text {
            id: Id::UNSET,
            text: text.to_string(),
        }
    }

    pub fn id(&self) -> Id {
        match self {
            Node::Document { id, .. } => *id,
            Node::Element { id, .. } => *id,
            Node::Text { id, .. } => *id,
            Node::Comment { id, .. } => *id,
        }
    }

    pub fn set_id(&mut self, new_id: Id) {
        match self {
            Node::Document { id, .. } => *id = new_id,
            Node::Element { id, .. } => *id = new_id,
            Node::Text { id, .. } => *id = new_id,
            Node::Comment { id, .. } => *id = new_id,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document { children, .. } | Node::Element { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Document { children, .. } | Node::Element { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Lowercase element name, `None` for non-elements.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_element_named(&self, target: &str) -> bool {
        match self {
            Node::Element { name, .. } => name.eq_ignore_ascii_case(target),
            _ => false,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Node::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_deref().unwrap_or("")),
            _ => None,
        }
    }

    pub fn has_attr(&self, name: &str) -> bool {
        match self {
            Node::Element { attributes, .. } => {
                attributes.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
            }
            _ => false,
        }
    }

    pub fn set_attr(&mut self, name: &str, value: Option<&str>) {
        let Node::Element { attributes, .. } = self else {
            return;
        };
        match attributes.iter().position(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(idx) => attributes[idx].1 = value.map(str::to_string),
            None => attributes.push((name.to_ascii_lowercase(), value.map(str::to_string))),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        if let Node::Element { attributes, .. } = self {
            attributes.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
    }

    /// Non-empty html `id` attribute value.
    pub fn html_id(&self) -> Option<&str> {
        self.attr("id").map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(node: &Node, out: &mut String) {
    match node {
        Node::Text { text, .. } => out.push_str(text),
        Node::Element { children, .. } | Node::Document { children, .. } => {
            for c in children {
                collect_text(c, out);
            }
        }
        Node::Comment { .. } => {}
    }
}

pub(crate) fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}
