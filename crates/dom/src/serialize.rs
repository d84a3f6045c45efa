//! Tree to markup, used by diagnostics and test assertions.
//! Attribute order is preserved; void elements emit no end tag.

use crate::entities::{escape_attr, escape_text};
use crate::types::{Node, is_void_element};

pub fn outer_html(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

pub fn inner_html(node: &Node) -> String {
    let mut out = String::new();
    for child in node.children() {
        write_node(child, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Document { doctype, children, .. } => {
            if let Some(dt) = doctype {
                out.push_str("<!");
                out.push_str(dt);
                out.push('>');
            }
            for c in children {
                write_node(c, out);
            }
        }
        Node::Element {
            name,
            attributes,
            children,
            ..
        } => {
            out.push('<');
            out.push_str(name);
            for (k, v) in attributes {
                out.push(' ');
                out.push_str(k);
                if let Some(v) = v {
                    out.push_str("=\"");
                    out.push_str(&escape_attr(v));
                    out.push('"');
                }
            }
            out.push('>');
            if is_void_element(name) {
                return;
            }
            let raw = name == "script" || name == "style";
            for c in children {
                if raw {
                    if let Node::Text { text, .. } = c {
                        out.push_str(text);
                        continue;
                    }
                }
                write_node(c, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::Text { text, .. } => out.push_str(&escape_text(text)),
        Node::Comment { text, .. } => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_tree;
    use crate::tokenizer::tokenize;

    fn round_trip(html: &str) -> String {
        outer_html(&build_tree(tokenize(html)))
    }

    #[test]
    fn serializes_elements_attributes_and_text() {
        assert_eq!(
            round_trip(r#"<div id="a" hidden><span>x &amp; y</span></div>"#),
            r#"<div id="a" hidden><span>x &amp; y</span></div>"#
        );
    }

    #[test]
    fn void_elements_have_no_end_tag() {
        assert_eq!(round_trip(r#"<input name="q">"#), r#"<input name="q">"#);
    }

    #[test]
    fn script_text_is_not_escaped() {
        assert_eq!(
            round_trip("<script>a && b</script>"),
            "<script>a && b</script>"
        );
    }
}
