//! Simplified HTML tokenizer with a constrained, practical tag-name character set.
//!
//! Supported tag/attribute name characters (ASCII only): `[A-Za-z0-9:_-]`.
//! `<script>` and `<style>` bodies are treated as rawtext: their content is
//! captured verbatim up to the matching close tag, without entity decoding.
//! This is not a spec-complete HTML5 tokenizer; it covers the markup the
//! fragment protocol actually produces.

use crate::entities::decode_entities;
use memchr::memchr;

const HTML_COMMENT_START: &str = "<!--";
const HTML_COMMENT_END: &str = "-->";

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Doctype(String),
    StartTag {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        self_closing: bool,
    },
    EndTag(String),
    Comment(String),
    Text(String),
}

fn starts_with_ignore_ascii_case_at(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

// Only attempts matches starting at ASCII '<', which cannot appear in UTF-8
// continuation bytes, so byte scanning stays on char boundaries.
fn find_rawtext_close_tag(haystack: &str, tag: &str) -> Option<(usize, usize)> {
    let hay = haystack.as_bytes();
    let len = hay.len();
    let mut i = 0;
    while i < len {
        let rel = memchr(b'<', &hay[i..])?;
        i += rel;
        if i + 2 + tag.len() > len {
            return None;
        }
        if hay[i + 1] == b'/' && starts_with_ignore_ascii_case_at(hay, i + 2, tag.as_bytes()) {
            let mut k = i + 2 + tag.len();
            while k < len && hay[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && hay[k] == b'>' {
                return Some((i, k + 1));
            }
        }
        i += 1;
    }
    None
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            let start = i;
            match memchr(b'<', &bytes[i..]) {
                Some(rel) => i += rel,
                None => i = bytes.len(),
            }
            let decoded = decode_entities(&input[start..i]);
            if !decoded.is_empty() {
                out.push(Token::Text(decoded));
            }
            continue;
        }
        if input[i..].starts_with(HTML_COMMENT_START) {
            let body_start = i + HTML_COMMENT_START.len();
            match input[body_start..].find(HTML_COMMENT_END) {
                Some(end) => {
                    out.push(Token::Comment(input[body_start..body_start + end].to_string()));
                    i = body_start + end + HTML_COMMENT_END.len();
                }
                None => {
                    out.push(Token::Comment(input[body_start..].to_string()));
                    break;
                }
            }
            continue;
        }
        if starts_with_ignore_ascii_case_at(bytes, i, b"<!doctype") {
            let rest = &input[i + 2..];
            match rest.find('>') {
                Some(end) => {
                    out.push(Token::Doctype(rest[..end].trim().to_string()));
                    i += 2 + end + 1;
                }
                None => break,
            }
            continue;
        }
        if i + 2 <= bytes.len() && bytes[i + 1] == b'/' {
            let start = i + 2;
            let mut j = start;
            while j < bytes.len() && is_name_char(bytes[j]) {
                j += 1;
            }
            let name = input[start..j].to_ascii_lowercase();
            while j < bytes.len() && bytes[j] != b'>' {
                j += 1;
            }
            if j < bytes.len() {
                j += 1;
            }
            if !name.is_empty() {
                out.push(Token::EndTag(name));
            }
            i = j;
            continue;
        }
        let start = i + 1;
        let mut j = start;
        while j < bytes.len() && is_name_char(bytes[j]) {
            j += 1;
        }
        if j == start {
            // bare '<' in text
            let decoded = "<".to_string();
            out.push(Token::Text(decoded));
            i += 1;
            continue;
        }
        let name = input[start..j].to_ascii_lowercase();
        let (attributes, self_closing, next) = scan_attributes(input, j);
        i = next;
        let rawtext = !self_closing && (name == "script" || name == "style");
        out.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });
        if rawtext {
            match find_rawtext_close_tag(&input[i..], &name) {
                Some((text_end, close_end)) => {
                    if text_end > 0 {
                        out.push(Token::Text(input[i..i + text_end].to_string()));
                    }
                    out.push(Token::EndTag(name));
                    i += close_end;
                }
                None => {
                    if i < input.len() {
                        out.push(Token::Text(input[i..].to_string()));
                    }
                    out.push(Token::EndTag(name));
                    break;
                }
            }
        }
    }
    log::trace!(target: "seam.dom.tokenizer", "tokenized {} token(s) from {} bytes", out.len(), input.len());
    out
}

fn scan_attributes(input: &str, mut k: usize) -> (Vec<(String, Option<String>)>, bool, usize) {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut attributes = Vec::new();
    let mut self_closing = false;
    loop {
        while k < len && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
        if k >= len {
            break;
        }
        if bytes[k] == b'>' {
            k += 1;
            break;
        }
        if bytes[k] == b'/' {
            if k + 1 < len && bytes[k + 1] == b'>' {
                self_closing = true;
                k += 2;
                break;
            }
            k += 1;
            continue;
        }
        let name_start = k;
        while k < len && is_name_char(bytes[k]) {
            k += 1;
        }
        if name_start == k {
            k += 1;
            continue;
        }
        let attribute_name = input[name_start..k].to_ascii_lowercase();
        while k < len && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
        let mut value: Option<String> = None;
        if k < len && bytes[k] == b'=' {
            k += 1;
            while k < len && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                k += 1;
                let vstart = k;
                while k < len && bytes[k] != quote {
                    k += 1;
                }
                value = Some(decode_entities(&input[vstart..k]));
                if k < len {
                    k += 1;
                }
            } else {
                let vstart = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    k += 1;
                }
                value = Some(decode_entities(&input[vstart..k]));
            }
        }
        attributes.push((attribute_name, value));
    }
    (attributes, self_closing, k)
}
