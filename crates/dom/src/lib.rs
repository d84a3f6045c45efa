pub mod morph;
pub mod serialize;

mod builder;
mod document;
mod entities;
mod tokenizer;
mod types;

pub use crate::builder::build_tree;
pub use crate::document::{Document, FormValue, InsertPosition, Mutation, parse_fragments};
pub use crate::entities::{decode_entities, escape_attr, escape_text};
pub use crate::morph::{MorphError, MorphOptions, morph};
pub use crate::serialize::{inner_html, outer_html};
pub use crate::tokenizer::{Token, tokenize};
pub use crate::types::{Id, Node, NodeId};
