//! Field paths and their compiler.
//!
//! A path addresses a position inside a document. Segments are separated by `.`, concrete
//! array positions are written `[n]` and `[]` fans out over every element of an array:
//!
//! ```text
//! name                 top-level field
//! address.city         nested map field
//! Scores[1]            second element of an array
//! a[][].b              field b of every element of every element of a
//! ""                   the whole document
//! ```

mod compiler;

pub use compiler::*;

use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};

/// One step of a [FieldPath].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
}

impl Segment {
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Segment::Field(name) => Some(name),
            _ => None,
        }
    }
}

/// A compiled path. The empty path addresses the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: SmallVec<[Segment; 4]>,
}

impl FieldPath {
    pub fn root() -> Self {
        FieldPath::default()
    }

    pub(crate) fn from_segments<I: IntoIterator<Item = Segment>>(segments: I) -> Self {
        FieldPath {
            segments: segments.into_iter().collect(),
        }
    }

    /// Shorthand for a single top-level field. The name is taken verbatim.
    pub fn field(name: &str) -> Self {
        FieldPath::from_segments([Segment::Field(name.to_string())])
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Wildcard))
    }

    /// The first segment when it names a field.
    pub fn top_field(&self) -> Option<&str> {
        self.segments.first().and_then(Segment::as_field)
    }

    /// Field names only, with every index and wildcard step dropped. Bucket routing is done
    /// on this projection so that all elements of an array route together.
    pub fn field_names(&self) -> Vec<&str> {
        self.segments.iter().filter_map(Segment::as_field).collect()
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments.iter().zip(prefix.segments.iter()).all(|(a, b)| a == b)
    }

    pub fn child(&self, segment: Segment) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.push(segment);
        FieldPath { segments }
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut text = String::new();
        for segment in self.segments.iter() {
            match segment {
                Segment::Field(name) => {
                    if !text.is_empty() {
                        text.push('.');
                    }
                    text.push_str(name);
                }
                Segment::Index(index) => text.push_str(&format!("[{}]", index)),
                Segment::Wildcard => text.push_str("[]"),
            }
        }
        write!(f, "{}", text)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = crate::errors::HDocError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        compile(path)
    }
}

/// Renders a list of paths the way explain output and logs show them.
pub(crate) fn join_paths(paths: &[FieldPath]) -> String {
    paths.iter().map(|p| p.to_string()).join(", ")
}
