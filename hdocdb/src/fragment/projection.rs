use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::path::{FieldPath, Segment};
use std::collections::BTreeMap;

/// A set of requested paths, folded into a trie.
///
/// A node marked complete keeps its whole subtree. Field children are matched against map
/// keys; on arrays they apply to every element, as do wildcard children. Index children pick
/// one element. Arrays only keep the elements that still hold projected content, and maps
/// only keep the fields that do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    complete: bool,
    fields: BTreeMap<String, Projection>,
    indexes: BTreeMap<usize, Projection>,
    every: Option<Box<Projection>>,
}

impl Projection {
    pub fn new(paths: &[FieldPath]) -> Self {
        let mut root = Projection::default();
        for path in paths {
            root.insert(path.segments());
        }
        root
    }

    /// Whether the projection asks for the whole document.
    pub fn is_everything(&self) -> bool {
        self.complete
    }

    fn insert(&mut self, segments: &[Segment]) {
        if self.complete {
            return;
        }
        match segments.split_first() {
            None => {
                self.complete = true;
                self.fields.clear();
                self.indexes.clear();
                self.every = None;
            }
            Some((Segment::Field(name), rest)) => {
                self.fields.entry(name.clone()).or_default().insert(rest)
            }
            Some((Segment::Index(index), rest)) => {
                self.indexes.entry(*index).or_default().insert(rest)
            }
            Some((Segment::Wildcard, rest)) => self
                .every
                .get_or_insert_with(Box::default)
                .insert(rest),
        }
    }

    /// A copy of `doc` holding only what the projection reaches, plus the identity field.
    pub fn apply(&self, doc: &Document) -> Document {
        if self.complete {
            return doc.clone();
        }
        let mut projected = self.project_map(doc).unwrap_or_default();
        if let Some(id) = doc.id() {
            if projected.id().is_none() {
                // identity first, as it was stored
                let rest = std::mem::take(&mut projected);
                projected.set_id(id.clone());
                for (key, value) in rest {
                    projected.insert_field(&key, value);
                }
            }
        }
        projected
    }

    fn project(&self, value: &Value) -> Option<Value> {
        if self.complete {
            return Some(value.clone());
        }
        match value {
            Value::Map(doc) => self.project_map(doc).map(Value::Map),
            Value::Array(items) => {
                let kept: Vec<Value> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| self.project_element(index, item))
                    .collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(Value::Array(kept))
                }
            }
            _ => None,
        }
    }

    fn project_map(&self, doc: &Document) -> Option<Document> {
        let mut projected = Document::new();
        for (key, value) in doc.iter() {
            if let Some(child) = self.fields.get(key) {
                if let Some(kept) = child.project(value) {
                    projected.insert_field(key, kept);
                }
            }
        }
        if projected.is_empty() {
            None
        } else {
            Some(projected)
        }
    }

    fn project_element(&self, index: usize, item: &Value) -> Option<Value> {
        if let Some(child) = self.indexes.get(&index) {
            if child.complete {
                return Some(item.clone());
            }
        }
        if let Some(every) = &self.every {
            if every.complete {
                return Some(item.clone());
            }
        }

        // several branches may reach the same element; their results are unioned
        let mut parts: Vec<Value> = Vec::new();
        if let Some(child) = self.indexes.get(&index) {
            parts.extend(child.project(item));
        }
        if let Some(every) = &self.every {
            parts.extend(every.project(item));
        }
        if !self.fields.is_empty() {
            if let Value::Map(doc) = item {
                parts.extend(self.project_map(doc).map(Value::Map));
            }
        }
        union(item, parts)
    }

    /// Whether any requested path could reach data below the field-name route `route`.
    pub(crate) fn touches(&self, route: &[&str]) -> bool {
        if self.complete {
            return true;
        }
        let Some((first, rest)) = route.split_first() else {
            return true;
        };
        let through_fields = self
            .fields
            .get(*first)
            .is_some_and(|child| child.touches(rest));
        let through_arrays = self.indexes.values().any(|child| child.touches(route))
            || self.every.as_ref().is_some_and(|every| every.touches(route));
        through_fields || through_arrays
    }
}

// merges partial projections of one original value back into a single value
fn union(original: &Value, parts: Vec<Value>) -> Option<Value> {
    let mut parts = parts.into_iter();
    let first = parts.next()?;
    parts.try_fold(first, |merged, next| Some(merge_values(original, merged, next)))
}

fn merge_values(original: &Value, left: Value, right: Value) -> Value {
    match (original, left, right) {
        (Value::Map(source), Value::Map(left), Value::Map(right)) => {
            let mut merged = Document::new();
            for (key, value) in source.iter() {
                match (left.field(key), right.field(key)) {
                    (Some(l), Some(r)) => {
                        merged.insert_field(key, merge_values(value, l.clone(), r.clone()))
                    }
                    (Some(l), None) => merged.insert_field(key, l.clone()),
                    (None, Some(r)) => merged.insert_field(key, r.clone()),
                    (None, None) => None,
                };
            }
            Value::Map(merged)
        }
        // element pruning has already renumbered the arrays, so keep the larger reach
        (_, left, _) => left,
    }
}
