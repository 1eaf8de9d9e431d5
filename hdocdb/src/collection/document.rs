use crate::collection::walker::{self, SetMode};
use crate::common::{Value, DOC_ID};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::path::{compile, FieldPath};
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::hash_map::DefaultHasher;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// An insertion-ordered tree of named [Value]s.
///
/// Fields keep the order in which they were first inserted; overwriting a field keeps its
/// position and deleting one closes the gap. Values are addressed by path strings (see
/// [crate::path]):
///
/// ```ignore
/// let mut doc = doc! { "name": "Ada", "Scores": [10, 20, 30] };
/// doc.set("address.city", "London")?;
/// assert_eq!(doc.get("Scores[1]")?, Some(Value::Int(20)));
/// doc.delete("Scores[0]")?;
/// assert_eq!(doc.get("Scores")?, Some(Value::from(vec![20, 30])));
/// ```
///
/// The reserved `_id` field carries the document's identity within a collection.
///
/// Two documents are equal when they hold the same fields with equal values, regardless of
/// field order.
#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            fields: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of top-level fields.
    pub fn size(&self) -> usize {
        self.fields.len()
    }

    /// Top-level fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Top-level field by its literal name; no path parsing.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub(crate) fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    pub(crate) fn field_entry(&mut self, name: &str) -> (&mut Value, bool) {
        let existed = self.fields.contains_key(name);
        let slot = self.fields.entry(name.to_string()).or_insert(Value::Null);
        (slot, existed)
    }

    /// Sets a top-level field by its literal name, keeping its position if it already exists.
    pub fn insert_field<V: Into<Value>>(&mut self, name: &str, value: V) -> Option<Value> {
        self.fields.insert(name.to_string(), value.into())
    }

    /// Removes a top-level field by its literal name, closing the gap it leaves.
    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub(crate) fn clear(&mut self) {
        self.fields.clear();
    }

    /// Value at `path`, or `None` when any step of the path is missing.
    ///
    /// A `[]` step fans out over an array and the matches are returned as one array.
    pub fn get(&self, path: &str) -> HDocResult<Option<Value>> {
        let path = compile(path)?;
        Ok(self.get_path(&path))
    }

    pub fn get_path(&self, path: &FieldPath) -> Option<Value> {
        walker::get(self, path).map(|v| v.into_owned())
    }

    pub fn contains(&self, path: &str) -> HDocResult<bool> {
        let path = compile(path)?;
        Ok(walker::get(self, &path).is_some())
    }

    /// Stores `value` at `path`, creating intermediate maps and arrays as needed.
    ///
    /// Arrays grow to reach the addressed position, with `null` filling skipped slots.
    /// Intermediate values that are not the container the path needs are replaced by one.
    pub fn set<V: Into<Value>>(&mut self, path: &str, value: V) -> HDocResult<()> {
        let path = compile(path)?;
        self.set_path(&path, value.into())
    }

    pub fn set_path(&mut self, path: &FieldPath, value: Value) -> HDocResult<()> {
        if path.is_root() {
            return match value {
                Value::Map(doc) => {
                    *self = doc;
                    Ok(())
                }
                other => {
                    log::error!("Cannot replace a document with a {}", other.value_type());
                    Err(HDocError::new(
                        &format!("Cannot replace a document with a {}", other.value_type()),
                        ErrorKind::TypeMismatch,
                    ))
                }
            };
        }
        let (slot, _) = walker::entry(self, path, SetMode::Replace)?;
        *slot = value;
        Ok(())
    }

    /// Removes the value at `path`. Returns whether anything was removed.
    pub fn delete(&mut self, path: &str) -> HDocResult<bool> {
        let path = compile(path)?;
        Ok(self.delete_path(&path))
    }

    pub fn delete_path(&mut self, path: &FieldPath) -> bool {
        walker::delete(self, path)
    }

    pub fn id(&self) -> Option<&Value> {
        self.fields.get(DOC_ID)
    }

    pub fn set_id<V: Into<Value>>(&mut self, id: V) {
        self.fields.insert(DOC_ID.to_string(), id.into());
    }

    pub fn remove_id(&mut self) -> Option<Value> {
        self.fields.shift_remove(DOC_ID)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // order independent, to agree with map equality
        let combined = self
            .fields
            .iter()
            .map(|entry| {
                let mut hasher = DefaultHasher::new();
                entry.hash(&mut hasher);
                hasher.finish()
            })
            .fold(0u64, u64::wrapping_add);
        self.fields.len().hash(state);
        combined.hash(state);
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.fields
                .iter()
                .map(|(k, v)| format!("{:?}: {}", k, v))
                .join(", ")
        )
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Document {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[doc(hidden)]
pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// Keys are bare identifiers or string literals. Values are literals, nested `{}` documents,
/// `[]` arrays, or parenthesised expressions.
///
/// ```rust
/// use hdocdb::doc;
///
/// let empty = doc! {};
/// let user = doc! {
///     "_id": "u1",
///     name: "Ada",
///     Scores: [10, 20, 30],
///     map: { byte: (100i8) },
///     floor: (i32::MIN)
/// };
/// assert_eq!(user.size(), 5);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::collection::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::collection::Document::new();
            $(
                doc.insert_field(
                    &$crate::collection::normalize(stringify!($key)),
                    $crate::doc_value!($value),
                );
            )*
            doc
        }
    };
}

/// Helper macro converting a single `doc!` value.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Map($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
