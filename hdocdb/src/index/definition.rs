use crate::collection::Document;
use crate::common::{SortOrder, Value, ValueType};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::index::IndexState;
use crate::path::{compile, FieldPath};
use itertools::Itertools;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

const NAME_FIELD: &str = "name";
const STATE_FIELD: &str = "state";
const ASYNC_FIELD: &str = "async";
const FIELDS_FIELD: &str = "fields";
const PATH_FIELD: &str = "path";
const TYPE_FIELD: &str = "type";
const ORDER_FIELD: &str = "order";

/// One component of an index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexField {
    path: FieldPath,
    value_type: ValueType,
    order: SortOrder,
}

impl IndexField {
    /// Fails with `ValidationError` for container types, wildcard paths and the root path.
    pub fn new(path: &str, value_type: ValueType, order: SortOrder) -> HDocResult<IndexField> {
        let path = compile(path)?;
        if path.is_root() || path.has_wildcard() {
            return Err(invalid(&format!(
                "Index path '{}' must name a single position",
                path
            )));
        }
        if value_type.is_container() {
            return Err(invalid(&format!(
                "Index field {} cannot be declared as {}",
                path, value_type
            )));
        }
        Ok(IndexField {
            path,
            value_type,
            order,
        })
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert_field(PATH_FIELD, self.path.to_string());
        doc.insert_field(TYPE_FIELD, self.value_type.name());
        doc.insert_field(ORDER_FIELD, self.order.to_string());
        doc
    }

    fn from_document(doc: &Document) -> HDocResult<IndexField> {
        let path = text(doc, PATH_FIELD)?;
        let value_type = ValueType::from_name(text(doc, TYPE_FIELD)?)
            .ok_or_else(|| invalid("Stored index field has an unknown type"))?;
        let order = match text(doc, ORDER_FIELD)? {
            "asc" => SortOrder::Ascending,
            "desc" => SortOrder::Descending,
            other => return Err(invalid(&format!("Unknown sort order {}", other))),
        };
        IndexField::new(path, value_type, order)
    }
}

impl Display for IndexField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.path, self.value_type, self.order)
    }
}

/// A named, ordered list of [IndexField]s.
///
/// Indexes build asynchronously unless [IndexDefinition::with_async_build] says otherwise;
/// an asynchronous index is populated by `run_pending_index_tasks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    name: String,
    fields: Vec<IndexField>,
    async_build: bool,
}

impl IndexDefinition {
    pub fn new(name: &str, fields: Vec<IndexField>) -> IndexDefinition {
        IndexDefinition {
            name: name.to_string(),
            fields,
            async_build: true,
        }
    }

    pub fn with_async_build(mut self, async_build: bool) -> IndexDefinition {
        self.async_build = async_build;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[IndexField] {
        &self.fields
    }

    pub fn is_async(&self) -> bool {
        self.async_build
    }

    pub fn paths(&self) -> Vec<FieldPath> {
        self.fields.iter().map(|f| f.path.clone()).collect()
    }

    pub fn validate(&self) -> HDocResult<()> {
        if self.name.is_empty() || self.name.starts_with('_') {
            return Err(invalid(&format!(
                "Index name '{}' is empty or reserved",
                self.name
            )));
        }
        if self.fields.is_empty() {
            return Err(invalid(&format!("Index {} has no fields", self.name)));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(&field.path) {
                return Err(invalid(&format!(
                    "Index {} lists {} twice",
                    self.name, field.path
                )));
            }
            if field.value_type.is_container() {
                return Err(invalid(&format!(
                    "Index field {} cannot be declared as {}",
                    field.path, field.value_type
                )));
            }
        }
        Ok(())
    }
}

impl Display for IndexDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.fields.iter().join(", "))
    }
}

/// An index definition together with its current lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    definition: IndexDefinition,
    state: IndexState,
}

impl IndexDescriptor {
    pub(crate) fn new(definition: IndexDefinition, state: IndexState) -> IndexDescriptor {
        IndexDescriptor { definition, state }
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub(crate) fn with_state(&self, state: IndexState) -> HDocResult<IndexDescriptor> {
        Ok(IndexDescriptor {
            definition: self.definition.clone(),
            state: self.state.transition(state)?,
        })
    }

    pub(crate) fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert_field(NAME_FIELD, self.definition.name.as_str());
        doc.insert_field(STATE_FIELD, self.state.name());
        doc.insert_field(ASYNC_FIELD, self.definition.async_build);
        let fields: Vec<Value> = self
            .definition
            .fields
            .iter()
            .map(|f| Value::Map(f.to_document()))
            .collect();
        doc.insert_field(FIELDS_FIELD, fields);
        doc
    }

    pub(crate) fn from_document(doc: &Document) -> HDocResult<IndexDescriptor> {
        let name = text(doc, NAME_FIELD)?;
        let state = IndexState::from_name(text(doc, STATE_FIELD)?)
            .ok_or_else(|| invalid("Stored index has an unknown state"))?;
        let async_build = doc.field(ASYNC_FIELD).and_then(Value::as_bool).unwrap_or(true);
        let Some(Value::Array(stored)) = doc.field(FIELDS_FIELD) else {
            return Err(invalid(&format!("Stored index {} has no fields", name)));
        };
        let mut fields = Vec::with_capacity(stored.len());
        for field in stored {
            let field = field
                .as_map()
                .ok_or_else(|| invalid("Stored index field is not a document"))?;
            fields.push(IndexField::from_document(field)?);
        }
        let definition = IndexDefinition::new(name, fields).with_async_build(async_build);
        Ok(IndexDescriptor { definition, state })
    }
}

fn text<'a>(doc: &'a Document, field: &str) -> HDocResult<&'a str> {
    doc.field(field)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(&format!("Stored index is missing '{}'", field)))
}

fn invalid(message: &str) -> HDocError {
    log::error!("{}", message);
    HDocError::new(message, ErrorKind::ValidationError)
}
