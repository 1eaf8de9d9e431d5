use crate::collection::{walker, Document};
use crate::common::{Value, INDEX_FAMILY, INDEX_QUALIFIER};
use crate::errors::HDocResult;
use crate::index::key_codec::encode_value;
use crate::index::{IndexDefinition, IndexField};
use crate::store::CellPut;
use crate::common::SortOrder;
use itertools::Itertools;

/// Payload of one index row.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct IndexEntry {
    pub id: Value,
    /// Indexed values in field order, `null` where a field is absent or of another type.
    pub values: Vec<Value>,
    /// Write time in epoch milliseconds.
    pub timestamp: i64,
}

impl IndexEntry {
    pub fn encode(&self) -> HDocResult<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::legacy())?)
    }

    pub fn decode(bytes: &[u8]) -> HDocResult<IndexEntry> {
        let (entry, _) = bincode::serde::decode_from_slice(bytes, bincode::config::legacy())?;
        Ok(entry)
    }

    pub fn to_cell(&self) -> HDocResult<CellPut> {
        Ok(CellPut::new(INDEX_FAMILY, INDEX_QUALIFIER, self.encode()?))
    }
}

/// The key tuples `doc` contributes to `definition`, values in field order.
///
/// Indexes are multi-key: a field holding an array contributes each distinct element of the
/// declared type class, and a document gets one tuple per combination. Absent fields, values
/// of another type class and arrays without such elements contribute `null`.
pub(crate) fn index_tuples(definition: &IndexDefinition, doc: &Document) -> Vec<Vec<Value>> {
    let mut tuples: Vec<Vec<Value>> = Vec::new();
    for tuple in definition
        .fields()
        .iter()
        .map(|field| indexed_values(field, doc).into_iter())
        .multi_cartesian_product()
    {
        if !tuples.contains(&tuple) {
            tuples.push(tuple);
        }
    }
    tuples
}

fn indexed_values(field: &IndexField, doc: &Document) -> Vec<Value> {
    let accepted = |value: &Value| field.value_type().accepts(value.value_type());
    let Some(found) = walker::get(doc, field.path()) else {
        return vec![Value::Null];
    };
    match found.as_ref() {
        Value::Array(items) => {
            let mut values: Vec<Value> = Vec::new();
            for item in items.iter().filter(|item| accepted(item)) {
                if !values.contains(item) {
                    values.push(item.clone());
                }
            }
            if values.is_empty() {
                values.push(Value::Null);
            }
            values
        }
        value if accepted(value) => vec![value.clone()],
        _ => vec![Value::Null],
    }
}

/// Key prefix shared by every entry of the index named `name`.
pub(crate) fn index_prefix(name: &str) -> HDocResult<Vec<u8>> {
    let mut key = Vec::new();
    encode_value(&Value::from(name), SortOrder::Ascending, &mut key)?;
    Ok(key)
}

/// Row key of an entry: index name, the encoded values, then the encoded id.
pub(crate) fn index_key(
    definition: &IndexDefinition,
    values: &[Value],
    id: &Value,
) -> HDocResult<Vec<u8>> {
    let mut key = index_prefix(definition.name())?;
    for (field, value) in definition.fields().iter().zip(values) {
        encode_value(value, field.order(), &mut key)?;
    }
    encode_value(id, SortOrder::Ascending, &mut key)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ValueType;
    use crate::doc;

    fn definition() -> IndexDefinition {
        IndexDefinition::new(
            "by_a_b",
            vec![
                IndexField::new("a", ValueType::Int, SortOrder::Ascending).unwrap(),
                IndexField::new("b.c", ValueType::String, SortOrder::Descending).unwrap(),
            ],
        )
    }

    #[test]
    fn mismatched_types_index_as_null() {
        let tuples = index_tuples(&definition(), &doc! { a: (7i64), b: { c: 3 } });
        assert_eq!(tuples, vec![vec![Value::Long(7), Value::Null]]);
        let tuples = index_tuples(&definition(), &doc! { b: { c: "x" } });
        assert_eq!(tuples, vec![vec![Value::Null, Value::from("x")]]);
    }

    #[test]
    fn array_elements_each_get_a_tuple() {
        let tuples = index_tuples(&definition(), &doc! { a: [5, 6, 5, "x"], b: { c: ["p", "q"] } });
        assert_eq!(
            tuples,
            vec![
                vec![Value::Int(5), Value::from("p")],
                vec![Value::Int(5), Value::from("q")],
                vec![Value::Int(6), Value::from("p")],
                vec![Value::Int(6), Value::from("q")],
            ]
        );
        let tuples = index_tuples(&definition(), &doc! { a: [], b: { c: [1] } });
        assert_eq!(tuples, vec![vec![Value::Null, Value::Null]]);
    }

    #[test]
    fn keys_share_the_index_prefix() {
        let def = definition();
        let prefix = index_prefix(def.name()).unwrap();
        let key = index_key(&def, &[Value::Int(1), Value::from("x")], &Value::from("id")).unwrap();
        assert!(key.starts_with(&prefix));
        let other = index_key(&def, &[Value::Int(2), Value::from("x")], &Value::from("id")).unwrap();
        assert!(key < other);
    }

    #[test]
    fn payload_survives_encoding() {
        let entry = IndexEntry {
            id: Value::from("k"),
            values: vec![Value::Int(1), Value::Null],
            timestamp: 42,
        };
        assert_eq!(IndexEntry::decode(&entry.encode().unwrap()).unwrap(), entry);
    }
}
