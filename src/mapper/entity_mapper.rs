use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::core::error::{IndexError, Result};
use crate::core::types::{FieldValue, Record, StoredValue, ValueType};
use crate::mapper::builder::{Emitter, IdAccessor, MapperBuilder, MapperSettings};
use crate::mapper::codec::{JsonCodec, PayloadCodec};
use crate::mapper::document_mapper::{DocumentMapper, ID_FIELD, SOURCE_FIELD};
use crate::mapper::field::FieldTypes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum FieldRole {
    Indexed,
    Sorted,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRole::Indexed => write!(f, "indexed"),
            FieldRole::Sorted => write!(f, "sorted"),
        }
    }
}

pub(crate) struct FieldDecl<T> {
    pub(crate) name: String,
    pub(crate) role: FieldRole,
    pub(crate) value_type: ValueType,
    /// Registers a sort type under the field name.
    pub(crate) sortable: bool,
    pub(crate) emit: Emitter<T>,
}

/// Mapper for a typed entity, built with [`MapperBuilder`].
///
/// Each record carries the serialized entity in `_source`, the identifier in
/// `_id` when one is declared, then every declared field.
pub struct EntityMapper<T> {
    fields: Vec<FieldDecl<T>>,
    id: Option<IdAccessor<T>>,
    field_types: FieldTypes,
    analyzers: BTreeMap<String, String>,
    codec: Arc<dyn PayloadCodec<T>>,
}

impl<T> EntityMapper<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// Builder with default settings and JSON payloads.
    pub fn builder() -> MapperBuilder<T> {
        Self::builder_with(MapperSettings::default())
    }

    pub fn builder_with(settings: MapperSettings) -> MapperBuilder<T> {
        MapperBuilder::new(settings).codec(JsonCodec)
    }
}

impl<T> EntityMapper<T> {
    pub(crate) fn new(
        fields: Vec<FieldDecl<T>>,
        id: Option<IdAccessor<T>>,
        field_types: FieldTypes,
        analyzers: BTreeMap<String, String>,
        codec: Arc<dyn PayloadCodec<T>>,
    ) -> Self {
        EntityMapper {
            fields,
            id,
            field_types,
            analyzers,
            codec,
        }
    }

    /// Declared field names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

impl<T> fmt::Debug for EntityMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("{} ({}, {:?})", field.name, field.role, field.value_type))
            .collect();
        f.debug_struct("EntityMapper")
            .field("has_id", &self.id.is_some())
            .field("fields", &fields)
            .field("analyzers", &self.analyzers)
            .finish()
    }
}

impl<T> DocumentMapper<T> for EntityMapper<T> {
    fn to_record(&self, element: &T) -> Result<Record> {
        let mut record = Record::new();
        if let Some(id) = &self.id {
            let id = id(element);
            record.add(ID_FIELD, FieldValue::Keyword(id.clone()));
            record.add(ID_FIELD, FieldValue::Stored(StoredValue::Str(id)));
        }
        record.add(SOURCE_FIELD, FieldValue::Stored(self.codec.encode(element)?));
        for field in &self.fields {
            (field.emit)(element, &mut record);
        }
        Ok(record)
    }

    fn from_record(&self, record: &Record) -> Result<T> {
        let payload = record
            .stored(SOURCE_FIELD)
            .ok_or_else(|| IndexError::Decode(format!("missing payload field '{}'", SOURCE_FIELD)))?;
        self.codec.decode(payload)
    }

    fn element_id(&self, element: &T) -> Result<String> {
        self.id
            .as_ref()
            .map(|id| id(element))
            .ok_or_else(|| IndexError::UnsupportedOperation("no identifier declared".to_string()))
    }

    fn id_field(&self) -> Option<&str> {
        self.id.as_ref().map(|_| ID_FIELD)
    }

    fn field_types(&self) -> &FieldTypes {
        &self.field_types
    }

    fn analyzers(&self) -> &BTreeMap<String, String> {
        &self.analyzers
    }

    fn payload_field(&self) -> Option<&str> {
        Some(SOURCE_FIELD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Number, SortKey, SortType};
    use crate::mapper::field::IndexedFieldType;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Product {
        id: String,
        name: String,
        size: i32,
        tags: Vec<String>,
        weight: Option<f64>,
    }

    fn product() -> Product {
        Product {
            id: "p-1".into(),
            name: "Red Box".into(),
            size: 42,
            tags: vec!["red".into(), "box".into()],
            weight: None,
        }
    }

    fn mapper() -> EntityMapper<Product> {
        EntityMapper::builder()
            .id(|p: &Product| p.id.clone())
            .field("name", IndexedFieldType::Auto, |p: &Product| p.name.clone())
            .field("size", IndexedFieldType::Point, |p: &Product| p.size)
            .sorted_field("theSize", |p: &Product| p.size)
            .repeated_field("tags", IndexedFieldType::Keyword, |p: &Product| p.tags.clone())
            .optional_field("weight", IndexedFieldType::Auto, |p: &Product| p.weight)
            .build()
            .unwrap()
    }

    #[test]
    fn test_record_round_trip() {
        let mapper = mapper();
        let record = mapper.to_record(&product()).unwrap();
        assert_eq!(mapper.from_record(&record).unwrap(), product());
        assert_eq!(mapper.element_id(&product()).unwrap(), "p-1");
        assert_eq!(mapper.element_id(&product()).unwrap(), mapper.element_id(&product()).unwrap());
    }

    #[test]
    fn test_point_and_sorted_alias() {
        let record = mapper().to_record(&product()).unwrap();
        assert!(record.values("size").any(|v| *v == FieldValue::Point(Number::Int(42))));
        assert_eq!(record.sort_key("theSize"), Some(&SortKey::Long(42)));
        assert_eq!(record.sort_key("size"), None);
        assert_eq!(record.keywords("tags").collect::<Vec<_>>(), vec!["red", "box"]);
        assert_eq!(record.values("weight").count(), 0);
    }

    #[test]
    fn test_field_types() {
        let mapper = mapper();
        assert_eq!(mapper.field_type("name").unwrap(), ValueType::String);
        assert_eq!(mapper.field_type("size").unwrap(), ValueType::Integer);
        assert_eq!(mapper.field_type("weight").unwrap(), ValueType::Double);
        assert!(matches!(mapper.field_type("theSize"), Err(IndexError::UnknownField(_))));
        assert_eq!(mapper.sort_type("theSize"), Some(SortType::Int));
        assert_eq!(mapper.sort_type("size"), None);
        assert_eq!(mapper.analyzers().get("tags").map(String::as_str), Some("keyword"));
        assert_eq!(mapper.id_field(), Some(ID_FIELD));
    }

    #[test]
    fn test_missing_payload_and_id() {
        let mapper = mapper();
        let err = mapper.from_record(&Record::new()).unwrap_err();
        assert!(matches!(err, IndexError::Decode(_)));

        let anonymous: EntityMapper<Product> = EntityMapper::builder().build().unwrap();
        let err = anonymous.element_id(&product()).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedOperation(_)));
        assert_eq!(anonymous.id_field(), None);
    }
}
