use std::collections::BTreeMap;
use crate::core::error::{IndexError, Result};
use crate::core::types::{Record, SortType, ValueType};
use crate::mapper::document_mapper::DocumentMapper;
use crate::mapper::field::FieldTypes;

/// Identity mapper over raw records, with explicit type tables.
#[derive(Debug, Clone, Default)]
pub struct RecordMapper {
    id_field: Option<String>,
    field_types: FieldTypes,
    analyzers: BTreeMap<String, String>,
}

impl RecordMapper {
    pub fn new() -> Self {
        RecordMapper::default()
    }

    /// Identifier read from the first keyword or stored string under `field`.
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.field_types.insert_indexed(name, value_type);
        self
    }

    pub fn with_sorted_field(mut self, name: impl Into<String>, sort_type: SortType) -> Self {
        self.field_types.insert_sorted(name, sort_type);
        self
    }

    /// Type of every field not declared explicitly.
    pub fn with_default_type(mut self, value_type: ValueType) -> Self {
        self.field_types = self.field_types.with_default(value_type);
        self
    }

    pub fn with_analyzer(mut self, field: impl Into<String>, analyzer: impl Into<String>) -> Self {
        self.analyzers.insert(field.into(), analyzer.into());
        self
    }
}

impl DocumentMapper<Record> for RecordMapper {
    fn to_record(&self, element: &Record) -> Result<Record> {
        Ok(element.clone())
    }

    fn from_record(&self, record: &Record) -> Result<Record> {
        Ok(record.clone())
    }

    fn element_id(&self, element: &Record) -> Result<String> {
        let field = self
            .id_field
            .as_deref()
            .ok_or_else(|| IndexError::UnsupportedOperation("no identifier field".to_string()))?;
        element
            .keywords(field)
            .next()
            .or_else(|| element.stored_str(field))
            .map(str::to_string)
            .ok_or_else(|| IndexError::invalid_argument(format!("record has no id field '{}'", field)))
    }

    fn id_field(&self) -> Option<&str> {
        self.id_field.as_deref()
    }

    fn field_types(&self) -> &FieldTypes {
        &self.field_types
    }

    fn analyzers(&self) -> &BTreeMap<String, String> {
        &self.analyzers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FieldValue;

    #[test]
    fn test_identity() {
        let mapper = RecordMapper::new()
            .with_id_field("key")
            .with_field("size", ValueType::Integer)
            .with_default_type(ValueType::String);
        let record = Record::new()
            .with("key", FieldValue::Keyword("k1".into()))
            .with("body", FieldValue::Text("hello".into()));

        assert_eq!(mapper.to_record(&record).unwrap(), record);
        assert_eq!(mapper.element_id(&record).unwrap(), "k1");
        assert_eq!(mapper.field_type("size").unwrap(), ValueType::Integer);
        assert_eq!(mapper.field_type("body").unwrap(), ValueType::String);
    }

    #[test]
    fn test_without_id_field() {
        let mapper = RecordMapper::new();
        let err = mapper.element_id(&Record::new()).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedOperation(_)));
        assert!(matches!(mapper.field_type("x"), Err(IndexError::UnknownField(_))));
    }
}
