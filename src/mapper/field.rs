use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::core::error::{IndexError, Result};
use crate::core::types::{SortType, ValueType};

/// How a declared field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexedFieldType {
    /// Point for numeric and temporal values, the default string type otherwise.
    Auto,
    /// Single term, kept as is.
    Keyword,
    /// Single term, kept as is. Query text for it goes through the field's
    /// analyzer, unlike `Keyword`.
    String,
    /// Analyzed text.
    Text,
    /// Numeric value, range queryable.
    Point,
    /// Column value usable for sorting; neither searchable nor stored.
    DocValues,
}

impl IndexedFieldType {
    /// Types usable as the default for string values.
    pub fn is_string_type(&self) -> bool {
        matches!(
            self,
            IndexedFieldType::Keyword | IndexedFieldType::String | IndexedFieldType::Text
        )
    }
}

/// Resolved type tables of a mapper.
///
/// Query translation only needs these: value types drive range parsing, sort
/// types drive sort compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTypes {
    indexed: BTreeMap<String, ValueType>,
    sorted: BTreeMap<String, SortType>,
    default_type: Option<ValueType>,
}

impl FieldTypes {
    pub fn new() -> Self {
        FieldTypes::default()
    }

    /// Type reported for fields that were never declared.
    pub fn with_default(mut self, value_type: ValueType) -> Self {
        self.default_type = Some(value_type);
        self
    }

    pub fn with_indexed(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.insert_indexed(name, value_type);
        self
    }

    pub fn with_sorted(mut self, name: impl Into<String>, sort_type: SortType) -> Self {
        self.insert_sorted(name, sort_type);
        self
    }

    pub fn insert_indexed(&mut self, name: impl Into<String>, value_type: ValueType) {
        self.indexed.insert(name.into(), value_type);
    }

    pub fn insert_sorted(&mut self, name: impl Into<String>, sort_type: SortType) {
        self.sorted.insert(name.into(), sort_type);
    }

    pub fn value_type(&self, name: &str) -> Result<ValueType> {
        self.indexed
            .get(name)
            .copied()
            .or(self.default_type)
            .ok_or_else(|| IndexError::UnknownField(name.to_string()))
    }

    pub fn sort_type(&self, name: &str) -> Option<SortType> {
        self.sorted.get(name).copied()
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = (&str, ValueType)> {
        self.indexed.iter().map(|(name, value_type)| (name.as_str(), *value_type))
    }

    pub fn sorted_fields(&self) -> impl Iterator<Item = (&str, SortType)> {
        self.sorted.iter().map(|(name, sort_type)| (name.as_str(), *sort_type))
    }
}
