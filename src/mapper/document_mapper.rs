use std::collections::BTreeMap;
use crate::core::error::Result;
use crate::core::types::{Record, SortType, ValueType};
use crate::mapper::field::FieldTypes;

/// Field holding the identifier, indexed as a keyword and stored.
pub const ID_FIELD: &str = "_id";

/// Field holding the serialized entity.
pub const SOURCE_FIELD: &str = "_source";

/// Translation between an entity type and backend records.
pub trait DocumentMapper<T>: Send + Sync {
    fn to_record(&self, element: &T) -> Result<Record>;

    /// Fails with `Decode` when the payload is missing or corrupt.
    fn from_record(&self, record: &Record) -> Result<T>;

    /// Fails with `UnsupportedOperation` when no identifier is declared.
    fn element_id(&self, element: &T) -> Result<String>;

    fn id_field(&self) -> Option<&str>;

    fn field_types(&self) -> &FieldTypes;

    /// Per-field analyzer names.
    fn analyzers(&self) -> &BTreeMap<String, String>;

    /// Stored field `from_record` needs, always fetched whatever the projection.
    fn payload_field(&self) -> Option<&str> {
        None
    }

    fn field_type(&self, name: &str) -> Result<ValueType> {
        self.field_types().value_type(name)
    }

    fn sort_type(&self, name: &str) -> Option<SortType> {
        self.field_types().sort_type(name)
    }
}
