pub mod builder;
pub mod codec;
pub mod document_mapper;
pub mod entity_mapper;
pub mod field;
pub mod record_mapper;
pub mod value;

pub use builder::{MapperBuilder, MapperSettings};
pub use codec::{BincodeCodec, JsonCodec, PayloadCodec};
pub use document_mapper::{DocumentMapper, ID_FIELD, SOURCE_FIELD};
pub use entity_mapper::EntityMapper;
pub use field::{FieldTypes, IndexedFieldType};
pub use record_mapper::RecordMapper;
pub use value::{IndexRange, IndexValue};
