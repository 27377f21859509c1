pub mod factory;
pub mod index;
pub mod reader;
pub mod writer;

pub use factory::{IndexFactory, IndexOptions, index_name};
pub use index::EntityIndex;
pub use reader::EntityReader;
pub use writer::EntityWriter;
