use std::sync::Arc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;
use crate::analysis::AnalyzerRegistry;
use crate::core::config::Config;
use crate::core::error::{IndexError, Result};
use crate::entity::index::EntityIndex;
use crate::mapper::builder::{MapperBuilder, MapperSettings};
use crate::mapper::document_mapper::DocumentMapper;
use crate::mapper::entity_mapper::EntityMapper;

/// Per-index overrides of the factory defaults.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Directory name under `indexes_dir`; derived from the type name when unset.
    pub name: Option<String>,
    pub default_analyzer: Option<String>,
}

impl IndexOptions {
    pub fn named(name: impl Into<String>) -> Self {
        IndexOptions {
            name: Some(name.into()),
            default_analyzer: None,
        }
    }

    pub fn with_default_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.default_analyzer = Some(analyzer.into());
        self
    }
}

/// Builds indexes under one root directory with shared defaults.
#[derive(Debug)]
pub struct IndexFactory {
    config: Config,
    registry: Arc<AnalyzerRegistry>,
}

impl IndexFactory {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, Arc::new(AnalyzerRegistry::new()))
    }

    /// Uses `registry` to resolve analyzer names, custom ones included.
    pub fn with_registry(config: Config, registry: Arc<AnalyzerRegistry>) -> Result<Self> {
        config.validate()?;
        registry.get(&config.default_analyzer)?;
        Ok(IndexFactory { config, registry })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    /// Mapper settings carrying the configured string type and zone offset.
    pub fn mapper_settings(&self) -> Result<MapperSettings> {
        MapperSettings::from_config(&self.config)
    }

    pub fn mapper<T>(&self) -> Result<MapperBuilder<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        Ok(EntityMapper::builder_with(self.mapper_settings()?))
    }

    /// Index named after `T`, in snake case.
    pub fn build_index<T: 'static>(&self, mapper: impl DocumentMapper<T> + 'static) -> Result<EntityIndex<T>> {
        self.build_index_with(mapper, IndexOptions::default())
    }

    pub fn build_index_with<T: 'static>(
        &self,
        mapper: impl DocumentMapper<T> + 'static,
        options: IndexOptions,
    ) -> Result<EntityIndex<T>> {
        let name = match options.name.as_deref().map(str::trim) {
            Some("") => return Err(IndexError::invalid_argument("index name must not be blank")),
            Some(name) => name.to_string(),
            None => index_name::<T>(),
        };
        let analyzer = options
            .default_analyzer
            .as_deref()
            .unwrap_or(&self.config.default_analyzer);

        let path = self.config.indexes_dir.join(&name);
        info!(index = %name, path = %path.display(), analyzer, "building index");
        EntityIndex::with_analyzer(path, Arc::new(mapper), &self.config, Arc::clone(&self.registry), analyzer)
    }
}

/// Snake case of the type's own name, generics and module path removed.
pub fn index_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    snake_case(base.rsplit("::").next().unwrap_or(base))
}

/// `ProductItem` becomes `product_item`; runs of capitals stay together, so
/// `HTTPServer` becomes `httpserver`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous_upper = false;
    for (i, c) in name.chars().enumerate() {
        if i == 0 && c == '_' {
            continue;
        }
        if c.is_uppercase() {
            if !previous_upper && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            previous_upper = true;
        } else {
            out.push(c);
            previous_upper = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Record;
    use crate::mapper::field::IndexedFieldType;
    use crate::mapper::record_mapper::RecordMapper;

    struct ProductItem;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("ProductItem"), "product_item");
        assert_eq!(snake_case("HTTPServer"), "httpserver");
        assert_eq!(snake_case("_Private"), "private");
        assert_eq!(snake_case("already_snake"), "already_snake");
        assert_eq!(index_name::<ProductItem>(), "product_item");
        assert_eq!(index_name::<Vec<ProductItem>>(), "vec");
    }

    #[test]
    fn test_indexes_live_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            indexes_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let factory = IndexFactory::new(config).unwrap();

        let index = factory.build_index::<Record>(RecordMapper::default()).unwrap();
        assert_eq!(index.path(), dir.path().join("record"));

        let index = factory
            .build_index_with::<Record>(RecordMapper::default(), IndexOptions::named(" items ").with_default_analyzer("english"))
            .unwrap();
        assert_eq!(index.path(), dir.path().join("items"));

        let err = factory
            .build_index_with::<Record>(RecordMapper::default(), IndexOptions::named(" "))
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));

        let err = factory
            .build_index_with::<Record>(RecordMapper::default(), IndexOptions::default().with_default_analyzer("klingon"))
            .unwrap_err();
        assert!(matches!(err, IndexError::Configuration { .. }));
    }

    #[test]
    fn test_factory_settings_reach_mappers() {
        let config = Config {
            default_string_type: IndexedFieldType::Keyword,
            zone_offset_seconds: 3600,
            ..Config::default()
        };
        let factory = IndexFactory::new(config).unwrap();
        let settings = factory.mapper_settings().unwrap();
        assert_eq!(settings.default_string_type, IndexedFieldType::Keyword);
        assert_eq!(settings.zone_offset.local_minus_utc(), 3600);

        let err = IndexFactory::new(Config {
            default_analyzer: "klingon".into(),
            ..Config::default()
        })
        .unwrap_err();
        assert!(matches!(err, IndexError::Configuration { .. }));
    }
}
