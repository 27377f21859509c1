use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::analysis::{AnalyzerRegistry, PerFieldAnalyzer};
use crate::api::index::{Index, IndexReader, IndexWriter, ProgressCallback};
use crate::core::config::{Config, WriterConfig};
use crate::core::error::{IndexError, Result};
use crate::entity::reader::EntityReader;
use crate::entity::writer::EntityWriter;
use crate::mapper::builder::MapperSettings;
use crate::mapper::document_mapper::DocumentMapper;
use crate::mvcc::snapshot::SnapshotTracker;
use crate::query::builder::QueryContext;
use crate::reader::reader_pool::{ReaderManager, ReaderSource};
use crate::reader::snapshot_reader::DirectoryReader;
use crate::storage::layout::StorageLayout;
use crate::writer::index_writer::IndexWriter as BackendWriter;

/// Tuning values read from [`Config`].
#[derive(Debug, Clone)]
pub(crate) struct IndexSettings {
    pub(crate) total_hits_threshold: usize,
    pub(crate) list_batch_size: usize,
    pub(crate) reindex_batch_size: usize,
    pub(crate) reindex_fetch_size: usize,
    pub(crate) writer: WriterConfig,
}

impl IndexSettings {
    fn from_config(config: &Config) -> Self {
        IndexSettings {
            total_hits_threshold: config.total_hits_threshold,
            list_batch_size: config.list_batch_size,
            reindex_batch_size: config.reindex_batch_size,
            reindex_fetch_size: config.reindex_fetch_size,
            writer: config.writer.clone(),
        }
    }
}

/// State shared by an index and every reader and writer it opened.
pub(crate) struct IndexCore<T> {
    pub(crate) path: PathBuf,
    pub(crate) mapper: Arc<dyn DocumentMapper<T>>,
    pub(crate) analyzer: Arc<PerFieldAnalyzer>,
    pub(crate) query_context: QueryContext,
    pub(crate) settings: IndexSettings,
    pub(crate) tracker: Arc<SnapshotTracker>,
}

impl<T> IndexCore<T> {
    pub(crate) fn id_field(&self) -> Result<&str> {
        self.mapper
            .id_field()
            .ok_or_else(|| IndexError::UnsupportedOperation("no identifier declared for this index".into()))
    }
}

/// An index of `T` elements stored under one directory.
///
/// ```ignore
/// let index = EntityIndex::new(dir.join("products"), mapper)?;
/// let writer = index.open_writer()?;
/// writer.add(&products)?;
/// let reader = index.open_reader_with(&writer)?;
/// let red = reader.list(&reader.prepare_query().with_terms("name", "red", Occur::Must, TermOccur::Should, 1.0).build()?)?;
/// ```
pub struct EntityIndex<T> {
    core: Arc<IndexCore<T>>,
    config: Config,
    registry: Arc<AnalyzerRegistry>,
}

impl<T: 'static> EntityIndex<T> {
    /// Index with the default configuration and built-in analyzers.
    pub fn new(path: impl Into<PathBuf>, mapper: impl DocumentMapper<T> + 'static) -> Result<Self> {
        Self::with_config(
            path,
            Arc::new(mapper),
            &Config::default(),
            Arc::new(AnalyzerRegistry::new()),
        )
    }

    /// Resolves the mapper's analyzers against `registry`, falling back to
    /// the configured default analyzer.
    pub fn with_config(
        path: impl Into<PathBuf>,
        mapper: Arc<dyn DocumentMapper<T>>,
        config: &Config,
        registry: Arc<AnalyzerRegistry>,
    ) -> Result<Self> {
        Self::with_analyzer(path, mapper, config, registry, &config.default_analyzer)
    }

    pub(crate) fn with_analyzer(
        path: impl Into<PathBuf>,
        mapper: Arc<dyn DocumentMapper<T>>,
        config: &Config,
        registry: Arc<AnalyzerRegistry>,
        default_analyzer: &str,
    ) -> Result<Self> {
        config.validate()?;
        let path = path.into();
        let analyzer = Arc::new(registry.per_field(default_analyzer, mapper.analyzers())?);
        let zone = MapperSettings::from_config(config)?.zone_offset;
        let query_context = QueryContext::new(
            Arc::clone(&analyzer),
            Arc::new(mapper.field_types().clone()),
            zone,
        );
        debug!(path = %path.display(), analyzer = default_analyzer, "entity index created");

        Ok(EntityIndex {
            core: Arc::new(IndexCore {
                path,
                mapper,
                analyzer,
                query_context,
                settings: IndexSettings::from_config(config),
                tracker: SnapshotTracker::new(),
            }),
            config: config.clone(),
            registry,
        })
    }

    pub fn path(&self) -> &Path {
        &self.core.path
    }

    pub fn mapper(&self) -> &dyn DocumentMapper<T> {
        self.core.mapper.as_ref()
    }

    /// Counts snapshots opened by this index's readers.
    pub fn tracker(&self) -> &SnapshotTracker {
        &self.core.tracker
    }

    pub fn query_context(&self) -> &QueryContext {
        &self.core.query_context
    }

    /// Rebuilds this index under a new mapping.
    ///
    /// Elements are reindexed into `<path>_tmp`, whose files then replace the
    /// original ones. The original is left untouched when reindexing fails.
    /// No reader or writer of this index may be open meanwhile.
    pub fn rebuild<V, F>(
        &self,
        mapper: Arc<dyn DocumentMapper<V>>,
        transform: F,
        progress: &dyn ProgressCallback,
    ) -> Result<EntityIndex<V>>
    where
        V: 'static,
        F: FnMut(T) -> V,
    {
        let target_path = temp_path(&self.core.path);
        remove_path(&target_path)?;

        let target = EntityIndex::with_config(
            &target_path,
            Arc::clone(&mapper),
            &self.config,
            Arc::clone(&self.registry),
        )?;
        self.reindex(&target, transform, progress)?;
        drop(target);

        replace_contents(&target_path, &self.core.path)?;
        info!(path = %self.core.path.display(), "index rebuilt");
        EntityIndex::with_config(self.core.path.clone(), mapper, &self.config, Arc::clone(&self.registry))
    }

    fn storage(&self) -> Result<StorageLayout> {
        StorageLayout::new(self.core.path.clone())
    }
}

impl<T: 'static> Index<T> for EntityIndex<T> {
    type Writer = EntityWriter<T>;
    type Reader = EntityReader<T>;

    fn open_writer(&self) -> Result<EntityWriter<T>> {
        let backend = BackendWriter::open(
            self.storage()?,
            Arc::clone(&self.core.analyzer),
            self.core.settings.writer.clone(),
            Arc::clone(&self.core.tracker),
        )?;
        Ok(EntityWriter::new(Arc::clone(&self.core), backend))
    }

    fn open_reader(&self) -> Result<EntityReader<T>> {
        let directory = DirectoryReader::open(
            self.storage()?,
            Arc::clone(&self.core.analyzer),
            Arc::clone(&self.core.tracker),
        );
        let manager = ReaderManager::new(ReaderSource::Directory(Arc::new(directory)));
        Ok(EntityReader::new(Arc::clone(&self.core), manager))
    }

    fn open_reader_with(&self, writer: &EntityWriter<T>) -> Result<EntityReader<T>> {
        let manager = ReaderManager::new(ReaderSource::Writer(Arc::clone(writer.backend())));
        Ok(EntityReader::new(Arc::clone(&self.core), manager))
    }

    fn reindex<V, I, F>(&self, target: &I, transform: F, progress: &dyn ProgressCallback) -> Result<()>
    where
        I: Index<V>,
        F: FnMut(T) -> V,
    {
        let reader = self.open_reader()?;
        let writer = target.open_writer()?;
        let result = reader.reindex_into(&writer, transform, progress);
        let closed = writer.close();
        if let Err(error) = reader.close() {
            warn!(%error, "failed to close reindex reader");
        }
        result.and(closed)
    }
}

impl<T> std::fmt::Debug for EntityIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityIndex")
            .field("path", &self.core.path)
            .field("live_snapshots", &self.core.tracker.live())
            .finish()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push("_tmp");
    PathBuf::from(name)
}

fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Empties `target`, moves every entry of `source` into it and removes
/// `source`.
fn replace_contents(source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(target)? {
        remove_path(&entry?.path())?;
    }
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        fs::rename(entry.path(), target.join(entry.file_name()))?;
    }
    fs::remove_dir(source)?;
    debug!(from = %source.display(), to = %target.display(), "index files moved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(temp_path(Path::new("/data/products")), PathBuf::from("/data/products_tmp"));
    }

    #[test]
    fn test_replace_contents() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a_tmp");
        let target = dir.path().join("a");
        fs::create_dir_all(source.join("segments")).unwrap();
        fs::write(source.join("segments").join("new.seg"), b"new").unwrap();
        fs::create_dir_all(target.join("segments")).unwrap();
        fs::write(target.join("segments").join("old.seg"), b"old").unwrap();
        fs::write(target.join(".lock"), b"").unwrap();

        replace_contents(&source, &target).unwrap();
        assert!(!source.exists());
        assert!(target.join("segments").join("new.seg").exists());
        assert!(!target.join("segments").join("old.seg").exists());
        assert!(!target.join(".lock").exists());

        remove_path(&dir.path().join("missing")).unwrap();
    }
}
