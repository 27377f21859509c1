use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use entidx::{
    Config, IndexError, IndexFactory, IndexOptions, IndexQuery, IndexReader, IndexWriter, IndexedFieldType, Index,
    Occur, TermOccur,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BlogPost {
    id: u32,
    body: String,
}

fn post(id: u32, body: &str) -> BlogPost {
    BlogPost { id, body: body.to_string() }
}

fn factory(dir: &TempDir, extra: &str) -> IndexFactory {
    let toml = format!(
        "indexes_dir = {:?}\ndefault_analyzer = \"english\"\n{}",
        dir.path().display().to_string(),
        extra
    );
    IndexFactory::new(Config::from_toml_str(&toml).unwrap()).unwrap()
}

fn build(factory: &IndexFactory) -> entidx::EntityIndex<BlogPost> {
    let mapper = factory
        .mapper::<BlogPost>()
        .unwrap()
        .id(|p: &BlogPost| p.id)
        .field("body", IndexedFieldType::Auto, |p: &BlogPost| p.body.clone())
        .build()
        .unwrap();
    factory.build_index(mapper).unwrap()
}

#[test]
fn test_committed_on_close_and_reopened() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, "");
    let index = build(&factory);
    assert_eq!(index.path(), dir.path().join("blog_post"));

    let writer = index.open_writer().unwrap();
    writer.add(&[post(1, "She runs every morning"), post(2, "The lake was calm")]).unwrap();
    writer.close().unwrap();

    let reopened = build(&factory);
    let reader = reopened.open_reader().unwrap();
    assert_eq!(reader.count().unwrap(), 2);
    assert_eq!(reader.get("1").unwrap(), post(1, "She runs every morning"));

    let stemmed = reader
        .prepare_query()
        .with_terms("body", "running", Occur::Must, TermOccur::Should, 1.0)
        .build()
        .unwrap();
    let found = reader.list(&stemmed).unwrap();
    assert_eq!(found, vec![post(1, "She runs every morning")]);

    let stop_words_only = reader
        .prepare_query()
        .with_terms("body", "the", Occur::Must, TermOccur::Should, 1.0)
        .build()
        .unwrap();
    assert_eq!(reader.count_query(&stop_words_only).unwrap(), 2);
    reader.close().unwrap();
}

#[test]
fn test_close_without_commit_discards_changes() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, "[writer]\ncommit_on_close = false\n");
    let index = build(&factory);

    let writer = index.open_writer().unwrap();
    writer.add(&[post(1, "first")]).unwrap();
    writer.commit().unwrap();
    writer.add(&[post(2, "second")]).unwrap();
    writer.close().unwrap();
    assert!(matches!(writer.add(&[post(3, "third")]), Err(IndexError::Closed(_))));

    let reader = index.open_reader().unwrap();
    assert_eq!(reader.count_query(&IndexQuery::all()).unwrap(), 1);
    assert!(reader.find_one("2").unwrap().is_none());
    reader.close().unwrap();
}

#[test]
fn test_named_index_and_bad_config() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, "");
    let mapper = factory
        .mapper::<BlogPost>()
        .unwrap()
        .id(|p: &BlogPost| p.id)
        .build()
        .unwrap();
    let index = factory
        .build_index_with(mapper, IndexOptions::named("drafts"))
        .unwrap();
    assert_eq!(index.path(), dir.path().join("drafts"));

    let err = Config::from_toml_str("list_batch_size = 0").unwrap_err();
    assert!(matches!(err, IndexError::Configuration { .. }));
    let err = Config::from_toml_str("default_string_type = \"Point\"").unwrap_err();
    assert!(matches!(err, IndexError::Configuration { .. }));
}
