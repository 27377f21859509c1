/// Complete entidx API Demo
///
/// Demonstrates the main index operations:
/// - Mapping a Rust type to indexed fields
/// - Add, update and delete by identifier
/// - Structured, parsed and scored queries with sorting and paging
/// - Sharing one reader/writer pair through IndexHolder
/// - Rebuilding an index under a new mapping

use entidx::{
    Config, EntityMapper, Index, IndexFactory, IndexHolder, IndexOptions, IndexReader, IndexSort, IndexWriter,
    IndexedFieldType, NoProgress, Occur, ScoredElement, SortDirection, TermOccur,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Book {
    isbn: String,
    title: String,
    summary: String,
    pages: i32,
    tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Title {
    isbn: String,
    title: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║        entidx - Complete API Demo             ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    // Step 1: Create the factory and index
    println!("Step 1: Creating index...");
    let root = tempfile::tempdir()?;
    let config = Config {
        indexes_dir: root.path().to_path_buf(),
        ..Config::default()
    };
    let factory = IndexFactory::new(config)?;
    let mapper = factory
        .mapper::<Book>()?
        .id(|b: &Book| b.isbn.clone())
        .field("title", IndexedFieldType::Text, |b: &Book| b.title.clone())
        .field("summary", IndexedFieldType::Text, |b: &Book| b.summary.clone())
        .field("pages", IndexedFieldType::Point, |b: &Book| b.pages)
        .sorted_field("pages", |b: &Book| b.pages)
        .repeated_field("tags", IndexedFieldType::Keyword, |b: &Book| b.tags.clone())
        .build()?;
    let index = factory.build_index_with(mapper, IndexOptions::named("books").with_default_analyzer("english"))?;
    println!("  Index at {}\n", index.path().display());

    // Step 2: ADD through a holder
    println!("Step 2: ADD - Adding books...");
    let holder = IndexHolder::<Book, _>::new(index);
    let writer = holder.writer()?;
    writer.add(&[
        book("111", "Programming Rust", "Systems programming with ownership", 720, &["rust", "systems"]),
        book("222", "Database Internals", "How storage engines and distributed databases work", 370, &["databases"]),
        book("333", "Rust for Rustaceans", "Idiomatic programming for experienced Rust developers", 280, &["rust"]),
        book("444", "Designing Data-Intensive Applications", "Reliable, scalable data systems", 610, &["databases", "systems"]),
    ])?;
    writer.commit()?;
    let reader = holder.reader()?;
    println!("  {} books indexed\n", reader.count()?);

    // Step 3: FIND by identifier
    println!("Step 3: FIND - Looking up by ISBN...");
    for book in reader.find(&["111", "444"])? {
        println!("  {} -> {}", book.isbn, book.title);
    }
    println!("  '999' present: {}\n", reader.find_one("999")?.is_some());

    // Step 4: QUERY - Structured, sorted, paged
    println!("Step 4: QUERY - Running structured queries...");
    let rust_books = reader
        .prepare_query()
        .with_keyword("tags", "rust", Occur::Must, 1.0)
        .sort(IndexSort::by("pages", SortDirection::Asc))
        .build()?;
    for book in reader.list(&rust_books)? {
        println!("  tags:rust by pages -> {} ({} pages)", book.title, book.pages);
    }

    let long_books = reader
        .prepare_query()
        .with_range("pages", Some(500), None, Occur::Must, 1.0)
        .build()?;
    println!("  pages >= 500: {} books", reader.count_query(&long_books)?);

    let page = reader
        .prepare_query()
        .sort(IndexSort::by("pages", SortDirection::Desc))
        .skip(1)
        .limit(2)
        .build()?;
    let mut cursor = reader.query(&page, 1)?;
    println!("  page 2 of size 2, {} total:", cursor.total_hits()?);
    while cursor.has_next()? {
        println!("    {}", cursor.next_element()?.title);
    }
    println!();

    // Step 5: SCORED - Relevance ranking
    println!("Step 5: SCORED - Ranking by relevance...");
    let scored = reader
        .prepare_query()
        .with_terms("summary", "programming systems", Occur::Must, TermOccur::Should, 1.0)
        .with_phrase("title", "programming rust", Occur::Should, 0, 2.0)
        .build()?;
    let hits = reader.scored_list(&scored)?;
    print!("{}", ScoredElement::print_with(&hits, |b: &Book| b.title.clone()));

    let parsed = reader
        .prepare_query()
        .with_text_query("summary", "databases OR title:\"rust for\"", Occur::Must, 1.0)
        .build()?;
    for book in reader.list(&parsed)? {
        println!("  parsed -> {}", book.title);
    }
    println!();

    // Step 6: UPDATE and DELETE
    println!("Step 6: UPDATE/DELETE - Changing books...");
    writer.update_one(&book("222", "Database Internals, 2nd ed.", "Storage engines revisited", 410, &["databases"]))?;
    writer.delete_one("333")?;
    println!("  222 is now '{}'", reader.get("222")?.title);
    println!("  {} books remain", reader.count()?);

    let thin = reader
        .prepare_query()
        .with_range("pages", None, Some(450), Occur::Must, 1.0)
        .build()?;
    writer.delete_query(&thin)?;
    writer.commit()?;
    println!("  after deleting thin books: {}\n", reader.count()?);

    // Closing shared handles does nothing; the holder owns them
    writer.close()?;
    reader.close()?;
    holder.close();

    // Step 7: REBUILD under a narrower mapping
    println!("Step 7: REBUILD - Reindexing titles only...");
    let titles = EntityMapper::<Title>::builder()
        .id(|t: &Title| t.isbn.clone())
        .field("title", IndexedFieldType::Text, |t: &Title| t.title.clone())
        .build()?;
    let rebuilt = holder.index().rebuild::<Title, _>(
        Arc::new(titles),
        |b: Book| Title { isbn: b.isbn, title: b.title },
        &NoProgress,
    )?;
    let reader = rebuilt.open_reader()?;
    for title in reader.list(&entidx::IndexQuery::all())? {
        println!("  {} -> {}", title.isbn, title.title);
    }
    reader.close()?;

    println!("\n✓ Demo complete!");
    Ok(())
}

fn book(isbn: &str, title: &str, summary: &str, pages: i32, tags: &[&str]) -> Book {
    Book {
        isbn: isbn.to_string(),
        title: title.to_string(),
        summary: summary.to_string(),
        pages,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}
