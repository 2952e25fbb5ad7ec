//! # Notes Basic Example
//!
//! Stores a few provenance-tagged notes in an in-memory engine and searches
//! them. Storing an entry twice with identical metadata overwrites it.
//!
//! Run: `cargo run -p notebookml-demos --bin notes_basic`

use notebookml_db::{
    Data, DataKind, DataMeta, DbConfig, EntityMeta, NULL_ENTITY, SourceMeta, VectorDatabase,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // -- 1. Bootstrap ---------------------------------------------------------
    let config = DbConfig::builder().data_container_name("notes").build()?;
    let db = VectorDatabase::from_config(config).await?;

    // -- 2. Store notes ---------------------------------------------------------
    let assistant = EntityMeta::agent("assistant", "agent-assistant");
    let alice = EntityMeta::user("user-alice");

    let greeting = Data::new(
        DataMeta::new(
            DataKind::Content,
            NULL_ENTITY.clone(),
            assistant.clone(),
            SourceMeta::user(),
        ),
        "hello world",
    );
    let items = vec![
        greeting.clone(),
        Data::new(
            DataMeta::new(
                DataKind::Data,
                alice.clone(),
                alice.clone(),
                SourceMeta::document("handbook.pdf#page=4"),
            ),
            "Ownership rules: each value has a single owner.",
        ),
        Data::new(
            DataMeta::new(
                DataKind::Data,
                alice,
                assistant,
                SourceMeta::website("https://doc.rust-lang.org/book/"),
            ),
            "The Rust book explains ownership and borrowing.",
        ),
    ];
    db.add("notes", &items).await?;

    // Same metadata again: replaces the stored greeting instead of duplicating it.
    db.add("notes", &[Data::new(greeting.meta.clone(), "hello again, world")]).await?;

    // -- 3. Search ------------------------------------------------------------
    for query in ["hello", "ownership rules"] {
        println!("\nQuery: \"{query}\"");
        for (i, hit) in db.search("notes", query, 2).await?.iter().enumerate() {
            println!(
                "  {}. [{} by {} ({}), source={}] {}",
                i + 1,
                hit.meta.kind,
                hit.meta.creator.id,
                hit.meta.creator.kind,
                hit.meta.source.kind,
                hit.content,
            );
        }
    }

    println!("\nDone.");
    Ok(())
}
