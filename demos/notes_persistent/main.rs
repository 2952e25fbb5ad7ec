//! # Notes Persistent Example
//!
//! Opens a snapshot-backed database, appends one chat turn per run and lists
//! what has been stored so far.
//!
//! Configuration comes from the environment:
//! - `NOTEBOOKML_CONFIG`: path to a JSON [`DbConfig`] file, or
//! - `NOTEBOOKML_DB_PATH` (default `./notebookml-data/notes.json`) and
//!   `NOTEBOOKML_CONTAINER` (default `chat`).
//!
//! Run: `cargo run -p notebookml-demos --bin notes_persistent -- "some message"`

use notebookml_db::{
    Collection, Data, DataKind, DataMeta, DbConfig, EntityMeta, SourceMeta, VectorDatabase,
    VectorEngine,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn load_config() -> anyhow::Result<DbConfig> {
    if let Ok(path) = std::env::var("NOTEBOOKML_CONFIG") {
        let json = std::fs::read_to_string(&path)?;
        return Ok(DbConfig::from_json_str(&json)?);
    }
    let path = std::env::var("NOTEBOOKML_DB_PATH")
        .unwrap_or_else(|_| "./notebookml-data/notes.json".to_string());
    let container = std::env::var("NOTEBOOKML_CONTAINER").unwrap_or_else(|_| "chat".to_string());
    Ok(DbConfig::builder().data_container_name(container).path(path).build()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = load_config()?;
    let db = VectorDatabase::from_config(config).await?;
    let container = db.data_container_name().to_string();

    let message =
        std::env::args().nth(1).unwrap_or_else(|| "hello from the command line".to_string());
    let user = EntityMeta::user("local-user");
    let meta = DataMeta::new(DataKind::Content, user.clone(), user, SourceMeta::user());
    let turn = Data::new(meta, message);
    db.add(&container, &[turn]).await?;
    info!(collection = %container, "stored chat turn");

    let count = db.engine().get_collection(&container).await?.count().await?;
    println!("{count} turn(s) stored in '{container}'");
    // An empty query scores every turn equally, so ties keep insertion order.
    for hit in db.search(&container, "", count.max(1)).await? {
        println!("  {} | {}", hit.meta.created_datetime.to_rfc3339(), hit.content);
    }
    Ok(())
}

