use anyhow::{Context, Result};
use archgraph::db::migrate;
use archgraph::{Config, Metrics};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "import_metrics")]
#[command(about = "Import metric definitions (name, description) from a CSV file")]
struct Args {
    /// CSV file: first column name, second column description
    path: PathBuf,

    /// Skip the first row as a header
    #[arg(long)]
    headers: bool,
}

/// Read `(name, description)` pairs. The description column may be missing.
fn read_pairs(args: &Args) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(args.headers)
        .flexible(true)
        .from_path(&args.path)
        .with_context(|| format!("Failed to open {}", args.path.display()))?;

    let mut pairs = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV record {}", line + 1))?;
        let name = record
            .get(0)
            .with_context(|| format!("CSV record {} has no name column", line + 1))?;
        let description = record.get(1).unwrap_or_default();
        pairs.push((name.to_string(), description.to_string()));
    }

    Ok(pairs)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.archgraph.log_level)
    ).init();

    let db = config.open_db();
    db.with_connection(migrate::run_migrations).await?;

    let pairs = read_pairs(&args)?;
    if pairs.is_empty() {
        log::warn!("No metrics found in {}", args.path.display());
        return Ok(());
    }
    log::info!("Read {} metric rows from {}", pairs.len(), args.path.display());

    let imported = Metrics::new(db).import(pairs).await?;
    println!("Imported {} metrics", imported);

    Ok(())
}
