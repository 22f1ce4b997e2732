use archgraph::db::{migrate, Db};
use archgraph::error::GraphError;
use archgraph::{Api, Config};
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.archgraph.log_level)
    ).init();
    log::info!("Configuration loaded successfully");

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "list" => {
            run_list(&config).await?;
        }
        _ => {
            run_schema_verification(&config).await?;
        }
    }

    Ok(())
}

/// Open the store and bring the schema up to date
async fn open_store(config: &Config) -> Result<Db> {
    log::info!("Database path: {}", config.db_path().display());

    let db = config.open_db();
    db.with_connection(migrate::run_migrations).await?;
    log::info!("Database initialized successfully");

    Ok(db)
}

/// Print the process list envelope as JSON
async fn run_list(config: &Config) -> Result<()> {
    let db = open_store(config).await?;
    let api = Api::new(db);

    match api.get_process_list().await {
        Ok(envelope) => println!("{}", serde_json::to_string_pretty(&envelope)?),
        Err(e) => {
            log::error!("Listing processes failed ({}): {}", e.status_code(), e.public_message());
            return Err(e.into());
        }
    }

    Ok(())
}

/// Run database schema verification
async fn run_schema_verification(config: &Config) -> Result<()> {
    log::info!("Starting archgraph v{}", env!("CARGO_PKG_VERSION"));

    let db = open_store(config).await?;
    verify_database_schema(&db).await?;

    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = ["process", "component", "metric", "includes", "targets", "schema_migrations"];
        let mut all_tables_exist = true;

        for table in &expected_tables {
            if !tables.iter().any(|t| t == table) {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            } else {
                log::debug!("✓ Table exists: {}", table);
            }
        }

        if !all_tables_exist {
            return Err(GraphError::Config("Not all required tables exist".to_string()));
        }

        let applied = migrate::get_applied_migrations(conn)?;
        if applied.len() < migrate::known_migrations() {
            return Err(GraphError::Config(format!(
                "Expected {} migrations, found {}",
                migrate::known_migrations(),
                applied.len()
            )));
        }
        log::debug!("✓ {} migrations applied", applied.len());

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(GraphError::Config("Foreign keys not enabled".to_string()));
        }
        log::debug!("✓ Foreign keys enabled");

        // Edges whose endpoints vanished would mean a cascade was skipped
        let dangling: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pragma_foreign_key_check",
            [],
            |row| row.get(0),
        )?;
        if dangling != 0 {
            return Err(GraphError::Config(format!("{} dangling edges found", dangling)));
        }
        log::debug!("✓ No dangling edges");

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(GraphError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
