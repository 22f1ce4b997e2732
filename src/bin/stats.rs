use archgraph::{config::Config, db::Db, error::GraphError};

/// Node label or edge kind with its backing table
const COUNTED: &[(&str, &str)] = &[
    ("Process", "SELECT COUNT(*) FROM process"),
    ("Component", "SELECT COUNT(*) FROM component"),
    ("Metric", "SELECT COUNT(*) FROM metric"),
    ("includes", "SELECT COUNT(*) FROM includes"),
    ("targets", "SELECT COUNT(*) FROM targets"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.archgraph.log_level),
    )
    .init();

    let db: Db = config.open_db();

    println!("\n=== archgraph Statistics ===\n");

    let counts = db.with_connection(|conn| {
        let mut results = Vec::new();
        for (label, sql) in COUNTED {
            let count = conn.query_row(sql, [], |row| row.get::<_, i64>(0))?;
            results.push((*label, count));
        }
        Ok::<Vec<_>, GraphError>(results)
    }).await?;

    println!("{:-<40}", "");
    println!("{:<20} {:>12}", "Label / Kind", "Count");
    println!("{:-<40}", "");
    for (label, count) in &counts {
        println!("{:<20} {:>12}", label, count);
    }
    println!("{:-<40}", "");

    // Weight distribution across includes edges
    let weights = db.with_connection(|conn| {
        conn.query_row(
            "SELECT MIN(weight), MAX(weight), AVG(weight) FROM includes",
            [],
            |row| Ok((
                row.get::<_, Option<f64>>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
            )),
        ).map_err(GraphError::from)
    }).await?;

    if let (Some(min), Some(max), Some(avg)) = weights {
        println!("\nincludes weight: min {:.2}, max {:.2}, avg {:.2}", min, max, avg);
    }

    // Duplicate (process, weight) pairs make weight-keyed edits ambiguous
    let ambiguous = db.with_connection(|conn| {
        conn.query_row(
            r#"
            SELECT COUNT(*) FROM (
                SELECT process_uid, weight FROM includes
                GROUP BY process_uid, weight
                HAVING COUNT(*) > 1
            )
            "#,
            [],
            |row| row.get::<_, i64>(0),
        ).map_err(GraphError::from)
    }).await?;

    if ambiguous > 0 {
        println!("\n⚠ {} (process, weight) pairs are shared by several includes edges.", ambiguous);
        println!("  Weight-keyed updates only touch the earliest of them; use edge ids instead.");
    }

    println!();

    Ok(())
}
