//! CampusCandid Seeder
//!
//! Replaces the graph store's contents with the college fixture dataset:
//! 1. Deletes every node and relationship
//! 2. Creates the fixture nodes
//! 3. Creates the fixture relationships
//! 4. Removes the temporary seed keys
//!
//! All statements run in a single transaction. `seeder plan` prints the
//! statements without connecting.

use campuscandid_common::{
    config::{AppConfig, GraphBackend},
    graph::{fixtures::college_dataset, Neo4jStore},
    retry::with_retry,
    VERSION,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.observability.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting CampusCandid Seeder v{}", VERSION);

    let dataset = college_dataset();
    let statements = dataset.seed_statements();

    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("plan") {
        for statement in &statements {
            println!("{}", statement.statement);
        }
        return Ok(());
    }

    if config.graph.backend != GraphBackend::Neo4j {
        warn!("graph.backend is not neo4j, nothing to seed");
        return Ok(());
    }

    let store = Neo4jStore::new(&config.graph)?;
    info!(
        url = %config.graph.url,
        database = %config.graph.database,
        nodes = dataset.nodes.len(),
        relationships = dataset.edges.len(),
        "Seeding graph store"
    );

    match with_retry(&config.retry, "graph.seed", || store.run_in_transaction(&statements)).await {
        Ok(()) => {
            info!("Graph store seeded successfully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Seeding failed");
            Err(e.into())
        }
    }
}
