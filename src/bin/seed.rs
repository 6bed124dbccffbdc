//! Reset the configured store and load demo riders around Guadalajara.
//!
//! Usage: `cargo run --bin seed` (honours the same environment as the server).

use pedalea_conquista::{config::Config, db, services::seed};
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pedalea_conquista=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let store = db::connect(&config).await?;

    let mut rng = rand::rngs::StdRng::from_entropy();
    let summary = seed::seed(store.as_ref(), &mut rng).await?;

    tracing::info!(
        users = summary.users,
        routes = summary.routes,
        territories = summary.territories,
        password = seed::SEED_PASSWORD,
        "Demo data loaded; sign in with any seeded email"
    );
    Ok(())
}
