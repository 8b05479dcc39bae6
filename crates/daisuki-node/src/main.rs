//! Daisuki Node binary
//!
//! Japanese-only posting with capacity-limited kanji identities.

use daisuki_node::{DaisukiNode, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daisuki_node=info,daisuki_slots=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Daisuki Node");

    let config = NodeConfig::from_env()?;

    let node = DaisukiNode::new(config).await?;
    node.run().await?;

    Ok(())
}
