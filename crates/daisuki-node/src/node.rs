//! Daisuki Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with shared RocksDB storage
//! - HTTP API for clients (catalog, selection wizard, posts)
//! - Unix admin socket for local admin ops (daisuki-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::api;
use crate::error::{Error, Result};
use crate::models::default_catalog;
use crate::storage::Storage;
use daisuki_slots::{SelectionFlow, SlotAllocator};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const DEFAULT_FLOW_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const FLOW_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a Daisuki node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for daisuki-admin CLI)
    pub admin_socket: PathBuf,

    /// Load the built-in kanji catalog on start
    pub seed_catalog: bool,

    /// How long an untouched wizard flow is kept in memory
    pub flow_idle_timeout: Duration,
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let data_dir = PathBuf::from(
            std::env::var("DAISUKI_DATA_DIR").unwrap_or_else(|_| "./daisuki-data".to_string()),
        );

        let api_addr = std::env::var("DAISUKI_API_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e| Error::InvalidInput(format!("Invalid DAISUKI_API_ADDR: {e}")))?;

        let admin_socket = std::env::var("DAISUKI_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("admin.sock"));

        let seed_catalog = match std::env::var("DAISUKI_SEED_CATALOG") {
            Ok(value) => parse_flag(&value).ok_or_else(|| {
                Error::InvalidInput(format!("Invalid DAISUKI_SEED_CATALOG: {value}"))
            })?,
            Err(_) => true,
        };

        let flow_idle_timeout = match std::env::var("DAISUKI_FLOW_IDLE_SECS") {
            Ok(value) => value
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|e| Error::InvalidInput(format!("Invalid DAISUKI_FLOW_IDLE_SECS: {e}")))?,
            Err(_) => DEFAULT_FLOW_IDLE_TIMEOUT,
        };

        Ok(Self {
            data_dir,
            api_addr,
            admin_socket,
            seed_catalog,
            flow_idle_timeout,
        })
    }

    /// Config rooted at `data_dir`, for tests and embedding.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            admin_socket: data_dir.join("admin.sock"),
            api_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            seed_catalog: true,
            flow_idle_timeout: DEFAULT_FLOW_IDLE_TIMEOUT,
            data_dir,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Shared state for the node - single storage instance shared by all components.
pub struct NodeState {
    pub storage: Arc<Storage>,
    pub allocator: SlotAllocator<Storage>,
    pub config: NodeConfig,
    /// Wizard progress per signed-in user
    flows: Mutex<HashMap<String, FlowEntry>>,
}

struct FlowEntry {
    flow: SelectionFlow,
    touched: Instant,
}

impl NodeState {
    pub fn new(storage: Arc<Storage>, config: NodeConfig) -> Self {
        Self {
            allocator: SlotAllocator::new(Arc::clone(&storage)),
            storage,
            config,
            flows: Mutex::new(HashMap::new()),
        }
    }

    fn flows(&self) -> Result<MutexGuard<'_, HashMap<String, FlowEntry>>> {
        self.flows
            .lock()
            .map_err(|_| Error::Storage("flow table lock poisoned".into()))
    }

    /// The user's in-progress flow, if any. An idle flow counts as gone;
    /// `begin` rebuilds it from storage.
    pub fn flow(&self, user_id: &str) -> Result<Option<SelectionFlow>> {
        let timeout = self.config.flow_idle_timeout;
        Ok(self
            .flows()?
            .get(user_id)
            .filter(|entry| entry.touched.elapsed() < timeout)
            .map(|entry| entry.flow.clone()))
    }

    /// Remember a flow. Finalized flows are dropped; storage is the record.
    pub fn save_flow(&self, flow: SelectionFlow) -> Result<()> {
        let mut flows = self.flows()?;
        if flow.state().is_finalized() {
            flows.remove(flow.user_id());
        } else {
            let entry = FlowEntry {
                flow,
                touched: Instant::now(),
            };
            flows.insert(entry.flow.user_id().to_string(), entry);
        }
        Ok(())
    }

    /// Discard a user's flow.
    pub fn forget_flow(&self, user_id: &str) -> Result<()> {
        self.flows()?.remove(user_id);
        Ok(())
    }

    /// Drop flows untouched for longer than the idle timeout as of `now`.
    /// Returns how many were dropped.
    pub fn evict_idle_flows(&self, now: Instant) -> Result<usize> {
        let timeout = self.config.flow_idle_timeout;
        let mut flows = self.flows()?;
        let before = flows.len();
        flows.retain(|_, entry| now.saturating_duration_since(entry.touched) < timeout);
        Ok(before - flows.len())
    }

    /// Number of flows held in memory.
    pub fn flow_count(&self) -> Result<usize> {
        Ok(self.flows()?.len())
    }
}

/// A Daisuki node instance.
pub struct DaisukiNode {
    state: Arc<NodeState>,
    config: NodeConfig,
}

impl DaisukiNode {
    /// Create a new node.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir)?;

        let storage = Arc::new(Storage::open(config.data_dir.join("db"))?);

        if config.seed_catalog {
            let added = storage.seed_catalog(default_catalog())?;
            if added > 0 {
                tracing::info!(added, "Seeded kanji catalog");
            }
        }

        let state = Arc::new(NodeState::new(storage, config.clone()));
        Ok(Self { state, config })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<NodeState> {
        Arc::clone(&self.state)
    }

    /// Run the node (starts HTTP server and admin socket).
    pub async fn run(self) -> Result<()> {
        tracing::info!("Daisuki node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Data: {:?}", self.config.data_dir);

        let admin_socket = AdminSocket::new(self.state(), &self.config.admin_socket);
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        let sweeper = self.state();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(FLOW_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                match sweeper.evict_idle_flows(Instant::now()) {
                    Ok(0) => {}
                    Ok(evicted) => tracing::debug!(evicted, "Dropped idle selection flows"),
                    Err(e) => tracing::warn!("Flow sweep failed: {}", e),
                }
            }
        });

        let app = api::build_router(self.state());

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[tokio::test]
    async fn new_node_seeds_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let node = DaisukiNode::new(NodeConfig::with_data_dir(dir.path()))
            .await
            .unwrap();
        let kanjis = node.state().storage.kanjis().unwrap();
        assert_eq!(kanjis.len(), default_catalog().len());
    }

    #[tokio::test]
    async fn seeding_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            seed_catalog: false,
            ..NodeConfig::with_data_dir(dir.path())
        };
        let node = DaisukiNode::new(config).await.unwrap();
        assert!(node.state().storage.kanjis().unwrap().is_empty());
    }

    #[tokio::test]
    async fn idle_flows_are_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            flow_idle_timeout: Duration::from_secs(60),
            ..NodeConfig::with_data_dir(dir.path())
        };
        let node = DaisukiNode::new(config).await.unwrap();
        let state = node.state();
        state.storage.create_profile("u1", "taro").unwrap();
        state.storage.create_profile("u2", "hanako").unwrap();

        state.save_flow(state.allocator.begin("u1").unwrap()).unwrap();
        state.save_flow(state.allocator.begin("u2").unwrap()).unwrap();
        assert_eq!(state.flow_count().unwrap(), 2);

        assert_eq!(state.evict_idle_flows(Instant::now()).unwrap(), 0);
        assert!(state.flow("u1").unwrap().is_some());

        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(state.evict_idle_flows(later).unwrap(), 2);
        assert_eq!(state.flow_count().unwrap(), 0);
        assert!(state.flow("u1").unwrap().is_none());
    }
}
