//! Unix socket server for admin commands.
//!
//! Provides a local IPC interface for managing admins, claims and users.

use crate::error::Result;
use crate::node::NodeState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Add an admin
    AddAdmin { user_id: String },
    /// Remove an admin
    RemoveAdmin { user_id: String },
    /// Check if a user is admin
    IsAdmin { user_id: String },
    /// List all admins
    ListAdmins,
    /// List users with their claim status
    ListUsers,
    /// List the catalog with usage
    ListKanjis,
    /// Take back a user's kanji slot
    RevokeClaim { user_id: String },
    /// Remove a user and their content
    DeleteUser { user_id: String },
    /// Remove a post with its likes and comments
    DeletePost { post_id: u64 },
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    List { items: Vec<String> },
    Bool { value: bool },
    Pong,
}

impl AdminResponse {
    fn error(e: impl std::fmt::Display) -> Self {
        Self::Error {
            error: e.to_string(),
        }
    }
}

/// Admin socket server.
pub struct AdminSocket {
    state: Arc<NodeState>,
    socket_path: PathBuf,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(state: Arc<NodeState>, socket_path: impl AsRef<Path>) -> Self {
        Self {
            state,
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Remove existing socket file if present
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

async fn handle_connection(stream: UnixStream, state: Arc<NodeState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &state),
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

/// Run one command against the node.
pub fn execute_command(cmd: AdminCommand, state: &NodeState) -> AdminResponse {
    let storage = &state.storage;
    match cmd {
        AdminCommand::AddAdmin { user_id } => match storage.set_admin(&user_id, true) {
            Ok(()) => {
                tracing::info!(user = %user_id, "Added admin");
                AdminResponse::Ok {
                    message: format!("Added admin: {}", user_id),
                }
            }
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::RemoveAdmin { user_id } => match storage.set_admin(&user_id, false) {
            Ok(()) => {
                tracing::info!(user = %user_id, "Removed admin");
                AdminResponse::Ok {
                    message: format!("Removed admin: {}", user_id),
                }
            }
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::IsAdmin { user_id } => match storage.is_admin(&user_id) {
            Ok(is_admin) => AdminResponse::Bool { value: is_admin },
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::ListAdmins => match storage.list_admins() {
            Ok(admins) => AdminResponse::List { items: admins },
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::ListUsers => match storage.list_profiles() {
            Ok(profiles) => AdminResponse::List {
                items: profiles
                    .into_iter()
                    .map(|p| {
                        let claim = match (p.selected_kanji_id, p.has_finalized_claim) {
                            (Some(id), true) => format!("kanji #{id}"),
                            (Some(id), false) => format!("selecting #{id}"),
                            (None, _) => "no kanji".to_string(),
                        };
                        let role = if p.is_admin { " [admin]" } else { "" };
                        format!("{} @{} ({}){}", p.id, p.username, claim, role)
                    })
                    .collect(),
            },
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::ListKanjis => match storage.kanjis() {
            Ok(kanjis) => AdminResponse::List {
                items: kanjis
                    .into_iter()
                    .map(|k| {
                        format!(
                            "#{} {} {}/{}{}",
                            k.id,
                            k.glyph,
                            k.capacity_used,
                            daisuki_slots::CAPACITY_LIMIT,
                            k.meaning_en.map(|m| format!(" {m}")).unwrap_or_default()
                        )
                    })
                    .collect(),
            },
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::RevokeClaim { user_id } => {
            if let Err(e) = state.forget_flow(&user_id) {
                return AdminResponse::error(e);
            }
            match state.allocator.release(&user_id) {
                Ok(Some(kanji_id)) => AdminResponse::Ok {
                    message: format!("Released kanji #{} from {}", kanji_id, user_id),
                },
                Ok(None) => AdminResponse::Ok {
                    message: format!("{} holds no finalized kanji", user_id),
                },
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::DeleteUser { user_id } => {
            if let Err(e) = state.forget_flow(&user_id) {
                return AdminResponse::error(e);
            }
            match storage.delete_user(&user_id) {
                Ok(removal) => {
                    tracing::info!(
                        user = %user_id,
                        kanji = ?removal.released_kanji,
                        posts = removal.posts,
                        "Deleted user"
                    );
                    AdminResponse::Ok {
                        message: format!(
                            "Deleted {}: {} posts, {} comments, {} likes{}",
                            user_id,
                            removal.posts,
                            removal.comments,
                            removal.likes,
                            removal
                                .released_kanji
                                .map(|id| format!(", released kanji #{id}"))
                                .unwrap_or_default()
                        ),
                    }
                }
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::DeletePost { post_id } => match storage.delete_post(post_id) {
            Ok(()) => {
                tracing::info!(post = post_id, "Deleted post");
                AdminResponse::Ok {
                    message: format!("Deleted post {}", post_id),
                }
            }
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::Ping => AdminResponse::Pong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;
    use crate::storage::Storage;
    use daisuki_slots::{Kanji, SlotStore};

    fn state() -> (tempfile::TempDir, NodeState) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path().join("db")).unwrap());
        storage.put_kanji(&Kanji::new(1, '愛')).unwrap();
        let state = NodeState::new(storage, NodeConfig::with_data_dir(dir.path()));
        (dir, state)
    }

    fn claim(state: &NodeState, user: &str) {
        state.storage.create_profile(user, user).unwrap();
        let allocator = &state.allocator;
        let mut flow = allocator.begin(user).unwrap();
        allocator.select_tentative(&mut flow, 1).unwrap();
        allocator.confirm_tentative(&mut flow).unwrap();
        allocator.record_reason(&mut flow, None).unwrap();
        allocator.finalize(&mut flow).unwrap();
    }

    #[test]
    fn commands_parse() {
        let cmd: AdminCommand =
            serde_json::from_str(r#"{"cmd":"revoke_claim","user_id":"u1"}"#).unwrap();
        assert!(matches!(cmd, AdminCommand::RevokeClaim { user_id } if user_id == "u1"));

        let cmd: AdminCommand = serde_json::from_str(r#"{"cmd":"delete_post","post_id":7}"#).unwrap();
        assert!(matches!(cmd, AdminCommand::DeletePost { post_id: 7 }));
    }

    #[test]
    fn admin_roundtrip() {
        let (_dir, state) = state();
        state.storage.create_profile("u1", "taro").unwrap();

        assert!(matches!(
            execute_command(AdminCommand::AddAdmin { user_id: "u1".into() }, &state),
            AdminResponse::Ok { .. }
        ));
        assert!(matches!(
            execute_command(AdminCommand::IsAdmin { user_id: "u1".into() }, &state),
            AdminResponse::Bool { value: true }
        ));
        match execute_command(AdminCommand::ListAdmins, &state) {
            AdminResponse::List { items } => assert_eq!(items, vec!["u1".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            execute_command(AdminCommand::AddAdmin { user_id: "nobody".into() }, &state),
            AdminResponse::Error { .. }
        ));
    }

    #[test]
    fn revoke_releases_slot() {
        let (_dir, state) = state();
        claim(&state, "u1");
        assert_eq!(state.storage.kanji(1).unwrap().unwrap().capacity_used, 1);

        let response = execute_command(AdminCommand::RevokeClaim { user_id: "u1".into() }, &state);
        assert!(matches!(response, AdminResponse::Ok { .. }));
        assert_eq!(state.storage.kanji(1).unwrap().unwrap().capacity_used, 0);
        assert!(!state.storage.get_claimant("u1").unwrap().unwrap().has_finalized_claim);

        // The user may now pick again.
        assert!(state.allocator.begin("u1").is_ok());
    }

    #[test]
    fn delete_user_and_listings() {
        let (_dir, state) = state();
        claim(&state, "u1");

        match execute_command(AdminCommand::ListUsers, &state) {
            AdminResponse::List { items } => assert_eq!(items, vec!["u1 @u1 (kanji #1)".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
        match execute_command(AdminCommand::ListKanjis, &state) {
            AdminResponse::List { items } => assert_eq!(items, vec!["#1 愛 1/10".to_string()]),
            other => panic!("unexpected {other:?}"),
        }

        let response = execute_command(AdminCommand::DeleteUser { user_id: "u1".into() }, &state);
        assert!(matches!(response, AdminResponse::Ok { .. }));
        assert!(state.storage.profile("u1").unwrap().is_none());
        assert_eq!(state.storage.kanji(1).unwrap().unwrap().capacity_used, 0);
    }

    #[test]
    fn ping() {
        let (_dir, state) = state();
        assert!(matches!(
            execute_command(AdminCommand::Ping, &state),
            AdminResponse::Pong
        ));
    }
}
