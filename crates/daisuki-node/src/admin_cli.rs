//! daisuki-admin CLI tool
//!
//! Manages admins, kanji claims and users for the Daisuki node.
//!
//! Usage:
//!   daisuki-admin add-admin <user_id>
//!   daisuki-admin remove-admin <user_id>
//!   daisuki-admin is-admin <user_id>
//!   daisuki-admin list-admins
//!   daisuki-admin list-users
//!   daisuki-admin list-kanjis
//!   daisuki-admin revoke-claim <user_id>
//!   daisuki-admin delete-user <user_id>
//!   daisuki-admin delete-post <post_id>
//!   daisuki-admin ping

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

/// Admin command sent over the socket.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum AdminCommand {
    AddAdmin { user_id: String },
    RemoveAdmin { user_id: String },
    IsAdmin { user_id: String },
    ListAdmins,
    ListUsers,
    ListKanjis,
    RevokeClaim { user_id: String },
    DeleteUser { user_id: String },
    DeletePost { post_id: u64 },
    Ping,
}

/// Response from admin command.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    List { items: Vec<String> },
    Bool { value: bool },
    Pong,
}

fn print_usage() {
    eprintln!("daisuki-admin - Manage a Daisuki node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  daisuki-admin add-admin <user_id>      Grant admin rights");
    eprintln!("  daisuki-admin remove-admin <user_id>   Revoke admin rights");
    eprintln!("  daisuki-admin is-admin <user_id>       Check if user is admin");
    eprintln!("  daisuki-admin list-admins              List all admins");
    eprintln!("  daisuki-admin list-users               List users and their kanji");
    eprintln!("  daisuki-admin list-kanjis              List kanji with usage");
    eprintln!("  daisuki-admin revoke-claim <user_id>   Return a user's kanji slot");
    eprintln!("  daisuki-admin delete-user <user_id>    Delete a user and their content");
    eprintln!("  daisuki-admin delete-post <post_id>    Delete a post");
    eprintln!("  daisuki-admin ping                     Check if daemon is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DAISUKI_SOCKET  Path to admin socket (default: ./daisuki-data/admin.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("DAISUKI_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./daisuki-data/admin.sock"))
}

fn send_command(cmd: AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to daisuki-node at {:?}: {}\n\
             Is the daisuki-node running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(&cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

/// The positional argument after the subcommand.
fn arg(args: &[String], command: &str, name: &str) -> String {
    match args.get(2) {
        Some(value) => value.clone(),
        None => fail(&format!("{command} requires a {name} argument")),
    }
}

fn parse_command(args: &[String]) -> Option<AdminCommand> {
    let command = args.get(1)?.as_str();
    let cmd = match command {
        "add-admin" => AdminCommand::AddAdmin {
            user_id: arg(args, command, "user_id"),
        },
        "remove-admin" => AdminCommand::RemoveAdmin {
            user_id: arg(args, command, "user_id"),
        },
        "is-admin" => AdminCommand::IsAdmin {
            user_id: arg(args, command, "user_id"),
        },
        "list-admins" => AdminCommand::ListAdmins,
        "list-users" => AdminCommand::ListUsers,
        "list-kanjis" => AdminCommand::ListKanjis,
        "revoke-claim" => AdminCommand::RevokeClaim {
            user_id: arg(args, command, "user_id"),
        },
        "delete-user" => AdminCommand::DeleteUser {
            user_id: arg(args, command, "user_id"),
        },
        "delete-post" => {
            let post_id = arg(args, command, "post_id");
            match post_id.parse() {
                Ok(post_id) => AdminCommand::DeletePost { post_id },
                Err(_) => fail(&format!("invalid post_id: {post_id}")),
            }
        }
        "ping" => AdminCommand::Ping,
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            return None;
        }
    };
    Some(cmd)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let Some(cmd) = parse_command(&args) else {
        print_usage();
        std::process::exit(1);
    };

    match send_command(cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Error { error } => fail(&error),
            AdminResponse::List { items } => {
                if items.is_empty() {
                    println!("(none)");
                } else {
                    for item in items {
                        println!("{}", item);
                    }
                }
            }
            AdminResponse::Bool { value } => {
                println!("{}", value);
                if !value {
                    std::process::exit(1);
                }
            }
            AdminResponse::Pong => {
                println!("pong - daisuki-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
