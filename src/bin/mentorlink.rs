//!
//! mentorlink CLI
//! --------------
//! Thin operator tool over the client SDK: log in, inspect the current
//! profile, list users, log out. Configuration via flags and environment.

use anyhow::{anyhow, Result};
use std::env;

use mentorlink::{ClientConfig, LoginCredentials, SessionManager};

fn parse_value_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn usage() {
    println!(
        "mentorlink client\n\nUSAGE:\n  mentorlink <COMMAND> [--api URL] [--token-file PATH] [--email E] [--password P]\n\nCOMMANDS:\n  login       authenticate and persist the token pair (needs --email/--password)\n  whoami      print the current profile as JSON\n  users       list all users (admin token required server-side)\n  logout      notify the server and clear local tokens\n\nOPTIONS:\n  --api URL          API base URL (env: MENTORLINK_API_URL, default http://localhost:3000)\n  --token-file PATH  token store path (env: MENTORLINK_TOKEN_FILE, default ~/.mentorlink/tokens.json)\n  --email E          login email\n  --password P       login password\n"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || has_flag(&args, "--help") || has_flag(&args, "-h") {
        usage();
        return Ok(());
    }
    let command = args[0].clone();

    // Environment first, CLI arguments override
    let mut cfg = ClientConfig::from_env();
    if let Some(url) = parse_value_arg(&args, "--api") {
        cfg = cfg.with_base_url(url);
    }
    let token_file = parse_value_arg(&args, "--token-file");
    match (token_file, cfg.token_path.is_some()) {
        (Some(p), _) => cfg = cfg.with_token_path(p),
        (None, false) => cfg = cfg.with_token_path(mentorlink::config::default_token_path()),
        (None, true) => {}
    }

    let session = SessionManager::new(cfg)?;
    session.bootstrap().await;

    match command.as_str() {
        "login" => {
            let email = parse_value_arg(&args, "--email").ok_or_else(|| anyhow!("--email is required"))?;
            let password =
                parse_value_arg(&args, "--password").ok_or_else(|| anyhow!("--password is required"))?;
            if session.login(&LoginCredentials { email, password }).await {
                let user = session.current_user().ok_or_else(|| anyhow!("login succeeded but no user"))?;
                println!("{}", serde_json::to_string_pretty(&user)?);
                Ok(())
            } else {
                Err(anyhow!("login failed"))
            }
        }
        "whoami" => {
            if !session.is_authenticated() {
                return Err(anyhow!("not logged in"));
            }
            let user = session.refresh_profile().await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(())
        }
        "users" => {
            let users = session.list_users().await?;
            println!("{}", serde_json::to_string_pretty(&users)?);
            Ok(())
        }
        "logout" => {
            session.logout().await;
            println!("logged out");
            Ok(())
        }
        other => {
            usage();
            Err(anyhow!("unknown command: {}", other))
        }
    }
}
