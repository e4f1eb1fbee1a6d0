//! CRM service binary.
//!
//! `crm serve` runs the HTTP API; `crm create-admin` bootstraps the first
//! administrator account.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crm::models::user::UserCreate;
use crm::models::UserRole;
use crm::{db, server, AppState, Config};

#[derive(Parser)]
#[command(name = "crm", version, about = "Sales CRM backend")]
struct Cli {
    /// Database URL (overrides `DATABASE_URL`).
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve {
        /// Listen port (overrides `PORT`).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create an administrator account.
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "CRM_ADMIN_PASSWORD")]
        password: String,
    },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,crm=debug"))
        .context("Invalid log filter")?;

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            info!(database = %config.database_url, "Starting CRM service");
            let pool = db::connect(&config.database_url)
                .await
                .context("Failed to open database")?;
            server::serve(AppState::new(config, pool)).await
        }
        Command::CreateAdmin {
            email,
            name,
            password,
        } => {
            let pool = db::connect(&config.database_url)
                .await
                .context("Failed to open database")?;
            let state = AppState::new(config, pool);
            let user = crm::handlers::auth::create_user_account(
                &state,
                UserCreate {
                    email,
                    name,
                    password,
                    role: UserRole::Admin,
                },
            )
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create admin: {e}"))?;
            info!(user_id = user.id, email = %user.email, "Administrator created");
            Ok(())
        }
    }
}
