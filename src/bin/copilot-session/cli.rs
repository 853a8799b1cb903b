//! Command-line interface definition.

use clap::{Parser, Subcommand};
use copilot_session::ClientConfig;
use std::path::PathBuf;

/// Session cache and purchase verification client for the Copilot backend.
#[derive(Parser, Debug)]
#[command(name = "copilot-session")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the durable session cache.
    #[arg(long, env = "COPILOT_ROOT_DIR")]
    pub root_dir: Option<PathBuf>,

    /// Base URL of the user-profile backend.
    #[arg(long, env = "COPILOT_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Bearer token sent with profile requests.
    #[arg(long, env = "COPILOT_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Base URL of the transaction oracle.
    #[arg(long, env = "COPILOT_ORACLE_URL")]
    pub oracle_url: Option<String>,

    /// Delay before each verification check, in milliseconds.
    #[arg(long, env = "COPILOT_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Verification checks before giving up.
    #[arg(long, env = "COPILOT_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the cached user, then the revalidated one.
    Whoami {
        /// Identity id as issued by the auth provider.
        #[arg(long)]
        user_id: String,
    },

    /// Poll the oracle until a purchase transaction is confirmed.
    Verify {
        /// Transaction hash to verify.
        tx_hash: String,
    },

    /// Sign out and clear the cached user.
    Logout,
}

impl Cli {
    /// Build a `ClientConfig` from the file (if any) and CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<ClientConfig> {
        let mut config = if let Some(ref path) = self.config {
            ClientConfig::from_file(path)?
        } else {
            ClientConfig::default()
        };

        if let Some(ref root_dir) = self.root_dir {
            config.root_dir.clone_from(root_dir);
        }
        if let Some(ref url) = self.backend_url {
            config.backend.base_url.clone_from(url);
        }
        if self.access_token.is_some() {
            config.backend.access_token.clone_from(&self.access_token);
        }
        if let Some(ref url) = self.oracle_url {
            config.oracle.base_url.clone_from(url);
        }
        if let Some(interval) = self.poll_interval_ms {
            config.verification.poll_interval_ms = interval;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.verification.max_attempts = max_attempts;
        }
        config.log_level.clone_from(&self.log_level);

        config.validate()?;
        Ok(config)
    }
}
