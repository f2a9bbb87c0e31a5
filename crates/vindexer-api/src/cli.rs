//! Command line of the `vindexer` binary.
//!
//! Values come from, in increasing priority: built-in defaults, the JSON
//! config file, `.env` / the process environment, explicit flags.

use {
    clap::{Parser, Subcommand},
    std::path::PathBuf,
    vindexer_common::{Error, IndexerConfig, StoreBackend},
};

#[derive(Debug, Parser)]
#[command(name = "vindexer", version, about = "Vote indexer for a TON voting contract")]
pub struct Cli {
    /// JSON config file
    #[arg(short, long, env = "VINDEXER_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub contract_address: Option<String>,

    #[arg(long, env = "LEDGER_ENDPOINT")]
    pub ledger_endpoint: Option<String>,

    #[arg(long, env = "LEDGER_API_KEY", hide_env_values = true)]
    pub ledger_api_key: Option<String>,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// `postgres` or `memory`
    #[arg(long, env = "STORE_BACKEND")]
    pub store_backend: Option<StoreBackend>,

    /// Shorthand for `--bind-addr 0.0.0.0:<port>`
    #[arg(long, env = "API_PORT")]
    pub api_port: Option<u16>,

    #[arg(long, env = "BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Wire schema revision of the contract (1 or 2)
    #[arg(long, env = "SCHEMA_VERSION")]
    pub schema_version: Option<u32>,

    #[arg(long, env = "RUST_LOG")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the poll loop and the HTTP API (default)
    Serve,
    /// Print the contract's account state
    State,
    /// Run a read-only contract getter
    Call {
        method: String,
        /// Integer argument; repeat for several
        #[arg(long = "int", allow_negative_numbers = true)]
        ints: Vec<i128>,
    },
    /// Wait until the contract's last transaction lt exceeds a value
    WaitLt {
        lt: u64,
        #[arg(long, default_value_t = 3_000)]
        interval_ms: u64,
        #[arg(long, default_value_t = 20)]
        attempts: u32,
    },
    /// Rewrite the stored watermark without starting the loop
    Reindex {
        #[arg(long)]
        from_lt: u64,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Builds the effective configuration. Validation is left to the caller
    /// since not every command needs every section.
    pub fn load_config(&self) -> Result<IndexerConfig, Error> {
        let mut config = match &self.config {
            Some(path) => IndexerConfig::from_file(path)?,
            None => IndexerConfig::new(String::new()),
        };
        self.apply_overrides(&mut config)?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut IndexerConfig) -> Result<(), Error> {
        if let Some(address) = &self.contract_address {
            config.contract_address = address.clone();
        }
        if let Some(endpoint) = &self.ledger_endpoint {
            config.ledger.endpoint = endpoint.clone();
        }
        if let Some(key) = &self.ledger_api_key {
            config.ledger.api_key = Some(key.clone());
        }
        if let Some(url) = &self.database_url {
            config.store.database_url = Some(url.clone());
        }
        if let Some(backend) = self.store_backend {
            config.store.backend = backend;
        }
        if let Some(port) = self.api_port {
            config.api.bind_addr = format!("0.0.0.0:{}", port);
        }
        if let Some(addr) = &self.bind_addr {
            config.api.bind_addr = addr.clone();
        }
        if let Some(version) = self.schema_version {
            config.schema = vindexer_common::WireSchema::by_version(version)?;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(())
    }
}

/// Checks only what talking to the ledger needs.
pub fn validate_ledger_access(config: &IndexerConfig) -> Result<(), Error> {
    if config.contract_address.trim().is_empty() {
        return Err(Error::Config("contract address is not set".to_string()));
    }
    if config.ledger.endpoint.trim().is_empty() {
        return Err(Error::Config("ledger endpoint is not set".to_string()));
    }
    Ok(())
}
