use clap::Args;
use modsim_server::ServerConfig;
use std::time::Duration;

/// Flags shared by every transport.
#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    /// Unit id answered besides broadcast (0). Only checked on plain TCP.
    #[arg(long = "unit", default_value_t = 1)]
    pub unit_id: u8,
    /// Close a session after this long without a request.
    #[arg(long, default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
    pub idle_timeout_ms: u64,
    /// Seed the synthetic data generators for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SessionArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_unit_id(self.unit_id)
            .with_max_idle(Duration::from_millis(self.idle_timeout_ms))
            .with_rng_seed(self.seed)
    }
}

pub fn listen_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
