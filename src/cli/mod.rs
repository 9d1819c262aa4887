// Command line interface for the gateway

use clap::Parser;

/// unm-gateway - caching, rate limiting and source fallback for a music catalog API
#[derive(Parser, Debug, Default)]
#[command(name = "unm-gateway", version, about, long_about = None)]
pub struct Args {
    /// Configuration file (defaults to ~/.unm-gateway/config.toml when present)
    #[arg(short, long, env = "UNM_CONFIG")]
    pub config: Option<String>,

    /// Override the bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve from the in-process cache only
    #[arg(long)]
    pub no_redis: bool,
}

impl Args {
    /// Apply command line overrides on top of loaded configuration.
    pub fn apply(&self, config: &mut crate::config::AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.no_redis {
            config.cache.redis_enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_overrides_apply() {
        let args = Args::parse_from(["unm-gateway", "--port", "9000", "--no-redis"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.port, 9000);
        assert!(!config.cache.redis_enabled);
    }
}
