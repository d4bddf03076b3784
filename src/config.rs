use std::path::PathBuf;

use clap::Parser;
use uuid::Uuid;

/// Laundry client configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "laundry-client", about = "Laundry pickup and delivery client", long_about = None)]
pub struct ClientConfig {
    /// `PostgreSQL` connection string; the in-memory backend is used when unset
    #[arg(long, env = "LAUNDRY_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Directory for cached store snapshots
    #[arg(long, env = "LAUNDRY_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Tracing filter directive
    #[arg(long, env = "LAUNDRY_LOG", default_value = "info,laundry_client=debug")]
    pub log_filter: String,

    /// Postgres pool size
    #[arg(long, env = "LAUNDRY_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// User id to sign in as for the demo flow
    #[arg(long, env = "LAUNDRY_DEMO_USER")]
    pub demo_user: Option<Uuid>,
}

impl ClientConfig {
    pub fn load() -> Result<Self, clap::Error> {
        Self::try_parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::try_parse_from(["laundry-client"]).unwrap();
        assert_eq!(config.log_filter, "info,laundry_client=debug");
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_flags_override() {
        let user = Uuid::new_v4();
        let user_arg = user.to_string();
        let config = ClientConfig::try_parse_from([
            "laundry-client",
            "--cache-dir",
            "/tmp/laundry",
            "--demo-user",
            user_arg.as_str(),
            "--max-connections",
            "2",
        ])
        .unwrap();

        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/laundry")));
        assert_eq!(config.demo_user, Some(user));
        assert_eq!(config.max_connections, 2);
    }
}
