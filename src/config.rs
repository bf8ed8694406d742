//! Configuration for mission-control
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// mission-control - admin service for mission enrollment and
/// mentorship-group consistency
#[derive(Parser, Debug, Clone)]
#[command(name = "mission-control")]
#[command(about = "Admin service for mission enrollment and mentorship-group consistency")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (MongoDB becomes optional; mutating routes
    /// return 503 until a database is available)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "mission_control")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.mongodb_uri.trim().is_empty() {
            return Err("MONGODB_URI must not be empty".to_string());
        }

        if self.mongodb_db.trim().is_empty() {
            return Err("MONGODB_DB must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_db_name() {
        let mut args = Args::parse_from(["mission-control"]);
        args.mongodb_db = " ".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = Args::parse_from(["mission-control"]);
        assert!(args.validate().is_ok());
    }
}
