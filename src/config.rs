//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;

/// Runtime configuration, read from `HOMEROOM_*` environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding the SQLite database
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub session_ttl: Duration,
    /// How many times a promotion commit is attempted on connection errors
    pub commit_attempts: u32,
    /// Password for the bootstrap `admin` account
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir().join("homeroom-data"),
            bind_addr: SocketAddr::from(DEFAULT_BIND),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
            admin_password: "admin".to_string(),
        }
    }
}

impl ServerConfig {
    /// Build config from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unparseable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("HOMEROOM_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = parse_var(&lookup, "HOMEROOM_BIND") {
            config.bind_addr = addr;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "HOMEROOM_SESSION_TTL_SECS") {
            config.session_ttl = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var::<u32, _>(&lookup, "HOMEROOM_COMMIT_ATTEMPTS") {
            config.commit_attempts = attempts.max(1);
        }
        if let Some(password) = lookup("HOMEROOM_ADMIN_PASSWORD") {
            config.admin_password = password;
        }

        config
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("homeroom.db")
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}
