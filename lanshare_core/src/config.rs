use crate::constants::{DEFAULT_HOST, SHUTDOWN_GRACE_SECS};
use std::net::IpAddr;
use std::time::Duration;

/// User choices captured when a session is created
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: IpAddr,
    /// 0 lets the OS pick a port
    pub port: u16,
    /// Serve folders as a single zip instead of one item per file
    pub zip_folders: bool,
    /// Only its presence matters: a random access token is issued instead
    pub password: Option<String>,
    /// Stop the session automatically after this long
    pub timeout: Option<Duration>,
    pub one_time: bool,
    /// How long stop waits for in-flight responses before aborting
    pub shutdown_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: 0,
            zip_folders: true,
            password: None,
            timeout: None,
            one_time: false,
            shutdown_grace: Duration::from_secs(SHUTDOWN_GRACE_SECS),
        }
    }
}

impl SessionConfig {
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.host.to_string(), "0.0.0.0");
        assert!(config.zip_folders);
        assert!(!config.one_time);
        assert!(!config.has_password());
        assert!(config.timeout.is_none());
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }
}
