use std::net::{IpAddr, Ipv4Addr};

/// Host the share server binds to (all interfaces)
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// First port tried when looking for a free one
pub const DEFAULT_PORT: u16 = 8000;

/// Number of consecutive ports probed before giving up
pub const PORT_SCAN_ATTEMPTS: u16 = 100;

/// Bounded wait for in-flight responses during stop (5 seconds)
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

/// Prefix of every download route
pub const DOWNLOAD_PREFIX: &str = "/download/";
