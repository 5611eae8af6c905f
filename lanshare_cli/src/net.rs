//! LAN address and free port discovery

use anyhow::{Result, bail};
use std::net::{IpAddr, Ipv4Addr, TcpListener};

/// Rank an address by how likely it is reachable from a phone on the LAN
fn lan_rank(ip: &IpAddr) -> Option<u8> {
    let IpAddr::V4(v4) = ip else {
        return None;
    };
    if v4.is_loopback() || v4.is_unspecified() || v4.is_link_local() {
        return None;
    }
    let [a, b, ..] = v4.octets();
    Some(match (a, b) {
        (192, 168) => 0,
        (10, _) => 1,
        (172, 16..=31) => 2,
        _ => 3,
    })
}

/// Pick the best LAN IPv4 address, preferring 192.168.x.x, then 10.x.x.x,
/// then 172.16-31.x.x, then any other non-loopback address
pub fn pick_lan_ip(candidates: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    let mut best: Option<(u8, IpAddr)> = None;
    for ip in candidates {
        let Some(rank) = lan_rank(&ip) else {
            continue;
        };
        if best.is_none_or(|(current, _)| rank < current) {
            best = Some((rank, ip));
        }
    }
    best.map(|(_, ip)| ip)
}

/// LAN address of this machine, `127.0.0.1` when none is found
pub fn local_lan_ip() -> IpAddr {
    local_ip_address::list_afinet_netifas()
        .ok()
        .and_then(|ips| pick_lan_ip(ips.into_iter().map(|(_name, ip)| ip)))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// First port in `start..start + attempts` that can be bound on all interfaces
pub fn find_available_port(start: u16, attempts: u16) -> Result<u16> {
    let end = start.saturating_add(attempts);
    for port in start..end {
        if TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok() {
            return Ok(port);
        }
    }
    bail!("No available ports found in range {}-{}", start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_pick_lan_ip_priority() {
        let picked = pick_lan_ip(vec![
            ip("127.0.0.1"),
            ip("172.17.0.1"),
            ip("10.1.2.3"),
            ip("192.168.0.14"),
            ip("::1"),
        ]);
        assert_eq!(picked, Some(ip("192.168.0.14")));

        let picked = pick_lan_ip(vec![ip("172.20.0.2"), ip("10.0.0.8")]);
        assert_eq!(picked, Some(ip("10.0.0.8")));

        let picked = pick_lan_ip(vec![ip("100.64.1.1"), ip("172.18.0.1")]);
        assert_eq!(picked, Some(ip("172.18.0.1")));
    }

    #[test]
    fn test_pick_lan_ip_first_of_same_rank() {
        let picked = pick_lan_ip(vec![ip("10.0.0.1"), ip("10.0.0.2")]);
        assert_eq!(picked, Some(ip("10.0.0.1")));
    }

    #[test]
    fn test_pick_lan_ip_none() {
        assert_eq!(pick_lan_ip(vec![ip("127.0.0.1"), ip("169.254.3.4"), ip("fe80::1")]), None);
        assert_eq!(pick_lan_ip(Vec::new()), None);
    }

    #[test]
    fn test_find_available_port_skips_taken() {
        let taken = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        if port > u16::MAX - 50 {
            return;
        }

        let found = find_available_port(port, 50).unwrap();
        assert_ne!(found, port);
    }

    #[test]
    fn test_find_available_port_exhausted() {
        let taken = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        assert!(find_available_port(port, 1).is_err());
        assert!(find_available_port(port, 0).is_err());
    }
}
