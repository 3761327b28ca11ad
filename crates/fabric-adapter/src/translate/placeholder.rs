//! Placeholder loopback addresses for switches managed by hostname.
//!
//! ONOS needs an IPv4 loopback per device. When the management address is a
//! literal it is used directly; otherwise the switch gets the next free host
//! of `192.168.55.0/24`. Assignments are remembered per management address,
//! so repeated passes in one process produce the same document. They are not
//! persisted.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::TranslateError;

const PLACEHOLDER_NETWORK: [u8; 3] = [192, 168, 55];
const FIRST_HOST: u8 = 1;
const LAST_HOST: u8 = 254;

/// Memoizing allocator of placeholder loopback addresses.
#[derive(Debug)]
pub struct PlaceholderPool {
    assigned: HashMap<String, Ipv4Addr>,
    next_host: u8,
}

impl Default for PlaceholderPool {
    fn default() -> Self {
        Self {
            assigned: HashMap::new(),
            next_host: FIRST_HOST,
        }
    }
}

impl PlaceholderPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the loopback address for a management address.
    pub fn loopback_for(&mut self, management_address: &str) -> Result<String, TranslateError> {
        if management_address.parse::<IpAddr>().is_ok() {
            return Ok(management_address.to_string());
        }

        if let Some(ip) = self.assigned.get(management_address) {
            return Ok(ip.to_string());
        }

        if self.next_host > LAST_HOST {
            return Err(TranslateError::PlaceholderExhausted {
                address: management_address.to_string(),
            });
        }

        let [a, b, c] = PLACEHOLDER_NETWORK;
        let ip = Ipv4Addr::new(a, b, c, self.next_host);
        self.next_host = self.next_host.saturating_add(1);
        self.assigned.insert(management_address.to_string(), ip);
        Ok(ip.to_string())
    }

    /// Number of placeholders handed out.
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    /// Returns true if no placeholder has been handed out.
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_passes_through() {
        let mut pool = PlaceholderPool::new();
        assert_eq!(pool.loopback_for("11.22.33.44").unwrap(), "11.22.33.44");
        assert_eq!(pool.loopback_for("2001:db8::1").unwrap(), "2001:db8::1");
        assert!(pool.is_empty());
    }

    #[test]
    fn test_hostnames_get_stable_placeholders() {
        let mut pool = PlaceholderPool::new();
        assert_eq!(pool.loopback_for("leaf1.local").unwrap(), "192.168.55.1");
        assert_eq!(pool.loopback_for("spine1.local").unwrap(), "192.168.55.2");
        assert_eq!(pool.loopback_for("leaf1.local").unwrap(), "192.168.55.1");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut pool = PlaceholderPool::new();
        for i in 0..254 {
            pool.loopback_for(&format!("switch-{}.local", i)).unwrap();
        }
        assert!(matches!(
            pool.loopback_for("one-too-many.local"),
            Err(TranslateError::PlaceholderExhausted { .. })
        ));
        // Existing assignments still resolve.
        assert_eq!(pool.loopback_for("switch-0.local").unwrap(), "192.168.55.1");
    }
}
