//! Cache policies.

/// Strategy governing cache-versus-network precedence for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachePolicy {
    /// Network only. The response is not written to the cache.
    #[default]
    IgnoreCache,
    /// Network only. The response is written to the cache.
    NetworkOnly,
    /// Cache only. A missing or stale record is an error.
    CacheOnly,
    /// A fresh cache record if there is one, else the network.
    CacheElseNetwork,
    /// The network while connected, else cache only.
    NetworkElseCache,
    /// Any cache record first, then the network.
    CacheThenNetwork,
}

impl CachePolicy {
    /// Every policy.
    pub const ALL: [CachePolicy; 6] = [
        CachePolicy::IgnoreCache,
        CachePolicy::NetworkOnly,
        CachePolicy::CacheOnly,
        CachePolicy::CacheElseNetwork,
        CachePolicy::NetworkElseCache,
        CachePolicy::CacheThenNetwork,
    ];

    /// Returns a short name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::IgnoreCache => "ignore_cache",
            CachePolicy::NetworkOnly => "network_only",
            CachePolicy::CacheOnly => "cache_only",
            CachePolicy::CacheElseNetwork => "cache_else_network",
            CachePolicy::NetworkElseCache => "network_else_cache",
            CachePolicy::CacheThenNetwork => "cache_then_network",
        }
    }

    /// Returns true if a successful network response is written back.
    pub fn writes_cache(&self) -> bool {
        !matches!(self, CachePolicy::IgnoreCache | CachePolicy::CacheOnly)
    }

    /// Returns the number of deliveries a request under this policy makes.
    ///
    /// Only [`CachePolicy::CacheThenNetwork`] with a cache record present
    /// delivers twice.
    pub fn expected_deliveries(&self, cache_present: bool) -> usize {
        match self {
            CachePolicy::CacheThenNetwork if cache_present => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_ignore_cache() {
        assert_eq!(CachePolicy::default(), CachePolicy::IgnoreCache);
    }

    #[test]
    fn only_cache_then_network_delivers_twice() {
        for policy in CachePolicy::ALL {
            let expected = if policy == CachePolicy::CacheThenNetwork { 2 } else { 1 };
            assert_eq!(policy.expected_deliveries(true), expected, "{policy}");
            assert_eq!(policy.expected_deliveries(false), 1, "{policy}");
        }
    }

    #[test]
    fn write_back() {
        assert!(!CachePolicy::IgnoreCache.writes_cache());
        assert!(!CachePolicy::CacheOnly.writes_cache());
        assert!(CachePolicy::NetworkOnly.writes_cache());
        assert!(CachePolicy::CacheThenNetwork.writes_cache());
    }
}
