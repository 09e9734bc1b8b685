//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting IO errors into context-rich `NetError` variants.

use crate::base::neterror::NetError;
use std::io;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add DNS resolution context to an IO error.
    ///
    /// # Example
    /// ```ignore
    /// use hostcache::base::context::IoResultExt;
    ///
    /// let addrs = ("example.com", 0).to_socket_addrs()
    ///     .dns_context("example.com")?;
    /// // Error: "Could not resolve example.com: ..."
    /// ```
    fn dns_context(self, domain: &str) -> Result<T, NetError>;

    /// Add bootstrap configuration context to an IO error.
    fn config_context(self, location: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn dns_context(self, domain: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::dns_failed(domain, e))
    }

    fn config_context(self, location: &str) -> Result<T, NetError> {
        self.map_err(|e| {
            let reason = format!("{}: {}", location, e);
            NetError::config_load_failed(reason)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_dns_context() {
        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::NotFound, "no such host"));
        let err = result.dns_context("unknown.example.com").unwrap_err();

        match err {
            NetError::NameNotResolvedFor { domain, .. } => {
                assert_eq!(domain, "unknown.example.com");
            }
            _ => panic!("Expected NameNotResolvedFor"),
        }
    }

    #[test]
    fn test_config_context() {
        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::NotFound, "missing"));
        let err = result.config_context("/etc/hosts.json").unwrap_err();

        match err {
            NetError::ConfigLoadFailed { reason } => {
                assert!(reason.contains("/etc/hosts.json"));
                assert!(reason.contains("missing"));
            }
            _ => panic!("Expected ConfigLoadFailed"),
        }
    }
}
