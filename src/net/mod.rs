//! Network address utilities
//!
//! This module provides a dual-stack socket address value, text parsing and
//! name resolution into that value, comparison and hashing with
//! IPv4-mapped-IPv6 normalization, and thin socket call wrappers that take
//! the address value instead of raw `sockaddr` pointers.

pub mod addr;
pub mod cmp;
pub mod qos;
pub mod resolver;
pub mod socket;

pub use addr::{AddrFormat, Family, GenericAddress, SockAddr};
pub use qos::set_qos;
pub use resolver::{parse, resolve, resolve_first, split_host_port, PortPolicy};
pub use socket::{accept, bind, connect, from_legacy_ipv4, getsockname, recvfrom, sendto, to_legacy_ipv4};

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Network operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    #[error("Address resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("Unsupported address family: {0}")]
    UnsupportedFamily(i32),

    #[error("Invalid ToS value: {0}")]
    InvalidTos(String),
}
