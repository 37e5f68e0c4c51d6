//! Dual-stack socket addresses for signaling code
//!
//! [`net::SockAddr`] carries an IPv4 or IPv6 socket address in one fixed-size
//! value. The [`net`] module parses and resolves text into it, compares and
//! hashes it, and wraps the socket calls that take or return an address.
//! [`config`] holds the packet marking settings applied with
//! [`net::set_qos`].

pub mod config;
pub mod net;
