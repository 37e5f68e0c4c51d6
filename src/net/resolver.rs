//! Address parsing and name resolution
//!
//! Supported address formats:
//! - "10.0.0.1"  - "10.0.0.1:5060"
//! - "::1"       - "[::1]"          - "[::1]:5060"
//! - "localhost" - "localhost:5060" (resolution only)
//!
//! [`parse`] only accepts numeric literals and never touches DNS.
//! [`resolve`] goes through the platform resolver and may return several
//! candidates.

use std::ffi::{CStr, CString};
use std::mem;
use std::ptr;

use tracing::{debug, error, warn};

use super::{Error, Family, Result, SockAddr};

/// What to do with the port part of an address string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortPolicy {
    /// A port may or may not be present
    #[default]
    Optional,
    /// Drop any port that was given
    Ignore,
    /// Fail unless a port is present
    Require,
    /// Fail if a port is present
    Forbid,
}

/// Split an address string into host and port parts
///
/// A bracketed host runs up to the first `]`; a `:` right after it starts
/// the port. Without brackets a single `:` separates the port, and a string
/// with more than one `:` is taken to be a bare IPv6 literal with no port.
/// An empty port (`10.0.0.1:`) counts as no port.
///
/// # Examples
/// ```
/// use netsock::net::{split_host_port, PortPolicy};
///
/// let (host, port) = split_host_port("[::1]:5060", PortPolicy::Optional).unwrap();
/// assert_eq!(host, "::1");
/// assert_eq!(port, Some("5060"));
/// ```
pub fn split_host_port(text: &str, policy: PortPolicy) -> Result<(&str, Option<&str>)> {
    let (host, port) = match text.strip_prefix('[') {
        Some(rest) => match rest.find(']') {
            Some(close) => (
                &rest[..close],
                rest[close + 1..].strip_prefix(':').filter(|p| !p.is_empty()),
            ),
            None => (rest, None),
        },
        None => {
            let mut colons = text.match_indices(':');
            match (colons.next(), colons.next()) {
                (Some((pos, _)), None) => (&text[..pos], Some(&text[pos + 1..]).filter(|p| !p.is_empty())),
                _ => (text, None),
            }
        }
    };

    match policy {
        PortPolicy::Ignore => Ok((host, None)),
        PortPolicy::Require if port.is_none() => {
            warn!(text, "port missing");
            Err(Error::MalformedAddress(format!("port missing in {}", text)))
        }
        PortPolicy::Forbid if port.is_some() => {
            warn!(text, "port disallowed");
            Err(Error::MalformedAddress(format!("port disallowed in {}", text)))
        }
        _ => Ok((host, port)),
    }
}

/// Parse a numeric address literal
///
/// # Examples
/// ```
/// use netsock::net::{parse, PortPolicy};
///
/// let addr = parse("10.0.0.1:5060", PortPolicy::Require).unwrap();
/// assert_eq!(addr.port(), 5060);
/// assert!(parse("localhost:5060", PortPolicy::Require).is_err());
/// ```
pub fn parse(text: &str, policy: PortPolicy) -> Result<SockAddr> {
    let (host, port) = split_host_port(text, policy)?;

    let info = AddrInfo::lookup(
        host,
        port,
        Family::Unspecified,
        libc::AI_NUMERICHOST | libc::AI_NUMERICSERV,
    )
    .map_err(|e| Error::MalformedAddress(format!("{}: {}", text, e)))?;

    let mut candidates = info.iter();
    let first = candidates
        .next()
        .ok_or_else(|| Error::MalformedAddress(format!("{}: no address", text)))?;

    if candidates.next().is_some() {
        warn!(text, "numeric lookup returned multiple addresses, ignoring all but the first");
    }

    Ok(first)
}

/// Resolve a host name or literal to every candidate address
///
/// Candidates come back in resolver order. Any failure, including an
/// unparsable string, yields an empty list.
///
/// # Examples
/// ```
/// use netsock::net::{resolve, Family, PortPolicy};
///
/// let addrs = resolve("127.0.0.1:5060", PortPolicy::Optional, Family::Ipv4);
/// assert_eq!(addrs.len(), 1);
/// ```
pub fn resolve(text: &str, policy: PortPolicy, family: Family) -> Vec<SockAddr> {
    let (host, port) = match split_host_port(text, policy) {
        Ok(parts) => parts,
        Err(_) => return Vec::new(),
    };

    let info = match AddrInfo::lookup(host, port, family, 0) {
        Ok(info) => info,
        Err(e) => {
            warn!(host, port = port.unwrap_or(""), error = %e, "resolution failed");
            return Vec::new();
        }
    };

    let count = info.iter().count();
    let mut addrs = Vec::new();
    if addrs.try_reserve_exact(count).is_err() {
        error!(count, "unable to allocate resolved address list");
        return Vec::new();
    }
    addrs.extend(info.iter());
    addrs
}

/// Resolve and return only the first address
pub fn resolve_first(text: &str, policy: PortPolicy, family: Family) -> Result<SockAddr> {
    resolve(text, policy, family)
        .into_iter()
        .next()
        .ok_or_else(|| Error::ResolutionFailed(format!("no addresses resolved for {}", text)))
}

/// Owned `getaddrinfo` result list
struct AddrInfo {
    head: *mut libc::addrinfo,
}

impl AddrInfo {
    fn lookup(host: &str, port: Option<&str>, family: Family, flags: libc::c_int) -> Result<Self> {
        let c_host = CString::new(host)
            .map_err(|_| Error::MalformedAddress(format!("NUL byte in host {:?}", host)))?;
        let c_port = port
            .map(CString::new)
            .transpose()
            .map_err(|_| Error::MalformedAddress(format!("NUL byte in port {:?}", port)))?;

        // SAFETY: addrinfo is plain old data; zero means "no hint".
        let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
        hints.ai_family = family.as_raw();
        hints.ai_socktype = libc::SOCK_DGRAM;
        hints.ai_flags = flags;

        let mut head: *mut libc::addrinfo = ptr::null_mut();
        let ret = unsafe {
            libc::getaddrinfo(
                c_host.as_ptr(),
                c_port.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
                &hints,
                &mut head,
            )
        };

        if ret != 0 {
            if !head.is_null() {
                unsafe { libc::freeaddrinfo(head) };
            }
            let message = unsafe { CStr::from_ptr(libc::gai_strerror(ret)) }
                .to_string_lossy()
                .into_owned();
            debug!(host, port = port.unwrap_or(""), code = ret, %message, "getaddrinfo failed");
            return Err(Error::ResolutionFailed(format!(
                "getaddrinfo(\"{}\", \"{}\"): {}",
                host,
                port.unwrap_or(""),
                message
            )));
        }

        Ok(AddrInfo { head })
    }

    fn iter(&self) -> impl Iterator<Item = SockAddr> + '_ {
        let mut current = self.head as *const libc::addrinfo;
        std::iter::from_fn(move || {
            while !current.is_null() {
                // SAFETY: the list stays alive until self is dropped.
                let info = unsafe { &*current };
                current = info.ai_next;
                if !info.ai_addr.is_null() {
                    // SAFETY: ai_addr points to ai_addrlen bytes.
                    return Some(unsafe { SockAddr::from_raw_parts(info.ai_addr, info.ai_addrlen) });
                }
            }
            None
        })
    }
}

impl Drop for AddrInfo {
    fn drop(&mut self) {
        if !self.head.is_null() {
            unsafe { libc::freeaddrinfo(self.head) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ipv4_with_colon() {
        let (host, port) = split_host_port("127.0.0.1:8080", PortPolicy::Optional).unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, Some("8080"));
    }

    #[test]
    fn test_split_host_only() {
        let (host, port) = split_host_port("sip.example.com", PortPolicy::Optional).unwrap();
        assert_eq!(host, "sip.example.com");
        assert_eq!(port, None);
    }

    #[test]
    fn test_split_ipv6_brackets() {
        let (host, port) = split_host_port("[::1]:5060", PortPolicy::Optional).unwrap();
        assert_eq!(host, "::1");
        assert_eq!(port, Some("5060"));

        let (host, port) = split_host_port("[2001:db8::1]", PortPolicy::Optional).unwrap();
        assert_eq!(host, "2001:db8::1");
        assert_eq!(port, None);
    }

    #[test]
    fn test_split_ipv6_no_brackets() {
        let (host, port) = split_host_port("2001:db8::1", PortPolicy::Optional).unwrap();
        assert_eq!(host, "2001:db8::1");
        assert_eq!(port, None);

        let (host, port) = split_host_port("::1", PortPolicy::Optional).unwrap();
        assert_eq!(host, "::1");
        assert_eq!(port, None);
    }

    #[test]
    fn test_split_unterminated_bracket() {
        let (host, port) = split_host_port("[::1", PortPolicy::Optional).unwrap();
        assert_eq!(host, "::1");
        assert_eq!(port, None);
    }

    #[test]
    fn test_port_policy() {
        assert!(split_host_port("10.0.0.1", PortPolicy::Require).is_err());
        assert!(split_host_port("10.0.0.1:5060", PortPolicy::Forbid).is_err());
        assert!(split_host_port("[::1]:5060", PortPolicy::Forbid).is_err());
        assert!(split_host_port("[::1]", PortPolicy::Forbid).is_ok());

        let (host, port) = split_host_port("10.0.0.1:5060", PortPolicy::Ignore).unwrap();
        assert_eq!(host, "10.0.0.1");
        assert_eq!(port, None);

        // ambiguous colons never count as a port
        assert!(split_host_port("fe80::1", PortPolicy::Require).is_err());
    }

    #[test]
    fn test_empty_port_is_no_port() {
        assert!(split_host_port("10.0.0.1:", PortPolicy::Require).is_err());
        assert!(split_host_port("[::1]:", PortPolicy::Require).is_err());

        let (host, port) = split_host_port("10.0.0.1:", PortPolicy::Optional).unwrap();
        assert_eq!(host, "10.0.0.1");
        assert_eq!(port, None);

        let (host, port) = split_host_port("[::1]:", PortPolicy::Forbid).unwrap();
        assert_eq!(host, "::1");
        assert_eq!(port, None);
    }

    #[test]
    fn test_parse_ipv4() {
        let addr = parse("192.168.0.10:5060", PortPolicy::Optional).unwrap();
        assert!(addr.is_ipv4());
        assert_eq!(addr.addr_string(), "192.168.0.10");
        assert_eq!(addr.port(), 5060);

        let addr = parse("192.168.0.10", PortPolicy::Optional).unwrap();
        assert_eq!(addr.port(), 0);
    }

    #[test]
    fn test_parse_ipv6() {
        let addr = parse("[2001:db8::5]:2000", PortPolicy::Require).unwrap();
        assert!(addr.is_ipv6());
        assert_eq!(addr.addr_string(), "2001:db8::5");
        assert_eq!(addr.port(), 2000);

        let addr = parse("fe80::1", PortPolicy::Forbid).unwrap();
        assert!(addr.is_ipv6_link_local());
    }

    #[test]
    fn test_parse_empty_port() {
        assert!(parse("10.0.0.1:", PortPolicy::Require).is_err());

        let addr = parse("[::1]:", PortPolicy::Forbid).unwrap();
        assert!(addr.is_ipv6());
        assert_eq!(addr.port(), 0);
    }

    #[test]
    fn test_parse_ignore_drops_port() {
        let addr = parse("10.0.0.1:5060", PortPolicy::Ignore).unwrap();
        assert_eq!(addr.port(), 0);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert!(matches!(
            parse("localhost:5060", PortPolicy::Optional),
            Err(Error::MalformedAddress(_))
        ));
        assert!(parse("10.0.0.1:sip", PortPolicy::Optional).is_err());
        assert!(parse("", PortPolicy::Optional).is_err());
        assert!(parse("10.0.0.256", PortPolicy::Optional).is_err());
        assert!(parse("10.0.0.1", PortPolicy::Require).is_err());
    }

    #[test]
    fn test_resolve_ipv4() {
        let addrs = resolve("127.0.0.1:9090", PortPolicy::Optional, Family::Unspecified);
        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].port(), 9090);
        assert!(addrs[0].is_ipv4());
    }

    #[test]
    fn test_resolve_localhost() {
        let addrs = resolve("localhost:8080", PortPolicy::Optional, Family::Unspecified);
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|addr| addr.port() == 8080));
    }

    #[test]
    fn test_resolve_family_filter() {
        assert!(resolve("127.0.0.1", PortPolicy::Optional, Family::Ipv6).is_empty());
        assert!(resolve("::1", PortPolicy::Optional, Family::Ipv4).is_empty());
        let addrs = resolve("[::1]:5060", PortPolicy::Optional, Family::Ipv6);
        assert_eq!(addrs.len(), 1);
        assert!(addrs[0].is_ipv6());
    }

    #[test]
    fn test_resolve_failures_are_empty() {
        assert!(resolve("", PortPolicy::Optional, Family::Unspecified).is_empty());
        assert!(resolve("127.0.0.1", PortPolicy::Require, Family::Unspecified).is_empty());
        assert!(resolve("name.invalid", PortPolicy::Optional, Family::Unspecified).is_empty());
    }

    #[test]
    fn test_resolve_first() {
        let addr = resolve_first("127.0.0.1:7070", PortPolicy::Optional, Family::Unspecified).unwrap();
        assert_eq!(addr.port(), 7070);
        assert!(matches!(
            resolve_first("", PortPolicy::Optional, Family::Unspecified),
            Err(Error::ResolutionFailed(_))
        ));
    }
}
