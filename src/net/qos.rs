//! Outbound packet marking
//!
//! [`set_qos`] applies a ToS byte to IPv4 traffic, the same value as the
//! IPv6 traffic class, and a link-layer priority (CoS) where the platform
//! has one. [`parse_tos`] turns configuration text such as `EF` or `AF41`
//! into the ToS byte.

use std::io;
use std::mem;
use std::os::fd::{AsFd, AsRawFd};

use socket2::SockRef;
use tracing::{info, warn};

use super::socket::getsockname;
use super::{Error, Result, SockAddr};

/// DSCP class names and code points. The ToS byte is the code point
/// shifted left by two.
const DSCP_CLASSES: &[(&str, u8)] = &[
    ("CS0", 0x00),
    ("CS1", 0x08),
    ("AF11", 0x0a),
    ("AF12", 0x0c),
    ("AF13", 0x0e),
    ("CS2", 0x10),
    ("AF21", 0x12),
    ("AF22", 0x14),
    ("AF23", 0x16),
    ("CS3", 0x18),
    ("AF31", 0x1a),
    ("AF32", 0x1c),
    ("AF33", 0x1e),
    ("CS4", 0x20),
    ("AF41", 0x22),
    ("AF42", 0x24),
    ("AF43", 0x26),
    ("CS5", 0x28),
    ("EF", 0x2e),
    ("CS6", 0x30),
    ("CS7", 0x38),
];

/// Parse a ToS value: a DSCP class name, a decimal byte or a `0x` hex byte
///
/// # Examples
/// ```
/// use netsock::net::qos::parse_tos;
///
/// assert_eq!(parse_tos("EF").unwrap(), 0xb8);
/// assert_eq!(parse_tos("0x68").unwrap(), 0x68);
/// ```
pub fn parse_tos(value: &str) -> Result<u8> {
    let value = value.trim();

    let numeric = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => value.parse::<u8>().ok(),
    };
    if let Some(tos) = numeric {
        return Ok(tos);
    }

    DSCP_CLASSES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|&(_, dscp)| dscp << 2)
        .ok_or_else(|| Error::InvalidTos(value.to_string()))
}

/// DSCP class name of a ToS byte, if it is one of the named classes
pub fn tos_to_name(tos: u8) -> Option<&'static str> {
    DSCP_CLASSES
        .iter()
        .find(|&&(_, dscp)| dscp << 2 == tos)
        .map(|&(name, _)| name)
}

fn set_int_option<S: AsFd>(socket: &S, level: libc::c_int, name: libc::c_int, value: libc::c_int) -> io::Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            socket.as_fd().as_raw_fd(),
            level,
            name,
            &value as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn set_cos<S: AsFd>(socket: &S, cos: u32, description: &str) {
    match set_int_option(socket, libc::SOL_SOCKET, libc::SO_PRIORITY, cos as libc::c_int) {
        Err(e) => warn!(description, cos, error = %e, "unable to set CoS"),
        Ok(()) if cos != 0 => info!(description, cos, "using CoS mark"),
        Ok(()) => {}
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn set_cos<S: AsFd>(_socket: &S, _cos: u32, _description: &str) {}

/// Mark outbound traffic of `socket` with `tos` and `cos`
///
/// An IPv4 socket gets the ToS field. An IPv6 socket gets the traffic class,
/// and the ToS field as well when bound to `::`, since it may then carry
/// IPv4-mapped traffic. The CoS priority is set on Linux only. A failing
/// step is logged with `description` and the others still run; the result
/// is that of the last ToS/traffic class step.
pub fn set_qos<S: AsFd>(socket: &S, tos: u8, cos: u32, description: &str) -> io::Result<()> {
    let mut local = SockAddr::null();
    let set_tclass = getsockname(socket, &mut local).is_ok() && local.is_ipv6();
    let set_tos = !set_tclass || local.is_any();

    let mut result = Ok(());

    if set_tos {
        result = SockRef::from(socket).set_tos(u32::from(tos));
        match &result {
            Err(e) => warn!(description, tos, error = %e, "unable to set DSCP TOS value (no root privileges?)"),
            Ok(()) if tos != 0 => info!(description, tos, "using TOS bits"),
            Ok(()) => {}
        }
    }

    if set_tclass {
        result = set_int_option(socket, libc::IPPROTO_IPV6, libc::IPV6_TCLASS, libc::c_int::from(tos));
        match &result {
            Err(e) => warn!(description, tos, error = %e, "unable to set DSCP TCLASS field (no root privileges?)"),
            Ok(()) if tos != 0 => info!(description, tos, "using TOS bits in TCLASS field"),
            Ok(()) => {}
        }
    }

    set_cos(socket, cos, description);

    result
}
