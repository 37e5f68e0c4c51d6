//! Socket calls on [`SockAddr`]
//!
//! These wrap the BSD socket primitives so that callers hand over a
//! [`SockAddr`] instead of a `sockaddr` pointer and a separate length.
//! Calls that return an address size the buffer to the full storage and
//! read the length back from the kernel. Errors are the OS error, untouched.
//!
//! Passing a null address to `bind`, `connect` or `sendto` hands a zero
//! length to the kernel, which rejects it; callers should check
//! [`SockAddr::is_null`] first.

use std::io;
use std::mem;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;

use tracing::{debug, error};

use super::addr::SIN_LEN;
use super::SockAddr;

fn raw_fd<S: AsFd>(socket: &S) -> RawFd {
    socket.as_fd().as_raw_fd()
}

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn cvt_size(ret: libc::ssize_t) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

/// Accept a connection, storing the peer address in `addr`
pub fn accept<S: AsFd>(socket: &S, addr: &mut SockAddr) -> io::Result<OwnedFd> {
    let fd = raw_fd(socket);
    let conn = addr.fill(|raw, len| cvt(unsafe { libc::accept(fd, raw, len) }))?;
    // SAFETY: accept returned a fresh descriptor that nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(conn) })
}

/// Bind the socket to `addr`
pub fn bind<S: AsFd>(socket: &S, addr: &SockAddr) -> io::Result<()> {
    cvt(unsafe { libc::bind(raw_fd(socket), addr.as_ptr(), addr.raw_len()) }).map(drop)
}

/// Connect the socket to `addr`
pub fn connect<S: AsFd>(socket: &S, addr: &SockAddr) -> io::Result<()> {
    cvt(unsafe { libc::connect(raw_fd(socket), addr.as_ptr(), addr.raw_len()) }).map(drop)
}

/// Store the socket's local address in `addr`
pub fn getsockname<S: AsFd>(socket: &S, addr: &mut SockAddr) -> io::Result<()> {
    let fd = raw_fd(socket);
    addr.fill(|raw, len| cvt(unsafe { libc::getsockname(fd, raw, len) }))
        .map(drop)
}

/// Receive a datagram, storing the sender in `addr`
pub fn recvfrom<S: AsFd>(
    socket: &S,
    buf: &mut [u8],
    flags: libc::c_int,
    addr: &mut SockAddr,
) -> io::Result<usize> {
    let fd = raw_fd(socket);
    addr.fill(|raw, len| {
        cvt_size(unsafe { libc::recvfrom(fd, buf.as_mut_ptr().cast(), buf.len(), flags, raw, len) })
    })
}

/// Send a datagram to `addr`
pub fn sendto<S: AsFd>(socket: &S, buf: &[u8], flags: libc::c_int, addr: &SockAddr) -> io::Result<usize> {
    cvt_size(unsafe {
        libc::sendto(
            raw_fd(socket),
            buf.as_ptr().cast(),
            buf.len(),
            flags,
            addr.as_ptr(),
            addr.raw_len(),
        )
    })
}

/// Convert to a raw `sockaddr_in` for code that still takes one
///
/// A null address converts to an all-zero structure. Anything else that is
/// not exactly IPv4-sized yields None.
pub fn to_legacy_ipv4(addr: &SockAddr) -> Option<libc::sockaddr_in> {
    // SAFETY: sockaddr_in is plain old data; all-zero is valid.
    let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
    if addr.is_null() {
        return Some(sin);
    }
    if addr.len() != SIN_LEN {
        error!(len = addr.len(), family = addr.raw_family(), "bad address for sockaddr_in conversion");
        return None;
    }
    // SAFETY: both sides are SIN_LEN bytes.
    unsafe {
        ptr::copy_nonoverlapping(
            addr.as_bytes().as_ptr(),
            ptr::addr_of_mut!(sin).cast::<u8>(),
            SIN_LEN,
        );
    }
    Some(sin)
}

/// Wrap a raw `sockaddr_in`
pub fn from_legacy_ipv4(sin: &libc::sockaddr_in) -> SockAddr {
    if libc::c_int::from(sin.sin_family) != libc::AF_INET {
        debug!(family = sin.sin_family, "address family is not AF_INET");
    }
    // SAFETY: `sin` is SIN_LEN readable bytes.
    unsafe { SockAddr::from_raw_parts((sin as *const libc::sockaddr_in).cast(), SIN_LEN as libc::socklen_t) }
}
