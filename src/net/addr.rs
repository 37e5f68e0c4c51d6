//! Socket address handling
//!
//! [`SockAddr`] is a fixed-size, family-tagged socket address: a
//! `sockaddr_storage` plus the number of bytes actually in use. A length of
//! zero is the null address. Every constructor zero-fills the storage, and
//! copies move exactly `len` bytes, so no uninitialized tail is ever exposed.
//!
//! The family is read from the storage itself and is only trusted when the
//! length matches the family's structure size.

use std::fmt;
use std::io;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::ptr;
use std::slice;

use tracing::{debug, error};

use super::Error;

pub(crate) const STORAGE_LEN: usize = mem::size_of::<libc::sockaddr_storage>();
pub(crate) const SIN_LEN: usize = mem::size_of::<libc::sockaddr_in>();
pub(crate) const SIN6_LEN: usize = mem::size_of::<libc::sockaddr_in6>();

/// Address family selector, also used as the resolver's family filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Family {
    /// Any family
    #[default]
    Unspecified,
    /// IPv4
    Ipv4,
    /// IPv6
    Ipv6,
}

impl Family {
    /// The platform `AF_*` constant for this family.
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Family::Unspecified => libc::AF_UNSPEC,
            Family::Ipv4 => libc::AF_INET,
            Family::Ipv6 => libc::AF_INET6,
        }
    }
}

/// Output shapes for [`SockAddr::stringify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddrFormat {
    /// `addr:port`, with brackets around IPv6 addresses
    #[default]
    Default,
    /// Bare address
    Addr,
    /// Decimal port
    Port,
    /// Address with brackets around IPv6, no port
    Host,
}

/// A dual-stack socket address value.
pub struct SockAddr {
    storage: libc::sockaddr_storage,
    len: libc::socklen_t,
}

impl SockAddr {
    /// The null address (length zero).
    pub fn null() -> Self {
        SockAddr {
            // SAFETY: sockaddr_storage is plain old data; all-zero is valid.
            storage: unsafe { mem::zeroed() },
            len: 0,
        }
    }

    /// Build an address from `len` raw bytes of a platform `sockaddr`.
    ///
    /// `len` is clamped to the storage capacity. The result is not
    /// validated; use [`SockAddr::is_valid`] before trusting it.
    ///
    /// # Safety
    ///
    /// `raw` must be valid for reads of `len` bytes (or of the storage
    /// capacity, whichever is smaller).
    pub unsafe fn from_raw_parts(raw: *const libc::sockaddr, len: libc::socklen_t) -> Self {
        let mut addr = Self::null();
        let len = (len as usize).min(STORAGE_LEN);
        ptr::copy_nonoverlapping(raw.cast::<u8>(), addr.storage_bytes_mut().as_mut_ptr(), len);
        addr.len = len as libc::socklen_t;
        addr
    }

    /// Create a new IPv4 socket address
    pub fn new_v4(ip: Ipv4Addr, port: u16) -> Self {
        Self::from_std(SocketAddr::V4(SocketAddrV4::new(ip, port)))
    }

    /// Create a new IPv6 socket address
    pub fn new_v6(ip: Ipv6Addr, port: u16) -> Self {
        Self::from_std(SocketAddr::V6(SocketAddrV6::new(ip, port, 0, 0)))
    }

    /// Create from a standard library SocketAddr
    pub fn from_std(addr: SocketAddr) -> Self {
        let raw = socket2::SockAddr::from(addr);
        // SAFETY: socket2 hands back an initialized address of `raw.len()` bytes.
        unsafe { Self::from_raw_parts(raw.as_ptr().cast(), raw.len()) }
    }

    /// Convert to standard library SocketAddr
    ///
    /// Returns None for null addresses and for anything that is not a
    /// well-formed IPv4 or IPv6 address.
    pub fn to_std(&self) -> Option<SocketAddr> {
        if !self.is_ipv4() && !self.is_ipv6() {
            return None;
        }
        self.to_socket2().as_socket()
    }

    /// The address as a `socket2` address, for use with `socket2::Socket`.
    pub fn to_socket2(&self) -> socket2::SockAddr {
        // SAFETY: storage is fully initialized and len never exceeds it.
        unsafe { socket2::SockAddr::new(self.storage, self.len) }
    }

    /// The IPv4 view, if this is a well-formed IPv4 address.
    pub fn as_ipv4(&self) -> Option<SocketAddrV4> {
        if self.is_ipv4() {
            self.to_socket2().as_socket_ipv4()
        } else {
            None
        }
    }

    /// The IPv6 view, if this is a well-formed IPv6 address.
    pub fn as_ipv6(&self) -> Option<SocketAddrV6> {
        if self.is_ipv6() {
            self.to_socket2().as_socket_ipv6()
        } else {
            None
        }
    }

    /// True if no address is stored (length 0)
    pub fn is_null(&self) -> bool {
        self.len == 0
    }

    /// Mark the address as null. The storage is left as it was.
    pub fn set_null(&mut self) {
        self.len = 0;
    }

    /// Copy exactly `src.len()` bytes of `src` into `self`.
    pub fn copy_from(&mut self, src: &SockAddr) {
        let bytes = src.as_bytes();
        self.storage_bytes_mut()[..bytes.len()].copy_from_slice(bytes);
        self.len = src.len;
    }

    /// Number of bytes in use.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// The raw `ss_family` discriminant.
    pub fn raw_family(&self) -> libc::c_int {
        libc::c_int::from(self.storage.ss_family)
    }

    /// The address family. Null and unknown families report `Unspecified`.
    pub fn family(&self) -> Family {
        if self.is_ipv4() {
            Family::Ipv4
        } else if self.is_ipv6() {
            Family::Ipv6
        } else {
            Family::Unspecified
        }
    }

    /// Null, or a family whose length matches its structure size.
    pub fn is_valid(&self) -> bool {
        self.is_null() || self.is_ipv4() || self.is_ipv6()
    }

    /// The bytes in use, including family and port.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.len().min(STORAGE_LEN);
        // SAFETY: storage is fully initialized and at least `len` bytes long.
        unsafe { slice::from_raw_parts(ptr::addr_of!(self.storage).cast::<u8>(), len) }
    }

    fn storage_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: storage is plain old data of STORAGE_LEN bytes.
        unsafe { slice::from_raw_parts_mut(ptr::addr_of_mut!(self.storage).cast::<u8>(), STORAGE_LEN) }
    }

    pub(crate) fn as_ptr(&self) -> *const libc::sockaddr {
        ptr::addr_of!(self.storage).cast()
    }

    pub(crate) fn raw_len(&self) -> libc::socklen_t {
        self.len
    }

    /// Let a socket call write into the storage.
    ///
    /// The length is set to the storage capacity before the call and to the
    /// call's output length after it. A failed call leaves the address null.
    pub(crate) fn fill<T>(
        &mut self,
        call: impl FnOnce(*mut libc::sockaddr, *mut libc::socklen_t) -> io::Result<T>,
    ) -> io::Result<T> {
        let mut len = STORAGE_LEN as libc::socklen_t;
        let result = call(ptr::addr_of_mut!(self.storage).cast(), &mut len);
        self.len = match &result {
            Ok(_) => len.min(STORAGE_LEN as libc::socklen_t),
            Err(_) => 0,
        };
        result
    }

    /// Check if this is an IPv4 address
    pub fn is_ipv4(&self) -> bool {
        self.raw_family() == libc::AF_INET && self.len() == SIN_LEN
    }

    /// Check if this is an IPv6 address
    pub fn is_ipv6(&self) -> bool {
        self.raw_family() == libc::AF_INET6 && self.len() == SIN6_LEN
    }

    /// Check for an IPv6 address of the form `::ffff:a.b.c.d`
    pub fn is_ipv4_mapped(&self) -> bool {
        self.as_ipv6().map_or(false, |v6| v6.ip().to_ipv4_mapped().is_some())
    }

    /// Check for an address in 224.0.0.0/4
    pub fn is_ipv4_multicast(&self) -> bool {
        self.as_ipv4().map_or(false, |v4| v4.ip().is_multicast())
    }

    /// Check for an address in fe80::/64
    ///
    /// The remaining 54 bits of the fe80::/10 block must be zero, so
    /// `fe81::1` does not qualify.
    pub fn is_ipv6_link_local(&self) -> bool {
        self.as_ipv6()
            .map_or(false, |v6| v6.ip().segments()[..4] == [0xfe80, 0, 0, 0])
    }

    /// Check for `0.0.0.0` or `::`, whatever the port.
    pub fn is_any(&self) -> bool {
        if let Some(v4) = self.as_ipv4() {
            return v4.ip().is_unspecified();
        }
        self.as_ipv6().map_or(false, |v6| v6.ip().is_unspecified())
    }

    /// The equivalent IPv4 address of an IPv4-mapped IPv6 address.
    ///
    /// The port is kept. Anything else, IPv4 addresses included, yields None.
    pub fn ipv4_mapped(&self) -> Option<SockAddr> {
        let v6 = self.as_ipv6()?;
        let ip = v6.ip().to_ipv4_mapped()?;
        Some(SockAddr::new_v4(ip, v6.port()))
    }

    /// Get the port number
    ///
    /// Returns 0 for null addresses and unknown families
    pub fn port(&self) -> u16 {
        self.to_std().map_or(0, |addr| addr.port())
    }

    /// Replace the port, keeping address, flow label and scope id
    ///
    /// Null addresses and unknown families are left unchanged.
    pub fn set_port(&mut self, port: u16) {
        match self.to_std() {
            Some(mut addr) => {
                addr.set_port(port);
                *self = SockAddr::from_std(addr);
            }
            None => debug!(family = self.raw_family(), len = self.len(), "not setting port on non-IP address"),
        }
    }

    /// The IPv4 address as a host-order integer, 0 for anything else.
    pub fn ipv4_u32(&self) -> u32 {
        match self.as_ipv4() {
            Some(v4) => u32::from(*v4.ip()),
            None => {
                error!(addr = %self, "not an IPv4 address");
                0
            }
        }
    }

    /// Render the address.
    ///
    /// IPv4-mapped IPv6 addresses render in their IPv4 form. The null
    /// address renders as `(null)`; unknown families render as an empty
    /// string.
    pub fn stringify(&self, format: AddrFormat) -> String {
        if self.is_null() {
            return "(null)".to_string();
        }

        let mapped = self.ipv4_mapped();
        let addr = match mapped.as_ref().unwrap_or(self).to_std() {
            Some(addr) => addr,
            None => {
                debug!(family = self.raw_family(), len = self.len(), "cannot render address");
                return String::new();
            }
        };

        let host = match addr {
            SocketAddr::V4(v4) => v4.ip().to_string(),
            SocketAddr::V6(v6) if v6.scope_id() != 0 => format!("{}%{}", v6.ip(), v6.scope_id()),
            SocketAddr::V6(v6) => v6.ip().to_string(),
        };

        match (format, addr.is_ipv6()) {
            (AddrFormat::Addr, _) => host,
            (AddrFormat::Port, _) => addr.port().to_string(),
            (AddrFormat::Host, false) => host,
            (AddrFormat::Host, true) => format!("[{}]", host),
            (AddrFormat::Default, false) => format!("{}:{}", host, addr.port()),
            (AddrFormat::Default, true) => format!("[{}]:{}", host, addr.port()),
        }
    }

    /// Format address as string (without port)
    pub fn addr_string(&self) -> String {
        self.stringify(AddrFormat::Addr)
    }

    /// Format port as string
    pub fn port_string(&self) -> String {
        self.stringify(AddrFormat::Port)
    }
}

/// True if `addr` is absent or null.
pub fn is_null(addr: Option<&SockAddr>) -> bool {
    addr.map_or(true, SockAddr::is_null)
}

impl Default for SockAddr {
    fn default() -> Self {
        Self::null()
    }
}

impl Clone for SockAddr {
    fn clone(&self) -> Self {
        let mut copy = Self::null();
        copy.copy_from(self);
        copy
    }
}

impl fmt::Display for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify(AddrFormat::Default))
    }
}

impl fmt::Debug for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SockAddr")
            .field("family", &self.raw_family())
            .field("len", &self.len)
            .field("addr", &format_args!("{}", self))
            .finish()
    }
}

impl From<SocketAddr> for SockAddr {
    fn from(addr: SocketAddr) -> Self {
        SockAddr::from_std(addr)
    }
}

impl From<SocketAddrV4> for SockAddr {
    fn from(addr: SocketAddrV4) -> Self {
        SockAddr::from_std(SocketAddr::V4(addr))
    }
}

impl From<SocketAddrV6> for SockAddr {
    fn from(addr: SocketAddrV6) -> Self {
        SockAddr::from_std(SocketAddr::V6(addr))
    }
}

impl TryFrom<&SockAddr> for SocketAddr {
    type Error = Error;

    fn try_from(addr: &SockAddr) -> Result<Self, Error> {
        addr.to_std().ok_or_else(|| Error::UnsupportedFamily(addr.raw_family()))
    }
}

/// A family-tagged IP address without a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GenericAddress {
    /// No address; converts to the null [`SockAddr`]
    #[default]
    Unspecified,
    /// IPv4 address octets in network order
    V4([u8; 4]),
    /// IPv6 address octets in network order
    V6([u8; 16]),
}

impl GenericAddress {
    /// Address family of the variant
    pub fn family(&self) -> Family {
        match self {
            GenericAddress::Unspecified => Family::Unspecified,
            GenericAddress::V4(_) => Family::Ipv4,
            GenericAddress::V6(_) => Family::Ipv6,
        }
    }

    /// Combine with a port into a socket address.
    ///
    /// An unspecified family yields the null address.
    pub fn to_sockaddr(&self, port: u16) -> SockAddr {
        match *self {
            GenericAddress::V4(octets) => SockAddr::new_v4(Ipv4Addr::from(octets), port),
            GenericAddress::V6(octets) => SockAddr::new_v6(Ipv6Addr::from(octets), port),
            GenericAddress::Unspecified => {
                debug!("no address family, returning null address");
                SockAddr::null()
            }
        }
    }
}

impl From<IpAddr> for GenericAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => GenericAddress::V4(v4.octets()),
            IpAddr::V6(v6) => GenericAddress::V6(v6.octets()),
        }
    }
}
