//! Ordering and hashing of socket addresses
//!
//! Before two addresses of different lengths are compared, an
//! IPv4-mapped IPv6 side is rewritten to plain IPv4 so that
//! `::ffff:1.2.3.4` and `1.2.3.4` land on the same key.
//!
//! [`SockAddr`] gets `Hash` from [`hash`] and an `Eq` that reads every
//! IPv4-mapped address as its IPv4 form. It does not implement `Ord`: mapped normalization only applies across
//! lengths, which breaks transitivity between an IPv4 address, its mapped
//! form and an unrelated IPv6 address. Sort with [`compare_full`] directly.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use tracing::error;

use super::SockAddr;

fn normalized<'a>(a: &'a SockAddr, b: &'a SockAddr) -> (Cow<'a, SockAddr>, Cow<'a, SockAddr>) {
    if a.len() != b.len() {
        if let Some(mapped) = a.ipv4_mapped() {
            return (Cow::Owned(mapped), Cow::Borrowed(b));
        }
        if let Some(mapped) = b.ipv4_mapped() {
            return (Cow::Borrowed(a), Cow::Owned(mapped));
        }
    }
    (Cow::Borrowed(a), Cow::Borrowed(b))
}

fn canonical(addr: &SockAddr) -> Cow<'_, SockAddr> {
    match addr.ipv4_mapped() {
        Some(plain) => Cow::Owned(plain),
        None => Cow::Borrowed(addr),
    }
}

/// Total order on length, then raw bytes (family, port and address).
pub fn compare_full(a: &SockAddr, b: &SockAddr) -> Ordering {
    let (a, b) = normalized(a, b);
    a.len()
        .cmp(&b.len())
        .then_with(|| a.as_bytes().cmp(b.as_bytes()))
}

/// Order on the address payload only; ports are ignored.
///
/// Two addresses of the same length but of no known family compare as
/// `Less`, in both directions. Unknown families sort first and never
/// compare equal, and callers that sort mixed tables rely on that.
pub fn compare_address_only(a: &SockAddr, b: &SockAddr) -> Ordering {
    let (a, b) = normalized(a, b);
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {}
        unequal => return unequal,
    }

    if let (Some(x), Some(y)) = (a.as_ipv4(), b.as_ipv4()) {
        return x.ip().cmp(y.ip());
    }
    if let (Some(x), Some(y)) = (a.as_ipv6(), b.as_ipv6()) {
        return x.ip().cmp(y.ip());
    }
    Ordering::Less
}

/// 32-bit hash of the address, port excluded.
///
/// IPv4 hashes to the address itself, IPv6 to its low 32 bits, so an
/// IPv4-mapped address and its IPv4 form share a bucket. Anything else
/// hashes to 0.
///
/// The IPv4 value is the numeric address in host order
/// (`u32::from(Ipv4Addr)`, so `1.2.3.4` is `0x01020304`), not the raw
/// network-order `s_addr` word. IPv6 reads its last four octets the same way.
pub fn hash(addr: &SockAddr) -> u32 {
    if let Some(v4) = addr.as_ipv4() {
        return u32::from(*v4.ip());
    }
    if let Some(v6) = addr.as_ipv6() {
        let o = v6.ip().octets();
        return u32::from_be_bytes([o[12], o[13], o[14], o[15]]);
    }
    if !addr.is_null() {
        error!(family = addr.raw_family(), len = addr.len(), "unknown address family");
    }
    0
}

/// Equality on family, port and address, with an IPv4-mapped address
/// standing for its plain IPv4 form.
///
/// Both sides are reduced to that form before the bytes are compared, so a
/// mapped address equals its IPv4 form whatever its flow label or scope id,
/// and `==` stays transitive. This is the one place where `==` and
/// [`compare_full`] disagree: two mapped addresses that differ only in flow
/// label or scope id are equal but do not compare `Equal`.
impl PartialEq for SockAddr {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (canonical(self), canonical(other));
        a.len() == b.len() && a.as_bytes() == b.as_bytes()
    }
}

impl Eq for SockAddr {}

impl Hash for SockAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(hash(self));
    }
}
