//! Property tests for address parsing, ordering and hashing

use std::cmp::Ordering;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV6};

use netsock::net::cmp::{compare_address_only, compare_full, hash};
use netsock::net::{parse, AddrFormat, PortPolicy, SockAddr};
use proptest::prelude::*;

fn any_sockaddr() -> impl Strategy<Value = SockAddr> {
    prop_oneof![
        Just(SockAddr::null()),
        (any::<u32>(), any::<u16>()).prop_map(|(ip, port)| SockAddr::new_v4(Ipv4Addr::from(ip), port)),
        (any::<u128>(), any::<u16>()).prop_map(|(ip, port)| SockAddr::new_v6(Ipv6Addr::from(ip), port)),
        (any::<u32>(), any::<u16>())
            .prop_map(|(ip, port)| SockAddr::new_v6(Ipv4Addr::from(ip).to_ipv6_mapped(), port)),
    ]
}

proptest! {
    #[test]
    fn compare_full_is_reflexive(a in any_sockaddr()) {
        prop_assert_eq!(compare_full(&a, &a), Ordering::Equal);
        prop_assert_eq!(compare_full(&a, &a.clone()), Ordering::Equal);
    }

    #[test]
    fn compare_full_is_antisymmetric(a in any_sockaddr(), b in any_sockaddr()) {
        prop_assert_eq!(compare_full(&a, &b), compare_full(&b, &a).reverse());
    }

    #[test]
    fn equal_addresses_hash_alike(a in any_sockaddr(), b in any_sockaddr()) {
        if a == b {
            prop_assert_eq!(hash(&a), hash(&b));
        }
    }

    #[test]
    fn mapped_matches_plain_ipv4(ip in any::<u32>(), port in any::<u16>(), other_port in any::<u16>()) {
        let plain = SockAddr::new_v4(Ipv4Addr::from(ip), port);
        let mapped = SockAddr::new_v6(Ipv4Addr::from(ip).to_ipv6_mapped(), other_port);
        prop_assert_eq!(compare_address_only(&mapped, &plain), Ordering::Equal);
        prop_assert_eq!(compare_address_only(&plain, &mapped), Ordering::Equal);
        prop_assert_eq!(hash(&mapped), hash(&plain));
    }

    #[test]
    fn mapped_equality_ignores_flowinfo_and_scope(
        ip in any::<u32>(),
        port in any::<u16>(),
        flow in any::<(u32, u32)>(),
        scope in any::<(u32, u32)>(),
    ) {
        let mapped = Ipv4Addr::from(ip).to_ipv6_mapped();
        let plain = SockAddr::new_v4(Ipv4Addr::from(ip), port);
        let a = SockAddr::from(SocketAddrV6::new(mapped, port, flow.0 & 0x000f_ffff, scope.0));
        let b = SockAddr::from(SocketAddrV6::new(mapped, port, flow.1 & 0x000f_ffff, scope.1));
        prop_assert_eq!(&a, &plain);
        prop_assert_eq!(&b, &plain);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn ipv4_mapped_is_idempotent(ip in any::<u32>(), port in any::<u16>()) {
        let mapped = SockAddr::new_v6(Ipv4Addr::from(ip).to_ipv6_mapped(), port);
        let plain = mapped.ipv4_mapped().unwrap();
        prop_assert!(plain.ipv4_mapped().is_none());
        prop_assert_eq!(compare_full(&plain, &mapped), Ordering::Equal);
    }

    #[test]
    fn ipv4_text_round_trips(ip in any::<u32>(), port in any::<u16>()) {
        let ip = Ipv4Addr::from(ip);
        let addr = parse(&format!("{}:{}", ip, port), PortPolicy::Require).unwrap();
        prop_assert_eq!(addr.stringify(AddrFormat::Addr), ip.to_string());
        prop_assert_eq!(addr.stringify(AddrFormat::Port), port.to_string());
    }

    #[test]
    fn ipv6_text_round_trips(ip in any::<u128>(), port in any::<u16>()) {
        let ip = Ipv6Addr::from(ip);
        prop_assume!(ip.to_ipv4_mapped().is_none());
        let addr = parse(&format!("[{}]:{}", ip, port), PortPolicy::Require).unwrap();
        prop_assert_eq!(addr.stringify(AddrFormat::Addr).parse::<Ipv6Addr>().unwrap(), ip);
        prop_assert_eq!(addr.stringify(AddrFormat::Port), port.to_string());
        prop_assert_eq!(addr.to_string(), format!("[{}]:{}", ip, port));
    }
}
