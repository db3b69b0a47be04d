use hc_core::AddressFamily;
use ipnet::IpNet;
use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;

/// Leading dotted quad with any mask after it, e.g. `10.0.0.0/255.0.0.0`
static DOTTED_QUAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}(/.*)?$").unwrap());

/// Which address family a concrete address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    V4,
    V6,
    /// Hostnames and anything else without a recognizable notation
    Either,
}

pub fn classify(addr: &str) -> AddressClass {
    let addr = addr.trim();

    if let Ok(net) = addr.parse::<IpNet>() {
        return match net {
            IpNet::V4(_) => AddressClass::V4,
            IpNet::V6(_) => AddressClass::V6,
        };
    }
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(_) => AddressClass::V4,
            IpAddr::V6(_) => AddressClass::V6,
        };
    }

    // Notation alone decides for literals the parsers refuse
    if DOTTED_QUAD.is_match(addr) {
        AddressClass::V4
    } else if addr.matches(':').count() >= 2 {
        AddressClass::V6
    } else {
        AddressClass::Either
    }
}

/// True if a rule naming `addr` belongs in the ruleset for `family`
pub fn accepts(family: AddressFamily, addr: &str) -> bool {
    match (classify(addr), family) {
        (AddressClass::Either, _) => true,
        (AddressClass::V4, AddressFamily::Ipv4) => true,
        (AddressClass::V6, AddressFamily::Ipv6) => true,
        _ => false,
    }
}

/// Everything in the fixed skeleton that differs between iptables and ip6tables
#[derive(Debug, Clone, Copy)]
pub struct FamilyProfile {
    pub family: AddressFamily,
    pub icmp_protocol: &'static str,
    pub icmp_type_option: &'static str,
    pub log_prefix: &'static str,
    pub port_unreachable: &'static str,
    /// Match tokens for broadcast traffic, dropped early where the family has broadcast
    pub broadcast_match: Option<&'static [&'static str]>,
}

pub static IPV4: FamilyProfile = FamilyProfile {
    family: AddressFamily::Ipv4,
    icmp_protocol: "icmp",
    icmp_type_option: "--icmp-type",
    log_prefix: "iptables: ",
    port_unreachable: "icmp-port-unreachable",
    broadcast_match: Some(&["-m", "pkttype", "--pkt-type", "broadcast"]),
};

pub static IPV6: FamilyProfile = FamilyProfile {
    family: AddressFamily::Ipv6,
    icmp_protocol: "ipv6-icmp",
    icmp_type_option: "--icmpv6-type",
    log_prefix: "ip6tables: ",
    port_unreachable: "icmp6-port-unreachable",
    broadcast_match: None,
};

pub fn profile(family: AddressFamily) -> &'static FamilyProfile {
    match family {
        AddressFamily::Ipv4 => &IPV4,
        AddressFamily::Ipv6 => &IPV6,
    }
}
