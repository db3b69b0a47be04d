use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declarative host configuration, as merged from one or more YAML fragments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host runs a DHCP server, so inbound `bootps` replies must not be dropped
    #[serde(default)]
    pub dhcp_server: Option<bool>,
    /// Dangerous capabilities the operator has explicitly forced (e.g. "iptables")
    #[serde(default)]
    pub force: Vec<String>,
    /// Symbolic network/group names and their members
    #[serde(default)]
    pub networks: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub firewall: FirewallConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirewallConfig {
    #[serde(default)]
    pub enable: Option<bool>,
    #[serde(default)]
    pub iptables: IptablesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IptablesConfig {
    #[serde(default)]
    pub enable: Option<bool>,
    /// Flat `source, port` list of entries accepted in INPUT
    #[serde(default)]
    pub accept: Vec<String>,
    /// Flat `source, port` list of entries dropped via `inputdrop`
    #[serde(default)]
    pub drop: Vec<String>,
    /// Raw filter rule lines appended after the accept block
    #[serde(default)]
    pub append: Vec<String>,
    #[serde(default)]
    pub nat_append: Vec<String>,
    #[serde(default)]
    pub mangle_append: Vec<String>,
}

/// IP address family a ruleset is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub const ALL: [AddressFamily; 2] = [AddressFamily::Ipv4, AddressFamily::Ipv6];

    /// Name of the dangerous capability that must be forced to install this family
    pub fn capability(&self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "iptables",
            AddressFamily::Ipv6 => "ip6tables",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

impl HostConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // An empty fragment deserializes to null
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn is_dhcp_server(&self) -> bool {
        self.dhcp_server.unwrap_or(false)
    }

    pub fn firewall_enabled(&self) -> bool {
        self.firewall.enable.unwrap_or(true)
    }

    pub fn iptables_enabled(&self) -> bool {
        self.firewall.iptables.enable.unwrap_or(true)
    }

    pub fn is_forced(&self, capability: &str) -> bool {
        self.force.iter().any(|c| c == capability)
    }

    /// Layer `other` on top of `self`.
    ///
    /// Lists concatenate in fragment order, explicitly set scalars override,
    /// and `networks` entries merge by name.
    pub fn merge(&mut self, other: HostConfig) {
        if other.dhcp_server.is_some() {
            self.dhcp_server = other.dhcp_server;
        }
        for capability in other.force {
            if !self.force.contains(&capability) {
                self.force.push(capability);
            }
        }
        for (name, members) in other.networks {
            self.networks.entry(name).or_default().extend(members);
        }
        self.firewall.merge(other.firewall);
    }
}

impl FirewallConfig {
    fn merge(&mut self, other: FirewallConfig) {
        if other.enable.is_some() {
            self.enable = other.enable;
        }
        self.iptables.merge(other.iptables);
    }
}

impl IptablesConfig {
    fn merge(&mut self, other: IptablesConfig) {
        if other.enable.is_some() {
            self.enable = other.enable;
        }
        self.accept.extend(other.accept);
        self.drop.extend(other.drop);
        self.append.extend(other.append);
        self.nat_append.extend(other.nat_append);
        self.mangle_append.extend(other.mangle_append);
    }

    /// True when there is anything for the filter table to carry
    pub fn has_rules(&self) -> bool {
        !self.accept.is_empty() || !self.drop.is_empty() || !self.append.is_empty()
    }
}
