// iptables-restore table and chain declarations
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub chains: Vec<Chain>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub name: String,
    /// Built-in chains carry a policy; user chains are declared with `-`
    pub policy: Option<String>,
}

pub const RATELIMIT: &str = "ratelimit";
pub const LOGANDDROP: &str = "loganddrop";
pub const LOGGER: &str = "logger";
pub const ICMP: &str = "icmp";
pub const INPUTDROP: &str = "inputdrop";

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            chains: vec![],
        }
    }

    fn builtin(mut self, names: &[&str]) -> Self {
        self.chains
            .extend(names.iter().map(|name| Chain::builtin(name, "ACCEPT")));
        self
    }

    fn user(mut self, names: &[&str]) -> Self {
        self.chains.extend(names.iter().map(|name| Chain::user(name)));
        self
    }

    pub fn filter() -> Self {
        Self::new("filter")
            .builtin(&["INPUT", "FORWARD", "OUTPUT"])
            .user(&[RATELIMIT, LOGANDDROP, LOGGER, ICMP, INPUTDROP])
    }

    pub fn nat() -> Self {
        Self::new("nat").builtin(&["PREROUTING", "INPUT", "OUTPUT", "POSTROUTING"])
    }

    pub fn mangle() -> Self {
        Self::new("mangle").builtin(&["PREROUTING", "INPUT", "FORWARD", "OUTPUT", "POSTROUTING"])
    }
}

impl Chain {
    pub fn builtin(name: &str, policy: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: Some(policy.to_string()),
        }
    }

    pub fn user(name: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: None,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{} {} [0:0]", self.name, self.policy.as_deref().unwrap_or("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_declares_builtins_before_user_chains() {
        let names: Vec<String> = Table::filter().chains.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            names,
            vec![
                ":INPUT ACCEPT [0:0]",
                ":FORWARD ACCEPT [0:0]",
                ":OUTPUT ACCEPT [0:0]",
                ":ratelimit - [0:0]",
                ":loganddrop - [0:0]",
                ":logger - [0:0]",
                ":icmp - [0:0]",
                ":inputdrop - [0:0]",
            ]
        );
    }

    #[test]
    fn nat_and_mangle_have_no_user_chains() {
        assert!(Table::nat().chains.iter().all(|c| c.policy.is_some()));
        assert_eq!(Table::mangle().chains.len(), 5);
    }
}
