use crate::config::HostConfig;
use std::collections::{BTreeMap, HashSet};

/// Expands a symbolic network, group or host name into concrete addresses.
///
/// An empty result is a normal outcome; callers decide what it means.
pub trait NetworkResolver {
    fn resolve(&self, name: &str) -> Vec<String>;
}

/// Resolver backed by the `networks` map of the host configuration
///
/// Members naming another network are expanded in place. Cycles are cut at
/// the first repeated name.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    networks: BTreeMap<String, Vec<String>>,
}

impl ConfigResolver {
    pub fn new(networks: BTreeMap<String, Vec<String>>) -> Self {
        Self { networks }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(config.networks.clone())
    }

    fn expand(&self, name: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        if !seen.insert(name.to_string()) {
            return;
        }

        if let Some(members) = self.networks.get(name) {
            for member in members {
                if self.networks.contains_key(member) {
                    self.expand(member, seen, out);
                } else if !out.contains(member) {
                    out.push(member.clone());
                }
            }
        }
    }
}

impl NetworkResolver for ConfigResolver {
    fn resolve(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.expand(name, &mut HashSet::new(), &mut out);
        out
    }
}

impl<F> NetworkResolver for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn resolve(&self, name: &str) -> Vec<String> {
        self(name)
    }
}
