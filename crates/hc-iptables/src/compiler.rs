use crate::assembler::{self, ResolvedEntry};
use crate::entry::{Action, Port, RuleIntent, RuleListEntry, Source, parse_rule_list};
use crate::error::FirewallError;
use crate::family::{self, FamilyProfile};
use crate::rule::{Rule, RuleFile, Target};
use crate::table::{INPUTDROP, Table};
use hc_core::{AddressFamily, HostConfig, IptablesConfig, NetworkResolver};
use tracing::{info, warn};

/// Compiles the declarative firewall lists into one ruleset per address family
pub struct RulesetCompiler<'a> {
    lists: &'a IptablesConfig,
    dhcp_server: bool,
    resolver: &'a dyn NetworkResolver,
}

impl<'a> RulesetCompiler<'a> {
    pub fn new(lists: &'a IptablesConfig, dhcp_server: bool, resolver: &'a dyn NetworkResolver) -> Self {
        Self {
            lists,
            dhcp_server,
            resolver,
        }
    }

    pub fn from_config(config: &'a HostConfig, resolver: &'a dyn NetworkResolver) -> Self {
        Self::new(&config.firewall.iptables, config.is_dhcp_server(), resolver)
    }

    /// Build the complete rule file for `family`.
    ///
    /// Any malformed entry in either list fails the whole compile.
    pub fn compile(&self, family: AddressFamily) -> Result<RuleFile, FirewallError> {
        let profile = family::profile(family);

        let drop_entries = parse_rule_list("drop", &self.lists.drop)?;
        let accept_entries = parse_rule_list("accept", &self.lists.accept)?;

        let mut unresolved = Vec::new();
        let drops = self.resolve_all(profile, Action::Drop, &drop_entries, &mut unresolved);
        let accepts = self.resolve_all(profile, Action::Accept, &accept_entries, &mut unresolved);

        let mut file = RuleFile::new(family);
        file.unresolved = unresolved;
        file.append(assembler::filter_header());
        file.append(assembler::bypass_rules(profile));
        file.append(assembler::icmp_chain(profile));
        file.append(assembler::logging_chains(profile));
        file.append(assembler::broadcast_drop(profile));
        file.append(assembler::dhcp_guard(self.dhcp_server));
        file.append(assembler::entry_block(Action::Drop, &drops));
        file.append(assembler::inputdrop_jump());
        file.append(assembler::entry_block(Action::Accept, &accepts));
        file.append(assembler::raw_lines(&self.lists.append));
        file.append(assembler::catch_all(profile));
        file.append(assembler::forward_drop());
        file.append(assembler::passthrough_table(&Table::nat(), &self.lists.nat_append));
        file.append(assembler::passthrough_table(&Table::mangle(), &self.lists.mangle_append));

        Ok(file)
    }

    fn resolve_all(
        &self,
        profile: &FamilyProfile,
        action: Action,
        entries: &[RuleListEntry],
        unresolved: &mut Vec<String>,
    ) -> Vec<ResolvedEntry> {
        entries
            .iter()
            .map(|entry| match entry {
                RuleListEntry::Comment(text) => ResolvedEntry::Comment(text.clone()),
                RuleListEntry::Rule(intent) => ResolvedEntry::Rules {
                    label: intent.to_string(),
                    rules: self.resolve_intent(profile, action, intent, unresolved),
                },
            })
            .collect()
    }

    /// Concrete rules for one entry in one family; empty when nothing applies
    fn resolve_intent(
        &self,
        profile: &FamilyProfile,
        action: Action,
        intent: &RuleIntent,
        unresolved: &mut Vec<String>,
    ) -> Vec<Rule> {
        let name = match &intent.source {
            Source::Any => return vec![build_rule(action, None, intent)],
            Source::Named(name) => name,
        };

        let addresses = self.resolver.resolve(name);
        if !addresses.is_empty() {
            info!(name = %name, count = addresses.len(), "resolved network name");
            return addresses
                .iter()
                .filter(|addr| family::accepts(profile.family, addr))
                .map(|addr| build_rule(action, Some(addr.as_str()), intent))
                .collect();
        }

        if is_symbolic(name) {
            warn!(name = %name, family = %profile.family, "network name did not resolve, skipping entry");
            if !unresolved.contains(name) {
                unresolved.push(name.clone());
            }
            return vec![];
        }

        if family::accepts(profile.family, name) {
            vec![build_rule(action, Some(name.as_str()), intent)]
        } else {
            vec![]
        }
    }
}

/// Group and class names start with an uppercase letter; anything else is a
/// literal address or hostname
fn is_symbolic(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn build_rule(action: Action, source: Option<&str>, intent: &RuleIntent) -> Rule {
    let (chain, target) = match action {
        Action::Accept => ("INPUT", Target::Accept),
        Action::Drop => (INPUTDROP, Target::Drop),
    };

    let mut rule = Rule::new(chain);
    if let Some(source) = source {
        rule = rule.source(source);
    }

    rule = match &intent.port {
        Port::Service(port) => rule
            .protocol(intent.effective_protocol().as_str())
            .matching(["--dport", port.as_str()]),
        Port::Any => match intent.protocol {
            Some(protocol) => rule.protocol(protocol.as_str()),
            None => rule,
        },
    };

    rule.target(target).with_comment(intent.comment.as_deref())
}
