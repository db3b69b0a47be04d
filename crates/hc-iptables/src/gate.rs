use hc_core::{AddressFamily, HostConfig};
use similar::{ChangeTag, TextDiff};

/// Why the firewall step did not run at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    FirewallDisabled,
    IptablesDisabled,
    NoRules,
}

/// What the gate allows for one compiled ruleset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Installed file already matches byte for byte
    Unchanged,
    /// Content differs but the capability was not forced; nothing is written
    WouldChange { diff: String },
    /// Content differs and the operator forced the change
    Install { diff: String },
}

/// Decides whether a compiled ruleset may touch the live system.
///
/// Installing firewall rules is a dangerous capability: by default the gate
/// only reports what would change.
#[derive(Debug, Clone, Copy)]
pub struct SafetyGate {
    forced: bool,
}

impl SafetyGate {
    pub fn new(forced: bool) -> Self {
        Self { forced }
    }

    /// Gate for one address family, forced by naming its capability in the config
    pub fn for_family(config: &HostConfig, family: AddressFamily) -> Self {
        Self::new(config.is_forced(family.capability()))
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// Whether the step runs at all for this configuration
    pub fn check_enabled(config: &HostConfig) -> Result<(), SkipReason> {
        if !config.firewall_enabled() {
            return Err(SkipReason::FirewallDisabled);
        }
        if !config.iptables_enabled() {
            return Err(SkipReason::IptablesDisabled);
        }
        if !config.firewall.iptables.has_rules() {
            return Err(SkipReason::NoRules);
        }
        Ok(())
    }

    pub fn decide(&self, current: Option<&str>, desired: &str) -> GateDecision {
        if current == Some(desired) {
            return GateDecision::Unchanged;
        }

        let diff = render_diff(current.unwrap_or(""), desired);
        if self.forced {
            GateDecision::Install { diff }
        } else {
            GateDecision::WouldChange { diff }
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::FirewallDisabled => write!(f, "firewall is disabled"),
            SkipReason::IptablesDisabled => write!(f, "iptables is disabled"),
            SkipReason::NoRules => write!(f, "no accept, drop or append rules configured"),
        }
    }
}

/// Line diff of the installed ruleset against the compiled one
pub fn render_diff(current: &str, desired: &str) -> String {
    let diff = TextDiff::from_lines(current, desired);
    let mut output = String::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => continue,
        };
        output.push(sign);
        output.push_str(change.value());
        if change.missing_newline() {
            output.push('\n');
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> HostConfig {
        HostConfig::from_yaml(yaml).unwrap()
    }

    #[test]
    fn identical_content_is_unchanged_even_when_forced() {
        let gate = SafetyGate::new(true);
        assert_eq!(gate.decide(Some("*filter\nCOMMIT\n"), "*filter\nCOMMIT\n"), GateDecision::Unchanged);
    }

    #[test]
    fn unforced_change_is_only_reported() {
        let gate = SafetyGate::new(false);
        match gate.decide(Some("*filter\nCOMMIT\n"), "*filter\n-A INPUT -j ACCEPT\nCOMMIT\n") {
            GateDecision::WouldChange { diff } => assert_eq!(diff, "+-A INPUT -j ACCEPT\n"),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn forced_change_installs() {
        let gate = SafetyGate::new(true);
        assert!(matches!(
            gate.decide(None, "*filter\nCOMMIT\n"),
            GateDecision::Install { .. }
        ));
    }

    #[test]
    fn missing_installed_file_counts_as_change() {
        let gate = SafetyGate::new(false);
        match gate.decide(None, "*filter\nCOMMIT\n") {
            GateDecision::WouldChange { diff } => assert_eq!(diff, "+*filter\n+COMMIT\n"),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn force_is_per_family() {
        let cfg = config("force: [ip6tables]");
        assert!(!SafetyGate::for_family(&cfg, AddressFamily::Ipv4).is_forced());
        assert!(SafetyGate::for_family(&cfg, AddressFamily::Ipv6).is_forced());
    }

    #[test]
    fn step_requires_both_switches_and_rules() {
        assert_eq!(
            SafetyGate::check_enabled(&config("firewall:\n  iptables:\n    accept: [any, '22']\n")),
            Ok(())
        );
        assert_eq!(
            SafetyGate::check_enabled(&config(
                "firewall:\n  enable: false\n  iptables:\n    accept: [any, '22']\n"
            )),
            Err(SkipReason::FirewallDisabled)
        );
        assert_eq!(
            SafetyGate::check_enabled(&config(
                "firewall:\n  iptables:\n    enable: false\n    accept: [any, '22']\n"
            )),
            Err(SkipReason::IptablesDisabled)
        );
        assert_eq!(
            SafetyGate::check_enabled(&config("firewall:\n  iptables:\n    nat_append: ['-A X']\n")),
            Err(SkipReason::NoRules)
        );
    }

    #[test]
    fn diff_marks_removed_lines() {
        assert_eq!(render_diff("a\nb\n", "a\nc\n"), "-b\n+c\n");
    }
}
