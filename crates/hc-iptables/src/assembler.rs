// Filter-table skeleton phases, concatenated in order by the compiler

use crate::entry::Action;
use crate::family::FamilyProfile;
use crate::rule::{Rule, Section, Target};
use crate::table::{ICMP, INPUTDROP, LOGANDDROP, LOGGER, RATELIMIT, Table};

/// Steady-state rate and burst of ICMP traffic allowed through `ratelimit`
pub const RATELIMIT_RATE: &str = "10/second";
pub const RATELIMIT_BURST: &str = "20";

/// Bound on log records written by `loganddrop`
pub const LOG_RATE: &str = "5/minute";
pub const LOG_BURST: &str = "10";

/// ICMP message types tagged in the `icmp` chain, with their annotations
const ICMP_TYPES: [(&str, &str); 4] = [
    ("echo-request", "echo request"),
    ("echo-reply", "echo reply"),
    ("destination-unreachable", "destination unreachable"),
    ("time-exceeded", "time exceeded"),
];

/// A list entry after resolution and family filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedEntry {
    /// `#` source line, passed through as-is
    Comment(String),
    /// Annotation label (`<port> from <source>`) and the rules it produced
    Rules { label: String, rules: Vec<Rule> },
}

pub fn filter_header() -> Section {
    Section::table(&Table::filter())
}

/// Loopback, tunnels, established connections and the ICMP hand-off
pub fn bypass_rules(profile: &FamilyProfile) -> Section {
    let mut section = Section::new();
    section
        .rule(Rule::new("INPUT").interface("lo").target(Target::Accept))
        .rule(Rule::new("INPUT").interface("tun+").target(Target::Accept))
        .rule(
            Rule::new("INPUT")
                .matching(["-m", "state", "--state", "RELATED,ESTABLISHED"])
                .target(Target::Accept),
        )
        .rule(Rule::new("INPUT").protocol(profile.icmp_protocol).jump(ICMP));
    section
}

pub fn icmp_chain(profile: &FamilyProfile) -> Section {
    let mut section = Section::new();
    for (icmp_type, label) in ICMP_TYPES {
        section.rule(
            Rule::new(ICMP)
                .protocol(profile.icmp_protocol)
                .matching([profile.icmp_type_option, icmp_type])
                .comment(label),
        );
    }
    section
        .rule(Rule::new(ICMP).jump(RATELIMIT))
        .rule(Rule::new(ICMP).target(Target::Accept));
    section
}

/// `ratelimit`, `loganddrop` and `logger` chain bodies
pub fn logging_chains(profile: &FamilyProfile) -> Section {
    let mut section = Section::new();
    section
        .rule(
            Rule::new(RATELIMIT)
                .matching(["-m", "limit", "--limit", RATELIMIT_RATE, "--limit-burst", RATELIMIT_BURST])
                .target(Target::Return),
        )
        .rule(Rule::new(RATELIMIT).jump(LOGANDDROP))
        .rule(
            Rule::new(LOGANDDROP)
                .matching(["-m", "limit", "--limit", LOG_RATE, "--limit-burst", LOG_BURST])
                .jump(LOGGER),
        )
        .rule(Rule::new(LOGANDDROP).target(Target::Drop))
        .rule(Rule::new(LOGGER).target(Target::Log {
            prefix: profile.log_prefix.to_string(),
        }))
        .rule(Rule::new(LOGGER).target(Target::Return));
    section
}

pub fn broadcast_drop(profile: &FamilyProfile) -> Section {
    let mut section = Section::new();
    if let Some(tokens) = profile.broadcast_match {
        section.rule(
            Rule::new("INPUT")
                .matching(tokens.iter().copied())
                .target(Target::Drop)
                .comment("drop broadcast"),
        );
    }
    section
}

/// Drop spoofed DHCP server replies unless this host is the DHCP server
pub fn dhcp_guard(dhcp_server: bool) -> Section {
    let mut section = Section::new();
    if !dhcp_server {
        section.rule(
            Rule::new("INPUT")
                .protocol("udp")
                .matching(["--sport", "bootps"])
                .target(Target::Drop)
                .comment("spoofed dhcp server"),
        );
    }
    section
}

/// Entries of one list, each annotated with `# <ACTION> <port> from <source>`
pub fn entry_block(action: Action, entries: &[ResolvedEntry]) -> Section {
    let mut section = Section::new();
    for entry in entries {
        match entry {
            ResolvedEntry::Comment(text) => {
                section.comment(text.clone());
            }
            ResolvedEntry::Rules { label, rules } => {
                if rules.is_empty() {
                    continue;
                }
                section.comment(format!("# {} {}", action.as_str(), label));
                for rule in rules {
                    section.rule(rule.clone());
                }
            }
        }
    }
    section
}

pub fn inputdrop_jump() -> Section {
    let mut section = Section::new();
    section.rule(Rule::new("INPUT").jump(INPUTDROP));
    section
}

pub fn raw_lines(lines: &[String]) -> Section {
    let mut section = Section::new();
    for line in lines {
        section.raw(line.clone());
    }
    section
}

/// Log-and-drop everything left, then rejects that the drop makes unreachable
pub fn catch_all(profile: &FamilyProfile) -> Section {
    let mut section = Section::new();
    section
        .rule(Rule::new("INPUT").jump(LOGANDDROP))
        .rule(Rule::new("INPUT").protocol("tcp").target(Target::Reject {
            with: Some("tcp-reset".to_string()),
        }))
        .rule(Rule::new("INPUT").protocol("udp").target(Target::Reject {
            with: Some(profile.port_unreachable.to_string()),
        }))
        .rule(Rule::new("INPUT").target(Target::Reject { with: None }));
    section
}

/// The host never routes
pub fn forward_drop() -> Section {
    let mut section = Section::new();
    section.rule(Rule::new("FORWARD").target(Target::Drop)).commit();
    section
}

/// Optional table carrying only operator-supplied lines
pub fn passthrough_table(table: &Table, lines: &[String]) -> Section {
    if lines.is_empty() {
        return Section::new();
    }

    let mut section = Section::table(table);
    for line in lines {
        section.raw(line.clone());
    }
    section.commit();
    section
}
