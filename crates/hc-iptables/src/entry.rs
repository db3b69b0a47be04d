use crate::error::FirewallError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Trailing `# comment` on a port spec
static PORT_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<port>[^#]*?)\s*#\s*(?P<comment>.*?)\s*$").unwrap());

pub const ANY: &str = "any";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Accept,
    Drop,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Accept => "ACCEPT",
            Action::Drop => "DROP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Any,
    /// Literal address, network, hostname or symbolic group name
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Port {
    Any,
    /// Port number, range or service name as written
    Service(String),
}

/// One parsed `(source, port)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleIntent {
    pub source: Source,
    pub port: Port,
    /// Protocol named by a `:tcp`/`:udp` suffix, if any
    pub protocol: Option<Protocol>,
    pub comment: Option<String>,
    /// Port spec with the comment removed, for annotations
    pub port_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleListEntry {
    /// `#`-prefixed source line, passed through verbatim
    Comment(String),
    Rule(RuleIntent),
}

impl RuleIntent {
    /// Protocol the rule matches on, `tcp` unless a suffix said otherwise
    pub fn effective_protocol(&self) -> Protocol {
        self.protocol.unwrap_or(Protocol::Tcp)
    }

    pub fn source_label(&self) -> &str {
        match &self.source {
            Source::Any => ANY,
            Source::Named(name) => name,
        }
    }
}

impl fmt::Display for RuleIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.port_label, self.source_label())
    }
}

/// Parse a flat `source, port, source, port, ...` list.
///
/// A source starting with `#` is a comment line and does not consume a port
/// slot: the value after it is the next source.
pub fn parse_rule_list(list: &str, values: &[String]) -> Result<Vec<RuleListEntry>, FirewallError> {
    let mut entries = Vec::new();
    let mut index = 0;

    while index < values.len() {
        let source = values[index].trim();

        if source.starts_with('#') {
            entries.push(RuleListEntry::Comment(source.to_string()));
            index += 1;
            continue;
        }

        if source.is_empty() {
            return Err(FirewallError::EmptySource {
                list: list.to_string(),
                index,
            });
        }

        let spec = values.get(index + 1).ok_or_else(|| FirewallError::MissingPort {
            list: list.to_string(),
            index,
            name: source.to_string(),
        })?;

        entries.push(RuleListEntry::Rule(parse_pair(list, index, source, spec)?));
        index += 2;
    }

    Ok(entries)
}

fn parse_pair(list: &str, index: usize, source: &str, spec: &str) -> Result<RuleIntent, FirewallError> {
    let (port_part, comment) = split_comment(spec);
    let (token, protocol) = split_protocol(port_part);

    if token.is_empty() {
        return Err(FirewallError::EmptyPort {
            list: list.to_string(),
            index,
            spec: spec.to_string(),
        });
    }

    let port = if token == ANY {
        Port::Any
    } else {
        Port::Service(token.to_string())
    };

    let source = if source == ANY {
        Source::Any
    } else {
        Source::Named(source.to_string())
    };

    if source == Source::Any && port == Port::Any {
        return Err(FirewallError::MatchesEverything {
            list: list.to_string(),
            index,
        });
    }

    Ok(RuleIntent {
        source,
        port,
        protocol,
        comment,
        port_label: port_part.to_string(),
    })
}

fn split_comment(spec: &str) -> (&str, Option<String>) {
    match PORT_COMMENT.captures(spec) {
        Some(caps) => {
            let port = caps.name("port").map_or("", |m| m.as_str()).trim();
            let comment = caps
                .name("comment")
                .map(|m| m.as_str().trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            (port, comment)
        }
        None => (spec.trim(), None),
    }
}

fn split_protocol(port: &str) -> (&str, Option<Protocol>) {
    if let Some(stripped) = port.strip_suffix(":udp") {
        (stripped.trim(), Some(Protocol::Udp))
    } else if let Some(stripped) = port.strip_suffix(":tcp") {
        (stripped.trim(), Some(Protocol::Tcp))
    } else {
        (port, None)
    }
}
