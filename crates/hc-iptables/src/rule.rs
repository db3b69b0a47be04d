use crate::table::{Chain, Table};
use hc_core::AddressFamily;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Accept,
    Drop,
    Return,
    Reject { with: Option<String> },
    Log { prefix: String },
    Jump(String),
}

/// A single `-A` line, kept structured until the file is rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub chain: String,
    pub interface: Option<String>,
    pub source: Option<String>,
    pub protocol: Option<String>,
    /// Match tokens emitted after the protocol, e.g. `--dport 22`
    pub matches: Vec<String>,
    /// Annotation-only rules have no target
    pub target: Option<Target>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Line {
    Table { name: String },
    Chain(Chain),
    Rule(Rule),
    /// `#` line generated from a list entry or passed through from one
    Comment { text: String },
    /// Operator-supplied line appended verbatim
    Raw { text: String },
    Commit,
}

/// Ordered lines produced by one assembly phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    lines: Vec<Line>,
}

/// Complete ruleset for one address family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFile {
    pub family: AddressFamily,
    pub lines: Vec<Line>,
    /// Group names that resolved to nothing; their entries were left out
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
}

impl Rule {
    pub fn new(chain: &str) -> Self {
        Self {
            chain: chain.to_string(),
            interface: None,
            source: None,
            protocol: None,
            matches: vec![],
            target: None,
            comment: None,
        }
    }

    pub fn interface(mut self, iface: &str) -> Self {
        self.interface = Some(iface.to_string());
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn protocol(mut self, protocol: &str) -> Self {
        self.protocol = Some(protocol.to_string());
        self
    }

    pub fn matching<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.matches.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn jump(self, chain: &str) -> Self {
        self.target(Target::Jump(chain.to_string()))
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn with_comment(mut self, comment: Option<&str>) -> Self {
        self.comment = comment.map(str::to_string);
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Accept => write!(f, "-j ACCEPT"),
            Target::Drop => write!(f, "-j DROP"),
            Target::Return => write!(f, "-j RETURN"),
            Target::Reject { with: None } => write!(f, "-j REJECT"),
            Target::Reject { with: Some(code) } => write!(f, "-j REJECT --reject-with {}", code),
            Target::Log { prefix } => write!(
                f,
                "-j LOG --log-prefix \"{}\" --log-tcp-sequence --log-ip-options",
                prefix
            ),
            Target::Jump(chain) => write!(f, "-j {}", chain),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-A {}", self.chain)?;
        if let Some(iface) = &self.interface {
            write!(f, " -i {}", iface)?;
        }
        if let Some(source) = &self.source {
            write!(f, " -s {}", source)?;
        }
        if let Some(protocol) = &self.protocol {
            write!(f, " -p {}", protocol)?;
        }
        for token in &self.matches {
            write!(f, " {}", token)?;
        }
        if let Some(target) = &self.target {
            write!(f, " {}", target)?;
        }
        if let Some(comment) = &self.comment {
            // iptables-restore has no escape for embedded double quotes
            write!(f, " -m comment --comment \"{}\"", comment.replace('"', "'"))?;
        }
        Ok(())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Table { name } => write!(f, "*{}", name),
            Line::Chain(chain) => write!(f, "{}", chain),
            Line::Rule(rule) => write!(f, "{}", rule),
            Line::Comment { text } | Line::Raw { text } => write!(f, "{}", text),
            Line::Commit => write!(f, "COMMIT"),
        }
    }
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table header followed by its chain declarations
    pub fn table(table: &Table) -> Self {
        let mut section = Self::new();
        section.lines.push(Line::Table {
            name: table.name.clone(),
        });
        section
            .lines
            .extend(table.chains.iter().cloned().map(Line::Chain));
        section
    }

    pub fn rule(&mut self, rule: Rule) -> &mut Self {
        self.lines.push(Line::Rule(rule));
        self
    }

    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(Line::Comment { text: text.into() });
        self
    }

    pub fn raw(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(Line::Raw { text: text.into() });
        self
    }

    pub fn commit(&mut self) -> &mut Self {
        self.lines.push(Line::Commit);
        self
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.lines.iter().filter_map(|line| match line {
            Line::Rule(rule) => Some(rule),
            _ => None,
        })
    }
}

impl RuleFile {
    pub fn new(family: AddressFamily) -> Self {
        Self {
            family,
            lines: vec![],
            unresolved: vec![],
        }
    }

    pub fn append(&mut self, section: Section) {
        self.lines.extend(section.lines);
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.lines.iter().filter_map(|line| match line {
            Line::Rule(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn chain_rules<'a>(&'a self, chain: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules().filter(move |rule| rule.chain == chain)
    }

    /// Text accepted by iptables-restore / ip6tables-restore
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RuleFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
