pub mod assembler;
pub mod compiler;
pub mod entry;
pub mod error;
pub mod family;
pub mod gate;
pub mod install;
pub mod rule;
pub mod step;
pub mod table;

pub use compiler::RulesetCompiler;
pub use entry::{Action, Port, Protocol, RuleIntent, RuleListEntry, Source, parse_rule_list};
pub use error::FirewallError;
pub use family::{AddressClass, FamilyProfile, classify};
pub use gate::{GateDecision, SafetyGate, SkipReason};
pub use install::RulesetInstaller;
pub use rule::{Line, Rule, RuleFile, Section, Target};
pub use step::{FamilyReport, IptablesStep, Outcome, StepContext};
pub use table::{Chain, Table};
