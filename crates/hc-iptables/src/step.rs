use crate::compiler::RulesetCompiler;
use crate::gate::{GateDecision, SafetyGate, SkipReason};
use crate::install::RulesetInstaller;
use anyhow::Result;
use hc_core::{AddressFamily, HostConfig, InstallTarget, NetworkResolver};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Everything the iptables step reads, passed in instead of looked up globally
pub struct StepContext<'a> {
    pub config: &'a HostConfig,
    pub resolver: &'a dyn NetworkResolver,
    /// Install location per family; a missing entry means the platform is unsupported
    pub targets: HashMap<AddressFamily, InstallTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    Unchanged,
    /// Not forced: nothing written, `diff` is what would have changed
    WouldChange { diff: String },
    Installed { diff: String },
    /// Compiled, but there is nowhere known to install it on this platform
    NoInstallTarget { diff: String },
}

#[derive(Debug, Clone)]
pub struct FamilyReport {
    pub family: AddressFamily,
    pub target: Option<InstallTarget>,
    pub outcome: Outcome,
}

/// The iptables/ip6tables configuration step
pub struct IptablesStep<'a> {
    ctx: StepContext<'a>,
    installer: RulesetInstaller,
}

impl<'a> IptablesStep<'a> {
    pub fn new(ctx: StepContext<'a>) -> Self {
        Self {
            ctx,
            installer: RulesetInstaller::new(),
        }
    }

    /// Compile both families, then gate and install each independently.
    ///
    /// A compile error in either family aborts before anything is written.
    pub async fn run(&self) -> Result<Vec<FamilyReport>> {
        if let Err(reason) = SafetyGate::check_enabled(self.ctx.config) {
            info!(%reason, "skipping iptables step");
            return Ok(AddressFamily::ALL
                .iter()
                .map(|family| FamilyReport {
                    family: *family,
                    target: self.ctx.targets.get(family).cloned(),
                    outcome: Outcome::Skipped(reason.clone()),
                })
                .collect());
        }

        let compiler = RulesetCompiler::from_config(self.ctx.config, self.ctx.resolver);
        let mut compiled = Vec::new();
        for family in AddressFamily::ALL {
            compiled.push((family, compiler.compile(family)?.render()));
        }

        let mut reports = Vec::new();
        for (family, ruleset) in compiled {
            reports.push(self.apply(family, &ruleset).await?);
        }
        Ok(reports)
    }

    async fn apply(&self, family: AddressFamily, ruleset: &str) -> Result<FamilyReport> {
        let gate = SafetyGate::for_family(self.ctx.config, family);

        let Some(target) = self.ctx.targets.get(&family) else {
            warn!(%family, "no install target for this platform, ruleset not installed");
            return Ok(FamilyReport {
                family,
                target: None,
                outcome: Outcome::NoInstallTarget {
                    diff: crate::gate::render_diff("", ruleset),
                },
            });
        };

        let current = self.installer.read_installed(&target.path).await?;
        let outcome = match gate.decide(current.as_deref(), ruleset) {
            GateDecision::Unchanged => Outcome::Unchanged,
            GateDecision::WouldChange { diff } => {
                warn!(
                    %family,
                    capability = family.capability(),
                    "ruleset changed but not forced, leaving {} untouched",
                    target.path.display()
                );
                Outcome::WouldChange { diff }
            }
            GateDecision::Install { diff } => {
                self.installer.install(target, ruleset).await?;
                info!(%family, path = %target.path.display(), "installed ruleset");
                Outcome::Installed { diff }
            }
        };

        Ok(FamilyReport {
            family,
            target: Some(target.clone()),
            outcome,
        })
    }
}

impl FamilyReport {
    /// Operator-facing summary; never silent about a change that was held back
    pub fn display(&self) {
        println!("{}", self);
        match &self.outcome {
            Outcome::WouldChange { diff } | Outcome::Installed { diff } | Outcome::NoInstallTarget { diff } => {
                for line in diff.lines() {
                    println!("    {}", line);
                }
            }
            Outcome::Skipped(_) | Outcome::Unchanged => {}
        }
    }
}

impl fmt::Display for FamilyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let capability = self.family.capability();
        match &self.outcome {
            Outcome::Skipped(reason) => write!(f, "{}: skipped ({})", capability, reason),
            Outcome::Unchanged => write!(f, "{}: no change", capability),
            Outcome::WouldChange { .. } => write!(
                f,
                "{}: [DRY RUN] would update {}; force '{}' to install",
                capability,
                self.target
                    .as_ref()
                    .map(|t| t.path.display().to_string())
                    .unwrap_or_default(),
                capability
            ),
            Outcome::Installed { .. } => match &self.target {
                Some(target) => write!(f, "{}: installed {}", capability, target),
                None => write!(f, "{}: installed", capability),
            },
            Outcome::NoInstallTarget { .. } => write!(
                f,
                "{}: platform unsupported, compiled ruleset not installed",
                capability
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hc_core::ConfigResolver;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hc-step-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn targets(dir: &std::path::Path) -> HashMap<AddressFamily, InstallTarget> {
        let mut targets = HashMap::new();
        targets.insert(AddressFamily::Ipv4, InstallTarget::new(dir.join("rules.v4"), &["true"]));
        targets.insert(AddressFamily::Ipv6, InstallTarget::new(dir.join("rules.v6"), &["true"]));
        targets
    }

    const CONFIG: &str = r#"
networks:
  home: ["10.0.0.5"]
firewall:
  iptables:
    accept: ["home", "22 # ssh", "any", "80"]
    drop: ["192.168.1.10", "53:udp"]
"#;

    async fn run(config: &HostConfig, dir: &std::path::Path) -> Vec<FamilyReport> {
        let resolver = ConfigResolver::from_config(config);
        let step = IptablesStep::new(StepContext {
            config,
            resolver: &resolver,
            targets: targets(dir),
        });
        step.run().await.unwrap()
    }

    #[tokio::test]
    async fn unforced_run_writes_nothing() {
        let dir = scratch_dir("unforced");
        let config = HostConfig::from_yaml(CONFIG).unwrap();

        let reports = run(&config, &dir).await;

        assert_eq!(reports.len(), 2);
        for report in &reports {
            match &report.outcome {
                Outcome::WouldChange { diff } => assert!(diff.contains("+*filter")),
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert!(!dir.join("rules.v4").exists());
    }

    #[tokio::test]
    async fn forced_family_installs_once_then_reports_no_change() {
        let dir = scratch_dir("forced");
        let mut config = HostConfig::from_yaml(CONFIG).unwrap();
        config.force.push("iptables".into());

        let first = run(&config, &dir).await;
        assert!(matches!(first[0].outcome, Outcome::Installed { .. }));
        assert!(matches!(first[1].outcome, Outcome::WouldChange { .. }));

        let installed = std::fs::read_to_string(dir.join("rules.v4")).unwrap();
        assert!(installed.contains("-A inputdrop -s 192.168.1.10 -p udp --dport 53 -j DROP"));
        assert!(!dir.join("rules.v6").exists());

        let second = run(&config, &dir).await;
        assert_eq!(second[0].outcome, Outcome::Unchanged);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn disabled_firewall_skips_both_families() {
        let dir = scratch_dir("disabled");
        let mut config = HostConfig::from_yaml(CONFIG).unwrap();
        config.firewall.enable = Some(false);

        let reports = run(&config, &dir).await;
        assert!(
            reports
                .iter()
                .all(|r| r.outcome == Outcome::Skipped(SkipReason::FirewallDisabled))
        );
    }

    #[tokio::test]
    async fn invalid_list_aborts_before_any_install() {
        let dir = scratch_dir("invalid");
        let mut config = HostConfig::from_yaml(CONFIG).unwrap();
        config.force = vec!["iptables".into(), "ip6tables".into()];
        config.firewall.iptables.accept.extend(["any".to_string(), "any".to_string()]);

        let resolver = ConfigResolver::from_config(&config);
        let step = IptablesStep::new(StepContext {
            config: &config,
            resolver: &resolver,
            targets: targets(&dir),
        });

        assert!(step.run().await.is_err());
        assert!(!dir.join("rules.v4").exists());
        assert!(!dir.join("rules.v6").exists());
    }

    #[tokio::test]
    async fn unsupported_platform_still_compiles() {
        let config = HostConfig::from_yaml(CONFIG).unwrap();
        let resolver = ConfigResolver::from_config(&config);
        let step = IptablesStep::new(StepContext {
            config: &config,
            resolver: &resolver,
            targets: HashMap::new(),
        });

        let reports = step.run().await.unwrap();
        match &reports[0].outcome {
            Outcome::NoInstallTarget { diff } => assert!(diff.contains("+COMMIT")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(reports[0].to_string().contains("platform unsupported"));
    }

    #[test]
    fn dry_run_summary_names_the_force_switch() {
        let report = FamilyReport {
            family: AddressFamily::Ipv6,
            target: Some(InstallTarget::new("/etc/iptables/rules.v6", &["ip6tables-restore"])),
            outcome: Outcome::WouldChange { diff: "+x\n".into() },
        };
        assert_eq!(
            report.to_string(),
            "ip6tables: [DRY RUN] would update /etc/iptables/rules.v6; force 'ip6tables' to install"
        );
    }
}
