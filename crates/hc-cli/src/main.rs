use clap::{Parser, Subcommand, ValueEnum};
use hc_core::{AddressFamily, ConfigLoader, ConfigResolver, HostConfig, InstallTarget, Platform};
use hc_iptables::{IptablesStep, RulesetCompiler, StepContext};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hostcfg")]
#[command(version, about = "Host configuration agent", long_about = None)]
struct Cli {
    /// Configuration fragment, may be given more than once
    #[arg(short, long, global = true)]
    config: Vec<PathBuf>,
    /// Directory of configuration fragments merged in name order
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Firewall rulesets
    Iptables {
        #[command(subcommand)]
        action: IptablesAction,
    },
    /// Show the detected platform and ruleset install locations
    Platform,
    /// Print the merged configuration
    Config,
}

#[derive(Subcommand)]
enum IptablesAction {
    /// Compile and print the ruleset for one address family
    Compile {
        #[arg(long, value_enum, default_value = "ipv4")]
        family: FamilyArg,
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Compile both families and install the ones that are forced
    Apply {
        /// Force installation for an address family (dangerous)
        #[arg(long = "force", value_enum)]
        force: Vec<FamilyArg>,
        #[arg(long)]
        target_v4: Option<PathBuf>,
        #[arg(long)]
        reload_v4: Option<String>,
        #[arg(long)]
        target_v6: Option<PathBuf>,
        #[arg(long)]
        reload_v6: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FamilyArg {
    Ipv4,
    Ipv6,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<FamilyArg> for AddressFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Ipv4 => AddressFamily::Ipv4,
            FamilyArg::Ipv6 => AddressFamily::Ipv6,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Iptables { action } => {
            let config = load_config(&cli.config, cli.config_dir.as_ref())?;
            handle_iptables_action(action, config)?;
        }
        Commands::Platform => show_platform(),
        Commands::Config => {
            let config = load_config(&cli.config, cli.config_dir.as_ref())?;
            print!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

fn load_config(files: &[PathBuf], dir: Option<&PathBuf>) -> anyhow::Result<HostConfig> {
    let loader = ConfigLoader::new();

    let mut config = match dir {
        Some(dir) => loader.load_dir(dir)?,
        None => HostConfig::default(),
    };

    if files.is_empty() && dir.is_none() {
        config.merge(loader.load_file(std::path::Path::new("hostcfg.yaml"))?);
    } else {
        config.merge(loader.load_files(files)?);
    }

    debug!(networks = config.networks.len(), forced = ?config.force, "configuration loaded");
    Ok(config)
}

fn handle_iptables_action(action: IptablesAction, mut config: HostConfig) -> anyhow::Result<()> {
    let resolver = ConfigResolver::from_config(&config);

    match action {
        IptablesAction::Compile { family, format } => {
            let compiler = RulesetCompiler::from_config(&config, &resolver);
            let file = compiler.compile(family.into())?;
            match format {
                Format::Text => print!("{}", file.render()),
                Format::Json => println!("{}", file.to_json()?),
            }
        }
        IptablesAction::Apply {
            force,
            target_v4,
            reload_v4,
            target_v6,
            reload_v6,
        } => {
            for family in force {
                let capability = AddressFamily::from(family).capability().to_string();
                if !config.force.contains(&capability) {
                    config.force.push(capability);
                }
            }

            let platform = Platform::detect();
            let mut targets = HashMap::new();
            for (family, path, reload) in [
                (AddressFamily::Ipv4, target_v4, reload_v4),
                (AddressFamily::Ipv6, target_v6, reload_v6),
            ] {
                if let Some(target) = install_target(&platform, family, path, reload)? {
                    targets.insert(family, target);
                }
            }

            if let Some(platform_family) = platform.family {
                println!(
                    "Platform: {} ({}), rules loaded on boot by {}",
                    platform.id,
                    platform_family,
                    platform_family.firewall_package()
                );
            }

            let step = IptablesStep::new(StepContext {
                config: &config,
                resolver: &resolver,
                targets,
            });

            let runtime = tokio::runtime::Runtime::new()?;
            let reports = runtime.block_on(step.run())?;
            for report in &reports {
                report.display();
            }
        }
    }

    Ok(())
}

/// Platform default, overridden piecewise by command-line flags
fn install_target(
    platform: &Platform,
    family: AddressFamily,
    path: Option<PathBuf>,
    reload: Option<String>,
) -> anyhow::Result<Option<InstallTarget>> {
    let detected = platform.install_target(family);

    let target = match (path, reload, detected) {
        (None, None, detected) => detected,
        (Some(path), Some(reload), _) => Some(InstallTarget::with_command_line(path, &reload)),
        (Some(path), None, _) => {
            let restore = match family {
                AddressFamily::Ipv4 => "iptables-restore",
                AddressFamily::Ipv6 => "ip6tables-restore",
            };
            let reload = vec![restore.to_string(), path.display().to_string()];
            Some(InstallTarget { path, reload })
        }
        (None, Some(reload), Some(detected)) => Some(InstallTarget::with_command_line(detected.path, &reload)),
        (None, Some(_), None) => {
            anyhow::bail!("--reload-{} needs a target path on an unsupported platform", family_suffix(family))
        }
    };

    Ok(target)
}

fn family_suffix(family: AddressFamily) -> &'static str {
    match family {
        AddressFamily::Ipv4 => "v4",
        AddressFamily::Ipv6 => "v6",
    }
}

fn show_platform() {
    let platform = Platform::detect();

    match platform.family {
        Some(family) => {
            println!("Platform: {} ({})", platform.id, family);
            println!("Package: {}", family.firewall_package());
            for address_family in AddressFamily::ALL {
                println!("  {}: {}", address_family, family.install_target(address_family));
            }
        }
        None => {
            println!("Platform: {} (unsupported)", platform.id);
            println!("Rulesets can be compiled but will not be installed without --target-v4/--target-v6");
        }
    }
}
