use crate::config::AddressFamily;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Distribution families the firewall step knows how to install rulesets on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Debian,
    RedHat,
}

/// Where a compiled ruleset is written and how the kernel is told to pick it up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallTarget {
    pub path: PathBuf,
    pub reload: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub family: Option<PlatformFamily>,
}

impl PlatformFamily {
    /// Package providing persistent rule loading on boot
    pub fn firewall_package(&self) -> &'static str {
        match self {
            PlatformFamily::Debian => "iptables-persistent",
            PlatformFamily::RedHat => "iptables-services",
        }
    }

    pub fn install_target(&self, family: AddressFamily) -> InstallTarget {
        match (self, family) {
            (PlatformFamily::Debian, AddressFamily::Ipv4) => {
                InstallTarget::new("/etc/iptables/rules.v4", &["iptables-restore", "/etc/iptables/rules.v4"])
            }
            (PlatformFamily::Debian, AddressFamily::Ipv6) => {
                InstallTarget::new("/etc/iptables/rules.v6", &["ip6tables-restore", "/etc/iptables/rules.v6"])
            }
            (PlatformFamily::RedHat, AddressFamily::Ipv4) => {
                InstallTarget::new("/etc/sysconfig/iptables", &["systemctl", "restart", "iptables"])
            }
            (PlatformFamily::RedHat, AddressFamily::Ipv6) => {
                InstallTarget::new("/etc/sysconfig/ip6tables", &["systemctl", "restart", "ip6tables"])
            }
        }
    }

    fn from_os_ids(ids: &[&str]) -> Option<Self> {
        ids.iter().find_map(|id| match *id {
            "debian" | "ubuntu" | "raspbian" | "linuxmint" | "devuan" => Some(PlatformFamily::Debian),
            "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "ol" => Some(PlatformFamily::RedHat),
            _ => None,
        })
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformFamily::Debian => write!(f, "debian"),
            PlatformFamily::RedHat => write!(f, "redhat"),
        }
    }
}

impl InstallTarget {
    pub fn new(path: impl Into<PathBuf>, reload: &[&str]) -> Self {
        Self {
            path: path.into(),
            reload: reload.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parse a whitespace-separated reload command as given on the command line
    pub fn with_command_line(path: impl Into<PathBuf>, command: &str) -> Self {
        Self {
            path: path.into(),
            reload: command.split_whitespace().map(str::to_string).collect(),
        }
    }
}

impl fmt::Display for InstallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (reload: {})", self.path.display(), self.reload.join(" "))
    }
}

impl Platform {
    /// Identify the running distribution from `/etc/os-release`
    pub fn detect() -> Self {
        Self::detect_from(Path::new("/etc/os-release"))
    }

    pub fn detect_from(os_release: &Path) -> Self {
        let platform = match std::fs::read_to_string(os_release) {
            Ok(content) => Self::from_os_release(&content),
            Err(_) => Self::from_marker_files(),
        };

        if platform.family.is_none() {
            warn!(
                id = %platform.id,
                "unsupported platform: rulesets will be compiled but not installed"
            );
        }

        platform
    }

    /// Parse the `ID` and `ID_LIKE` keys of an os-release document
    pub fn from_os_release(content: &str) -> Self {
        let mut id = String::from("unknown");
        let mut id_like = String::new();

        for line in content.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').to_ascii_lowercase();
                match key.trim() {
                    "ID" => id = value,
                    "ID_LIKE" => id_like = value,
                    _ => {}
                }
            }
        }

        let mut ids = vec![id.as_str()];
        ids.extend(id_like.split_whitespace());
        let family = PlatformFamily::from_os_ids(&ids);

        Self { id, family }
    }

    fn from_marker_files() -> Self {
        if Path::new("/etc/debian_version").exists() {
            Self {
                id: "debian".into(),
                family: Some(PlatformFamily::Debian),
            }
        } else if Path::new("/etc/redhat-release").exists() {
            Self {
                id: "rhel".into(),
                family: Some(PlatformFamily::RedHat),
            }
        } else {
            Self {
                id: "unknown".into(),
                family: None,
            }
        }
    }

    pub fn install_target(&self, family: AddressFamily) -> Option<InstallTarget> {
        self.family.map(|f| f.install_target(family))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ubuntu_is_debian_family() {
        let platform = Platform::from_os_release("NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\n");
        assert_eq!(platform.id, "ubuntu");
        assert_eq!(platform.family, Some(PlatformFamily::Debian));
    }

    #[test]
    fn derivative_resolves_through_id_like() {
        let platform = Platform::from_os_release("ID=\"someel\"\nID_LIKE=\"rhel centos fedora\"\n");
        assert_eq!(platform.family, Some(PlatformFamily::RedHat));
    }

    #[test]
    fn unknown_distribution_has_no_family() {
        let platform = Platform::from_os_release("ID=alpine\n");
        assert!(platform.family.is_none());
        assert!(platform.install_target(AddressFamily::Ipv4).is_none());
    }

    #[test]
    fn targets_differ_per_address_family() {
        let v4 = PlatformFamily::RedHat.install_target(AddressFamily::Ipv4);
        let v6 = PlatformFamily::RedHat.install_target(AddressFamily::Ipv6);
        assert_eq!(v4.path, PathBuf::from("/etc/sysconfig/iptables"));
        assert_eq!(v6.reload, vec!["systemctl", "restart", "ip6tables"]);
    }

    #[test]
    fn command_line_override_splits_on_whitespace() {
        let target = InstallTarget::with_command_line("/tmp/rules", "iptables-restore  /tmp/rules");
        assert_eq!(target.reload, vec!["iptables-restore", "/tmp/rules"]);
    }
}
