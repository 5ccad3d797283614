//! Linux-specific section of the configuration document
//!
//! Everything here hangs off [`Spec::linux`](super::Spec::linux), which stays
//! `None` until a Linux field is first written.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GeneratorError;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Linux {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<LinuxResources>,
    #[serde(default, rename = "cgroupsPath", skip_serializing_if = "String::is_empty")]
    pub cgroups_path: String,
    #[serde(default, rename = "mountLabel", skip_serializing_if = "String::is_empty")]
    pub mount_label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sysctl: BTreeMap<String, String>,
    #[serde(default, rename = "uidMappings", skip_serializing_if = "Vec::is_empty")]
    pub uid_mappings: Vec<LinuxIdMapping>,
    #[serde(default, rename = "gidMappings", skip_serializing_if = "Vec::is_empty")]
    pub gid_mappings: Vec<LinuxIdMapping>,
    /// At most one entry per [`NamespaceType`]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<LinuxNamespace>,
    #[serde(
        default,
        rename = "rootfsPropagation",
        skip_serializing_if = "Option::is_none"
    )]
    pub rootfs_propagation: Option<RootfsPropagation>,
    #[serde(default, rename = "maskedPaths", skip_serializing_if = "Vec::is_empty")]
    pub masked_paths: Vec<String>,
    #[serde(default, rename = "readonlyPaths", skip_serializing_if = "Vec::is_empty")]
    pub readonly_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seccomp: Option<LinuxSeccomp>,
    /// Device nodes created in the container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<LinuxDevice>,
    /// Keys this model does not know (e.g. `intelRdt`), carried through
    /// from a template unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A device node to create in the container
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxDevice {
    pub path: String,
    /// `c`, `b`, `u` or `p`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub major: i64,
    #[serde(default)]
    pub minor: i64,
    #[serde(default, rename = "fileMode", skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Resources (cgroup controllers)
// ─────────────────────────────────────────────────────────────────────────────

/// cgroup resource limits
///
/// Each category is allocated on first write. Each scalar inside a
/// category is independently nullable, so only fields that were set
/// appear in the output.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<LinuxDeviceCgroup>,
    #[serde(
        default,
        rename = "disableOOMKiller",
        skip_serializing_if = "Option::is_none"
    )]
    pub disable_oom_killer: Option<bool>,
    #[serde(default, rename = "oomScoreAdj", skip_serializing_if = "Option::is_none")]
    pub oom_score_adj: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<LinuxMemory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<LinuxCpu>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pids: Option<LinuxPids>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<LinuxNetwork>,
}

/// Device cgroup access rule
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxDeviceCgroup {
    #[serde(default)]
    pub allow: bool,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access: String,
}

/// Memory controller
///
/// All values are in bytes except `swappiness` (0-100).
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxMemory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<i64>,
    #[serde(default, rename = "kernelTCP", skip_serializing_if = "Option::is_none")]
    pub kernel_tcp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swappiness: Option<u64>,
}

/// CPU controller
///
/// # CPU Quota Explained
///
/// `quota` is the number of microseconds the cgroup may run per `period`:
/// - quota 100000, period 100000 = 1 core
/// - quota 50000,  period 100000 = half a core
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxCpu {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u64>,
    #[serde(
        default,
        rename = "realtimeRuntime",
        skip_serializing_if = "Option::is_none"
    )]
    pub realtime_runtime: Option<i64>,
    #[serde(
        default,
        rename = "realtimePeriod",
        skip_serializing_if = "Option::is_none"
    )]
    pub realtime_period: Option<u64>,
    /// cpuset, e.g. `0-3,7`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cpus: String,
    /// memory nodes, e.g. `0-1`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mems: String,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxPids {
    #[serde(default)]
    pub limit: i64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxNetwork {
    #[serde(default, rename = "classID", skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
    /// One entry per interface name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priorities: Vec<LinuxInterfacePriority>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxInterfacePriority {
    pub name: String,
    #[serde(default)]
    pub priority: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// User namespace ID mappings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxIdMapping {
    #[serde(default, rename = "hostID")]
    pub host_id: u32,
    #[serde(default, rename = "containerID")]
    pub container_id: u32,
    #[serde(default)]
    pub size: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Namespaces
// ─────────────────────────────────────────────────────────────────────────────

/// Kernel resource class isolated by a namespace
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceType {
    Network,
    Pid,
    Mount,
    Ipc,
    Uts,
    User,
    Cgroup,
}

impl NamespaceType {
    pub const ALL: [NamespaceType; 7] = [
        NamespaceType::Network,
        NamespaceType::Pid,
        NamespaceType::Mount,
        NamespaceType::Ipc,
        NamespaceType::Uts,
        NamespaceType::User,
        NamespaceType::Cgroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceType::Network => "network",
            NamespaceType::Pid => "pid",
            NamespaceType::Mount => "mount",
            NamespaceType::Ipc => "ipc",
            NamespaceType::Uts => "uts",
            NamespaceType::User => "user",
            NamespaceType::Cgroup => "cgroup",
        }
    }
}

impl fmt::Display for NamespaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamespaceType {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NamespaceType::ALL
            .iter()
            .copied()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| {
                GeneratorError::Validation(format!(
                    "unknown namespace '{}', expected one of network|pid|mount|ipc|uts|user|cgroup",
                    s
                ))
            })
    }
}

/// A namespace to create or join
///
/// An empty `path` means a new namespace. A non-empty path joins the
/// namespace at that path (e.g. `/proc/1234/ns/net`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LinuxNamespace {
    #[serde(rename = "type")]
    pub kind: NamespaceType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl LinuxNamespace {
    pub fn new(kind: NamespaceType) -> Self {
        Self {
            kind,
            path: String::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mount propagation
// ─────────────────────────────────────────────────────────────────────────────

/// Propagation mode applied to the container's root mount
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RootfsPropagation {
    Private,
    Rprivate,
    Slave,
    Rslave,
    Shared,
    Rshared,
}

impl RootfsPropagation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootfsPropagation::Private => "private",
            RootfsPropagation::Rprivate => "rprivate",
            RootfsPropagation::Slave => "slave",
            RootfsPropagation::Rslave => "rslave",
            RootfsPropagation::Shared => "shared",
            RootfsPropagation::Rshared => "rshared",
        }
    }
}

impl fmt::Display for RootfsPropagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RootfsPropagation {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(RootfsPropagation::Private),
            "rprivate" => Ok(RootfsPropagation::Rprivate),
            "slave" => Ok(RootfsPropagation::Slave),
            "rslave" => Ok(RootfsPropagation::Rslave),
            "shared" => Ok(RootfsPropagation::Shared),
            "rshared" => Ok(RootfsPropagation::Rshared),
            _ => Err(GeneratorError::Validation(
                "rootfs-propagation must be empty or one of private|rprivate|slave|rslave|shared|rshared"
                    .to_string(),
            )),
        }
    }
}

/// How `/sys/fs/cgroup` is exposed to the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupMountMode {
    ReadOnly,
    ReadWrite,
    /// No cgroup mount at all
    Disabled,
}

impl CgroupMountMode {
    /// Mount option for this mode, `None` when disabled
    pub fn mount_option(&self) -> Option<&'static str> {
        match self {
            CgroupMountMode::ReadOnly => Some("ro"),
            CgroupMountMode::ReadWrite => Some("rw"),
            CgroupMountMode::Disabled => None,
        }
    }
}

impl FromStr for CgroupMountMode {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ro" => Ok(CgroupMountMode::ReadOnly),
            "rw" => Ok(CgroupMountMode::ReadWrite),
            "no" => Ok(CgroupMountMode::Disabled),
            _ => Err(GeneratorError::Validation(format!(
                "cgroup mount mode '{}' should be one of (ro,rw,no)",
                s
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Seccomp
// ─────────────────────────────────────────────────────────────────────────────

/// Syscall filter
///
/// Values use libseccomp spellings (`SCMP_ACT_ERRNO`, `SCMP_ARCH_X86_64`,
/// `SCMP_CMP_EQ`). Use [`crate::security::seccomp`] to edit it; that module
/// owns validation of every token stored here.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxSeccomp {
    #[serde(default, rename = "defaultAction", skip_serializing_if = "String::is_empty")]
    pub default_action: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub syscalls: Vec<LinuxSyscall>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxSyscall {
    pub name: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<LinuxSeccompArg>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LinuxSeccompArg {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub value: u64,
    #[serde(default, rename = "valueTwo")]
    pub value_two: u64,
    #[serde(default)]
    pub op: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_parse_all_kinds() {
        for kind in NamespaceType::ALL {
            let parsed: NamespaceType = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_namespace_parse_rejects_unknown() {
        let err = "net".parse::<NamespaceType>().unwrap_err();
        assert!(matches!(err, GeneratorError::Validation(_)));
        // Tokens are case-sensitive
        assert!("PID".parse::<NamespaceType>().is_err());
    }

    #[test]
    fn test_namespace_serialization() {
        let ns = LinuxNamespace {
            kind: NamespaceType::Network,
            path: "/proc/1/ns/net".to_string(),
        };
        let json = serde_json::to_value(&ns).unwrap();
        assert_eq!(json["type"], "network");
        assert_eq!(json["path"], "/proc/1/ns/net");

        let fresh = serde_json::to_value(LinuxNamespace::new(NamespaceType::Uts)).unwrap();
        assert!(fresh.get("path").is_none());
    }

    #[test]
    fn test_propagation_parse() {
        assert_eq!(
            "rslave".parse::<RootfsPropagation>().unwrap(),
            RootfsPropagation::Rslave
        );
        assert!("bogus".parse::<RootfsPropagation>().is_err());
        assert_eq!(
            serde_json::to_value(RootfsPropagation::Rshared).unwrap(),
            "rshared"
        );
    }

    #[test]
    fn test_cgroup_mount_mode() {
        assert_eq!("ro".parse::<CgroupMountMode>().unwrap().mount_option(), Some("ro"));
        assert_eq!("rw".parse::<CgroupMountMode>().unwrap().mount_option(), Some("rw"));
        assert_eq!("no".parse::<CgroupMountMode>().unwrap().mount_option(), None);
        assert!("bogus".parse::<CgroupMountMode>().is_err());
    }

    #[test]
    fn test_default_linux_serializes_empty() {
        let json = serde_json::to_string(&Linux::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_device_nodes_decode() {
        let raw = r#"{
            "devices": [{"path": "/dev/fuse", "type": "c", "major": 10, "minor": 229, "fileMode": 438}],
            "intelRdt": {"l3CacheSchema": "L3:0=ffff"}
        }"#;
        let linux: Linux = serde_json::from_str(raw).unwrap();

        assert_eq!(linux.devices.len(), 1);
        assert_eq!(linux.devices[0].kind, "c");
        assert_eq!(linux.devices[0].file_mode, Some(438));
        assert!(linux.devices[0].uid.is_none());
        assert_ne!(linux, Linux::default());

        let json = serde_json::to_value(&linux).unwrap();
        assert_eq!(json["devices"][0]["minor"], 229);
        assert_eq!(json["intelRdt"]["l3CacheSchema"], "L3:0=ffff");
        assert!(json["devices"][0].get("gid").is_none());
    }

    #[test]
    fn test_resource_field_names() {
        let resources = LinuxResources {
            disable_oom_killer: Some(true),
            oom_score_adj: Some(-500),
            memory: Some(LinuxMemory {
                kernel_tcp: Some(1024),
                ..Default::default()
            }),
            network: Some(LinuxNetwork {
                class_id: Some(7),
                priorities: vec![],
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&resources).unwrap();

        assert_eq!(json["disableOOMKiller"], true);
        assert_eq!(json["oomScoreAdj"], -500);
        assert_eq!(json["memory"]["kernelTCP"], 1024);
        assert_eq!(json["network"]["classID"], 7);
        assert!(json["memory"].get("limit").is_none());
    }
}
