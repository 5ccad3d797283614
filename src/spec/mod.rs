//! OCI runtime configuration document
//!
//! These structs mirror the `config.json` schema consumed by OCI runtimes.
//! Field order follows declaration order, which is also the order written
//! out by [`Generator::save`](crate::Generator::save).
//!
//! Optional branches are plain `Option` fields. Empty collections and unset
//! scalars are skipped on output, so a freshly allocated branch is
//! indistinguishable from an absent one once it is pruned.

pub mod linux;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use linux::{
    CgroupMountMode, Linux, LinuxCpu, LinuxDevice, LinuxDeviceCgroup, LinuxIdMapping,
    LinuxInterfacePriority, LinuxMemory, LinuxNamespace, LinuxNetwork, LinuxPids, LinuxResources,
    LinuxSeccomp, LinuxSeccompArg, LinuxSyscall, NamespaceType, RootfsPropagation,
};

/// Version of the runtime specification this crate emits by default
pub const OCI_VERSION: &str = "1.0.0-rc2";

fn is_false(b: &bool) -> bool {
    !*b
}

/// Root of the configuration document
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Spec {
    #[serde(default, rename = "ociVersion")]
    pub version: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub root: Root,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,
    #[serde(default)]
    pub process: Process,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<Linux>,
    #[serde(default, skip_serializing_if = "Hooks::is_empty")]
    pub hooks: Hooks,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Keys this model does not know (e.g. `solaris`, `windows`), carried
    /// through from a template unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Target operating system and CPU architecture
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Platform {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
}

impl Platform {
    /// Platform of the running host, using Go-style architecture names
    /// (`amd64`, `arm64`, ...) as expected by OCI runtimes.
    pub fn host() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: go_arch(std::env::consts::ARCH, cfg!(target_endian = "little")).to_string(),
        }
    }
}

/// Go's `GOARCH` spelling of a Rust target architecture
fn go_arch(arch: &str, little_endian: bool) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" if little_endian => "ppc64le",
        "powerpc64" => "ppc64",
        "powerpc" => "ppc",
        "mips64" if little_endian => "mips64le",
        "mips" if little_endian => "mipsle",
        other => other,
    }
}

/// Container root filesystem
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Root {
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub readonly: bool,
}

/// A single mount entry
///
/// Options are kept in caller order and never deduplicated.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Mount {
    pub destination: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Mount {
    pub fn new(
        destination: impl Into<String>,
        kind: impl Into<String>,
        source: impl Into<String>,
        options: Vec<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            kind: kind.into(),
            source: source.into(),
            options,
        }
    }
}

/// The process launched inside the container
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Process {
    #[serde(default, skip_serializing_if = "is_false")]
    pub terminal: bool,
    #[serde(default)]
    pub user: User,
    #[serde(default)]
    pub args: Vec<String>,
    /// `NAME=value` entries; NAME is unique
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default)]
    pub cwd: String,
    /// Canonical `CAP_X` tokens, unique
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rlimits: Vec<Rlimit>,
    #[serde(default, rename = "noNewPrivileges", skip_serializing_if = "is_false")]
    pub no_new_privileges: bool,
    #[serde(default, rename = "apparmorProfile", skip_serializing_if = "String::is_empty")]
    pub apparmor_profile: String,
    #[serde(default, rename = "selinuxLabel", skip_serializing_if = "String::is_empty")]
    pub selinux_label: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Process identity
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct User {
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default, rename = "additionalGids", skip_serializing_if = "Vec::is_empty")]
    pub additional_gids: Vec<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
}

/// POSIX resource limit, keyed by `kind` (e.g. `RLIMIT_NOFILE`)
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Rlimit {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub hard: u64,
    #[serde(default)]
    pub soft: u64,
}

/// Lifecycle hooks, each run in order
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Hooks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prestart: Vec<Hook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub poststart: Vec<Hook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub poststop: Vec<Hook>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.prestart.is_empty() && self.poststart.is_empty() && self.poststop.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Hook {
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// `NAME=value` entries for the hook's environment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Seconds before the hook is aborted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}
