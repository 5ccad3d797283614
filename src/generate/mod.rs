//! Configuration generator
//!
//! [`Generator`] wraps a single [`Spec`] and is the only thing that mutates
//! it. Callers create one (default, from a template, or around their own
//! document), apply a sequence of edits, then [`save`](Generator::save).
//!
//! # Lazy Branches
//!
//! ```text
//! Spec
//! ├── process, root, mounts, hooks ...       always present
//! └── linux: Option<Linux>                   allocated on first write
//!     ├── resources: Option<LinuxResources>  allocated on first write
//!     │   ├── cpu / memory / pids / network  allocated on first write
//!     └── seccomp: Option<LinuxSeccomp>      allocated on first write
//! ```
//!
//! Every setter that targets a lazy branch allocates the missing ancestors
//! first. Read accessors and clear/remove operations never allocate.
//! Untouched branches are pruned right before serialization.
//!
//! # Example
//!
//! ```ignore
//! use ocigen::{ExportOptions, Generator};
//!
//! let mut g = Generator::new();
//! g.add_process_capability("net_admin")?;
//! g.add_or_replace_linux_namespace("network", "/var/run/netns/blue")?;
//! g.add_bind_mount("/data", "/mnt/data", vec![]);
//! g.save(std::io::stdout(), ExportOptions::default())?;
//! ```

mod capabilities;
mod linux;
mod mounts;
mod seccomp;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::{GeneratorError, Result};
use crate::security::{CapabilityRegistry, HostCapabilities};
use crate::spec::{
    Hook, Linux, LinuxCpu, LinuxDeviceCgroup, LinuxMemory, LinuxNamespace, LinuxNetwork,
    LinuxPids, LinuxResources, LinuxSeccomp, Mount, NamespaceType, Platform, Process, Rlimit,
    Root, Spec, User, OCI_VERSION,
};

const DEFAULT_PATH_ENV: &str = "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Capabilities granted by the default document
const DEFAULT_CAPABILITIES: &[&str] = &[
    "CAP_CHOWN",
    "CAP_DAC_OVERRIDE",
    "CAP_FSETID",
    "CAP_FOWNER",
    "CAP_MKNOD",
    "CAP_NET_RAW",
    "CAP_SETGID",
    "CAP_SETUID",
    "CAP_SETFCAP",
    "CAP_SETPCAP",
    "CAP_NET_BIND_SERVICE",
    "CAP_SYS_CHROOT",
    "CAP_KILL",
    "CAP_AUDIT_WRITE",
];

/// Toggles for [`Generator::save`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Write only the `linux.seccomp` subtree (`null` when absent)
    pub seccomp_only: bool,
}

/// Mutation and validation facade over a configuration document
pub struct Generator {
    spec: Spec,
    /// Reject capabilities the running kernel does not support
    host_specific: bool,
    registry: Box<dyn CapabilityRegistry>,
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("spec", &self.spec)
            .field("host_specific", &self.host_specific)
            .finish_non_exhaustive()
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator {
    // ═══════════════════════════════════════════════════════════════════════
    // Construction
    // ═══════════════════════════════════════════════════════════════════════

    /// Generator holding the default document
    ///
    /// The default runs `sh` as root in `/` with a conservative capability
    /// set, the standard `/proc` `/dev` `/sys` mounts, a deny-all device
    /// rule and fresh pid/network/ipc/uts/mount namespaces. It carries no
    /// syscall filter.
    pub fn new() -> Self {
        Self::from_spec(default_spec())
    }

    /// Wrap a caller-supplied document
    pub fn from_spec(spec: Spec) -> Self {
        Self {
            spec,
            host_specific: false,
            registry: Box::new(HostCapabilities::new()),
        }
    }

    /// Decode a template document from any reader
    ///
    /// # Errors
    /// * `Decode` - the stream is not a valid document
    /// * `Io` - reading the stream failed
    pub fn from_template<R: Read>(reader: R) -> Result<Self> {
        let spec: Spec = serde_json::from_reader(reader).map_err(GeneratorError::from_decode)?;
        tracing::debug!(version = %spec.version, "loaded template configuration");
        Ok(Self::from_spec(spec))
    }

    /// Load a template document from a file
    ///
    /// # Errors
    /// * `NotFound` - `path` does not exist
    /// * `Io` - any other failure opening or reading the file
    /// * `Decode` - the file is not a valid document
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GeneratorError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                GeneratorError::Io(e)
            }
        })?;
        tracing::debug!(path = %path.display(), "reading template configuration");
        Self::from_template(BufReader::new(file))
    }

    /// Swap the capability registry used for validation
    pub fn with_capability_registry(mut self, registry: impl CapabilityRegistry + 'static) -> Self {
        self.registry = Box::new(registry);
        self
    }

    pub fn set_host_specific(&mut self, host_specific: bool) {
        self.host_specific = host_specific;
    }

    pub fn is_host_specific(&self) -> bool {
        self.host_specific
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Document access
    // ═══════════════════════════════════════════════════════════════════════

    /// The current document. Never allocates lazy branches.
    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    pub fn set_spec(&mut self, spec: Spec) {
        self.spec = spec;
    }

    pub fn into_spec(self) -> Spec {
        self.spec
    }

    fn linux_mut(&mut self) -> &mut Linux {
        self.spec.linux.get_or_insert_with(Linux::default)
    }

    fn resources_mut(&mut self) -> &mut LinuxResources {
        self.linux_mut()
            .resources
            .get_or_insert_with(LinuxResources::default)
    }

    fn cpu_mut(&mut self) -> &mut LinuxCpu {
        self.resources_mut().cpu.get_or_insert_with(LinuxCpu::default)
    }

    fn memory_mut(&mut self) -> &mut LinuxMemory {
        self.resources_mut()
            .memory
            .get_or_insert_with(LinuxMemory::default)
    }

    fn network_mut(&mut self) -> &mut LinuxNetwork {
        self.resources_mut()
            .network
            .get_or_insert_with(LinuxNetwork::default)
    }

    fn pids_mut(&mut self) -> &mut LinuxPids {
        self.resources_mut().pids.get_or_insert_with(LinuxPids::default)
    }

    fn seccomp_mut(&mut self) -> &mut LinuxSeccomp {
        self.linux_mut()
            .seccomp
            .get_or_insert_with(LinuxSeccomp::default)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Serialization
    // ═══════════════════════════════════════════════════════════════════════

    /// Drop every lazy branch that still equals its freshly allocated value
    ///
    /// Runs bottom-up so that a `linux` holding only empty categories is
    /// itself removed. Called by [`save`](Self::save).
    pub fn prune(&mut self) {
        if let Some(linux) = self.spec.linux.as_mut() {
            if let Some(resources) = linux.resources.as_mut() {
                prune_default(&mut resources.cpu);
                prune_default(&mut resources.memory);
                prune_default(&mut resources.network);
            }
            prune_default(&mut linux.resources);
            prune_default(&mut linux.seccomp);
        }
        if prune_default(&mut self.spec.linux) {
            tracing::debug!("pruned empty linux section");
        }
    }

    /// Write the document as tab-indented JSON
    ///
    /// Prunes untouched branches first, so the document is modified.
    /// A failed write is not retried.
    pub fn save<W: Write>(&mut self, writer: W, opts: ExportOptions) -> Result<()> {
        self.prune();

        let mut ser = serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"\t"));
        let encoded = if opts.seccomp_only {
            self.spec
                .linux
                .as_ref()
                .and_then(|linux| linux.seccomp.as_ref())
                .serialize(&mut ser)
        } else {
            self.spec.serialize(&mut ser)
        };
        encoded.map_err(GeneratorError::from_encode)?;

        tracing::debug!(seccomp_only = opts.seccomp_only, "configuration written");
        Ok(())
    }

    /// Write the document to `path`, creating or truncating it
    pub fn save_to_file(&mut self, path: impl AsRef<Path>, opts: ExportOptions) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.save(&mut writer, opts)?;
        writer.flush()?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Top-level fields
    // ═══════════════════════════════════════════════════════════════════════

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.spec.version = version.into();
    }

    pub fn set_root_path(&mut self, path: impl Into<String>) {
        self.spec.root.path = path.into();
    }

    pub fn set_root_readonly(&mut self, readonly: bool) {
        self.spec.root.readonly = readonly;
    }

    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.spec.hostname = hostname.into();
    }

    pub fn set_platform_os(&mut self, os: impl Into<String>) {
        self.spec.platform.os = os.into();
    }

    pub fn set_platform_arch(&mut self, arch: impl Into<String>) {
        self.spec.platform.arch = arch.into();
    }

    pub fn clear_annotations(&mut self) {
        self.spec.annotations.clear();
    }

    /// Insert or overwrite an annotation
    pub fn add_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.spec.annotations.insert(key.into(), value.into());
    }

    pub fn remove_annotation(&mut self, key: &str) {
        self.spec.annotations.remove(key);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Process
    // ═══════════════════════════════════════════════════════════════════════

    pub fn set_process_uid(&mut self, uid: u32) {
        self.spec.process.user.uid = uid;
    }

    pub fn set_process_gid(&mut self, gid: u32) {
        self.spec.process.user.gid = gid;
    }

    pub fn set_process_cwd(&mut self, cwd: impl Into<String>) {
        self.spec.process.cwd = cwd.into();
    }

    pub fn set_process_no_new_privileges(&mut self, enabled: bool) {
        self.spec.process.no_new_privileges = enabled;
    }

    pub fn set_process_terminal(&mut self, enabled: bool) {
        self.spec.process.terminal = enabled;
    }

    pub fn set_process_apparmor_profile(&mut self, profile: impl Into<String>) {
        self.spec.process.apparmor_profile = profile.into();
    }

    pub fn set_process_selinux_label(&mut self, label: impl Into<String>) {
        self.spec.process.selinux_label = label.into();
    }

    pub fn set_process_args(&mut self, args: Vec<String>) {
        self.spec.process.args = args;
    }

    pub fn clear_process_env(&mut self) {
        self.spec.process.env.clear();
    }

    /// Set `name=value`, replacing an existing entry for `name` in place
    pub fn add_process_env(&mut self, name: &str, value: &str) {
        let entry = format!("{}={}", name, value);
        let prefix = format!("{}=", name);
        let env = &mut self.spec.process.env;
        match env.iter().position(|e| e.starts_with(&prefix)) {
            Some(i) => env[i] = entry,
            None => env.push(entry),
        }
    }

    /// Set an rlimit, overwriting hard/soft of an existing entry of the same type
    pub fn add_process_rlimit(&mut self, kind: &str, hard: u64, soft: u64) {
        let rlimits = &mut self.spec.process.rlimits;
        match rlimits.iter().position(|r| r.kind == kind) {
            Some(i) => {
                rlimits[i].hard = hard;
                rlimits[i].soft = soft;
            }
            None => rlimits.push(Rlimit {
                kind: kind.to_string(),
                hard,
                soft,
            }),
        }
    }

    /// Remove the rlimit of type `kind`; absent is not an error
    pub fn remove_process_rlimit(&mut self, kind: &str) {
        let rlimits = &mut self.spec.process.rlimits;
        if let Some(i) = rlimits.iter().position(|r| r.kind == kind) {
            rlimits.remove(i);
        }
    }

    pub fn clear_process_rlimits(&mut self) {
        self.spec.process.rlimits.clear();
    }

    pub fn clear_process_additional_gids(&mut self) {
        self.spec.process.user.additional_gids.clear();
    }

    /// Add a supplementary group; duplicates are ignored
    pub fn add_process_additional_gid(&mut self, gid: u32) {
        let gids = &mut self.spec.process.user.additional_gids;
        if !gids.contains(&gid) {
            gids.push(gid);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Hooks
    // ═══════════════════════════════════════════════════════════════════════

    pub fn clear_prestart_hooks(&mut self) {
        self.spec.hooks.prestart.clear();
    }

    pub fn add_prestart_hook(&mut self, path: impl Into<String>, args: Vec<String>) {
        self.spec.hooks.prestart.push(hook(path, args));
    }

    pub fn clear_poststart_hooks(&mut self) {
        self.spec.hooks.poststart.clear();
    }

    pub fn add_poststart_hook(&mut self, path: impl Into<String>, args: Vec<String>) {
        self.spec.hooks.poststart.push(hook(path, args));
    }

    pub fn clear_poststop_hooks(&mut self) {
        self.spec.hooks.poststop.clear();
    }

    pub fn add_poststop_hook(&mut self, path: impl Into<String>, args: Vec<String>) {
        self.spec.hooks.poststop.push(hook(path, args));
    }
}

fn hook(path: impl Into<String>, args: Vec<String>) -> Hook {
    Hook {
        path: path.into(),
        args,
        ..Default::default()
    }
}

/// Clear `slot` if it holds the type's default value. Returns whether it did.
fn prune_default<T: Default + PartialEq>(slot: &mut Option<T>) -> bool {
    if slot.as_ref().is_some_and(|value| *value == T::default()) {
        *slot = None;
        true
    } else {
        false
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_spec() -> Spec {
    Spec {
        version: OCI_VERSION.to_string(),
        platform: Platform::host(),
        root: Root {
            path: String::new(),
            readonly: false,
        },
        hostname: "mrsdalloway".to_string(),
        mounts: vec![
            Mount::new("/proc", "proc", "proc", vec![]),
            Mount::new(
                "/dev",
                "tmpfs",
                "tmpfs",
                strings(&["nosuid", "strictatime", "mode=755", "size=65536k"]),
            ),
            Mount::new(
                "/dev/pts",
                "devpts",
                "devpts",
                strings(&["nosuid", "noexec", "newinstance", "ptmxmode=0666", "mode=0620", "gid=5"]),
            ),
            Mount::new(
                "/dev/shm",
                "tmpfs",
                "shm",
                strings(&["nosuid", "noexec", "nodev", "mode=1777", "size=65536k"]),
            ),
            Mount::new("/dev/mqueue", "mqueue", "mqueue", strings(&["nosuid", "noexec", "nodev"])),
            Mount::new("/sys", "sysfs", "sysfs", strings(&["nosuid", "noexec", "nodev", "ro"])),
        ],
        process: Process {
            terminal: false,
            user: User::default(),
            args: strings(&["sh"]),
            env: strings(&[DEFAULT_PATH_ENV, "TERM=xterm"]),
            cwd: "/".to_string(),
            capabilities: strings(DEFAULT_CAPABILITIES),
            rlimits: vec![Rlimit {
                kind: "RLIMIT_NOFILE".to_string(),
                hard: 1024,
                soft: 1024,
            }],
            ..Default::default()
        },
        linux: Some(Linux {
            resources: Some(LinuxResources {
                devices: vec![LinuxDeviceCgroup {
                    allow: false,
                    access: "rwm".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            namespaces: [
                NamespaceType::Pid,
                NamespaceType::Network,
                NamespaceType::Ipc,
                NamespaceType::Uts,
                NamespaceType::Mount,
            ]
            .into_iter()
            .map(LinuxNamespace::new)
            .collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Generator {
        Generator::from_spec(Spec::default())
    }

    fn saved_json(g: &mut Generator) -> serde_json::Value {
        let mut buf = Vec::new();
        g.save(&mut buf, ExportOptions::default()).unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    #[test]
    fn test_default_document() {
        let g = Generator::new();
        let spec = g.spec();

        assert_eq!(spec.version, OCI_VERSION);
        assert_eq!(spec.process.args, vec!["sh"]);
        assert_eq!(spec.process.cwd, "/");
        assert_eq!(spec.process.capabilities.len(), DEFAULT_CAPABILITIES.len());
        assert_eq!(spec.process.rlimits[0].kind, "RLIMIT_NOFILE");
        assert_eq!(spec.mounts.len(), 6);

        let linux = spec.linux.as_ref().unwrap();
        assert_eq!(linux.namespaces.len(), 5);
        assert!(linux.seccomp.is_none());
        assert!(!g.is_host_specific());
    }

    #[test]
    fn test_spec_accessor_does_not_allocate() {
        let g = empty();
        let _ = g.spec();
        assert!(g.spec().linux.is_none());
    }

    #[test]
    fn test_env_upsert() {
        let mut g = empty();
        g.add_process_env("FOO", "1");
        g.add_process_env("BAR", "2");
        g.add_process_env("FOO", "3");

        assert_eq!(g.spec().process.env, vec!["FOO=3", "BAR=2"]);

        // A prefix of another name is a different variable
        g.add_process_env("FO", "x");
        assert_eq!(g.spec().process.env.len(), 3);
    }

    #[test]
    fn test_rlimit_upsert_and_remove() {
        let mut g = empty();
        g.add_process_rlimit("RLIMIT_NOFILE", 1024, 512);
        g.add_process_rlimit("RLIMIT_NPROC", 10, 10);
        g.add_process_rlimit("RLIMIT_NOFILE", 4096, 2048);

        let rlimits = &g.spec().process.rlimits;
        assert_eq!(rlimits.len(), 2);
        assert_eq!(rlimits[0].kind, "RLIMIT_NOFILE");
        assert_eq!((rlimits[0].hard, rlimits[0].soft), (4096, 2048));

        g.remove_process_rlimit("RLIMIT_CORE");
        assert_eq!(g.spec().process.rlimits.len(), 2);

        g.remove_process_rlimit("RLIMIT_NOFILE");
        assert_eq!(g.spec().process.rlimits[0].kind, "RLIMIT_NPROC");

        g.clear_process_rlimits();
        assert!(g.spec().process.rlimits.is_empty());
    }

    #[test]
    fn test_additional_gids_unique() {
        let mut g = empty();
        g.add_process_additional_gid(10);
        g.add_process_additional_gid(20);
        g.add_process_additional_gid(10);
        assert_eq!(g.spec().process.user.additional_gids, vec![10, 20]);

        g.clear_process_additional_gids();
        assert!(g.spec().process.user.additional_gids.is_empty());
    }

    #[test]
    fn test_annotations() {
        let mut g = empty();
        g.add_annotation("org.example.key", "a");
        g.add_annotation("org.example.key", "b");
        g.add_annotation("org.example.other", "c");
        assert_eq!(g.spec().annotations.len(), 2);
        assert_eq!(g.spec().annotations["org.example.key"], "b");

        g.remove_annotation("missing");
        g.remove_annotation("org.example.other");
        assert_eq!(g.spec().annotations.len(), 1);

        g.clear_annotations();
        assert!(saved_json(&mut g).get("annotations").is_none());
    }

    #[test]
    fn test_hooks_keep_order() {
        let mut g = empty();
        g.add_prestart_hook("/bin/first", vec![]);
        g.add_prestart_hook("/bin/second", vec!["--flag".to_string()]);
        g.add_poststop_hook("/bin/cleanup", vec![]);

        let hooks = &g.spec().hooks;
        assert_eq!(hooks.prestart[0].path, "/bin/first");
        assert_eq!(hooks.prestart[1].args, vec!["--flag"]);
        assert_eq!(hooks.poststop.len(), 1);

        g.clear_prestart_hooks();
        g.clear_poststop_hooks();
        assert!(g.spec().hooks.is_empty());
    }

    #[test]
    fn test_prune_removes_untouched_linux() {
        let mut g = empty();
        g.spec.linux = Some(Linux::default());

        let json = saved_json(&mut g);
        assert!(json.get("linux").is_none());
        assert!(g.spec().linux.is_none());
    }

    #[test]
    fn test_prune_is_bottom_up() {
        let mut g = empty();
        g.cpu_mut();
        g.memory_mut();
        g.seccomp_mut();

        g.prune();
        assert!(g.spec().linux.is_none());
    }

    #[test]
    fn test_prune_keeps_touched_fields() {
        let mut g = empty();
        g.set_linux_resources_cpu_shares(512);
        g.memory_mut();

        g.prune();
        let resources = g.spec().linux.as_ref().unwrap().resources.as_ref().unwrap();
        assert_eq!(resources.cpu.as_ref().unwrap().shares, Some(512));
        assert!(resources.memory.is_none());
    }

    #[test]
    fn test_save_uses_tab_indent() {
        let mut g = empty();
        let mut buf = Vec::new();
        g.save(&mut buf, ExportOptions::default()).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("{\n\t\"ociVersion\""));
    }

    #[test]
    fn test_save_seccomp_only_without_filter() {
        let mut g = empty();
        let mut buf = Vec::new();
        g.save(&mut buf, ExportOptions { seccomp_only: true }).unwrap();
        assert_eq!(buf, b"null");
    }
}
