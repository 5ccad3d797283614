//! Linux capability registry for configuration validation
//!
//! # What are Linux Capabilities?
//!
//! Capabilities split "root powers" into ~40 granular permissions:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  CAP_NET_RAW ────► raw sockets (ping, tcpdump)                 │
//! │  CAP_SYS_ADMIN ──► mount, ptrace, modules, etc.                │
//! │  CAP_SYS_PTRACE ─► trace/debug other processes                 │
//! │  CAP_CHOWN ──────► change file ownership                       │
//! │  ... 35+ more                                                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A container configuration lists the capabilities its process keeps. This
//! module decides which tokens are valid in that list:
//!
//! ```text
//! "chown" ──normalize──► "CAP_CHOWN" ──registry.list()──► known?
//!                                          │
//!                      host-specific mode? ▼
//!                        index <= registry.last_supported_index()?
//! ```
//!
//! Nothing here reads or changes the capabilities of the running process.

use std::fs;
use std::path::PathBuf;

use caps::Capability;

use crate::error::{GeneratorError, Result};

/// Kernel file reporting the highest capability index the host supports
const LAST_CAP_PATH: &str = "/proc/sys/kernel/cap_last_cap";

/// Used when the host cannot report its last capability (e.g. RHEL6
/// kernels without `cap_last_cap`).
const FALLBACK_LAST_CAP: Capability = Capability::CAP_BLOCK_SUSPEND;

// ═══════════════════════════════════════════════════════════════════════════
// CapabilityRegistry
// ═══════════════════════════════════════════════════════════════════════════
// WHAT IT IS:
//   The source of truth for "which capability names exist" and "how many of
//   them does this host's kernel know about".
//
// WHY A TRAIT:
//   Host introspection lives behind this seam so the generator holds no
//   host-specific logic beyond comparing against the reported upper bound.
//   Tests plug in FixedCapabilities to simulate older kernels.
// ═══════════════════════════════════════════════════════════════════════════

pub trait CapabilityRegistry {
    /// Every known capability, ordered by kernel index
    fn list(&self) -> Vec<Capability>;

    /// Highest capability index supported by the host
    fn last_supported_index(&self) -> u8;
}

// ═══════════════════════════════════════════════════════════════════════════
// HostCapabilities
// ═══════════════════════════════════════════════════════════════════════════
// Registry backed by the `caps` crate's capability table and the running
// kernel's /proc/sys/kernel/cap_last_cap.
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct HostCapabilities {
    last_cap_path: PathBuf,
}

impl HostCapabilities {
    pub fn new() -> Self {
        Self {
            last_cap_path: PathBuf::from(LAST_CAP_PATH),
        }
    }

    /// Read the last supported index from a different file (tests, chroots)
    pub fn with_last_cap_path(path: impl Into<PathBuf>) -> Self {
        Self {
            last_cap_path: path.into(),
        }
    }

    fn read_last_cap(&self) -> std::io::Result<u8> {
        let content = fs::read_to_string(&self.last_cap_path)?;
        content
            .trim()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry for HostCapabilities {
    fn list(&self) -> Vec<Capability> {
        let mut all: Vec<Capability> = caps::all().into_iter().collect();
        all.sort_by_key(|cap| cap.index());
        all
    }

    fn last_supported_index(&self) -> u8 {
        match self.read_last_cap() {
            Ok(index) => index,
            Err(e) => {
                let fallback = FALLBACK_LAST_CAP.index();
                tracing::warn!(
                    path = %self.last_cap_path.display(),
                    error = %e,
                    fallback,
                    "cannot read last supported capability, using fallback"
                );
                fallback
            }
        }
    }
}

/// Registry with a caller-chosen capability list and upper bound
#[derive(Debug, Clone)]
pub struct FixedCapabilities {
    caps: Vec<Capability>,
    last_index: u8,
}

impl FixedCapabilities {
    pub fn new(mut caps: Vec<Capability>, last_index: u8) -> Self {
        caps.sort_by_key(|cap| cap.index());
        caps.dedup();
        Self { caps, last_index }
    }

    /// Every capability the `caps` crate knows, bounded by `last_index`
    pub fn all_up_to(last_index: u8) -> Self {
        Self::new(caps::all().into_iter().collect(), last_index)
    }
}

impl CapabilityRegistry for FixedCapabilities {
    fn list(&self) -> Vec<Capability> {
        self.caps.clone()
    }

    fn last_supported_index(&self) -> u8 {
        self.last_index
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Helper Functions
// ═══════════════════════════════════════════════════════════════════════════

/// Canonical form of a capability token: upper-case with a `CAP_` prefix.
///
/// `"chown"`, `"CHOWN"` and `"cap_chown"` all become `"CAP_CHOWN"`.
pub fn normalize(token: &str) -> String {
    let upper = token.trim().to_uppercase();
    if upper.starts_with("CAP_") {
        upper
    } else {
        format!("CAP_{}", upper)
    }
}

/// Validate a normalized token against the registry
///
/// # Errors
/// * `Validation` - the name is not a known capability
/// * `HostUnsupportedCapability` - known, but above the host's last index
///   while `host_specific` is set
pub fn check_capability(
    registry: &dyn CapabilityRegistry,
    token: &str,
    host_specific: bool,
) -> Result<()> {
    let cap = registry
        .list()
        .into_iter()
        .find(|cap| cap.to_string() == token)
        .ok_or_else(|| {
            GeneratorError::Validation(format!("unknown capability '{}'", token))
        })?;

    if host_specific && cap.index() > registry.last_supported_index() {
        return Err(GeneratorError::HostUnsupportedCapability(token.to_string()));
    }

    Ok(())
}

/// Full capability list granted in privileged mode, as `CAP_X` tokens
pub fn privileged_set(registry: &dyn CapabilityRegistry, host_specific: bool) -> Vec<String> {
    let last = registry.last_supported_index();
    registry
        .list()
        .into_iter()
        .filter(|cap| !host_specific || cap.index() <= last)
        .map(|cap| cap.to_string())
        .collect()
}
