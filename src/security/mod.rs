//! Security-related validation for generated configurations
//!
//! - Capability registry (which `CAP_*` names exist, which the host supports)
//! - Seccomp rule engine (edits the syscall-filter subtree)
//!
//! # Confinement Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Layer 1: CAPABILITIES          process.capabilities            │
//! │  Layer 2: LSM LABELS            process.selinuxLabel            │
//! │                                 process.apparmorProfile         │
//! │  Layer 3: SECCOMP               linux.seccomp                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Privileged mode (`Generator::setup_privileged(true)`) lifts all three
//! layers in one call.

pub mod capabilities;
pub mod seccomp;

pub use capabilities::{CapabilityRegistry, FixedCapabilities, HostCapabilities};
pub use seccomp::{SeccompError, SyscallOpts};
