//! ocigen - generator for OCI runtime container configurations
//!
//! This library builds and edits the `config.json` document a container
//! runtime reads at launch: process, mounts, namespaces, capabilities,
//! resource limits and the syscall filter.
//!
//! # Modules
//!
//! - `spec` - Serializable configuration document model
//! - `generate` - The [`Generator`] facade: every mutation goes through it
//! - `security` - Capability registry and seccomp rule engine
//! - `error` - Error type shared by all operations
//! - `logging` - Subscriber setup for binaries
//!
//! # Quick Start
//!
//! ```ignore
//! use ocigen::{ExportOptions, Generator, SyscallOpts};
//!
//! // Start from the default document and harden it
//! let mut g = Generator::new();
//! g.drop_process_capability("net_raw")?;
//! g.set_default_seccomp_action("errno")?;
//! g.set_syscall_action(&SyscallOpts::new("allow", "read"))?;
//!
//! g.save_to_file("config.json", ExportOptions::default())?;
//! ```

pub mod error;
pub mod generate;
pub mod logging;
pub mod security;
pub mod spec;

// Re-export commonly used types at crate root for convenience
pub use error::{GeneratorError, Result};
pub use generate::{ExportOptions, Generator};
pub use security::{CapabilityRegistry, FixedCapabilities, HostCapabilities, SeccompError, SyscallOpts};
pub use spec::Spec;
