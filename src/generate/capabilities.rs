//! Process capability set and privileged mode

use super::Generator;
use crate::error::Result;
use crate::security::capabilities::{check_capability, normalize, privileged_set};

impl Generator {
    pub fn clear_process_capabilities(&mut self) {
        self.spec.process.capabilities.clear();
    }

    /// Grant a capability
    ///
    /// `token` may be given with or without the `CAP_` prefix, in any case.
    /// Adding a capability that is already present does nothing.
    ///
    /// # Errors
    /// * `Validation` - not a known capability
    /// * `HostUnsupportedCapability` - host-specific mode is on and the
    ///   running kernel does not know this capability
    pub fn add_process_capability(&mut self, token: &str) -> Result<()> {
        let cap = normalize(token);
        check_capability(self.registry.as_ref(), &cap, self.host_specific)?;

        let capabilities = &mut self.spec.process.capabilities;
        if !capabilities.iter().any(|c| c.eq_ignore_ascii_case(&cap)) {
            capabilities.push(cap);
        }
        Ok(())
    }

    /// Revoke a capability. The token is validated like
    /// [`add_process_capability`](Self::add_process_capability); revoking a
    /// capability that is not granted does nothing.
    pub fn drop_process_capability(&mut self, token: &str) -> Result<()> {
        let cap = normalize(token);
        check_capability(self.registry.as_ref(), &cap, self.host_specific)?;

        let capabilities = &mut self.spec.process.capabilities;
        if let Some(i) = capabilities.iter().position(|c| c.eq_ignore_ascii_case(&cap)) {
            capabilities.remove(i);
        }
        Ok(())
    }

    /// Lift all confinement layers at once
    ///
    /// Grants every capability the registry knows (bounded by the host when
    /// host-specific mode is on), clears the SELinux label and AppArmor
    /// profile, and removes the syscall filter. `false` does nothing; it
    /// does not restore anything.
    pub fn setup_privileged(&mut self, enabled: bool) {
        if !enabled {
            return;
        }

        let capabilities = privileged_set(self.registry.as_ref(), self.host_specific);
        tracing::debug!(
            count = capabilities.len(),
            host_specific = self.host_specific,
            "configuring privileged process"
        );

        let process = &mut self.spec.process;
        process.capabilities = capabilities;
        process.selinux_label.clear();
        process.apparmor_profile.clear();

        if let Some(linux) = self.spec.linux.as_mut() {
            linux.seccomp = None;
        }
    }
}
