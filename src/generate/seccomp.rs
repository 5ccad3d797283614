//! Syscall filter editing
//!
//! Each method makes sure `linux.seccomp` exists, then hands off to
//! [`crate::security::seccomp`], which owns all validation.

use super::Generator;
use crate::error::Result;
use crate::security::seccomp::{self, SyscallOpts};

impl Generator {
    /// Add or update a syscall rule
    pub fn set_syscall_action(&mut self, opts: &SyscallOpts) -> Result<()> {
        seccomp::parse_syscall_flag(opts, self.seccomp_mut())?;
        Ok(())
    }

    /// Set the default action and drop rules that now duplicate it
    pub fn set_default_seccomp_action(&mut self, action: &str) -> Result<()> {
        seccomp::parse_default_action(action, self.seccomp_mut())?;
        Ok(())
    }

    /// Set the default action, keeping every existing rule
    pub fn set_default_seccomp_action_force(&mut self, action: &str) -> Result<()> {
        seccomp::parse_default_action_force(action, self.seccomp_mut())?;
        Ok(())
    }

    pub fn set_seccomp_architecture(&mut self, arch: &str) -> Result<()> {
        seccomp::parse_architecture_flag(arch, self.seccomp_mut())?;
        Ok(())
    }

    /// Remove all rules for the comma-separated syscall names
    pub fn remove_seccomp_rule(&mut self, syscalls: &str) -> Result<()> {
        seccomp::remove_action(syscalls, self.seccomp_mut())?;
        Ok(())
    }

    pub fn remove_all_seccomp_rules(&mut self) -> Result<()> {
        seccomp::remove_all_rules(self.seccomp_mut())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::GeneratorError;
    use crate::security::SeccompError;
    use crate::spec::{LinuxSeccomp, Spec};
    use crate::{ExportOptions, Generator, SyscallOpts};

    fn empty() -> Generator {
        Generator::from_spec(Spec::default())
    }

    fn filter(g: &Generator) -> &LinuxSeccomp {
        g.spec().linux.as_ref().unwrap().seccomp.as_ref().unwrap()
    }

    #[test]
    fn test_rules_allocate_filter() {
        let mut g = empty();
        g.set_default_seccomp_action("errno").unwrap();
        g.set_syscall_action(&SyscallOpts::new("allow", "read")).unwrap();
        g.set_seccomp_architecture("amd64").unwrap();
        g.set_seccomp_architecture("amd64").unwrap();

        let f = filter(&g);
        assert_eq!(f.default_action, "SCMP_ACT_ERRNO");
        assert_eq!(f.architectures, vec!["SCMP_ARCH_X86_64"]);
        assert_eq!(f.syscalls.len(), 1);
        assert_eq!(f.syscalls[0].action, "SCMP_ACT_ALLOW");
    }

    #[test]
    fn test_engine_errors_are_wrapped() {
        let mut g = empty();
        let err = g.set_seccomp_architecture("vax").unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::Seccomp(SeccompError::UnknownArchitecture(_))
        ));

        let partial = SyscallOpts {
            index: "0".to_string(),
            ..SyscallOpts::new("allow", "kill")
        };
        let err = g.set_syscall_action(&partial).unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::Seccomp(SeccompError::IncompleteArguments)
        ));
    }

    #[test]
    fn test_default_action_cleanup() {
        let mut g = empty();
        g.set_default_seccomp_action("allow").unwrap();
        g.set_syscall_action(&SyscallOpts::new("errno", "mount")).unwrap();
        g.set_syscall_action(&SyscallOpts::new("kill", "reboot")).unwrap();

        g.set_default_seccomp_action_force("errno").unwrap();
        assert_eq!(filter(&g).syscalls.len(), 2);

        g.set_default_seccomp_action("errno").unwrap();
        assert_eq!(filter(&g).syscalls.len(), 1);
        assert_eq!(filter(&g).syscalls[0].name, "reboot");
    }

    #[test]
    fn test_remove_rules() {
        let mut g = empty();
        g.set_default_seccomp_action("errno").unwrap();
        for name in ["read", "write", "close"] {
            g.set_syscall_action(&SyscallOpts::new("allow", name)).unwrap();
        }

        g.remove_seccomp_rule("read,close").unwrap();
        assert_eq!(filter(&g).syscalls.len(), 1);

        g.remove_all_seccomp_rules().unwrap();
        assert!(filter(&g).syscalls.is_empty());
        assert_eq!(filter(&g).default_action, "SCMP_ACT_ERRNO");
    }

    #[test]
    fn test_seccomp_only_export() {
        let mut g = Generator::new();
        g.set_default_seccomp_action("errno").unwrap();
        g.set_syscall_action(&SyscallOpts::new("allow", "read")).unwrap();

        let mut buf = Vec::new();
        g.save(&mut buf, ExportOptions { seccomp_only: true }).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(json["defaultAction"], "SCMP_ACT_ERRNO");
        assert_eq!(json["syscalls"][0]["name"], "read");
        assert!(json.get("ociVersion").is_none());
    }
}
