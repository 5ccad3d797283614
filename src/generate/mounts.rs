//! Mount construction helpers

use super::{strings, Generator};
use crate::error::Result;
use crate::spec::{CgroupMountMode, Mount};

impl Generator {
    /// Append a tmpfs mount at `dest` with `options` as given
    pub fn add_tmpfs_mount(&mut self, dest: impl Into<String>, options: Vec<String>) {
        self.spec
            .mounts
            .push(Mount::new(dest, "tmpfs", "tmpfs", options));
    }

    /// Expose the cgroup hierarchy at `/sys/fs/cgroup`
    ///
    /// `mode` is `ro` or `rw`; `no` adds nothing.
    pub fn add_cgroups_mount(&mut self, mode: &str) -> Result<()> {
        let mode: CgroupMountMode = mode.parse()?;
        let Some(option) = mode.mount_option() else {
            return Ok(());
        };

        let mut options = strings(&["nosuid", "noexec", "nodev", "relatime"]);
        options.push(option.to_string());
        self.spec
            .mounts
            .push(Mount::new("/sys/fs/cgroup", "cgroup", "cgroup", options));
        Ok(())
    }

    /// Bind-mount `source` at `dest`
    ///
    /// Empty `options` means `rw`. A `bind` option is added unless the
    /// caller already asked for `bind` or `rbind`.
    pub fn add_bind_mount(
        &mut self,
        source: impl Into<String>,
        dest: impl Into<String>,
        options: Vec<String>,
    ) {
        let mut options = if options.is_empty() {
            vec!["rw".to_string()]
        } else {
            options
        };
        if !options.iter().any(|o| o == "bind" || o == "rbind") {
            options.push("bind".to_string());
        }

        self.spec.mounts.push(Mount::new(dest, "bind", source, options));
    }
}

#[cfg(test)]
mod tests {
    use crate::error::GeneratorError;
    use crate::spec::Spec;
    use crate::Generator;

    use super::strings;

    fn empty() -> Generator {
        Generator::from_spec(Spec::default())
    }

    #[test]
    fn test_tmpfs_mount() {
        let mut g = empty();
        g.add_tmpfs_mount("/run", strings(&["nosuid", "size=64m"]));

        let mount = &g.spec().mounts[0];
        assert_eq!(mount.destination, "/run");
        assert_eq!(mount.kind, "tmpfs");
        assert_eq!(mount.source, "tmpfs");
        assert_eq!(mount.options, vec!["nosuid", "size=64m"]);
    }

    #[test]
    fn test_cgroups_mount_modes() {
        let mut g = empty();
        g.add_cgroups_mount("ro").unwrap();

        let mount = &g.spec().mounts[0];
        assert_eq!(mount.destination, "/sys/fs/cgroup");
        assert_eq!(mount.kind, "cgroup");
        assert_eq!(mount.source, "cgroup");
        assert_eq!(mount.options, vec!["nosuid", "noexec", "nodev", "relatime", "ro"]);

        g.add_cgroups_mount("no").unwrap();
        assert_eq!(g.spec().mounts.len(), 1);
    }

    #[test]
    fn test_cgroups_mount_invalid_mode() {
        let mut g = empty();
        let err = g.add_cgroups_mount("bogus").unwrap_err();
        assert!(matches!(err, GeneratorError::Validation(_)));
        assert!(g.spec().mounts.is_empty());
    }

    #[test]
    fn test_bind_mount_options() {
        let mut g = empty();
        g.add_bind_mount("/data", "/mnt/data", vec![]);
        g.add_bind_mount("/src", "/mnt/src", strings(&["rbind", "ro"]));
        g.add_bind_mount("/etc", "/mnt/etc", strings(&["ro"]));

        let mounts = &g.spec().mounts;
        assert_eq!(mounts[0].options, vec!["rw", "bind"]);
        assert_eq!(mounts[0].kind, "bind");
        assert_eq!(mounts[0].source, "/data");
        assert_eq!(mounts[1].options, vec!["rbind", "ro"]);
        assert_eq!(mounts[2].options, vec!["ro", "bind"]);
    }

    #[test]
    fn test_bind_mount_duplicates_appended() {
        let mut g = empty();
        g.add_bind_mount("/data", "/mnt/data", vec![]);
        g.add_bind_mount("/data", "/mnt/data", vec![]);
        assert_eq!(g.spec().mounts.len(), 2);
    }
}
