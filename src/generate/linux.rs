//! Setters for the `linux` section: resources, namespaces, ID mappings,
//! sysctls and path lists.

use super::Generator;
use crate::error::Result;
use crate::spec::{
    LinuxIdMapping, LinuxInterfacePriority, LinuxNamespace, NamespaceType, RootfsPropagation,
};

impl Generator {
    pub fn set_linux_cgroups_path(&mut self, path: impl Into<String>) {
        self.linux_mut().cgroups_path = path.into();
    }

    pub fn set_linux_mount_label(&mut self, label: impl Into<String>) {
        self.linux_mut().mount_label = label.into();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────────────────

    pub fn set_linux_resources_disable_oom_killer(&mut self, disable: bool) {
        self.resources_mut().disable_oom_killer = Some(disable);
    }

    pub fn set_linux_resources_oom_score_adj(&mut self, adj: i32) {
        self.resources_mut().oom_score_adj = Some(adj);
    }

    pub fn set_linux_resources_cpu_shares(&mut self, shares: u64) {
        self.cpu_mut().shares = Some(shares);
    }

    pub fn set_linux_resources_cpu_quota(&mut self, quota: i64) {
        self.cpu_mut().quota = Some(quota);
    }

    pub fn set_linux_resources_cpu_period(&mut self, period: u64) {
        self.cpu_mut().period = Some(period);
    }

    pub fn set_linux_resources_cpu_realtime_runtime(&mut self, runtime: i64) {
        self.cpu_mut().realtime_runtime = Some(runtime);
    }

    pub fn set_linux_resources_cpu_realtime_period(&mut self, period: u64) {
        self.cpu_mut().realtime_period = Some(period);
    }

    pub fn set_linux_resources_cpu_cpus(&mut self, cpus: impl Into<String>) {
        self.cpu_mut().cpus = cpus.into();
    }

    pub fn set_linux_resources_cpu_mems(&mut self, mems: impl Into<String>) {
        self.cpu_mut().mems = mems.into();
    }

    pub fn set_linux_resources_memory_limit(&mut self, limit: i64) {
        self.memory_mut().limit = Some(limit);
    }

    pub fn set_linux_resources_memory_reservation(&mut self, reservation: i64) {
        self.memory_mut().reservation = Some(reservation);
    }

    pub fn set_linux_resources_memory_swap(&mut self, swap: i64) {
        self.memory_mut().swap = Some(swap);
    }

    pub fn set_linux_resources_memory_kernel(&mut self, kernel: i64) {
        self.memory_mut().kernel = Some(kernel);
    }

    pub fn set_linux_resources_memory_kernel_tcp(&mut self, kernel_tcp: i64) {
        self.memory_mut().kernel_tcp = Some(kernel_tcp);
    }

    pub fn set_linux_resources_memory_swappiness(&mut self, swappiness: u64) {
        self.memory_mut().swappiness = Some(swappiness);
    }

    pub fn set_linux_resources_network_class_id(&mut self, class_id: u32) {
        self.network_mut().class_id = Some(class_id);
    }

    /// Set the priority of an interface, overwriting an existing entry
    pub fn add_linux_resources_network_priority(&mut self, name: &str, priority: u32) {
        let priorities = &mut self.network_mut().priorities;
        match priorities.iter().position(|p| p.name == name) {
            Some(i) => priorities[i].priority = priority,
            None => priorities.push(LinuxInterfacePriority {
                name: name.to_string(),
                priority,
            }),
        }
    }

    /// Remove an interface's priority entry; absent is not an error
    pub fn drop_linux_resources_network_priority(&mut self, name: &str) {
        let Some(network) = self
            .spec
            .linux
            .as_mut()
            .and_then(|linux| linux.resources.as_mut())
            .and_then(|resources| resources.network.as_mut())
        else {
            return;
        };
        if let Some(i) = network.priorities.iter().position(|p| p.name == name) {
            network.priorities.remove(i);
        }
    }

    pub fn set_linux_resources_pids_limit(&mut self, limit: i64) {
        self.pids_mut().limit = limit;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sysctl
    // ─────────────────────────────────────────────────────────────────────

    pub fn clear_linux_sysctl(&mut self) {
        if let Some(linux) = self.spec.linux.as_mut() {
            linux.sysctl.clear();
        }
    }

    /// Insert or overwrite a sysctl
    pub fn add_linux_sysctl(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.linux_mut().sysctl.insert(key.into(), value.into());
    }

    pub fn remove_linux_sysctl(&mut self, key: &str) {
        if let Some(linux) = self.spec.linux.as_mut() {
            linux.sysctl.remove(key);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // User namespace ID mappings (appended as given, never deduplicated)
    // ─────────────────────────────────────────────────────────────────────

    pub fn clear_linux_uid_mappings(&mut self) {
        if let Some(linux) = self.spec.linux.as_mut() {
            linux.uid_mappings.clear();
        }
    }

    pub fn add_linux_uid_mapping(&mut self, host_id: u32, container_id: u32, size: u32) {
        self.linux_mut().uid_mappings.push(LinuxIdMapping {
            host_id,
            container_id,
            size,
        });
    }

    pub fn clear_linux_gid_mappings(&mut self) {
        if let Some(linux) = self.spec.linux.as_mut() {
            linux.gid_mappings.clear();
        }
    }

    pub fn add_linux_gid_mapping(&mut self, host_id: u32, container_id: u32, size: u32) {
        self.linux_mut().gid_mappings.push(LinuxIdMapping {
            host_id,
            container_id,
            size,
        });
    }

    /// Set the root mount propagation mode
    ///
    /// An empty string unsets it. Any other value must be one of
    /// `private|rprivate|slave|rslave|shared|rshared`.
    pub fn set_linux_rootfs_propagation(&mut self, mode: &str) -> Result<()> {
        let propagation = if mode.is_empty() {
            None
        } else {
            Some(mode.parse::<RootfsPropagation>()?)
        };
        self.linux_mut().rootfs_propagation = propagation;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Namespaces
    // ─────────────────────────────────────────────────────────────────────

    pub fn clear_linux_namespaces(&mut self) {
        if let Some(linux) = self.spec.linux.as_mut() {
            linux.namespaces.clear();
        }
    }

    /// Create (empty `path`) or join (non-empty `path`) a namespace
    ///
    /// If a namespace of this kind is already configured, its path is
    /// replaced and its position is kept.
    ///
    /// # Errors
    /// * `Validation` - `kind` is not one of
    ///   `network|pid|mount|ipc|uts|user|cgroup`
    pub fn add_or_replace_linux_namespace(&mut self, kind: &str, path: impl Into<String>) -> Result<()> {
        let kind: NamespaceType = kind.parse()?;
        self.set_linux_namespace(kind, path);
        Ok(())
    }

    /// Typed form of [`add_or_replace_linux_namespace`](Self::add_or_replace_linux_namespace)
    pub fn set_linux_namespace(&mut self, kind: NamespaceType, path: impl Into<String>) {
        let path = path.into();
        let namespaces = &mut self.linux_mut().namespaces;
        match namespaces.iter().position(|ns| ns.kind == kind) {
            Some(i) => namespaces[i].path = path,
            None => namespaces.push(LinuxNamespace { kind, path }),
        }
    }

    /// Remove the namespace of `kind`
    ///
    /// Removing a kind that is not configured is a no-op and does not
    /// allocate the `linux` section.
    pub fn remove_linux_namespace(&mut self, kind: &str) -> Result<()> {
        let kind: NamespaceType = kind.parse()?;
        if let Some(linux) = self.spec.linux.as_mut() {
            if let Some(i) = linux.namespaces.iter().position(|ns| ns.kind == kind) {
                linux.namespaces.remove(i);
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Path lists
    // ─────────────────────────────────────────────────────────────────────

    pub fn add_linux_masked_path(&mut self, path: impl Into<String>) {
        self.linux_mut().masked_paths.push(path.into());
    }

    pub fn add_linux_readonly_path(&mut self, path: impl Into<String>) {
        self.linux_mut().readonly_paths.push(path.into());
    }
}

#[cfg(test)]
mod tests {
    use crate::error::GeneratorError;
    use crate::spec::Spec;
    use crate::Generator;

    use super::*;

    fn empty() -> Generator {
        Generator::from_spec(Spec::default())
    }

    #[test]
    fn test_setters_allocate_ancestors() {
        let mut g = empty();
        g.set_linux_resources_memory_swappiness(60);

        let linux = g.spec().linux.as_ref().unwrap();
        let memory = linux.resources.as_ref().unwrap().memory.as_ref().unwrap();
        assert_eq!(memory.swappiness, Some(60));
        assert!(memory.limit.is_none());
    }

    #[test]
    fn test_cpu_setters() {
        let mut g = empty();
        g.set_linux_resources_cpu_quota(50_000);
        g.set_linux_resources_cpu_period(100_000);
        g.set_linux_resources_cpu_cpus("0-3");

        let cpu = g.spec().linux.as_ref().unwrap().resources.as_ref().unwrap().cpu.clone().unwrap();
        assert_eq!(cpu.quota, Some(50_000));
        assert_eq!(cpu.period, Some(100_000));
        assert_eq!(cpu.cpus, "0-3");
        assert!(cpu.shares.is_none());
    }

    #[test]
    fn test_network_priority_upsert_and_drop() {
        let mut g = empty();
        g.add_linux_resources_network_priority("eth0", 1);
        g.add_linux_resources_network_priority("eth1", 2);
        g.add_linux_resources_network_priority("eth0", 5);

        let priorities = |g: &Generator| {
            g.spec().linux.as_ref().unwrap().resources.as_ref().unwrap()
                .network.as_ref().unwrap().priorities.clone()
        };
        let current = priorities(&g);
        assert_eq!(current.len(), 2);
        assert_eq!(current[0].name, "eth0");
        assert_eq!(current[0].priority, 5);

        g.drop_linux_resources_network_priority("eth0");
        g.drop_linux_resources_network_priority("missing");
        assert_eq!(priorities(&g).len(), 1);
    }

    #[test]
    fn test_drop_network_priority_does_not_allocate() {
        let mut g = empty();
        g.drop_linux_resources_network_priority("eth0");
        assert!(g.spec().linux.is_none());
    }

    #[test]
    fn test_sysctl() {
        let mut g = empty();
        g.add_linux_sysctl("net.ipv4.ip_forward", "1");
        g.add_linux_sysctl("net.ipv4.ip_forward", "0");
        g.add_linux_sysctl("kernel.shmmax", "1024");

        let sysctl = &g.spec().linux.as_ref().unwrap().sysctl;
        assert_eq!(sysctl.len(), 2);
        assert_eq!(sysctl["net.ipv4.ip_forward"], "0");

        g.remove_linux_sysctl("kernel.shmmax");
        assert_eq!(g.spec().linux.as_ref().unwrap().sysctl.len(), 1);

        let mut fresh = empty();
        fresh.clear_linux_sysctl();
        fresh.remove_linux_sysctl("anything");
        assert!(fresh.spec().linux.is_none());
    }

    #[test]
    fn test_id_mappings_append() {
        let mut g = empty();
        g.add_linux_uid_mapping(1000, 0, 1);
        g.add_linux_uid_mapping(1000, 0, 1);
        g.add_linux_gid_mapping(100000, 0, 65536);

        let linux = g.spec().linux.as_ref().unwrap();
        assert_eq!(linux.uid_mappings.len(), 2);
        assert_eq!(linux.gid_mappings[0].size, 65536);

        g.clear_linux_uid_mappings();
        g.clear_linux_gid_mappings();
        let linux = g.spec().linux.as_ref().unwrap();
        assert!(linux.uid_mappings.is_empty());
        assert!(linux.gid_mappings.is_empty());
    }

    #[test]
    fn test_rootfs_propagation() {
        let mut g = empty();
        g.set_linux_rootfs_propagation("rshared").unwrap();
        assert_eq!(
            g.spec().linux.as_ref().unwrap().rootfs_propagation,
            Some(RootfsPropagation::Rshared)
        );

        let err = g.set_linux_rootfs_propagation("bogus").unwrap_err();
        assert!(matches!(err, GeneratorError::Validation(_)));
        // Unchanged after a failed call
        assert_eq!(
            g.spec().linux.as_ref().unwrap().rootfs_propagation,
            Some(RootfsPropagation::Rshared)
        );

        g.set_linux_rootfs_propagation("").unwrap();
        assert!(g.spec().linux.as_ref().unwrap().rootfs_propagation.is_none());
    }

    #[test]
    fn test_invalid_propagation_does_not_allocate() {
        let mut g = empty();
        assert!(g.set_linux_rootfs_propagation("nope").is_err());
        assert!(g.spec().linux.is_none());
    }

    #[test]
    fn test_namespace_replace_keeps_position() {
        let mut g = empty();
        g.add_or_replace_linux_namespace("pid", "").unwrap();
        g.add_or_replace_linux_namespace("network", "").unwrap();
        g.add_or_replace_linux_namespace("pid", "/proc/42/ns/pid").unwrap();

        let namespaces = &g.spec().linux.as_ref().unwrap().namespaces;
        assert_eq!(namespaces.len(), 2);
        assert_eq!(namespaces[0].kind, NamespaceType::Pid);
        assert_eq!(namespaces[0].path, "/proc/42/ns/pid");
    }

    #[test]
    fn test_namespace_unknown_kind() {
        let mut g = empty();
        let err = g.add_or_replace_linux_namespace("time", "").unwrap_err();
        assert!(matches!(err, GeneratorError::Validation(_)));
        assert!(g.spec().linux.is_none());

        assert!(g.remove_linux_namespace("bogus").is_err());
    }

    #[test]
    fn test_namespace_remove_absent() {
        let mut g = empty();
        g.remove_linux_namespace("user").unwrap();
        assert!(g.spec().linux.is_none());

        g.add_or_replace_linux_namespace("ipc", "").unwrap();
        g.remove_linux_namespace("user").unwrap();
        assert_eq!(g.spec().linux.as_ref().unwrap().namespaces.len(), 1);

        g.remove_linux_namespace("ipc").unwrap();
        assert!(g.spec().linux.as_ref().unwrap().namespaces.is_empty());
    }

    #[test]
    fn test_clear_namespaces() {
        let mut g = Generator::new();
        g.clear_linux_namespaces();
        assert!(g.spec().linux.as_ref().unwrap().namespaces.is_empty());

        let mut fresh = empty();
        fresh.clear_linux_namespaces();
        assert!(fresh.spec().linux.is_none());
    }

    #[test]
    fn test_path_lists_append_only() {
        let mut g = empty();
        g.add_linux_masked_path("/proc/kcore");
        g.add_linux_masked_path("/proc/kcore");
        g.add_linux_readonly_path("/proc/sys");

        let linux = g.spec().linux.as_ref().unwrap();
        assert_eq!(linux.masked_paths, vec!["/proc/kcore", "/proc/kcore"]);
        assert_eq!(linux.readonly_paths, vec!["/proc/sys"]);
    }
}
