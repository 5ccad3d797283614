//! Seccomp rule engine for the configuration's syscall filter
//!
//! # What is Seccomp?
//!
//! Seccomp (Secure Computing) is a Linux kernel feature that restricts
//! which system calls a process can make. The container configuration
//! describes the filter declaratively; the runtime compiles it to BPF.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  LinuxSeccomp                                                  │
//! │    defaultAction: SCMP_ACT_ERRNO   ◄── anything not listed     │
//! │    architectures: [SCMP_ARCH_X86_64, SCMP_ARCH_X86]            │
//! │    syscalls:                                                   │
//! │      read   → SCMP_ACT_ALLOW                                   │
//! │      write  → SCMP_ACT_ALLOW                                   │
//! │      kill   → SCMP_ACT_ALLOW  if arg0 == 0                     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module owns every rule about what may go into that subtree:
//! action names, architecture names, comparison operators and syscall
//! names. The [`Generator`](crate::Generator) only makes sure the subtree
//! exists and forwards its arguments here unchanged.

use thiserror::Error;

use crate::spec::{LinuxSeccomp, LinuxSeccompArg, LinuxSyscall};

/// Short action names accepted on input, with their libseccomp spelling
const ACTIONS: &[(&str, &str)] = &[
    ("kill", "SCMP_ACT_KILL"),
    ("trap", "SCMP_ACT_TRAP"),
    ("errno", "SCMP_ACT_ERRNO"),
    ("trace", "SCMP_ACT_TRACE"),
    ("allow", "SCMP_ACT_ALLOW"),
];

const ARCHITECTURES: &[(&str, &str)] = &[
    ("x86", "SCMP_ARCH_X86"),
    ("amd64", "SCMP_ARCH_X86_64"),
    ("x32", "SCMP_ARCH_X32"),
    ("arm", "SCMP_ARCH_ARM"),
    ("arm64", "SCMP_ARCH_AARCH64"),
    ("mips", "SCMP_ARCH_MIPS"),
    ("mips64", "SCMP_ARCH_MIPS64"),
    ("mips64n32", "SCMP_ARCH_MIPS64N32"),
    ("mipsel", "SCMP_ARCH_MIPSEL"),
    ("mipsel64", "SCMP_ARCH_MIPSEL64"),
    ("mipsel64n32", "SCMP_ARCH_MIPSEL64N32"),
    ("ppc", "SCMP_ARCH_PPC"),
    ("ppc64", "SCMP_ARCH_PPC64"),
    ("ppc64le", "SCMP_ARCH_PPC64LE"),
    ("s390", "SCMP_ARCH_S390"),
    ("s390x", "SCMP_ARCH_S390X"),
];

const OPERATORS: &[(&str, &str)] = &[
    ("NE", "SCMP_CMP_NE"),
    ("LT", "SCMP_CMP_LT"),
    ("LE", "SCMP_CMP_LE"),
    ("EQ", "SCMP_CMP_EQ"),
    ("GE", "SCMP_CMP_GE"),
    ("GT", "SCMP_CMP_GT"),
    ("ME", "SCMP_CMP_MASKED_EQ"),
];

/// Errors returned by the rule engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeccompError {
    #[error("unrecognized action '{0}', expected one of kill|trap|errno|trace|allow")]
    UnknownAction(String),

    #[error("unrecognized architecture '{0}'")]
    UnknownArchitecture(String),

    #[error("unrecognized operator '{0}', expected one of NE|LT|LE|EQ|GE|GT|ME")]
    UnknownOperator(String),

    #[error("invalid syscall name '{0}'")]
    InvalidSyscallName(String),

    #[error("invalid {field} '{value}'")]
    InvalidArgument { field: &'static str, value: String },

    /// Some, but not all, of index/value/valueTwo/operator were given
    #[error("syscall argument filter needs index, value, valueTwo and operator together")]
    IncompleteArguments,
}

// ═══════════════════════════════════════════════════════════════════════════
// SyscallOpts
// ═══════════════════════════════════════════════════════════════════════════
// Raw, unparsed description of one syscall rule, as a caller would collect
// it from flags. The four argument fields are either all empty (rule
// applies unconditionally) or all set (rule applies when the comparison on
// argument `index` holds).
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyscallOpts {
    pub action: String,
    pub syscall: String,
    pub index: String,
    pub value: String,
    pub value_two: String,
    pub operator: String,
}

impl SyscallOpts {
    /// Unconditional rule for a single syscall
    pub fn new(action: impl Into<String>, syscall: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            syscall: syscall.into(),
            ..Default::default()
        }
    }

    /// Restrict the rule to calls where `args[index] <operator> value`
    pub fn with_argument(
        mut self,
        index: impl Into<String>,
        value: impl Into<String>,
        value_two: impl Into<String>,
        operator: impl Into<String>,
    ) -> Self {
        self.index = index.into();
        self.value = value.into();
        self.value_two = value_two.into();
        self.operator = operator.into();
        self
    }

    fn argument_fields(&self) -> [&str; 4] {
        [&self.index, &self.value, &self.value_two, &self.operator]
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Token parsing
// ═══════════════════════════════════════════════════════════════════════════

fn lookup(table: &[(&str, &'static str)], token: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(short, full)| short.eq_ignore_ascii_case(token) || full.eq_ignore_ascii_case(token))
        .map(|(_, full)| *full)
}

/// Map an action name (`allow`, `ERRNO`, `SCMP_ACT_KILL`) to its libseccomp spelling
pub fn parse_action(action: &str) -> Result<&'static str, SeccompError> {
    lookup(ACTIONS, action).ok_or_else(|| SeccompError::UnknownAction(action.to_string()))
}

/// Map an architecture name (`amd64`, `arm64`, ...) to its libseccomp spelling
pub fn parse_architecture(arch: &str) -> Result<&'static str, SeccompError> {
    lookup(ARCHITECTURES, arch).ok_or_else(|| SeccompError::UnknownArchitecture(arch.to_string()))
}

/// Map a comparison operator (`EQ`, `ME`, ...) to its libseccomp spelling
pub fn parse_operator(op: &str) -> Result<&'static str, SeccompError> {
    lookup(OPERATORS, op).ok_or_else(|| SeccompError::UnknownOperator(op.to_string()))
}

fn check_syscall_name(name: &str) -> Result<(), SeccompError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SeccompError::InvalidSyscallName(name.to_string()))
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, SeccompError> {
    value.trim().parse().map_err(|_| SeccompError::InvalidArgument {
        field,
        value: value.to_string(),
    })
}

fn parse_arguments(opts: &SyscallOpts) -> Result<Vec<LinuxSeccompArg>, SeccompError> {
    let fields = opts.argument_fields();
    if fields.iter().all(|f| f.is_empty()) {
        return Ok(Vec::new());
    }
    if fields.iter().any(|f| f.is_empty()) {
        return Err(SeccompError::IncompleteArguments);
    }

    Ok(vec![LinuxSeccompArg {
        index: parse_number("index", &opts.index)?,
        value: parse_number("value", &opts.value)?,
        value_two: parse_number("valueTwo", &opts.value_two)?,
        op: parse_operator(&opts.operator)?.to_string(),
    }])
}

// ═══════════════════════════════════════════════════════════════════════════
// Rule operations
// ═══════════════════════════════════════════════════════════════════════════

/// Add or update the rule described by `opts`
///
/// # Decision table
///
/// ```text
/// ┌──────────────────────────────────────────────┬─────────────────────┐
/// │ Situation                                    │ Result              │
/// ├──────────────────────────────────────────────┼─────────────────────┤
/// │ action == defaultAction, no argument filter  │ nothing recorded    │
/// │ same name + args + action already present    │ no-op               │
/// │ same name + args, different action           │ action overwritten  │
/// │ anything else                                │ rule appended       │
/// └──────────────────────────────────────────────┴─────────────────────┘
/// ```
///
/// Nothing is modified if any token fails to parse.
pub fn parse_syscall_flag(opts: &SyscallOpts, config: &mut LinuxSeccomp) -> Result<(), SeccompError> {
    let action = parse_action(&opts.action)?;
    check_syscall_name(&opts.syscall)?;
    let args = parse_arguments(opts)?;

    if action == config.default_action && args.is_empty() {
        return Ok(());
    }

    if let Some(existing) = config
        .syscalls
        .iter_mut()
        .find(|rule| rule.name == opts.syscall && rule.args == args)
    {
        if existing.action != action {
            existing.action = action.to_string();
        }
        return Ok(());
    }

    config.syscalls.push(LinuxSyscall {
        name: opts.syscall.clone(),
        action: action.to_string(),
        args,
    });
    Ok(())
}

/// Set the default action, then drop explicit rules made redundant by it.
///
/// An empty `action` is a no-op.
pub fn parse_default_action(action: &str, config: &mut LinuxSeccomp) -> Result<(), SeccompError> {
    if action.is_empty() {
        return Ok(());
    }
    let default_action = parse_action(action)?;
    config.default_action = default_action.to_string();
    remove_all_matching_rules(config, default_action);
    Ok(())
}

/// Set the default action without touching existing rules.
pub fn parse_default_action_force(action: &str, config: &mut LinuxSeccomp) -> Result<(), SeccompError> {
    if action.is_empty() {
        return Ok(());
    }
    config.default_action = parse_action(action)?.to_string();
    Ok(())
}

/// Add an architecture to the filter's architecture set (idempotent)
pub fn parse_architecture_flag(arch: &str, config: &mut LinuxSeccomp) -> Result<(), SeccompError> {
    let arch = parse_architecture(arch)?;
    if !config.architectures.iter().any(|a| a == arch) {
        config.architectures.push(arch.to_string());
    }
    Ok(())
}

/// Remove every rule for each syscall in a comma-separated list
pub fn remove_action(syscalls: &str, config: &mut LinuxSeccomp) -> Result<(), SeccompError> {
    let names: Vec<&str> = syscalls
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return Err(SeccompError::InvalidSyscallName(syscalls.to_string()));
    }
    for name in &names {
        check_syscall_name(name)?;
    }

    config
        .syscalls
        .retain(|rule| !names.iter().any(|name| *name == rule.name));
    Ok(())
}

/// Remove every syscall rule, keeping the default action and architectures
pub fn remove_all_rules(config: &mut LinuxSeccomp) -> Result<(), SeccompError> {
    config.syscalls.clear();
    Ok(())
}

/// Remove every rule whose action is `action` (libseccomp spelling)
pub fn remove_all_matching_rules(config: &mut LinuxSeccomp, action: &str) {
    config.syscalls.retain(|rule| rule.action != action);
}
