// config.rs — Check configuration
//
// The values every check consumes: which calls count as identity and
// barrier calls, the recursion search bound, the array-index policy and
// which checks run. Loaded from JSON and overridden from the command line.
//
// Preconditions: none.
// Postconditions: `CheckConfig::default()` matches the OpenCL builtins.
// Failure modes: malformed or unknown JSON keys produce `serde_json::Error`.
// Side effects: none.

use serde::{Deserialize, Serialize};

/// Whether a tainted value used only as an array index taints the access.
///
/// With `Exclude`, the index operand of `a[i]` is skipped by both identity
/// call detection and the taint scan; the base is still inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndexPolicy {
    #[default]
    Propagate,
    Exclude,
}

/// One individually switchable check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Check {
    BackwardBranch,
    Barrier,
    Recursion,
    SingleWorkItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnabledChecks {
    pub backward_branch: bool,
    pub barrier: bool,
    pub recursion: bool,
    pub single_work_item: bool,
}

impl Default for EnabledChecks {
    fn default() -> Self {
        EnabledChecks {
            backward_branch: true,
            barrier: true,
            recursion: true,
            single_work_item: true,
        }
    }
}

impl EnabledChecks {
    pub fn is_enabled(&self, check: Check) -> bool {
        match check {
            Check::BackwardBranch => self.backward_branch,
            Check::Barrier => self.barrier,
            Check::Recursion => self.recursion,
            Check::SingleWorkItem => self.single_work_item,
        }
    }

    pub fn disable(&mut self, check: Check) {
        match check {
            Check::BackwardBranch => self.backward_branch = false,
            Check::Barrier => self.barrier = false,
            Check::Recursion => self.recursion = false,
            Check::SingleWorkItem => self.single_work_item = false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    /// Functions returning a per-work-item index, one per addressing level.
    pub identity_functions: Vec<String>,
    /// Work-group synchronisation functions.
    pub barrier_functions: Vec<String>,
    /// Cycles longer than this many hops are not reported.
    pub max_recursion_depth: usize,
    pub index_policy: IndexPolicy,
    pub checks: EnabledChecks,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            identity_functions: vec!["get_global_id".into(), "get_local_id".into()],
            barrier_functions: vec!["barrier".into(), "work_group_barrier".into()],
            max_recursion_depth: 5,
            index_policy: IndexPolicy::Propagate,
            checks: EnabledChecks::default(),
        }
    }
}

impl CheckConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn is_identity(&self, name: &str) -> bool {
        self.identity_functions.iter().any(|f| f == name)
    }

    pub fn is_barrier(&self, name: &str) -> bool {
        self.barrier_functions.iter().any(|f| f == name)
    }

    pub fn enabled(&self, check: Check) -> bool {
        self.checks.is_enabled(check)
    }
}
