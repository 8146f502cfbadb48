use std::fmt;
use std::str::FromStr;

/// Plans that ship with the binary, selected with `--builtin`.
///
/// - `NetworkApply`: generate and apply the network configuration, then wait
///   for a default route.
/// - `DryRun`: harmless rehearsal stages; the first run fails on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinPlan {
    NetworkApply,
    DryRun,
}

impl FromStr for BuiltinPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "network-apply" => Ok(BuiltinPlan::NetworkApply),
            "dry-run" => Ok(BuiltinPlan::DryRun),
            other => Err(format!(
                "invalid builtin plan: {other} (expected \"network-apply\" or \"dry-run\")"
            )),
        }
    }
}

impl fmt::Display for BuiltinPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuiltinPlan::NetworkApply => f.write_str("network-apply"),
            BuiltinPlan::DryRun => f.write_str("dry-run"),
        }
    }
}
