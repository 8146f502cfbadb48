// src/plans.rs

//! Built-in stage plans for applying a network configuration.

use std::path::Path;
use std::time::Duration;

use crate::config::{PlanFile, StagePlan, StageSpec};
use crate::exec::poll::DEFAULT_POLL_INTERVAL;

pub const NETPLAN_CONFIG_FILE_NAME: &str = "00-snapd-config.yaml";
pub const NETPLAN_CONFIG_HEADER: &str = "# This is the network config written by 'stagerun'\n";
pub const NETPLAN_GENERATOR: &str = "/lib/netplan/generate";

/// How long to wait for a default route after applying.
pub const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Generate, apply, then wait for connectivity.
pub fn network_apply() -> PlanFile {
    PlanFile::new_unchecked(
        "network-apply".to_string(),
        vec![
            process("generate", [NETPLAN_GENERATOR]),
            process("apply", ["netplan", "apply"]),
            StagePlan::new(
                "timeout",
                StageSpec::WaitForDefaultRoute {
                    timeout: DEFAULT_ROUTE_TIMEOUT,
                    interval: DEFAULT_POLL_INTERVAL,
                },
            ),
        ],
    )
}

/// Rehearsal plans that touch nothing on the host.
///
/// The first plan fails in its last stage so the error path gets exercised;
/// later plans succeed.
#[derive(Debug, Clone)]
pub struct DryRunPlanner {
    netplan_available: bool,
    tried_once: bool,
}

impl DryRunPlanner {
    /// Detect whether the netplan generator is installed.
    pub fn detect() -> Self {
        Self::new(Path::new(NETPLAN_GENERATOR).exists())
    }

    pub fn new(netplan_available: bool) -> Self {
        Self {
            netplan_available,
            tried_once: false,
        }
    }

    pub fn next_plan(&mut self, root: &Path) -> PlanFile {
        let short = Duration::from_millis(100);
        let mut stages = vec![
            process("one", ["sleep", "0.1"]),
            StagePlan::new("two", StageSpec::Sleep { duration: short }),
            process("three", ["sleep", "0.1"]),
        ];

        if self.netplan_available {
            // Checks that what was written is acceptable to netplan.
            stages.push(process(
                "gen",
                [
                    "netplan".to_string(),
                    "generate".to_string(),
                    "--root".to_string(),
                    root.display().to_string(),
                ],
            ));
        }

        if !self.tried_once {
            stages.push(process("fail", ["false"]));
            self.tried_once = true;
        }

        PlanFile::new_unchecked("network-dry-run".to_string(), stages)
    }
}

fn process<I, S>(name: &str, cmd: I) -> StagePlan
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    StagePlan::new(
        name,
        StageSpec::Process {
            cmd: cmd.into_iter().map(Into::into).collect(),
            input: None,
            timeout: None,
        },
    )
}
