use serde::{Serialize, Serializer};

/// Percentage of the fleet a rollout phase targets, rendered as `"10%"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostFraction(u8);

impl HostFraction {
    pub const fn percent(value: u8) -> Self {
        Self(value)
    }

    pub fn as_percent(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for HostFraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Serialize for HostFraction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanTask {
    pub name: String,
    pub shell: String,
}

/// One play of the staged rollout. Field names follow Ansible play keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloutPhase {
    pub hosts: String,
    #[serde(rename = "serial")]
    pub host_fraction: HostFraction,
    pub tasks: Vec<PlanTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloutPlan {
    pub canary: RolloutPhase,
    pub batch: RolloutPhase,
}

impl RolloutPlan {
    /// Phases in execution order, shaped as an Ansible playbook.
    pub fn playbook(&self) -> Vec<&RolloutPhase> {
        vec![&self.canary, &self.batch]
    }

    pub fn to_playbook_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.playbook())
    }
}
