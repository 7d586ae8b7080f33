use crate::models::{HostFraction, PackageSpecification, PlanTask, RolloutPhase, RolloutPlan};

pub const CANARY_FRACTION: HostFraction = HostFraction::percent(10);
pub const BATCH_FRACTION: HostFraction = HostFraction::percent(30);

/// Derive the staged rollout for a specification. Validations stay out of
/// the plan; both phases carry the same tasks.
pub fn build_plan(spec: &PackageSpecification) -> RolloutPlan {
    let tasks: Vec<PlanTask> = spec
        .steps
        .iter()
        .map(|step| PlanTask {
            name: step.name.clone(),
            shell: step.command.clone(),
        })
        .collect();

    RolloutPlan {
        canary: phase(CANARY_FRACTION, tasks.clone()),
        batch: phase(BATCH_FRACTION, tasks),
    }
}

fn phase(host_fraction: HostFraction, tasks: Vec<PlanTask>) -> RolloutPhase {
    RolloutPhase {
        hosts: "all".to_string(),
        host_fraction,
        tasks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShellStep;
    use std::path::PathBuf;

    fn spec(steps: Vec<ShellStep>) -> PackageSpecification {
        PackageSpecification {
            package: "log4j".into(),
            version: "2.17.0".into(),
            artifact_path: PathBuf::from("a.jar"),
            expected_digest: "sha256:00".into(),
            steps,
            validations: vec![ShellStep { name: "check".into(), command: "test -f x".into() }],
        }
    }

    #[test]
    fn test_phases_mirror_steps() {
        let steps = vec![
            ShellStep { name: "remove".into(), command: "rm libs/log4j-*.jar".into() },
            ShellStep { name: "copy".into(), command: "cp {{ playbook_dir }}/x.jar libs/".into() },
        ];
        let plan = build_plan(&spec(steps.clone()));

        assert_eq!(plan.canary.host_fraction.as_percent(), 10);
        assert_eq!(plan.batch.host_fraction.as_percent(), 30);
        assert_eq!(plan.canary.tasks, plan.batch.tasks);
        let expected: Vec<(String, String)> = steps.into_iter().map(|s| (s.name, s.command)).collect();
        let actual: Vec<(String, String)> = plan
            .canary
            .tasks
            .iter()
            .map(|t| (t.name.clone(), t.shell.clone()))
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_validations_excluded() {
        let plan = build_plan(&spec(vec![]));
        assert!(plan.canary.tasks.iter().all(|t| t.name != "check"));
    }

    #[test]
    fn test_empty_steps_yield_empty_phases() {
        let plan = build_plan(&spec(vec![]));
        assert!(plan.canary.tasks.is_empty());
        assert!(plan.batch.tasks.is_empty());
    }

    #[test]
    fn test_plan_does_not_mutate_spec() {
        let original = spec(vec![ShellStep { name: "a".into(), command: "true".into() }]);
        let copy = original.clone();
        let _ = build_plan(&original);
        assert_eq!(original, copy);
    }
}
