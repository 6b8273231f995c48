//! Integration tests for planning and instance reconciliation.
//!
//! Existing instances come from the in-memory repository, the desired model
//! from instance group specs.

use std::collections::HashSet;
use std::sync::Arc;

use fleet_director::db::{
    AppliedSpec, DeploymentRecord, InstanceRecord, MemoryRepository, NewInstance, Repository,
};
use fleet_director::deployment_plan::{
    reconcile, CloudConfig, FeatureDefaults, InstanceGroup, InstanceGroupSpec, Planner,
    PlannerInputs, PlannerOptions, StaticCloudPlanner,
};
use serde_json::{json, Value};

async fn seed_instance(
    repository: &MemoryRepository,
    deployment: &DeploymentRecord,
    job: &str,
    index: Option<u32>,
    applied_spec: Option<AppliedSpec>,
) -> InstanceRecord {
    let mut new = NewInstance::new(deployment.id, job, index);
    new.az = Some("z1".to_string());
    new.applied_spec = applied_spec;
    let instance = repository.create_instance(new).await;
    let agent_id = format!("agent-{}", instance.id);
    let vm = repository
        .create_vm(deployment.id, &agent_id, Some(&format!("vm-{}", instance.id)))
        .await;
    repository
        .attach_vm(instance.id, vm.id, true)
        .await
        .unwrap();
    instance
}

fn applied(stemcell: &str) -> Option<AppliedSpec> {
    Some(AppliedSpec {
        stemcell: Some(stemcell.to_string()),
        vm_type: Some("small".to_string()),
        networks: vec!["default".to_string()],
    })
}

async fn planner(
    repository: &Arc<MemoryRepository>,
    deployment: &DeploymentRecord,
    options: PlannerOptions,
    groups: Vec<Value>,
) -> Planner {
    let existing = repository.instances(deployment.id).await.unwrap();
    let manifest = json!({ "name": deployment.name });
    let cloud: CloudConfig = serde_json::from_value(json!({
        "azs": [{ "name": "z1" }],
        "networks": [{ "name": "default", "type": "manual" }],
        "vm_types": [{ "name": "small" }]
    }))
    .unwrap();

    let mut planner = Planner::new(
        PlannerInputs {
            name: deployment.name.clone(),
            properties: json!({}),
            uninterpolated_manifest: &manifest,
            raw_manifest_text: String::new(),
            cloud_configs: Vec::new(),
            runtime_configs: Vec::new(),
            model: deployment.clone(),
            existing_instances: existing,
            options,
        },
        Box::new(StaticCloudPlanner::new(cloud)),
        FeatureDefaults::default(),
    );
    for value in groups {
        let spec: InstanceGroupSpec = serde_json::from_value(value).unwrap();
        planner.add_instance_group(InstanceGroup::new(spec)).unwrap();
    }
    planner
}

fn web(instances: u32, stemcell: &str, update: Value) -> Value {
    json!({
        "name": "web",
        "instances": instances,
        "azs": ["z1"],
        "networks": [{ "name": "default" }],
        "stemcell": stemcell,
        "vm_type": "small",
        "update": update
    })
}

#[tokio::test]
async fn test_no_instance_lost_or_duplicated() {
    let repository = Arc::new(MemoryRepository::new());
    let deployment = repository.create_deployment("d").await;
    for index in 0..3 {
        seed_instance(&repository, &deployment, "web", Some(index), applied("s1")).await;
    }
    seed_instance(&repository, &deployment, "worker", Some(0), applied("s1")).await;
    seed_instance(&repository, &deployment, "web", None, applied("s1")).await;

    let mut planner = planner(
        &repository,
        &deployment,
        PlannerOptions::default(),
        vec![web(2, "s1", json!({}))],
    )
    .await;
    let plan = reconcile(&mut planner);

    let mut seen = HashSet::new();
    let bound = planner
        .instance_group("web")
        .unwrap()
        .instance_plans()
        .iter()
        .filter_map(|p| p.existing());
    for instance in bound.chain(plan.deletions().filter_map(|p| p.existing())) {
        assert!(seen.insert(instance.id), "instance {} planned twice", instance.id);
    }
    assert_eq!(seen.len(), 5);

    assert!(plan.create.is_empty());
    assert_eq!(plan.obsolete_instances.len(), 2);
    assert_eq!(plan.obsolete_instance_groups.len(), 1);
    assert_eq!(plan.obsolete_instance_groups[0].instance_group(), "worker");
}

#[tokio::test]
async fn test_scale_up_creates_missing_vms() {
    let repository = Arc::new(MemoryRepository::new());
    let deployment = repository.create_deployment("d").await;
    seed_instance(&repository, &deployment, "web", Some(0), applied("s1")).await;

    let mut planner = planner(
        &repository,
        &deployment,
        PlannerOptions::default(),
        vec![web(3, "s1", json!({}))],
    )
    .await;
    let plan = reconcile(&mut planner);

    let indices: Vec<u32> = plan
        .create
        .iter()
        .map(|p| p.desired().unwrap().index)
        .collect();
    assert_eq!(indices, vec![1, 2]);
    assert!(plan.hot_swap_shutdown.is_empty());
    assert!(plan.deletions().next().is_none());
}

#[tokio::test]
async fn test_hot_swap_groups_plan_shutdowns() {
    let repository = Arc::new(MemoryRepository::new());
    let deployment = repository.create_deployment("d").await;
    seed_instance(&repository, &deployment, "web", Some(0), applied("old")).await;
    seed_instance(&repository, &deployment, "db", Some(0), applied("old")).await;

    let db = json!({
        "name": "db",
        "instances": 1,
        "azs": ["z1"],
        "networks": [{ "name": "default", "static_ips": ["10.0.0.10"] }],
        "stemcell": "new",
        "vm_type": "small",
        "update": { "vm_strategy": "create-swap-delete" }
    });
    let mut planner = planner(
        &repository,
        &deployment,
        PlannerOptions::default(),
        vec![
            db,
            web(1, "new", json!({ "vm_strategy": "create-swap-delete" })),
        ],
    )
    .await;
    let plan = reconcile(&mut planner);

    // db cannot hot swap because of its static IP; web still can.
    assert_eq!(plan.hot_swap_shutdown.len(), 1);
    assert_eq!(plan.hot_swap_shutdown[0].instance_group(), "web");
    assert_eq!(plan.skipped_hot_swap_shutdown.len(), 1);
    assert_eq!(plan.skipped_hot_swap_shutdown[0].instance_group(), "db");
}

#[tokio::test]
async fn test_delete_create_groups_plan_no_hot_swap() {
    let repository = Arc::new(MemoryRepository::new());
    let deployment = repository.create_deployment("d").await;
    seed_instance(&repository, &deployment, "web", Some(0), applied("old")).await;

    let mut planner = planner(
        &repository,
        &deployment,
        PlannerOptions::default(),
        vec![web(1, "new", json!({}))],
    )
    .await;
    let plan = reconcile(&mut planner);

    assert!(plan.hot_swap_shutdown.is_empty());
    assert!(plan.skipped_hot_swap_shutdown.is_empty());
    let group = planner.instance_group("web").unwrap();
    assert_eq!(group.instance_plans_needing_shutdown().len(), 1);
}

#[tokio::test]
async fn test_recreate_marks_every_instance() {
    let repository = Arc::new(MemoryRepository::new());
    let deployment = repository.create_deployment("d").await;
    seed_instance(&repository, &deployment, "web", Some(0), applied("s1")).await;
    seed_instance(&repository, &deployment, "web", Some(1), applied("s1")).await;

    let options = PlannerOptions {
        recreate: true,
        ..PlannerOptions::default()
    };
    let mut planner = planner(
        &repository,
        &deployment,
        options,
        vec![web(2, "s1", json!({ "vm_strategy": "create-swap-delete" }))],
    )
    .await;
    let plan = reconcile(&mut planner);

    assert_eq!(plan.hot_swap_shutdown.len(), 2);
}

#[tokio::test]
async fn test_second_pass_replaces_obsolete_set() {
    let repository = Arc::new(MemoryRepository::new());
    let deployment = repository.create_deployment("d").await;
    seed_instance(&repository, &deployment, "legacy", Some(0), applied("s1")).await;

    let mut planner = planner(
        &repository,
        &deployment,
        PlannerOptions::default(),
        vec![web(1, "s1", json!({}))],
    )
    .await;

    let first = reconcile(&mut planner);
    let second = reconcile(&mut planner);

    assert_eq!(first.obsolete_instance_groups, second.obsolete_instance_groups);
    assert_eq!(planner.instance_plans_for_obsolete_instance_groups().len(), 1);
}
