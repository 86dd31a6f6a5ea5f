//! End-to-end migration scenarios against scripted and fake destinations

use flagshift_client::{HttpMethod, HttpResponse, Transport};
use flagshift_core::prelude::*;
use flagshift_core::{MigrationStage, ResourceRef, SnapshotStore};
use flagshift_test_utils::{fixtures, test_client, FakeDestination, InMemorySnapshotStore, ScriptedTransport};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

const ENVS: &[&str] = &["production", "test"];

fn source_store() -> InMemorySnapshotStore {
    InMemorySnapshotStore::new()
        .with_project(fixtures::project("web", ENVS))
        .with_segments(
            "web",
            "production",
            fixtures::segment_list(vec![fixtures::segment("beta-users"), fixtures::unbounded_segment("synced")]),
        )
        .with_segments("web", "test", fixtures::segment_list(vec![]))
        .with_flag("web", fixtures::flag("dark-mode", ENVS))
        .with_flag("web", fixtures::flag("new-checkout", ENVS))
}

fn orchestrator(
    transport: Arc<dyn Transport>,
    store: InMemorySnapshotStore,
    config: MigrationConfig,
) -> MigrationOrchestrator {
    let store: Arc<dyn SnapshotStore> = Arc::new(store);
    MigrationOrchestrator::new(test_client(transport), store, config)
}

fn copy_plan() -> ProjectPlan {
    ProjectPlan::new("web", DestinationNaming::Suffix("copy".into()))
}

#[tokio::test(start_paused = true)]
async fn migrates_project_into_empty_destination() {
    let dest = Arc::new(FakeDestination::new());
    let report = orchestrator(dest.clone(), source_store(), MigrationConfig::default())
        .migrate_project(&copy_plan())
        .await
        .unwrap();

    assert_eq!(report.outcome(), Some(ProjectOutcome::Completed));
    assert_eq!(report.destination_key, "web-copy");
    assert_eq!(report.segments_created, 1);
    assert_eq!(report.flags_created, 2);
    assert!(report.failures().is_empty(), "{:?}", report.failures());
    assert_eq!(report.flags_to_check().count(), 0);

    let project = dest.project("web-copy").unwrap();
    assert_eq!(project["name"], json!("Project web copy"));
    assert_eq!(project["includeInSnippetByDefault"], json!(false));
    assert_eq!(project["environments"][0]["key"], json!("production"));
    assert!(project["environments"][0].get("_id").is_none());

    let segment = dest.segment("web-copy", "production", "beta-users").unwrap();
    assert_eq!(segment["included"], json!(["user-1", "user-2"]));
    assert_eq!(segment["excluded"], json!([]));
    assert_eq!(segment["rules"].as_array().unwrap().len(), 1);

    let flag = dest.flag("web-copy", "dark-mode").unwrap();
    assert_eq!(flag["variations"], json!([{"value": true}, {"value": false, "name": "Off"}]));
    assert!(flag.get("clientSideAvailability").is_some());
    assert!(flag.get("includeInSnippet").is_none());

    let production = &flag["environments"]["production"];
    assert_eq!(production["on"], json!(false));
    assert_eq!(production["offVariation"], json!(1));
    assert_eq!(production["targets"], json!([{"values": ["qa-user"], "variation": 0}]));
    assert!(production.get("salt").is_none());
    assert!(production.get("_site").is_none());

    let rule_ids: Vec<&str> = production["rules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["_id"].as_str().unwrap())
        .collect();
    assert_eq!(rule_ids, vec!["dark-mode-production-r0", "dark-mode-production-r1"]);
    assert_eq!(flag["environments"]["test"]["on"], json!(true));
}

#[tokio::test(start_paused = true)]
async fn unbounded_segments_are_never_sent() {
    let transport = Arc::new(ScriptedTransport::new());
    let report = orchestrator(transport.clone(), source_store(), MigrationConfig::default())
        .migrate_project(&copy_plan())
        .await
        .unwrap();

    assert!(transport
        .requests()
        .iter()
        .all(|r| !r.path.contains("synced") && r.body.as_ref().map_or(true, |b| b["key"] != json!("synced"))));
    assert_eq!(
        report.skipped()[0].resource,
        ResourceRef::Segment {
            env: "production".into(),
            key: "synced".into()
        }
    );
    assert_eq!(report.outcome(), Some(ProjectOutcome::Completed));
}

#[tokio::test(start_paused = true)]
async fn creates_precede_patches() {
    let transport = Arc::new(ScriptedTransport::new());
    orchestrator(transport.clone(), source_store(), MigrationConfig::default())
        .migrate_project(&copy_plan())
        .await
        .unwrap();

    assert_eq!(
        transport.log(),
        vec![
            "POST projects",
            "POST segments/web-copy/production",
            "PATCH segments/web-copy/production/beta-users",
            "POST flags/web-copy",
            "POST flags/web-copy",
            "PATCH flags/web-copy/dark-mode",
            "PATCH flags/web-copy/new-checkout",
            "PATCH flags/web-copy/dark-mode",
            "PATCH flags/web-copy/new-checkout",
        ]
    );

    // one combined patch per (flag, environment)
    let patches = transport.requests_to(HttpMethod::Patch, "flags/web-copy/dark-mode");
    let first: &Vec<Value> = patches[0].body.as_ref().unwrap().as_array().unwrap();
    assert!(first
        .iter()
        .all(|op| op["path"].as_str().unwrap().starts_with("/environments/production/")));
    let appends = first.iter().filter(|op| op["path"] == json!("/environments/production/rules/-"));
    assert_eq!(appends.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn rejected_flag_is_reported_once() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.always(
        HttpMethod::Patch,
        "flags/web-copy/dark-mode",
        HttpResponse::new(400, r#"{"code":"invalid_request"}"#),
    );

    let report = orchestrator(transport.clone(), source_store(), MigrationConfig::default())
        .migrate_project(&copy_plan())
        .await
        .unwrap();

    assert_eq!(transport.count(HttpMethod::Patch, "flags/web-copy/dark-mode"), 2);
    assert_eq!(report.flags_to_check().collect::<Vec<_>>(), vec!["dark-mode"]);
    assert_eq!(report.failures().len(), 2);
    assert_eq!(report.failures()[0].kind, FailureKind::Rejected { status: 400 });
    assert_eq!(report.outcome(), Some(ProjectOutcome::CompletedWithWarnings));
}

#[tokio::test(start_paused = true)]
async fn partial_success_status_needs_review() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.enqueue(HttpMethod::Patch, "flags/web-copy/new-checkout", HttpResponse::new(207, "{}"));

    let report = orchestrator(transport, source_store(), MigrationConfig::default())
        .migrate_project(&copy_plan())
        .await
        .unwrap();

    assert_eq!(report.flags_to_check().collect::<Vec<_>>(), vec!["new-checkout"]);
    assert!(report.failures().is_empty());
    assert_eq!(report.outcome(), Some(ProjectOutcome::CompletedWithWarnings));
}

#[tokio::test(start_paused = true)]
async fn failed_project_create_does_not_stop_migration() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.enqueue(HttpMethod::Post, "projects", HttpResponse::new(500, "boom"));

    let report = orchestrator(transport.clone(), source_store(), MigrationConfig::default())
        .migrate_project(&copy_plan())
        .await
        .unwrap();

    assert_eq!(transport.count(HttpMethod::Post, "flags/web-copy"), 2);
    assert_eq!(
        report.failures()[0].resource,
        ResourceRef::Project {
            key: "web-copy".into()
        }
    );
    assert_eq!(report.outcome(), Some(ProjectOutcome::CompletedWithWarnings));
}

#[tokio::test(start_paused = true)]
async fn fail_closed_skips_patches_after_failed_create() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.enqueue(HttpMethod::Post, "segments/web-copy/production", HttpResponse::new(409, "{}"));
    transport.enqueue(HttpMethod::Post, "flags/web-copy", HttpResponse::new(409, "{}"));

    let config = MigrationConfig::default().with_patch_after_failed_create(false);
    let report = orchestrator(transport.clone(), source_store(), config)
        .migrate_project(&copy_plan())
        .await
        .unwrap();

    assert_eq!(transport.count(HttpMethod::Patch, "segments/web-copy/production/beta-users"), 0);
    assert_eq!(transport.count(HttpMethod::Patch, "flags/web-copy/dark-mode"), 0);
    assert_eq!(transport.count(HttpMethod::Patch, "flags/web-copy/new-checkout"), 2);
    assert_eq!(report.flags_to_check().collect::<Vec<_>>(), vec!["dark-mode"]);
    // unbounded segment, skipped segment patch, two skipped flag patches
    assert_eq!(report.skipped().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn fail_open_patches_after_failed_create() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.enqueue(HttpMethod::Post, "segments/web-copy/production", HttpResponse::new(409, "{}"));

    orchestrator(transport.clone(), source_store(), MigrationConfig::default())
        .migrate_project(&copy_plan())
        .await
        .unwrap();

    assert_eq!(transport.count(HttpMethod::Patch, "segments/web-copy/production/beta-users"), 1);
}

#[tokio::test(start_paused = true)]
async fn environment_filter_limits_flag_patches() {
    let transport = Arc::new(ScriptedTransport::new());
    let config = MigrationConfig::default().with_environment_filter(vec!["test".into()]);
    orchestrator(transport.clone(), source_store(), config)
        .migrate_project(&copy_plan())
        .await
        .unwrap();

    let patches = transport.requests_to(HttpMethod::Patch, "flags/web-copy/dark-mode");
    assert_eq!(patches.len(), 1);
    let ops = patches[0].body.as_ref().unwrap().as_array().unwrap();
    assert!(ops
        .iter()
        .all(|op| op["path"].as_str().unwrap().starts_with("/environments/test/")));
}

#[tokio::test(start_paused = true)]
async fn flag_without_environment_entry_gets_no_patch() {
    let flag = fixtures::flag("solo", &["production"]);
    let store = InMemorySnapshotStore::new()
        .with_project(fixtures::project("web", ENVS))
        .with_segments("web", "production", fixtures::segment_list(vec![]))
        .with_segments("web", "test", fixtures::segment_list(vec![]))
        .with_flag("web", flag);

    let transport = Arc::new(ScriptedTransport::new());
    orchestrator(transport.clone(), store, MigrationConfig::default())
        .migrate_project(&ProjectPlan::new("web", DestinationNaming::Same))
        .await
        .unwrap();

    assert_eq!(transport.count(HttpMethod::Patch, "flags/web/solo"), 1);
}

#[tokio::test(start_paused = true)]
async fn rerun_is_idempotent_except_rule_appends() {
    let dest = Arc::new(FakeDestination::new());
    let orchestrator = orchestrator(dest.clone(), source_store(), MigrationConfig::default());

    orchestrator.migrate_project(&copy_plan()).await.unwrap();
    let first = dest.flag("web-copy", "dark-mode").unwrap();

    let second_report = orchestrator.migrate_project(&copy_plan()).await.unwrap();
    let second = dest.flag("web-copy", "dark-mode").unwrap();

    // creates now conflict; patches still apply
    assert!(second_report
        .failures()
        .iter()
        .all(|f| f.kind == FailureKind::Rejected { status: 409 }));

    for env in ENVS {
        let before = first["environments"][env].as_object().unwrap();
        let after = second["environments"][env].as_object().unwrap();
        for (field, value) in before.iter().filter(|(k, _)| k.as_str() != "rules") {
            assert_eq!(&after[field], value, "{env}.{field} changed on re-run");
        }

        // known non-idempotent edge: rules are appended again
        let rules_before = before["rules"].as_array().unwrap();
        let rules_after = after["rules"].as_array().unwrap();
        assert_eq!(rules_after.len(), rules_before.len() * 2);
        assert_eq!(&rules_after[..rules_before.len()], rules_before.as_slice());
        assert_eq!(&rules_after[rules_before.len()..], rules_before.as_slice());
    }

    let segment = dest.segment("web-copy", "production", "beta-users").unwrap();
    assert_eq!(segment["rules"].as_array().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_sends_nothing() {
    let transport = Arc::new(ScriptedTransport::new());
    let orchestrator = orchestrator(transport.clone(), source_store(), MigrationConfig::default());
    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();
    let orchestrator = orchestrator.with_cancellation(token);

    let report = orchestrator.migrate_project(&copy_plan()).await.unwrap();

    assert_eq!(report.outcome(), Some(ProjectOutcome::Cancelled));
    assert!(transport.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_between_resources() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = test_client(transport.clone());
    let store: Arc<dyn SnapshotStore> = Arc::new(source_store());
    let orchestrator = MigrationOrchestrator::new(Arc::clone(&client), store, MigrationConfig::default());

    // stuck on a rate limit while creating the project, then cancelled
    transport.enqueue(
        HttpMethod::Post,
        "projects",
        HttpResponse::new(429, "").with_header("Retry-After", "30"),
    );
    let token = client.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        token.cancel();
    });

    let report = orchestrator.migrate_project(&copy_plan()).await.unwrap();

    assert_eq!(report.stage, MigrationStage::Cancelled);
    assert_eq!(transport.log(), vec!["POST projects"]);
}

#[tokio::test(start_paused = true)]
async fn batch_runs_projects_concurrently_in_plan_order() {
    let store = source_store()
        .with_project(fixtures::project("api", &["production"]))
        .with_segments("api", "production", fixtures::segment_list(vec![]))
        .with_flag("api", fixtures::flag("rate-limit", &["production"]));

    let dest = Arc::new(FakeDestination::new());
    let config = MigrationConfig::default().with_max_concurrent_projects(2);
    let orchestrator = orchestrator(dest.clone(), store, config);

    let keys = vec!["web".to_string(), "api".to_string(), "missing".to_string()];
    let plans = ProjectPlan::for_projects(keys, &DestinationNaming::Suffix("eu".into())).unwrap();
    let summary = orchestrator.run(plans).await;

    let order: Vec<&str> = summary.projects.iter().map(|p| p.source_key.as_str()).collect();
    assert_eq!(order, vec!["web", "api", "missing"]);
    assert_eq!(summary.completed(), 2);
    assert!(matches!(
        summary.projects[2].result,
        Err(MigrationError::Store { .. })
    ));
    assert_eq!(summary.status(), RunStatus::Failed);

    assert!(dest.project("web-eu").is_some());
    assert_eq!(dest.flag_keys("api-eu"), vec!["rate-limit"]);
}
