//! End-to-end scenarios exercising dependency resolution and liveness
//! together, driving the domain components directly (catalog, heartbeat
//! processor, liveness monitor) rather than through HTTP, so the fixed
//! clock can advance deterministically between steps.

use std::sync::Arc;
use std::time::Duration;

use semver::Version;

use mesh_registry::store::memory::InMemoryStore;
use mesh_registry::{
    Agent, CacheConfig, Capability, Catalog, DependencyDeclaration, Endpoint, FixedClock,
    HeartbeatProcessor, InMemoryCacheStore, LivenessMonitor, RegistrationPayload, Resolution,
};

fn endpoint(port: u16) -> Endpoint {
    Endpoint { scheme: "http".into(), host: "127.0.0.1".into(), port }
}

fn capability(name: &str, version: &str, tags: &[&str], deps: Vec<DependencyDeclaration>) -> Capability {
    Capability {
        name: name.to_string(),
        version: Version::parse(version).unwrap(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        description: None,
        schema: serde_json::Value::Null,
        dependencies: deps,
    }
}

fn payload(name: &str, namespace: &str, port: u16, caps: Vec<Capability>) -> RegistrationPayload {
    RegistrationPayload {
        id: None,
        name: name.to_string(),
        namespace: namespace.to_string(),
        version: Version::new(1, 0, 0),
        endpoint: endpoint(port),
        capabilities: caps,
    }
}

fn dependency(capability: &str, tags: &[&str]) -> DependencyDeclaration {
    DependencyDeclaration {
        ordinal: 0,
        capability: Some(capability.to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        version_constraint: None,
        namespace: None,
    }
}

struct Harness {
    catalog: Arc<Catalog>,
    heartbeat: HeartbeatProcessor,
    clock: Arc<FixedClock>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let catalog = Arc::new(Catalog::new(store));
    let cache: Arc<dyn mesh_registry::CacheStore> = Arc::new(InMemoryCacheStore::new(CacheConfig::default()));
    let clock = Arc::new(FixedClock::new(chrono::Utc::now()));
    let heartbeat = HeartbeatProcessor::new(
        catalog.clone(),
        cache,
        clock.clone() as Arc<dyn mesh_registry::Clock>,
        Duration::from_secs(30),
        true,
    );
    Harness { catalog, heartbeat, clock }
}

async fn register(h: &Harness, p: RegistrationPayload) -> Agent {
    let now = h.clock.now();
    h.catalog.register(p, now).await.unwrap().0
}

/// Scenario 1: required + preferred tags score 10, excluded tag would disqualify.
#[tokio::test]
async fn scenario_required_and_preferred_tags_resolve() {
    let h = harness();
    let a = register(&h, payload("agent-a", "default", 9001, vec![capability("weather", "1.0.0", &["api", "fast"], vec![])])).await;

    let consumer = payload(
        "agent-b",
        "default",
        9002,
        vec![capability("consumer", "1.0.0", &[], vec![dependency("weather", &["+fast", "-deprecated"])])],
    );
    let response = h.heartbeat.process(consumer, None).await.unwrap();
    let resolutions = &response.dependencies_resolved[0].resolutions;
    match &resolutions[0] {
        Resolution::Resolved { provider_agent_id, score, .. } => {
            assert_eq!(*provider_agent_id, a.id);
            assert_eq!(*score, 10);
        }
        Resolution::Unresolved { reason, .. } => panic!("expected resolution, got unresolved: {reason}"),
    }
}

/// Scenario 2: two providers pass the required filter, the one with the
/// preferred tag wins.
#[tokio::test]
async fn scenario_preferred_tag_breaks_tie() {
    let h = harness();
    register(&h, payload("agent-c", "default", 9001, vec![capability("weather", "1.0.0", &["api", "fast"], vec![])])).await;
    let d = register(&h, payload("agent-d", "default", 9002, vec![capability("weather", "1.0.0", &["api", "fast", "premium"], vec![])])).await;

    let consumer = payload(
        "agent-e",
        "default",
        9003,
        vec![capability("consumer", "1.0.0", &[], vec![dependency("weather", &["api", "+premium"])])],
    );
    let response = h.heartbeat.process(consumer, None).await.unwrap();
    match &response.dependencies_resolved[0].resolutions[0] {
        Resolution::Resolved { provider_agent_id, score, .. } => {
            assert_eq!(*provider_agent_id, d.id);
            assert_eq!(*score, 10);
        }
        other => panic!("expected resolved, got {other:?}"),
    }
}

/// Scenario 3: equal score, tie-break on capability version.
#[tokio::test]
async fn scenario_version_breaks_score_tie() {
    let h = harness();
    let q = register(&h, payload("agent-q", "default", 9001, vec![capability("weather", "1.1.9", &["api"], vec![])])).await;
    h.clock.advance(chrono::Duration::seconds(1));
    let p = register(&h, payload("agent-p", "default", 9002, vec![capability("weather", "1.2.0", &["api"], vec![])])).await;
    let _ = q;

    let consumer = payload("agent-r", "default", 9003, vec![capability("consumer", "1.0.0", &[], vec![dependency("weather", &["api"])])]);
    let response = h.heartbeat.process(consumer, None).await.unwrap();
    match &response.dependencies_resolved[0].resolutions[0] {
        Resolution::Resolved { provider_agent_id, .. } => assert_eq!(*provider_agent_id, p.id),
        other => panic!("expected resolved, got {other:?}"),
    }
}

/// Scenario 4: excluded tag rejects the only candidate.
#[tokio::test]
async fn scenario_excluded_tag_yields_unresolved() {
    let h = harness();
    register(&h, payload("agent-s", "default", 9001, vec![capability("weather", "1.0.0", &["api", "deprecated"], vec![])])).await;

    let consumer = payload(
        "agent-t",
        "default",
        9002,
        vec![capability("consumer", "1.0.0", &[], vec![dependency("weather", &["api", "-deprecated"])])],
    );
    let response = h.heartbeat.process(consumer, None).await.unwrap();
    match &response.dependencies_resolved[0].resolutions[0] {
        Resolution::Unresolved { reason, .. } => assert!(reason.contains("exclud")),
        other => panic!("expected unresolved, got {other:?}"),
    }
}

/// Scenarios 5 and 6: a liveness sweep degrades a stale agent and a
/// resubmitted dependency no longer resolves to it; a later heartbeat
/// revives it and resolution succeeds again.
#[tokio::test]
async fn scenario_liveness_sweep_affects_resolution() {
    let h = harness();
    let cache: Arc<dyn mesh_registry::CacheStore> = Arc::new(InMemoryCacheStore::new(CacheConfig::default()));
    let provider = register(&h, payload("agent-a", "default", 9001, vec![capability("weather", "1.0.0", &["api"], vec![])])).await;

    let monitor = LivenessMonitor::new(
        h.catalog.clone(),
        cache,
        h.clock.clone() as Arc<dyn mesh_registry::Clock>,
        Duration::from_secs(20),
        Duration::from_secs(60),
    );

    h.clock.advance(chrono::Duration::seconds(25));
    let transitioned = monitor.sweep().await;
    assert_eq!(transitioned, 1);
    let refreshed = h.catalog.get(provider.id).unwrap();
    assert_eq!(refreshed.status, mesh_registry::AgentStatus::Degraded);

    let consumer = payload("agent-u", "default", 9003, vec![capability("consumer", "1.0.0", &[], vec![dependency("weather", &["api"])])]);
    let response = h.heartbeat.process(consumer, None).await.unwrap();
    match &response.dependencies_resolved[0].resolutions[0] {
        Resolution::Unresolved { .. } => {}
        other => panic!("expected unresolved after degrade, got {other:?}"),
    }

    // Provider heartbeats again; it returns to healthy and resolution succeeds.
    h.clock.advance(chrono::Duration::seconds(5));
    h.catalog.heartbeat(provider.id, h.clock.now()).await.unwrap();
    let consumer = payload("agent-v", "default", 9004, vec![capability("consumer", "1.0.0", &[], vec![dependency("weather", &["api"])])]);
    let response = h.heartbeat.process(consumer, None).await.unwrap();
    match &response.dependencies_resolved[0].resolutions[0] {
        Resolution::Resolved { provider_agent_id, .. } => assert_eq!(*provider_agent_id, provider.id),
        other => panic!("expected resolved after revival, got {other:?}"),
    }
}

/// Resubmitting an identical registration payload is idempotent: the
/// response is unchanged and the store gains no new record.
#[tokio::test]
async fn idempotent_resubmission() {
    let h = harness();
    let p = payload("agent-w", "default", 9001, vec![capability("weather", "1.0.0", &["api"], vec![])]);

    let first = h.heartbeat.process(p.clone(), None).await.unwrap();
    let second = h.heartbeat.process(p, None).await.unwrap();

    assert_eq!(first.agent_id, second.agent_id);
    assert_eq!(h.catalog.list(None, None).len(), 1);
}
