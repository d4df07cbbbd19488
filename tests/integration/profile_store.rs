//! Store persistence, migration and selection tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use rdeck::connection::Target;
use rdeck::model::{ActionKind, Button, Device, Os, Profile};
use rdeck::store::mock::MockAgent;
use rdeck::store::{
    DEVICES_KEY, KvStore, MemoryKv, NewDevice, ProfileSource, ProfileStore, SqliteKv, StoreOptions,
};

use crate::common::fixtures::{device, hotkey, press, profile, sample_devices};
use crate::common::init_test_logging;

fn options() -> StoreOptions {
    StoreOptions {
        fetch_timeout: Duration::from_millis(500),
        ..StoreOptions::default()
    }
}

fn seeded_kv(devices: &[Device]) -> MemoryKv {
    let kv = MemoryKv::new();
    kv.put_raw(DEVICES_KEY, &serde_json::to_string(devices).unwrap());
    kv
}

fn store(kv: impl KvStore + 'static, agent: &MockAgent) -> ProfileStore {
    ProfileStore::new(kv, Arc::new(agent.clone()), options())
}

fn new_device(name: &str) -> NewDevice {
    NewDevice {
        name: name.to_string(),
        host: "10.0.0.9".to_string(),
        port: None,
        os: Os::Linux,
        theme_color: None,
    }
}

#[tokio::test]
async fn sqlite_round_trip_preserves_the_device_graph() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("rdeck.db");
    let agent = MockAgent::new();

    let mut devices = sample_devices();
    devices[0].theme_color = Some("#3b82f6".to_string());
    devices[0].profiles[0].buttons[0].background_color = Some("#111111".to_string());
    devices[1].profiles[0] = devices[1].profiles[0].clone().with_grid(2, 4);
    {
        let kv = SqliteKv::open(&path).unwrap();
        kv.set(DEVICES_KEY, &serde_json::to_string(&devices).unwrap()).unwrap();
    }

    let mut first = store(SqliteKv::open(&path).unwrap(), &agent);
    let report = first.load().await;
    assert!(!report.seeded);
    assert_eq!(first.devices().as_ref(), &devices);

    let id = first
        .add_device(new_device("Studio"), ProfileSource::Template("builtin_mac".into()))
        .unwrap();
    let expected = first.devices();
    drop(first);

    let mut second = store(SqliteKv::open(&path).unwrap(), &agent);
    let report = second.load().await;
    assert!(!report.seeded);
    assert!(agent.fetches().is_empty());
    assert_eq!(second.devices(), expected);
    assert_eq!(second.device(&id).unwrap().profiles.len(), 3);
}

#[tokio::test]
async fn empty_storage_is_seeded_and_saved() {
    init_test_logging();
    let kv = MemoryKv::new();
    let agent = MockAgent::new();
    let mut store = store(kv.clone(), &agent);

    let report = store.load().await;
    assert!(report.seeded);
    assert_eq!(store.devices().len(), 1);
    assert_eq!(store.active_device().map(|d| d.id.as_str()), Some("device_default"));
    assert!(kv.raw(DEVICES_KEY).is_some());
    // Built-ins are always offered.
    assert!(store.templates().iter().filter(|t| t.is_builtin()).count() >= 3);
}

#[tokio::test(start_paused = true)]
async fn migration_adopts_agent_profiles_and_tolerates_failures() {
    init_test_logging();
    let devices = vec![
        device("served", "10.0.0.1", 8002, Os::Windows, vec![]),
        device("hanging", "10.0.0.2", 8002, Os::Mac, vec![]),
        device("refused", "10.0.0.3", 8002, Os::Linux, vec![]),
        device("populated", "10.0.0.4", 8002, Os::Linux, vec![profile("keep", vec![])]),
    ];
    let remote_profiles = vec![
        profile("r1", vec![hotkey("copy", &["ctrl", "c"])]),
        profile("r2", vec![]).with_grid(4, 5),
    ];
    let agent = MockAgent::new();
    agent.serve(Target::new("10.0.0.1", 8002), remote_profiles.clone());
    agent.hang(Target::new("10.0.0.2", 8002));

    let kv = seeded_kv(&devices);
    let mut store = store(kv.clone(), &agent);
    let report = store.load().await;

    assert_eq!(report.migrated, vec!["served".to_string()]);
    let mut failed = report.migration_failed.clone();
    failed.sort();
    assert_eq!(failed, vec!["hanging".to_string(), "refused".to_string()]);
    assert_eq!(agent.fetches().len(), 3, "populated devices are not fetched");

    assert_eq!(store.device("served").unwrap().profiles, remote_profiles);
    assert!(store.device("hanging").unwrap().profiles.is_empty());
    assert!(store.device("refused").unwrap().profiles.is_empty());
    assert_eq!(store.device("populated").unwrap().profiles.len(), 1);

    // The adopted profiles were persisted, so the next load does not refetch them.
    let mut reloaded = ProfileStore::new(kv, Arc::new(agent.clone()), options());
    let report = reloaded.load().await;
    assert!(report.migrated.is_empty());
    assert_eq!(reloaded.device("served").unwrap().profiles, remote_profiles);
    assert!(
        !agent
            .fetches()
            .iter()
            .skip(3)
            .any(|t| *t == Target::new("10.0.0.1", 8002))
    );
}

#[tokio::test]
async fn removing_the_active_profile_falls_back_to_the_first() {
    init_test_logging();
    let agent = MockAgent::new();
    let mut store = store(seeded_kv(&sample_devices()), &agent);
    store.load().await;

    store.select_device("dev_a").unwrap();
    store.select_profile("a_media").unwrap();
    assert_eq!(store.active_profile().map(|p| p.id.as_str()), Some("a_media"));

    let remaining = vec![profile("x_first", vec![]), profile("a_main", vec![])];
    store.update_profiles("dev_a", &remaining).unwrap();
    assert_eq!(store.selection().profile_id.as_deref(), Some("x_first"));

    store.update_profiles("dev_a", &[]).unwrap();
    assert_eq!(store.selection().device_id.as_deref(), Some("dev_a"));
    assert_eq!(store.selection().profile_id, None);
    assert!(store.active_profile().is_none());
}

#[tokio::test]
async fn surviving_active_profile_stays_selected() {
    init_test_logging();
    let agent = MockAgent::new();
    let mut store = store(seeded_kv(&sample_devices()), &agent);
    store.load().await;

    store.select_profile("a_media").unwrap();
    let mut edited = store.device("dev_a").unwrap().profiles.clone();
    edited.reverse();
    edited.push(profile("a_extra", vec![]));
    store.update_profiles("dev_a", &edited).unwrap();

    assert_eq!(store.selection().profile_id.as_deref(), Some("a_media"));
}

#[tokio::test]
async fn template_copies_are_isolated_from_their_source() {
    init_test_logging();
    let agent = MockAgent::new();
    let mut store = store(seeded_kv(&sample_devices()), &agent);
    store.load().await;
    let original = store.template("builtin_windows").unwrap().clone();

    let id = store
        .add_device(new_device("Desk"), ProfileSource::Template("builtin_windows".into()))
        .unwrap();
    let mut profiles = store.device(&id).unwrap().profiles.clone();
    profiles[0].buttons[0].label = "Changed".to_string();
    profiles[0].buttons[0].params = vec!["f13".to_string()];
    profiles[0].buttons.push(press("extra", "f14"));
    store.update_profiles(&id, &profiles).unwrap();

    assert_eq!(store.template("builtin_windows").unwrap(), &original);
    assert_eq!(store.device(&id).unwrap().profiles[0].buttons[0].label, "Changed");
}

#[tokio::test]
async fn cloned_device_is_isolated_from_the_active_device() {
    init_test_logging();
    let agent = MockAgent::new();
    let mut store = store(seeded_kv(&sample_devices()), &agent);
    store.load().await;
    store.select_device("dev_b").unwrap();
    let source = store.device("dev_b").unwrap().clone();

    let id = store.add_device(new_device("Twin"), ProfileSource::CloneActive).unwrap();
    assert_eq!(store.device(&id).unwrap().profiles, source.profiles);

    let mut profiles = store.device(&id).unwrap().profiles.clone();
    profiles[0].buttons.clear();
    store.update_profiles(&id, &profiles).unwrap();

    assert_eq!(store.device("dev_b").unwrap(), &source);
}

#[tokio::test]
async fn saved_templates_snapshot_and_persist() {
    init_test_logging();
    let agent = MockAgent::new();
    let kv = seeded_kv(&sample_devices());
    let mut store = store(kv.clone(), &agent);
    store.load().await;

    let template_id = store.save_as_template("dev_a", "  Office  ").unwrap();
    let template = store.template(&template_id).unwrap().clone();
    assert_eq!(template.name, "Office");
    assert_eq!(template.os, Os::Windows);
    assert!(!template.is_builtin());

    let mut profiles = store.device("dev_a").unwrap().profiles.clone();
    profiles[0].buttons.clear();
    store.update_profiles("dev_a", &profiles).unwrap();
    assert_eq!(store.template(&template_id).unwrap(), &template);

    let mut reloaded = ProfileStore::new(kv, Arc::new(agent.clone()), options());
    reloaded.load().await;
    assert_eq!(reloaded.template(&template_id), Some(&template));
}

#[tokio::test]
async fn stores_do_not_share_selection() {
    init_test_logging();
    let agent = MockAgent::new();
    let kv = seeded_kv(&sample_devices());
    let mut left = store(kv.clone(), &agent);
    let mut right = store(kv, &agent);
    left.load().await;
    right.load().await;

    left.select_device("dev_b").unwrap();
    assert_eq!(left.active_device().map(|d| d.id.as_str()), Some("dev_b"));
    assert_eq!(right.active_device().map(|d| d.id.as_str()), Some("dev_a"));
}

#[tokio::test]
async fn local_edit_survives_unreachable_agent() {
    init_test_logging();
    let agent = MockAgent::new();
    agent.fail_pushes(true);
    let kv = seeded_kv(&sample_devices());
    let mut store = store(kv.clone(), &agent);
    store.load().await;

    let edited = vec![Profile::new(
        "solo",
        "Solo",
        vec![Button::new("b", "B", "square", ActionKind::Type, vec!["hi".into()])],
    )];
    store.update_profiles("dev_b", &edited).unwrap();
    assert!(store.settle(Duration::from_secs(1)).await);

    assert_eq!(agent.pushes().len(), 1);
    assert_eq!(agent.pushes()[0].0, Target::new("10.0.0.2", 9000));
    assert_eq!(store.device("dev_b").unwrap().profiles, edited);
    let stored: Vec<Device> = serde_json::from_str(&kv.raw(DEVICES_KEY).unwrap()).unwrap();
    assert_eq!(stored[1].profiles, edited);
}

#[tokio::test]
async fn sync_device_reports_push_failures() {
    init_test_logging();
    let agent = MockAgent::new();
    let mut store = store(seeded_kv(&sample_devices()), &agent);
    store.load().await;

    store.sync_device("dev_a").await.unwrap();
    assert_eq!(agent.pushes()[0].1, store.device("dev_a").unwrap().profiles);

    agent.fail_pushes(true);
    assert!(store.sync_device("dev_a").await.is_err());
    assert!(store.sync_device("missing").await.is_err());
}

#[tokio::test]
async fn transient_read_failure_leaves_stored_devices_intact() {
    init_test_logging();
    let agent = MockAgent::new();
    let mine = vec![device("device_mine", "10.0.0.5", 8002, Os::Linux, vec![])];
    let kv = seeded_kv(&mine);
    kv.fail_reads(true);

    let mut first = store(kv.clone(), &agent);
    let report = first.load().await;
    assert!(report.storage_unreadable);
    assert!(!report.seeded);
    assert_eq!(first.devices()[0].id, "device_default");

    first.add_device(new_device("Scratch"), ProfileSource::Empty).unwrap();
    first.save_as_template("device_default", "Scratch").unwrap();
    drop(first);

    kv.fail_reads(false);
    let stored: Vec<Device> = serde_json::from_str(&kv.raw(DEVICES_KEY).unwrap()).unwrap();
    assert_eq!(stored, mine);
    assert!(kv.raw(rdeck::store::TEMPLATES_KEY).is_none());

    let mut second = store(kv, &agent);
    let report = second.load().await;
    assert!(!report.storage_unreadable);
    assert_eq!(second.devices().as_ref(), &mine);
}

#[tokio::test(start_paused = true)]
async fn background_pushes_reach_the_agent_in_edit_order() {
    init_test_logging();
    let agent = MockAgent::new();
    agent.delay_pushes([Duration::from_millis(200), Duration::from_millis(10)]);
    let mut store = store(seeded_kv(&sample_devices()), &agent);
    store.load().await;

    store.update_profiles("dev_a", &[profile("old", vec![])]).unwrap();
    store.update_profiles("dev_a", &[profile("new", vec![])]).unwrap();
    assert!(store.settle(Duration::from_secs(5)).await);

    let local = &store.device("dev_a").unwrap().profiles;
    let held = agent.held(&Target::new("10.0.0.1", 8002)).unwrap();
    assert_eq!(held, *local);
    assert_eq!(held[0].id, "new");
    let order: Vec<_> = agent.pushes().iter().map(|(_, p)| p[0].id.clone()).collect();
    assert_eq!(order, ["old", "new"]);
}
