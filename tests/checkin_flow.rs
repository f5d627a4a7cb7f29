//! Check-in orchestration: revision bookkeeping, atomic content+metadata
//! publication, and history retrieval.

mod support;

use git2::Repository;
use pdm::revision::RevisionKind;
use support::{mcam_bytes, TestEnv, SEED_MCAM, SEED_VNC};

#[test]
fn first_checkin_without_metadata_yields_zero_one() {
    let env = TestEnv::new().unwrap();
    let store = env.store("wc-first");

    let revision = store
        .checkin(
            SEED_MCAM,
            &mcam_bytes("v1"),
            "initial tweak",
            RevisionKind::Minor,
            "alice",
            None,
        )
        .unwrap();

    assert_eq!(revision.to_string(), "0.1");
    assert!(env.remote_head_message().starts_with("REV 0.1: initial tweak"));
}

#[test]
fn content_and_metadata_land_in_one_commit() {
    let env = TestEnv::new().unwrap();
    let store = env.store("wc-atomic");

    store
        .checkin(
            SEED_MCAM,
            &mcam_bytes("v1"),
            "tweak",
            RevisionKind::Minor,
            "alice",
            None,
        )
        .unwrap();

    // The head commit must touch both the artifact and its side-car.
    let remote = Repository::open(env.remote_path()).unwrap();
    let head = remote.find_commit(env.remote_head()).unwrap();
    let parent = head.parent(0).unwrap();
    let diff = remote
        .diff_tree_to_tree(Some(&parent.tree().unwrap()), Some(&head.tree().unwrap()), None)
        .unwrap();

    let changed: Vec<String> = diff
        .deltas()
        .filter_map(|d| d.new_file().path().map(|p| p.display().to_string()))
        .collect();
    assert!(changed.contains(&SEED_MCAM.to_string()));
    assert!(changed.contains(&"1234567.mcam.meta.json".to_string()));
    assert_eq!(changed.len(), 2);

    let meta = env.remote_blob("1234567.mcam.meta.json").unwrap();
    let meta: serde_json::Value = serde_json::from_slice(&meta).unwrap();
    assert_eq!(meta["revision"], "0.1");
    assert_eq!(meta["author"], "alice");
}

#[test]
fn revision_sequence_across_checkins() {
    let env = TestEnv::new().unwrap();
    let store = env.store("wc-sequence");

    let r1 = store
        .checkin(SEED_MCAM, &mcam_bytes("a"), "one", RevisionKind::Minor, "alice", None)
        .unwrap();
    let r2 = store
        .checkin(SEED_MCAM, &mcam_bytes("b"), "two", RevisionKind::Minor, "alice", None)
        .unwrap();
    let r3 = store
        .checkin(SEED_MCAM, &mcam_bytes("c"), "three", RevisionKind::Major, "alice", None)
        .unwrap();
    let r4 = store
        .checkin(SEED_MCAM, &mcam_bytes("d"), "four", RevisionKind::Major, "alice", Some("5"))
        .unwrap();

    assert_eq!(r1.to_string(), "0.1");
    assert_eq!(r2.to_string(), "0.2");
    assert_eq!(r3.to_string(), "1.0");
    assert_eq!(r4.to_string(), "5.0");
}

#[test]
fn seeded_metadata_feeds_the_increment() {
    let env = TestEnv::new().unwrap();
    let store = env.store("wc-seeded-meta");

    // SEED_VNC carries revision 2.3 from the fixture.
    let revision = store
        .checkin(SEED_VNC, b"new vnc", "bump", RevisionKind::Minor, "bob", None)
        .unwrap();
    assert_eq!(revision.to_string(), "2.4");

    let meta = store.load_meta(SEED_VNC).unwrap();
    assert_eq!(meta.revision, "2.4");
    assert_eq!(meta.author, "bob");
    // Description survives the check-in untouched.
    assert_eq!(meta.description, "Fixture part");
}

#[test]
fn file_history_pairs_commits_with_recorded_revisions() {
    let env = TestEnv::new().unwrap();
    let store = env.store("wc-history");

    store
        .checkin(SEED_MCAM, &mcam_bytes("a"), "one", RevisionKind::Minor, "alice", None)
        .unwrap();
    store
        .checkin(SEED_MCAM, &mcam_bytes("b"), "two", RevisionKind::Minor, "bob", None)
        .unwrap();

    let history = store.file_history(SEED_MCAM, 10).unwrap();
    assert!(history.len() >= 3); // two check-ins plus the seed commit

    // Newest first, each paired with the revision recorded at that point.
    assert_eq!(history[0].revision.as_deref(), Some("0.2"));
    assert_eq!(history[0].author, "bob");
    assert_eq!(history[1].revision.as_deref(), Some("0.1"));
    assert_eq!(history[1].author, "alice");
    // The seed commit predates any metadata.
    assert_eq!(history.last().unwrap().revision, None);
}

#[test]
fn content_at_commit_resolves_historical_bytes() {
    let env = TestEnv::new().unwrap();
    let store = env.store("wc-at-commit");

    store
        .checkin(SEED_MCAM, &mcam_bytes("a"), "one", RevisionKind::Minor, "alice", None)
        .unwrap();
    let history = store.file_history(SEED_MCAM, 10).unwrap();
    let latest = &history[0].commit_id;

    assert_eq!(
        store.content_at_commit(SEED_MCAM, latest).unwrap(),
        mcam_bytes("a")
    );

    let err = store
        .content_at_commit("not-tracked.mcam", latest)
        .unwrap_err();
    assert!(matches!(err, pdm::Error::NotFound(_)));

    let err = store
        .content_at_commit(SEED_MCAM, "0000000000000000000000000000000000000000")
        .unwrap_err();
    assert!(matches!(err, pdm::Error::NotFound(_)));
}

#[test]
fn recent_commits_reports_activity() {
    let env = TestEnv::new().unwrap();
    let store = env.store("wc-activity");

    store
        .checkin(SEED_MCAM, &mcam_bytes("a"), "one", RevisionKind::Minor, "alice", None)
        .unwrap();

    let commits = store.recent_commits(5).unwrap();
    assert!(!commits.is_empty());
    assert!(commits[0].message.starts_with("REV 0.1: one"));
    assert!(commits[0].files.contains(&SEED_MCAM.to_string()));
}
