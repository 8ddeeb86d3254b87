//! Tests for the session directory.

mod common;

use common::{HandFactory, HandMove, HandRules, p};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;
use strictly_session::{
    EngineConfig, GameSession, SessionDirectory, SessionErrorKind, SessionId, SessionPhase,
    SessionStatus,
};

fn directory(max_sessions: Option<usize>) -> SessionDirectory<HandFactory> {
    SessionDirectory::new(HandFactory::default(), EngineConfig::new(32, max_sessions))
        .expect("valid config")
}

fn find(directory: &SessionDirectory<HandFactory>, id: &SessionId) -> GameSession<HandRules> {
    directory
        .lookup(id)
        .expect("directory readable")
        .expect("session exists")
}

fn two_hands() -> Vec<Vec<u32>> {
    vec![vec![1, 2], vec![3, 4]]
}

#[tokio::test]
async fn test_create_and_lookup() {
    let directory = directory(None);
    assert!(directory.is_empty());

    let id = directory.create(two_hands()).expect("create");
    assert_eq!(directory.len(), 1);

    let session = find(&directory, &id);
    assert_eq!(session.id(), &id);
    assert_eq!(session.player_count(), 2);
    assert_eq!(session.status(), SessionStatus::NotStarted);

    assert!(
        directory
            .lookup(&SessionId::from("missing"))
            .expect("lookup")
            .is_none()
    );
}

#[tokio::test]
async fn test_lookup_shares_session_state() {
    let directory = directory(None);
    let id = directory.create(two_hands()).expect("create");

    let first = find(&directory, &id);
    let a = first.register_new_player(None).expect("register");
    let b = first.register_new_player(None).expect("register");
    first.connect(a.player).expect("connect");
    first.connect(b.player).expect("connect");

    let second = find(&directory, &id);
    assert_eq!(second.status(), SessionStatus::Started);
    assert_eq!(second.resolve_token(&a.token).expect("token"), p(1));
}

#[tokio::test]
async fn test_identifiers_are_unique() {
    let directory = directory(None);
    let ids: Vec<_> = (0..20)
        .map(|_| directory.create(two_hands()).expect("create"))
        .collect();
    let listed = directory.list_sessions().expect("list");
    assert_eq!(listed.len(), 20);

    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, listed);
}

#[tokio::test]
async fn test_capacity_limit() {
    let directory = directory(Some(2));
    directory.create(two_hands()).expect("first");
    directory.create(two_hands()).expect("second");

    let err = directory.create(two_hands()).unwrap_err();
    assert_eq!(err.kind(), &SessionErrorKind::DirectoryFull(2));
    assert_eq!(directory.len(), 2);
}

#[tokio::test]
async fn test_rejected_configuration() {
    let directory = directory(None);
    let err = directory.create(vec![vec![1]]).unwrap_err();
    assert!(matches!(err.kind(), SessionErrorKind::RulesRejected(reason) if reason.contains("2 hands")));
    assert!(directory.is_empty());
}

#[tokio::test]
async fn test_remove() {
    let directory = directory(None);
    let id = directory.create(two_hands()).expect("create");

    assert!(directory.remove(&id).expect("remove").is_some());
    assert!(directory.remove(&id).expect("remove").is_none());
    assert!(directory.lookup(&id).expect("lookup").is_none());
}

#[tokio::test]
async fn test_summaries_and_prune() {
    let directory = directory(None);
    let running = directory.create(two_hands()).expect("create");
    let finished = directory.create(vec![vec![1], vec![3]]).expect("create");

    for id in [&running, &finished] {
        let session = find(&directory, id);
        let a = session.register_new_player(None).expect("register");
        let b = session.register_new_player(None).expect("register");
        session.connect(a.player).expect("connect");
        session.connect(b.player).expect("connect");
    }
    find(&directory, &finished)
        .make_move(p(1), HandMove { card: 1 })
        .expect("winning move");

    let summaries = directory.summaries().expect("summaries");
    assert_eq!(summaries.len(), 2);
    let finished_summary = summaries
        .iter()
        .find(|summary| summary.session_id == finished)
        .expect("finished summary");
    assert_eq!(
        finished_summary.phase,
        SessionPhase::Ended { winner: Some(p(1)) }
    );

    assert_eq!(directory.prune_finished().expect("prune"), 1);
    assert_eq!(directory.list_sessions().expect("list"), vec![running]);
}

#[tokio::test(start_paused = true)]
async fn test_factory_time_limit_applies() {
    let directory = SessionDirectory::new(
        HandFactory {
            time_limit: Some(Duration::from_millis(500)),
            ..HandFactory::default()
        },
        EngineConfig::default(),
    )
    .expect("valid config");
    let id = directory.create(two_hands()).expect("create");
    let session = find(&directory, &id);
    let a = session.register_new_player(None).expect("register");
    let b = session.register_new_player(None).expect("register");
    session.connect(a.player).expect("connect");
    session.connect(b.player).expect("connect");

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    session.make_move(p(1), HandMove { card: 1 }).expect("move");
    let think = session.full_state().expect("state").think_times_ms[0];
    assert!(think >= 2_000, "think time {think}");
}

#[test]
fn test_create_outside_runtime() {
    let directory = directory(None);
    let err = directory.create(two_hands()).unwrap_err();
    assert_eq!(err.kind(), &SessionErrorKind::RuntimeUnavailable);
    assert!(directory.is_empty());
}

#[test]
fn test_with_runtime_outside_async_context() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    let directory = SessionDirectory::with_runtime(
        HandFactory::default(),
        EngineConfig::default(),
        runtime.handle().clone(),
    )
    .expect("valid config");
    let id = directory.create(two_hands()).expect("create");
    assert!(directory.lookup(&id).expect("lookup").is_some());
    drop(directory);
}

#[test]
fn test_short_token_length_refused() {
    let err = SessionDirectory::new(HandFactory::default(), EngineConfig::new(4, None)).unwrap_err();
    assert!(
        matches!(err.kind(), SessionErrorKind::InvalidConfig(reason) if reason.contains("token_length"))
    );

    let err = SessionDirectory::new(HandFactory::default(), EngineConfig::new(32, Some(0)))
        .unwrap_err();
    assert!(matches!(err.kind(), SessionErrorKind::InvalidConfig(_)));
}

#[tokio::test]
async fn test_poisoned_map_is_reported() {
    let directory = SessionDirectory::new(
        HandFactory {
            panic_on_build: true,
            ..HandFactory::default()
        },
        EngineConfig::default(),
    )
    .expect("valid config");

    let outcome = catch_unwind(AssertUnwindSafe(|| directory.create(two_hands())));
    assert!(outcome.is_err());

    let err = directory.lookup(&SessionId::from("any")).unwrap_err();
    assert_eq!(err.kind(), &SessionErrorKind::Poisoned);
    assert!(directory.list_sessions().is_err());
}
