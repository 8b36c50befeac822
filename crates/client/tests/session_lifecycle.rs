mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Duration as ChronoDuration;
use tokio::time::Instant;

use idbridge_auth::{AccessDecision, Role, SyncRole};
use idbridge_client::store::{REFRESH_TOKEN_KEY, ROLE_HINT_KEY, SYNCED_KEY, TOKEN_KEY};
use idbridge_client::{
    Backend, BackendError, CancelSignal, FlagStore, MemoryFlagStore, ProviderError, ResolutionError,
    RetryPolicy, SessionError, SessionPhase, SessionSyncGuard, SyncOutcome,
};

use support::{FakeProvider, Harness, ScriptedBackend, wait_until};

fn guard() -> (Arc<ScriptedBackend>, Arc<MemoryFlagStore>, SessionSyncGuard) {
    let backend = Arc::new(ScriptedBackend::new());
    let store = Arc::new(MemoryFlagStore::new());
    let guard = SessionSyncGuard::new(
        backend.clone() as Arc<dyn Backend>,
        store.clone() as Arc<dyn FlagStore>,
        RetryPolicy::default(),
    );
    (backend, store, guard)
}

#[tokio::test(start_paused = true)]
async fn sync_succeeds_on_third_attempt() {
    let (backend, store, guard) = guard();
    backend.script_sync(vec![
        Err(BackendError::new(503, "unavailable")),
        Err(BackendError::transport("connection refused")),
        Ok("user synced".to_string()),
    ]);

    let started = Instant::now();
    let outcome = guard.sync_once(Some("token"), None, &CancelSignal::new()).await;

    assert_eq!(outcome, SyncOutcome::Synced);
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.get(SYNCED_KEY).unwrap().as_deref(), Some("true"));
    assert!(guard.is_synced());
    // 1s after the first failure, 2s after the second.
    assert!(started.elapsed() >= std::time::Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn sync_failure_carries_the_last_error() {
    let (backend, store, guard) = guard();
    backend.script_sync(vec![
        Err(BackendError::new(401, "first")),
        Err(BackendError::new(500, "second")),
        Err(BackendError::new(503, "third")),
    ]);

    let outcome = guard.sync_once(Some("token"), None, &CancelSignal::new()).await;

    assert_eq!(outcome, SyncOutcome::Failed(BackendError::new(503, "third")));
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.get(SYNCED_KEY).unwrap(), None);
    assert!(!guard.is_synced());
}

#[tokio::test]
async fn second_sync_makes_no_network_call() {
    let (backend, _store, guard) = guard();
    let cancel = CancelSignal::new();

    assert_eq!(guard.sync_once(Some("token"), None, &cancel).await, SyncOutcome::Synced);
    assert_eq!(guard.sync_once(Some("token"), None, &cancel).await, SyncOutcome::AlreadySynced);
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sync_without_token_is_skipped() {
    let (backend, _store, guard) = guard();
    let cancel = CancelSignal::new();

    assert_eq!(guard.sync_once(None, None, &cancel).await, SyncOutcome::SkippedNoToken);
    assert_eq!(guard.sync_once(Some(""), None, &cancel).await, SyncOutcome::SkippedNoToken);
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_syncs_collapse_into_one_request() {
    let (backend, _store, guard) = guard();
    let cancel = CancelSignal::new();

    let (a, b) = tokio::join!(
        guard.sync_once(Some("token"), None, &cancel),
        guard.sync_once(Some("token"), None, &cancel),
    );

    let mut outcomes = vec![a, b];
    outcomes.sort_by_key(|o| matches!(o, SyncOutcome::AlreadySynced));
    assert_eq!(outcomes, vec![SyncOutcome::Synced, SyncOutcome::AlreadySynced]);
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_sync_writes_nothing() {
    let (backend, store, guard) = guard();
    backend.script_sync(vec![Err(BackendError::new(500, "boom"))]);
    let cancel = CancelSignal::new();

    let canceller = async {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        cancel.cancel();
    };
    let (outcome, ()) = tokio::join!(guard.sync_once(Some("token"), None, &cancel), canceller);

    assert_eq!(outcome, SyncOutcome::Cancelled);
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.get(SYNCED_KEY).unwrap(), None);
}

#[tokio::test]
async fn login_with_domain_role_skips_sync() {
    let h = Harness::new(FakeProvider::new(&["CLIENT"]));

    let phase = h.manager.login().await.unwrap();

    assert_eq!(phase, SessionPhase::AuthenticatedSynced);
    assert_eq!(h.backend.sync_calls.load(Ordering::SeqCst), 0);
    assert!(h.manager.is_logged_in());
    assert!(h.manager.has_role(Role::Client));
    assert_eq!(h.manager.profile().and_then(|p| p.username).as_deref(), Some("root"));
}

#[tokio::test]
async fn new_principal_is_synced_with_role_hint() {
    let h = Harness::new(FakeProvider::new(&["offline_access"]));
    h.manager.set_role_hint(SyncRole::Contractor).unwrap();

    let phase = h.manager.login().await.unwrap();

    assert_eq!(phase, SessionPhase::AuthenticatedSynced);
    assert_eq!(h.backend.sync_hints(), vec![Some(SyncRole::Contractor)]);
    assert_eq!(h.store.get(ROLE_HINT_KEY).unwrap(), None);
    assert_eq!(h.store.get(SYNCED_KEY).unwrap().as_deref(), Some("true"));
}

#[tokio::test(start_paused = true)]
async fn failed_sync_keeps_the_session_usable() {
    let h = Harness::new(FakeProvider::new(&[]));
    h.backend.script_sync(vec![
        Err(BackendError::new(500, "a")),
        Err(BackendError::new(500, "b")),
        Err(BackendError::new(500, "c")),
    ]);

    let phase = h.manager.login().await.unwrap();

    assert_eq!(phase, SessionPhase::AuthenticatedUnsynced);
    assert!(h.manager.is_logged_in());
    assert_eq!(h.backend.sync_calls.load(Ordering::SeqCst), 3);

    assert_eq!(h.manager.sync().await, SyncOutcome::Synced);
    assert_eq!(h.manager.phase(), SessionPhase::AuthenticatedSynced);
}

#[tokio::test]
async fn expired_token_is_detected_without_io() {
    let h = Harness::new(FakeProvider::signed_in(&["CONTRACTOR"]));
    assert!(h.manager.init().await.unwrap());
    let calls_before = h.backend.sync_calls.load(Ordering::SeqCst) + h.backend.profile_calls();

    h.provider.expire_in(ChronoDuration::seconds(-1));

    assert!(!h.manager.is_logged_in());
    assert!(!h.manager.has_role(Role::Contractor));
    assert!(h.manager.roles().is_empty());
    assert_eq!(h.manager.authorize(&[Role::Contractor]), AccessDecision::LoginRequired);
    assert_eq!(
        h.backend.sync_calls.load(Ordering::SeqCst) + h.backend.profile_calls(),
        calls_before
    );

    assert_eq!(h.manager.refresh_session(), SessionPhase::LoggedOut);
    assert_eq!(h.manager.phase(), SessionPhase::LoggedOut);
}

#[tokio::test]
async fn init_with_expired_provider_token_stays_logged_out() {
    let provider = FakeProvider::signed_in(&["CLIENT"]);
    provider.expire_in(ChronoDuration::seconds(-5));
    let h = Harness::new(provider);

    assert!(!h.manager.init().await.unwrap());
    assert_eq!(h.manager.phase(), SessionPhase::LoggedOut);
}

#[tokio::test]
async fn init_hands_back_persisted_tokens() {
    let store = Arc::new(MemoryFlagStore::new());
    store.set(TOKEN_KEY, "previous-token").unwrap();
    store.set(REFRESH_TOKEN_KEY, "previous-refresh").unwrap();
    let h = Harness::with_store(FakeProvider::signed_in(&["CLIENT"]), store);

    assert!(h.manager.init().await.unwrap());

    let options = h.provider.last_init_options().unwrap();
    assert_eq!(options.token.as_deref(), Some("previous-token"));
    assert_eq!(options.refresh_token.as_deref(), Some("previous-refresh"));
    assert_eq!(h.store.get(TOKEN_KEY).unwrap().as_deref(), Some("access-token"));
}

#[tokio::test]
async fn logout_clears_everything() {
    let h = Harness::new(FakeProvider::new(&[]));
    h.manager.set_role_hint(SyncRole::Client).unwrap();
    h.manager.login().await.unwrap();
    h.manager.resolve().await.unwrap();

    h.manager.logout().await.unwrap();

    assert!(!h.provider.is_authenticated());
    assert_eq!(h.manager.phase(), SessionPhase::LoggedOut);
    assert!(!h.manager.is_logged_in());
    assert!(h.manager.roles().is_empty());
    assert_eq!(h.manager.cached_identity(), None);
    assert_eq!(h.manager.profile(), None);
    for key in [SYNCED_KEY, ROLE_HINT_KEY, TOKEN_KEY, REFRESH_TOKEN_KEY] {
        assert_eq!(h.store.get(key).unwrap(), None, "{key} survived logout");
    }
}

#[tokio::test]
async fn provider_logout_failure_keeps_the_session() {
    let h = Harness::new(FakeProvider::new(&["CLIENT"]));
    h.manager.login().await.unwrap();
    h.provider.fail_next_logout(ProviderError::Logout("provider unreachable".into()));

    let err = h.manager.logout().await.unwrap_err();

    assert!(matches!(err, SessionError::Provider(ProviderError::Logout(_))));
    assert!(h.manager.is_logged_in());
    assert_eq!(h.manager.phase(), SessionPhase::AuthenticatedSynced);
}

#[tokio::test]
async fn provider_login_failure_is_surfaced() {
    let h = Harness::new(FakeProvider::new(&["CLIENT"]));
    h.provider.fail_next_login(ProviderError::Login("user cancelled".into()));

    let err = h.manager.login().await.unwrap_err();

    assert!(matches!(err, SessionError::Provider(ProviderError::Login(_))));
    assert_eq!(h.manager.phase(), SessionPhase::LoggedOut);
    assert!(!h.manager.is_logged_in());
}

#[tokio::test]
async fn authorize_reports_the_missing_role() {
    let h = Harness::new(FakeProvider::new(&["CLIENT"]));
    assert_eq!(h.manager.authorize(&[Role::Client]), AccessDecision::LoginRequired);

    h.manager.login().await.unwrap();

    assert_eq!(h.manager.authorize(&[Role::Client]), AccessDecision::Granted);
    assert_eq!(
        h.manager.authorize(&[Role::Client, Role::Contractor]),
        AccessDecision::Forbidden { missing: Role::Contractor }
    );
}

#[tokio::test(start_paused = true)]
async fn logout_cancels_the_sync_started_by_login() {
    let h = Harness::new(FakeProvider::new(&[]));
    h.backend.script_sync(vec![Err(BackendError::new(500, "down"))]);

    let manager = h.manager.clone();
    let login = tokio::spawn(async move { manager.login().await });
    wait_until(|| h.backend.sync_calls.load(Ordering::SeqCst) == 1).await;

    h.manager.logout().await.unwrap();

    assert_eq!(login.await.unwrap().unwrap(), SessionPhase::LoggedOut);
    // Long past every backoff the retry loop would have waited.
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    assert_eq!(h.backend.sync_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.get(SYNCED_KEY).unwrap(), None);
    assert_eq!(h.manager.phase(), SessionPhase::LoggedOut);
}

#[tokio::test]
async fn logout_during_login_leaves_no_session_behind() {
    let h = Harness::new(FakeProvider::new(&["CLIENT"]));
    h.provider.close_profile_gate();

    let manager = h.manager.clone();
    let login = tokio::spawn(async move { manager.login().await });
    wait_until(|| h.provider.load_profile_calls.load(Ordering::SeqCst) == 1).await;

    h.manager.logout().await.unwrap();
    h.provider.release_profile();

    assert_eq!(login.await.unwrap().unwrap(), SessionPhase::LoggedOut);
    assert_eq!(h.manager.phase(), SessionPhase::LoggedOut);
    assert!(!h.manager.is_logged_in());
    assert_eq!(h.manager.profile(), None);
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(h.manager.resolve().await, Err(ResolutionError::NotAuthenticated));
    assert_eq!(h.backend.profile_calls(), 0);
}
