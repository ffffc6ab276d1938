//! End-to-end scenarios through the production runtime.
//!
//! # Test Strategy
//!
//! Each test drives one or more [`Runtime`]s exactly as a user would, by
//! typing commands, against a shared [`agora_harness::SimServer`]:
//! 1. Inject input lines into the driver
//! 2. Step the runtime until the driver is idle
//! 3. Manipulate the server or the clock (kick channels, revoke tokens)
//! 4. Check the App, the Client caches, and the standard invariants

use std::time::Duration;

use agora_app::{ConnectionState, Runtime};
use agora_client::{ChannelConfig, ClientConfig, ReconnectPolicy};
use agora_harness::{
    ClientSnapshot, InvariantRegistry, SharedSimServer, SimDriver, SimEnv, SimRuntime, SystemSnapshot,
    create_shared_server, run_until_idle,
};
use agora_proto::{MessageDraft, UserId};

const PASSWORD: &str = "secret1";

fn server_with(users: &[(&str, &str)]) -> (SharedSimServer, Vec<UserId>) {
    let server = create_shared_server();
    let ids = {
        let mut guard = server.lock().unwrap();
        users.iter().map(|(email, name)| guard.add_user(email, PASSWORD, name).id).collect()
    };
    (server, ids)
}

fn runtime(server: &SharedSimServer, seed: u64, config: ClientConfig) -> SimRuntime {
    let env = SimEnv::with_seed(seed);
    Runtime::new(SimDriver::new(env.clone(), server.clone()), env, config)
}

fn manual_reconnect() -> ClientConfig {
    ClientConfig {
        channel: ChannelConfig { reconnect: ReconnectPolicy::Manual, ..ChannelConfig::default() },
        ..ClientConfig::default()
    }
}

async fn type_line(runtime: &mut SimRuntime, line: &str) {
    runtime.driver().inject_line(line).unwrap();
    run_until_idle(runtime, 200).await.unwrap();
}

async fn logged_in(server: &SharedSimServer, email: &str, seed: u64, config: ClientConfig) -> SimRuntime {
    let mut runtime = runtime(server, seed, config);
    type_line(&mut runtime, &format!("/login {email} {PASSWORD}")).await;
    runtime
}

fn assert_invariants(runtimes: &[(&str, &SimRuntime)], context: &str) {
    let clients = runtimes.iter().map(|(label, rt)| ClientSnapshot::capture(*label, rt)).collect();
    InvariantRegistry::standard().assert_all(&SystemSnapshot::from_clients(clients), context);
}

#[tokio::test]
async fn login_opens_exactly_one_channel() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada")]);
    let ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;

    assert_eq!(ada.app().user().map(|u| &u.id), Some(&ids[0]));
    assert_eq!(ada.app().connection_state(), ConnectionState::Connected);
    assert_eq!(ada.driver().live_connections(), 1);
    assert!(ada.driver().stored_session().is_some());
    assert!(ada.app().online().contains(&ids[0]));
    assert_invariants(&[("ada", &ada)], "after login");
}

#[tokio::test]
async fn repeated_connect_keeps_one_channel() {
    let (server, _) = server_with(&[("ada@example.com", "Ada")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;

    type_line(&mut ada, "/connect").await;
    type_line(&mut ada, "/connect").await;

    assert_eq!(ada.driver().live_connections(), 1);
    assert_eq!(ada.bridge().client().channel().open_requests(), 1);
    assert_invariants(&[("ada", &ada)], "after repeated connect");
}

#[tokio::test]
async fn wrong_password_leaves_everything_empty() {
    let (server, _) = server_with(&[("ada@example.com", "Ada")]);
    let mut ada = runtime(&server, 1, ClientConfig::default());

    type_line(&mut ada, "/login ada@example.com wrong").await;

    assert!(ada.app().user().is_none());
    assert!(ada.app().status_message().is_some_and(|s| s.contains("authentication failed")));
    assert_eq!(ada.driver().live_connections(), 0);
    assert!(ada.driver().stored_session().is_none());
    assert_invariants(&[("ada", &ada)], "after failed login");
}

#[tokio::test]
async fn message_and_forwarded_echo_show_once() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada"), ("grace@example.com", "Grace")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;
    let mut grace = logged_in(&server, "grace@example.com", 2, ClientConfig::default()).await;

    type_line(&mut ada, &format!("/open c1 {}", ids[1])).await;
    type_line(&mut grace, &format!("/open c1 {}", ids[0])).await;
    type_line(&mut ada, "hello grace").await;
    run_until_idle(&mut grace, 200).await.unwrap();

    let shown = |rt: &SimRuntime| {
        rt.app().conversation().map(|v| v.messages.iter().map(|m| m.content.clone()).collect::<Vec<_>>())
    };
    assert_eq!(shown(&ada), Some(vec!["hello grace".to_owned()]));
    assert_eq!(shown(&grace), Some(vec!["hello grace".to_owned()]));
    assert_invariants(&[("ada", &ada), ("grace", &grace)], "after exchange");
}

#[tokio::test]
async fn message_for_other_conversation_raises_badge() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada"), ("grace@example.com", "Grace")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;
    type_line(&mut ada, &format!("/open c1 {}", ids[1])).await;

    let draft = MessageDraft { conversation_id: "c2".into(), receiver_id: ids[0].clone(), content: "psst".into() };
    server.lock().unwrap().inject_message(&ids[1], &draft);
    run_until_idle(&mut ada, 200).await.unwrap();

    assert_eq!(ada.app().unread(&"c2".into()), 1);
    assert!(ada.app().conversation().is_some_and(|v| v.messages.is_empty()));

    type_line(&mut ada, &format!("/open c2 {}", ids[1])).await;
    assert_eq!(ada.app().unread(&"c2".into()), 0);
    assert!(ada.app().conversation().is_some_and(|v| v.messages.len() == 1 && !v.loading));
    assert_invariants(&[("ada", &ada)], "after switching conversation");
}

#[tokio::test]
async fn presence_tracks_both_users() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada"), ("grace@example.com", "Grace")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;
    let mut grace = logged_in(&server, "grace@example.com", 2, ClientConfig::default()).await;
    run_until_idle(&mut ada, 200).await.unwrap();

    type_line(&mut ada, "/contacts").await;
    let online: Vec<_> = ada.app().contacts().iter().map(|c| (c.profile.id.clone(), c.online)).collect();
    assert_eq!(online, vec![(ids[1].clone(), true)]);

    type_line(&mut grace, "/logout").await;
    run_until_idle(&mut ada, 200).await.unwrap();

    assert!(!ada.app().online().contains(&ids[1]));
    assert_invariants(&[("ada", &ada), ("grace", &grace)], "after grace left");
}

#[tokio::test]
async fn dropped_channel_keeps_cache_and_refuses_sends() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada"), ("grace@example.com", "Grace")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, manual_reconnect()).await;
    type_line(&mut ada, &format!("/open c1 {}", ids[1])).await;
    type_line(&mut ada, "before the drop").await;

    server.lock().unwrap().kick(&ids[0]);
    run_until_idle(&mut ada, 200).await.unwrap();

    assert_eq!(ada.app().connection_state(), ConnectionState::Disconnected);
    assert_eq!(ada.bridge().client().conversation().len(), 1);

    let stored = server.lock().unwrap().messages().len();
    type_line(&mut ada, "into the void").await;
    assert_eq!(server.lock().unwrap().messages().len(), stored);
    assert!(ada.app().status_message().is_some_and(|s| s.contains("not connected")));

    type_line(&mut ada, "/connect").await;
    assert_eq!(ada.app().connection_state(), ConnectionState::Connected);
    assert_eq!(ada.driver().live_connections(), 1);
    assert_invariants(&[("ada", &ada)], "after manual reconnect");
}

#[tokio::test]
async fn dropped_channel_reconnects_after_backoff() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;

    server.lock().unwrap().kick(&ids[0]);
    run_until_idle(&mut ada, 200).await.unwrap();
    assert_eq!(ada.app().connection_state(), ConnectionState::Disconnected);
    assert!(ada.bridge().client().channel().reconnect_pending());

    // First retry lands within 1s +/- 20%
    ada.driver().env().advance(Duration::from_millis(1300));
    assert!(!ada.step().await.unwrap());
    run_until_idle(&mut ada, 200).await.unwrap();

    assert_eq!(ada.app().connection_state(), ConnectionState::Connected);
    assert_eq!(ada.driver().live_connections(), 1);
    assert_invariants(&[("ada", &ada)], "after automatic reconnect");
}

#[tokio::test]
async fn logout_clears_storage_and_caches() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada"), ("grace@example.com", "Grace")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;
    type_line(&mut ada, "/contacts").await;
    type_line(&mut ada, &format!("/open c1 {}", ids[1])).await;
    type_line(&mut ada, "bye").await;

    type_line(&mut ada, "/logout").await;

    assert!(ada.app().user().is_none());
    assert!(ada.driver().stored_session().is_none());
    assert_eq!(ada.driver().live_connections(), 0);
    assert_eq!(ada.bridge().client().pending_requests(), 0);
    assert_invariants(&[("ada", &ada)], "after logout");
}

#[tokio::test]
async fn restart_resumes_stored_session_without_login() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada")]);
    let first = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;
    let store = first.driver().store().clone();
    let stored = first.driver().stored_session().unwrap();
    drop(first);
    server.lock().unwrap().kick(&ids[0]);

    let requests_before = server.lock().unwrap().requests_handled();
    let env = SimEnv::with_seed(9);
    let driver = SimDriver::new(env.clone(), server.clone()).with_store(store);
    let mut second = Runtime::new(driver, env, ClientConfig::default());
    second.restore(stored).await.unwrap();
    run_until_idle(&mut second, 200).await.unwrap();

    assert_eq!(server.lock().unwrap().requests_handled(), requests_before);
    assert_eq!(second.app().user().map(|u| &u.id), Some(&ids[0]));
    assert_eq!(second.app().connection_state(), ConnectionState::Connected);
    assert_invariants(&[("ada", &second)], "after restore");
}

#[tokio::test]
async fn revoked_token_ends_session() {
    let (server, _) = server_with(&[("ada@example.com", "Ada")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;

    server.lock().unwrap().revoke_tokens();
    type_line(&mut ada, "/contacts").await;

    assert!(ada.app().user().is_none());
    assert!(ada.driver().stored_session().is_none());
    assert!(ada.app().status_message().is_some_and(|s| s.contains("refresh contacts failed")));
    assert_invariants(&[("ada", &ada)], "after token revocation");
}

#[tokio::test]
async fn latest_conversation_load_wins() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada"), ("grace@example.com", "Grace")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;
    {
        let mut guard = server.lock().unwrap();
        for (conversation, content) in [("c1", "old"), ("c2", "new")] {
            let draft =
                MessageDraft { conversation_id: conversation.into(), receiver_id: ids[1].clone(), content: content.into() };
            guard.inject_message(&ids[0], &draft);
        }
    }

    ada.driver().hold_responses(true);
    type_line(&mut ada, &format!("/open c1 {}", ids[1])).await;
    type_line(&mut ada, &format!("/open c2 {}", ids[1])).await;
    ada.driver().release_responses();
    run_until_idle(&mut ada, 200).await.unwrap();

    let view = ada.app().conversation().unwrap();
    assert_eq!(view.conversation_id, "c2".into());
    assert_eq!(view.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), vec!["new"]);
    assert_invariants(&[("ada", &ada)], "after racing loads");
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada"), ("grace@example.com", "Grace")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;

    ada.driver().hold_responses(true);
    type_line(&mut ada, "/contacts").await;
    ada.driver().env().advance(Duration::from_secs(15));
    assert!(!ada.step().await.unwrap());

    assert!(ada.app().status_message().is_some_and(|s| s.contains("timed out")));

    ada.driver().release_responses();
    run_until_idle(&mut ada, 200).await.unwrap();
    assert!(ada.app().contacts().iter().all(|c| c.profile.id != ids[1]));
    assert_eq!(ada.bridge().client().contacts().len(), 0);
}

#[tokio::test]
async fn timed_out_history_load_stops_loading() {
    let (server, ids) = server_with(&[("ada@example.com", "Ada"), ("grace@example.com", "Grace")]);
    let mut ada = logged_in(&server, "ada@example.com", 1, ClientConfig::default()).await;
    {
        let draft = MessageDraft { conversation_id: "c1".into(), receiver_id: ids[1].clone(), content: "late".into() };
        server.lock().unwrap().inject_message(&ids[0], &draft);
    }

    ada.driver().hold_responses(true);
    type_line(&mut ada, &format!("/open c1 {}", ids[1])).await;
    assert!(ada.app().conversation().is_some_and(|v| v.loading));

    ada.driver().env().advance(Duration::from_secs(15));
    assert!(!ada.step().await.unwrap());

    assert!(ada.app().conversation().is_some_and(|v| !v.loading && v.messages.is_empty()));
    assert!(ada.app().status_message().is_some_and(|s| s.contains("load conversation failed")));

    ada.driver().release_responses();
    run_until_idle(&mut ada, 200).await.unwrap();
    assert!(ada.app().conversation().is_some_and(|v| !v.loading && v.messages.is_empty()));
    assert_invariants(&[("ada", &ada)], "after history timeout");
}

#[tokio::test]
async fn run_returns_when_user_quits() {
    let (server, _) = server_with(&[("ada@example.com", "Ada")]);
    let env = SimEnv::new();
    let driver = SimDriver::new(env.clone(), server.clone()).with_quit_when_idle();
    let store = driver.store().clone();
    driver.inject_line(&format!("/login ada@example.com {PASSWORD}")).unwrap();

    Runtime::new(driver, env, ClientConfig::default()).run().await.unwrap();

    assert!(agora_client::SessionStore::load(&store).unwrap().is_some());
}
