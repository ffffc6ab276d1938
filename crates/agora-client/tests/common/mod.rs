//! Shared fixtures for client tests.

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use agora_client::{Client, ClientAction, ClientConfig, ClientEvent, Environment, RequestId};
use agora_proto::{ApiRequest, ApiResponse, AuthSession, ChannelEvent, Credentials, Message, UserProfile};
use chrono::{TimeZone, Utc};

/// Virtual clock in milliseconds, zeroed RNG.
#[derive(Clone, Default)]
pub struct TestEnv {
    clock_ms: Arc<AtomicU64>,
}

impl TestEnv {
    pub fn advance(&self, by: Duration) {
        self.clock_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Environment for TestEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        Duration::from_millis(self.clock_ms.load(Ordering::SeqCst))
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0);
    }
}

pub type TestClient = Client<TestEnv>;

pub fn me() -> UserProfile {
    UserProfile::new("u1", "Ada")
}

pub fn message(id: &str, conversation: &str, sender: &str, content: &str) -> Message {
    let receiver = if sender == "u1" { "u2" } else { "u1" };
    Message {
        id: id.into(),
        conversation_id: conversation.into(),
        sender_id: sender.into(),
        receiver_id: receiver.into(),
        content: content.into(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
    }
}

/// Requests issued by `actions`, in order.
pub fn requests(actions: &[ClientAction]) -> Vec<(RequestId, ApiRequest)> {
    actions
        .iter()
        .filter_map(|a| match a {
            ClientAction::Http { request_id, request, .. } => Some((*request_id, request.clone())),
            _ => None,
        })
        .collect()
}

/// Id of the only request issued by `actions`.
pub fn request_id(actions: &[ClientAction]) -> RequestId {
    let issued = requests(actions);
    assert_eq!(issued.len(), 1, "expected one request in {actions:?}");
    issued[0].0
}

pub fn count<F: Fn(&ClientAction) -> bool>(actions: &[ClientAction], pred: F) -> usize {
    actions.iter().filter(|a| pred(a)).count()
}

pub fn respond(client: &mut TestClient, request_id: RequestId, response: ApiResponse) -> Vec<ClientAction> {
    client.handle(ClientEvent::ApiResponse { request_id, result: Ok(response) }).unwrap()
}

pub fn push(client: &mut TestClient, event: &ChannelEvent) -> Vec<ClientAction> {
    client.handle(ClientEvent::FrameReceived(event.encode().unwrap())).unwrap()
}

pub fn new_client(config: ClientConfig) -> (TestClient, TestEnv) {
    let env = TestEnv::default();
    (Client::new(env.clone(), config), env)
}

/// Client logged in as `me()` with the channel Connected.
pub fn logged_in(config: ClientConfig) -> (TestClient, TestEnv) {
    let (mut client, env) = new_client(config);
    let actions = client.handle(ClientEvent::Login(Credentials::new("ada@example.com", "pw"))).unwrap();
    let id = request_id(&actions);
    respond(&mut client, id, ApiResponse::Session(AuthSession { token: "tok".into(), user: me() }));
    client.handle(ClientEvent::ChannelOpened).unwrap();
    (client, env)
}

/// Client logged in with `conversation` loaded and empty.
pub fn in_conversation(conversation: &str) -> (TestClient, TestEnv) {
    let (mut client, env) = logged_in(ClientConfig::default());
    let actions = client.handle(ClientEvent::LoadConversation { conversation_id: conversation.into() }).unwrap();
    let id = request_id(&actions);
    respond(&mut client, id, ApiResponse::Conversation(vec![]));
    (client, env)
}
