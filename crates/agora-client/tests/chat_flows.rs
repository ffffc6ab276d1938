//! Chat and presence caches fed by fetches, sends and pushes.

mod common;

use agora_client::{ChannelState, ClientAction, ClientConfig, ClientError, ClientEvent, Operation};
use agora_core::ConnectionError;
use agora_proto::{ApiError, ApiRequest, ApiResponse, ChannelEvent, MessageDraft, UserId, UserProfile};
use common::{in_conversation, logged_in, message, push, request_id, requests, respond};

fn draft(conversation: &str, content: &str) -> MessageDraft {
    MessageDraft { conversation_id: conversation.into(), receiver_id: "u2".into(), content: content.into() }
}

fn cached_ids(client: &common::TestClient) -> Vec<String> {
    client.conversation().messages().iter().map(|m| m.id.to_string()).collect()
}

#[test]
fn second_load_leaves_only_second_conversation() {
    let (mut client, _env) = logged_in(ClientConfig::default());

    let first = request_id(&client.handle(ClientEvent::LoadConversation { conversation_id: "c1".into() }).unwrap());
    let second = request_id(&client.handle(ClientEvent::LoadConversation { conversation_id: "c2".into() }).unwrap());

    // Second answer first, then the superseded one
    let actions = respond(&mut client, second, ApiResponse::Conversation(vec![message("m3", "c2", "u2", "x")]));
    assert!(matches!(actions.as_slice(), [ClientAction::ConversationLoaded { .. }]));

    let late = respond(&mut client, first, ApiResponse::Conversation(vec![message("m1", "c1", "u2", "y")]));
    assert!(late.is_empty());

    assert_eq!(client.conversation().active().map(ToString::to_string), Some("c2".into()));
    assert_eq!(cached_ids(&client), vec!["m3"]);
}

#[test]
fn load_replaces_cache_wholesale() {
    let (mut client, _env) = in_conversation("c1");
    push(&mut client, &ChannelEvent::NewMessage(message("m9", "c1", "u2", "pushed")));

    let id = request_id(&client.handle(ClientEvent::LoadConversation { conversation_id: "c1".into() }).unwrap());
    respond(
        &mut client,
        id,
        ApiResponse::Conversation(vec![message("m1", "c1", "u2", "a"), message("m2", "c1", "u1", "b")]),
    );

    assert_eq!(cached_ids(&client), vec!["m1", "m2"]);
}

#[test]
fn send_appends_once_and_forwards_over_channel() {
    let (mut client, _env) = in_conversation("c1");

    let actions = client.handle(ClientEvent::SendMessage(draft("c1", "hello"))).unwrap();
    assert!(matches!(requests(&actions).as_slice(), [(_, ApiRequest::SendMessage(_))]));
    // Nothing is inserted before confirmation
    assert!(client.conversation().is_empty());

    let sent = message("m1", "c1", "u1", "hello");
    let actions = respond(&mut client, request_id(&actions), ApiResponse::MessageSent(sent.clone()));
    assert_eq!(
        actions,
        vec![
            ClientAction::MessageAppended(sent.clone()),
            ClientAction::MessageSent(sent.clone()),
            ClientAction::Emit(ChannelEvent::SendMessage(sent.clone())),
        ]
    );
    assert_eq!(client.conversation().len(), 1);

    // Echo of the same message over the channel
    assert!(push(&mut client, &ChannelEvent::NewMessage(sent)).is_empty());
    assert_eq!(client.conversation().len(), 1);
    assert_eq!(client.conversation().messages()[0].content, "hello");
}

#[test]
fn push_before_confirmation_is_not_duplicated() {
    let (mut client, _env) = in_conversation("c1");
    let sent = message("m1", "c1", "u1", "hello");

    let actions = client.handle(ClientEvent::SendMessage(draft("c1", "hello"))).unwrap();
    let id = request_id(&actions);

    assert_eq!(push(&mut client, &ChannelEvent::NewMessage(sent.clone())), vec![ClientAction::MessageAppended(
        sent.clone()
    )]);
    let actions = respond(&mut client, id, ApiResponse::MessageSent(sent.clone()));

    assert!(!actions.contains(&ClientAction::MessageAppended(sent.clone())));
    assert!(actions.contains(&ClientAction::MessageSent(sent)));
    assert_eq!(client.conversation().len(), 1);
}

#[test]
fn failed_send_leaves_cache_unchanged() {
    let (mut client, _env) = in_conversation("c1");
    push(&mut client, &ChannelEvent::NewMessage(message("m1", "c1", "u2", "hi")));

    let actions = client.handle(ClientEvent::SendMessage(draft("c1", "hello"))).unwrap();
    let actions = client
        .handle(ClientEvent::ApiResponse {
            request_id: request_id(&actions),
            result: Err(ApiError::from_response(500, b"db down")),
        })
        .unwrap();

    assert!(matches!(
        actions.as_slice(),
        [ClientAction::OperationFailed { operation: Operation::SendMessage, error: ClientError::Request(_) }]
    ));
    assert_eq!(cached_ids(&client), vec!["m1"]);
}

#[test]
fn send_while_disconnected_fails_and_cache_stays_readable() {
    let (mut client, _env) = in_conversation("c1");
    push(&mut client, &ChannelEvent::NewMessage(message("m1", "c1", "u2", "hi")));

    client.handle(ClientEvent::ChannelClosed { reason: "reset".into() }).unwrap();
    assert_eq!(client.channel_state(), ChannelState::Disconnected);

    let result = client.handle(ClientEvent::SendMessage(draft("c1", "hello")));
    assert_eq!(
        result,
        Err(ClientError::Transport(ConnectionError::NotConnected { state: ChannelState::Disconnected }))
    );
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(cached_ids(&client), vec!["m1"]);
}

#[test]
fn empty_message_is_rejected_locally() {
    let (mut client, _env) = in_conversation("c1");
    assert!(matches!(
        client.handle(ClientEvent::SendMessage(draft("c1", "   "))),
        Err(ClientError::InvalidRequest { .. })
    ));
}

#[test]
fn push_for_other_conversation_counts_as_unread() {
    let (mut client, _env) = in_conversation("c1");

    let actions = push(&mut client, &ChannelEvent::NewMessage(message("m5", "c2", "u3", "psst")));
    assert_eq!(actions, vec![ClientAction::UnreadChanged { conversation_id: "c2".into(), count: 1 }]);
    push(&mut client, &ChannelEvent::NewMessage(message("m6", "c2", "u3", "psst")));
    assert!(client.conversation().is_empty());
    assert_eq!(client.conversation().unread(&"c2".into()), 2);

    let actions = client.handle(ClientEvent::LoadConversation { conversation_id: "c2".into() }).unwrap();
    assert!(actions.contains(&ClientAction::UnreadChanged { conversation_id: "c2".into(), count: 0 }));
    assert_eq!(client.conversation().unread(&"c2".into()), 0);
}

#[test]
fn presence_snapshots_replace_wholesale() {
    let (mut client, _env) = logged_in(ClientConfig::default());
    let ids = |list: &[&str]| list.iter().map(|id| UserId::from(*id)).collect::<Vec<_>>();

    push(&mut client, &ChannelEvent::OnlineUsers(ids(&["A", "B"])));
    let actions = push(&mut client, &ChannelEvent::OnlineUsers(ids(&["C", "B"])));

    assert_eq!(actions, vec![ClientAction::PresenceChanged(ids(&["B", "C"]))]);
    assert_eq!(client.presence().to_vec(), ids(&["B", "C"]));
    assert!(!client.presence().is_online(&"A".into()));

    // Unchanged snapshot is silent
    assert!(push(&mut client, &ChannelEvent::OnlineUsers(ids(&["B", "C"]))).is_empty());
}

#[test]
fn unknown_and_malformed_frames_are_ignored() {
    let (mut client, _env) = in_conversation("c1");

    for frame in [r#"{"event":"typing","data":{}}"#, "not json", r#"{"event":"newMessage","data":42}"#] {
        assert!(client.handle(ClientEvent::FrameReceived(frame.into())).unwrap().is_empty());
    }
    // Inbound forwarding events have no subscriber
    assert!(push(&mut client, &ChannelEvent::SendMessage(message("m1", "c1", "u2", "x"))).is_empty());
    assert!(client.conversation().is_empty());
}

#[test]
fn contacts_refresh_replaces_list() {
    let (mut client, _env) = logged_in(ClientConfig::default());

    for list in [vec![UserProfile::new("u2", "Bo"), UserProfile::new("u3", "Cy")], vec![UserProfile::new("u4", "Di")]] {
        let id = request_id(&client.handle(ClientEvent::RefreshContacts).unwrap());
        let actions = respond(&mut client, id, ApiResponse::Contacts(list.clone()));
        assert_eq!(actions, vec![ClientAction::ContactsRefreshed(list)]);
    }

    assert_eq!(client.contacts().len(), 1);
    assert!(client.contacts().get(&"u4".into()).is_some());
}

#[test]
fn logout_empties_caches() {
    let (mut client, _env) = in_conversation("c1");
    push(&mut client, &ChannelEvent::NewMessage(message("m1", "c1", "u2", "hi")));
    push(&mut client, &ChannelEvent::OnlineUsers(vec!["u2".into()]));

    client.handle(ClientEvent::Logout).unwrap();

    assert!(client.conversation().is_empty());
    assert_eq!(client.conversation().active(), None);
    assert!(client.presence().is_empty());
    assert!(client.contacts().is_empty());
}
