//! Fuzz target for HTTP response decoding
//!
//! Bodies are decoded against the request that produced them, and error
//! bodies are mapped by status. Neither path may panic.

#![no_main]

use agora_proto::{ApiError, ApiRequest, ConversationId, Credentials, ProfileUpdate};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum RequestKind {
    Login,
    Logout,
    UpdateProfile,
    ListContacts,
    FetchConversation,
}

#[derive(Debug, Arbitrary)]
struct Input {
    kind: RequestKind,
    status: u16,
    body: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let request = match input.kind {
        RequestKind::Login => ApiRequest::Login(Credentials::new("fuzz@example.com", "secret")),
        RequestKind::Logout => ApiRequest::Logout,
        RequestKind::UpdateProfile => ApiRequest::UpdateProfile(ProfileUpdate::default()),
        RequestKind::ListContacts => ApiRequest::ListContacts,
        RequestKind::FetchConversation => {
            ApiRequest::FetchConversation { conversation_id: ConversationId::from("c1") }
        },
    };

    let _ = request.decode_response(&input.body);

    let error = ApiError::from_response(input.status, &input.body);
    if error.is_unauthorized() {
        assert!(input.status == 401 || input.status == 403);
    }
});
