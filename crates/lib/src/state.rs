//! State the add-in holds about its host: target origin, conversation, identity, extension data.
//!
//! Only `init` and `extensionDataChanged` events (plus optimistic extension data writes) mutate it.

use crate::protocol::InitPayload;

#[derive(Debug, Default)]
pub struct StateStore {
    /// Target origin for outbound envelopes. `None` until `init`.
    pub host: Option<String>,
    pub conversation_id: Option<String>,
    /// Raw conversation object as received; `Null` before the first `init` event.
    pub conversation: serde_json::Value,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub extension_id: Option<String>,
    pub extension_data: Option<String>,
    request_counter: u64,
}

impl StateStore {
    /// Overwrite identity and conversation from an `init` event. Last `init` wins; absent fields are cleared.
    pub fn apply_init(&mut self, payload: InitPayload) {
        self.conversation_id = payload.conversation_id;
        self.conversation = payload.conversation;
        self.user_id = payload.user_id;
        self.tenant_id = payload.tenant_id;
        self.extension_id = payload.extension_id;
        self.extension_data = payload.extension_data;
    }

    /// Returns the counter for a new request and advances it.
    pub fn next_request_counter(&mut self) -> u64 {
        let n = self.request_counter;
        self.request_counter += 1;
        n
    }

    #[cfg(test)]
    pub(crate) fn peek_request_counter(&self) -> u64 {
        self.request_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn init_overwrites_everything() {
        let mut s = StateStore {
            tenant_id: Some("old-tenant".into()),
            extension_data: Some("old".into()),
            ..Default::default()
        };
        let payload =
            InitPayload::from_data(&json!({ "conversationId": "c2", "conversation": { "id": "c2" } }));
        s.apply_init(payload);
        assert_eq!(s.conversation_id.as_deref(), Some("c2"));
        assert_eq!(s.conversation, json!({ "id": "c2" }));
        assert_eq!(s.tenant_id, None);
        assert_eq!(s.extension_data, None);
    }

    #[test]
    fn init_keeps_host_and_counter() {
        let mut s = StateStore {
            host: Some("https://host.example".into()),
            ..Default::default()
        };
        s.next_request_counter();
        s.apply_init(InitPayload::default());
        assert_eq!(s.host.as_deref(), Some("https://host.example"));
        assert_eq!(s.peek_request_counter(), 1);
    }

    #[test]
    fn counter_is_monotonic() {
        let mut s = StateStore::default();
        assert_eq!(s.next_request_counter(), 0);
        assert_eq!(s.next_request_counter(), 1);
        assert_eq!(s.next_request_counter(), 2);
        assert_eq!(s.peek_request_counter(), 3);
    }
}
