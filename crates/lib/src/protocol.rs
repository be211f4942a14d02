//! Wire types shared by the add-in and its host: the envelope, event names, and payloads.

use serde::{Deserialize, Serialize};

/// Inbound: host hands the add-in its conversation and identity.
pub const EVENT_INIT: &str = "init";
pub const EVENT_CONVERSATION_ACCEPTED: &str = "conversationAccepted";
pub const EVENT_MESSAGE_ADDED: &str = "messageAdded";
pub const EVENT_MESSAGE_RECEIVED: &str = "messageReceived";
pub const EVENT_COLLABORATION_MESSAGE_RECEIVED: &str = "collaborationMessageReceived";
pub const EVENT_CONVERSATION_STATUS_CHANGED: &str = "conversationStatusChanged";
/// Inbound: extension data was changed on the host side.
pub const EVENT_EXTENSION_DATA_CHANGED: &str = "extensionDataChanged";

pub const ACTION_PREPARE_MESSAGE: &str = "prepareMessage";
pub const ACTION_SEND_ON_CLOSE: &str = "sendOnClose";
pub const ACTION_UPDATE_CONTACT_DISPLAY_NAME: &str = "updateContactDisplayName";
pub const REQUEST_SET_EXTENSION_DATA: &str = "setExtensionData";
pub const REQUEST_FETCH_USERS: &str = "fetchUsers";

/// Wire envelope, both directions: `{ "eventType", "data" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// Event name the host uses to answer request `counter` of `request_type` successfully.
pub fn success_event(request_type: &str, counter: u64) -> String {
    format!("{}.success{}", request_type, counter)
}

/// Event name the host uses to reject request `counter` of `request_type`.
pub fn error_event(request_type: &str, counter: u64) -> String {
    format!("{}.error{}", request_type, counter)
}

/// Fields of the `init` event. Read without schema checks: a field that is missing, or a payload
/// that is not an object, yields `None` / `Null` and clears the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitPayload {
    pub conversation_id: Option<String>,
    pub conversation: serde_json::Value,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub extension_id: Option<String>,
    pub extension_data: Option<String>,
}

impl InitPayload {
    pub fn from_data(data: &serde_json::Value) -> Self {
        Self {
            conversation_id: opaque_field(data, "conversationId"),
            conversation: data.get("conversation").cloned().unwrap_or_default(),
            user_id: opaque_field(data, "userId"),
            tenant_id: opaque_field(data, "tenantId"),
            extension_id: opaque_field(data, "extensionId"),
            extension_data: opaque_field(data, "extensionData"),
        }
    }
}

/// New extension data carried by `extensionDataChanged` (its `data` field).
pub fn changed_extension_data(data: &serde_json::Value) -> Option<String> {
    opaque_field(data, "data")
}

/// `data[key]` as an opaque string: strings verbatim, null or absent as None, anything else as
/// its JSON text.
fn opaque_field(data: &serde_json::Value, key: &str) -> Option<String> {
    data.get(key).cloned().and_then(value_to_opaque_string)
}

fn value_to_opaque_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// How prepared text is combined with what the agent has already typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepareMethod {
    Replace,
    Append,
    Prepend,
}

impl std::str::FromStr for PrepareMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            "prepend" => Ok(Self::Prepend),
            other => Err(format!("unknown prepare method: {}", other)),
        }
    }
}

/// Data for `prepareMessage`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareMessageParams<'a> {
    pub conversation_id: Option<&'a str>,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<PrepareMethod>,
}

/// Data for `sendOnClose`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOnCloseParams<'a> {
    pub conversation_id: Option<&'a str>,
    pub message: &'a str,
}

/// Data for `updateContactDisplayName`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactParams<'a> {
    pub conversation_id: Option<&'a str>,
    pub contact: &'a ContactName,
}

/// Data for every correlated request (`setExtensionData`, `fetchUsers`, ...).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    pub request_counter: u64,
    pub conversation_id: Option<String>,
    pub extension_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Display name sent with `updateContactDisplayName`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ContactName {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
        }
    }
}

/// Typed view of the conversation the host passes in `init`. The bridge itself stores the raw value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub facebook_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub author: String,
    /// Unix ms.
    pub timestamp: i64,
    pub source_platform: String,
    pub from_customer: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_uses_event_type_key() {
        let env = Envelope::new("prepareMessage", json!({ "message": "hi" }));
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v, json!({ "eventType": "prepareMessage", "data": { "message": "hi" } }));
    }

    #[test]
    fn envelope_without_data_is_null() {
        let env: Envelope = serde_json::from_str(r#"{"eventType":"fetchUsers.success0"}"#).unwrap();
        assert_eq!(env.event_type, "fetchUsers.success0");
        assert!(env.data.is_null());
    }

    #[test]
    fn synthesized_names() {
        assert_eq!(success_event("setExtensionData", 0), "setExtensionData.success0");
        assert_eq!(error_event("fetchUsers", 12), "fetchUsers.error12");
    }

    #[test]
    fn init_payload_keeps_extension_data_verbatim() {
        let p = InitPayload::from_data(&json!({
            "conversationId": "c1",
            "userId": "u1",
            "extensionData": "{\"favCookie\":\"chocolate chip\"}",
        }));
        assert_eq!(p.conversation_id.as_deref(), Some("c1"));
        assert_eq!(p.tenant_id, None);
        assert_eq!(p.extension_data.as_deref(), Some(r#"{"favCookie":"chocolate chip"}"#));
        assert!(p.conversation.is_null());
    }

    #[test]
    fn non_string_ids_are_kept_as_json_text() {
        let p = InitPayload::from_data(&json!({ "userId": 42, "extensionData": null }));
        assert_eq!(p.user_id.as_deref(), Some("42"));
        assert_eq!(p.extension_data, None);
    }

    #[test]
    fn non_object_init_payload_clears_every_field() {
        assert_eq!(InitPayload::from_data(&json!("oops")), InitPayload::default());
        assert_eq!(InitPayload::from_data(&json!(null)), InitPayload::default());
    }

    #[test]
    fn changed_extension_data_reads_data_field_only() {
        assert_eq!(changed_extension_data(&json!({ "data": "new" })).as_deref(), Some("new"));
        assert_eq!(changed_extension_data(&json!({ "extensionId": "e1" })), None);
        assert_eq!(changed_extension_data(&json!("new")), None);
    }

    #[test]
    fn prepare_params_omit_missing_method() {
        let v = serde_json::to_value(PrepareMessageParams {
            conversation_id: Some("c1"),
            message: "hello",
            method: None,
        })
        .unwrap();
        assert_eq!(v, json!({ "conversationId": "c1", "message": "hello" }));
    }

    #[test]
    fn prepare_method_parses_case_insensitively() {
        assert_eq!("Append".parse::<PrepareMethod>(), Ok(PrepareMethod::Append));
        assert!("merge".parse::<PrepareMethod>().is_err());
    }

    #[test]
    fn conversation_typed_view() {
        let c: Conversation = serde_json::from_value(json!({
            "id": "c1",
            "owner": "u1",
            "status": "active",
            "contact": { "firstName": "Lauren", "lastName": "Ipsum", "facebookId": null },
            "messages": [{
                "id": "m1", "text": "Marco", "author": "+14065551234",
                "timestamp": 1234567, "sourcePlatform": "SMS", "fromCustomer": true
            }],
            "metrics": { "startTime": 1234567, "endTime": null }
        }))
        .unwrap();
        assert_eq!(c.messages.len(), 1);
        assert!(c.messages[0].from_customer);
        assert_eq!(c.contact.and_then(|c| c.first_name).as_deref(), Some("Lauren"));
        assert_eq!(c.metrics.and_then(|m| m.end_time), None);
    }
}
