use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminator carried in the `type` field of every Direct Line activity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Message,
    Event,
    Typing,
    ConversationUpdate,
    Other(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::Message => "message",
            ActivityKind::Event => "event",
            ActivityKind::Typing => "typing",
            ActivityKind::ConversationUpdate => "conversationUpdate",
            ActivityKind::Other(other) => other,
        }
    }
}

impl From<String> for ActivityKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "message" => ActivityKind::Message,
            "event" => ActivityKind::Event,
            "typing" => ActivityKind::Typing,
            "conversationUpdate" => ActivityKind::ConversationUpdate,
            _ => ActivityKind::Other(value),
        }
    }
}

impl From<&str> for ActivityKind {
    fn from(value: &str) -> Self {
        ActivityKind::from(value.to_string())
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Bot,
    User,
    Channel,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Bot => "bot",
            Role::User => "user",
            Role::Channel => "channel",
            Role::Other(other) => other,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "bot" => Role::Bot,
            "user" => Role::User,
            "channel" => Role::Channel,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

/// Sender of an activity. Channels may omit `role`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl ChannelAccount {
    pub fn new(role: Role) -> Self {
        Self {
            id: None,
            name: None,
            role: Some(role),
        }
    }

    pub fn user() -> Self {
        Self::new(Role::User)
    }

    pub fn bot(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
            role: Some(Role::Bot),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuggestedActions {
    pub actions: Vec<CardAction>,
}

/// Direct Line activity: the envelope for every message, event, typing
/// indicator and conversation update exchanged with the agent.
///
/// Optional fields stay `None` when the wire omits them and are omitted again
/// on serialization. Fields this type does not model are kept in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub from: ChannelAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<SuggestedActions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    pub fn new(kind: impl Into<ActivityKind>, from: ChannelAccount) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            value: None,
            text: None,
            from,
            id: None,
            timestamp: None,
            channel_data: None,
            attachments: None,
            suggested_actions: None,
            extra: Map::new(),
        }
    }

    /// Named user event, the shape produced by `send_event`.
    pub fn user_event(name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value,
            ..Self::new(ActivityKind::Event, ChannelAccount::user())
        }
    }
}

/// Caller-supplied subset of an activity.
///
/// Absent fields are filled when the activity is posted: the sender becomes
/// `{ role: "user" }` and the kind becomes `message`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialActivity {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActivityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<SuggestedActions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PartialActivity {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            kind: Some(ActivityKind::Message),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<ActivityKind>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_channel_data(mut self, channel_data: Map<String, Value>) -> Self {
        self.channel_data = Some(channel_data);
        self
    }

    pub fn into_activity(self) -> Activity {
        Activity {
            kind: self.kind.unwrap_or(ActivityKind::Message),
            name: self.name,
            value: self.value,
            text: self.text,
            from: self.from.unwrap_or_else(ChannelAccount::user),
            id: self.id,
            timestamp: self.timestamp,
            channel_data: self.channel_data,
            attachments: self.attachments,
            suggested_actions: self.suggested_actions,
            extra: self.extra,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Uninitialized,
    Connecting,
    Connected,
    Reconnecting,
    Ended,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Uninitialized => "uninitialized",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Ended => "ended",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short-lived Direct Line credential returned by a token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(
        rename = "conversationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("conversation_id", &self.conversation_id)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn activity_keeps_absent_fields_absent() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "event",
            "name": "order:confirmed",
            "value": {"orderId": "42"},
            "from": {"id": "bot-1", "role": "bot"},
            "locale": "nb-NO"
        }))
        .unwrap();

        assert_eq!(activity.kind, ActivityKind::Event);
        assert_eq!(activity.from.role, Some(Role::Bot));
        assert!(activity.text.is_none());
        assert!(activity.attachments.is_none());
        assert_eq!(activity.extra["locale"], "nb-NO");

        let value = serde_json::to_value(&activity).unwrap();
        assert!(value.get("text").is_none());
        assert!(value.get("attachments").is_none());
        assert_eq!(value["type"], "event");
        assert_eq!(value["locale"], "nb-NO");
    }

    #[test]
    fn unknown_kinds_and_roles_survive() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "invoke",
            "from": {"id": "skill", "role": "skill"}
        }))
        .unwrap();
        assert_eq!(activity.kind, ActivityKind::Other("invoke".into()));
        assert_eq!(activity.from.role, Some(Role::Other("skill".into())));
        assert_eq!(serde_json::to_value(&activity).unwrap()["type"], "invoke");
    }

    #[test]
    fn missing_sender_is_rejected() {
        let result = serde_json::from_value::<Activity>(json!({"type": "message"}));
        assert!(result.is_err());
    }

    #[test]
    fn partial_activity_defaults_sender_and_kind() {
        let activity = PartialActivity::default().with_name("ping").into_activity();
        assert_eq!(activity.kind, ActivityKind::Message);
        assert_eq!(activity.from, ChannelAccount::user());
        assert_eq!(activity.name.as_deref(), Some("ping"));

        let explicit = PartialActivity {
            from: Some(ChannelAccount::bot("echo")),
            ..PartialActivity::message("hi")
        }
        .into_activity();
        assert_eq!(explicit.from.role, Some(Role::Bot));
        assert_eq!(explicit.text.as_deref(), Some("hi"));
    }

    #[test]
    fn credential_debug_redacts_token() {
        let credential: Credential =
            serde_json::from_value(json!({"token": "super-secret", "expires_in": 3600})).unwrap();
        assert_eq!(credential.expires_in, Some(3600));
        assert!(credential.conversation_id.is_none());
        let debug = format!("{credential:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ConnectionStatus::Uninitialized).unwrap(),
            "uninitialized"
        );
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Uninitialized);
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }
}
