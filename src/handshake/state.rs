//! Handshake states and the render instruction handed to the HTTP layer.

use axum::http::StatusCode;
use serde::{Serialize, Serializer};
use utoipa::ToSchema;

/// Step of the login handshake the caller is on.
///
/// Serialized names are the ones the login form template switches on.
#[derive(ToSchema, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    #[serde(rename = "request")]
    AwaitingPhone,
    #[serde(rename = "code")]
    AwaitingCode,
    #[serde(rename = "password")]
    AwaitingPassword,
    #[serde(rename = "logged-in")]
    LoggedIn,
}

impl HandshakeState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingPhone => "request",
            Self::AwaitingCode => "code",
            Self::AwaitingPassword => "password",
            Self::LoggedIn => "logged-in",
        }
    }
}

#[derive(ToSchema, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Error,
    Info,
}

#[derive(ToSchema, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

/// Everything the presentation layer needs to answer a handshake request.
#[derive(ToSchema, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RenderInstruction {
    /// Caller identity echoed back into the form.
    pub identity: Option<String>,
    pub state: HandshakeState,
    #[serde(serialize_with = "serialize_status")]
    #[schema(value_type = u16)]
    pub status: StatusCode,
    pub message: Option<Message>,
    pub username: Option<String>,
}

impl RenderInstruction {
    /// Blank form in the initial state.
    #[must_use]
    pub fn form(identity: Option<String>) -> Self {
        Self {
            identity,
            state: HandshakeState::AwaitingPhone,
            status: StatusCode::OK,
            message: None,
            username: None,
        }
    }

    #[must_use]
    pub fn error(
        identity: Option<&str>,
        state: HandshakeState,
        status: StatusCode,
        text: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.map(ToString::to_string),
            state,
            status,
            message: Some(Message {
                kind: MessageKind::Error,
                text: text.into(),
            }),
            username: None,
        }
    }

    #[must_use]
    pub fn info(identity: &str, state: HandshakeState, text: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.to_string()),
            state,
            status: StatusCode::OK,
            message: Some(Message {
                kind: MessageKind::Info,
                text: text.into(),
            }),
            username: None,
        }
    }

    #[must_use]
    pub fn logged_in(identity: &str, username: Option<String>) -> Self {
        Self {
            identity: Some(identity.to_string()),
            state: HandshakeState::LoggedIn,
            status: StatusCode::OK,
            message: None,
            username,
        }
    }

    #[must_use]
    pub fn message_kind(&self) -> Option<MessageKind> {
        self.message.as_ref().map(|message| message.kind)
    }

    #[must_use]
    pub fn message_text(&self) -> Option<&str> {
        self.message.as_ref().map(|message| message.text.as_str())
    }
}

fn serialize_status<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}
