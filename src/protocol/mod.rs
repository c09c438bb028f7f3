//! Remote authentication protocol seam.
//!
//! The handshake never talks to the account provider directly; it goes
//! through an [`AuthProtocol`] implementation that owns the per-caller
//! session and reports failures as a closed [`ProtocolError`] set.

mod gateway;

pub use gateway::{GatewayClient, GatewayConfig};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Account profile resolved by the provider once login completes.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Failures the provider can report for a handshake step.
///
/// Everything the handshake knows how to explain to the caller has its own
/// variant; the rest is collapsed into [`ProtocolError::Other`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("phone number is invalid")]
    InvalidPhoneNumber,
    #[error("phone number is not registered")]
    PhoneNotRegistered,
    #[error("phone number is flood limited")]
    PhoneFlooded,
    #[error("phone number is banned")]
    PhoneBanned,
    #[error("third-party apps are disabled for this account")]
    ThirdPartyAppsDisabled,
    #[error("phone code is invalid")]
    CodeInvalid,
    #[error("phone code expired")]
    CodeExpired,
    #[error("two-factor password required")]
    PasswordNeeded,
    #[error("password is invalid")]
    PasswordInvalid,
    #[error("password is empty")]
    PasswordEmpty,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProtocolError {
    /// Map a provider RPC error name to a known failure.
    #[must_use]
    pub fn from_rpc_name(name: &str) -> Option<Self> {
        let error = match name.trim().to_ascii_uppercase().as_str() {
            "PHONE_NUMBER_INVALID" => Self::InvalidPhoneNumber,
            "PHONE_NUMBER_UNOCCUPIED" => Self::PhoneNotRegistered,
            "PHONE_NUMBER_FLOOD" => Self::PhoneFlooded,
            "PHONE_NUMBER_BANNED" => Self::PhoneBanned,
            "PHONE_NUMBER_APP_SIGNUP_FORBIDDEN" => Self::ThirdPartyAppsDisabled,
            "PHONE_CODE_INVALID" => Self::CodeInvalid,
            "PHONE_CODE_EXPIRED" => Self::CodeExpired,
            "SESSION_PASSWORD_NEEDED" => Self::PasswordNeeded,
            "PASSWORD_HASH_INVALID" => Self::PasswordInvalid,
            "PASSWORD_EMPTY" => Self::PasswordEmpty,
            _ => return None,
        };
        Some(error)
    }
}

/// Client for the provider's login session of a given caller.
#[async_trait]
pub trait AuthProtocol: Send + Sync {
    /// Request a login code for `phone`.
    async fn submit_phone(&self, identity: &str, phone: &str) -> Result<(), ProtocolError>;

    /// Submit the one-time code received by the caller.
    async fn submit_code(&self, identity: &str, code: &str) -> Result<Profile, ProtocolError>;

    /// Submit the two-factor password.
    async fn submit_password(
        &self,
        identity: &str,
        password: &SecretString,
    ) -> Result<Profile, ProtocolError>;
}
