//! Login handshake orchestrator.
//!
//! One request drives at most one step:
//!
//! 1. Gate: the form must carry an identity and the whitelist must allow it.
//! 2. Dispatch by field priority `phone` > `code` > `password`.
//! 3. Call the provider and classify the outcome into a [`RenderInstruction`].
//!
//! The only chained case is a code that turns out to need a two-factor
//! password when the password was submitted in the same form: the password
//! step runs right away instead of asking for it again.

mod form;
mod locks;
mod state;

pub use form::{LoginForm, PLACEHOLDER_PHONE};
pub use locks::CallerLocks;
pub use state::{HandshakeState, Message, MessageKind, RenderInstruction};

use crate::{
    finalize::PostLoginQueue,
    protocol::{AuthProtocol, Profile, ProtocolError},
    registry::{CallerRecord, PendingCommand, Registry},
};
use axum::http::StatusCode;
use form::Step;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub(crate) const MISSING_IDENTITY: &str = "Please enter your Matrix ID.";
pub(crate) const NOT_WHITELISTED: &str = "You are not whitelisted.";
pub(crate) const NO_DATA: &str = "No data given.";
pub(crate) const REGISTRY_FAILURE: &str = "Internal server error while looking up account.";

pub struct Orchestrator {
    registry: Arc<dyn Registry>,
    protocol: Arc<dyn AuthProtocol>,
    post_login: PostLoginQueue,
    locks: CallerLocks,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<dyn Registry>,
        protocol: Arc<dyn AuthProtocol>,
        post_login: PostLoginQueue,
    ) -> Self {
        Self {
            registry,
            protocol,
            post_login,
            locks: CallerLocks::new(),
        }
    }

    /// Run the handshake step selected by `form`.
    #[instrument(skip(self))]
    pub async fn handle(&self, form: LoginForm) -> RenderInstruction {
        let Some(identity) = form.identity() else {
            return RenderInstruction::error(
                None,
                HandshakeState::AwaitingPhone,
                StatusCode::BAD_REQUEST,
                MISSING_IDENTITY,
            );
        };

        let caller = match self.registry.lookup(identity).await {
            Ok(caller) => caller,
            Err(err) => {
                error!("Registry lookup failed: {err:#}");
                return RenderInstruction::error(
                    Some(identity),
                    HandshakeState::AwaitingPhone,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    REGISTRY_FAILURE,
                );
            }
        };

        if !caller.whitelisted {
            return RenderInstruction::error(
                Some(identity),
                HandshakeState::AwaitingPhone,
                StatusCode::FORBIDDEN,
                NOT_WHITELISTED,
            );
        }

        if let Some(command) = &caller.pending_command {
            debug!("Pending command for caller: {command}");
        }

        let _guard = self.locks.acquire(&caller.identity).await;

        match form.step() {
            Some(Step::Phone(phone)) => self.submit_phone(&caller, &phone).await,
            Some(Step::Code { code, password }) => {
                self.submit_code(&caller, &code, password.as_ref()).await
            }
            Some(Step::Password(password)) => {
                self.submit_password(&caller, &password, PendingCommand::LoginPasswordEntry)
                    .await
            }
            None => RenderInstruction::error(
                Some(&caller.identity),
                HandshakeState::AwaitingPhone,
                StatusCode::BAD_REQUEST,
                NO_DATA,
            ),
        }
    }

    async fn submit_phone(&self, caller: &CallerRecord, phone: &str) -> RenderInstruction {
        let identity = caller.identity.as_str();
        let fail = |status: StatusCode, text: &str| {
            RenderInstruction::error(Some(identity), HandshakeState::AwaitingPhone, status, text)
        };

        match self.protocol.submit_phone(identity, phone).await {
            Ok(()) => RenderInstruction::info(
                identity,
                HandshakeState::AwaitingCode,
                "Code requested successfully.",
            ),
            Err(ProtocolError::InvalidPhoneNumber) => {
                fail(StatusCode::BAD_REQUEST, "Invalid phone number.")
            }
            Err(ProtocolError::PhoneNotRegistered) => fail(
                StatusCode::NOT_FOUND,
                "That phone number has not been registered.",
            ),
            Err(ProtocolError::PhoneFlooded) => fail(
                StatusCode::TOO_MANY_REQUESTS,
                "Your phone number has been temporarily banned for flooding. \
                 The ban is usually applied for around a day.",
            ),
            Err(ProtocolError::PhoneBanned) => fail(
                StatusCode::UNAUTHORIZED,
                "Your phone number is banned from Telegram.",
            ),
            Err(ProtocolError::ThirdPartyAppsDisabled) => fail(
                StatusCode::UNAUTHORIZED,
                "You have disabled 3rd party apps on your account.",
            ),
            Err(err) => {
                error!("Error requesting phone code: {err:#}");
                fail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error while requesting code.",
                )
            }
        }
    }

    async fn submit_code(
        &self,
        caller: &CallerRecord,
        code: &str,
        password: Option<&SecretString>,
    ) -> RenderInstruction {
        let identity = caller.identity.as_str();
        let fail = |status: StatusCode, text: &str| {
            RenderInstruction::error(Some(identity), HandshakeState::AwaitingCode, status, text)
        };

        match self.protocol.submit_code(identity, code).await {
            Ok(profile) => self.logged_in(identity, profile, PendingCommand::Login).await,
            Err(ProtocolError::CodeInvalid) => fail(StatusCode::FORBIDDEN, "Incorrect phone code."),
            Err(ProtocolError::CodeExpired) => fail(StatusCode::FORBIDDEN, "Phone code expired."),
            Err(ProtocolError::PasswordNeeded) => match password {
                // The pending command never reached password entry, so a
                // successful chained login clears it from `Login`.
                Some(password) => {
                    debug!("Code needs 2FA, continuing with submitted password");
                    self.submit_password(caller, password, PendingCommand::Login)
                        .await
                }
                None => {
                    self.transition_pending(
                        identity,
                        PendingCommand::Login,
                        Some(PendingCommand::LoginPasswordEntry),
                    )
                    .await;
                    RenderInstruction::info(
                        identity,
                        HandshakeState::AwaitingPassword,
                        "Code accepted, but you have 2-factor authentication enabled.",
                    )
                }
            },
            Err(err) => {
                error!("Error sending phone code: {err:#}");
                fail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error while sending code.",
                )
            }
        }
    }

    async fn submit_password(
        &self,
        caller: &CallerRecord,
        password: &SecretString,
        pending: PendingCommand,
    ) -> RenderInstruction {
        let identity = caller.identity.as_str();
        let fail = |status: StatusCode, text: &str| {
            RenderInstruction::error(
                Some(identity),
                HandshakeState::AwaitingPassword,
                status,
                text,
            )
        };

        match self.protocol.submit_password(identity, password).await {
            Ok(profile) => self.logged_in(identity, profile, pending).await,
            Err(ProtocolError::PasswordInvalid | ProtocolError::PasswordEmpty) => {
                fail(StatusCode::BAD_REQUEST, "Incorrect password.")
            }
            Err(err) => {
                error!("Error sending password: {err:#}");
                fail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error while sending password.",
                )
            }
        }
    }

    async fn logged_in(
        &self,
        identity: &str,
        profile: Profile,
        pending: PendingCommand,
    ) -> RenderInstruction {
        let username = profile.username.clone();

        match self.post_login.enqueue(identity, profile) {
            Ok(job_id) => debug!("Queued post-login job {job_id}"),
            Err(err) => error!("Failed to queue post-login job: {err:#}"),
        }

        self.transition_pending(identity, pending, None).await;

        info!("Login handshake complete");

        RenderInstruction::logged_in(identity, username)
    }

    async fn transition_pending(
        &self,
        identity: &str,
        expected: PendingCommand,
        next: Option<PendingCommand>,
    ) {
        match self
            .registry
            .compare_and_set_pending(identity, expected, next)
            .await
        {
            Ok(true) => debug!("Pending command {expected} -> {next:?}"),
            Ok(false) => {}
            Err(err) => warn!("Failed to update pending command: {err:#}"),
        }
    }
}
