//! Submitted login form and step selection.

use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use utoipa::ToSchema;

/// Sent to the provider instead of an empty phone number so it falls back to
/// the number already registered with the session.
pub const PLACEHOLDER_PHONE: &str = "+123";

/// Form fields of `POST /login`. Any subset may be present.
#[derive(ToSchema, Deserialize, Default, Clone)]
pub struct LoginForm {
    /// Bridge account identity, e.g. `@alice:example.com`.
    pub identity: Option<String>,
    pub phone: Option<String>,
    pub code: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("identity", &self.identity)
            .field("phone", &self.phone)
            .field("code", &self.code.as_ref().map(|_| "***"))
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// The single step a request attempts.
#[derive(Debug)]
pub(crate) enum Step {
    Phone(String),
    Code {
        code: String,
        /// Submitted alongside the code; used if the account needs 2FA.
        password: Option<SecretString>,
    },
    Password(SecretString),
}

impl LoginForm {
    /// Trimmed identity, `None` when absent or blank.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity
            .as_deref()
            .map(str::trim)
            .filter(|identity| !identity.is_empty())
    }

    /// Pick the step by field priority: phone, then code, then password.
    pub(crate) fn step(&self) -> Option<Step> {
        if let Some(phone) = &self.phone {
            let phone = phone.trim();
            let phone = if phone.is_empty() {
                PLACEHOLDER_PHONE
            } else {
                phone
            };
            return Some(Step::Phone(phone.to_string()));
        }

        let password = self
            .password
            .as_ref()
            .map(|password| SecretString::from(password.clone()));

        if let Some(code) = &self.code {
            return Some(Step::Code {
                code: code.trim().to_string(),
                password,
            });
        }

        password.map(Step::Password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn form(phone: Option<&str>, code: Option<&str>, password: Option<&str>) -> LoginForm {
        LoginForm {
            identity: Some("@alice:example.com".to_string()),
            phone: phone.map(ToString::to_string),
            code: code.map(ToString::to_string),
            password: password.map(ToString::to_string),
        }
    }

    #[test]
    fn phone_takes_priority() {
        let step = form(Some("+15550100"), Some("12345"), Some("pw")).step();
        assert!(matches!(step, Some(Step::Phone(phone)) if phone == "+15550100"));
    }

    #[test]
    fn empty_phone_uses_placeholder() {
        let step = form(Some(""), None, None).step();
        assert!(matches!(step, Some(Step::Phone(phone)) if phone == PLACEHOLDER_PHONE));

        let step = form(Some("   "), None, None).step();
        assert!(matches!(step, Some(Step::Phone(phone)) if phone == PLACEHOLDER_PHONE));
    }

    #[test]
    fn code_carries_optional_password() {
        match form(None, Some(" 12345 "), Some("hunter2")).step() {
            Some(Step::Code { code, password }) => {
                assert_eq!(code, "12345");
                assert_eq!(
                    password.as_ref().map(|p| p.expose_secret().to_string()),
                    Some("hunter2".to_string())
                );
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn password_alone_selects_password_step() {
        let step = form(None, None, Some("")).step();
        assert!(matches!(step, Some(Step::Password(p)) if p.expose_secret().is_empty()));
    }

    #[test]
    fn no_credentials_selects_nothing() {
        assert!(form(None, None, None).step().is_none());
    }

    #[test]
    fn blank_identity_is_missing() {
        let mut login = form(None, None, None);
        login.identity = Some("  ".to_string());
        assert_eq!(login.identity(), None);
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", form(None, Some("12345"), Some("hunter2")));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("12345"));
    }
}
