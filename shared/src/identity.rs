use crate::IdentityConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com";

/// The signed-in supervisor as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    /// The provider refused the credentials; carries its error code, e.g. `INVALID_PASSWORD`.
    #[error("sign-in rejected: {0}")]
    Rejected(String),
    /// Registration refused, e.g. `EMAIL_EXISTS` or `WEAK_PASSWORD : ...`.
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),
    #[error("email and password are required")]
    InvalidInput,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl IdentityClient {
    pub fn new_with_client(client: Client, config: &IdentityConfig) -> Self {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_IDENTITY_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url,
        }
    }

    fn endpoint_url(&self, method: &str) -> String {
        format!("{}/v1/accounts:{method}?key={}", self.base_url, self.api_key)
    }

    /// Email/password sign-in. Credential problems surface as [`IdentityError::Rejected`].
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        let user = self
            .submit_credentials("signInWithPassword", email, password)
            .await?;
        info!(name: "identity.signed_in", uid = %user.uid, "Supervisor signed in");
        Ok(user)
    }

    /// Creates a supervisor account. The provider's refusal (existing email, weak password)
    /// surfaces as [`IdentityError::RegistrationRejected`].
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        let user = self
            .submit_credentials("signUp", email, password)
            .await
            .map_err(|e| match e {
                IdentityError::Rejected(reason) => IdentityError::RegistrationRejected(reason),
                e => e,
            })?;
        info!(name: "identity.registered", uid = %user.uid, "Supervisor registered");
        Ok(user)
    }

    async fn submit_credentials(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, IdentityError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(IdentityError::InvalidInput);
        }

        let response = self
            .client
            .post(self.endpoint_url(method))
            .json(&CredentialsRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let reason = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope.error.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("request rejected")
                    .to_string(),
            };
            warn!(name: "identity.rejected", method, status = status.as_u16(), reason = %reason, "Identity request rejected");
            return Err(IdentityError::Rejected(reason));
        }

        let body = response
            .error_for_status()?
            .json::<AccountResponse>()
            .await?;

        Ok(AuthUser {
            uid: body.local_id,
            email: body.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: Option<&str>) -> IdentityClient {
        IdentityClient::new_with_client(
            Client::new(),
            &IdentityConfig {
                api_key: "test-key".into(),
                base_url: base_url.map(str::to_string),
            },
        )
    }

    #[test]
    fn endpoint_url_uses_configured_base() {
        let emulator = client(Some("http://localhost:9099/identitytoolkit.googleapis.com/"));
        assert_eq!(
            emulator.endpoint_url("signInWithPassword"),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signInWithPassword?key=test-key"
        );
        assert_eq!(
            emulator.endpoint_url("signUp"),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signUp?key=test-key"
        );
        assert!(
            client(None)
                .endpoint_url("signUp")
                .starts_with(DEFAULT_IDENTITY_BASE_URL)
        );
    }

    #[tokio::test]
    async fn blank_credentials_are_rejected_locally() {
        let client = client(Some("http://127.0.0.1:1"));
        assert!(matches!(
            client.sign_in("  ", "secret").await,
            Err(IdentityError::InvalidInput)
        ));
        assert!(matches!(
            client.sign_in("sup@example.com", "").await,
            Err(IdentityError::InvalidInput)
        ));
        assert!(matches!(
            client.sign_up("", "secret").await,
            Err(IdentityError::InvalidInput)
        ));
    }

    #[test]
    fn error_envelope_parses() {
        let envelope: ErrorEnvelope =
            serde_json::from_str(r#"{"error":{"code":400,"message":"INVALID_PASSWORD"}}"#).unwrap();
        assert_eq!(envelope.error.message, "INVALID_PASSWORD");
    }
}
