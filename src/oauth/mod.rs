//! Federated identity: the provider redirect and the code-for-profile exchange.

mod google;

use async_trait::async_trait;

pub use google::GoogleOAuthClient;

/// CSRF token and PKCE verifier kept by the browser between the redirect and
/// the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationState {
    pub csrf_token: String,
    pub pkce_verifier: String,
}

impl AuthorizationState {
    /// Both halves are URL-safe base64, so `.` cannot occur inside either.
    pub fn to_cookie_value(&self) -> String {
        format!("{}.{}", self.csrf_token, self.pkce_verifier)
    }

    pub fn from_cookie_value(value: &str) -> Option<Self> {
        let (csrf, verifier) = value.split_once('.')?;
        if csrf.is_empty() || verifier.is_empty() {
            return None;
        }
        Some(Self {
            csrf_token: csrf.to_string(),
            pkce_verifier: verifier.to_string(),
        })
    }
}

/// Identity asserted by the external provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FederatedProfile {
    pub external_id: Option<String>,
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("missing auth state")]
    MissingAuthState,
    #[error("CSRF token mismatch")]
    CsrfMismatch,
    #[error("provider denied authorization: {0}")]
    Denied(String),
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("profile fetch failed: {0}")]
    Profile(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL to send the browser to, plus the state to check on callback.
    fn authorization_url(&self) -> (String, AuthorizationState);

    async fn exchange(
        &self,
        code: &str,
        state: &AuthorizationState,
    ) -> Result<FederatedProfile, OAuthError>;
}
