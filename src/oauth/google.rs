use std::time::Duration;

use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::debug;

use super::{AuthorizationState, FederatedProfile, IdentityProvider, OAuthError};
use crate::config::GoogleConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const SCOPES: &[&str] = &["profile", "email"];

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: Option<String>,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

impl From<GoogleUserInfo> for FederatedProfile {
    fn from(info: GoogleUserInfo) -> Self {
        Self {
            external_id: info.sub,
            display_name: info.name,
            given_name: info.given_name,
            family_name: info.family_name,
            email: info.email,
            avatar_url: info.picture,
        }
    }
}

/// Google sign-in via the authorization code flow with PKCE.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    http: reqwest::Client,
}

impl GoogleOAuthClient {
    pub fn new(config: &GoogleConfig) -> Result<Self, OAuthError> {
        let redirect_url = RedirectUrl::new(config.callback_url.clone())
            .map_err(|e| OAuthError::Configuration(format!("invalid callback URL: {e}")))?;
        let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
            .map_err(|e| OAuthError::Configuration(e.to_string()))?;
        let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
            .map_err(|e| OAuthError::Configuration(e.to_string()))?;

        // The provider is the only uncontrolled party on the login path.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| OAuthError::Configuration(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client_id: ClientId::new(config.client_id.clone()),
            client_secret: ClientSecret::new(config.client_secret.clone()),
            auth_url,
            token_url,
            redirect_url,
            http,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<FederatedProfile, OAuthError> {
        let info: GoogleUserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| OAuthError::Profile(e.to_string()))?
            .json()
            .await
            .map_err(|e| OAuthError::Profile(e.to_string()))?;
        Ok(info.into())
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuthClient {
    fn authorization_url(&self) -> (String, AuthorizationState) {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);
        for scope in SCOPES {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }
        let (url, csrf_token) = request.url();

        let state = AuthorizationState {
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        };
        (url.to_string(), state)
    }

    async fn exchange(
        &self,
        code: &str,
        state: &AuthorizationState,
    ) -> Result<FederatedProfile, OAuthError> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(state.pkce_verifier.clone()))
            .request_async(&self.http)
            .await
            .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;
        debug!("google token exchange succeeded");

        self.fetch_profile(token.access_token().secret()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GoogleConfig {
        GoogleConfig {
            client_id: "client-123".into(),
            client_secret: "shh".into(),
            callback_url: "http://localhost:4000/api/auth/google/callback".into(),
            http_timeout_secs: 5,
            failure_redirect: "/login".into(),
        }
    }

    #[test]
    fn authorization_url_requests_profile_and_email() {
        let client = GoogleOAuthClient::new(&config()).expect("client");
        let (url, state) = client.authorization_url();
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("scope=profile+email"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={}", state.csrf_token)));
        assert!(!state.pkce_verifier.is_empty());
    }

    #[test]
    fn rejects_invalid_callback_url() {
        let mut cfg = config();
        cfg.callback_url = "not a url".into();
        assert!(matches!(
            GoogleOAuthClient::new(&cfg),
            Err(OAuthError::Configuration(_))
        ));
    }

    #[test]
    fn userinfo_maps_to_profile() {
        let info: GoogleUserInfo = serde_json::from_str(
            r#"{"sub":"109","name":"Ann Lee","given_name":"Ann","family_name":"Lee",
                "email":"ann@x.com","picture":"https://img/ann.png"}"#,
        )
        .unwrap();
        let profile = FederatedProfile::from(info);
        assert_eq!(profile.external_id.as_deref(), Some("109"));
        assert_eq!(profile.display_name.as_deref(), Some("Ann Lee"));
        assert_eq!(profile.avatar_url.as_deref(), Some("https://img/ann.png"));
    }
}
