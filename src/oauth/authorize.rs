//! Authorization URLs for the OAuth providers.

use crate::error::{AuthError, Result};
use crate::types::ProviderKind;

use super::pkce::PKCE_METHOD;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const KAKAO_AUTHORIZE_URL: &str = "https://kauth.kakao.com/oauth/authorize";
const NAVER_AUTHORIZE_URL: &str = "https://nid.naver.com/oauth2.0/authorize";

/// Where and how to send the user to sign in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeEndpoint {
    pub provider: ProviderKind,
    pub authorize_url: String,
    pub scopes: Vec<String>,
}

impl AuthorizeEndpoint {
    /// Default endpoint and scopes for an OAuth provider.
    pub fn for_provider(provider: ProviderKind) -> Result<Self> {
        let (url, scopes): (&str, &[&str]) = match provider {
            ProviderKind::Google => (GOOGLE_AUTHORIZE_URL, &["openid", "email", "profile"]),
            ProviderKind::Kakao => (KAKAO_AUTHORIZE_URL, &["account_email", "profile_nickname"]),
            ProviderKind::Naver => (NAVER_AUTHORIZE_URL, &[]),
            ProviderKind::Email | ProviderKind::Fake => {
                return Err(AuthError::Unsupported(format!(
                    "{} has no OAuth authorization endpoint",
                    provider.display_name()
                )));
            }
        };
        Ok(Self {
            provider,
            authorize_url: url.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Full authorization URL with the PKCE challenge and state attached.
    pub fn build_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        state: &str,
        code_challenge: &str,
    ) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}&code_challenge={}&code_challenge_method={}",
            self.authorize_url,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
            PKCE_METHOD,
        );
        if !self.scopes.is_empty() {
            url.push_str("&scope=");
            url.push_str(&urlencoding::encode(&self.scopes.join(" ")));
        }
        if self.provider == ProviderKind::Google {
            // Ask for a refresh token on every consent.
            url.push_str("&access_type=offline&prompt=consent");
        }
        url
    }
}
