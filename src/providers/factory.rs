//! Build providers from a kind tag plus configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::{
    ApiConfig, AuthProviderConfig, GoogleAuthProviderConfig, KakaoAuthProviderConfig,
    NaverAuthProviderConfig, ProviderSection,
};
use crate::error::{AuthError, Result};
use crate::platform::Platform;
use crate::transport::HttpTransport;
use crate::types::ProviderKind;

use super::{
    EmailAuthProvider, FakeAuthProvider, GoogleAuthProvider, KakaoAuthProvider, LoginProvider,
    NaverAuthProvider,
};

/// Everything a provider may need at construction.
#[derive(Clone)]
pub struct ProviderOptions {
    pub transport: Arc<dyn HttpTransport>,
    pub api: ApiConfig,
    pub platform: Platform,
    pub email: AuthProviderConfig,
    pub google: Option<GoogleAuthProviderConfig>,
    pub kakao: Option<KakaoAuthProviderConfig>,
    pub naver: Option<NaverAuthProviderConfig>,
}

impl ProviderOptions {
    pub fn new(transport: Arc<dyn HttpTransport>, api: ApiConfig) -> Self {
        Self {
            transport,
            api,
            platform: Platform::default(),
            email: AuthProviderConfig::default(),
            google: None,
            kakao: None,
            naver: None,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_google(mut self, config: GoogleAuthProviderConfig) -> Self {
        self.google = Some(config);
        self
    }

    pub fn with_kakao(mut self, config: KakaoAuthProviderConfig) -> Self {
        self.kakao = Some(config);
        self
    }

    pub fn with_naver(mut self, config: NaverAuthProviderConfig) -> Self {
        self.naver = Some(config);
        self
    }

    /// Copy the per-provider settings from a config file section.
    pub fn with_section(mut self, section: &ProviderSection) -> Self {
        if let Some(email) = &section.email {
            self.email = email.clone();
        }
        self.google = section.google.clone().or(self.google);
        self.kakao = section.kakao.clone().or(self.kakao);
        self.naver = section.naver.clone().or(self.naver);
        self
    }
}

impl std::fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("api", &self.api)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

/// Construct the provider for `kind`.
///
/// Missing OAuth client configuration and missing endpoints are reported as
/// `Err(AuthError::Config)`.
pub fn create_provider(kind: ProviderKind, options: &ProviderOptions) -> Result<Arc<dyn LoginProvider>> {
    let transport = options.transport.clone();
    let provider: Arc<dyn LoginProvider> = match kind {
        ProviderKind::Email => Arc::new(EmailAuthProvider::new(
            transport,
            &options.api,
            options.email.clone(),
            options.platform,
        )?),
        ProviderKind::Google => Arc::new(GoogleAuthProvider::new(
            transport,
            &options.api,
            require(options.google.clone(), kind)?,
            options.platform,
        )?),
        ProviderKind::Kakao => Arc::new(KakaoAuthProvider::new(
            transport,
            &options.api,
            require(options.kakao.clone(), kind)?,
            options.platform,
        )?),
        ProviderKind::Naver => Arc::new(NaverAuthProvider::new(
            transport,
            &options.api,
            require(options.naver.clone(), kind)?,
            options.platform,
        )?),
        ProviderKind::Fake => Arc::new(FakeAuthProvider::new()),
    };
    info!(provider = %kind, platform = %options.platform, "Created login provider");
    Ok(provider)
}

/// Construct a provider from a string tag such as `"kakao"`.
pub fn create_provider_from_str(tag: &str, options: &ProviderOptions) -> Result<Arc<dyn LoginProvider>> {
    create_provider(tag.parse()?, options)
}

fn require<T>(config: Option<T>, kind: ProviderKind) -> Result<T> {
    config.ok_or_else(|| {
        AuthError::config(format!(
            "{} provider requires its client configuration",
            kind.display_name()
        ))
    })
}
