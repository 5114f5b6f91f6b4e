//! Client-side authentication session orchestration.
//!
//! An [`AuthManager`] combines a [`LoginProvider`] (email, Google, Kakao,
//! Naver or an in-process fake) with a [`TokenStore`] and answers every
//! request-time operation with an [`ApiResponse`] envelope. Network calls go
//! through an injected [`HttpTransport`] with timeouts and bounded retry.

pub mod bridge;
pub mod config;
pub mod envelope;
pub mod error;
pub mod manager;
pub mod net;
pub mod oauth;
pub mod platform;
pub mod providers;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use bridge::{FakeNativeBridge, NativeBridge};
pub use config::{ApiConfig, ApiEndpoints, ClientConfig, EndpointName};
pub use envelope::ApiResponse;
pub use error::{AuthError, Result};
pub use manager::{AuthManager, AuthManagerBuilder};
pub use platform::Platform;
pub use providers::{EmailVerifiable, LoginProvider};
pub use store::{TokenStore, TokenStoreType};
pub use transport::{HttpTransport, ReqwestTransport, ScriptedTransport};
pub use types::{LoginRequest, LogoutRequest, ProviderKind, RefreshTokenRequest, Token, UserInfo};
