//! Identity providers.
//!
//! Defines the [`LoginProvider`] and [`EmailVerifiable`] capability traits,
//! the shared backend plumbing, the concrete Email / Google / Kakao / Naver
//! providers, an in-process fake, and a factory.

pub mod backend;
pub mod email;
pub mod factory;
pub mod fake;
pub mod google;
pub mod kakao;
pub mod naver;
pub mod traits;

pub use email::EmailAuthProvider;
pub use factory::{ProviderOptions, create_provider, create_provider_from_str};
pub use fake::FakeAuthProvider;
pub use google::GoogleAuthProvider;
pub use kakao::KakaoAuthProvider;
pub use naver::NaverAuthProvider;
pub use traits::{EmailVerifiable, LoginProvider};
