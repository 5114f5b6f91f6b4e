//! OAuth authorization-code flow with PKCE.
//!
//! - [`pkce`]: verifier, challenge and state generation
//! - [`authorize`]: provider authorization URLs
//! - [`state`]: single-use state records with a TTL
//! - [`callback`] and [`message`]: redirect and cross-window callbacks

pub mod authorize;
pub mod callback;
pub mod message;
pub mod pkce;
pub mod state;

pub use authorize::AuthorizeEndpoint;
pub use callback::{CallbackParams, validate_callback_params};
pub use message::{
    CallbackInbox, CallbackMessage, SubscriptionId, WindowMessage, parse_callback_message,
};
pub use pkce::{Pkce, generate_code_challenge, generate_code_verifier, generate_state};
pub use state::{AuthorizationStart, DEFAULT_STATE_TTL, OAuthStateController, PkceState};
