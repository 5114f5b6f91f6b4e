//! Cross-window callback messages.
//!
//! A popup-based flow posts the callback back to the opener window. Messages
//! are accepted only from the application's own origin and only with one of
//! the recognized payload shapes. Anything else is logged and dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::error::{AuthError, Result};

pub const OAUTH_CALLBACK: &str = "OAUTH_CALLBACK";
pub const OAUTH_ERROR: &str = "OAUTH_ERROR";

/// A message as received from another window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMessage {
    pub origin: String,
    pub data: Value,
}

impl WindowMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// A validated callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackMessage {
    Callback {
        code: String,
        state: String,
    },
    Error {
        error: String,
        error_description: Option<String>,
    },
}

fn normalize_origin(origin: &str) -> Option<String> {
    let url = Url::parse(origin).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

fn string_field<'a>(data: &'a Value, field: &str) -> Option<&'a str> {
    data.get(field).and_then(Value::as_str)
}

/// Validate a raw window message against `app_origin`.
///
/// Returns `None` for anything that is not a well-formed callback from the
/// application's own origin.
pub fn parse_callback_message(message: &WindowMessage, app_origin: &str) -> Option<CallbackMessage> {
    let same_origin = normalize_origin(&message.origin)
        .zip(normalize_origin(app_origin))
        .is_some_and(|(from, app)| from == app);
    if !same_origin {
        warn!(origin = %message.origin, "Ignoring OAuth message from foreign origin");
        return None;
    }

    let Some(payload) = message.data.as_object() else {
        warn!("Ignoring OAuth message with a non-object payload");
        return None;
    };

    match payload.get("type").and_then(Value::as_str) {
        Some(OAUTH_CALLBACK) => {
            let code = string_field(&message.data, "code").filter(|c| !c.is_empty());
            let state = string_field(&message.data, "state").filter(|s| !s.is_empty());
            match (code, state) {
                (Some(code), Some(state)) => Some(CallbackMessage::Callback {
                    code: code.to_string(),
                    state: state.to_string(),
                }),
                _ => {
                    warn!("Ignoring OAUTH_CALLBACK message without string code and state");
                    None
                }
            }
        }
        Some(OAUTH_ERROR) => {
            let Some(error) = string_field(&message.data, "error") else {
                warn!("Ignoring OAUTH_ERROR message without a string error");
                return None;
            };
            let error_description = match payload.get("errorDescription") {
                None | Some(Value::Null) => None,
                Some(Value::String(desc)) => Some(desc.clone()),
                Some(_) => {
                    warn!("Ignoring OAUTH_ERROR message with a malformed errorDescription");
                    return None;
                }
            };
            Some(CallbackMessage::Error {
                error: error.to_string(),
                error_description,
            })
        }
        other => {
            warn!(message_type = ?other, "Ignoring message with unrecognized type");
            None
        }
    }
}

/// Handle returned by [`CallbackInbox::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Validated inbound channel for callback messages.
///
/// Subscribers get an unbounded receiver; dropped receivers are pruned on the
/// next delivery.
#[derive(Debug)]
pub struct CallbackInbox {
    app_origin: String,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, mpsc::UnboundedSender<CallbackMessage>)>>,
}

impl CallbackInbox {
    /// `app_origin` is the origin of the application window, e.g.
    /// `https://app.example.com`.
    pub fn new(app_origin: &str) -> Result<Self> {
        let app_origin = normalize_origin(app_origin)
            .ok_or_else(|| AuthError::config(format!("Invalid application origin: {app_origin}")))?;
        Ok(Self {
            app_origin,
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn app_origin(&self) -> &str {
        &self.app_origin
    }

    pub fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<CallbackMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, tx));
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Validate `message` and fan it out. Returns whether it was accepted.
    pub fn deliver(&self, message: &WindowMessage) -> bool {
        let Some(callback) = parse_callback_message(message, &self.app_origin) else {
            return false;
        };
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|(_, tx)| tx.send(callback.clone()).is_ok());
        debug!(subscribers = subscribers.len(), "Delivered OAuth callback message");
        true
    }
}
