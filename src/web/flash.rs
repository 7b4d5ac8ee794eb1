//! One-shot flash messages
//!
//! A view that redirects stores its messages in a cookie; the next page
//! that renders them also expires the cookie.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

pub const FLASH_COOKIE: &str = "polls_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            text: text.into(),
        }
    }
}

/// Messages carried over from the previous response
#[derive(Debug, Clone, Default)]
pub struct Flash(pub Vec<FlashMessage>);

impl Flash {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let messages = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|cookie| cookie.trim().strip_prefix(FLASH_COOKIE)?.strip_prefix('='))
            .find_map(decode)
            .unwrap_or_default();
        Self(messages)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

fn decode(raw: &str) -> Option<Vec<FlashMessage>> {
    let json = urlencoding::decode(raw).ok()?;
    match serde_json::from_str(&json) {
        Ok(messages) => Some(messages),
        Err(e) => {
            tracing::debug!("Ignoring malformed flash cookie: {}", e);
            None
        }
    }
}

/// `Set-Cookie` value storing `messages`
pub fn set_cookie(messages: &[FlashMessage]) -> String {
    let json = serde_json::to_string(messages).unwrap_or_else(|_| "[]".to_string());
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        urlencoding::encode(&json)
    )
}

/// `Set-Cookie` value expiring the flash cookie
pub fn clear_cookie() -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", FLASH_COOKIE)
}
