//! Native Google API client.
//!
//! Direct HTTP via reqwest, no SDK. Modules:
//! - auth: authorization URL, one-time code exchange, token refresh
//! - sheets: Sheets API v4 reads (tab listing + value grids)

pub mod auth;
pub mod sheets;

use serde::Deserialize;

// ============================================================================
// Token endpoint payload
// ============================================================================

/// Successful response from the provider token endpoint, for both the
/// authorization-code and refresh-token grants. Refresh responses usually
/// omit `refresh_token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// Authorization-code exchange failed. Surfaced to the user as
/// "authentication failed, please retry" — never folded into a plain
/// "not logged in".
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authorization code rejected (invalid, expired, or already used)")]
    InvalidCode,
    #[error("token exchange failed: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
    #[error("authorization flow cancelled")]
    FlowCancelled,
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Silent refresh failed. Never shown directly; the session check reports
/// unauthenticated and the caller re-runs authorization.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("refresh token expired or revoked")]
    Expired,
    #[error("token refresh failed: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

/// Spreadsheet read failed. Variants keep "bad input" (not found, denied)
/// distinguishable from transient transport trouble.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("access token expired or revoked")]
    AuthExpired,
    #[error("permission denied for spreadsheet {0}")]
    PermissionDenied(String),
    #[error("spreadsheet or sheet not found: {0}")]
    NotFound(String),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}
