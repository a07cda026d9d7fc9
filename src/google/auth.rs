//! OAuth2 authorization flow against the provider token endpoint.
//!
//! Builds the consent URL, exchanges the one-time authorization code,
//! and refreshes expired access tokens. The endpoint itself sits behind
//! the [`TokenEndpoint`] trait so the session lifecycle can be tested
//! without a network.
//!
//! Also carries the localhost redirect capture used by the CLI consent
//! flow: bind a listener, open the browser, read the code off the
//! redirect request.

use std::io::{Read, Write};
use std::net::TcpListener;

use async_trait::async_trait;

use super::{ExchangeError, RefreshError, TokenGrant};
use crate::config::OauthConfig;

/// Build the provider consent URL for the configured client.
///
/// Pure function of the config: no session state is touched or consumed,
/// so callers may build the URL any number of times. `access_type=offline`
/// + `prompt=consent` ask the provider to grant a refresh token.
pub fn authorization_url(config: &OauthConfig) -> String {
    let scope_string = config.scopes.join(" ");
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        config.auth_uri,
        urlencode(&config.client_id),
        urlencode(&config.redirect_uri),
        urlencode(&scope_string),
    )
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

// ============================================================================
// Token endpoint
// ============================================================================

/// The provider's token endpoint: code exchange and refresh grants.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange a one-time authorization code for a token grant. Codes are
    /// single-use by provider contract; a consumed code fails with
    /// [`ExchangeError::InvalidCode`].
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ExchangeError>;

    /// Trade a refresh token for a fresh access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError>;
}

/// Real token endpoint over HTTPS.
pub struct HttpTokenEndpoint {
    config: OauthConfig,
    client: reqwest::Client,
}

impl HttpTokenEndpoint {
    pub fn new(config: OauthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ExchangeError> {
        let mut form = vec![
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let resp = self
            .client
            .post(&self.config.token_uri)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_exchange_error(status.as_u16(), &body));
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|e| ExchangeError::MalformedResponse(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let mut form = vec![
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let resp = self
            .client
            .post(&self.config.token_uri)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_refresh_error(status.as_u16(), &body));
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|e| RefreshError::MalformedResponse(e.to_string()))
    }
}

/// `invalid_grant` on the code grant means the code is bad or already
/// consumed — a distinct, retry-authorization outcome.
fn map_exchange_error(status: u16, body: &str) -> ExchangeError {
    if (status == 400 || status == 401) && body.to_lowercase().contains("invalid_grant") {
        return ExchangeError::InvalidCode;
    }
    ExchangeError::Rejected {
        status,
        message: body.to_string(),
    }
}

fn map_refresh_error(status: u16, body: &str) -> RefreshError {
    let lowered = body.to_lowercase();
    if (status == 400 || status == 401)
        && (lowered.contains("invalid_grant") || lowered.contains("token has been expired"))
    {
        return RefreshError::Expired;
    }
    RefreshError::Rejected {
        status,
        message: body.to_string(),
    }
}

// ============================================================================
// Localhost redirect capture (CLI consent flow)
// ============================================================================

/// Block until the provider redirects the browser back to `listener`,
/// then extract the `code` query parameter from the request line.
pub fn capture_redirect_code(listener: &TcpListener) -> Result<String, ExchangeError> {
    let (mut stream, _) = listener.accept()?;

    let mut buffer = [0u8; 4096];
    let n = stream.read(&mut buffer)?;
    let request = String::from_utf8_lossy(&buffer[..n]);

    // Request line looks like: GET /?code=xxx&scope=... HTTP/1.1
    let code = request.lines().next().and_then(|line| {
        let path = line.split_whitespace().nth(1)?;
        let query = path.split('?').nth(1)?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
    });

    match code {
        Some(code) if !code.is_empty() => {
            send_response(
                &mut stream,
                "Authorization successful. You can close this tab.",
            );
            Ok(code)
        }
        _ => {
            send_response(
                &mut stream,
                "Authorization was not completed. You can close this tab.",
            );
            Err(ExchangeError::FlowCancelled)
        }
    }
}

fn send_response(stream: &mut impl Write, message: &str) {
    let body = format!(
        "<html><body style=\"font-family: system-ui; text-align: center; padding: 40px;\">\
         <h2>{}</h2></body></html>",
        message
    );
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
