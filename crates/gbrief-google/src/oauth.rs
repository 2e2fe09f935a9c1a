//! OAuth 2.0 consent and refresh against Google's token endpoint.
//!
//! Consent uses the authorization code flow with PKCE and a loopback
//! redirect, which is what Google expects from desktop applications:
//!
//! 1. Generate a code verifier, its SHA-256 challenge and a random state
//! 2. Bind a listener on `127.0.0.1`
//! 3. Send the user to the consent page (printed, and opened in a browser)
//! 4. Read the authorization code from the redirect
//! 5. Exchange the code and verifier for tokens

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{Authorizer, BoxFuture};
use crate::secrets::ClientSecret;
use crate::tokens::Credential;

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// How long to wait for the browser to come back with a code.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Path the consent page redirects to.
const CALLBACK_PATH: &str = "/callback";

/// Google implementation of [`Authorizer`].
///
/// The client secret file is read lazily: a cached credential that already
/// carries its client id and secret refreshes without it.
#[derive(Debug)]
pub struct OAuthClient {
    secret_path: PathBuf,
    http_client: reqwest::Client,
    port_range: (u16, u16),
    open_browser: bool,
    callback_timeout: Duration,
}

impl OAuthClient {
    /// Creates a client that reads the OAuth client secret from `secret_path`.
    pub fn new(secret_path: impl Into<PathBuf>, http_client: reqwest::Client) -> Self {
        Self {
            secret_path: secret_path.into(),
            http_client,
            port_range: (0, 0),
            open_browser: true,
            callback_timeout: CALLBACK_TIMEOUT,
        }
    }

    /// Sets the ports tried for the loopback listener. `(0, 0)` lets the OS pick.
    pub fn with_port_range(mut self, port_range: (u16, u16)) -> Self {
        self.port_range = port_range;
        self
    }

    /// Sets whether the consent page is opened in the default browser.
    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Loads the OAuth client secret.
    pub fn client_secret(&self) -> ProviderResult<ClientSecret> {
        ClientSecret::from_file(&self.secret_path)
    }

    /// Runs the consent flow and returns a fresh credential.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the client secret is missing or no
    /// port can be bound, and an authentication error if the user declines,
    /// the callback times out, or the code exchange fails.
    pub async fn run_consent(&self, scopes: &[String]) -> ProviderResult<Credential> {
        let secret = self.client_secret()?;
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback_server(self.port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);
        let auth_url = pkce.build_auth_url(&secret, &redirect_uri, scopes);

        debug!("authorization URL: {}", auth_url);
        eprintln!(
            "Please visit this URL to authorize this application:\n\n{}\n",
            auth_url
        );

        if self.open_browser {
            if let Err(e) = open::that(&auth_url) {
                warn!("failed to open browser: {}", e);
            }
        }

        let (code, received_state) = wait_for_callback(listener, self.callback_timeout)?;

        if received_state != pkce.state {
            return Err(ProviderError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens");

        let params = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("code", code.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let response = self.token_request(&secret.token_uri, &params).await?;

        let granted = response
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_else(|| scopes.to_vec());

        info!("obtained tokens via consent");
        Ok(Credential::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            granted,
        )
        .with_client(&secret))
    }

    /// Exchanges the credential's refresh token for a new access token.
    pub async fn refresh_credential(&self, credential: &Credential) -> ProviderResult<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| ProviderError::authentication("credential has no refresh token"))?;

        let (client_id, client_secret) =
            match (credential.client_id.clone(), credential.client_secret.clone()) {
                (Some(id), Some(secret)) => (id, secret),
                _ => {
                    let secret = self.client_secret()?;
                    (secret.client_id, secret.client_secret)
                }
            };

        let params = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.token_request(&credential.token_uri, &params).await?;

        let mut refreshed = credential.clone();
        refreshed.client_id = Some(client_id);
        refreshed.client_secret = Some(client_secret);
        refreshed.apply_refresh(
            response.access_token,
            response.expires_in,
            response.refresh_token,
            response.scope.as_deref(),
        );

        info!("refreshed access token");
        Ok(refreshed)
    }

    /// Posts a form to the token endpoint.
    ///
    /// Every failure here is an authentication error, transport failures included.
    async fn token_request(
        &self,
        token_uri: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::authentication(format!("token request failed: {}", e))
                    .with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::authentication(format!("failed to read token response: {}", e))
                .with_source(e)
        })?;

        if !status.is_success() {
            return Err(token_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::authentication(format!("invalid token response: {}", e)).with_source(e)
        })
    }
}

impl Authorizer for OAuthClient {
    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(self.refresh_credential(credential))
    }

    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(self.run_consent(scopes))
    }
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn token_error(status: u16, body: &str) -> ProviderError {
    let detail = match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(TokenErrorBody {
            error,
            error_description: Some(description),
        }) => format!("{}: {}", error, description),
        Ok(TokenErrorBody { error, .. }) => error,
        Err(_) => body.trim().to_string(),
    };
    ProviderError::authentication(format!("token endpoint returned {}: {}", status, detail))
}

/// Binds the callback listener on the first free port in `port_range`.
fn bind_loopback_server(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) else {
            continue;
        };
        let bound = listener
            .local_addr()
            .map_err(|e| {
                ProviderError::internal(format!("failed to read listener address: {}", e))
            })?
            .port();
        debug!("bound loopback server on port {}", bound);
        return Ok((listener, bound));
    }
    Err(ProviderError::configuration(format!(
        "no available port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Blocks until the redirect arrives or `timeout` passes.
fn wait_for_callback(listener: TcpListener, timeout: Duration) -> ProviderResult<(String, String)> {
    let (tx, rx) = mpsc::channel();

    // The accept loop runs on its own thread so the wait can time out
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = handle_callback(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => error!("failed to accept connection: {}", e),
            }
        }
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ProviderError::authentication(format!(
            "no authorization received within {} seconds",
            timeout.as_secs()
        ))),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ProviderError::internal("callback channel disconnected"))
        }
    }
}

/// Answers one browser request; returns `None` for requests to ignore.
fn handle_callback(mut stream: TcpStream) -> Option<ProviderResult<(String, String)>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let result = parse_callback(&request_line)?;

    let response = if result.is_ok() {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>Authorization complete</h1>\
        <p>You can close this window and return to the terminal.</p></body></html>"
    } else {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>Authorization failed</h1>\
        <p>You can close this window.</p></body></html>"
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    Some(result)
}

/// Parses `GET /callback?code=...&state=... HTTP/1.1`.
///
/// Returns `None` for anything that is not a callback request (favicon
/// fetches and the like).
fn parse_callback(request_line: &str) -> Option<ProviderResult<(String, String)>> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }

    let target = parts.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;

    for (key, value) in query.split('&').filter_map(|p| p.split_once('=')) {
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => error = Some(value),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(ProviderError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    Some(match code {
        Some(code) => Ok((code, state.unwrap_or_default())),
        None => Err(ProviderError::authentication(
            "missing authorization code in callback",
        )),
    })
}

/// PKCE flow state.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = compute_challenge(&verifier);
        let state = random_token(16);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    /// Builds the consent page URL.
    pub fn build_auth_url(
        &self,
        secret: &ClientSecret,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            secret.auth_uri,
            urlencoding::encode(&secret.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

fn compute_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    fn secret() -> ClientSecret {
        ClientSecret::new("test-client.apps.googleusercontent.com", "shh")
    }

    #[test]
    fn pkce_verifier_length() {
        // Base64 encoding of 32 bytes = 43 characters (no padding)
        assert_eq!(PkceFlow::new().verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_matches_rfc_example() {
        // RFC 7636 appendix B
        assert_eq!(
            compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn pkce_values_are_random() {
        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_ne!(a.challenge, b.challenge);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            &secret(),
            "http://127.0.0.1:8080/callback",
            &[
                "https://www.googleapis.com/auth/calendar.readonly".to_string(),
                "https://www.googleapis.com/auth/gmail.modify".to_string(),
            ],
        );

        assert!(url.starts_with(crate::secrets::GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=test-client.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2Fcallback"));
        assert!(url.contains("calendar.readonly%20https"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={}", flow.state)));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn parse_callback_with_code_and_state() {
        let result = parse_callback("GET /callback?state=xyz&code=4%2F0Ab&scope=a HTTP/1.1\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(result, ("4/0Ab".to_string(), "xyz".to_string()));
    }

    #[test]
    fn parse_callback_denied() {
        let err = parse_callback("GET /callback?error=access_denied&state=xyz HTTP/1.1")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn parse_callback_ignores_other_requests() {
        assert!(parse_callback("GET /favicon.ico HTTP/1.1").is_none());
        assert!(parse_callback("POST /callback?code=a HTTP/1.1").is_none());
        assert!(parse_callback("").is_none());
    }

    #[test]
    fn parse_callback_missing_code() {
        let err = parse_callback("GET /callback?state=xyz HTTP/1.1")
            .unwrap()
            .unwrap_err();
        assert!(err.message().contains("missing authorization code"));
    }

    #[test]
    fn bind_os_assigned_port() {
        let (_listener, port) = bind_loopback_server((0, 0)).unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn callback_round_trip_over_loopback() {
        let (listener, port) = bind_loopback_server((0, 0)).unwrap();

        let browser = thread::spawn(move || {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream
                .write_all(b"GET /callback?code=abc&state=s1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .unwrap();
            let mut reply = String::new();
            BufReader::new(&stream).read_line(&mut reply).unwrap();
            reply
        });

        let (code, state) = wait_for_callback(listener, Duration::from_secs(10)).unwrap();
        assert_eq!(code, "abc");
        assert_eq!(state, "s1");
        assert!(browser.join().unwrap().starts_with("HTTP/1.1 200"));
    }

    #[test]
    fn callback_times_out() {
        let (listener, _port) = bind_loopback_server((0, 0)).unwrap();
        let err = wait_for_callback(listener, Duration::from_millis(50)).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
    }

    #[test]
    fn token_error_uses_description() {
        let err = token_error(
            400,
            r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#,
        );
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(
            err.message(),
            "token endpoint returned 400: invalid_grant: Token has been expired or revoked."
        );
    }

    #[tokio::test]
    async fn consent_without_client_secret_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = OAuthClient::new(
            dir.path().join("credentials.json"),
            reqwest::Client::new(),
        )
        .with_open_browser(false);

        let err = client
            .authorize(&["scope".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    /// Serves one token endpoint response on a loopback port and returns
    /// the URL plus a handle yielding the form body it received.
    fn token_endpoint(
        status: &'static str,
        body: &'static str,
    ) -> (String, thread::JoinHandle<String>) {
        use std::io::Read;

        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(&stream);
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line.trim().is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut form = vec![0; content_length];
            reader.read_exact(&mut form).unwrap();

            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            (&stream).write_all(reply.as_bytes()).unwrap();
            String::from_utf8(form).unwrap()
        });
        (format!("http://127.0.0.1:{}/token", port), server)
    }

    fn expired_credential(token_uri: String) -> Credential {
        let mut credential =
            Credential::new("stale", Some("r".into()), Some(-10), vec!["old".into()]);
        credential.client_id = Some("id".into());
        credential.client_secret = Some("s".into());
        credential.token_uri = token_uri;
        credential
    }

    #[tokio::test]
    async fn refresh_posts_form_and_keeps_refresh_token() {
        let (token_uri, server) = token_endpoint(
            "200 OK",
            r#"{"access_token": "fresh", "expires_in": 3599, "scope": "a b", "token_type": "Bearer"}"#,
        );
        let client = OAuthClient::new("/nonexistent/credentials.json", reqwest::Client::new());

        let refreshed = client
            .refresh(&expired_credential(token_uri))
            .await
            .unwrap();

        assert_eq!(
            server.join().unwrap(),
            "client_id=id&client_secret=s&refresh_token=r&grant_type=refresh_token"
        );
        assert_eq!(refreshed.access_token(), Some("fresh"));
        assert_eq!(refreshed.refresh_token.as_deref(), Some("r"));
        assert_eq!(refreshed.scopes, vec!["a".to_string(), "b".to_string()]);
        assert!(refreshed.is_valid());
    }

    #[tokio::test]
    async fn refresh_rejected_by_endpoint_is_authentication_error() {
        let (token_uri, server) = token_endpoint(
            "400 Bad Request",
            r#"{"error": "invalid_grant", "error_description": "Bad Request"}"#,
        );
        let client = OAuthClient::new("/nonexistent/credentials.json", reqwest::Client::new());

        let err = client
            .refresh(&expired_credential(token_uri))
            .await
            .unwrap_err();
        server.join().unwrap();

        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(
            err.message(),
            "token endpoint returned 400: invalid_grant: Bad Request"
        );
    }

    #[tokio::test]
    async fn refresh_network_failure_is_authentication_error() {
        let port = TcpListener::bind(("127.0.0.1", 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = OAuthClient::new("/nonexistent/credentials.json", reqwest::Client::new());

        let err = client
            .refresh(&expired_credential(format!("http://127.0.0.1:{}/token", port)))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().starts_with("token request failed"));
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_before_network() {
        let client = OAuthClient::new("/nonexistent/credentials.json", reqwest::Client::new());
        let credential = Credential::new("expired", None, Some(-10), vec![]);

        let err = client.refresh(&credential).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
    }
}
