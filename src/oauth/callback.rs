use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::AuthflowError;

/// Per-iteration accept timeout. The overall deadline is re-checked after
/// every slice, so no background timer is needed.
const ACCEPT_SLICE: Duration = Duration::from_secs(1);

const SUCCESS_PAGE: &str = "<!DOCTYPE html>\
<html>\
<head>\
<title>Authentication Successful</title>\
<style>\
body { font-family: Arial, sans-serif; text-align: center; padding: 50px; }\
h1 { color: #4CAF50; }\
p { font-size: 16px; margin: 20px 0; }\
</style>\
</head>\
<body>\
<h1>&#10003; Authentication Successful</h1>\
<p>You can close this window now and return to your terminal.</p>\
<script>setTimeout(() => { window.close(); }, 3000);</script>\
</body>\
</html>";

/// Query parameters captured from the provider's redirect. Populated exactly
/// once per wait.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackResult {
    fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.state.is_none()
            && self.error.is_none()
            && self.error_description.is_none()
    }
}

/// Ephemeral local HTTP listener that captures a single OAuth redirect.
///
/// Binding and waiting are split so the redirect URI is known before the
/// browser is opened. The socket is owned by the listener and released on
/// every exit path when the value is dropped.
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
}

impl CallbackListener {
    /// Bind to an OS-assigned ephemeral port on the loopback interface.
    pub async fn bind() -> Result<Self, AuthflowError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.port)
    }

    /// Block until the redirect arrives or the overall timeout elapses.
    ///
    /// Services at most one request per iteration: requests outside
    /// `/callback` get a 404, CORS preflights a permissive 200; neither
    /// completes the wait.
    pub async fn wait_for_callback(
        self,
        overall_timeout: Duration,
    ) -> Result<CallbackResult, AuthflowError> {
        let started = Instant::now();

        loop {
            if started.elapsed() >= overall_timeout {
                return Err(AuthflowError::CallbackTimeout(overall_timeout));
            }

            let (stream, _) = match tokio::time::timeout(ACCEPT_SLICE, self.listener.accept()).await
            {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => return Err(e.into()),
                // Slice elapsed with no connection; re-check the deadline.
                Err(_) => continue,
            };

            // Connection I/O gets the same bounded slice, capped by the
            // remaining deadline, so a silent connection cannot stall the
            // wait past the overall timeout or starve a later redirect.
            let io_budget = ACCEPT_SLICE.min(overall_timeout.saturating_sub(started.elapsed()));
            match tokio::time::timeout(io_budget, handle_connection(stream)).await {
                Ok(Ok(Some(result))) => {
                    if result.is_empty() {
                        return Err(AuthflowError::CallbackEmpty);
                    }
                    return Ok(result);
                }
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => {
                    // A dropped or garbled connection must not abort the wait.
                    tracing::debug!("callback connection error: {e}");
                    continue;
                }
                Err(_) => {
                    tracing::debug!("callback connection sent no request within the slice");
                    continue;
                }
            }
        }
    }
}

/// Serve one connection. Returns the captured parameters when the request
/// was the OAuth redirect, `None` otherwise.
async fn handle_connection(mut stream: TcpStream) -> std::io::Result<Option<CallbackResult>> {
    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let (method, path) = match parse_request_line(&request) {
        Some(parts) => parts,
        None => {
            write_response(&mut stream, "400 Bad Request", "text/plain", "bad request").await?;
            return Ok(None);
        }
    };

    if method == "OPTIONS" {
        write_preflight_response(&mut stream).await?;
        return Ok(None);
    }

    if method != "GET" || !path.starts_with("/callback") {
        write_response(&mut stream, "404 Not Found", "text/plain", "not found").await?;
        return Ok(None);
    }

    let result = parse_callback_query(&path);
    write_response(&mut stream, "200 OK", "text/html", SUCCESS_PAGE).await?;
    Ok(Some(result))
}

fn parse_request_line(request: &str) -> Option<(&str, &str)> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    Some((method, path))
}

fn parse_callback_query(path: &str) -> CallbackResult {
    let mut result = CallbackResult::default();
    let query = match path.split_once('?') {
        Some((_, q)) => q,
        None => return result,
    };

    for param in query.split('&') {
        let (key, value) = match param.split_once('=') {
            Some(pair) => pair,
            None => continue,
        };
        let value = urldecode(value);
        match key {
            "code" => result.code = Some(value),
            "state" => result.state = Some(value),
            "error" => result.error = Some(value),
            "error_description" => result.error_description = Some(value),
            _ => {}
        }
    }
    result
}

async fn write_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

async fn write_preflight_response(stream: &mut TcpStream) -> std::io::Result<()> {
    let response = "HTTP/1.1 200 OK\r\n\
        Access-Control-Allow-Origin: *\r\n\
        Access-Control-Allow-Methods: GET, POST\r\n\
        Access-Control-Allow-Headers: Content-Type\r\n\
        Content-Length: 0\r\n\
        Connection: close\r\n\r\n";
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn urldecode(s: &str) -> String {
    // Decode into raw bytes first so multibyte UTF-8 escapes survive intact.
    let mut out = Vec::with_capacity(s.len());
    let mut bytes = s.bytes();
    while let Some(b) = bytes.next() {
        if b == b'%' {
            let hi = bytes.next();
            let lo = bytes.next();
            if let (Some(h), Some(l)) = (hi, lo) {
                let hex = [h, l];
                if let Ok(s) = std::str::from_utf8(&hex) {
                    if let Ok(val) = u8::from_str_radix(s, 16) {
                        out.push(val);
                        continue;
                    }
                }
            }
            out.push(b'%');
        } else if b == b'+' {
            out.push(b' ');
        } else {
            out.push(b);
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Check the redirect against the state issued for this attempt and extract
/// the authorization code. State is checked first: a mismatched state fails
/// even when a code is present.
pub fn validate_callback(
    result: &CallbackResult,
    expected_state: &str,
) -> Result<String, AuthflowError> {
    if result.state.as_deref() != Some(expected_state) {
        return Err(AuthflowError::StateMismatch);
    }

    if let Some(error) = &result.error {
        return Err(AuthflowError::AuthorizationDenied {
            error: error.clone(),
            description: result.error_description.clone(),
        });
    }

    match result.code.as_deref() {
        Some(code) if !code.is_empty() => Ok(code.to_string()),
        _ => Err(AuthflowError::CallbackEmpty),
    }
}
