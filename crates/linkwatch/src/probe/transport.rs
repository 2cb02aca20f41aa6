use std::net::IpAddr;

use tracing::warn;
use url::Url;

use crate::error::TransportError;

/// Transport that can tell whether a target is reachable
///
/// Implementations do not enforce deadlines or measure latency; the
/// [`Probe`](super::Probe) wraps every call with both.
#[async_trait::async_trait]
pub trait Reachability: Send + Sync {
    /// Attempt to reach the target once
    async fn reach(&self) -> Result<(), TransportError>;

    /// Human-readable target, used for logging
    fn target(&self) -> &str;
}

/// HTTP reachability check
///
/// Sends a `HEAD` request; any HTTP response means the network path works,
/// whatever its status code.
pub struct HttpReachability {
    client: reqwest::Client,
    target: String,
}

impl HttpReachability {
    pub fn new(target: &str) -> Result<Self, TransportError> {
        validate_http_target(target)?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Other(format!("HTTP client setup failed: {e}")))?;

        Ok(Self { client, target: target.to_string() })
    }
}

#[async_trait::async_trait]
impl Reachability for HttpReachability {
    async fn reach(&self) -> Result<(), TransportError> {
        self.client
            .head(&self.target)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(())
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// TCP connect check against `host:port`
pub struct TcpReachability {
    target: String,
}

impl TcpReachability {
    pub fn new(target: &str) -> Result<Self, TransportError> {
        validate_tcp_target(target)?;
        Ok(Self { target: target.to_string() })
    }
}

#[async_trait::async_trait]
impl Reachability for TcpReachability {
    async fn reach(&self) -> Result<(), TransportError> {
        tokio::net::TcpStream::connect(&self.target)
            .await
            .map_err(|e| TransportError::Network(format!("TCP connection failed: {e}")))?;
        Ok(())
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Validate an HTTP/HTTPS probe target
fn validate_http_target(target: &str) -> Result<(), TransportError> {
    let url = Url::parse(target).map_err(|e| TransportError::Other(format!("Invalid URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TransportError::Other(format!("Invalid scheme for HTTP probe: {other}")));
        }
    }

    if url.host_str().is_none() {
        return Err(TransportError::Other("HTTP probe target has no host".to_string()));
    }

    if url.port() == Some(0) {
        return Err(TransportError::Other("Port 0 is not valid".to_string()));
    }

    Ok(())
}

/// Validate a TCP probe target of the form `host:port`
fn validate_tcp_target(target: &str) -> Result<(), TransportError> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| TransportError::Other("TCP target must be in format host:port".into()))?;

    if host.is_empty() {
        return Err(TransportError::Other("TCP target has no host".into()));
    }

    let port: u16 =
        port.parse().map_err(|_| TransportError::Other("Invalid port number".into()))?;
    if port == 0 {
        return Err(TransportError::Other("Port 0 is not valid".into()));
    }

    if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        if ip.is_loopback() {
            warn!(%target, "TCP probe targets a loopback address and cannot detect outages");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_target() {
        assert!(validate_http_target("https://www.google.com/favicon.ico").is_ok());
        assert!(validate_http_target("http://example.com:8080").is_ok());

        assert!(validate_http_target("ftp://example.com").is_err());
        assert!(validate_http_target("not a url").is_err());
        assert!(validate_http_target("http://example.com:0").is_err());
    }

    #[test]
    fn test_validate_tcp_target() {
        assert!(validate_tcp_target("1.1.1.1:53").is_ok());
        assert!(validate_tcp_target("example.com:443").is_ok());
        assert!(validate_tcp_target("[::1]:80").is_ok());

        assert!(validate_tcp_target("example.com").is_err());
        assert!(validate_tcp_target("example.com:").is_err());
        assert!(validate_tcp_target(":80").is_err());
        assert!(validate_tcp_target("example.com:0").is_err());
    }

    #[tokio::test]
    async fn test_tcp_refused_is_network_error() {
        // Bind then drop to find a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = TcpReachability::new(&addr.to_string()).unwrap();
        let result = transport.reach().await;
        assert!(matches!(result, Err(TransportError::Network(_))));
    }

    #[tokio::test]
    async fn test_tcp_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = TcpReachability::new(&addr.to_string()).unwrap();
        assert!(transport.reach().await.is_ok());
    }
}
