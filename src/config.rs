//! Bootstrap configuration loading.
//!
//! A bootstrap document is a JSON object mapping host names to the
//! addresses that should be cached for them before any resolution runs:
//!
//! ```json
//! {
//!   "api.example.com": [
//!     { "ip": "203.0.113.10", "locale": "US" },
//!     { "ip": "2001:db8::10", "locale": "DE" },
//!     "198.51.100.7"
//!   ]
//! }
//! ```
//!
//! Documents are read from a file, from memory, or fetched with an
//! HTTP/1.1 GET over plain TCP or BoringSSL.
//!
//! Loading replaces the whole cache. Individual entries that are malformed
//! are skipped; a document that is not a JSON object fails the load and
//! leaves the cache empty.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::cache::{AddressNode, HostCache};
use boring::ssl::{SslConnector, SslMethod};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use url::{Host, Position, Url};

/// Where a bootstrap document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Local file.
    Path(PathBuf),
    /// Remote document fetched with an HTTP GET.
    Url(Url),
    /// Document already in memory.
    Inline(String),
}

impl ConfigSource {
    /// Interpret `location` as an `http(s)://` URL or else a file path.
    pub fn parse(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ConfigSource::Url(url),
            _ => ConfigSource::Path(PathBuf::from(location)),
        }
    }

    /// Read the raw document.
    ///
    /// `https://` peers are verified with [`default_tls_connector`].
    pub async fn fetch(&self) -> Result<Vec<u8>, NetError> {
        self.read(None).await
    }

    /// Read the raw document, using `tls` for `https://` sources.
    pub async fn fetch_with(&self, tls: &SslConnector) -> Result<Vec<u8>, NetError> {
        self.read(Some(tls)).await
    }

    async fn read(&self, tls: Option<&SslConnector>) -> Result<Vec<u8>, NetError> {
        match self {
            ConfigSource::Path(path) => {
                let location = path.display().to_string();
                tokio::fs::read(path).await.config_context(&location)
            }
            ConfigSource::Url(url) => fetch_url(url, tls).await,
            ConfigSource::Inline(doc) => Ok(doc.clone().into_bytes()),
        }
    }
}

/// TLS connector used for `https://` sources when none is supplied.
///
/// Verifies peers against the system trust store and offers only HTTP/1.1.
pub fn default_tls_connector() -> Result<SslConnector, NetError> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;

    // Length-prefixed ALPN list.
    builder
        .set_alpn_protos(b"\x08http/1.1")
        .map_err(|_| NetError::SslProtocolError)?;

    Ok(builder.build())
}

async fn fetch_url(url: &Url, tls: Option<&SslConnector>) -> Result<Vec<u8>, NetError> {
    let secure = match url.scheme() {
        "http" => false,
        "https" => true,
        _ => return Err(NetError::DisallowedUrlScheme),
    };
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(NetError::InvalidUrl),
    };
    let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

    let connect = TcpStream::connect((host.as_str(), port));
    let stream = connect.await.map_err(|e| {
        tracing::debug!(url = %url, error = %e, "bootstrap connect failed");
        NetError::ConnectionFailed
    })?;

    if !secure {
        return request(TokioIo::new(stream), url).await;
    }

    let default_tls;
    let tls = match tls {
        Some(tls) => tls,
        None => {
            default_tls = default_tls_connector()?;
            &default_tls
        }
    };
    let config = tls.configure().map_err(|_| NetError::SslProtocolError)?;

    let handshake = tokio_boring::connect(config, &host, stream);
    let stream = handshake.await.map_err(|e| {
        tracing::debug!(url = %url, error = ?e, "bootstrap TLS handshake failed");
        NetError::SslProtocolError
    })?;

    request(TokioIo::new(stream), url).await
}

/// Issue a single GET for `url` over an established connection.
async fn request<S>(io: TokioIo<S>, url: &Url) -> Result<Vec<u8>, NetError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = http1::handshake(io)
        .await
        .map_err(|_| NetError::ConnectionFailed)?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "bootstrap connection closed with error");
        }
    });

    let path = &url[Position::BeforePath..Position::AfterQuery];
    let authority = &url[Position::BeforeHost..Position::AfterPort];
    let request = http::Request::get(path)
        .header(http::header::HOST, authority)
        .body(Empty::<Bytes>::new())
        .map_err(|_| NetError::InvalidUrl)?;

    let response = sender.send_request(request).await.map_err(|e| {
        tracing::debug!(url = %url, error = %e, "bootstrap request failed");
        NetError::ConnectionFailed
    })?;

    if !response.status().is_success() {
        let reason = format!("{} returned {}", url, response.status());
        return Err(NetError::config_load_failed(reason));
    }

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|_| NetError::InvalidResponse)?;
    Ok(body.to_bytes().to_vec())
}

/// One address in a bootstrap document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeSpec {
    Literal(String),
    Tagged {
        ip: String,
        #[serde(default)]
        locale: Option<String>,
    },
}

impl From<NodeSpec> for AddressNode {
    fn from(node: NodeSpec) -> Self {
        match node {
            NodeSpec::Literal(ip) => AddressNode::new(ip),
            NodeSpec::Tagged { ip, locale } => AddressNode {
                locale,
                ..AddressNode::new(ip)
            },
        }
    }
}

/// Parsed bootstrap document.
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    entries: Vec<(String, Vec<AddressNode>)>,
}

impl BootstrapConfig {
    /// Parse a JSON bootstrap document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, NetError> {
        let doc: Map<String, Value> = match serde_json::from_slice(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                let reason = format!("malformed document: {}", e);
                return Err(NetError::config_load_failed(reason));
            }
        };

        let mut entries: Vec<(String, Vec<AddressNode>)> = Vec::with_capacity(doc.len());
        for (host, value) in doc {
            if host.is_empty() {
                tracing::warn!("skipping bootstrap entry without host name");
                continue;
            }
            match serde_json::from_value::<Vec<NodeSpec>>(value) {
                Ok(nodes) => {
                    let nodes = nodes.into_iter().map(AddressNode::from).collect();
                    entries.push((host, nodes));
                }
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "skipping malformed entry");
                }
            }
        }

        Ok(Self { entries })
    }

    /// Number of host entries that parsed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, Vec<AddressNode>)> {
        self.entries
    }
}

/// Replace the contents of `cache` with the document at `source`.
///
/// The cache is cleared before anything is fetched, so any failure leaves
/// it empty. Returns the number of hosts loaded.
pub async fn try_load_configuration(
    cache: &HostCache,
    source: &ConfigSource,
) -> Result<usize, NetError> {
    cache.reset();
    let bytes = source.fetch().await?;
    load_document(cache, &bytes)
}

/// Like [`try_load_configuration`], verifying `https://` sources with `tls`.
pub async fn try_load_configuration_with(
    cache: &HostCache,
    source: &ConfigSource,
    tls: &SslConnector,
) -> Result<usize, NetError> {
    cache.reset();
    let bytes = source.fetch_with(tls).await?;
    load_document(cache, &bytes)
}

fn load_document(cache: &HostCache, bytes: &[u8]) -> Result<usize, NetError> {
    let config = BootstrapConfig::from_json(bytes)?;
    Ok(cache.load_bulk(config.into_entries()))
}

/// Like [`try_load_configuration`], reporting only success.
pub async fn load_configuration(cache: &HostCache, source: &ConfigSource) -> bool {
    log_outcome(try_load_configuration(cache, source).await)
}

pub(crate) fn log_outcome(result: Result<usize, NetError>) -> bool {
    match result {
        Ok(hosts) => {
            tracing::debug!(hosts, "bootstrap configuration loaded");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, code = e.as_i32(), "bootstrap configuration failed");
            false
        }
    }
}
