//! Bootstrap configuration tests.
//!
//! Covers:
//! - Loading from a local file
//! - Replace semantics across consecutive loads
//! - Malformed and missing documents leaving the cache empty
//! - Fetching over plain HTTP and over TLS

use boring::asn1::Asn1Time;
use boring::bn::BigNum;
use boring::hash::MessageDigest;
use boring::pkey::{PKey, Private};
use boring::rsa::Rsa;
use boring::ssl::{SslAcceptor, SslConnector, SslMethod};
use boring::x509::extension::SubjectAlternativeName;
use boring::x509::{X509NameBuilder, X509};
use hostcache::config::{load_configuration, try_load_configuration, try_load_configuration_with};
use hostcache::{ConfigSource, DnsContext, HostCache, NetError};
use std::fs;
use tempfile::tempdir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

const CONFIG_A: &str = r#"{
    "a1.example": [{"ip": "192.0.2.1", "locale": "US"}],
    "a2.example": ["192.0.2.2", "2001:db8::2"]
}"#;

const CONFIG_B: &str = r#"{
    "b1.example": [{"ip": "198.51.100.1", "locale": "DE"}]
}"#;

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hosts.json");
    fs::write(&path, CONFIG_A).unwrap();

    let cache = HostCache::new();
    assert!(load_configuration(&cache, &ConfigSource::Path(path)).await);

    assert_eq!(cache.len(), 2);
    let a1 = cache.lookup("a1.example").unwrap();
    assert_eq!(a1.nodes()[0].locale.as_deref(), Some("US"));
    assert_eq!(cache.lookup("a2.example").unwrap().len(), 2);
}

#[tokio::test]
async fn test_second_load_replaces_first() {
    let cache = HostCache::new();

    assert!(load_configuration(&cache, &ConfigSource::Inline(CONFIG_A.into())).await);
    assert!(load_configuration(&cache, &ConfigSource::Inline(CONFIG_B.into())).await);

    let mut hosts = cache.hosts();
    hosts.sort();
    assert_eq!(hosts, vec!["b1.example".to_string()]);
}

#[tokio::test]
async fn test_load_discards_resolved_entries() {
    let cache = HostCache::new();
    cache.upsert_address("resolved.example", "203.0.113.1");

    assert!(load_configuration(&cache, &ConfigSource::Inline(CONFIG_B.into())).await);
    assert!(cache.lookup("resolved.example").is_none());
}

#[tokio::test]
async fn test_malformed_document_leaves_cache_empty() {
    let cache = HostCache::new();
    assert!(load_configuration(&cache, &ConfigSource::Inline(CONFIG_A.into())).await);

    let result = try_load_configuration(&cache, &ConfigSource::Inline("[\"nope\"]".into())).await;

    assert!(matches!(result, Err(NetError::ConfigLoadFailed { .. })));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_missing_file_leaves_cache_empty() {
    let dir = tempdir().unwrap();
    let cache = HostCache::new();
    cache.upsert_address("old.example", "192.0.2.1");

    let source = ConfigSource::Path(dir.path().join("does-not-exist.json"));
    assert!(!load_configuration(&cache, &source).await);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_partially_valid_document_loads_valid_entries() {
    let doc = r#"{
        "ok.example": ["192.0.2.10"],
        "broken.example": "192.0.2.11",
        "": ["192.0.2.12"]
    }"#;
    let cache = HostCache::new();

    let source = ConfigSource::Inline(doc.into());
    let loaded = try_load_configuration(&cache, &source).await.unwrap();
    assert_eq!(loaded, 1);
    assert!(cache.lookup("ok.example").is_some());
    assert!(cache.lookup("broken.example").is_none());
}

/// Answer one HTTP/1.1 request on `socket` with `status` and `body`.
async fn respond<S>(socket: &mut S, status: &str, body: &str)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 1024];
    let _ = socket.read(&mut buf).await;
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n",
        status,
        body.len()
    );
    let response = format!("{}Connection: close\r\n\r\n{}", head, body);
    socket.write_all(response.as_bytes()).await.unwrap();
    let _ = socket.shutdown().await;
}

/// Serve `body` once over HTTP/1.1 with the given status line.
async fn serve_once(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        respond(&mut socket, status, body).await;
    });

    format!("http://{}/hosts.json", addr)
}

/// Self-signed certificate for 127.0.0.1, with its key.
fn self_signed() -> (X509, PKey<Private>) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "127.0.0.1").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    let not_before = Asn1Time::days_from_now(0).unwrap();
    builder.set_not_before(&not_before).unwrap();
    let not_after = Asn1Time::days_from_now(1).unwrap();
    builder.set_not_after(&not_after).unwrap();
    let san = SubjectAlternativeName::new()
        .ip("127.0.0.1")
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (builder.build(), key)
}

/// Serve `body` once over TLS with a fresh self-signed certificate.
///
/// Returns the document URL and the certificate clients must trust.
async fn serve_tls_once(body: &'static str) -> (String, X509) {
    let (cert, key) = self_signed();
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let Ok(mut stream) = tokio_boring::accept(&acceptor, socket).await else {
            return;
        };
        respond(&mut stream, "200 OK", body).await;
    });

    (format!("https://{}/hosts.json", addr), cert)
}

fn trusting(cert: &X509) -> SslConnector {
    let mut builder = SslConnector::builder(SslMethod::tls()).unwrap();
    builder.cert_store_mut().add_cert(cert.clone()).unwrap();
    builder.build()
}

#[tokio::test]
async fn test_load_over_http() {
    let url = serve_once("200 OK", CONFIG_B).await;
    let cache = HostCache::new();

    assert!(load_configuration(&cache, &ConfigSource::parse(&url)).await);
    assert!(cache.lookup("b1.example").is_some());
}

#[tokio::test]
async fn test_http_error_status_fails_load() {
    let url = serve_once("404 Not Found", "{}").await;
    let cache = HostCache::new();
    cache.upsert_address("old.example", "192.0.2.1");

    let result = try_load_configuration(&cache, &ConfigSource::parse(&url)).await;
    assert!(matches!(result, Err(NetError::ConfigLoadFailed { .. })));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_load_over_https() {
    let (url, cert) = serve_tls_once(CONFIG_B).await;
    let cache = HostCache::new();
    let source = ConfigSource::parse(&url);
    let tls = trusting(&cert);

    let loaded = try_load_configuration_with(&cache, &source, &tls).await;
    assert!(matches!(loaded, Ok(1)));
    let record = cache.lookup("b1.example").unwrap();
    assert_eq!(record.nodes()[0].locale.as_deref(), Some("DE"));
}

#[tokio::test]
async fn test_https_untrusted_certificate_fails_load() {
    let (url, _cert) = serve_tls_once(CONFIG_B).await;
    let cache = HostCache::new();
    cache.upsert_address("old.example", "192.0.2.1");

    let result = try_load_configuration(&cache, &ConfigSource::parse(&url)).await;
    assert!(matches!(result, Err(NetError::SslProtocolError)));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_context_uses_configured_bootstrap_tls() {
    let (url, cert) = serve_tls_once(CONFIG_A).await;
    let ctx = DnsContext::builder()
        .bootstrap_tls(trusting(&cert))
        .build()
        .unwrap();

    assert!(ctx.load_configuration(&ConfigSource::parse(&url)).await);
    assert_eq!(ctx.cache().len(), 2);
}
