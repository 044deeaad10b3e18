use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use axum_server::tls_openssl::OpenSSLConfig;
use keygate::tls::parse_key_pair;
use keygate::{TlsPolicy, router};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use reqwest::StatusCode;
use reqwest::tls::Version;
use secrecy::SecretString;

use crate::common::{
    MockBackend, REQUEST_TIMEOUT, SERVER_CERT, SERVER_KEY, StaticResolver, alice_signature,
    context,
};

async fn start_listener() -> (SocketAddr, Handle) {
    let mut backend = MockBackend::new();
    backend
        .expect_issue_token_with_role()
        .returning(|_, role| Ok(SecretString::from(format!("s.{role}"))));

    let pair = parse_key_pair(SERVER_CERT, SERVER_KEY).unwrap();
    let tls = TlsPolicy::default().acceptor(&pair).unwrap();
    let app = router(
        context(Arc::new(StaticResolver::alice()), Arc::new(backend)),
        REQUEST_TIMEOUT,
    );

    let handle = Handle::new();
    let server = axum_server::bind_openssl(
        SocketAddr::from(([127, 0, 0, 1], 0)),
        OpenSSLConfig::from_acceptor(Arc::new(tls)),
    )
    .handle(handle.clone())
    .serve(app.into_make_service());
    tokio::spawn(server);

    let addr = handle.listening().await.expect("listener bound");
    (addr, handle)
}

fn client(addr: SocketAddr, max_version: Option<Version>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .resolve("localhost", addr)
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(5));
    if let Some(version) = max_version {
        builder = builder.max_tls_version(version);
    }
    builder.build().unwrap()
}

async fn issue(client: &reqwest::Client, addr: SocketAddr, signature: &str) -> (StatusCode, String) {
    let response = client
        .post(format!("https://localhost:{}/token/issue/deploy", addr.port()))
        .header("X-Vault-Client", "alice")
        .header("X-Vault-Signature", signature)
        .body("{}")
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_issues_over_tls() {
    let (addr, handle) = start_listener().await;

    let (status, body) = issue(&client(addr, None), addr, alice_signature()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "s.deploy");

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

#[tokio::test]
async fn test_accepts_tls12_clients() {
    let (addr, handle) = start_listener().await;

    let (status, body) = issue(&client(addr, Some(Version::TLS_1_2)), addr, alice_signature()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "s.deploy");

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

#[tokio::test]
async fn test_rejects_over_tls() {
    let (addr, handle) = start_listener().await;

    let (status, body) = issue(&client(addr, None), addr, "AAAA").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Unauthorized");

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

#[tokio::test]
async fn test_plain_http_is_refused() {
    let (addr, handle) = start_listener().await;

    let result = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/token/issue/deploy", addr.port()))
        .timeout(Duration::from_secs(5))
        .send()
        .await;
    assert!(result.is_err() || result.is_ok_and(|r| !r.status().is_success()));

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

/// TLS 1.2 handshake offering only `ciphers` and `groups`. Returns the
/// negotiated suite, or `None` if the handshake failed.
async fn negotiate(addr: SocketAddr, ciphers: &'static str, groups: &'static str) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        let mut builder = SslConnector::builder(SslMethod::tls_client()).ok()?;
        builder.set_verify(SslVerifyMode::NONE);
        builder.set_max_proto_version(Some(SslVersion::TLS1_2)).ok()?;
        builder.set_cipher_list(ciphers).ok()?;
        builder.set_groups_list(groups).ok()?;

        let tcp = TcpStream::connect(addr).ok()?;
        let stream = builder
            .build()
            .configure()
            .ok()?
            .verify_hostname(false)
            .connect("localhost", tcp)
            .ok()?;
        stream.ssl().current_cipher().map(|c| c.name().to_string())
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_every_listed_tls12_suite_is_offered() {
    let (addr, handle) = start_listener().await;

    for suite in [
        "ECDHE-RSA-AES128-GCM-SHA256",
        "ECDHE-RSA-AES256-GCM-SHA384",
        "ECDHE-RSA-AES256-SHA",
        "AES256-GCM-SHA384",
        "AES256-SHA",
    ] {
        let negotiated = negotiate(addr, suite, "P-256").await;
        assert_eq!(negotiated.as_deref(), Some(suite), "suite {suite}");
    }

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

#[tokio::test]
async fn test_unlisted_tls12_suite_is_refused() {
    let (addr, handle) = start_listener().await;

    for suite in ["ECDHE-RSA-CHACHA20-POLY1305", "ECDHE-RSA-AES128-SHA", "AES128-GCM-SHA256"] {
        assert_eq!(negotiate(addr, suite, "P-256").await, None, "suite {suite}");
    }

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

#[tokio::test]
async fn test_every_listed_curve_is_offered() {
    let (addr, handle) = start_listener().await;

    for group in ["P-521", "P-384", "P-256"] {
        let negotiated = negotiate(addr, "ECDHE-RSA-AES128-GCM-SHA256", group).await;
        assert_eq!(
            negotiated.as_deref(),
            Some("ECDHE-RSA-AES128-GCM-SHA256"),
            "group {group}"
        );
    }
    assert_eq!(
        negotiate(addr, "ECDHE-RSA-AES128-GCM-SHA256", "X25519").await,
        None
    );

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

#[tokio::test]
async fn test_server_order_wins() {
    let (addr, handle) = start_listener().await;

    let negotiated = negotiate(
        addr,
        "AES256-SHA:ECDHE-RSA-AES256-SHA:ECDHE-RSA-AES128-GCM-SHA256",
        "P-384:P-256",
    )
    .await;
    assert_eq!(negotiated.as_deref(), Some("ECDHE-RSA-AES128-GCM-SHA256"));

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}
