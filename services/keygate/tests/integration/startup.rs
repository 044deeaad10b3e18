use std::collections::HashMap;

use keygate::{Config, RenewalError, StartupError, TlsError, bootstrap};
use keygate_vault_client::VaultError;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{ALICE_PRIVATE, SERVER_CERT, SERVER_KEY};

const WRAPPED: &str = "s.wrapped";
const UNWRAPPED: &str = "s.unwrapped";

fn config(vault: &MockServer, renew: &str) -> Config {
    let env = HashMap::from([
        ("CHEF_SERVER", "https://chef.example.com/organizations/acme".to_string()),
        ("CHEF_CLIENT_NAME", "keygate".to_string()),
        ("VAULT_ADDR", vault.uri()),
        ("VAULT_TOKEN", WRAPPED.to_string()),
        ("SECRET_CERT_PATH", "secret/keygate/tls".to_string()),
        ("SECRET_CHEF_PEM_PATH", "secret/keygate/chef".to_string()),
        ("RENEW_TOKEN", renew.to_string()),
        ("LISTEN_ADDR", "127.0.0.1:0".to_string()),
    ]);
    Config::from_lookup(|name| env.get(name).cloned()).unwrap()
}

async fn mount_not_wrapped(vault: &MockServer) {
    Mock::given(method("PUT"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": ["wrapping token is not valid or does not exist"],
        })))
        .mount(vault)
        .await;
}

async fn mount_secrets(vault: &MockServer, token: &str, cert: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v1/secret/keygate/chef"))
        .and(header("X-Vault-Token", token))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"key": ALICE_PRIVATE},
            "lease_duration": 2_764_800,
            "renewable": false,
        })))
        .expect(1)
        .mount(vault)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/keygate/tls"))
        .and(header("X-Vault-Token", token))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": cert})))
        .expect(1)
        .mount(vault)
        .await;
}

async fn mount_lookup(vault: &MockServer, creation_ttl: u64) {
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "creation_ttl": creation_ttl,
                "ttl": creation_ttl,
                "renewable": true,
                "display_name": "token-keygate",
                "policies": ["default", "keygate"],
            }
        })))
        .mount(vault)
        .await;
}

fn certificate() -> serde_json::Value {
    json!({"cert": SERVER_CERT, "key": SERVER_KEY})
}

#[tokio::test]
async fn test_bootstrap_schedules_renewal() {
    let vault = MockServer::start().await;
    mount_not_wrapped(&vault).await;
    mount_secrets(&vault, WRAPPED, certificate()).await;
    mount_lookup(&vault, 900).await;

    let gateway = bootstrap(&config(&vault, "true")).await.unwrap();

    let lease = gateway.renewal.expect("renewal scheduled").lease();
    assert_eq!(lease.creation_ttl, 900);
    assert_eq!(lease.renewal_delay, 300);
    assert!(gateway.tls.context().certificate().is_some());
}

#[tokio::test]
async fn test_unwrapped_token_is_used_afterwards() {
    let vault = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .and(header("X-Vault-Token", WRAPPED))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": {"client_token": UNWRAPPED, "lease_duration": 3600, "renewable": true}
        })))
        .expect(1)
        .mount(&vault)
        .await;
    mount_secrets(&vault, UNWRAPPED, certificate()).await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", UNWRAPPED))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"creation_ttl": 3600}
        })))
        .expect(1)
        .mount(&vault)
        .await;

    let gateway = bootstrap(&config(&vault, "1")).await.unwrap();
    assert!(gateway.renewal.is_some());
}

#[tokio::test]
async fn test_unwrap_outage_falls_back_to_configured_token() {
    let vault = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&vault)
        .await;
    mount_secrets(&vault, WRAPPED, certificate()).await;

    let gateway = bootstrap(&config(&vault, "false")).await.unwrap();
    assert!(gateway.renewal.is_none());
}

#[tokio::test]
async fn test_renewal_disabled_skips_lookup() {
    let vault = MockServer::start().await;
    mount_not_wrapped(&vault).await;
    mount_secrets(&vault, WRAPPED, certificate()).await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&vault)
        .await;

    let gateway = bootstrap(&config(&vault, "false")).await.unwrap();
    assert!(gateway.renewal.is_none());
}

#[tokio::test]
async fn test_non_expiring_token_is_not_renewed() {
    let vault = MockServer::start().await;
    mount_not_wrapped(&vault).await;
    mount_secrets(&vault, WRAPPED, certificate()).await;
    mount_lookup(&vault, 0).await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .and(body_json(json!({"increment": 0})))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&vault)
        .await;

    let gateway = bootstrap(&config(&vault, "true")).await.unwrap();
    assert!(gateway.renewal.is_none());
}

#[tokio::test]
async fn test_lookup_failure_stops_startup() {
    let vault = MockServer::start().await;
    mount_not_wrapped(&vault).await;
    mount_secrets(&vault, WRAPPED, certificate()).await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": ["permission denied"],
        })))
        .mount(&vault)
        .await;

    let err = bootstrap(&config(&vault, "true")).await.err().unwrap();
    assert!(matches!(
        err,
        StartupError::Renewal(RenewalError::Lookup(VaultError::PermissionDenied(_)))
    ));
}

#[tokio::test]
async fn test_missing_chef_key_stops_startup() {
    let vault = MockServer::start().await;
    mount_not_wrapped(&vault).await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/keygate/chef"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .mount(&vault)
        .await;

    let err = bootstrap(&config(&vault, "true")).await.err().unwrap();
    assert!(matches!(err, StartupError::Backend(VaultError::SecretNotFound(_))));
}

#[tokio::test]
async fn test_certificate_without_key_stops_startup() {
    let vault = MockServer::start().await;
    mount_not_wrapped(&vault).await;
    mount_secrets(&vault, WRAPPED, json!({"cert": SERVER_CERT})).await;

    let err = bootstrap(&config(&vault, "true")).await.err().unwrap();
    assert!(matches!(err, StartupError::Backend(VaultError::ResponseFormat(_))));
}

#[tokio::test]
async fn test_unparseable_certificate_stops_startup() {
    let vault = MockServer::start().await;
    mount_not_wrapped(&vault).await;
    mount_secrets(
        &vault,
        WRAPPED,
        json!({"cert": "not a certificate", "key": SERVER_KEY}),
    )
    .await;

    let err = bootstrap(&config(&vault, "true")).await.err().unwrap();
    assert!(matches!(err, StartupError::Tls(TlsError::Certificate(_))));
}
