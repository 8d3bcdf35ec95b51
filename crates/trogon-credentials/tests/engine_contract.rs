//! Behaviour every engine shares, exercised through the `Engine` trait.
//!
//! In-memory collaborators from `trogon_credentials::mocks` stand in for the
//! backends; the HTTP-backed engines are additionally driven end to end
//! against an `httpmock` server through `EngineConfig::build`.

use std::sync::Arc;

use httpmock::prelude::*;
use trogon_credentials::engines::consul::ConsulEngine;
use trogon_credentials::engines::rabbitmq::{Permissions, RabbitMqEngine, VHostPermissions};
use trogon_credentials::mocks::{MockAclStore, MockBrokerAdmin, MockSqlExecutor};
use trogon_credentials::revocation;
use trogon_credentials::{
    ConsulConfig, Engine, EngineConfig, EngineError, GenerateError, PasswordEngine,
    PasswordPolicy, PostgresConfig, PostgresEngine, RabbitMqConfig, RevocationToken,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn consul() -> ConsulEngine<MockAclStore> {
    ConsulEngine::with_client(MockAclStore::new(), "client", "")
}

fn rabbitmq(vhosts: &[&str]) -> RabbitMqEngine<MockBrokerAdmin> {
    RabbitMqEngine::with_admin(
        MockBrokerAdmin::new(),
        Vec::new(),
        vhosts
            .iter()
            .map(|v| VHostPermissions::new(*v, Permissions::all()))
            .collect(),
    )
}

fn postgres() -> PostgresEngine<MockSqlExecutor> {
    PostgresEngine::with_executor(
        MockSqlExecutor::new(),
        &PostgresConfig {
            uri: "postgres://db:5432/app".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            creation: vec![
                r#"CREATE ROLE "{{name}}" WITH LOGIN PASSWORD '{{password}}'"#.to_string(),
            ],
            revocation: Vec::new(),
        },
    )
    .unwrap()
}

/// Provision then revoke; returns the credential keys that were issued.
async fn round_trip<E: Engine>(engine: &E) -> Vec<String> {
    let issued = engine.provision("foo", "bar").await.unwrap();
    assert!(!issued.credentials.is_empty());
    engine.revoke(&issued.revocation).await.unwrap();
    issued.credentials.keys().map(str::to_string).collect()
}

// ── Round trip ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_engine_round_trips() {
    assert_eq!(round_trip(&consul()).await, vec!["token"]);
    assert_eq!(
        round_trip(&rabbitmq(&["/"])).await,
        vec!["password", "username"]
    );
    assert_eq!(round_trip(&postgres()).await, vec!["password", "username"]);
    assert_eq!(
        round_trip(&PasswordEngine::default()).await,
        vec!["password"]
    );
}

#[tokio::test]
async fn principal_is_namespace_dash_name() {
    let engine = rabbitmq(&[]);
    let issued = engine.provision("foo", "bar").await.unwrap();
    assert_eq!(issued.credentials.get_str("username"), Some("foo-bar"));
    assert!(engine.admin().user("foo-bar").is_some());

    let engine = consul();
    let issued = engine.provision("foo", "bar").await.unwrap();
    let [principal, _] = revocation::decode::<2>(&issued.revocation).unwrap();
    assert_eq!(principal, "foo-bar");
}

// ── Revocation tokens ─────────────────────────────────────────────────────────

#[tokio::test]
async fn token_field_count_must_match_engine() {
    let one = revocation::encode(&["foo-bar"]);
    let two = revocation::encode(&["foo-bar", "secret"]);

    assert!(consul().revoke(&one).await.unwrap_err().is_invalid_revocation());
    assert!(postgres().revoke(&two).await.unwrap_err().is_invalid_revocation());
}

#[tokio::test]
async fn legacy_token_bytes_still_decode() {
    let engine = consul();
    let issued = engine.provision("foo", "bar").await.unwrap();
    let secret = issued.credentials.get_str("token").unwrap();

    let legacy = RevocationToken::new(format!(r#"["foo-bar","{secret}"]"#));
    engine.revoke(&legacy).await.unwrap();
    assert!(engine.client().is_empty());
}

#[tokio::test]
async fn second_revoke_fails_for_stateful_backends() {
    let engine = consul();
    let issued = engine.provision("foo", "bar").await.unwrap();
    engine.revoke(&issued.revocation).await.unwrap();
    assert!(engine.revoke(&issued.revocation).await.unwrap_err().is_backend());

    let engine = rabbitmq(&["/"]);
    let issued = engine.provision("foo", "bar").await.unwrap();
    engine.revoke(&issued.revocation).await.unwrap();
    assert!(engine.revoke(&issued.revocation).await.unwrap_err().is_backend());

    let engine = PasswordEngine::default();
    let issued = engine.provision("foo", "bar").await.unwrap();
    engine.revoke(&issued.revocation).await.unwrap();
    engine.revoke(&issued.revocation).await.unwrap();
}

// ── Variant specifics ─────────────────────────────────────────────────────────

#[tokio::test]
async fn rabbitmq_grants_every_configured_vhost() {
    let engine = rabbitmq(&["/", "staging"]);
    engine.provision("foo", "bar").await.unwrap();

    let calls = engine.admin().permission_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.user == "foo-bar"));
    assert_eq!(calls[0].vhost, "/");
    assert_eq!(calls[1].vhost, "staging");
}

#[tokio::test]
async fn password_policy_is_honoured() {
    let engine = PasswordEngine::new(PasswordPolicy::with_length(16));
    let issued = engine.provision("foo", "bar").await.unwrap();
    assert_eq!(issued.credentials.get("password").unwrap().len(), 16);

    let engine = PasswordEngine::new(PasswordPolicy::with_length(10).with_digits(5).with_symbols(8));
    assert!(matches!(
        engine.provision("foo", "bar").await.unwrap_err(),
        EngineError::Generation(GenerateError::ExceedsTotalLength)
    ));
}

#[tokio::test]
async fn postgres_bad_uri_never_reaches_database() {
    let engine = PostgresEngine::with_executor(
        MockSqlExecutor::new(),
        &PostgresConfig {
            uri: "::bad::".to_string(),
            creation: vec![r#"CREATE ROLE "{{name}}""#.to_string()],
            ..PostgresConfig::default()
        },
    )
    .unwrap();

    assert!(matches!(
        engine.provision("foo", "bar").await,
        Err(EngineError::InvalidUri(_))
    ));
    assert!(engine.executor().batches().is_empty());
}

// ── Concurrency ───────────────────────────────────────────────────────────────

const WORKERS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_on_one_rabbitmq_engine_are_independent() {
    let engine = Arc::new(rabbitmq(&["/", "staging"]));

    let provisions: Vec<_> = (0..WORKERS)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let name = format!("svc{i}");
            tokio::spawn(async move { engine.provision("team", &name).await })
        })
        .collect();
    let mut tokens = Vec::new();
    for (i, handle) in provisions.into_iter().enumerate() {
        let issued = handle.await.unwrap().unwrap();
        let username = format!("team-svc{i}");
        assert_eq!(issued.credentials.get_str("username"), Some(username.as_str()));

        let user = engine.admin().user(&username).unwrap();
        assert_eq!(Some(user.password.as_str()), issued.credentials.get_str("password"));
        tokens.push(issued.revocation);
    }

    let calls = engine.admin().permission_calls();
    assert_eq!(calls.len(), WORKERS * 2);
    for i in 0..WORKERS {
        let username = format!("team-svc{i}");
        let vhosts: Vec<&str> = calls
            .iter()
            .filter(|c| c.user == username)
            .map(|c| c.vhost.as_str())
            .collect();
        assert_eq!(vhosts, vec!["/", "staging"]);
        assert!(calls.iter().all(|c| c.permissions == Permissions::all()));
    }

    let revokes: Vec<_> = tokens
        .into_iter()
        .map(|token| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.revoke(&token).await })
        })
        .collect();
    for handle in revokes {
        handle.await.unwrap().unwrap();
    }
    for i in 0..WORKERS {
        assert!(engine.admin().user(&format!("team-svc{i}")).is_none());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_on_one_consul_engine_are_independent() {
    let engine = Arc::new(consul());

    let provisions: Vec<_> = (0..WORKERS)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let name = format!("svc{i}");
            tokio::spawn(async move { engine.provision("team", &name).await })
        })
        .collect();
    let mut tokens = Vec::new();
    for (i, handle) in provisions.into_iter().enumerate() {
        let issued = handle.await.unwrap().unwrap();
        let secret = issued.credentials.get_str("token").unwrap();
        let entry = engine.client().entry(secret).unwrap();
        assert_eq!(entry.name, format!("team-svc{i}"));
        assert_eq!(entry.token_type, "client");
        tokens.push(issued.revocation);
    }
    assert_eq!(engine.client().len(), WORKERS);

    let revokes: Vec<_> = tokens
        .into_iter()
        .map(|token| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.revoke(&token).await })
        })
        .collect();
    for handle in revokes {
        handle.await.unwrap().unwrap();
    }
    assert!(engine.client().is_empty());
}

// ── Over HTTP ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn consul_over_http() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/v1/acl/create")
                .json_body_partial(r#"{"Name":"foo-bar","Type":"client"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"ID":"3f2a"}"#);
        })
        .await;
    let destroy = server
        .mock_async(|when, then| {
            when.method(PUT).path("/v1/acl/destroy/3f2a");
            then.status(200).body("true");
        })
        .await;

    let engine = EngineConfig::Consul(ConsulConfig {
        address: server.address().to_string(),
        ..ConsulConfig::default()
    })
    .build()
    .unwrap();

    let issued = engine.provision("foo", "bar").await.unwrap();
    assert_eq!(issued.credentials.get_str("token"), Some("3f2a"));
    assert_eq!(issued.revocation.as_bytes(), br#"["foo-bar","3f2a"]"#);

    engine.revoke(&issued.revocation).await.unwrap();
    create.assert_async().await;
    destroy.assert_async().await;
}

#[tokio::test]
async fn rabbitmq_over_http() {
    let server = MockServer::start_async().await;
    let put_user = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/users/foo-bar")
                .json_body_partial(r#"{"tags":"monitoring"}"#);
            then.status(201);
        })
        .await;
    let dev = server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/permissions/dev/foo-bar");
            then.status(201);
        })
        .await;
    let staging = server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/permissions/staging/foo-bar");
            then.status(201);
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/users/foo-bar");
            then.status(204);
        })
        .await;

    let engine = EngineConfig::RabbitMq(RabbitMqConfig {
        uri: server.base_url(),
        username: "guest".to_string(),
        password: "guest".to_string(),
        tags: vec!["monitoring".to_string()],
        vhosts: vec![
            VHostPermissions::new("dev", Permissions::all()),
            VHostPermissions::new("staging", Permissions::all()),
        ],
        ..RabbitMqConfig::default()
    })
    .build()
    .unwrap();

    let issued = engine.provision("foo", "bar").await.unwrap();
    assert_eq!(issued.revocation.as_bytes(), b"foo-bar");
    engine.revoke(&issued.revocation).await.unwrap();

    put_user.assert_async().await;
    dev.assert_async().await;
    staging.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn rabbitmq_permission_failure_over_http_is_partial() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/users/foo-bar");
            then.status(201);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/permissions/missing/foo-bar");
            then.status(404).body(r#"{"error":"Object Not Found"}"#);
        })
        .await;

    let engine = EngineConfig::RabbitMq(RabbitMqConfig {
        uri: server.base_url(),
        vhosts: vec![VHostPermissions::new("missing", Permissions::all())],
        ..RabbitMqConfig::default()
    })
    .build()
    .unwrap();

    let err = engine.provision("foo", "bar").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::PartiallyProvisioned { ref vhost, ref source, .. }
            if vhost == "missing" && source.is_not_found()
    ));
}
