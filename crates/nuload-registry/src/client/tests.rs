//! Unit tests for the NuGet client

use super::*;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

async fn mount_service_index(server: &MockServer) {
    let index = serde_json::json!({
        "version": "3.0.0",
        "resources": [
            { "@id": format!("{}/flat/", server.uri()), "@type": "PackageBaseAddress/3.0.0" },
            { "@id": format!("{}/reg/", server.uri()), "@type": "RegistrationsBaseUrl/3.6.0" }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/v3/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(index))
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> NugetClient {
    let origin = SourceOrigin::new("test", format!("{}/v3/index.json", server.uri()));
    NugetClient::with_config(origin, None, fast_retry()).unwrap()
}

fn identity(id: &str, version: &str) -> PackageIdentity {
    PackageIdentity::new(id, version.parse().unwrap())
}

fn leaf(server: &MockServer, id: &str, version: &str, groups: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "catalogEntry": {
            "id": id,
            "version": version,
            "dependencyGroups": groups,
            "packageHash": "aGFzaA==",
            "packageHashAlgorithm": "SHA512"
        },
        "packageContent": format!(
            "{}/flat/{}/{}/{}.{}.nupkg",
            server.uri(),
            id.to_lowercase(),
            version,
            id.to_lowercase(),
            version
        )
    })
}

#[test]
fn test_retry_config_default() {
    let config = RetryConfig::default();
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.initial_delay, Duration::from_millis(100));
    assert_eq!(config.max_delay, Duration::from_secs(10));
    assert_eq!(config.multiplier, 2.0);
}

#[test]
fn test_client_rejects_invalid_location() {
    let result = NugetClient::new(SourceOrigin::new("bad", "not a url"));
    assert!(matches!(result, Err(NuloadError::ConfigValidation { .. })));
}

#[test]
fn test_authorization_value() {
    let bearer = AuthConfig {
        token: Some("secret".to_string()),
        ..AuthConfig::default()
    };
    assert_eq!(NugetClient::authorization_value(bearer).as_deref(), Some("Bearer secret"));

    let basic = AuthConfig {
        token: None,
        username: Some("user".to_string()),
        password: Some("pass".to_string()),
    };
    assert_eq!(
        NugetClient::authorization_value(basic).as_deref(),
        Some("Basic dXNlcjpwYXNz")
    );

    assert!(NugetClient::authorization_value(AuthConfig::default()).is_none());
}

#[tokio::test]
async fn test_list_versions() {
    let server = MockServer::start().await;
    mount_service_index(&server).await;

    Mock::given(method("GET"))
        .and(path("/flat/newtonsoft.json/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": ["12.0.3", "13.0.1", "13.0.2-beta1", "not-a-version"]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let versions = client.list_versions("Newtonsoft.Json").await.unwrap();

    assert_eq!(versions.len(), 3);
    assert!(versions.contains(&"13.0.2-beta1".parse().unwrap()));
}

#[tokio::test]
async fn test_list_versions_unknown_package() {
    let server = MockServer::start().await;
    mount_service_index(&server).await;

    Mock::given(method("GET"))
        .and(path("/flat/missing/index.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.list_versions("Missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dependency_info_inline_page() {
    let server = MockServer::start().await;
    mount_service_index(&server).await;

    let groups = serde_json::json!([
        {
            "targetFramework": ".NETFramework4.5",
            "dependencies": [ { "id": "Legacy.Only", "range": "[1.0.0, )" } ]
        },
        {
            "targetFramework": ".NETStandard2.0",
            "dependencies": [ { "id": "Serilog", "range": "[2.10.0, )" } ]
        }
    ]);

    Mock::given(method("GET"))
        .and(path("/reg/serilog.sinks.console/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "items": [{
                "@id": format!("{}/reg/serilog.sinks.console/index.json#page/4.0.0/4.0.0", server.uri()),
                "lower": "4.0.0",
                "upper": "4.0.0",
                "items": [ leaf(&server, "Serilog.Sinks.Console", "4.0.0", groups) ]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let framework: TargetFramework = "net5.0".parse().unwrap();
    let wanted = identity("Serilog.Sinks.Console", "4.0.0");

    let info = client.dependency_info(&wanted, &framework).await.unwrap().unwrap();
    assert_eq!(info.dependencies.len(), 1);
    assert_eq!(info.dependencies[0].id, "Serilog");

    let content = info.content.unwrap();
    assert!(content.url.ends_with("/flat/serilog.sinks.console/4.0.0/serilog.sinks.console.4.0.0.nupkg"));
    assert_eq!(content.sha512.as_deref(), Some("aGFzaA=="));

    // Served from the metadata cache the second time
    let again = client.dependency_info(&wanted, &framework).await.unwrap();
    assert!(again.is_some());
    assert!(client.metadata_cache().contains_fresh("serilog.sinks.console"));

    let unknown_version = client
        .dependency_info(&identity("Serilog.Sinks.Console", "9.9.9"), &framework)
        .await
        .unwrap();
    assert!(unknown_version.is_none());
}

#[tokio::test]
async fn test_dependency_info_fetches_linked_pages() {
    let server = MockServer::start().await;
    mount_service_index(&server).await;

    let page_url = format!("{}/reg/bigpackage/page/1.0.0/2.0.0.json", server.uri());

    Mock::given(method("GET"))
        .and(path("/reg/bigpackage/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "items": [{ "@id": page_url, "lower": "1.0.0", "upper": "2.0.0" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reg/bigpackage/page/1.0.0/2.0.0.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "@id": page_url,
            "lower": "1.0.0",
            "upper": "2.0.0",
            "items": [
                leaf(&server, "BigPackage", "1.0.0", serde_json::json!([])),
                leaf(&server, "BigPackage", "2.0.0", serde_json::json!([
                    { "dependencies": [ { "id": "Helper", "range": "1.0.0" } ] }
                ]))
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let info = client
        .dependency_info(&identity("BigPackage", "2.0.0"), &TargetFramework::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(info.dependencies[0].id, "Helper");
    assert!(info.dependencies[0].range.satisfies(&"1.5.0".parse().unwrap()));
}

#[tokio::test]
async fn test_download_retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flat/foo/1.0.0/foo.1.0.0.nupkg"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flat/foo/1.0.0/foo.1.0.0.nupkg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04payload".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let content = ContentDescriptor {
        url: format!("{}/flat/foo/1.0.0/foo.1.0.0.nupkg", server.uri()),
        sha512: None,
    };

    let bytes = client.download(&identity("Foo", "1.0.0"), &content).await.unwrap();
    assert_eq!(bytes, b"PK\x03\x04payload");
}

#[tokio::test]
async fn test_download_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flat/gone/1.0.0/gone.1.0.0.nupkg"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let content = ContentDescriptor {
        url: format!("{}/flat/gone/1.0.0/gone.1.0.0.nupkg", server.uri()),
        sha512: None,
    };

    let err = client.download(&identity("Gone", "1.0.0"), &content).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/index.json"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "3.0.0",
            "resources": [
                { "@id": format!("{}/flat/", server.uri()), "@type": "PackageBaseAddress/3.0.0" },
                { "@id": format!("{}/reg/", server.uri()), "@type": "RegistrationsBaseUrl" }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flat/private/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "versions": ["1.0.0"] })))
        .mount(&server)
        .await;

    let auth = AuthConfig {
        token: Some("test-token".to_string()),
        ..AuthConfig::default()
    };
    let origin = SourceOrigin::new("private", format!("{}/v3/index.json", server.uri()));
    let client = NugetClient::with_config(origin, Some(auth), fast_retry()).unwrap();

    let versions = client.list_versions("Private").await.unwrap();
    assert_eq!(versions, vec!["1.0.0".parse::<Version>().unwrap()]);
}

#[tokio::test]
async fn test_service_index_without_registrations() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "3.0.0",
            "resources": [
                { "@id": format!("{}/flat/", server.uri()), "@type": "PackageBaseAddress/3.0.0" }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.list_versions("Anything").await.unwrap_err();
    assert!(matches!(err, NuloadError::ConfigValidation { .. }));
}
