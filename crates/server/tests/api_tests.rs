//! Integration tests for HTTP API endpoints.

mod common;

use axum::http::StatusCode;
use cask_core::config::SignatureAlgorithm;
use cask_signer::{KeyPair, SignedPackage, derive_identity};
use common::TestServer;
use common::fixtures::{extension, multipart_body, parse_feed, seeded_bytes, zip_of};
use serde_json::json;
use std::io::{Cursor, Read};

fn stored_app_id(server: &TestServer, app: &str) -> String {
    let pem = std::fs::read_to_string(server.data_dir().join(format!("keys/{app}.pem"))).unwrap();
    let keypair = KeyPair::from_pem(&pem).unwrap();
    derive_identity(&keypair.public).unwrap().to_string()
}

fn path_of(codebase: &str) -> &str {
    codebase.strip_prefix("http://repo.test").unwrap()
}

#[tokio::test]
async fn test_publish_then_feed_end_to_end() {
    let server = TestServer::new().await;

    let (status, manifest) = server.upload("demo", &extension("1.0.0")).await;
    assert_eq!(status, StatusCode::OK, "upload failed: {manifest}");
    assert_eq!(manifest["update_url"], "http://repo.test/updates.xml");
    assert_eq!(manifest["version"], "1.0.0");
    assert_eq!(manifest["permissions"], json!(["tabs"]));

    assert_eq!(server.version_dirs("demo"), ["1.0.0"]);

    let apps = parse_feed(&server.feed_xml().await);
    assert_eq!(apps.len(), 1);
    let app = &apps[0];
    assert_eq!(app.app_id, stored_app_id(&server, "demo"));
    assert_eq!(app.version, "1.0.0");
    assert!(app.codebase.ends_with("/demo/1.0.0/demo.crx"), "{}", app.codebase);

    let (status, headers, body) = server.get(path_of(&app.codebase)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/x-chrome-extension");

    let package = SignedPackage::parse(&body).unwrap();
    package.verify(SignatureAlgorithm::RsaSha1).unwrap();
    assert_eq!(package.app_id().as_str(), app.app_id);

    let mut zip = zip::ZipArchive::new(Cursor::new(package.content())).unwrap();
    let mut packed = String::new();
    zip.by_name("manifest.json")
        .unwrap()
        .read_to_string(&mut packed)
        .unwrap();
    let packed: serde_json::Value = serde_json::from_str(&packed).unwrap();
    assert_eq!(packed, manifest);
}

#[tokio::test]
async fn test_configured_package_extension() {
    let server = TestServer::with_config(|config| {
        config.storage.package_extension = "pkg".to_string();
    })
    .await;

    let (status, _) = server.upload("demo", &extension("1.0.0")).await;
    assert_eq!(status, StatusCode::OK);

    let apps = parse_feed(&server.feed_xml().await);
    assert!(apps[0].codebase.ends_with("/demo/1.0.0/demo.pkg"));

    let (status, headers, _) = server.get("/repo/demo/1.0.0/demo.pkg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/octet-stream");

    let (status, _, _) = server.get("/repo/demo/1.0.0/demo.crx").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sha256_signatures() {
    let server = TestServer::with_config(|config| {
        config.signing.algorithm = SignatureAlgorithm::RsaSha256;
    })
    .await;

    server.upload("demo", &extension("1.0.0")).await;
    let (_, _, body) = server.get("/repo/demo/1.0.0/demo.crx").await;

    let package = SignedPackage::parse(&body).unwrap();
    package.verify(SignatureAlgorithm::RsaSha256).unwrap();
    assert!(package.verify(SignatureAlgorithm::RsaSha1).is_err());
}

#[tokio::test]
async fn test_reupload_rejected_and_upgrade_advertised() {
    let server = TestServer::new().await;

    let (status, _) = server.upload("demo", &extension("1.0.0")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, original) = server.get("/repo/demo/1.0.0/demo.crx").await;

    let (status, body) = server.upload("demo", &extension("1.0.0")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_published");

    let (_, _, after) = server.get("/repo/demo/1.0.0/demo.crx").await;
    assert_eq!(after, original);

    let (status, _) = server.upload("demo", &extension("1.1.0")).await;
    assert_eq!(status, StatusCode::OK);

    let apps = parse_feed(&server.feed_xml().await);
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].version, "1.1.0");
    assert!(apps[0].codebase.ends_with("/demo/1.1.0/demo.crx"));
    assert_eq!(server.version_dirs("demo"), ["1.0.0", "1.1.0"]);
}

#[tokio::test]
async fn test_feed_orders_by_semver_not_lexically() {
    let server = TestServer::new().await;

    for version in ["1.9.0", "1.10.0", "1.2.0"] {
        let (status, _) = server.upload("demo", &extension(version)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let apps = parse_feed(&server.feed_xml().await);
    assert_eq!(apps[0].version, "1.10.0");
}

#[tokio::test]
async fn test_multiple_apps_have_distinct_identities() {
    let server = TestServer::new().await;

    server.upload("alpha", &extension("1.0.0")).await;
    server.upload("beta", &extension("2.0.0")).await;

    let apps = parse_feed(&server.feed_xml().await);
    assert_eq!(apps.len(), 2);
    assert_ne!(apps[0].app_id, apps[1].app_id);
    for app in &apps {
        let name = if app.version == "1.0.0" { "alpha" } else { "beta" };
        assert_eq!(app.app_id, stored_app_id(&server, name));
    }
}

#[tokio::test]
async fn test_concurrent_uploads_same_version() {
    let server = TestServer::new().await;
    let archive = extension("1.0.0");

    let (a, b) = tokio::join!(
        server.upload("demo", &archive),
        server.upload("demo", &archive)
    );

    let mut statuses = [a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);
    assert_eq!(server.version_dirs("demo"), ["1.0.0"]);
}

#[tokio::test]
async fn test_traversal_archive_rejected_without_artifact() {
    let server = TestServer::new().await;
    let archive = zip_of(&[
        ("manifest.json", br#"{"name":"Evil","version":"1.0.0"}"#),
        ("../../evil", b"escaped"),
    ]);

    let (status, body) = server.upload("demo", &archive).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "unsafe_archive");

    assert!(server.version_dirs("demo").is_empty());
    assert!(parse_feed(&server.feed_xml().await).is_empty());
}

#[tokio::test]
async fn test_existing_update_url_rejected() {
    let server = TestServer::new().await;
    let archive = zip_of(&[(
        "manifest.json",
        br#"{"name":"D","version":"1.0.0","update_url":"https://clients2.google.com/service/update2/crx"}"#,
    )]);

    let (status, body) = server.upload("demo", &archive).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflicting_feed");
    assert!(server.version_dirs("demo").is_empty());
}

#[tokio::test]
async fn test_manifest_faults() {
    let server = TestServer::new().await;

    let no_manifest = zip_of(&[("background.js", b"")]);
    let (status, body) = server.upload("demo", &no_manifest).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "manifest_missing");

    let malformed = zip_of(&[("manifest.json", b"{not json")]);
    let (status, body) = server.upload("demo", &malformed).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "manifest_invalid");

    let loose_version = zip_of(&[("manifest.json", br#"{"name":"D","version":"1.0"}"#)]);
    let (status, body) = server.upload("demo", &loose_version).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_version");

    let (status, body) = server.upload("demo", b"not a zip").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_archive");
}

#[tokio::test]
async fn test_upload_form_fields_required() {
    let server = TestServer::new().await;

    let (status, body) = server
        .upload_raw(multipart_body(None, Some(&extension("1.0.0"))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, _) = server.upload_raw(multipart_body(Some("demo"), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.upload("../keys", &extension("1.0.0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_name");
}

#[tokio::test]
async fn test_dot_prefixed_manifest_accepted() {
    let server = TestServer::new().await;
    let archive = zip_of(&[
        ("./manifest.json", br#"{"name":"D","version":"1.0.0"}"#),
        ("./background.js", b""),
    ]);

    let (status, manifest) = server.upload("demo", &archive).await;
    assert_eq!(status, StatusCode::OK, "upload failed: {manifest}");
    assert_eq!(manifest["update_url"], "http://repo.test/updates.xml");
    assert_eq!(parse_feed(&server.feed_xml().await).len(), 1);
}

#[tokio::test]
async fn test_unpacked_size_limit() {
    let server = TestServer::with_config(|config| {
        config.server.max_unpacked_size = Some(16 * 1024);
    })
    .await;
    let zeros = vec![0u8; 1024 * 1024];
    let archive = zip_of(&[
        ("manifest.json", br#"{"name":"D","version":"1.0.0"}"#),
        ("zeros.bin", &zeros),
    ]);

    let (status, body) = server.upload("demo", &archive).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "archive_too_large");
    assert!(server.version_dirs("demo").is_empty());
    assert!(parse_feed(&server.feed_xml().await).is_empty());
}

#[tokio::test]
async fn test_upload_size_limit() {
    let server = TestServer::with_config(|config| {
        config.server.max_upload_size = 4 * 1024;
    })
    .await;
    let archive = zip_of(&[
        ("manifest.json", br#"{"name":"D","version":"1.0.0"}"#),
        ("blob.bin", &seeded_bytes(7, 64 * 1024)),
    ]);

    let (status, body) = server.upload("demo", &archive).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "payload_too_large");
}

#[tokio::test]
async fn test_download_only_serves_canonical_files() {
    let server = TestServer::new().await;
    server.upload("demo", &extension("1.0.0")).await;

    for uri in [
        "/repo/demo/1.0.0/other.crx",
        "/repo/demo/2.0.0/demo.crx",
        "/repo/demo/latest/demo.crx",
        "/repo/demo/1.0.0/appId.txt",
        "/repo/missing/1.0.0/missing.crx",
    ] {
        let (status, _, _) = server.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_feed_fails_on_inconsistent_repository() {
    let server = TestServer::new().await;
    server.upload("demo", &extension("1.0.0")).await;
    std::fs::remove_file(server.data_dir().join("repo/demo/1.0.0/demo.crx")).unwrap();

    let (status, _, body) = server.get("/updates.xml").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["code"], "repository_inconsistency");
}

#[tokio::test]
async fn test_upload_page_fallback() {
    let server = TestServer::new().await;

    let (status, headers, body) = server.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains(r#"action="/upload""#));
    assert!(html.contains(r#"name="zippedExtension""#));

    let (status, _, _) = server.get("/any/other/page").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let (status, _, body) = server.get("/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::new().await;
    server.upload("demo", &extension("1.0.0")).await;

    let (status, _, body) = server.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("cask_packages_published_total"));
    assert!(text.contains("cask_keys_generated_total"));

    let disabled = TestServer::with_config(|config| {
        config.server.metrics_enabled = false;
    })
    .await;
    let (_, headers, _) = disabled.get("/metrics").await;
    // Falls through to the upload page.
    assert!(
        headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
}
