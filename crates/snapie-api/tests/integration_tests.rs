//! # Integration Tests for snapie-api
//!
//! Drives the assembled router with `tower::ServiceExt::oneshot` over an
//! in-memory store, a recording content store and a scripted gateway
//! fetcher. Covers the upload pipeline ordering, API key handling, gateway
//! ordering and fallback, play tracking and the admin console.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use snapie_api::auth::SecretToken;
use snapie_api::config::AppConfig;
use snapie_api::middleware::rate_limit::RateLimitConfig;
use snapie_api::state::AppState;
use snapie_core::{ContentId, Permlink, Timestamp, Username};
use snapie_ipfs::{
    ContentStore, FetchError, GatewayConfig, GatewayFetcher, GatewayResponse, PinError,
};
use snapie_state::{IpfsStatus, MigrationStatus};
use snapie_store::{
    AudioMetadata, AudioRecord, CreatorStore, MemoryStore, RecordDraft, RecordStore,
};

const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
const CID_V1: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
const API_KEY: &str = "test-key-123456";
const DEMO_KEY: &str = "demo-key-654321";
const ADMIN_TOKEN: &str = "admin-secret";
const BOUNDARY: &str = "snapie-test-boundary";

// Gateway ports: local, primary, fallback.
const LOCAL: u16 = 9100;
const PRIMARY: u16 = 9101;
const FALLBACK: u16 = 9102;

// ── Fakes ───────────────────────────────────────────────────────────

/// Counts pin calls and answers with a fixed CID.
#[derive(Default)]
struct RecordingContent {
    pins: AtomicUsize,
}

impl RecordingContent {
    fn pins(&self) -> usize {
        self.pins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for RecordingContent {
    async fn pin(&self, _bytes: Bytes, _filename: Option<&str>) -> Result<ContentId, PinError> {
        self.pins.fetch_add(1, Ordering::SeqCst);
        Ok(ContentId::from_content_store(CID).unwrap())
    }
}

/// Succeeds only for gateways on `ok_ports`; remembers every port asked.
#[derive(Default)]
struct ScriptedFetcher {
    ok_ports: Vec<u16>,
    calls: Mutex<Vec<u16>>,
}

impl ScriptedFetcher {
    fn serving(ports: &[u16]) -> Self {
        Self {
            ok_ports: ports.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<u16> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<GatewayResponse, FetchError> {
        let port = url.port().unwrap_or_default();
        self.calls.lock().unwrap().push(port);
        if self.ok_ports.contains(&port) {
            Ok(GatewayResponse {
                bytes: Bytes::from(format!("audio-from-{port}")),
                content_type: Some("application/octet-stream".into()),
            })
        } else {
            Err(FetchError::Status(502))
        }
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    store: MemoryStore,
    content: Arc<RecordingContent>,
    fetcher: Arc<ScriptedFetcher>,
    state: AppState,
    /// Built once so rate limiter windows persist across requests.
    app: axum::Router,
}

fn base_config() -> AppConfig {
    let mut config =
        AppConfig::with_gateways(GatewayConfig::local_mock(&[LOCAL, PRIMARY, FALLBACK]).unwrap());
    config.api_keys.keys = vec![SecretToken::new(API_KEY)];
    config.api_keys.demo = Some(SecretToken::new(DEMO_KEY));
    config.admin.token = Some(SecretToken::new(ADMIN_TOKEN));
    config
}

impl Harness {
    fn new() -> Self {
        Self::with(base_config(), ScriptedFetcher::serving(&[LOCAL, PRIMARY, FALLBACK]))
    }

    fn with(config: AppConfig, fetcher: ScriptedFetcher) -> Self {
        let store = MemoryStore::new();
        let content = Arc::new(RecordingContent::default());
        let fetcher = Arc::new(fetcher);
        let state = AppState::with_stores(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            content.clone(),
            fetcher.clone(),
        );
        let app = snapie_api::app(state.clone());
        Self {
            store,
            content,
            fetcher,
            state,
            app,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Store a published record directly, bypassing the upload route.
    async fn seed(&self, permlink: &str, owner: &str, ephemeral: bool) -> AudioRecord {
        let draft = RecordDraft {
            owner: Username::new(owner).unwrap(),
            content_id: ContentId::parse(CID).unwrap(),
            metadata: AudioMetadata {
                format: "webm".into(),
                duration: 4.5,
                ..Default::default()
            },
            original_filename: Some("clip.webm".into()),
            size: 1024,
            context_type: None,
            context_id: None,
            reply_to: None,
            api_key_used: None,
            ephemeral,
        };
        let record = AudioRecord::new(&draft, Permlink::new(permlink).unwrap(), Timestamp::now());
        self.store.insert(&record).await.unwrap();
        record
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn admin(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {ADMIN_TOKEN}"));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn play(permlink: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/audio/play")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "permlink": permlink }).to_string()))
        .unwrap()
}

/// `multipart/form-data` body with text fields and an optional `audio` file.
fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(key: Option<&str>, user: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/audio/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .header("x-user", user)
        .header("host", "audio.test");
    if let Some(k) = key {
        builder = builder.header("x-api-key", k);
    }
    builder.body(Body::from(multipart(fields, file))).unwrap()
}

const CLIP_FIELDS: &[(&str, &str)] = &[("duration", "3.2"), ("format", "webm"), ("sampleRate", "48000")];
const CLIP_BYTES: &[u8] = b"OggS-fake-audio";
const CLIP: Option<(&str, &[u8])> = Some(("clip.webm", CLIP_BYTES));

async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

// ── Health probes ───────────────────────────────────────────────────

#[tokio::test]
async fn liveness_and_readiness() {
    let h = Harness::new();

    let response = h.send(get("/health/liveness")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");

    // No database configured: the in-memory store is always ready.
    let response = h.send(get("/health/readiness")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

#[tokio::test]
async fn metrics_count_requests_and_errors() {
    let h = Harness::new();
    h.send(get("/api/audio?a=nosuchpl")).await;

    let body = body_string(h.send(get("/metrics")).await).await;
    assert!(body.contains("snapie_http_requests_total 1"), "{body}");
    assert!(body.contains("snapie_http_errors_total 1"), "{body}");
}

// ── Upload ──────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_pins_once_and_creates_standard_record() {
    let h = Harness::new();
    let response = h.send(upload(Some(API_KEY), "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["cid"], CID);
    let permlink = json["permlink"].as_str().unwrap().to_string();
    assert_eq!(json["playUrl"], format!("http://audio.test/play?a={permlink}"));
    assert_eq!(json["apiUrl"], format!("http://audio.test/api/audio?a={permlink}"));
    assert_eq!(h.content.pins(), 1);

    let record = RecordStore::find(&h.store, &Permlink::new(&permlink).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.owner.as_str(), "meno");
    assert_eq!(record.lifecycle.ipfs_status, IpfsStatus::PinnedLocal);
    assert_eq!(record.lifecycle.migration_status, MigrationStatus::Pending);
    assert!(record.lifecycle.pin_until.is_none());
    assert_eq!(record.metadata.sample_rate, Some(48000));
    assert_eq!(record.api_key_used.as_deref(), Some(&API_KEY[..8]));
    assert_eq!(record.context_type, "voice_message");

    // The uploader's account was created lazily.
    let account = CreatorStore::find(&h.store, &Username::new("meno").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(account.can_upload);
}

#[tokio::test]
async fn upload_requires_an_owner() {
    let h = Harness::new();
    let mut request = upload(Some(API_KEY), "ignored", CLIP_FIELDS, CLIP);
    request.headers_mut().remove("x-user");
    let response = h.send(request).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = h.send(upload(Some(API_KEY), "anonymous", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(h.content.pins(), 0);
    assert_eq!(h.store.record_count(), 0);
}

#[tokio::test]
async fn demo_key_upload_is_ephemeral_and_never_queued() {
    let h = Harness::new();
    let response = h.send(upload(Some(DEMO_KEY), "visitor", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let permlink = body_json(response).await["permlink"].as_str().unwrap().to_string();

    let record = RecordStore::find(&h.store, &Permlink::new(&permlink).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.lifecycle.migration_status, MigrationStatus::Skip);
    let pin_until = record.lifecycle.pin_until.unwrap();
    assert_eq!(pin_until, record.created_at.plus_hours(24));

    let far_future = Timestamp::now().plus_hours(24 * 365);
    let queue = h.store.migration_queue(far_future, 100).await.unwrap();
    assert!(queue.iter().all(|r| r.permlink() != record.permlink()));
}

#[tokio::test]
async fn missing_metadata_is_rejected_before_pinning() {
    let h = Harness::new();
    let response = h
        .send(upload(Some(API_KEY), "meno", &[("format", "webm")], CLIP))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"]["details"]["required"], serde_json::json!(["duration"]));
    assert_eq!(h.content.pins(), 0);
    assert_eq!(h.store.record_count(), 0);
}

#[tokio::test]
async fn non_numeric_duration_is_rejected_before_pinning() {
    let h = Harness::new();
    let response = h
        .send(upload(Some(API_KEY), "meno", &[("duration", "long"), ("format", "webm")], CLIP))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.content.pins(), 0);
}

#[tokio::test]
async fn missing_file_and_bad_extension_are_rejected() {
    let h = Harness::new();

    let response = h.send(upload(Some(API_KEY), "meno", CLIP_FIELDS, None)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = h
        .send(upload(Some(API_KEY), "meno", CLIP_FIELDS, Some(("notes.txt", &b"hello"[..]))))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(h.content.pins(), 0);
}

#[tokio::test]
async fn audio_part_without_filename_is_rejected() {
    let h = Harness::new();
    let mut body = multipart(CLIP_FIELDS, None);
    // Drop the closing boundary and append a file part with no filename.
    body.truncate(body.len() - format!("--{BOUNDARY}--\r\n").len());
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"\r\nContent-Type: audio/webm\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(CLIP_BYTES);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/api/audio/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .header("x-user", "meno")
        .header("x-api-key", API_KEY)
        .body(Body::from(body))
        .unwrap();
    let response = h.send(request).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(h.content.pins(), 0);
}

#[tokio::test]
async fn banned_user_cannot_upload() {
    let h = Harness::new();
    let user = Username::new("spammer").unwrap();
    h.store.create_default(&user, Timestamp::now()).await.unwrap();
    h.store.set_banned(&user, true).await.unwrap();

    let response = h.send(upload(Some(API_KEY), "spammer", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"]["message"], "User is banned from uploading");

    assert_eq!(h.content.pins(), 0);
    assert_eq!(h.store.record_count(), 0);
}

#[tokio::test]
async fn invalid_username_is_rejected() {
    let h = Harness::new();
    let response = h.send(upload(Some(API_KEY), "no spaces!", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.content.pins(), 0);
}

// ── API keys ────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_or_wrong_api_key_is_unauthorized() {
    let h = Harness::new();

    let response = h.send(upload(None, "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");

    let response = h.send(upload(Some("not-a-key"), "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(h.content.pins(), 0);
}

#[tokio::test]
async fn api_key_accepted_from_query_parameter() {
    let h = Harness::new();
    let mut request = upload(None, "meno", CLIP_FIELDS, CLIP);
    *request.uri_mut() = format!("/api/audio/upload?api_key={API_KEY}").parse().unwrap();
    let response = h.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn upload_rate_limit_is_per_key() {
    let mut config = base_config();
    config.upload_rate = RateLimitConfig::per_window(1, 60);
    let h = Harness::with(config, ScriptedFetcher::default());

    let first = h.send(upload(Some(API_KEY), "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = h.send(upload(Some(API_KEY), "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different key has its own window.
    let other = h.send(upload(Some(DEMO_KEY), "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(other.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn unknown_keys_are_rejected_before_the_upload_limiter() {
    let mut config = base_config();
    config.upload_rate = RateLimitConfig::per_window(1, 60);
    let h = Harness::with(config, ScriptedFetcher::default());

    // Rotating bogus keys never reach the limiter, so they stay 401 and do
    // not eat into a real key's window.
    for i in 0..5 {
        let bogus = format!("bogus-key-{i}");
        let response = h.send(upload(Some(&bogus), "meno", CLIP_FIELDS, CLIP)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = h.send(upload(Some(API_KEY), "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(h.content.pins(), 1);
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn pinned_local_record_lists_local_gateway_first() {
    let h = Harness::new();
    h.seed("abcd1234", "meno", false).await;

    let response = h.send(get("/api/audio?a=abcd1234")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["permlink"], "abcd1234");
    assert_eq!(json["ipfsStatus"], "pinned_local");
    assert_eq!(json["audioUrl"], format!("http://127.0.0.1:{LOCAL}/ipfs/{CID}"));
    assert_eq!(json["audioUrlFallback"], format!("http://127.0.0.1:{PRIMARY}/ipfs/{CID}"));
    assert_eq!(json["gateways"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn migrated_record_skips_local_gateway() {
    let h = Harness::new();
    let record = h.seed("migr8ted", "meno", false).await;

    let mut next = record.lifecycle.clone();
    next.queue().unwrap();
    next.start_migration().unwrap();
    next.complete_migration(Timestamp::now()).unwrap();
    h.store
        .update_lifecycle(record.permlink(), &record.lifecycle, &next, Timestamp::now())
        .await
        .unwrap();

    let json = body_json(h.send(get("/api/audio?a=migr8ted")).await).await;
    assert_eq!(json["ipfsStatus"], "migrated");
    assert_eq!(json["audioUrl"], format!("http://127.0.0.1:{PRIMARY}/ipfs/{CID}"));
    assert_eq!(json["gateways"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn direct_cid_uses_public_gateways_only() {
    let h = Harness::new();
    let response = h.send(get(&format!("/api/audio?cid={CID_V1}"))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["mode"], "direct");
    assert_eq!(json["format"], "unknown");
    assert_eq!(json["cid"], CID_V1);
    assert_eq!(json["audioUrl"], format!("http://127.0.0.1:{PRIMARY}/ipfs/{CID_V1}"));
    assert_eq!(json["audioUrlFallback"], format!("http://127.0.0.1:{FALLBACK}/ipfs/{CID_V1}"));
}

#[tokio::test]
async fn invalid_direct_cid_is_rejected() {
    let h = Harness::new();
    for cid in ["not-a-cid", "Qm123", "../../etc/passwd"] {
        let response = h.send(get(&format!("/api/audio?cid={cid}"))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{cid}");
    }
    assert!(h.fetcher.calls().is_empty());
}

#[tokio::test]
async fn read_requires_permlink_or_cid() {
    let h = Harness::new();
    let response = h.send(get("/api/audio")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = h.send(get("/api/audio?a=nosuchpl")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
}

// ── Streaming ───────────────────────────────────────────────────────

#[tokio::test]
async fn stream_falls_back_and_stops_at_first_success() {
    let h = Harness::with(base_config(), ScriptedFetcher::serving(&[PRIMARY, FALLBACK]));
    h.seed("abcd1234", "meno", false).await;

    let response = h.send(get("/api/audio/stream?a=abcd1234")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-gateway-index"], "1");
    assert_eq!(response.headers()["content-type"], "audio/webm");
    assert_eq!(body_string(response).await, format!("audio-from-{PRIMARY}"));

    // Local failed, primary served, fallback never asked.
    assert_eq!(h.fetcher.calls(), vec![LOCAL, PRIMARY]);
    assert_eq!(h.state.metrics.gateway_hits(1), 1);
}

#[tokio::test]
async fn direct_stream_never_touches_local_gateway() {
    let h = Harness::with(base_config(), ScriptedFetcher::serving(&[LOCAL, FALLBACK]));

    let response = h.send(get(&format!("/api/audio/stream?cid={CID}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-gateway-index"], "1");
    assert_eq!(h.fetcher.calls(), vec![PRIMARY, FALLBACK]);
}

#[tokio::test]
async fn stream_with_every_gateway_down_is_bad_gateway() {
    let h = Harness::with(base_config(), ScriptedFetcher::default());
    h.seed("abcd1234", "meno", false).await;

    let response = h.send(get("/api/audio/stream?a=abcd1234")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "CONTENT_UNAVAILABLE");
    // Per-gateway failures stay in the logs.
    assert!(!json.to_string().contains("9100"));

    assert_eq!(h.fetcher.calls(), vec![LOCAL, PRIMARY, FALLBACK]);
    assert!(h.state.metrics.render().contains("snapie_gateway_exhausted_total 1"));
}

// ── Play tracking ───────────────────────────────────────────────────

#[tokio::test]
async fn play_increments_published_records_only() {
    let h = Harness::new();
    h.seed("abcd1234", "meno", false).await;

    let json = body_json(h.send(play("abcd1234")).await).await;
    assert_eq!(json, serde_json::json!({ "success": true, "plays": 1 }));
    let json = body_json(h.send(play("abcd1234")).await).await;
    assert_eq!(json["plays"], 2);

    let response = h.send(play("nosuchpl")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn play_is_rate_limited_per_client() {
    let mut config = base_config();
    config.play_rate = RateLimitConfig::per_window(2, 60);
    let h = Harness::with(config, ScriptedFetcher::default());
    h.seed("abcd1234", "meno", false).await;

    assert_eq!(h.send(play("abcd1234")).await.status(), StatusCode::OK);
    assert_eq!(h.send(play("abcd1234")).await.status(), StatusCode::OK);
    let limited = h.send(play("abcd1234")).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(limited).await["error"]["code"], "RATE_LIMITED");

    // Reads are not behind the play limiter.
    assert_eq!(h.send(get("/api/audio?a=abcd1234")).await.status(), StatusCode::OK);
}

// ── Admin console ───────────────────────────────────────────────────

#[tokio::test]
async fn admin_requires_bearer_token() {
    let h = Harness::new();
    let response = h.send(get("/api/admin/stats")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/admin/stats")
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(h.send(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_disabled_without_token() {
    let mut config = base_config();
    config.admin.token = None;
    let h = Harness::with(config, ScriptedFetcher::default());
    let response = h.send(admin("GET", "/api/admin/stats", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_stats_and_file_filters() {
    let h = Harness::new();
    h.seed("standard", "meno", false).await;
    h.seed("demo0001", "visitor", true).await;

    let json = body_json(h.send(admin("GET", "/api/admin/stats", None)).await).await;
    assert_eq!(json["totalFiles"], 2);
    assert_eq!(json["demoFiles"], 1);
    assert_eq!(json["pendingMigration"], 1);
    assert_eq!(json["totalSize"], 2048);

    let json = body_json(h.send(admin("GET", "/api/admin/files?filter=demo", None)).await).await;
    let files = json.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["permlink"], "demo0001");
    assert_eq!(files[0]["migration_status"], "skip");

    let json = body_json(h.send(admin("GET", "/api/admin/files", None)).await).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn admin_delete_is_logical() {
    let h = Harness::new();
    h.seed("abcd1234", "meno", false).await;

    let response = h.send(admin("DELETE", "/api/admin/files/abcd1234", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    // Gone from reads and plays, still held for the unpin job.
    assert_eq!(h.send(get("/api/audio?a=abcd1234")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.send(play("abcd1234")).await.status(), StatusCode::NOT_FOUND);
    let removed = h.store.removed(10).await.unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].permlink().as_str(), "abcd1234");

    let response = h.send(admin("DELETE", "/api/admin/files/nosuchpl", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_user_listing_details_and_ban() {
    let h = Harness::new();
    let response = h.send(upload(Some(API_KEY), "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(h.send(admin("GET", "/api/admin/users?search=men", None)).await).await;
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["users"][0]["username"], "meno");

    let json = body_json(h.send(admin("GET", "/api/admin/users/meno", None)).await).await;
    assert_eq!(json["username"], "meno");
    assert_eq!(json["stats"]["totalUploads"], 1);

    let response = h.send(admin("GET", "/api/admin/users/ghost", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = h
        .send(admin(
            "PUT",
            "/api/admin/users/meno/ban",
            Some(serde_json::json!({ "banned": true })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"]["banned"], true);
    assert_eq!(json["user"]["canUpload"], false);

    // The ban applies to the next upload.
    let response = h.send(upload(Some(API_KEY), "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.content.pins(), 1);

    let json = body_json(h.send(admin("GET", "/api/admin/users?banned=true", None)).await).await;
    assert_eq!(json["pagination"]["total"], 1);

    let response = h
        .send(admin(
            "PUT",
            "/api/admin/users/ghost/ban",
            Some(serde_json::json!({ "banned": true })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_user_listing_past_the_last_page_is_empty() {
    let h = Harness::new();
    let response = h.send(upload(Some(API_KEY), "meno", CLIP_FIELDS, CLIP)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = h
        .send(admin("GET", "/api/admin/users?page=9223372036854775807", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["users"].as_array().unwrap().len(), 0);
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["pagination"]["page"], i64::MAX);
}
