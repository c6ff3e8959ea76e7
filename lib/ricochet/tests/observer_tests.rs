//! Observer hook and transport layering tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert2::{check, let_assert};
use ricochet::{AttemptOutcome, Client, Completion, Error, Method, Request, RequestInfo};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Seen {
    method: Method,
    path: String,
    attempt: u32,
    hop: u32,
    status: Option<u16>,
    failed: bool,
}

/// Observer storing every request it sees.
fn recording_observer(
    log: Arc<Mutex<Vec<Seen>>>,
) -> impl Fn(&RequestInfo) -> Completion + Send + Sync + 'static {
    move |info: &RequestInfo| -> Completion {
        let log = Arc::clone(&log);
        let method = info.method;
        let path = info.url.path().to_string();
        let (attempt, hop) = (info.attempt, info.hop);
        Box::new(move |outcome: &AttemptOutcome<'_>| {
            log.lock().expect("lock").push(Seen {
                method,
                path,
                attempt,
                hop,
                status: outcome.status,
                failed: outcome.error.is_some(),
            });
        })
    }
}

#[tokio::test]
async fn test_observer_sees_every_retry_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let log = Arc::new(Mutex::new(Vec::new()));
    let client = Client::builder()
        .base_url(&server.uri())
        .observe(recording_observer(Arc::clone(&log)))
        .retry_on_error()
        .retry_delay(Duration::from_millis(1))
        .build()
        .expect("client");

    let_assert!(Err(_) = client.get("/flaky").send().await);

    let seen = log.lock().expect("lock").clone();
    let attempts: Vec<u32> = seen.iter().map(|s| s.attempt).collect();
    check!(attempts == vec![1, 2, 3]);
    check!(seen.iter().all(|s| s.status == Some(503) && !s.failed));
}

#[tokio::test]
async fn test_observer_sees_every_redirect_hop() {
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let log = Arc::new(Mutex::new(Vec::new()));
    let client = Client::builder()
        .base_url(&server.uri())
        .encode_json()
        .observe(recording_observer(Arc::clone(&log)))
        .build()
        .expect("client");

    client
        .post("/old")
        .body(&serde_json::json!({"a": 1}))
        .send()
        .await
        .expect("response");

    let seen = log.lock().expect("lock").clone();
    check!(
        seen == vec![
            Seen {
                method: Method::Post,
                path: "/old".to_string(),
                attempt: 1,
                hop: 0,
                status: Some(303),
                failed: false,
            },
            Seen {
                method: Method::Get,
                path: "/new".to_string(),
                attempt: 1,
                hop: 1,
                status: Some(200),
                failed: false,
            },
        ]
    );
}

#[tokio::test]
async fn test_observer_sees_transport_failures() {
    let service = tower::service_fn(|_request: Request| async {
        Err::<ricochet::Response, _>(Error::connection("connection reset"))
    });

    let log = Arc::new(Mutex::new(Vec::new()));
    let client = Client::builder()
        .base_url("http://localhost/")
        .transport(service)
        .observe(recording_observer(Arc::clone(&log)))
        .build()
        .expect("client");

    let_assert!(Err(_) = client.get("/").send().await);

    let seen = log.lock().expect("lock").clone();
    let_assert!([only] = seen.as_slice());
    check!(only.failed);
    check!(only.status.is_none());
}

#[tokio::test]
async fn test_panicking_observer_does_not_change_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let on_start = Client::builder()
        .base_url(&server.uri())
        .observe(|_info: &RequestInfo| -> Completion { panic!("observer failure") })
        .build()
        .expect("client");
    let response = on_start.get("/").send().await.expect("response");
    check!(response.status() == 200);

    let on_completion = on_start
        .derive()
        .observe(|_info: &RequestInfo| -> Completion {
            Box::new(|_outcome: &AttemptOutcome<'_>| panic!("completion failure"))
        })
        .build()
        .expect("client");
    let response = on_completion.get("/").send().await.expect("response");
    check!(response.status() == 200);
}

#[tokio::test]
async fn test_layers_wrap_the_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let layer = tower::layer::layer_fn(move |inner: ricochet::BoxedTransport| {
        let counter = Arc::clone(&counter);
        tower::ServiceExt::map_request(inner, move |request: Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            request
        })
    });

    let client = Client::builder()
        .base_url(&server.uri())
        .layer(layer)
        .build()
        .expect("client");

    client.get("/").send().await.expect("response");
    client.get("/").send().await.expect("response");
    check!(calls.load(Ordering::SeqCst) == 2);
}
