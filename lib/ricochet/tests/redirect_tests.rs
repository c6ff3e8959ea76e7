//! Redirect handling tests using wiremock.

use assert2::{check, let_assert};
use ricochet::{Client, Error, MAX_REDIRECTS};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn redirect_to(status: u16, location: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).insert_header("Location", location)
}

fn json_client(server: &MockServer) -> Client {
    Client::builder()
        .base_url(&server.uri())
        .encode_json()
        .decode_json()
        .build()
        .expect("client")
}

#[tokio::test]
async fn test_redirects_are_followed() {
    for status in [301, 302, 303, 307, 308] {
        let server = MockServer::start().await;
        Mock::given(path("/start"))
            .respond_with(redirect_to(status, "/redirected"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/redirected"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let (response, body): (_, serde_json::Value) = json_client(&server)
            .get("/start")
            .fetch()
            .await
            .unwrap_or_else(|err| panic!("status {status}: {err}"));

        check!(response.status() == 200);
        check!(body == serde_json::json!({"ok": true}));
        let final_url = response.url().map(|url| url.path().to_string());
        check!(final_url.as_deref() == Some("/redirected"));
    }
}

#[tokio::test]
async fn test_temporary_redirect_resends_method_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/start"))
        .respond_with(redirect_to(307, "/redirected"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/redirected"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    json_client(&server)
        .post("/start")
        .body(&serde_json::json!({"a": 1}))
        .send()
        .await
        .expect("response");

    let requests = server.received_requests().await.expect("recorded");
    let_assert!([first, redirected] = requests.as_slice());
    check!(first.body == br#"{"a":1}"#);
    check!(redirected.method.as_str() == "POST");
    check!(redirected.body == first.body);
}

#[tokio::test]
async fn test_see_other_switches_to_get_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/form"))
        .respond_with(redirect_to(303, "/result"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/result"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    json_client(&server)
        .post("/form")
        .body(&serde_json::json!({"a": 1}))
        .send()
        .await
        .expect("response");

    let requests = server.received_requests().await.expect("recorded");
    let_assert!([_, redirected] = requests.as_slice());
    check!(redirected.body.is_empty());
    check!(redirected.headers.get("content-type").is_none());
}

#[tokio::test]
async fn test_redirect_loop_stops_after_ten_requests() {
    let server = MockServer::start().await;
    Mock::given(path("/loop"))
        .respond_with(redirect_to(302, "/loop"))
        .expect(10)
        .mount(&server)
        .await;

    let_assert!(Err(err) = json_client(&server).get("/loop").send().await);
    let_assert!(Error::TooManyRedirects { max } = &err);
    check!(*max == MAX_REDIRECTS);
    check!(err.as_http().is_none());
    insta::assert_snapshot!(err.to_string(), @"too many redirects: stopped after 10 redirects");
}

#[tokio::test]
async fn test_no_follow_returns_redirect_as_http_error() {
    let server = MockServer::start().await;
    Mock::given(path("/start"))
        .respond_with(redirect_to(302, "/elsewhere"))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server).derive().no_follow().build().expect("client");
    let_assert!(Err(err) = client.get("/start").send().await);

    check!(err.status() == Some(302));
    let_assert!(Some(http) = err.as_http());
    check!(http.response().header("location") == Some("/elsewhere"));
}

#[tokio::test]
async fn test_redirect_without_location_is_an_http_error() {
    let server = MockServer::start().await;
    Mock::given(path("/start"))
        .respond_with(ResponseTemplate::new(301))
        .expect(1)
        .mount(&server)
        .await;

    let_assert!(Err(err) = json_client(&server).get("/start").send().await);
    check!(err.status() == Some(301));
}

#[tokio::test]
async fn test_redirect_to_error_reports_final_status() {
    let server = MockServer::start().await;
    Mock::given(path("/start"))
        .respond_with(redirect_to(308, "/gone"))
        .mount(&server)
        .await;
    Mock::given(path("/gone"))
        .respond_with(
            ResponseTemplate::new(410).set_body_json(serde_json::json!({"reason": "gone"})),
        )
        .mount(&server)
        .await;

    let_assert!(Err(Error::Http(err)) = json_client(&server).get("/start").send().await);
    check!(err.status() == 410);
    let body: serde_json::Value = err.decode().expect("decode");
    check!(body["reason"] == "gone");
}
