//! End-to-end account API tests against the assembled handler tree

use bytes::Bytes;
use clap::Parser;
use http_body_util::BodyExt;
use hyper::header::{HeaderMap, SET_COOKIE};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

use gatehouse::config::Args;
use gatehouse::interaction::password::LogEmailSender;
use gatehouse::interaction::DisabledInteractionProvider;
use gatehouse::server::handle_account_request;
use gatehouse::Gatehouse;

const WEB_ID: &str = "http://srv/alice/profile/card#me";

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    json: Value,
}

impl Reply {
    /// Session cookie value from `Set-Cookie`
    fn cookie(&self) -> String {
        let header = self.headers[SET_COOKIE].to_str().unwrap();
        let pair = header.split(';').next().unwrap();
        pair.split_once('=').unwrap().1.to_string()
    }
}

fn gatehouse() -> Gatehouse {
    let args = Args::parse_from([
        "gatehouse",
        "--base-url",
        "http://srv/",
        "--password-memory-kib",
        "8",
        "--password-iterations",
        "1",
    ]);
    Gatehouse::new(
        args,
        Arc::new(DisabledInteractionProvider),
        Arc::new(LogEmailSender),
    )
}

/// Path part of an absolute URL on the test server
fn path_of(url: &str) -> &str {
    url.strip_prefix("http://srv").unwrap()
}

async fn request(
    gatehouse: &Gatehouse,
    method: Method,
    path: &str,
    cookie: Option<&str>,
    body: Value,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", format!("gatehouse-account={}", cookie));
    }
    let (parts, ()) = builder.body(()).unwrap().into_parts();
    let response =
        handle_account_request(&gatehouse.state, parts, Bytes::from(body.to_string())).await;

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    Reply {
        status,
        headers,
        json: serde_json::from_slice(&bytes).unwrap(),
    }
}

async fn register_alice(gatehouse: &Gatehouse) -> (String, String) {
    let reply = request(
        gatehouse,
        Method::POST,
        "/.account/register/",
        None,
        json!({
            "account": {},
            "login": { "email": "alice@example.com", "password": "secret" },
            "pod": { "name": "alice" },
        }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.json);
    assert_eq!(reply.json["pod"]["webId"], WEB_ID);
    assert_eq!(reply.json["pod"]["baseUrl"], "http://srv/alice/");

    let account_id = reply.json["account"]["accountId"].as_str().unwrap().to_string();
    (account_id, reply.cookie())
}

#[tokio::test]
async fn test_registration_creates_logged_in_account() {
    let gatehouse = gatehouse();
    let (account_id, cookie) = register_alice(&gatehouse).await;

    let account_path = format!("/.account/account/{}/", account_id);
    let reply = request(&gatehouse, Method::GET, &account_path, Some(&cookie), json!({})).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["id"], account_id.as_str());
    assert!(reply.json["webIds"][WEB_ID].is_string());
    assert!(reply.json["pods"]["http://srv/alice/"].is_string());
    assert!(reply.json["logins"]["password"].is_string());
    assert_eq!(reply.json["apiVersion"], "0.4");

    assert!(gatehouse.pod_manager.get("http://srv/alice/").is_some());

    // Another account's URL is indistinguishable from a missing one
    let reply = request(&gatehouse, Method::GET, &account_path, None, json!({})).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json["statusCode"], 404);
}

#[tokio::test]
async fn test_controls_follow_the_session() {
    let gatehouse = gatehouse();
    let (account_id, cookie) = register_alice(&gatehouse).await;

    let reply = request(&gatehouse, Method::GET, "/.account/", None, json!({})).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json["controls"]["password"]["login"],
        "http://srv/.account/login/password/"
    );
    assert!(reply.json["controls"]["account"].get("account").is_none());

    let reply = request(&gatehouse, Method::GET, "/.account/", Some(&cookie), json!({})).await;
    assert_eq!(
        reply.json["controls"]["account"]["account"],
        format!("http://srv/.account/account/{}/", account_id)
    );
}

#[tokio::test]
async fn test_password_login() {
    let gatehouse = gatehouse();
    let (account_id, _) = register_alice(&gatehouse).await;

    let reply = request(
        &gatehouse,
        Method::POST,
        "/.account/login/password/",
        None,
        json!({ "email": "alice@example.com", "password": "secret" }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json["account"],
        format!("http://srv/.account/account/{}/", account_id)
    );
    let cookie = reply.cookie();

    let reply = request(
        &gatehouse,
        Method::GET,
        &format!("/.account/account/{}/", account_id),
        Some(&cookie),
        json!({}),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = request(
        &gatehouse,
        Method::POST,
        "/.account/login/password/",
        None,
        json!({ "email": "alice@example.com", "password": "wrong" }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["name"], "BadRequestHttpError");
}

#[tokio::test]
async fn test_unlinked_web_id_invalidates_credential_tokens() {
    let gatehouse = gatehouse();
    let (account_id, cookie) = register_alice(&gatehouse).await;
    let account_path = format!("/.account/account/{}/", account_id);

    let reply = request(
        &gatehouse,
        Method::POST,
        &format!("{}client-credentials/", account_path),
        Some(&cookie),
        json!({ "name": "my token", "webId": WEB_ID }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.json);
    let token_id = reply.json["id"].as_str().unwrap().to_string();
    let secret = reply.json["secret"].as_str().unwrap().to_string();
    assert!(token_id.starts_with("my-token_"));
    assert_eq!(secret.len(), 128);

    let client = gatehouse.state.client_adapter.find(&token_id).await.unwrap().unwrap();
    assert_eq!(client.client_secret, secret);

    let account = request(&gatehouse, Method::GET, &account_path, Some(&cookie), json!({})).await;
    let web_id_url = account.json["webIds"][WEB_ID].as_str().unwrap().to_string();
    let reply = request(&gatehouse, Method::DELETE, path_of(&web_id_url), Some(&cookie), json!({})).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.json);

    assert!(gatehouse.state.client_adapter.find(&token_id).await.unwrap().is_none());
    assert!(gatehouse.state.account_store.find_by_web_id(WEB_ID).await.unwrap().is_none());
}

#[tokio::test]
async fn test_registration_reports_failed_steps_inline() {
    let gatehouse = gatehouse();
    register_alice(&gatehouse).await;

    let reply = request(
        &gatehouse,
        Method::POST,
        "/.account/register/",
        None,
        json!({
            "account": {},
            "login": { "email": "mallory@example.com", "password": "secret" },
            "pod": { "name": "alice" },
        }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.json["login"]["password"].is_string());
    assert!(reply.json["pod"]["error"]
        .as_str()
        .unwrap()
        .contains("http://srv/alice/"));
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let gatehouse = gatehouse();
    let (account_id, cookie) = register_alice(&gatehouse).await;
    let account_path = format!("/.account/account/{}/", account_id);

    let reply = request(
        &gatehouse,
        Method::POST,
        &format!("{}logout/", account_path),
        Some(&cookie),
        json!({}),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = request(&gatehouse, Method::GET, &account_path, Some(&cookie), json!({})).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_method_and_path_errors() {
    let gatehouse = gatehouse();

    let reply = request(&gatehouse, Method::PUT, "/.account/register/", None, json!({})).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);

    let reply = request(&gatehouse, Method::GET, "/.account/nothing/", None, json!({})).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = request(&gatehouse, Method::GET, "/.account/oidc/prompt/", None, json!({})).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}
