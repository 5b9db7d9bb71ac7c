//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Requests under the
//! account path become `InteractionInput`s for the account API handler
//! tree; everything else is a health endpoint or a 404.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::account::AccountStore;
use crate::config::Args;
use crate::credentials::ClientAdapter;
use crate::interaction::routing::join_url;
use crate::interaction::{
    InteractionHandler, InteractionInput, InteractionProvider, JsonObject, JsonRepresentation,
};
use crate::notifications::WebSocketRegistry;
use crate::routes;
use crate::types::{GatehouseError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub account_store: Arc<dyn AccountStore>,
    /// Root of the account API handler tree
    pub account_api: Arc<dyn InteractionHandler>,
    /// Source of active OIDC interactions
    pub interaction_provider: Arc<dyn InteractionProvider>,
    /// Client lookup handed to the OIDC provider; includes credential tokens
    pub client_adapter: Arc<dyn ClientAdapter>,
    /// Open notification sockets
    pub sockets: Arc<WebSocketRegistry>,
    pub started_at: Instant,
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Gatehouse listening on {}, account API at {}",
        state.args.listen,
        state.args.account_base_url()
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, Infallible>(handle_request(state, addr, req).await) }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    info!("[{}] {} {}", addr, method, path);

    if path.starts_with(&state.args.account_path_prefix()) {
        let (parts, body) = req.into_parts();
        return match body.collect().await {
            Ok(collected) => handle_account_request(&state, parts, collected.to_bytes()).await,
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                error_response(&GatehouseError::BadRequest(
                    "Failed to read request body".to_string(),
                ))
            }
        };
    }

    match (method, path.as_str()) {
        // Liveness probe - returns 200 if gatehouse is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(&state),
        (Method::GET, "/version") => routes::version_info(),
        (Method::OPTIONS, _) => preflight_response(),
        _ => error_response(&GatehouseError::NotFound(format!("{} not found", path))),
    }
}

/// Extract the value of cookie `name` from a `Cookie` header
pub fn parse_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn parse_body(body: &Bytes) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(JsonObject::new()));
    }
    serde_json::from_slice(body)
        .map_err(|e| GatehouseError::BadRequest(format!("Invalid JSON body: {}", e)))
}

async fn build_input(state: &AppState, parts: &Parts, body: &Bytes) -> Result<InteractionInput> {
    let target = join_url(&state.args.base_url(), parts.uri.path());
    let mut input = InteractionInput::new(parts.method.clone(), target).with_json(parse_body(body)?);

    let cookie = parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|header| parse_cookie(header, &state.args.cookie_name));
    if let Some(cookie) = cookie {
        input.account_id = state.account_store.find_by_cookie(&cookie).await?;
        if input.account_id.is_none() {
            debug!("Ignoring unknown or expired session cookie");
        }
        input.metadata.account_cookie = Some(cookie);
    }

    input.oidc_interaction = state.interaction_provider.interaction_details(parts).await?;
    Ok(input)
}

/// Run an account API request through the handler tree
pub async fn handle_account_request(state: &AppState, parts: Parts, body: Bytes) -> Response<Full<Bytes>> {
    let result = match build_input(state, &parts, &body).await {
        Ok(input) => state.account_api.handle_safe(&input).await,
        Err(e) => Err(e),
    };
    respond(result, &state.args.cookie_name)
}

/// Turn a handler result into an HTTP response
pub fn respond(result: Result<JsonRepresentation>, cookie_name: &str) -> Response<Full<Bytes>> {
    let representation = match result {
        Ok(representation) => representation,
        Err(e) => return error_response(&e),
    };

    let mut response = json_response(StatusCode::OK, &Value::Object(representation.json));
    if let Some(metadata) = representation.metadata {
        if let Some(cookie) = metadata.account_cookie {
            let value = format!("{}={}; Path=/; SameSite=Lax", cookie_name, cookie);
            insert_header(&mut response, SET_COOKIE, &value);
        }
        if let Some(location) = metadata.location {
            insert_header(&mut response, LOCATION, &location);
        }
    }
    response
}

fn insert_header(response: &mut Response<Full<Bytes>>, name: hyper::header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            response.headers_mut().insert(name, value);
        }
        Err(_) => warn!("Dropping invalid {} header value", name),
    }
}

/// JSON response with the given status
pub fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Error body `{ name, message, statusCode }`; redirects also get a `Location`
pub fn error_response(err: &GatehouseError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        debug!("Request rejected ({}): {}", status.as_u16(), err);
    }

    let body = json!({
        "name": err.name(),
        "message": err.to_string(),
        "statusCode": status.as_u16(),
    });
    let mut response = json_response(status, &body);
    if let GatehouseError::Found { location } = err {
        insert_header(&mut response, LOCATION, location);
    }
    response
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert("Access-Control-Allow-Headers", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::ResponseMetadata;

    #[test]
    fn test_parse_cookie() {
        let header = "theme=dark; gatehouse-account=abc-123; other=1";
        assert_eq!(parse_cookie(header, "gatehouse-account").as_deref(), Some("abc-123"));
        assert_eq!(parse_cookie(header, "missing"), None);
        assert_eq!(parse_cookie("gatehouse-account=", "gatehouse-account"), None);
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(&Bytes::new()).unwrap(), json!({}));
        assert_eq!(parse_body(&Bytes::from(" {\"a\":1}")).unwrap(), json!({ "a": 1 }));
        assert!(parse_body(&Bytes::from("{")).is_err());
    }

    #[test]
    fn test_respond_sets_cookie_and_location() {
        let representation = JsonRepresentation::new(JsonObject::new()).with_metadata(ResponseMetadata {
            account_cookie: Some("abc".into()),
            location: Some("http://srv/.account/account/1/".into()),
        });
        let response = respond(Ok(representation), "gatehouse-account");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[SET_COOKIE],
            "gatehouse-account=abc; Path=/; SameSite=Lax"
        );
        assert_eq!(response.headers()[LOCATION], "http://srv/.account/account/1/");
    }

    #[test]
    fn test_errors_map_to_status() {
        let response = respond(
            Err(GatehouseError::Found {
                location: "http://idp/return".into(),
            }),
            "c",
        );
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "http://idp/return");

        let response = error_response(&GatehouseError::MethodNotAllowed {
            method: "PUT".into(),
        });
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
