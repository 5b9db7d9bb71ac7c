//! HTTP server for Gatehouse

mod http;

pub use http::{
    error_response, handle_account_request, json_response, parse_cookie, respond, run, AppState,
};
