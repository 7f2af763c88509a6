/// Custom middleware for the API server
///
/// Bearer authentication lives in `taskvault_shared::auth::middleware`;
/// CORS, tracing, timeouts and panic recovery come from `tower-http`.

pub mod rate_limit;
