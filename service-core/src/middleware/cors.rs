//! Allow-list CORS policy.
//!
//! [`CorsPolicy::evaluate`] is a pure decision over `(origin, method)`; the
//! axum adapter [`cors_middleware`] applies the decision to a request.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

pub const DEFAULT_ALLOWED_ORIGINS: [&str; 5] = [
    "https://techprocessingllc.com",
    "https://www.techprocessingllc.com",
    "https://admin.techprocessingllc.com",
    "https://portal.techprocessingllc.com",
    "http://localhost:3000",
];

const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str =
    "Content-Type, Authorization, X-Requested-With, X-Request-Id, X-Portal-Session";
const PREFLIGHT_MAX_AGE_SECS: &str = "86400";

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

/// Outcome of evaluating one request against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsDecision {
    /// False only when an `Origin` was sent and it is not allow-listed.
    pub allow: bool,
    /// The request is an `OPTIONS` preflight and must be answered here.
    pub preflight: bool,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl CorsDecision {
    /// Status for a preflight answered by the middleware.
    pub fn preflight_status(&self) -> StatusCode {
        if self.allow {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::FORBIDDEN
        }
    }

    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()))
    }
}

impl CorsPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed_origins = origins
            .into_iter()
            .map(Into::into)
            .map(|origin: String| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        Self { allowed_origins }
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    pub fn evaluate(&self, origin: Option<&str>, method: &Method) -> CorsDecision {
        let preflight = *method == Method::OPTIONS;
        let mut headers = vec![(header::VARY, HeaderValue::from_static("Origin"))];

        let allow = match origin {
            None => {
                headers.push((
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ));
                true
            }
            Some(origin) if self.is_allowed(origin) => match HeaderValue::from_str(origin) {
                Ok(value) => {
                    headers.push((header::ACCESS_CONTROL_ALLOW_ORIGIN, value));
                    headers.push((
                        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                        HeaderValue::from_static("true"),
                    ));
                    true
                }
                Err(_) => false,
            },
            Some(_) => false,
        };

        if allow {
            headers.push((
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ));
            headers.push((
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            ));
            if preflight {
                headers.push((
                    header::ACCESS_CONTROL_MAX_AGE,
                    HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
                ));
            }
        }

        CorsDecision {
            allow,
            preflight,
            headers,
        }
    }
}

/// Answers preflights directly and decorates every other response.
///
/// Requests from unlisted origins still reach the handler; they just get no
/// `Access-Control-Allow-Origin`, so the browser withholds the response.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let decision = policy.evaluate(origin.as_deref(), req.method());

    let mut response = if decision.preflight {
        if !decision.allow {
            tracing::debug!(origin = ?origin, "Rejected CORS preflight");
        }
        let mut response = Response::new(Body::empty());
        *response.status_mut() = decision.preflight_status();
        response
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    for (name, value) in decision.headers {
        headers.insert(name, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_origin_gets_credentials() {
        let policy = CorsPolicy::default();
        for origin in DEFAULT_ALLOWED_ORIGINS {
            let decision = policy.evaluate(Some(origin), &Method::GET);
            assert!(decision.allow);
            assert_eq!(
                decision.header(&header::ACCESS_CONTROL_ALLOW_ORIGIN),
                Some(&HeaderValue::from_static(origin))
            );
            assert_eq!(
                decision.header(&header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
                Some(&HeaderValue::from_static("true"))
            );
            assert_eq!(
                decision.header(&header::VARY),
                Some(&HeaderValue::from_static("Origin"))
            );
        }
    }

    #[test]
    fn unlisted_origin_gets_no_allow_origin() {
        let decision = CorsPolicy::default().evaluate(Some("https://evil.example"), &Method::GET);
        assert!(!decision.allow);
        assert!(decision.header(&header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(decision
            .header(&header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());
        assert!(decision.header(&header::VARY).is_some());
    }

    #[test]
    fn unlisted_preflight_is_forbidden() {
        let decision =
            CorsPolicy::default().evaluate(Some("https://evil.example"), &Method::OPTIONS);
        assert!(decision.preflight);
        assert_eq!(decision.preflight_status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn missing_origin_is_wildcard_without_credentials() {
        let decision = CorsPolicy::default().evaluate(None, &Method::POST);
        assert!(decision.allow);
        assert_eq!(
            decision.header(&header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
        assert!(decision
            .header(&header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());
    }

    #[test]
    fn allowed_preflight_is_no_content() {
        let decision = CorsPolicy::default().evaluate(Some("http://localhost:3000"), &Method::OPTIONS);
        assert_eq!(decision.preflight_status(), StatusCode::NO_CONTENT);
        assert!(decision.header(&header::ACCESS_CONTROL_MAX_AGE).is_some());
    }

    #[test]
    fn configured_origins_are_normalized() {
        let policy = CorsPolicy::new(["https://app.example/ ", " ", "http://localhost:5173"]);
        assert_eq!(
            policy.allowed_origins(),
            &["https://app.example".to_string(), "http://localhost:5173".to_string()]
        );
        assert!(policy.is_allowed("https://app.example"));
    }
}
