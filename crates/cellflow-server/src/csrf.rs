use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;
use serde_json::json;

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "x-csrftoken";

const TOKEN_LEN: usize = 32;

/// Generate a random anti-forgery token.
pub fn generate_token() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn cookie_token(request: &Request<Body>) -> Option<String> {
    let raw = request.headers().get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == CSRF_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Double-submit cookie check. Safe methods pass through and are issued
/// a token cookie if the client has none; unsafe methods must echo the
/// cookie value back in the `X-CSRFToken` header.
pub async fn csrf_middleware(request: Request<Body>, next: Next) -> Response {
    if is_safe_method(request.method()) {
        let needs_cookie = cookie_token(&request).is_none();
        let mut response = next.run(request).await;
        if needs_cookie {
            let cookie = format!(
                "{CSRF_COOKIE}={}; Path=/; SameSite=Lax",
                generate_token()
            );
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        return response;
    }

    let cookie = cookie_token(&request);
    let header = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match (cookie, header) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && cookie == header => {
            next.run(request).await
        }
        _ => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "CSRF verification failed" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_alphanumeric_and_sized() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn safe_methods() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::DELETE));
        assert!(!is_safe_method(&Method::PUT));
    }

    #[test]
    fn cookie_parsing_picks_the_right_pair() {
        let request = Request::builder()
            .header(header::COOKIE, "session=abc; csrftoken=tok123; other=x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(cookie_token(&request).as_deref(), Some("tok123"));

        let request = Request::builder()
            .header(header::COOKIE, "session=abc")
            .body(Body::empty())
            .unwrap();
        assert!(cookie_token(&request).is_none());
    }
}
