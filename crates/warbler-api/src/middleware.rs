use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::auth::AppState;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "warbler_session";

/// The session token presented with a request: an `Authorization: Bearer`
/// header, or else the session cookie. An explicit header wins over a
/// cookie the browser may still be holding from an ended session.
pub fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    bearer.or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
}

/// Resolve the acting identity once per request and attach it as an
/// extension. Handlers that change state call [`Identity::require`].
///
/// [`Identity::require`]: crate::session::Identity::require
pub async fn resolve_identity(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(&jar, req.headers());
    let identity = state.sessions.resolve(&state.db, token.as_deref()).await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookie: Option<&str>, bearer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = cookie {
            let value = format!("{}={}", SESSION_COOKIE, token);
            headers.insert(header::COOKIE, HeaderValue::from_str(&value).unwrap());
        }
        if let Some(token) = bearer {
            let value = format!("Bearer {}", token);
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
        }
        headers
    }

    fn token(cookie: Option<&str>, bearer: Option<&str>) -> Option<String> {
        let headers = headers(cookie, bearer);
        session_token(&CookieJar::from_headers(&headers), &headers)
    }

    #[test]
    fn bearer_wins_over_cookie() {
        assert_eq!(token(Some("stale"), Some("fresh")).as_deref(), Some("fresh"));
    }

    #[test]
    fn either_source_alone_is_used() {
        assert_eq!(token(Some("from-cookie"), None).as_deref(), Some("from-cookie"));
        assert_eq!(token(None, Some("from-header")).as_deref(), Some("from-header"));
        assert_eq!(token(None, None), None);
    }
}
