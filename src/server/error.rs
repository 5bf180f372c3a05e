use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Server error type that provides automatic logging and plain-text error
/// responses.
///
/// Client errors (4xx) are expected user input problems and are logged at
/// debug level; server errors (5xx) are logged at error level with the full
/// source chain. The unauthorized variant additionally carries a
/// `WWW-Authenticate` challenge so browsers prompt for credentials and retry.
#[derive(Debug)]
pub struct ServerError {
    /// HTTP status code to return
    pub status: StatusCode,
    /// User-facing error message (returned in response body)
    pub message: String,
    /// Internal error with full chain (logged but not exposed beyond the message)
    pub source: Option<anyhow::Error>,
    /// Optional `WWW-Authenticate` header value for 401 responses
    pub www_authenticate: Option<String>,
}

impl ServerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
            www_authenticate: None,
        }
    }

    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Create a 500 Internal Server Error from an anyhow::Error
    pub fn upstream(source: anyhow::Error, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            source: Some(source),
            www_authenticate: None,
        }
    }

    /// Create a 401 response carrying a Basic-Auth challenge whose realm
    /// names the image reference, so a browser retry prompts for credentials.
    pub fn unauthorized_challenge(reference: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: format!("Authentication required for pulling {}", reference),
            source: None,
            www_authenticate: Some(format!(
                "Basic realm=\"tarcast registry challenge: {}\"",
                reference.replace('"', "")
            )),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = self.status.as_u16(),
                    message = %self.message,
                    error = ?source,
                    "Server error"
                );
            } else {
                tracing::error!(
                    status = self.status.as_u16(),
                    message = %self.message,
                    "Server error"
                );
            }
        } else {
            tracing::debug!(
                status = self.status.as_u16(),
                message = %self.message,
                "Client error"
            );
        }

        let mut response = (self.status, self.message).into_response();
        if let Some(challenge) = &self.www_authenticate {
            if let Ok(value) = HeaderValue::from_str(challenge) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        Self::upstream(err, "Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_realm_contains_reference() {
        let err = ServerError::unauthorized_challenge("ghcr.io/org/app:v1");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        let challenge = err.www_authenticate.as_deref().unwrap();
        assert!(challenge.starts_with("Basic realm=\""));
        assert!(challenge.contains("ghcr.io/org/app:v1"));
    }

    #[test]
    fn challenge_strips_quotes_from_reference() {
        let err = ServerError::unauthorized_challenge("bad\"ref");
        let challenge = err.www_authenticate.as_deref().unwrap();
        assert_eq!(challenge.matches('"').count(), 2);
    }

    #[test]
    fn challenge_header_set_on_response() {
        let response = ServerError::unauthorized_challenge("alpine:latest").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let value = response.headers().get(header::WWW_AUTHENTICATE).unwrap();
        assert!(value.to_str().unwrap().contains("alpine:latest"));
    }
}
