use serde::{Deserialize, Serialize};

use crate::auth::Credential;

/// Body of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /auth/refresh` and `POST /auth/logout`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Credentials issued by login, registration and renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: Credential,
    pub refresh_token: Credential,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pair_wire_shape() {
        let pair: TokenPair =
            serde_json::from_str(r#"{"accessToken": "a.b.c", "refreshToken": "r-1"}"#)
                .expect("token pair should parse");
        assert_eq!(pair.access_token.expose(), "a.b.c");
        assert_eq!(pair.refresh_token.expose(), "r-1");
    }

    #[test]
    fn test_refresh_request_serializes_camel_case() {
        let body = serde_json::to_value(RefreshRequest { refresh_token: "r-1" })
            .expect("refresh request should serialize");
        assert_eq!(body, serde_json::json!({ "refreshToken": "r-1" }));
    }
}
