//! Response envelope shared by every admin endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::admin::AdminError;

pub const CODE_OK: &str = "0000";
pub const CODE_PARAM: &str = "0001";
pub const CODE_CREATE: &str = "0002";
pub const CODE_UPDATE: &str = "0003";
pub const CODE_QUERY: &str = "0004";
pub const CODE_DELETE: &str = "0005";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: bool,
    pub status_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok() -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::<()> {
            status: true,
            status_code: CODE_OK.to_string(),
            message: "ok".to_string(),
            data: None,
        }),
    )
        .into_response()
}

pub fn ok_with<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            status: true,
            status_code: CODE_OK.to_string(),
            message: "ok".to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn fail(code: &str, message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()> {
            status: false,
            status_code: code.to_string(),
            message: message.into(),
            data: None,
        }),
    )
        .into_response()
}

pub fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ApiResponse::<()> {
            status: false,
            status_code: "403".to_string(),
            message: "permission deny".to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Map an admin failure to the envelope: validation problems report the
/// parameter code, everything else the operation's code.
pub fn fail_for(op_code: &str, err: &AdminError) -> Response {
    let code = match err {
        AdminError::Admission(_) | AdminError::InvalidParam(_) => CODE_PARAM,
        _ => op_code,
    };
    fail(code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_omits_data() {
        let body = ApiResponse::<()> {
            status: true,
            status_code: CODE_OK.to_string(),
            message: "ok".to_string(),
            data: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], true);
        assert_eq!(json["status_code"], "0000");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn data_envelope_includes_data() {
        let body = ApiResponse {
            status: true,
            status_code: CODE_OK.to_string(),
            message: "ok".to_string(),
            data: Some(vec![1, 2, 3]),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
    }
}
