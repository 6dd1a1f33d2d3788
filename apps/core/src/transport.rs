use serde::{Deserialize, Serialize};

use crate::contract::{CoreRequest, CoreResponse};
use crate::core_service::{CoreService, ServiceError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    InvalidInput,
    ExecutableNotFound,
    NoPathFound,
    PathNotFound,
    LaunchFailed,
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransportResponse {
    Ok { response: CoreResponse },
    Err { error: ErrorResponse },
}

pub fn handle_request(service: &mut CoreService, request: CoreRequest) -> TransportResponse {
    match service.handle_command(request) {
        Ok(response) => TransportResponse::Ok { response },
        Err(error) => {
            crate::logging::error(&format!("request failed: {error}"));
            TransportResponse::Err {
                error: map_service_error(error),
            }
        }
    }
}

pub fn handle_json(service: &mut CoreService, payload: &str) -> String {
    let response = match serde_json::from_str::<CoreRequest>(payload) {
        Ok(request) => handle_request(service, request),
        Err(error) => TransportResponse::Err {
            error: ErrorResponse {
                code: ErrorCode::InvalidJson,
                message: error.to_string(),
            },
        },
    };

    serde_json::to_string(&response).unwrap_or_else(|_| {
        "{\"status\":\"err\",\"error\":{\"code\":\"invalid_json\",\"message\":\"response encoding failed\"}}"
            .to_string()
    })
}

fn map_service_error(error: ServiceError) -> ErrorResponse {
    let message = error.to_string();
    let code = match error {
        ServiceError::InvalidInput => ErrorCode::InvalidInput,
        ServiceError::ExecutableNotFound(_) => ErrorCode::ExecutableNotFound,
        ServiceError::NoPathFound(_) => ErrorCode::NoPathFound,
        ServiceError::PathNotFound(_) => ErrorCode::PathNotFound,
        ServiceError::Launch(_) => ErrorCode::LaunchFailed,
        ServiceError::Config(_) => ErrorCode::Config,
    };
    ErrorResponse { code, message }
}
