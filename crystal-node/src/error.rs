use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crystal_types::AddressError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid key")]
    InvalidKey,
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("invalid body: {0}")]
    InvalidBody(String),
    #[error("internal fault: {0}")]
    InternalFault(String),
}

impl ShardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ShardError::InvalidPath(_) | ShardError::InvalidKey | ShardError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            ShardError::NotFound(_) => StatusCode::NOT_FOUND,
            ShardError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ShardError::InternalFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AddressError> for ShardError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::InvalidPath(path) => ShardError::InvalidPath(path),
        }
    }
}

impl From<StorageError> for ShardError {
    fn from(err: StorageError) -> Self {
        ShardError::InternalFault(err.to_string())
    }
}

impl IntoResponse for ShardError {
    fn into_response(self) -> Response {
        let body = match &self {
            ShardError::InvalidPath(_) => "bad request path".to_string(),
            ShardError::InvalidKey => "invalid key".to_string(),
            ShardError::NotFound(_) => "not found".to_string(),
            ShardError::MethodNotAllowed => "method not allowed".to_string(),
            ShardError::InvalidBody(reason) => format!("invalid body: {reason}"),
            //the fault itself goes to the error reporter, never onto the wire
            ShardError::InternalFault(_) => "internal server error".to_string(),
        };
        (self.status(), body).into_response()
    }
}

//a failed call to a parent, retried by the next propagation and never shown to the caller
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("parent answered with status {0}")]
    Status(u16),
    #[error("couldn't decode parent reply: {0}")]
    Decode(String),
    #[error("parent shard unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => UpstreamError::Status(status.as_u16()),
            None if err.is_decode() => UpstreamError::Decode(err.to_string()),
            None => UpstreamError::Transport(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored state is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
