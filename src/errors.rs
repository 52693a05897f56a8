//! # Error Types Module
//!
//! This module defines the error types for the vectormatch API,
//! providing structured error handling instead of string-based error matching.

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Vector dimension mismatch
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector contains a non-finite element (NaN or infinity)
    #[error("Vector contains a non-finite value at position {position}")]
    InvalidValue { position: usize },

    /// Caller-supplied ID is already mapped to a slot
    #[error("Vector ID '{id}' is already mapped")]
    DuplicateId { id: String },

    /// Caller-supplied ID does not exist
    #[error("Vector ID '{id}' does not exist")]
    NotFound { id: String },

    /// Internal slot was never assigned or holds a deleted entry
    #[error("Internal slot {internal_id} does not exist")]
    SlotNotFound { internal_id: u64 },

    /// Search against a store with zero live entries
    #[error("Index is empty")]
    EmptyIndex,

    /// Persistence error
    #[error("Persistence error: {0}")]
    Persistence(#[from] crate::persistence::PersistenceError),

    /// Lock acquisition error
    #[error("Failed to acquire lock: {0}")]
    Lock(String),
}

impl StoreError {
    /// Convert the error to an appropriate HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
            StoreError::InvalidValue { .. } => StatusCode::BAD_REQUEST,
            StoreError::DuplicateId { .. } => StatusCode::CONFLICT,
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::SlotNotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::EmptyIndex => StatusCode::BAD_REQUEST,
            StoreError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StoreError::Lock(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx status codes)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.status_code(),
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::CONFLICT
        )
    }

    /// Check if this is a server error (5xx status codes)
    pub fn is_server_error(&self) -> bool {
        matches!(self.status_code(), StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
