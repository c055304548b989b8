//! HTTP error mapping for the service layer.
//!
//! Validation errors map to 400/409, a stale view (`already_resolved`,
//! `version_conflict`) to 409, missing documents to 404 and everything
//! else to 500.

use crate::services::ServiceError;
use crate::store::StoreError;
use gambit_engine::errors::{RoundError, TableError};
use serde::{Deserialize, Serialize};
use std::fmt;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// JSON body of every error reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Stable code clients branch on, e.g. `already_resolved`
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Decides the log level of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Rejected input or a stale client view
    Client,
    Server,
    /// Engine invariant broken; the document was not written
    Critical,
}

pub trait IntoErrorResponse {
    fn status_code(&self) -> StatusCode;

    fn error_code(&self) -> &'static str;

    fn error_message(&self) -> String;

    fn error_details(&self) -> Option<serde_json::Value> {
        None
    }

    fn severity(&self) -> ErrorSeverity {
        if self.status_code().is_server_error() {
            ErrorSeverity::Server
        } else {
            ErrorSeverity::Client
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        let body = ErrorResponse::new(self.error_code(), self.error_message());
        match self.error_details() {
            Some(details) => body.details(details),
            None => body,
        }
    }

    /// Logs at the level given by [`severity`](Self::severity), then builds the reply.
    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let body = self.to_error_response();
        match self.severity() {
            ErrorSeverity::Client => {
                tracing::info!(error = %body.error, message = %body.message, "request rejected")
            }
            ErrorSeverity::Server => {
                tracing::error!(error = %body.error, message = %body.message, "request failed")
            }
            ErrorSeverity::Critical => tracing::error!(
                error = %body.error,
                message = %body.message,
                critical = true,
                "engine invariant violated"
            ),
        }
        body.into_response(status)
    }
}

impl IntoErrorResponse for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Store(e) => match e {
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::AlreadyExists { .. } | StoreError::VersionConflict { .. } => {
                    StatusCode::CONFLICT
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::Round(e) => match e {
                RoundError::InvalidIndex { .. } => StatusCode::BAD_REQUEST,
                RoundError::NoPeeksRemaining
                | RoundError::NoRerollsRemaining
                | RoundError::AlreadyResolved
                | RoundError::AlreadyDealt
                | RoundError::InProgress(_)
                | RoundError::NotHolding(_)
                | RoundError::DeadlineNotReached
                | RoundError::EncounterFinished => StatusCode::CONFLICT,
                RoundError::InvalidOpponentHand(_)
                | RoundError::Opponent(_)
                | RoundError::Deck(_)
                | RoundError::Eval(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::Table(e) => match e {
                TableError::InvalidBetAmount { .. }
                | TableError::InsufficientChips { .. }
                | TableError::BetPending { .. }
                | TableError::NothingToCall
                | TableError::NothingToRaise
                | TableError::NotEnoughPlayers(_)
                | TableError::ChipLimit { .. }
                | TableError::InvalidBlinds { .. } => StatusCode::BAD_REQUEST,
                TableError::PlayerNotSeated(_) => StatusCode::NOT_FOUND,
                TableError::NoHandInProgress
                | TableError::HandInProgress
                | TableError::ShowdownPending
                | TableError::ShowdownNotReady(_)
                | TableError::PlayerAlreadyFolded
                | TableError::PlayerAllIn
                | TableError::NotPlayersTurn { .. }
                | TableError::AlreadySeated(_)
                | TableError::TableFull(_) => StatusCode::CONFLICT,
                TableError::ChipConservation { .. } | TableError::Deck(_) | TableError::Eval(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServiceError::Opponent(_) | ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Store(e) => match e {
                StoreError::NotFound { .. } => "not_found",
                StoreError::AlreadyExists { .. } => "already_exists",
                StoreError::VersionConflict { .. } => "version_conflict",
                _ => "store_error",
            },
            ServiceError::Round(e) => match e {
                RoundError::InvalidIndex { .. } => "invalid_index",
                RoundError::NoPeeksRemaining => "no_peeks_remaining",
                RoundError::NoRerollsRemaining => "no_rerolls_remaining",
                RoundError::AlreadyResolved => "already_resolved",
                RoundError::EncounterFinished => "encounter_finished",
                RoundError::AlreadyDealt
                | RoundError::InProgress(_)
                | RoundError::NotHolding(_)
                | RoundError::DeadlineNotReached => "invalid_phase",
                RoundError::InvalidOpponentHand(_) | RoundError::Opponent(_) => "opponent_failure",
                RoundError::Deck(_) | RoundError::Eval(_) => "engine_error",
            },
            ServiceError::Table(e) => match e {
                TableError::NotPlayersTurn { .. } => "not_your_turn",
                TableError::InvalidBetAmount { .. }
                | TableError::InsufficientChips { .. }
                | TableError::BetPending { .. }
                | TableError::NothingToCall
                | TableError::NothingToRaise
                | TableError::PlayerAlreadyFolded
                | TableError::PlayerAllIn => "invalid_action",
                TableError::NoHandInProgress
                | TableError::HandInProgress
                | TableError::ShowdownPending
                | TableError::ShowdownNotReady(_) => "invalid_phase",
                TableError::PlayerNotSeated(_) => "player_not_seated",
                TableError::AlreadySeated(_) | TableError::TableFull(_) => "seat_unavailable",
                TableError::NotEnoughPlayers(_) | TableError::InvalidBlinds { .. } => {
                    "invalid_request"
                }
                TableError::ChipLimit { .. } => "chip_limit",
                TableError::ChipConservation { .. } => "chip_conservation",
                TableError::Deck(_) | TableError::Eval(_) => "engine_error",
            },
            ServiceError::Opponent(_) => "unknown_opponent",
            ServiceError::InvalidRequest(_) => "invalid_request",
            ServiceError::Worker(_) => "internal_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::Store(StoreError::VersionConflict { expected, .. }) => {
                Some(serde_json::json!({ "expected_version": expected }))
            }
            ServiceError::Table(TableError::BetPending { to_call }) => {
                Some(serde_json::json!({ "to_call": to_call }))
            }
            ServiceError::Table(TableError::NotPlayersTurn { expected, .. }) => {
                Some(serde_json::json!({ "to_act": expected }))
            }
            _ => None,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            ServiceError::Table(TableError::ChipConservation { .. }) => ErrorSeverity::Critical,
            _ if self.status_code().is_server_error() => ErrorSeverity::Server,
            _ => ErrorSeverity::Client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_are_omitted_when_absent() {
        let err: ServiceError = RoundError::NoPeeksRemaining.into();
        let body = serde_json::to_value(err.to_error_response()).unwrap();
        assert_eq!(body["error"], "no_peeks_remaining");
        assert!(body.get("details").is_none());
        assert_eq!(
            err.to_error_response().to_string(),
            format!("no_peeks_remaining: {}", err)
        );
    }

    #[test]
    fn service_errors_map_to_statuses() {
        let cases: Vec<(ServiceError, StatusCode, &str)> = vec![
            (
                RoundError::AlreadyResolved.into(),
                StatusCode::CONFLICT,
                "already_resolved",
            ),
            (
                RoundError::InvalidIndex {
                    index: 7,
                    hand_size: 5,
                }
                .into(),
                StatusCode::BAD_REQUEST,
                "invalid_index",
            ),
            (
                TableError::NotPlayersTurn {
                    expected: "a".into(),
                    actual: "b".into(),
                }
                .into(),
                StatusCode::CONFLICT,
                "not_your_turn",
            ),
            (
                TableError::BetPending { to_call: 4 }.into(),
                StatusCode::BAD_REQUEST,
                "invalid_action",
            ),
            (
                StoreError::VersionConflict {
                    kind: "table",
                    id: "t".into(),
                    expected: 3,
                }
                .into(),
                StatusCode::CONFLICT,
                "version_conflict",
            ),
            (
                StoreError::NotFound {
                    kind: "encounter",
                    id: "e".into(),
                }
                .into(),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                StoreError::Poisoned.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
            ),
            (
                ServiceError::Worker("task panicked".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
            (
                TableError::ChipLimit {
                    total: 6_000_000_000,
                    limit: u32::MAX,
                }
                .into(),
                StatusCode::BAD_REQUEST,
                "chip_limit",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status, "{err}");
            assert_eq!(err.error_code(), code, "{err}");
        }
    }

    #[test]
    fn details_and_severity() {
        let conflict: ServiceError = StoreError::VersionConflict {
            kind: "encounter",
            id: "e".into(),
            expected: 2,
        }
        .into();
        let body = conflict.to_error_response();
        assert_eq!(body.details.unwrap()["expected_version"], 2);

        let leak: ServiceError = TableError::ChipConservation {
            expected: 10,
            found: 9,
        }
        .into();
        assert_eq!(leak.severity(), ErrorSeverity::Critical);
        let bad: ServiceError = TableError::NothingToCall.into();
        assert_eq!(bad.severity(), ErrorSeverity::Client);
    }
}
