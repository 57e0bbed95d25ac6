// Copyright 2026 rancher-gitlab-deploy contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error and Result implementations.

use std::fmt;

use reqwest::StatusCode;

/// Kind of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Authentication failure
    ///
    /// Maps to HTTP 401.
    AuthenticationFailed,

    /// Access denied.
    ///
    /// Maps to HTTP 403.
    AccessDenied,

    /// Requested environment, stack or service was not found.
    ///
    /// Roughly maps to HTTP 404 and 410.
    ResourceNotFound,

    /// A secret referenced by name does not exist in the environment.
    SecretNotFound,

    /// Invalid value passed to one of parameters.
    ///
    /// May be result of HTTP 400.
    InvalidInput,

    /// The service is not in a state that allows the requested action.
    PreconditionFailed,

    /// Rancher refused an upgrade, finish, rollback or link action.
    ActionFailed,

    /// Operation has reached the specified time out.
    OperationTimedOut,

    /// Operation was cancelled before it could complete.
    OperationCancelled,

    /// Protocol-level error reported by underlying HTTP library.
    ProtocolError,

    /// Response received from the server is malformed.
    InvalidResponse,

    /// Internal server error.
    ///
    /// Maps to HTTP 5xx codes.
    InternalServerError,
}

/// Error from a Rancher call.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    status: Option<StatusCode>,
    message: Option<String>,
}

/// Result of a Rancher call.
pub type Result<T> = ::std::result::Result<T, Error>;

impl Error {
    /// Create a new error of the given kind.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Error {
        Error {
            kind,
            status: None,
            message: Some(message.into()),
        }
    }

    /// Create with providing all details.
    pub(crate) fn new_with_details(
        kind: ErrorKind,
        status: Option<StatusCode>,
        message: Option<String>,
    ) -> Error {
        Error {
            kind,
            status,
            message,
        }
    }

    /// Create an error from an HTTP status code.
    pub(crate) fn from_status<S: Into<String>>(status: StatusCode, message: S) -> Error {
        let kind = match status {
            StatusCode::UNAUTHORIZED => ErrorKind::AuthenticationFailed,
            StatusCode::FORBIDDEN => ErrorKind::AccessDenied,
            StatusCode::NOT_FOUND | StatusCode::GONE => ErrorKind::ResourceNotFound,
            c if c.is_client_error() => ErrorKind::InvalidInput,
            c if c.is_server_error() => ErrorKind::InternalServerError,
            _ => ErrorKind::InvalidResponse,
        };
        Error::new_with_details(kind, Some(status), Some(message.into()))
    }

    /// Error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status code (if the error came from an HTTP response).
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Error message (if any).
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Prepend a human-readable context to the message.
    pub fn with_context<D: fmt::Display>(mut self, context: D) -> Error {
        self.message = Some(match self.message {
            Some(msg) => format!("{}: {}", context, msg),
            None => context.to_string(),
        });
        self
    }

    /// Change the kind, keeping the status and the message.
    pub(crate) fn with_kind(mut self, kind: ErrorKind) -> Error {
        self.kind = kind;
        self
    }
}

impl ErrorKind {
    /// Short description of the error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationFailed => "Failed to authenticate",
            ErrorKind::AccessDenied => "Access to the resource is denied",
            ErrorKind::ResourceNotFound => "Requested resource was not found",
            ErrorKind::SecretNotFound => "Requested secret was not found",
            ErrorKind::InvalidInput => "Input value(s) are invalid or missing",
            ErrorKind::PreconditionFailed => "Service is not in a suitable state",
            ErrorKind::ActionFailed => "Requested action was refused",
            ErrorKind::OperationTimedOut => "Time out reached while waiting for the operation",
            ErrorKind::OperationCancelled => "Operation was cancelled",
            ErrorKind::ProtocolError => "Error when accessing the server",
            ErrorKind::InvalidResponse => "Received invalid response",
            ErrorKind::InternalServerError => "Internal server error or bad gateway",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.message {
            Some(ref msg) => write!(f, "{}", msg),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl ::std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Error {
        let msg = value.to_string();
        match value.status() {
            Some(status) => Error::from_status(status, msg),
            None if value.is_decode() => {
                Error::new_with_details(ErrorKind::InvalidResponse, None, Some(msg))
            }
            None => Error::new_with_details(ErrorKind::ProtocolError, None, Some(msg)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Error {
        Error::new(ErrorKind::InvalidResponse, value.to_string())
    }
}

#[cfg(test)]
mod test {
    use reqwest::StatusCode;

    use super::{Error, ErrorKind};

    #[test]
    fn test_from_status() {
        let cases = [
            (StatusCode::UNAUTHORIZED, ErrorKind::AuthenticationFailed),
            (StatusCode::FORBIDDEN, ErrorKind::AccessDenied),
            (StatusCode::NOT_FOUND, ErrorKind::ResourceNotFound),
            (StatusCode::UNPROCESSABLE_ENTITY, ErrorKind::InvalidInput),
            (StatusCode::BAD_GATEWAY, ErrorKind::InternalServerError),
        ];
        for (status, kind) in cases {
            let err = Error::from_status(status, "boom");
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn test_context() {
        let err = Error::new(ErrorKind::ProtocolError, "connection refused")
            .with_context("Unable to connect to Rancher at rancher:8080");
        assert_eq!(
            err.to_string(),
            "Unable to connect to Rancher at rancher:8080: connection refused"
        );
        assert_eq!(err.kind(), ErrorKind::ProtocolError);
    }

    #[test]
    fn test_display_without_message() {
        let err = Error::new_with_details(ErrorKind::OperationCancelled, None, None);
        assert_eq!(err.to_string(), "Operation was cancelled");
    }
}
