//! # Platform-wide result and error types.
//!
//! Every fallible operation in the host returns [`SysResult`], a
//! `Result` whose error is [`SystemError`]: a stable [`ResultCode`] plus an
//! optional human-readable message. The code set is closed and integer-valued
//! so it can cross the subsystem ABI unchanged; the message never crosses the
//! ABI (the boundary speaks `int`).
//!
//! ## Rules
//! - `DuplicateIgnored` counts as **success** by policy.
//! - No unwinding crosses the subsystem ABI; vtable calls return raw ints
//!   that are converted through [`SystemError::from_abi`].
//! - Workers and task units catch panics from user callables and convert
//!   them to `Fail` results.

use std::fmt;

use thiserror::Error;

use crate::composition::abi::{
    SUBSYS_ERR, SUBSYS_ERR_INCOMPATIBLE_ABI, SUBSYS_ERR_INVALID_ARG, SUBSYS_OK,
};

/// Stable result codes shared across the platform and the subsystem ABI.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    Ok = 0,
    Fail = 1,
    Cancelled = 2,

    // input & state
    InvalidArgument = 100,
    AlreadyExists = 101,
    DuplicateIgnored = 102,
    NotFound = 103,
    OutOfRange = 104,

    // system & resource
    PermissionDenied = 200,
    Timeout = 201,
    OutOfMemory = 202,
    ResourceBusy = 203,
    InvalidState = 204,
    RateLimit = 205,

    // internal
    InternalError = 300,
    NotSupported = 301,
    SocketError = 302,

    // network
    NetworkError = 400,
    ConnectionFail = 402,
    ConnectionLost = 403,
    ProtocolError = 404,
}

impl ResultCode {
    /// Whether this code counts as success. `DuplicateIgnored` does.
    pub const fn is_success(self) -> bool {
        matches!(self, ResultCode::Ok | ResultCode::DuplicateIgnored)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub const fn as_label(self) -> &'static str {
        match self {
            ResultCode::Ok => "ok",
            ResultCode::Fail => "fail",
            ResultCode::Cancelled => "cancelled",
            ResultCode::InvalidArgument => "invalid_argument",
            ResultCode::AlreadyExists => "already_exists",
            ResultCode::DuplicateIgnored => "duplicate_ignored",
            ResultCode::NotFound => "not_found",
            ResultCode::OutOfRange => "out_of_range",
            ResultCode::PermissionDenied => "permission_denied",
            ResultCode::Timeout => "timeout",
            ResultCode::OutOfMemory => "out_of_memory",
            ResultCode::ResourceBusy => "resource_busy",
            ResultCode::InvalidState => "invalid_state",
            ResultCode::RateLimit => "rate_limit",
            ResultCode::InternalError => "internal_error",
            ResultCode::NotSupported => "not_supported",
            ResultCode::SocketError => "socket_error",
            ResultCode::NetworkError => "network_error",
            ResultCode::ConnectionFail => "connection_fail",
            ResultCode::ConnectionLost => "connection_lost",
            ResultCode::ProtocolError => "protocol_error",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Error value carried by every fallible platform operation.
///
/// A code from the closed [`ResultCode`] set plus an optional message for
/// in-process boundaries. Only the code survives the subsystem ABI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemError {
    code: ResultCode,
    message: Option<String>,
}

/// Platform-wide result alias.
pub type SysResult<T> = Result<T, SystemError>;

impl SystemError {
    /// Creates an error with a bare code.
    pub fn new(code: ResultCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    /// Creates an error with a code and message.
    pub fn with(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Generic failure (`ResultCode::Fail`).
    pub fn fail(message: impl Into<String>) -> Self {
        Self::with(ResultCode::Fail, message)
    }

    pub fn code(&self) -> ResultCode {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Short stable label of the underlying code.
    pub fn as_label(&self) -> &'static str {
        self.code.as_label()
    }

    /// Converts a raw subsystem ABI return into a result.
    ///
    /// Zero is success; the defined negative codes map to their platform
    /// counterparts; anything else is an internal error carrying the raw
    /// value in the message.
    pub fn from_abi(ret: libc::c_int) -> SysResult<()> {
        match ret {
            SUBSYS_OK => Ok(()),
            SUBSYS_ERR => Err(SystemError::new(ResultCode::Fail)),
            SUBSYS_ERR_INCOMPATIBLE_ABI => Err(SystemError::with(
                ResultCode::NotSupported,
                "incompatible subsystem abi",
            )),
            SUBSYS_ERR_INVALID_ARG => Err(SystemError::new(ResultCode::InvalidArgument)),
            other => Err(SystemError::with(
                ResultCode::InternalError,
                format!("subsystem returned {other}"),
            )),
        }
    }

    /// Collapses a result to the raw integer the ABI expects.
    pub fn to_abi(result: &SysResult<()>) -> libc::c_int {
        match result {
            Ok(()) => SUBSYS_OK,
            Err(e) => match e.code() {
                ResultCode::InvalidArgument => SUBSYS_ERR_INVALID_ARG,
                ResultCode::NotSupported => SUBSYS_ERR_INCOMPATIBLE_ABI,
                _ => SUBSYS_ERR,
            },
        }
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.code, msg),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for SystemError {}

/// Errors raised while reading a manifest file.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl From<ManifestError> for SystemError {
    fn from(e: ManifestError) -> Self {
        SystemError::with(ResultCode::InvalidArgument, e.to_string())
    }
}
