//! 错误类型
//!
//! - [`NormalizationError`]：无法识别的单元格，可恢复（收集而非抛出）
//! - [`RemoteError`]：远端调用失败，按 [`RemoteError::is_retryable`] 分为瞬时 / 永久
//! - [`RetryError`]：重试处理器的最终结果（永久错误原样透传，或重试耗尽）
//! - [`RunError`]：编排器一次运行的终止原因

use std::fmt;

use thiserror::Error;

use crate::astral::{Entity, Position};
use crate::core::report::{Action, OperationLog};

/// 无法归一化的单元格：携带原始内容与位置
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid object type '{token}' at {position}")]
pub struct NormalizationError {
    pub token: String,
    pub position: Position,
}

impl NormalizationError {
    pub fn new(token: impl Into<String>, position: Position) -> Self {
        Self {
            token: token.into(),
            position,
        }
    }
}

/// 网络层失败的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectionReset,
    Dns,
    Timeout,
    ConnectionRefused,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkErrorKind::ConnectionReset => "connection reset",
            NetworkErrorKind::Dns => "dns failure",
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::ConnectionRefused => "connection refused",
            NetworkErrorKind::Other => "network",
        };
        f.write_str(s)
    }
}

/// 远端状态码中可重试的集合
pub const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// 远端操作失败（与传输实现无关，只暴露重试分类所需的信号）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("{kind} error: {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        RemoteError::Network {
            kind,
            message: message.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        RemoteError::Status {
            status,
            body: body.into(),
        }
    }

    /// 瞬时错误：已识别的网络故障，或状态码 429 / 5xx 网关类
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network { kind, .. } => !matches!(kind, NetworkErrorKind::Other),
            RemoteError::Status { status, .. } => RETRYABLE_STATUS.contains(status),
            RemoteError::Decode(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 远端明确拒绝（4xx 且非 429），clear-all 据此判断「不是这个种类」
    pub fn is_rejection(&self) -> bool {
        matches!(self.status_code(), Some(s) if (400..500).contains(&s) && s != 429)
    }
}

/// 重试处理器的失败结果
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// 不可重试的错误，原样透传
    #[error(transparent)]
    Permanent(RemoteError),

    /// 所有尝试用尽
    #[error("{label} failed after {attempts} attempts: {last}")]
    Exhausted {
        label: String,
        attempts: u32,
        last: RemoteError,
    },
}

impl RetryError {
    /// 最后一次底层错误
    pub fn remote(&self) -> &RemoteError {
        match self {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// X 形图案参数错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Grid size {size} is too small for an X pattern (minimum {min})")]
    SizeTooSmall { size: usize, min: usize },
}

/// 编排器运行失败
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: RetryError,
    },

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    /// 实盘执行在某个实体上失败后立即停止
    #[error("{action} {entity} failed after {succeeded} successful operations: {source}")]
    Halted {
        entity: Entity,
        action: Action,
        succeeded: usize,
        log: OperationLog,
        /// 停止前已跳过的无法识别单元格
        invalid: Vec<NormalizationError>,
        #[source]
        source: RetryError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        for status in RETRYABLE_STATUS {
            assert!(RemoteError::status(status, "").is_retryable());
        }
        for status in [400, 401, 403, 404, 422, 501] {
            assert!(!RemoteError::status(status, "").is_retryable());
        }
        for kind in [
            NetworkErrorKind::ConnectionReset,
            NetworkErrorKind::Dns,
            NetworkErrorKind::Timeout,
            NetworkErrorKind::ConnectionRefused,
        ] {
            assert!(RemoteError::network(kind, "x").is_retryable());
        }
        assert!(!RemoteError::network(NetworkErrorKind::Other, "x").is_retryable());
        assert!(!RemoteError::Decode("bad json".into()).is_retryable());
    }

    #[test]
    fn test_rejection() {
        assert!(RemoteError::status(404, "not found").is_rejection());
        assert!(RemoteError::status(400, "").is_rejection());
        assert!(!RemoteError::status(429, "").is_rejection());
        assert!(!RemoteError::status(500, "").is_rejection());
        assert!(!RemoteError::network(NetworkErrorKind::Timeout, "").is_rejection());
    }

    #[test]
    fn test_exhausted_message() {
        let err = RetryError::Exhausted {
            label: "Create POLYanet at (2, 3)".into(),
            attempts: 4,
            last: RemoteError::status(503, "unavailable"),
        };
        assert_eq!(
            err.to_string(),
            "Create POLYanet at (2, 3) failed after 4 attempts: HTTP 503: unavailable"
        );
    }
}
