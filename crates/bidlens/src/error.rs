use thiserror::Error;

pub type Result<T, E = BidlensError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WriteNotAllowed,
    DatasetNotAllowed,
    UnknownDimension,
    StoreUnavailable,
    QueryFailed,
    InsightGeneratorFailure,
    StagePreconditionUnmet,
}

impl ErrorKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::WriteNotAllowed => "write_not_allowed",
            Self::DatasetNotAllowed => "dataset_not_allowed",
            Self::UnknownDimension => "unknown_dimension",
            Self::StoreUnavailable => "store_unavailable",
            Self::QueryFailed => "query_failed",
            Self::InsightGeneratorFailure => "insight_generator_failure",
            Self::StagePreconditionUnmet => "stage_precondition_unmet",
        }
    }

    /// Caller or programming errors. These are surfaced immediately and never retried.
    #[must_use]
    pub const fn is_validation(self) -> bool {
        matches!(
            self,
            Self::WriteNotAllowed | Self::DatasetNotAllowed | Self::UnknownDimension
        )
    }

    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::StoreUnavailable | Self::InsightGeneratorFailure)
    }
}

/// The allowlist and keyword checks behind `WriteNotAllowed` and `DatasetNotAllowed` are
/// token matches over the query text, not a SQL parse. They filter honest mistakes; the
/// read-only store connection is what actually prevents writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidlensError {
    #[error("only read statements are allowed (leading keyword `{leading_keyword}`): {reason}")]
    WriteNotAllowed {
        leading_keyword: String,
        reason: String,
    },

    #[error("dataset not allowed: {detail}")]
    DatasetNotAllowed { detail: String },

    #[error("unknown dimension `{name}` (known: {known})")]
    UnknownDimension { name: String, known: String },

    #[error("warehouse unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("query failed: {message}")]
    QueryFailed { message: String },

    #[error("insight generator failed: {message}")]
    InsightGeneratorFailure { message: String },

    #[error("stage `{stage}` requires `{missing}` to run first")]
    StagePreconditionUnmet { stage: String, missing: String },
}

impl BidlensError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::WriteNotAllowed { .. } => ErrorKind::WriteNotAllowed,
            Self::DatasetNotAllowed { .. } => ErrorKind::DatasetNotAllowed,
            Self::UnknownDimension { .. } => ErrorKind::UnknownDimension,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::QueryFailed { .. } => ErrorKind::QueryFailed,
            Self::InsightGeneratorFailure { .. } => ErrorKind::InsightGeneratorFailure,
            Self::StagePreconditionUnmet { .. } => ErrorKind::StagePreconditionUnmet,
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }

    pub fn insight_failure(message: impl Into<String>) -> Self {
        Self::InsightGeneratorFailure {
            message: message.into(),
        }
    }
}
