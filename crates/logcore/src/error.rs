//! Core error taxonomy (§7): a `Copy` `thiserror`-derived enum plus a
//! couple of small classification helpers.

use thiserror::Error;

/// The §7 error taxonomy. Each variant's discriminant (see
/// [`LogCoreError::code`]) is the negative integer code assigned to it,
/// used for `SelfLog` diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LogCoreError {
    #[error("decoration header malformed")]
    CorruptedDecorationInfo,

    #[error("could not increment payload lock count")]
    FailedToLockPayloadBuffer,

    #[error("timestamp/level header read failed")]
    UnableToRetrieveTimestampAndLevel,

    #[error("stack trace id not resolvable")]
    UnableToRetrieveStackTrace,

    #[error("decorator list truncated")]
    UnableToRetrieveDecoratorsInfo,

    #[error("template payload missing")]
    UnableToRetrieveSimpleMessageBuffer,

    #[error("disjointed head payload missing")]
    UnableToRetrieveDisjointedMessageBuffer,

    #[error("one or more disjointed children stale")]
    UnableToRetrieveValidPayloadsFromDisjointedMessageBuffer,

    #[error("context argument resolution failed")]
    UnableToRetrieveContextArgument,

    #[error("template references an argument index that does not exist")]
    UnableToRetrieveValidContextArgumentIndex,

    #[error("Unknown Type for OutputHandlers. TypeId: {0}")]
    UnknownTypeId(u64),

    #[error("disjointed head allocation failed")]
    FailedToCreateDisjointedBuffer,

    #[error("message template parsing failed")]
    FailedToParseMessage,

    #[error("requested payload size is out of bounds")]
    FailedToAllocatePayloadBecauseOfItsSize,
}

impl LogCoreError {
    /// The negative integer code assigned to this variant.
    pub fn code(&self) -> i32 {
        match self {
            Self::CorruptedDecorationInfo => -1,
            Self::FailedToLockPayloadBuffer => -2,
            Self::UnableToRetrieveTimestampAndLevel => -3,
            Self::UnableToRetrieveStackTrace => -4,
            Self::UnableToRetrieveDecoratorsInfo => -5,
            Self::UnableToRetrieveSimpleMessageBuffer => -6,
            Self::UnableToRetrieveDisjointedMessageBuffer => -7,
            Self::UnableToRetrieveValidPayloadsFromDisjointedMessageBuffer => -8,
            Self::UnableToRetrieveContextArgument => -9,
            Self::UnableToRetrieveValidContextArgumentIndex => -10,
            Self::UnknownTypeId(_) => -11,
            Self::FailedToCreateDisjointedBuffer => -12,
            Self::FailedToParseMessage => -13,
            Self::FailedToAllocatePayloadBecauseOfItsSize => -14,
        }
    }

    /// Data-integrity failures indicate a corrupted or stale payload rather
    /// than a transient resource shortage.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            Self::CorruptedDecorationInfo
                | Self::UnableToRetrieveTimestampAndLevel
                | Self::UnableToRetrieveStackTrace
                | Self::UnableToRetrieveDecoratorsInfo
                | Self::UnableToRetrieveSimpleMessageBuffer
                | Self::UnableToRetrieveDisjointedMessageBuffer
                | Self::UnableToRetrieveValidPayloadsFromDisjointedMessageBuffer
                | Self::UnableToRetrieveContextArgument
        )
    }
}

/// Outcome of [`crate::MemoryManager::release_payload_buffer`] (§4.2).
///
/// A closed enum rather than `Result<(), LogCoreError>` because `Success`
/// and `ForcedRelease` are both non-error outcomes the caller must
/// distinguish (a forced release of a still-referenced disjointed payload
/// is not a failure, but is worth knowing about).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Success,
    ForcedRelease,
    BufferLocked,
    InvalidHandle,
    DisjointedPayloadReleaseFailed,
}
