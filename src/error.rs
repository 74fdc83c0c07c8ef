//! Session error types.

use thiserror::Error;

use crate::participant::ParticipantId;

/// An error produced by a key-generation or signing session.
///
/// Errors that are attributable to a specific peer carry a `culprit` field
/// and abort the session that detected them; all other errors are reported to
/// the caller without changing session state.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// A wire message could not be decoded.
    #[error("malformed message encoding")]
    Malformed,
    /// A scalar or point encoding was not canonical.
    #[error("non-canonical scalar or point encoding")]
    InvalidEncoding,
    /// The sender is not a participant of this session.
    #[error("unknown sender {sender}")]
    UnknownSender {
        /// The identifier claimed by the message.
        sender: ParticipantId,
    },
    /// A second message arrived from the same peer in the same round.
    #[error("duplicate message from {sender}")]
    Duplicate {
        /// The peer that sent the duplicate.
        sender: ParticipantId,
    },
    /// The message type is not accepted in the current or any later round.
    #[error("unexpected message type for this round")]
    WrongType,
    /// The message was addressed to a different participant.
    #[error("message addressed to another recipient")]
    WrongRecipient,
    /// A Schnorr proof of knowledge sent during key generation is invalid.
    #[error("invalid proof of knowledge")]
    InvalidProof {
        /// The peer whose proof failed to verify.
        culprit: ParticipantId,
    },
    /// A commitment polynomial does not have threshold + 1 coefficients.
    #[error("wrong number of commitment coefficients")]
    InvalidCommitment {
        /// The peer that sent the commitment.
        culprit: ParticipantId,
    },
    /// A secret share failed the verifiable-secret-sharing check.
    #[error("invalid secret share")]
    InvalidShare {
        /// The peer whose share failed to verify.
        culprit: ParticipantId,
    },
    /// A signature share failed its verification equation.
    #[error("invalid signature share")]
    InvalidResponse {
        /// The peer whose signature share failed to verify.
        culprit: ParticipantId,
    },
    /// Signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// The session was canceled by the caller.
    #[error("session canceled")]
    Canceled,
    /// The current round was already processed.
    #[error("round already processed")]
    RoundProcessed,
    /// The current round has not been processed yet.
    #[error("round not yet processed")]
    RoundNotProcessed,
    /// Participant identifiers must be nonzero.
    #[error("participant identifier must be nonzero")]
    ZeroParticipantId,
    /// The same participant appears twice in a set.
    #[error("duplicate participant {id}")]
    DuplicateParticipant {
        /// The repeated identifier.
        id: ParticipantId,
    },
    /// A participant set needs at least two distinct members.
    #[error("not enough participants")]
    InvalidParticipants,
    /// A participant is missing from a set or key package that must contain it.
    #[error("participant {id} is not part of this group")]
    UnknownParticipant {
        /// The missing identifier.
        id: ParticipantId,
    },
    /// The threshold does not fit the participant set.
    #[error("threshold must be at least 1, with at least threshold + 1 participants")]
    InvalidThreshold,
    /// The secret share belongs to a different participant.
    #[error("secret share owned by a different participant")]
    WrongSecretShare,
    /// A fault detected after the session had already aborted, appended to
    /// the fault recorded first.
    #[error("{first}, then {follow_up}")]
    Chained {
        /// The fault that aborted the session; its culprit stays
        /// authoritative.
        first: Box<Error>,
        /// A fault detected afterwards.
        #[source]
        follow_up: Box<Error>,
    },
}

impl Error {
    /// Appends a fault detected after this one. The culprit of `self` stays
    /// the one reported by [`Error::culprit`].
    pub(crate) fn chain(self, follow_up: Error) -> Error {
        Error::Chained {
            first: Box::new(self),
            follow_up: Box::new(follow_up),
        }
    }

    /// Returns the participant that caused the error, for errors that are
    /// attributable to a specific peer.
    ///
    /// This can be used to exclude the misbehaving participant from future
    /// sessions.
    pub fn culprit(&self) -> Option<ParticipantId> {
        // Exhaustive so that new variants force a decision here.
        match self {
            Error::InvalidProof { culprit }
            | Error::InvalidCommitment { culprit }
            | Error::InvalidShare { culprit }
            | Error::InvalidResponse { culprit } => Some(*culprit),
            Error::Chained { first, .. } => first.culprit(),
            Error::Malformed
            | Error::InvalidEncoding
            | Error::UnknownSender { .. }
            | Error::Duplicate { .. }
            | Error::WrongType
            | Error::WrongRecipient
            | Error::InvalidSignature
            | Error::Canceled
            | Error::RoundProcessed
            | Error::RoundNotProcessed
            | Error::ZeroParticipantId
            | Error::DuplicateParticipant { .. }
            | Error::InvalidParticipants
            | Error::UnknownParticipant { .. }
            | Error::InvalidThreshold
            | Error::WrongSecretShare => None,
        }
    }
}
