//! Participant identities and ordered participant sets.

use core::fmt;
use core::num::NonZeroU16;
use core::str::FromStr;
use std::collections::BTreeSet;

use curve25519_dalek::scalar::Scalar;

use crate::Error;

/// The identifier of a protocol participant.
///
/// Identifiers are small nonzero integers. Zero is reserved: it would map to
/// the evaluation point of the shared secret itself, `f(0)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(NonZeroU16);

impl ParticipantId {
    /// Byte length of the wire encoding.
    pub const LENGTH: usize = 2;

    /// Creates an identifier from a nonzero integer.
    pub fn new(id: u16) -> Result<Self, Error> {
        NonZeroU16::new(id)
            .map(Self)
            .ok_or(Error::ZeroParticipantId)
    }

    /// The scalar `i` at which this participant's Shamir share `f(i)` is
    /// evaluated.
    ///
    /// Small integers embed canonically into the field, so the 32-byte
    /// little-endian form of this scalar is just the zero-padded identifier.
    pub fn to_scalar(self) -> Scalar {
        Scalar::from(u64::from(self.0.get()))
    }

    /// Big-endian wire encoding.
    pub fn to_bytes(self) -> [u8; Self::LENGTH] {
        self.0.get().to_be_bytes()
    }

    /// Reads an identifier from its wire encoding.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Result<Self, Error> {
        Self::new(u16::from_be_bytes(bytes))
    }

    /// The widened 4-byte big-endian form hashed into the signing transcript.
    pub(crate) fn to_transcript_bytes(self) -> [u8; 4] {
        u32::from(self.0.get()).to_be_bytes()
    }
}

impl TryFrom<u16> for ParticipantId {
    type Error = Error;

    fn try_from(id: u16) -> Result<Self, Error> {
        Self::new(id)
    }
}

impl From<ParticipantId> for u16 {
    fn from(id: ParticipantId) -> u16 {
        id.0.get()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let id = s.parse::<u16>().map_err(|_| Error::Malformed)?;
        Self::new(id)
    }
}

/// An ordered, duplicate-free set of participants.
///
/// Iteration is always in ascending identifier order. Every participant of a
/// protocol run must iterate the set in the same order when hashing
/// transcripts, or the parties compute different binding values and the run
/// aborts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantSet {
    ids: BTreeSet<ParticipantId>,
}

impl ParticipantSet {
    /// Builds a set from the given identifiers.
    ///
    /// Fails on duplicate identifiers and on sets with fewer than two
    /// members.
    pub fn new(ids: impl IntoIterator<Item = ParticipantId>) -> Result<Self, Error> {
        let mut set = BTreeSet::new();
        for id in ids {
            if !set.insert(id) {
                return Err(Error::DuplicateParticipant { id });
            }
        }
        if set.len() < 2 {
            return Err(Error::InvalidParticipants);
        }
        Ok(Self { ids: set })
    }

    /// Whether `id` is a member of this set.
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of participants.
    ///
    /// Distinct 16-bit identifiers bound this by `u16::MAX`.
    pub fn len(&self) -> u16 {
        self.ids.len() as u16
    }

    /// Whether the set is empty. Construction guarantees it never is.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates over the members in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.ids.iter().copied()
    }

    /// The members other than `id`.
    pub(crate) fn others(&self, id: ParticipantId) -> BTreeSet<ParticipantId> {
        self.ids.iter().copied().filter(|&other| other != id).collect()
    }
}

/// Computes the Lagrange coefficient of `id` over `signers`, evaluated at
/// zero, so that `Σ λ_i · f(i)` over the signers recovers `f(0)`.
pub(crate) fn lagrange_coefficient(
    signers: &ParticipantSet,
    id: ParticipantId,
) -> Result<Scalar, Error> {
    if !signers.contains(id) {
        return Err(Error::UnknownParticipant { id });
    }
    let mut num = Scalar::ONE;
    let mut den = Scalar::ONE;
    for other in signers.iter() {
        if other == id {
            continue;
        }
        num *= other.to_scalar();
        den *= other.to_scalar() - id.to_scalar();
    }
    // den is a product of differences of distinct identifiers, never zero.
    Ok(num * den.invert())
}
