//! Long-lived key material produced by key generation.

use core::fmt;
use std::collections::BTreeMap;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use derive_getters::Getters;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::curve::{self, POINT_LENGTH, SCALAR_LENGTH};
use crate::participant::ParticipantId;
use crate::signature::Signature;
use crate::Error;

/// The group public key `Y = [s]B`.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    element: EdwardsPoint,
}

impl VerifyingKey {
    pub(crate) fn new(element: EdwardsPoint) -> Self {
        Self { element }
    }

    pub(crate) fn to_element(self) -> EdwardsPoint {
        self.element
    }

    /// The compressed 32-byte encoding, identical to an Ed25519 public key.
    pub fn to_bytes(&self) -> [u8; POINT_LENGTH] {
        curve::serialize_point(&self.element)
    }

    /// Decodes a verifying key, rejecting non-canonical and small-order
    /// encodings.
    pub fn from_bytes(bytes: &[u8; POINT_LENGTH]) -> Result<Self, Error> {
        Ok(Self::new(curve::deserialize_point(bytes)?))
    }

    /// Verifies an Ed25519 signature over `msg`.
    ///
    /// Uses the cofactorless equation `[z]B == R + [c]Y`, the check performed
    /// by stock Ed25519 verifiers.
    pub fn verify(&self, msg: &[u8], signature: &Signature) -> Result<(), Error> {
        let challenge = curve::challenge(&signature.R, &self.element, msg);
        let check =
            EdwardsPoint::mul_base(&signature.z) - self.element * challenge - signature.R;
        if check == EdwardsPoint::identity() {
            Ok(())
        } else {
            Err(Error::InvalidSignature)
        }
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerifyingKey")
            .field(&hex::encode(self.to_bytes()))
            .finish()
    }
}

/// A single participant's public verification share `Y_i = [s_i]B`.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct VerifyingShare(EdwardsPoint);

impl VerifyingShare {
    pub(crate) fn new(element: EdwardsPoint) -> Self {
        Self(element)
    }

    pub(crate) fn to_element(self) -> EdwardsPoint {
        self.0
    }

    /// The compressed 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; POINT_LENGTH] {
        curve::serialize_point(&self.0)
    }

    /// Decodes a verification share, rejecting non-canonical and small-order
    /// encodings.
    pub fn from_bytes(bytes: &[u8; POINT_LENGTH]) -> Result<Self, Error> {
        Ok(Self(curve::deserialize_point(bytes)?))
    }
}

impl fmt::Debug for VerifyingShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerifyingShare")
            .field(&hex::encode(self.to_bytes()))
            .finish()
    }
}

/// Public output of key generation: the group key, every participant's
/// verification share, and the threshold.
///
/// Every participant of a run ends up with the same package; it is all a
/// coordinator or verifier needs to check signature shares and signatures.
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
pub struct PublicKeyPackage {
    /// The verification share of every participant.
    verifying_shares: BTreeMap<ParticipantId, VerifyingShare>,
    /// The group public key.
    verifying_key: VerifyingKey,
    /// Maximum number of colluding participants the secret stays safe
    /// against; signing needs `threshold + 1` signers.
    threshold: u16,
}

impl PublicKeyPackage {
    pub(crate) fn new(
        verifying_shares: BTreeMap<ParticipantId, VerifyingShare>,
        verifying_key: VerifyingKey,
        threshold: u16,
    ) -> Self {
        Self {
            verifying_shares,
            verifying_key,
            threshold,
        }
    }

    /// Encodes the package as `t ‖ n ‖ Y ‖ n × (id ‖ Y_i)` with big-endian
    /// integers and the share table in ascending identifier order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            2 + 2
                + POINT_LENGTH
                + self.verifying_shares.len() * (ParticipantId::LENGTH + POINT_LENGTH),
        );
        bytes.extend_from_slice(&self.threshold.to_be_bytes());
        bytes.extend_from_slice(&(self.verifying_shares.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&self.verifying_key.to_bytes());
        for (id, share) in &self.verifying_shares {
            bytes.extend_from_slice(&id.to_bytes());
            bytes.extend_from_slice(&share.to_bytes());
        }
        bytes
    }

    /// Decodes a package produced by [`PublicKeyPackage::serialize`].
    ///
    /// The share table must be in strictly ascending identifier order, as
    /// [`PublicKeyPackage::serialize`] writes it.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 4 + POINT_LENGTH {
            return Err(Error::Malformed);
        }
        let threshold = u16::from_be_bytes([bytes[0], bytes[1]]);
        let count = usize::from(u16::from_be_bytes([bytes[2], bytes[3]]));
        if bytes.len() != 4 + POINT_LENGTH + count * (ParticipantId::LENGTH + POINT_LENGTH) {
            return Err(Error::Malformed);
        }
        if count < 2 {
            return Err(Error::InvalidParticipants);
        }
        if threshold == 0 || usize::from(threshold) + 1 > count {
            return Err(Error::InvalidThreshold);
        }

        let mut key = [0u8; POINT_LENGTH];
        key.copy_from_slice(&bytes[4..4 + POINT_LENGTH]);
        let verifying_key = VerifyingKey::from_bytes(&key)?;

        let mut verifying_shares = BTreeMap::new();
        let mut last_id: Option<ParticipantId> = None;
        let mut rest = &bytes[4 + POINT_LENGTH..];
        for _ in 0..count {
            let id = ParticipantId::from_bytes([rest[0], rest[1]])
                .map_err(|_| Error::Malformed)?;
            if let Some(previous) = last_id {
                if id == previous {
                    return Err(Error::DuplicateParticipant { id });
                }
                if id < previous {
                    return Err(Error::Malformed);
                }
            }
            let mut share = [0u8; POINT_LENGTH];
            share.copy_from_slice(&rest[2..2 + POINT_LENGTH]);
            verifying_shares.insert(id, VerifyingShare::from_bytes(&share)?);
            last_id = Some(id);
            rest = &rest[ParticipantId::LENGTH + POINT_LENGTH..];
        }

        Ok(Self {
            verifying_shares,
            verifying_key,
            threshold,
        })
    }
}

/// This participant's Shamir share of the group signing key.
///
/// The scalar is wiped when the value is dropped. It is never sent over the
/// wire; [`SecretShare::serialize`] exists only for local persistence.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretShare {
    #[zeroize(skip)]
    identifier: ParticipantId,
    value: Scalar,
}

impl SecretShare {
    pub(crate) fn new(identifier: ParticipantId, value: Scalar) -> Self {
        Self { identifier, value }
    }

    /// The participant this share belongs to.
    pub fn identifier(&self) -> ParticipantId {
        self.identifier
    }

    pub(crate) fn to_scalar(&self) -> Scalar {
        self.value
    }

    /// Encodes the share as `id ‖ s` for local persistence.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ParticipantId::LENGTH + SCALAR_LENGTH);
        bytes.extend_from_slice(&self.identifier.to_bytes());
        bytes.extend_from_slice(&curve::serialize_scalar(&self.value));
        bytes
    }

    /// Decodes a share produced by [`SecretShare::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != ParticipantId::LENGTH + SCALAR_LENGTH {
            return Err(Error::Malformed);
        }
        let identifier =
            ParticipantId::from_bytes([bytes[0], bytes[1]]).map_err(|_| Error::Malformed)?;
        let mut scalar = [0u8; SCALAR_LENGTH];
        scalar.copy_from_slice(&bytes[2..]);
        Ok(Self {
            identifier,
            value: curve::deserialize_scalar(&scalar)?,
        })
    }
}

impl fmt::Debug for SecretShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretShare")
            .field("identifier", &self.identifier)
            .field("value", &"<redacted>")
            .finish()
    }
}
