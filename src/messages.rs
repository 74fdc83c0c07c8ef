//! Wire messages exchanged between participants.
//!
//! Every message is a single type-tag byte followed by fixed-width fields;
//! all multi-byte integers are big-endian. Scalars and points are validated
//! by the canonical decoders on the way in, so the protocol machines never
//! see a non-canonical group element.

use core::fmt;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use zeroize::Zeroizing;

use crate::curve::{self, POINT_LENGTH, SCALAR_LENGTH};
use crate::participant::ParticipantId;
use crate::polynomial::VssCommitment;
use crate::signature::Signature;
use crate::Error;

/// Type tag of a wire message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Key generation round 1: commitment polynomial and proof of knowledge.
    KeyGen1 = 1,
    /// Key generation round 2: one secret share, addressed to its recipient.
    KeyGen2 = 2,
    /// Signing round 1: nonce commitment pair.
    Sign1 = 3,
    /// Signing round 2: signature share.
    Sign2 = 4,
}

impl MessageType {
    fn from_tag(tag: u8) -> Result<Self, Error> {
        match tag {
            1 => Ok(MessageType::KeyGen1),
            2 => Ok(MessageType::KeyGen2),
            3 => Ok(MessageType::Sign1),
            4 => Ok(MessageType::Sign2),
            _ => Err(Error::Malformed),
        }
    }
}

/// Payload of a wire message.
#[derive(Clone)]
pub(crate) enum Payload {
    /// Commitment to the sender's secret polynomial, with a Schnorr proof of
    /// knowledge of the constant term.
    KeyGen1 {
        commitment: VssCommitment,
        proof: Signature,
    },
    /// A Shamir share evaluated at the recipient's identifier. The scalar is
    /// wiped when the message is dropped.
    KeyGen2 {
        to: ParticipantId,
        share: Zeroizing<Scalar>,
    },
    /// Commitments to the sender's hiding and binding nonces.
    Sign1 {
        hiding: EdwardsPoint,
        binding: EdwardsPoint,
    },
    /// The sender's response scalar.
    Sign2 { share: Scalar },
}

/// A single protocol message.
///
/// Broadcast messages carry no recipient; key-generation round 2 shares are
/// addressed to exactly one peer and must be delivered over a confidential
/// channel.
#[derive(Clone)]
pub struct Message {
    pub(crate) from: ParticipantId,
    pub(crate) payload: Payload,
}

impl Message {
    pub(crate) fn key_gen1(
        from: ParticipantId,
        commitment: VssCommitment,
        proof: Signature,
    ) -> Self {
        Self {
            from,
            payload: Payload::KeyGen1 { commitment, proof },
        }
    }

    pub(crate) fn key_gen2(from: ParticipantId, to: ParticipantId, share: Scalar) -> Self {
        Self {
            from,
            payload: Payload::KeyGen2 {
                to,
                share: Zeroizing::new(share),
            },
        }
    }

    pub(crate) fn sign1(from: ParticipantId, hiding: EdwardsPoint, binding: EdwardsPoint) -> Self {
        Self {
            from,
            payload: Payload::Sign1 { hiding, binding },
        }
    }

    pub(crate) fn sign2(from: ParticipantId, share: Scalar) -> Self {
        Self {
            from,
            payload: Payload::Sign2 { share },
        }
    }

    /// The sender of this message.
    pub fn sender(&self) -> ParticipantId {
        self.from
    }

    /// The intended recipient, or `None` for broadcast messages.
    pub fn recipient(&self) -> Option<ParticipantId> {
        match &self.payload {
            Payload::KeyGen2 { to, .. } => Some(*to),
            _ => None,
        }
    }

    /// The type tag of this message.
    pub fn message_type(&self) -> MessageType {
        match &self.payload {
            Payload::KeyGen1 { .. } => MessageType::KeyGen1,
            Payload::KeyGen2 { .. } => MessageType::KeyGen2,
            Payload::Sign1 { .. } => MessageType::Sign1,
            Payload::Sign2 { .. } => MessageType::Sign2,
        }
    }

    pub(crate) fn into_payload(self) -> Payload {
        self.payload
    }

    /// Encodes the message into its wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.push(self.message_type() as u8);
        bytes.extend_from_slice(&self.from.to_bytes());
        match &self.payload {
            Payload::KeyGen1 { commitment, proof } => {
                bytes.extend_from_slice(&(commitment.len() as u16).to_be_bytes());
                for coefficient in commitment.coefficients() {
                    bytes.extend_from_slice(&curve::serialize_point(coefficient));
                }
                bytes.extend_from_slice(&proof.to_bytes());
            }
            Payload::KeyGen2 { to, share } => {
                bytes.extend_from_slice(&to.to_bytes());
                bytes.extend_from_slice(&curve::serialize_scalar(share));
            }
            Payload::Sign1 { hiding, binding } => {
                bytes.extend_from_slice(&curve::serialize_point(hiding));
                bytes.extend_from_slice(&curve::serialize_point(binding));
            }
            Payload::Sign2 { share } => {
                bytes.extend_from_slice(&curve::serialize_scalar(share));
            }
        }
        bytes
    }

    fn encoded_len(&self) -> usize {
        let payload = match &self.payload {
            Payload::KeyGen1 { commitment, .. } => {
                2 + commitment.len() * POINT_LENGTH + Signature::LENGTH
            }
            Payload::KeyGen2 { .. } => ParticipantId::LENGTH + SCALAR_LENGTH,
            Payload::Sign1 { .. } => 2 * POINT_LENGTH,
            Payload::Sign2 { .. } => SCALAR_LENGTH,
        };
        1 + ParticipantId::LENGTH + payload
    }

    /// Decodes a message from its wire form.
    ///
    /// Fails with [`Error::Malformed`] on structural problems (short or
    /// oversized input, unknown tag, zero identifiers) and with
    /// [`Error::InvalidEncoding`] when a scalar or point is not canonical.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (&tag, rest) = bytes.split_first().ok_or(Error::Malformed)?;
        let message_type = MessageType::from_tag(tag)?;
        let (from, rest) = read_id(rest)?;
        let payload = match message_type {
            MessageType::KeyGen1 => {
                let (count, rest) = read_u16(rest)?;
                if count == 0 {
                    return Err(Error::Malformed);
                }
                let count = count as usize;
                if rest.len() != count * POINT_LENGTH + Signature::LENGTH {
                    return Err(Error::Malformed);
                }
                let mut coefficients = Vec::with_capacity(count);
                let mut rest = rest;
                for _ in 0..count {
                    let (point, remaining) = read_point(rest)?;
                    coefficients.push(point);
                    rest = remaining;
                }
                let (pok_commitment, rest) = read_point(rest)?;
                let (pok_response, _) = read_scalar(rest)?;
                Payload::KeyGen1 {
                    commitment: VssCommitment::new(coefficients),
                    proof: Signature {
                        R: pok_commitment,
                        z: pok_response,
                    },
                }
            }
            MessageType::KeyGen2 => {
                if rest.len() != ParticipantId::LENGTH + SCALAR_LENGTH {
                    return Err(Error::Malformed);
                }
                let (to, rest) = read_id(rest)?;
                let (share, _) = read_scalar(rest)?;
                Payload::KeyGen2 {
                    to,
                    share: Zeroizing::new(share),
                }
            }
            MessageType::Sign1 => {
                if rest.len() != 2 * POINT_LENGTH {
                    return Err(Error::Malformed);
                }
                let (hiding, rest) = read_point(rest)?;
                let (binding, _) = read_point(rest)?;
                Payload::Sign1 { hiding, binding }
            }
            MessageType::Sign2 => {
                if rest.len() != SCALAR_LENGTH {
                    return Err(Error::Malformed);
                }
                let (share, _) = read_scalar(rest)?;
                Payload::Sign2 { share }
            }
        };
        Ok(Self { from, payload })
    }
}

impl fmt::Debug for Message {
    // Payloads may carry secret shares, so only the routing data is printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.message_type())
            .field("from", &self.from)
            .field("to", &self.recipient())
            .finish_non_exhaustive()
    }
}

fn read_id(bytes: &[u8]) -> Result<(ParticipantId, &[u8]), Error> {
    if bytes.len() < ParticipantId::LENGTH {
        return Err(Error::Malformed);
    }
    let (encoded, rest) = bytes.split_at(ParticipantId::LENGTH);
    let encoded: [u8; ParticipantId::LENGTH] =
        encoded.try_into().map_err(|_| Error::Malformed)?;
    let id = ParticipantId::from_bytes(encoded).map_err(|_| Error::Malformed)?;
    Ok((id, rest))
}

fn read_u16(bytes: &[u8]) -> Result<(u16, &[u8]), Error> {
    if bytes.len() < 2 {
        return Err(Error::Malformed);
    }
    let (encoded, rest) = bytes.split_at(2);
    let encoded: [u8; 2] = encoded.try_into().map_err(|_| Error::Malformed)?;
    Ok((u16::from_be_bytes(encoded), rest))
}

fn read_point(bytes: &[u8]) -> Result<(EdwardsPoint, &[u8]), Error> {
    if bytes.len() < POINT_LENGTH {
        return Err(Error::Malformed);
    }
    let (encoded, rest) = bytes.split_at(POINT_LENGTH);
    let encoded: [u8; POINT_LENGTH] = encoded.try_into().map_err(|_| Error::Malformed)?;
    Ok((curve::deserialize_point(&encoded)?, rest))
}

fn read_scalar(bytes: &[u8]) -> Result<(Scalar, &[u8]), Error> {
    if bytes.len() < SCALAR_LENGTH {
        return Err(Error::Malformed);
    }
    let (encoded, rest) = bytes.split_at(SCALAR_LENGTH);
    let encoded: [u8; SCALAR_LENGTH] = encoded.try_into().map_err(|_| Error::Malformed)?;
    Ok((curve::deserialize_scalar(&encoded)?, rest))
}
