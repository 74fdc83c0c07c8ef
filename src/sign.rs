//! Threshold signing.
//!
//! Each signer commits to a fresh pair of nonces, then derives a per-signer
//! binding factor from the full set of commitments, the message and its own
//! identifier. The binding factor ties the aggregated nonce commitment `R`
//! to every signer's announced pair, so the last signer to reveal cannot
//! steer `R` after seeing the others. Responses are verified individually
//! against each signer's public share before they are summed into the final
//! signature, which any stock Ed25519 verifier accepts.

use std::collections::BTreeMap;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use log::debug;
use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::curve;
use crate::keys::{PublicKeyPackage, SecretShare};
use crate::messages::{Message, MessageType, Payload};
use crate::participant::{lagrange_coefficient, ParticipantId, ParticipantSet};
use crate::session::{private, Protocol, Session};
use crate::signature::Signature;
use crate::Error;

/// Domain separation prefix of the binding-factor hash.
const BINDING_CONTEXT: &[u8] = b"FROST-SHA512";

/// A running signing session.
pub type SignSession = Session<Sign>;

impl Session<Sign> {
    /// Creates a signing session over `message` for the quorum `signers`.
    ///
    /// The signers must all hold shares from the same key generation that
    /// produced `public_key`, and at least `threshold + 1` of them are
    /// needed. The session nonces are drawn from `rng` here and erased as
    /// soon as the response is computed.
    pub fn new<R: RngCore + CryptoRng>(
        self_id: ParticipantId,
        signers: ParticipantSet,
        public_key: &PublicKeyPackage,
        secret_share: &SecretShare,
        message: impl Into<Vec<u8>>,
        rng: &mut R,
    ) -> Result<Self, Error> {
        if !signers.contains(self_id) {
            return Err(Error::UnknownParticipant { id: self_id });
        }
        if secret_share.identifier() != self_id {
            return Err(Error::WrongSecretShare);
        }
        if u32::from(signers.len()) < u32::from(*public_key.threshold()) + 1 {
            return Err(Error::InvalidThreshold);
        }
        let mut states = BTreeMap::new();
        for id in signers.iter() {
            let verifying_share = public_key
                .verifying_shares()
                .get(&id)
                .ok_or(Error::UnknownParticipant { id })?;
            states.insert(
                id,
                SignerState {
                    lagrange: lagrange_coefficient(&signers, id)?,
                    verifying_share: verifying_share.to_element(),
                    commitments: None,
                    commitment_share: None,
                },
            );
        }
        let nonces = Nonces {
            hiding: Scalar::random(rng),
            binding: Scalar::random(rng),
        };
        let senders = signers.others(self_id);
        let machine = Sign {
            self_id,
            message: message.into(),
            group_key: public_key.verifying_key().to_element(),
            secret: Zeroizing::new(secret_share.to_scalar()),
            states,
            round: Round::Commit { nonces },
        };
        Ok(Session::begin(
            self_id,
            machine,
            senders,
            vec![MessageType::Sign1, MessageType::Sign2],
        ))
    }
}

/// A signer's pair of session nonces, erased on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct Nonces {
    hiding: Scalar,
    binding: Scalar,
}

/// Everything this session tracks about one member of the quorum.
struct SignerState {
    lagrange: Scalar,
    /// `Y_i = [s_i]B` from the public key package.
    verifying_share: EdwardsPoint,
    /// `(D_i, E_i)`, announced in round 1.
    commitments: Option<(EdwardsPoint, EdwardsPoint)>,
    /// `R_i = D_i + [ρ_i]E_i`, derived once all commitments are in.
    commitment_share: Option<EdwardsPoint>,
}

/// The signing state machine driven by [`Session`].
pub struct Sign {
    self_id: ParticipantId,
    message: Vec<u8>,
    group_key: EdwardsPoint,
    /// Local copy of the long-lived share, wiped after the response is
    /// computed.
    secret: Zeroizing<Scalar>,
    states: BTreeMap<ParticipantId, SignerState>,
    round: Round,
}

enum Round {
    /// Initial round: announce `(D, E)`.
    Commit { nonces: Nonces },
    /// Derive the binding factors and the challenge, respond, erase the
    /// nonces.
    Respond {
        nonces: Option<Nonces>,
        prepared: Option<Prepared>,
    },
    /// Verify every response and assemble the signature.
    Aggregate {
        group_commitment: EdwardsPoint,
        challenge: Scalar,
        z: Scalar,
        output: Option<Signature>,
    },
    Done,
}

struct Prepared {
    group_commitment: EdwardsPoint,
    challenge: Scalar,
    response: Scalar,
}

impl private::Sealed for Sign {}

impl Protocol for Sign {
    type Output = Signature;

    fn process_message(&mut self, message: Message) -> Result<(), Error> {
        let sender = message.sender();
        match (&mut self.round, message.into_payload()) {
            (Round::Respond { .. }, Payload::Sign1 { hiding, binding }) => {
                let state = self
                    .states
                    .get_mut(&sender)
                    .ok_or(Error::UnknownSender { sender })?;
                state.commitments = Some((hiding, binding));
                Ok(())
            }
            (
                Round::Aggregate {
                    challenge, z, ..
                },
                Payload::Sign2 { share },
            ) => {
                let state = self
                    .states
                    .get(&sender)
                    .ok_or(Error::UnknownSender { sender })?;
                let commitment_share =
                    state.commitment_share.ok_or(Error::RoundNotProcessed)?;
                // [z_j]B == R_j + [c·λ_j]Y_j
                if EdwardsPoint::mul_base(&share)
                    != commitment_share + state.verifying_share * (*challenge * state.lagrange)
                {
                    return Err(Error::InvalidResponse { culprit: sender });
                }
                *z += share;
                Ok(())
            }
            _ => Err(Error::WrongType),
        }
    }

    fn process_round(&mut self) -> Result<(), Error> {
        match &mut self.round {
            Round::Commit { nonces } => {
                let state = self
                    .states
                    .get_mut(&self.self_id)
                    .ok_or(Error::UnknownParticipant { id: self.self_id })?;
                state.commitments = Some((
                    EdwardsPoint::mul_base(&nonces.hiding),
                    EdwardsPoint::mul_base(&nonces.binding),
                ));
                Ok(())
            }
            Round::Respond { nonces, prepared } => {
                // B = (i_1 ‖ D_1 ‖ E_1) ‖ … ‖ (i_k ‖ D_k ‖ E_k), ascending.
                let mut transcript =
                    Vec::with_capacity(self.states.len() * (4 + 2 * curve::POINT_LENGTH));
                for (id, state) in &self.states {
                    let (hiding, binding) =
                        state.commitments.ok_or(Error::RoundNotProcessed)?;
                    transcript.extend_from_slice(&id.to_transcript_bytes());
                    transcript.extend_from_slice(&curve::serialize_point(&hiding));
                    transcript.extend_from_slice(&curve::serialize_point(&binding));
                }

                let mut group_commitment = EdwardsPoint::identity();
                let mut own_binding_factor = Scalar::ZERO;
                for (id, state) in self.states.iter_mut() {
                    // ρ_i = H("FROST-SHA512" ‖ i ‖ M ‖ B)
                    let binding_factor = curve::hash_to_scalar(&[
                        BINDING_CONTEXT,
                        &id.to_transcript_bytes(),
                        &self.message,
                        &transcript,
                    ]);
                    let (hiding, binding) =
                        state.commitments.ok_or(Error::RoundNotProcessed)?;
                    let share = hiding + binding * binding_factor;
                    state.commitment_share = Some(share);
                    group_commitment += share;
                    if *id == self.self_id {
                        own_binding_factor = binding_factor;
                    }
                }

                let challenge = curve::challenge(&group_commitment, &self.group_key, &self.message);

                let own = self
                    .states
                    .get(&self.self_id)
                    .ok_or(Error::UnknownParticipant { id: self.self_id })?;
                let nonces = nonces.take().ok_or(Error::RoundProcessed)?;
                // z = d + ρ·e + λ·s·c
                let response = nonces.hiding
                    + nonces.binding * own_binding_factor
                    + own.lagrange * *self.secret * challenge;
                // The nonces are single use; erase them and the share copy now.
                drop(nonces);
                *self.secret = Scalar::ZERO;

                *prepared = Some(Prepared {
                    group_commitment,
                    challenge,
                    response,
                });
                Ok(())
            }
            Round::Aggregate {
                group_commitment,
                z,
                output,
                ..
            } => {
                let signature = Signature {
                    R: *group_commitment,
                    z: *z,
                };
                // Self-test the assembled signature before anyone uses it.
                crate::keys::VerifyingKey::new(self.group_key)
                    .verify(&self.message, &signature)?;
                debug!("participant {}: signing complete", self.self_id);
                *output = Some(signature);
                Ok(())
            }
            Round::Done => Err(Error::RoundProcessed),
        }
    }

    fn generate_messages(&mut self) -> Result<Vec<Message>, Error> {
        match &self.round {
            Round::Commit { .. } => {
                let state = self
                    .states
                    .get(&self.self_id)
                    .ok_or(Error::UnknownParticipant { id: self.self_id })?;
                let (hiding, binding) = state.commitments.ok_or(Error::RoundNotProcessed)?;
                Ok(vec![Message::sign1(self.self_id, hiding, binding)])
            }
            Round::Respond { prepared, .. } => {
                let prepared = prepared.as_ref().ok_or(Error::RoundNotProcessed)?;
                Ok(vec![Message::sign2(self.self_id, prepared.response)])
            }
            Round::Aggregate { .. } => Ok(Vec::new()),
            Round::Done => Err(Error::RoundProcessed),
        }
    }

    fn next_round(&mut self) -> Result<Option<Self::Output>, Error> {
        match std::mem::replace(&mut self.round, Round::Done) {
            Round::Commit { nonces } => {
                self.round = Round::Respond {
                    nonces: Some(nonces),
                    prepared: None,
                };
                Ok(None)
            }
            Round::Respond { prepared, .. } => {
                let prepared = prepared.ok_or(Error::RoundNotProcessed)?;
                self.round = Round::Aggregate {
                    group_commitment: prepared.group_commitment,
                    challenge: prepared.challenge,
                    z: prepared.response,
                    output: None,
                };
                Ok(None)
            }
            Round::Aggregate { output, .. } => {
                Ok(Some(output.ok_or(Error::RoundNotProcessed)?))
            }
            Round::Done => Err(Error::RoundProcessed),
        }
    }
}
