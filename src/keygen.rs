//! Distributed key generation.
//!
//! Every participant deals a random degree-`t` polynomial, broadcasts a
//! commitment to its coefficients together with a Schnorr proof of knowledge
//! of the constant term, and then sends each peer the evaluation of its
//! polynomial at that peer's identifier. Summing the verified evaluations
//! gives each participant a Shamir share of a secret no single party ever
//! held; summing the constant-term commitments gives the group public key.
//!
//! The proof of knowledge is bound to the dealer's identity and commitment,
//! which blocks rogue-key choices of the aggregate key by the last announcer.

use std::collections::BTreeMap;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use log::debug;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::curve;
use crate::keys::{PublicKeyPackage, SecretShare, VerifyingKey, VerifyingShare};
use crate::messages::{Message, MessageType, Payload};
use crate::participant::{ParticipantId, ParticipantSet};
use crate::polynomial::{verify_share, Polynomial, VssCommitment};
use crate::session::{private, Protocol, Session};
use crate::signature::Signature;
use crate::Error;

/// Domain separation prefix of the proof-of-knowledge transcript.
const POK_CONTEXT: &[u8] = b"FROST-KG";

/// Output of a completed key-generation session: the public key material of
/// the whole group and this participant's secret share.
pub type KeygenOutput = (PublicKeyPackage, SecretShare);

/// A running key-generation session.
pub type KeygenSession = Session<Keygen>;

impl Session<Keygen> {
    /// Creates a distributed key-generation session for `self_id`.
    ///
    /// `threshold` is the maximum number of participants that may collude
    /// without learning anything about the group secret; any `threshold + 1`
    /// of the `participants` can later sign. All randomness (polynomial
    /// coefficients and the proof-of-knowledge nonce) is drawn from `rng` up
    /// front.
    pub fn new<R: RngCore + CryptoRng>(
        self_id: ParticipantId,
        participants: ParticipantSet,
        threshold: u16,
        rng: &mut R,
    ) -> Result<Self, Error> {
        if !participants.contains(self_id) {
            return Err(Error::UnknownParticipant { id: self_id });
        }
        if threshold == 0 || u32::from(threshold) + 1 > u32::from(participants.len()) {
            return Err(Error::InvalidThreshold);
        }
        let polynomial = Polynomial::sample(threshold, Scalar::random(rng), rng);
        let pok_nonce = Zeroizing::new(Scalar::random(rng));
        let senders = participants.others(self_id);
        let machine = Keygen {
            self_id,
            participants,
            threshold,
            round: Round::Announce {
                polynomial,
                pok_nonce,
                announcement: None,
            },
        };
        Ok(Session::begin(
            self_id,
            machine,
            senders,
            vec![MessageType::KeyGen1, MessageType::KeyGen2],
        ))
    }
}

/// The key-generation state machine driven by [`Session`].
pub struct Keygen {
    self_id: ParticipantId,
    participants: ParticipantSet,
    threshold: u16,
    round: Round,
}

enum Round {
    /// Initial round: commit to the dealt polynomial and prove knowledge of
    /// the secret constant term.
    Announce {
        polynomial: Polynomial,
        pok_nonce: Zeroizing<Scalar>,
        announcement: Option<(VssCommitment, Signature)>,
    },
    /// Verify every peer's announcement, then send each peer its share.
    /// The polynomial is consumed, and wiped, once the shares are out.
    Distribute {
        polynomial: Option<Polynomial>,
        commitments: BTreeMap<ParticipantId, VssCommitment>,
        secret: Zeroizing<Scalar>,
    },
    /// Verify every received share and aggregate the outputs.
    Aggregate {
        summed: VssCommitment,
        commitments: BTreeMap<ParticipantId, VssCommitment>,
        secret: Zeroizing<Scalar>,
        output: Option<KeygenOutput>,
    },
    Done,
}

impl private::Sealed for Keygen {}

impl Protocol for Keygen {
    type Output = KeygenOutput;

    fn process_message(&mut self, message: Message) -> Result<(), Error> {
        let sender = message.sender();
        match (&mut self.round, message.into_payload()) {
            (Round::Distribute { commitments, .. }, Payload::KeyGen1 { commitment, proof }) => {
                if commitment.len() != usize::from(self.threshold) + 1 {
                    return Err(Error::InvalidCommitment { culprit: sender });
                }
                verify_proof_of_knowledge(sender, &commitment, &proof)?;
                commitments.insert(sender, commitment);
                Ok(())
            }
            (
                Round::Aggregate {
                    commitments,
                    secret,
                    ..
                },
                Payload::KeyGen2 { share, .. },
            ) => {
                let commitment = commitments
                    .get(&sender)
                    .ok_or(Error::UnknownSender { sender })?;
                if !verify_share(&share, commitment, &self.self_id.to_scalar()) {
                    return Err(Error::InvalidShare { culprit: sender });
                }
                **secret += *share;
                // The received share is wiped when `share` drops here.
                Ok(())
            }
            _ => Err(Error::WrongType),
        }
    }

    fn process_round(&mut self) -> Result<(), Error> {
        match &mut self.round {
            Round::Announce {
                polynomial,
                pok_nonce,
                announcement,
            } => {
                let commitment = polynomial.commit();
                let proof =
                    compute_proof_of_knowledge(self.self_id, polynomial, &commitment, pok_nonce);
                *announcement = Some((commitment, proof));
                Ok(())
            }
            // Peer announcements were already verified one by one.
            Round::Distribute { .. } => Ok(()),
            Round::Aggregate {
                summed,
                secret,
                output,
                ..
            } => {
                let verifying_key = VerifyingKey::new(*summed.constant());
                let verifying_shares: BTreeMap<ParticipantId, VerifyingShare> = self
                    .participants
                    .iter()
                    .map(|id| (id, VerifyingShare::new(summed.evaluate(&id.to_scalar()))))
                    .collect();
                let public =
                    PublicKeyPackage::new(verifying_shares, verifying_key, self.threshold);
                let share = SecretShare::new(self.self_id, **secret);
                debug!(
                    "participant {}: key generation complete, group key {:?}",
                    self.self_id, verifying_key
                );
                *output = Some((public, share));
                Ok(())
            }
            Round::Done => Err(Error::RoundProcessed),
        }
    }

    fn generate_messages(&mut self) -> Result<Vec<Message>, Error> {
        match &mut self.round {
            Round::Announce { announcement, .. } => {
                let (commitment, proof) =
                    announcement.as_ref().ok_or(Error::RoundNotProcessed)?;
                Ok(vec![Message::key_gen1(
                    self.self_id,
                    commitment.clone(),
                    *proof,
                )])
            }
            Round::Distribute {
                polynomial, secret, ..
            } => {
                let polynomial = polynomial.take().ok_or(Error::RoundNotProcessed)?;
                let mut messages = Vec::with_capacity(usize::from(self.participants.len()) - 1);
                for id in self.participants.iter() {
                    if id == self.self_id {
                        continue;
                    }
                    messages.push(Message::key_gen2(
                        self.self_id,
                        id,
                        polynomial.evaluate(&id.to_scalar()),
                    ));
                }
                **secret += polynomial.evaluate(&self.self_id.to_scalar());
                // Dropping the polynomial wipes the coefficients.
                drop(polynomial);
                Ok(messages)
            }
            Round::Aggregate { .. } => Ok(Vec::new()),
            Round::Done => Err(Error::RoundProcessed),
        }
    }

    fn next_round(&mut self) -> Result<Option<Self::Output>, Error> {
        match std::mem::replace(&mut self.round, Round::Done) {
            Round::Announce {
                polynomial,
                announcement,
                ..
            } => {
                let (commitment, _) = announcement.ok_or(Error::RoundNotProcessed)?;
                let mut commitments = BTreeMap::new();
                commitments.insert(self.self_id, commitment);
                self.round = Round::Distribute {
                    polynomial: Some(polynomial),
                    commitments,
                    secret: Zeroizing::new(Scalar::ZERO),
                };
                Ok(None)
            }
            Round::Distribute {
                commitments,
                secret,
                ..
            } => {
                let summed = VssCommitment::sum(commitments.values())?;
                self.round = Round::Aggregate {
                    summed,
                    commitments,
                    secret,
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

fn pok_challenge(
    id: ParticipantId,
    secret_commitment: &EdwardsPoint,
    pok_commitment: &EdwardsPoint,
) -> Scalar {
    // c = H("FROST-KG" ‖ id ‖ A_0 ‖ M), binding the proof to the dealer and
    // its commitment.
    curve::hash_to_scalar(&[
        POK_CONTEXT,
        &id.to_bytes(),
        &curve::serialize_point(secret_commitment),
        &curve::serialize_point(pok_commitment),
    ])
}

/// Proves knowledge of the dealt secret `a_0`: `(M, σ) = ([k]B, k + c·a_0)`.
fn compute_proof_of_knowledge(
    id: ParticipantId,
    polynomial: &Polynomial,
    commitment: &VssCommitment,
    nonce: &Scalar,
) -> Signature {
    let pok_commitment = EdwardsPoint::mul_base(nonce);
    let challenge = pok_challenge(id, commitment.constant(), &pok_commitment);
    Signature {
        R: pok_commitment,
        z: nonce + challenge * polynomial.constant(),
    }
}

/// Checks a peer's proof of knowledge: `[σ]B == M + [c]A_0`.
fn verify_proof_of_knowledge(
    id: ParticipantId,
    commitment: &VssCommitment,
    proof: &Signature,
) -> Result<(), Error> {
    let challenge = pok_challenge(id, commitment.constant(), &proof.R);
    if EdwardsPoint::mul_base(&proof.z) != proof.R + commitment.constant() * challenge {
        return Err(Error::InvalidProof { culprit: id });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u16) -> ParticipantId {
        ParticipantId::new(n).unwrap()
    }

    #[test]
    fn proof_of_knowledge_round_trips() {
        let mut rng = rand::thread_rng();
        let polynomial = Polynomial::sample(2, Scalar::random(&mut rng), &mut rng);
        let commitment = polynomial.commit();
        let nonce = Scalar::random(&mut rng);

        let proof = compute_proof_of_knowledge(id(7), &polynomial, &commitment, &nonce);
        assert!(verify_proof_of_knowledge(id(7), &commitment, &proof).is_ok());
    }

    #[test]
    fn proof_is_bound_to_the_dealer() {
        let mut rng = rand::thread_rng();
        let polynomial = Polynomial::sample(2, Scalar::random(&mut rng), &mut rng);
        let commitment = polynomial.commit();
        let nonce = Scalar::random(&mut rng);

        let proof = compute_proof_of_knowledge(id(7), &polynomial, &commitment, &nonce);
        assert_eq!(
            verify_proof_of_knowledge(id(8), &commitment, &proof),
            Err(Error::InvalidProof { culprit: id(8) })
        );
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut rng = rand::thread_rng();
        let participants = ParticipantSet::new([id(1), id(2), id(3)]).unwrap();

        assert!(matches!(
            Session::<Keygen>::new(id(9), participants.clone(), 1, &mut rng),
            Err(Error::UnknownParticipant { .. })
        ));
        assert!(matches!(
            Session::<Keygen>::new(id(1), participants.clone(), 0, &mut rng),
            Err(Error::InvalidThreshold)
        ));
        assert!(matches!(
            Session::<Keygen>::new(id(1), participants, 3, &mut rng),
            Err(Error::InvalidThreshold)
        ));
    }
}
