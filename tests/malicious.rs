//! Misbehaving peers, garbled packets and abort semantics.

mod common;

use std::collections::BTreeMap;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use frost_ed25519_tss::{
    Error, KeygenSession, MessageType, ParticipantId, ParticipantSet, SignSession,
};

fn id(n: u16) -> ParticipantId {
    ParticipantId::new(n).unwrap()
}

fn participant_set(ids: &[u16]) -> ParticipantSet {
    ParticipantSet::new(ids.iter().map(|&n| id(n))).unwrap()
}

fn keygen_sessions(
    threshold: u16,
    ids_list: &[u16],
    rng: &mut ChaCha20Rng,
) -> BTreeMap<ParticipantId, KeygenSession> {
    let set = participant_set(ids_list);
    ids_list
        .iter()
        .map(|&n| {
            let session = KeygenSession::new(id(n), set.clone(), threshold, rng).unwrap();
            (id(n), session)
        })
        .collect()
}

fn sign_sessions(
    signer_ids: &[u16],
    outputs: &BTreeMap<ParticipantId, frost_ed25519_tss::KeygenOutput>,
    message: &[u8],
    rng: &mut ChaCha20Rng,
) -> BTreeMap<ParticipantId, SignSession> {
    let signers = participant_set(signer_ids);
    signer_ids
        .iter()
        .map(|&n| {
            let (package, share) = &outputs[&id(n)];
            let session =
                SignSession::new(id(n), signers.clone(), package, share, message, rng).unwrap();
            (id(n), session)
        })
        .collect()
}

fn run_keygen(
    threshold: u16,
    ids_list: &[u16],
    rng: &mut ChaCha20Rng,
) -> BTreeMap<ParticipantId, frost_ed25519_tss::KeygenOutput> {
    let sessions = keygen_sessions(threshold, ids_list, rng);
    common::pump(&sessions);
    sessions
        .iter()
        .map(|(&participant, session)| (participant, session.wait().unwrap()))
        .collect()
}

/// Adds one to a canonically encoded scalar field inside a wire message.
fn bump_scalar(bytes: &mut [u8]) {
    let encoded: [u8; 32] = bytes.try_into().unwrap();
    let scalar: Scalar = Option::from(Scalar::from_canonical_bytes(encoded)).unwrap();
    bytes.copy_from_slice(&(scalar + Scalar::ONE).to_bytes());
}

#[test]
fn tampered_vss_share_aborts_naming_the_dealer() {
    let mut rng = ChaCha20Rng::seed_from_u64(30);
    let sessions = keygen_sessions(1, &[1, 2, 3], &mut rng);

    // Party 2's share for party 1 is replaced with share + 1, which still
    // decodes but fails the VSS check.
    common::pump_with(&sessions, |message, mut bytes| {
        if message.message_type() == MessageType::KeyGen2
            && message.sender() == id(2)
            && message.recipient() == Some(id(1))
        {
            bump_scalar(&mut bytes[5..37]);
        }
        bytes
    });

    let error = sessions[&id(1)].try_result().unwrap().unwrap_err();
    assert_eq!(error, Error::InvalidShare { culprit: id(2) });
    assert_eq!(error.culprit(), Some(id(2)));

    // The other parties received only honest shares and completed.
    assert!(sessions[&id(2)].try_result().unwrap().is_ok());
    assert!(sessions[&id(3)].try_result().unwrap().is_ok());
}

#[test]
fn aborts_are_sticky() {
    let mut rng = ChaCha20Rng::seed_from_u64(31);
    let sessions = keygen_sessions(1, &[1, 2, 3], &mut rng);
    common::pump_with(&sessions, |message, mut bytes| {
        if message.message_type() == MessageType::KeyGen2
            && message.sender() == id(2)
            && message.recipient() == Some(id(1))
        {
            bump_scalar(&mut bytes[5..37]);
        }
        bytes
    });

    let session = &sessions[&id(1)];
    let error = session.try_result().unwrap().unwrap_err();
    assert_eq!(error, Error::InvalidShare { culprit: id(2) });

    // Whatever happens next, the first error and culprit stay; even a
    // perfectly valid message only gets the sticky error back.
    let mut share = vec![2u8];
    share.extend_from_slice(&3u16.to_be_bytes());
    share.extend_from_slice(&1u16.to_be_bytes());
    share.extend_from_slice(&Scalar::ONE.to_bytes());
    assert_eq!(session.store_message(&share), Err(error.clone()));
    assert_eq!(session.advance().unwrap_err(), error);
    assert_eq!(session.wait().unwrap_err(), error);
    assert_eq!(session.try_result().unwrap().unwrap_err(), error);
}

#[test]
fn later_faults_chain_behind_the_first() {
    let mut rng = ChaCha20Rng::seed_from_u64(36);
    let sessions = keygen_sessions(1, &[1, 2, 3], &mut rng);

    // Both peers send party 1 a bad share. Shares are processed in
    // ascending sender order, so party 2's fault is recorded first and
    // party 3's is appended behind it.
    common::pump_with(&sessions, |message, mut bytes| {
        if message.message_type() == MessageType::KeyGen2 && message.recipient() == Some(id(1)) {
            bump_scalar(&mut bytes[5..37]);
        }
        bytes
    });

    let session = &sessions[&id(1)];
    let error = session.try_result().unwrap().unwrap_err();
    assert_eq!(
        error,
        Error::Chained {
            first: Box::new(Error::InvalidShare { culprit: id(2) }),
            follow_up: Box::new(Error::InvalidShare { culprit: id(3) }),
        }
    );

    // The chain keeps the first culprit authoritative and stays sticky.
    assert_eq!(error.culprit(), Some(id(2)));
    assert_eq!(session.advance().unwrap_err(), error);
    assert_eq!(session.wait().unwrap_err(), error);
}

#[test]
fn tampered_response_aborts_naming_the_signer() {
    let mut rng = ChaCha20Rng::seed_from_u64(32);
    let outputs = run_keygen(2, &[1, 2, 3, 4, 5], &mut rng);
    let sessions = sign_sessions(&[1, 3, 5], &outputs, b"payload", &mut rng);

    // Party 3 sends z + 1 instead of its response.
    common::pump_with(&sessions, |message, mut bytes| {
        if message.message_type() == MessageType::Sign2 && message.sender() == id(3) {
            bump_scalar(&mut bytes[3..35]);
        }
        bytes
    });

    for honest in [1_u16, 5] {
        let error = sessions[&id(honest)].try_result().unwrap().unwrap_err();
        assert_eq!(error, Error::InvalidResponse { culprit: id(3) });
    }
}

#[test]
fn duplicate_nonce_commitments_are_rejected_without_aborting() {
    let mut rng = ChaCha20Rng::seed_from_u64(33);
    let outputs = run_keygen(1, &[1, 2, 3], &mut rng);
    let sessions = sign_sessions(&[1, 2], &outputs, b"once", &mut rng);

    let announcements = sessions[&id(1)].advance().unwrap();
    assert_eq!(announcements.len(), 1);
    let bytes = announcements[0].to_bytes();

    let receiver = &sessions[&id(2)];
    receiver.store_message(&bytes).unwrap();
    assert_eq!(
        receiver.store_message(&bytes),
        Err(Error::Duplicate { sender: id(1) })
    );

    // A second pair of commitments is also a duplicate, not a replacement.
    let mut forged = bytes.clone();
    forged[3..35].copy_from_slice(&EdwardsPoint::mul_base(&Scalar::from(99_u64)).compress().to_bytes());
    assert_eq!(
        receiver.store_message(&forged),
        Err(Error::Duplicate { sender: id(1) })
    );

    common::pump(&sessions);
    let signature = sessions[&id(2)].wait().unwrap();
    let (package, _) = &outputs[&id(1)];
    package.verifying_key().verify(b"once", &signature).unwrap();
}

#[test]
fn malformed_packets_do_not_disturb_the_session() {
    let mut rng = ChaCha20Rng::seed_from_u64(34);
    let outputs = run_keygen(1, &[1, 2, 3], &mut rng);
    let sessions = sign_sessions(&[1, 2], &outputs, b"resilient", &mut rng);
    let session = &sessions[&id(1)];

    let honest_point = EdwardsPoint::mul_base(&Scalar::ONE).compress().to_bytes();

    // Identity nonce commitment.
    let mut identity_d = vec![3u8];
    identity_d.extend_from_slice(&2u16.to_be_bytes());
    let mut identity = [0u8; 32];
    identity[0] = 1;
    identity_d.extend_from_slice(&identity);
    identity_d.extend_from_slice(&honest_point);
    assert_eq!(session.store_message(&identity_d), Err(Error::InvalidEncoding));

    // Small-order nonce commitment.
    let mut small_order = vec![3u8];
    small_order.extend_from_slice(&2u16.to_be_bytes());
    let mut point = [0u8; 32];
    point[0] = 3;
    small_order.extend_from_slice(&point);
    small_order.extend_from_slice(&honest_point);
    assert_eq!(session.store_message(&small_order), Err(Error::InvalidEncoding));

    // Truncated packet.
    assert_eq!(session.store_message(&[3u8, 0, 2, 1]), Err(Error::Malformed));

    // A share addressed to somebody else.
    let mut misrouted = vec![2u8];
    misrouted.extend_from_slice(&2u16.to_be_bytes());
    misrouted.extend_from_slice(&3u16.to_be_bytes());
    misrouted.extend_from_slice(&Scalar::ONE.to_bytes());
    assert_eq!(session.store_message(&misrouted), Err(Error::WrongRecipient));

    // A commitment from a stranger.
    let mut stranger = vec![3u8];
    stranger.extend_from_slice(&9u16.to_be_bytes());
    stranger.extend_from_slice(&honest_point);
    stranger.extend_from_slice(&honest_point);
    assert_eq!(
        session.store_message(&stranger),
        Err(Error::UnknownSender { sender: id(9) })
    );

    // None of that stopped the honest run.
    common::pump(&sessions);
    let signature = sessions[&id(1)].wait().unwrap();
    let (package, _) = &outputs[&id(1)];
    package.verifying_key().verify(b"resilient", &signature).unwrap();
}

#[test]
fn cancellation_aborts_the_session() {
    let mut rng = ChaCha20Rng::seed_from_u64(35);
    let set = participant_set(&[1, 2]);
    let session = KeygenSession::new(id(1), set, 1, &mut rng).unwrap();

    session.cancel();
    assert!(session.is_done());
    assert_eq!(session.wait().unwrap_err(), Error::Canceled);
    assert_eq!(session.advance().unwrap_err(), Error::Canceled);
    assert_eq!(session.try_result().unwrap().unwrap_err(), Error::Canceled);
}
