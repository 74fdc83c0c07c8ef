//! Per-round message mailboxes.

use std::collections::{BTreeMap, BTreeSet};

use crate::messages::{Message, MessageType};
use crate::participant::ParticipantId;
use crate::Error;

/// Stores at most one message per peer per round.
///
/// The accepted message types, one per round in protocol order, are fixed at
/// construction. A message for a later round is buffered until that round
/// becomes current; a message for an already-completed round is rejected.
pub(crate) struct MessageQueue {
    senders: BTreeSet<ParticipantId>,
    accepted: Vec<MessageType>,
    current: usize,
    buffers: Vec<BTreeMap<ParticipantId, Message>>,
}

impl MessageQueue {
    pub(crate) fn new(senders: BTreeSet<ParticipantId>, accepted: Vec<MessageType>) -> Self {
        let buffers = accepted.iter().map(|_| BTreeMap::new()).collect();
        Self {
            senders,
            accepted,
            current: 0,
            buffers,
        }
    }

    /// Files a message under the round its type belongs to.
    pub(crate) fn store(&mut self, message: Message) -> Result<(), Error> {
        let sender = message.sender();
        if !self.senders.contains(&sender) {
            return Err(Error::UnknownSender { sender });
        }
        let round = self
            .accepted
            .iter()
            .position(|&accepted| accepted == message.message_type())
            .filter(|&round| round >= self.current)
            .ok_or(Error::WrongType)?;
        let buffer = &mut self.buffers[round];
        if buffer.contains_key(&sender) {
            return Err(Error::Duplicate { sender });
        }
        buffer.insert(sender, message);
        Ok(())
    }

    /// True once every expected peer has a message filed for the current
    /// round.
    pub(crate) fn received_all(&self) -> bool {
        self.buffers
            .get(self.current)
            .is_some_and(|buffer| buffer.len() == self.senders.len())
    }

    /// Removes and returns the current round's messages, in ascending sender
    /// order.
    pub(crate) fn take_messages(&mut self) -> Vec<Message> {
        match self.buffers.get_mut(self.current) {
            Some(buffer) => std::mem::take(buffer).into_values().collect(),
            None => Vec::new(),
        }
    }

    /// Discards whatever is left of the current round and makes the next one
    /// current.
    pub(crate) fn next_round(&mut self) {
        if let Some(buffer) = self.buffers.get_mut(self.current) {
            buffer.clear();
        }
        self.current += 1;
    }
}

#[cfg(test)]
mod tests {
    use curve25519_dalek::edwards::EdwardsPoint;
    use curve25519_dalek::scalar::Scalar;

    use super::*;

    fn id(n: u16) -> ParticipantId {
        ParticipantId::new(n).unwrap()
    }

    fn sign1(from: u16) -> Message {
        let point = EdwardsPoint::mul_base(&Scalar::from(u64::from(from)));
        Message::sign1(id(from), point, point)
    }

    fn sign2(from: u16) -> Message {
        Message::sign2(id(from), Scalar::from(u64::from(from)))
    }

    fn queue() -> MessageQueue {
        MessageQueue::new(
            [id(2), id(3)].into_iter().collect(),
            vec![MessageType::Sign1, MessageType::Sign2],
        )
    }

    #[test]
    fn collects_one_message_per_peer() {
        let mut queue = queue();
        assert!(!queue.received_all());
        queue.store(sign1(2)).unwrap();
        assert!(!queue.received_all());
        queue.store(sign1(3)).unwrap();
        assert!(queue.received_all());

        let senders: Vec<ParticipantId> =
            queue.take_messages().iter().map(Message::sender).collect();
        assert_eq!(senders, vec![id(2), id(3)]);
    }

    #[test]
    fn rejects_unknown_sender() {
        let mut queue = queue();
        assert_eq!(
            queue.store(sign1(9)),
            Err(Error::UnknownSender { sender: id(9) })
        );
    }

    #[test]
    fn rejects_duplicates() {
        let mut queue = queue();
        queue.store(sign1(2)).unwrap();
        assert_eq!(queue.store(sign1(2)), Err(Error::Duplicate { sender: id(2) }));
    }

    #[test]
    fn buffers_messages_for_future_rounds() {
        let mut queue = queue();
        queue.store(sign2(3)).unwrap();
        assert!(!queue.received_all());

        queue.store(sign1(2)).unwrap();
        queue.store(sign1(3)).unwrap();
        queue.next_round();

        assert!(!queue.received_all());
        queue.store(sign2(2)).unwrap();
        assert!(queue.received_all());
    }

    #[test]
    fn rejects_messages_for_past_rounds() {
        let mut queue = queue();
        queue.next_round();
        assert_eq!(queue.store(sign1(2)), Err(Error::WrongType));

        queue.next_round();
        assert_eq!(queue.store(sign2(2)), Err(Error::WrongType));
    }

    #[test]
    fn rejects_foreign_message_types() {
        let mut queue = queue();
        let share = Message::key_gen2(id(2), id(1), Scalar::ONE);
        assert_eq!(queue.store(share), Err(Error::WrongType));
    }
}
