//! Per-node inbound queues with a round barrier.
//!
//! `send` only buffers. Nothing becomes drainable until [`MessageChannel::deliver`]
//! runs at the end of a round, so a message sent in round `r` is first seen
//! in round `r + 1` no matter which order nodes are activated in.
//!
//! Within one recipient's queue, envelopes keep the order in which they were
//! sent, across all senders.

use std::collections::{BTreeMap, VecDeque};

use fleetnet_topology::NodeId;
use tracing::trace;

use crate::error::{ConsensusError, Result};
use crate::message::{Envelope, Message};

#[derive(Debug, Default)]
struct Inbox {
    queue: VecDeque<Envelope>,
    closed: bool,
}

/// Inbound queues for every registered node.
#[derive(Debug, Default)]
pub struct MessageChannel {
    inboxes: BTreeMap<NodeId, Inbox>,
    /// Sent this round, in send order.
    pending: Vec<(NodeId, Envelope)>,
}

impl MessageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty inbox. Returns false if one already exists.
    pub fn register(&mut self, id: NodeId) -> bool {
        if self.inboxes.contains_key(&id) {
            return false;
        }
        self.inboxes.insert(id, Inbox::default());
        true
    }

    fn inbox(&self, id: NodeId) -> Result<&Inbox> {
        self.inboxes.get(&id).ok_or(ConsensusError::UnknownNode(id))
    }

    /// Buffer `message` from `from` for `to`.
    ///
    /// Returns `Ok(false)` when the message is dropped because either end is
    /// dead.
    pub fn send(&mut self, from: NodeId, to: NodeId, message: Message) -> Result<bool> {
        if self.inbox(to)?.closed || self.inboxes.get(&from).is_some_and(|i| i.closed) {
            trace!(%from, %to, ?message, "dropped: endpoint dead");
            return Ok(false);
        }
        self.pending.push((to, Envelope::new(from, message)));
        Ok(true)
    }

    /// Round barrier: make everything sent so far drainable.
    /// Returns the number of envelopes delivered.
    pub fn deliver(&mut self) -> usize {
        let mut delivered = 0;
        for (to, envelope) in self.pending.drain(..) {
            if let Some(inbox) = self.inboxes.get_mut(&to) {
                if !inbox.closed {
                    inbox.queue.push_back(envelope);
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Remove and return everything delivered to `id`, oldest first.
    pub fn drain(&mut self, id: NodeId) -> Result<Vec<Envelope>> {
        let inbox = self
            .inboxes
            .get_mut(&id)
            .ok_or(ConsensusError::UnknownNode(id))?;
        Ok(inbox.queue.drain(..).collect())
    }

    /// Stop all traffic to and from a dead node.
    ///
    /// Its own queue is discarded, and every envelope it sent that is still
    /// buffered or queued elsewhere is purged. Returns how many envelopes
    /// were dropped.
    pub fn close(&mut self, id: NodeId) -> Result<usize> {
        let inbox = self
            .inboxes
            .get_mut(&id)
            .ok_or(ConsensusError::UnknownNode(id))?;
        inbox.closed = true;
        let mut dropped = inbox.queue.len();
        inbox.queue.clear();

        let before = self.pending.len();
        self.pending.retain(|(to, e)| *to != id && e.from != id);
        dropped += before - self.pending.len();

        for inbox in self.inboxes.values_mut() {
            let before = inbox.queue.len();
            inbox.queue.retain(|e| e.from != id);
            dropped += before - inbox.queue.len();
        }
        Ok(dropped)
    }

    /// Whether the inbox for `id` has been closed.
    pub fn is_closed(&self, id: NodeId) -> bool {
        self.inboxes.get(&id).is_some_and(|i| i.closed)
    }

    /// Envelopes sent but not yet delivered.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Envelopes waiting in `id`'s inbox.
    pub fn queued_len(&self, id: NodeId) -> Result<usize> {
        Ok(self.inbox(id)?.queue.len())
    }

    /// Peek at `id`'s inbox without draining it.
    pub fn queued(&self, id: NodeId) -> Result<impl Iterator<Item = &Envelope> + '_> {
        Ok(self.inbox(id)?.queue.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gossip(origin: u64, round: u64) -> Message {
        Message::Gossip { origin: NodeId(origin), round }
    }

    fn channel(nodes: u64) -> MessageChannel {
        let mut channel = MessageChannel::new();
        for i in 0..nodes {
            channel.register(NodeId(i));
        }
        channel
    }

    #[test]
    fn nothing_visible_before_barrier() {
        let mut ch = channel(2);
        assert!(ch.send(NodeId(0), NodeId(1), gossip(0, 1)).unwrap());

        assert!(ch.drain(NodeId(1)).unwrap().is_empty());
        assert_eq!(ch.deliver(), 1);
        assert_eq!(ch.drain(NodeId(1)).unwrap().len(), 1);
        assert!(ch.drain(NodeId(1)).unwrap().is_empty());
    }

    #[test]
    fn fifo_across_senders() {
        let mut ch = channel(3);
        ch.send(NodeId(1), NodeId(0), gossip(1, 1)).unwrap();
        ch.send(NodeId(2), NodeId(0), gossip(2, 1)).unwrap();
        ch.send(NodeId(1), NodeId(0), gossip(1, 2)).unwrap();
        ch.deliver();

        let got: Vec<_> = ch.drain(NodeId(0)).unwrap().into_iter().map(|e| e.message).collect();
        assert_eq!(got, vec![gossip(1, 1), gossip(2, 1), gossip(1, 2)]);
    }

    #[test]
    fn unknown_recipient_is_an_error() {
        let mut ch = channel(1);
        assert_eq!(
            ch.send(NodeId(0), NodeId(7), gossip(0, 1)),
            Err(ConsensusError::UnknownNode(NodeId(7)))
        );
        assert_eq!(ch.drain(NodeId(7)), Err(ConsensusError::UnknownNode(NodeId(7))));
    }

    #[test]
    fn send_to_dead_node_is_dropped() {
        let mut ch = channel(2);
        ch.close(NodeId(1)).unwrap();

        assert!(!ch.send(NodeId(0), NodeId(1), gossip(0, 1)).unwrap());
        ch.deliver();
        assert!(ch.drain(NodeId(1)).unwrap().is_empty());
    }

    #[test]
    fn close_purges_in_flight_traffic() {
        let mut ch = channel(3);
        // Queued before death, from the dying node.
        ch.send(NodeId(1), NodeId(0), gossip(1, 1)).unwrap();
        ch.deliver();
        // Still buffered at death, both directions.
        ch.send(NodeId(1), NodeId(2), gossip(1, 2)).unwrap();
        ch.send(NodeId(2), NodeId(1), gossip(2, 1)).unwrap();
        ch.send(NodeId(2), NodeId(0), gossip(2, 2)).unwrap();

        assert_eq!(ch.close(NodeId(1)).unwrap(), 3);
        ch.deliver();

        assert!(ch.drain(NodeId(0)).unwrap().iter().all(|e| e.from != NodeId(1)));
        assert!(ch.drain(NodeId(2)).unwrap().is_empty());
        assert!(ch.is_closed(NodeId(1)));
    }

    #[test]
    fn dead_sender_cannot_send() {
        let mut ch = channel(2);
        ch.close(NodeId(0)).unwrap();
        assert!(!ch.send(NodeId(0), NodeId(1), gossip(0, 1)).unwrap());
        assert_eq!(ch.pending_len(), 0);
    }
}
