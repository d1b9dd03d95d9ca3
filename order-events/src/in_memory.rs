//! Process-local channel with durable-subscription semantics.
//!
//! Every published payload gets a stream sequence starting at 1. Each durable
//! name keeps its own cursor: a queue of pending sequences, the set currently
//! in flight, and the list it has acknowledged. A negative acknowledgment
//! puts the message back at the front of the queue. Re-subscribing under an
//! existing durable name requeues whatever was left in flight.

use crate::{Delivery, Publisher, Subscription};
use async_trait::async_trait;
use order_core::ChannelError;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct DurableState {
    pending: VecDeque<u64>,
    in_flight: BTreeSet<u64>,
    acked: Vec<u64>,
    naks: usize,
    notify: Arc<Notify>,
}

#[derive(Debug, Default)]
struct ChannelState {
    log: Vec<Arc<[u8]>>,
    durables: HashMap<String, DurableState>,
    closed: bool,
}

impl ChannelState {
    fn payload(&self, sequence: u64) -> Option<Arc<[u8]>> {
        let index = usize::try_from(sequence).ok()?.checked_sub(1)?;
        self.log.get(index).cloned()
    }
}

/// In-memory durable channel. Cloning yields another handle to the same channel.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChannel {
    state: Arc<Mutex<ChannelState>>,
    fail_acks: Arc<AtomicBool>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or resume) the durable subscription `durable`.
    ///
    /// A new durable starts at the first message in the log.
    pub fn subscribe(&self, durable: &str) -> InMemorySubscription {
        let mut state = self.lock();
        let total = state.log.len() as u64;
        let durable_state = match state.durables.entry(durable.to_string()) {
            Entry::Occupied(occupied) => {
                let ds = occupied.into_mut();
                let unacked: Vec<u64> = std::mem::take(&mut ds.in_flight).into_iter().collect();
                for sequence in unacked.into_iter().rev() {
                    ds.pending.push_front(sequence);
                }
                ds
            }
            Entry::Vacant(vacant) => {
                let ds = vacant.insert(DurableState::default());
                ds.pending.extend(1..=total);
                ds
            }
        };
        let notify = Arc::clone(&durable_state.notify);

        InMemorySubscription {
            channel: self.clone(),
            durable: durable.to_string(),
            notify,
        }
    }

    /// Publish without going through the async trait.
    pub fn publish_now(&self, payload: impl Into<Vec<u8>>) -> Result<u64, ChannelError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChannelError::Closed);
        }
        let payload: Arc<[u8]> = Arc::from(payload.into());
        state.log.push(payload);
        let sequence = state.log.len() as u64;
        for ds in state.durables.values_mut() {
            ds.pending.push_back(sequence);
            ds.notify.notify_one();
        }
        Ok(sequence)
    }

    /// Stop accepting publishes. Subscribers drain what is pending, then end.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        for ds in state.durables.values() {
            ds.notify.notify_one();
        }
    }

    /// Make every subsequent ack fail while leaving the message in flight.
    pub fn set_fail_acks(&self, fail: bool) {
        self.fail_acks.store(fail, Ordering::SeqCst);
    }

    /// Sequences acknowledged by `durable`, in ack order.
    pub fn acked(&self, durable: &str) -> Vec<u64> {
        self.lock()
            .durables
            .get(durable)
            .map(|ds| ds.acked.clone())
            .unwrap_or_default()
    }

    /// Messages waiting to be delivered to `durable`.
    pub fn pending(&self, durable: &str) -> usize {
        self.lock()
            .durables
            .get(durable)
            .map(|ds| ds.pending.len())
            .unwrap_or(0)
    }

    /// Messages delivered to `durable` but not yet acknowledged.
    pub fn in_flight(&self, durable: &str) -> usize {
        self.lock()
            .durables
            .get(durable)
            .map(|ds| ds.in_flight.len())
            .unwrap_or(0)
    }

    /// Negative acknowledgments received from `durable`.
    pub fn nak_count(&self, durable: &str) -> usize {
        self.lock()
            .durables
            .get(durable)
            .map(|ds| ds.naks)
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Publisher for InMemoryChannel {
    async fn publish(&self, payload: Vec<u8>) -> Result<u64, ChannelError> {
        self.publish_now(payload)
    }
}

/// Durable subscription handle on an [`InMemoryChannel`].
#[derive(Debug)]
pub struct InMemorySubscription {
    channel: InMemoryChannel,
    durable: String,
    notify: Arc<Notify>,
}

impl InMemorySubscription {
    pub fn durable(&self) -> &str {
        &self.durable
    }

    fn try_next(&self) -> Option<Option<InMemoryDelivery>> {
        let mut state = self.channel.lock();
        let closed = state.closed;
        let ds = state.durables.get_mut(&self.durable)?;
        match ds.pending.pop_front() {
            Some(sequence) => {
                ds.in_flight.insert(sequence);
                let payload = state.payload(sequence).unwrap_or_else(|| Arc::from(Vec::new()));
                Some(Some(InMemoryDelivery {
                    channel: self.channel.clone(),
                    durable: self.durable.clone(),
                    sequence,
                    payload,
                }))
            }
            None if closed => Some(None),
            None => None,
        }
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    type Delivery = InMemoryDelivery;

    async fn next(&mut self) -> Option<Result<InMemoryDelivery, ChannelError>> {
        loop {
            match self.try_next() {
                Some(Some(delivery)) => return Some(Ok(delivery)),
                Some(None) => return None,
                None => self.notify.notified().await,
            }
        }
    }
}

/// One message delivered from an [`InMemoryChannel`].
#[derive(Debug)]
pub struct InMemoryDelivery {
    channel: InMemoryChannel,
    durable: String,
    sequence: u64,
    payload: Arc<[u8]>,
}

impl InMemoryDelivery {
    fn settle(&self, requeue: bool) -> Result<(), ChannelError> {
        let mut state = self.channel.lock();
        let ds = state
            .durables
            .get_mut(&self.durable)
            .ok_or_else(|| ChannelError::AckFailed {
                sequence: self.sequence,
                reason: format!("unknown durable {}", self.durable),
            })?;
        if !ds.in_flight.remove(&self.sequence) {
            return Err(ChannelError::AckFailed {
                sequence: self.sequence,
                reason: "message is not in flight".to_string(),
            });
        }
        if requeue {
            ds.naks += 1;
            ds.pending.push_front(self.sequence);
            ds.notify.notify_one();
        } else {
            ds.acked.push(self.sequence);
        }
        Ok(())
    }
}

#[async_trait]
impl Delivery for InMemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn sequence(&self) -> u64 {
        self.sequence
    }

    async fn ack(&self) -> Result<(), ChannelError> {
        if self.channel.fail_acks.load(Ordering::SeqCst) {
            return Err(ChannelError::AckFailed {
                sequence: self.sequence,
                reason: "injected failure".to_string(),
            });
        }
        self.settle(false)
    }

    async fn nak(&self) -> Result<(), ChannelError> {
        self.settle(true)
    }
}
