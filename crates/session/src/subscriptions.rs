//! Heart-rate and ECG subscription ownership.
//!
//! At most one live handle per channel. Each live subscription has a
//! forwarding task that decodes notification bodies and hands the records
//! to the session as [`ChannelUpdate`]s tagged with the subscription id, so
//! the session can drop anything that arrives from a released handle.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use movelink_protocol::constants::URI_EVENT_LISTENER;
use movelink_protocol::contract::{ecg_contract, hr_contract};
use movelink_protocol::{Channel, DecodeError, EcgBatch, HeartRate, decode_ecg_batch, decode_hr};

use crate::transport::{SubscriptionHandle, Transport, TransportError};

/// Identifies one subscription across its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A decoded notification (or stream error) from one subscription.
#[derive(Debug)]
pub enum ChannelUpdate {
    HeartRate {
        id: SubscriptionId,
        result: Result<HeartRate, DecodeError>,
    },
    Ecg {
        id: SubscriptionId,
        result: Result<EcgBatch, DecodeError>,
    },
    /// The transport reported an error on an open stream.
    Failed {
        channel: Channel,
        id: SubscriptionId,
        error: TransportError,
    },
}

impl ChannelUpdate {
    pub fn id(&self) -> SubscriptionId {
        match self {
            Self::HeartRate { id, .. } | Self::Ecg { id, .. } | Self::Failed { id, .. } => *id,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Self::HeartRate { .. } => Channel::HeartRate,
            Self::Ecg { .. } => Channel::Ecg,
            Self::Failed { channel, .. } => *channel,
        }
    }
}

struct LiveSubscription {
    id: SubscriptionId,
    handle: Box<dyn SubscriptionHandle>,
    cancel: CancellationToken,
}

/// Owns the heart-rate and ECG subscription handles.
///
/// Must be used from within a tokio runtime; subscribing spawns the
/// forwarding task.
pub struct SubscriptionManager {
    transport: Arc<dyn Transport>,
    updates: mpsc::UnboundedSender<ChannelUpdate>,
    next_id: u64,
    hr: Option<LiveSubscription>,
    ecg: Option<LiveSubscription>,
}

impl SubscriptionManager {
    /// Creates a manager that forwards decoded notifications to `updates`.
    pub fn new(
        transport: Arc<dyn Transport>,
        updates: mpsc::UnboundedSender<ChannelUpdate>,
    ) -> Self {
        Self {
            transport,
            updates,
            next_id: 0,
            hr: None,
            ecg: None,
        }
    }

    /// Subscribes to the heart-rate stream of `serial`, replacing any
    /// existing heart-rate subscription.
    pub fn subscribe_hr(&mut self, serial: &str) -> Result<SubscriptionId, TransportError> {
        self.unsubscribe_hr();
        let contract = hr_contract(serial);
        info!(contract = %contract, "subscribing to HR");
        self.open(Channel::HeartRate, &contract)
    }

    /// Subscribes to the ECG stream of `serial` at `sample_rate`, replacing
    /// any existing ECG subscription.
    pub fn subscribe_ecg(
        &mut self,
        serial: &str,
        sample_rate: u32,
    ) -> Result<SubscriptionId, TransportError> {
        self.unsubscribe_ecg();
        let contract = ecg_contract(serial, sample_rate);
        info!(contract = %contract, "subscribing to ECG");
        self.open(Channel::Ecg, &contract)
    }

    /// Releases the heart-rate subscription. Returns false if there was none.
    pub fn unsubscribe_hr(&mut self) -> bool {
        self.release(Channel::HeartRate)
    }

    /// Releases the ECG subscription. Returns false if there was none.
    pub fn unsubscribe_ecg(&mut self) -> bool {
        self.release(Channel::Ecg)
    }

    pub fn unsubscribe_all(&mut self) {
        self.unsubscribe_hr();
        self.unsubscribe_ecg();
    }

    /// Whether `id` is the live subscription for `channel`.
    pub fn is_live(&self, channel: Channel, id: SubscriptionId) -> bool {
        self.slot(channel).as_ref().is_some_and(|s| s.id == id)
    }

    pub fn has_live(&self, channel: Channel) -> bool {
        self.slot(channel).is_some()
    }

    fn slot(&self, channel: Channel) -> &Option<LiveSubscription> {
        match channel {
            Channel::HeartRate => &self.hr,
            Channel::Ecg => &self.ecg,
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut Option<LiveSubscription> {
        match channel {
            Channel::HeartRate => &mut self.hr,
            Channel::Ecg => &mut self.ecg,
        }
    }

    fn open(
        &mut self,
        channel: Channel,
        contract: &str,
    ) -> Result<SubscriptionId, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = match self.transport.subscribe(URI_EVENT_LISTENER, contract, tx) {
            Ok(h) => h,
            Err(e) => {
                warn!(channel = channel.label(), error = %e, "subscription failed");
                return Err(e);
            }
        };

        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let cancel = CancellationToken::new();
        tokio::spawn(forward_notifications(
            channel,
            id,
            rx,
            self.updates.clone(),
            cancel.clone(),
        ));

        debug!(channel = channel.label(), %id, "subscription live");
        *self.slot_mut(channel) = Some(LiveSubscription { id, handle, cancel });
        Ok(id)
    }

    fn release(&mut self, channel: Channel) -> bool {
        match self.slot_mut(channel).take() {
            Some(mut live) => {
                info!(channel = channel.label(), id = %live.id, "unsubscribing");
                live.cancel.cancel();
                live.handle.unsubscribe();
                true
            }
            None => {
                debug!(channel = channel.label(), "no subscription to release");
                false
            }
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

/// Decodes notification bodies for one subscription until it is released
/// or the transport closes the stream.
async fn forward_notifications(
    channel: Channel,
    id: SubscriptionId,
    mut rx: mpsc::UnboundedReceiver<Result<String, TransportError>>,
    updates: mpsc::UnboundedSender<ChannelUpdate>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = rx.recv() => msg,
        };

        let update = match next {
            Some(Ok(body)) => {
                trace!(channel = channel.label(), %id, len = body.len(), "notification");
                match channel {
                    Channel::HeartRate => ChannelUpdate::HeartRate {
                        id,
                        result: decode_hr(&body),
                    },
                    Channel::Ecg => ChannelUpdate::Ecg {
                        id,
                        result: decode_ecg_batch(&body),
                    },
                }
            }
            Some(Err(error)) => ChannelUpdate::Failed { channel, id, error },
            None => {
                debug!(channel = channel.label(), %id, "notification stream closed");
                break;
            }
        };

        if updates.send(update).is_err() {
            break;
        }
    }
}
