//! Device session orchestrating scan, connection and telemetry streams.
//!
//! One actor task owns all session state: connection state, the connected
//! device, negotiated ECG parameters, both subscriptions and the ECG ring
//! buffer. Transport callbacks, notification updates and caller requests
//! are all messages to that task, so state is only ever mutated in one
//! place. Telemetry is published through `watch` channels for the UI.
//!
//! Every connect attempt gets an epoch. Anything that arrives for an older
//! epoch (link events, the ECG info response) is dropped, which keeps a late
//! callback from resurrecting a connection that was already torn down.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use movelink_protocol::contract::ecg_info_uri;
use movelink_protocol::{Channel, DeviceDescriptor, decode_ecg_info};
use movelink_telemetry::{BatchFit, RingBuffer, TelemetryObserver, TelemetryPublisher};

use crate::error::SessionError;
use crate::subscriptions::{ChannelUpdate, SubscriptionManager};
use crate::transport::{LinkEvent, Transport, TransportError};
use crate::types::{ConnectedDevice, ConnectionState, EcgStreamParams, SessionConfig, SessionInfo};

const STATUS_CONNECTING: &str = "Connecting ... ";
const STATUS_CONNECTED: &str = "Connected";
const STATUS_CONNECTION_ERROR: &str = "Connection Error";
const STATUS_DISCONNECTED: &str = "Disconnected";
const STATUS_HR_SUBSCRIPTION_ERROR: &str = "HR Subscription Error";
const STATUS_ECG_SUBSCRIPTION_ERROR: &str = "ECG Subscription Error";

type FoundCallback = Box<dyn Fn(DeviceDescriptor) + Send + Sync>;
type ConnectedCallback = Box<dyn FnOnce() + Send>;

enum Command {
    StartScan {
        on_found: FoundCallback,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    StopScan {
        reply: oneshot::Sender<()>,
    },
    Connect {
        address: String,
        on_connected: ConnectedCallback,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Info {
        reply: oneshot::Sender<SessionInfo>,
    },
    Link {
        epoch: u64,
        address: String,
        event: LinkEvent,
    },
    EcgInfo {
        epoch: u64,
        serial: String,
        result: Result<String, TransportError>,
    },
    /// The scan stream with this id ended on its own.
    ScanEnded {
        scan: u64,
    },
}

/// Handle to a running device session.
///
/// Created with [`DeviceSession::spawn`]. All methods are cheap requests to
/// the session task; none of them wait on the radio. Dropping the handle
/// tears the session down.
pub struct DeviceSession {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    observer: TelemetryObserver,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceSession {
    /// Starts a session on `transport`. Must be called within a tokio runtime.
    ///
    /// Out-of-range sizes in `config` are clamped, see
    /// [`SessionConfig::sanitized`].
    pub fn spawn(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let config = config.sanitized();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shutdown = CancellationToken::new();

        let buffer = RingBuffer::new(config.ring_capacity);
        let telemetry = TelemetryPublisher::new(buffer.capacity());
        let observer = telemetry.observer();

        let actor = SessionActor {
            subscriptions: SubscriptionManager::new(transport.clone(), updates_tx),
            transport,
            config,
            commands: commands_tx.clone(),
            state: state_tx,
            epoch: 0,
            pending: None,
            device: None,
            params: None,
            buffer,
            telemetry,
            scan: None,
            scan_id: 0,
        };
        let task = tokio::spawn(actor.run(commands_rx, updates_rx, shutdown.clone()));

        Self {
            commands: commands_tx,
            state: state_rx,
            observer,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Read handle for the published telemetry.
    pub fn observe(&self) -> TelemetryObserver {
        self.observer.clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that wakes on every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Starts scanning; every discovered device is passed to `on_found`.
    ///
    /// Replaces a scan that is already running. `on_found` runs on a
    /// background task and must not block.
    pub async fn start_scan<F>(&self, on_found: F) -> Result<(), SessionError>
    where
        F: Fn(DeviceDescriptor) + Send + Sync + 'static,
    {
        self.request(|reply| Command::StartScan {
            on_found: Box::new(on_found),
            reply,
        })
        .await?
    }

    pub async fn stop_scan(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::StopScan { reply }).await
    }

    /// Starts connecting to `address`.
    ///
    /// Returns once the request is issued. `on_connected` is called exactly
    /// once, from the session task, when the device reports its serial; it
    /// is dropped uncalled if the attempt fails or is abandoned.
    pub async fn connect<F>(&self, address: &str, on_connected: F) -> Result<(), SessionError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.request(|reply| Command::Connect {
            address: address.to_string(),
            on_connected: Box::new(on_connected),
            reply,
        })
        .await?
    }

    /// Disconnects the connected device, if any.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Stops the scan, disconnects and releases both subscriptions.
    pub async fn clear(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Clear { reply }).await
    }

    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        self.request(|reply| Command::Info { reply }).await
    }

    pub async fn connected_device(&self) -> Result<Option<ConnectedDevice>, SessionError> {
        Ok(self.info().await?.device)
    }

    pub async fn stream_params(&self) -> Result<Option<EcgStreamParams>, SessionError> {
        Ok(self.info().await?.params)
    }

    /// Channels with a live subscription.
    pub async fn live_channels(&self) -> Result<Vec<Channel>, SessionError> {
        let info = self.info().await?;
        let live = [
            (Channel::HeartRate, info.hr_subscribed),
            (Channel::Ecg, info.ecg_subscribed),
        ];
        Ok(live
            .into_iter()
            .filter_map(|(channel, on)| on.then_some(channel))
            .collect())
    }

    /// Clears the session and stops its task. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.lock().await.take()
            && let Err(e) = task.await
        {
            error!("device session task failed: {e}");
        }
    }

    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct PendingConnect {
    address: String,
    on_connected: Option<ConnectedCallback>,
}

struct SessionActor {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    /// Used by forwarding tasks to feed transport callbacks back in.
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Sender<ConnectionState>,
    epoch: u64,
    pending: Option<PendingConnect>,
    device: Option<ConnectedDevice>,
    params: Option<EcgStreamParams>,
    subscriptions: SubscriptionManager,
    buffer: RingBuffer<i32>,
    telemetry: TelemetryPublisher,
    scan: Option<CancellationToken>,
    scan_id: u64,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut updates: mpsc::UnboundedReceiver<ChannelUpdate>,
        shutdown: CancellationToken,
    ) {
        loop {
            // Updates before commands: a query observes every notification
            // queued ahead of it.
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(update) = updates.recv() => self.on_update(update),
                Some(cmd) = commands.recv() => self.on_command(cmd),
                else => break,
            }
        }
        self.clear();
        debug!("device session stopped");
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::StartScan { on_found, reply } => {
                let _ = reply.send(self.start_scan(on_found));
            }
            Command::StopScan { reply } => {
                self.stop_scan();
                let _ = reply.send(());
            }
            Command::Connect {
                address,
                on_connected,
                reply,
            } => {
                let _ = reply.send(self.connect(address, on_connected));
            }
            Command::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            Command::Clear { reply } => {
                self.clear();
                let _ = reply.send(());
            }
            Command::Info { reply } => {
                let _ = reply.send(self.info());
            }
            Command::Link {
                epoch,
                address,
                event,
            } => self.on_link_event(epoch, address, event),
            Command::EcgInfo {
                epoch,
                serial,
                result,
            } => self.on_ecg_info(epoch, serial, result),
            Command::ScanEnded { scan } => {
                if scan == self.scan_id && self.scan.take().is_some() {
                    debug!("scan stream ended");
                }
            }
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            state: *self.state.borrow(),
            device: self.device.clone(),
            pending_address: self.pending.as_ref().map(|p| p.address.clone()),
            params: self.params,
            hr_subscribed: self.subscriptions.has_live(Channel::HeartRate),
            ecg_subscribed: self.subscriptions.has_live(Channel::Ecg),
            scanning: self.scan.is_some(),
        }
    }

    fn set_state(&self, new_state: ConnectionState) {
        let changed = self.state.send_if_modified(|s| {
            let changed = *s != new_state;
            *s = new_state;
            changed
        });
        if changed {
            debug!(state = ?new_state, "connection state changed");
        }
    }

    // --- Scan ---

    fn start_scan(&mut self, on_found: FoundCallback) -> Result<(), SessionError> {
        self.stop_scan();
        info!("scanning");
        let mut results = match self.transport.scan(&self.config.scan) {
            Ok(rx) => rx,
            Err(e) => {
                error!(error = %e, "scan error");
                return Err(e.into());
            }
        };

        let cancel = CancellationToken::new();
        self.scan = Some(cancel.clone());
        self.scan_id += 1;
        let scan = self.scan_id;
        let commands = self.commands.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    item = results.recv() => item,
                };
                match next {
                    Some(Ok(device)) => {
                        debug!(
                            address = %device.address,
                            name = %device.name,
                            rssi = device.rssi,
                            "device found"
                        );
                        on_found(device);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "scan error");
                        let _ = commands.send(Command::ScanEnded { scan });
                        break;
                    }
                    None => {
                        let _ = commands.send(Command::ScanEnded { scan });
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    fn stop_scan(&mut self) {
        if let Some(cancel) = self.scan.take() {
            info!("stopping scan");
            cancel.cancel();
        }
    }

    // --- Connection ---

    fn connect(
        &mut self,
        address: String,
        on_connected: ConnectedCallback,
    ) -> Result<(), SessionError> {
        if let Some(pending) = &self.pending {
            warn!(
                address = %address,
                pending = %pending.address,
                "connect rejected, attempt in flight"
            );
            return Err(SessionError::ConnectInFlight(pending.address.clone()));
        }
        if let Some(device) = &self.device {
            warn!(
                address = %address,
                connected = %device.address,
                "connect rejected, already connected"
            );
            return Err(SessionError::AlreadyConnected(device.address.clone()));
        }

        self.epoch += 1;
        let epoch = self.epoch;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let commands = self.commands.clone();
        let link_address = address.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let cmd = Command::Link {
                    epoch,
                    address: link_address.clone(),
                    event,
                };
                if commands.send(cmd).is_err() {
                    break;
                }
            }
        });

        info!(address = %address, "connecting to device");
        self.transport.connect(&address, events_tx);
        self.pending = Some(PendingConnect {
            address,
            on_connected: Some(on_connected),
        });
        Ok(())
    }

    fn on_link_event(&mut self, epoch: u64, address: String, event: LinkEvent) {
        if epoch != self.epoch {
            let in_use = self.device.as_ref().is_some_and(|d| d.address == address)
                || self.pending.as_ref().is_some_and(|p| p.address == address);
            if let LinkEvent::Connected { serial } = &event
                && !in_use
            {
                // The attempt was abandoned but the link came up anyway.
                warn!(
                    address = %address,
                    serial = %serial,
                    "stale connection completed, dropping link"
                );
                self.transport.disconnect(&address);
            } else {
                trace!(address = %address, ?event, "dropping stale link event");
            }
            return;
        }

        match event {
            LinkEvent::Connecting if self.device.is_some() => {
                debug!(address = %address, "connecting reported after connect, ignoring");
            }
            LinkEvent::Connecting => {
                info!(address = %address, "connection in progress");
                self.set_state(ConnectionState::Connecting);
                self.telemetry.post_status(STATUS_CONNECTING);
            }
            LinkEvent::Connected { serial } => self.on_connected(address, serial),
            LinkEvent::Error(e) => {
                error!(address = %address, error = %e, "connection error");
                self.teardown();
                self.telemetry.post_status(STATUS_CONNECTION_ERROR);
            }
            LinkEvent::Disconnected => {
                warn!(address = %address, "disconnected by device");
                self.teardown();
                if self.config.announce_device_disconnect {
                    self.telemetry.post_status(STATUS_DISCONNECTED);
                }
            }
        }
    }

    fn on_connected(&mut self, address: String, serial: String) {
        if self.device.is_some() {
            debug!(address = %address, "duplicate connection complete, ignoring");
            return;
        }
        let on_connected = self.pending.take().and_then(|p| p.on_connected);

        info!(address = %address, serial = %serial, "connected");
        self.device = Some(ConnectedDevice {
            address,
            serial: serial.clone(),
        });
        self.set_state(ConnectionState::Connected);
        self.telemetry.set_connected(true);
        self.telemetry.post_status(STATUS_CONNECTED);

        self.fetch_ecg_info(serial);
        if let Some(callback) = on_connected {
            callback();
        }
    }

    fn fetch_ecg_info(&self, serial: String) {
        let uri = ecg_info_uri(&serial);
        let (reply, rx) = oneshot::channel();
        let commands = self.commands.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = rx.await.unwrap_or(Err(TransportError::Closed));
            let _ = commands.send(Command::EcgInfo {
                epoch,
                serial,
                result,
            });
        });

        debug!(uri = %uri, "requesting ECG info");
        self.transport.get(&uri, None, reply);
    }

    fn on_ecg_info(
        &mut self,
        epoch: u64,
        serial: String,
        result: Result<String, TransportError>,
    ) {
        let current = self.device.as_ref().is_some_and(|d| d.serial == serial);
        if epoch != self.epoch || !current {
            debug!(serial = %serial, "ECG info for a closed connection, ignoring");
            return;
        }

        let default = self.config.default_batch_size;
        let reported = match result {
            Ok(body) => match decode_ecg_info(&body) {
                Ok(info) => {
                    debug!(?info, "ECG info");
                    info.batch_size_or(default)
                }
                Err(e) => {
                    warn!(error = %e, "ECG info parsing error, using default batch size");
                    default
                }
            },
            Err(e) => {
                warn!(error = %e, "ECG info read error, using default batch size");
                default
            }
        };
        let batch_size = if reported > self.buffer.capacity() {
            warn!(
                reported,
                capacity = self.buffer.capacity(),
                "ECG batch size exceeds buffer, clamping"
            );
            self.buffer.capacity()
        } else {
            reported
        };

        let params = EcgStreamParams {
            batch_size,
            sample_rate: self.config.sample_rate,
        };
        info!(batch_size, sample_rate = params.sample_rate, "ECG stream parameters set");
        self.params = Some(params);

        if self.subscriptions.subscribe_hr(&serial).is_err() {
            self.telemetry.post_status(STATUS_HR_SUBSCRIPTION_ERROR);
        }
        if self
            .subscriptions
            .subscribe_ecg(&serial, params.sample_rate)
            .is_err()
        {
            self.telemetry.post_status(STATUS_ECG_SUBSCRIPTION_ERROR);
        }
    }

    /// User-initiated disconnect. Only acts while a device is connected.
    fn disconnect(&mut self) {
        let Some(device) = self.device.clone() else {
            debug!("disconnect requested with no connected device");
            return;
        };
        info!(address = %device.address, "disconnecting");
        self.teardown();
        self.transport.disconnect(&device.address);
    }

    /// Drops everything tied to the current connection. Later callbacks
    /// for it are stale.
    fn teardown(&mut self) {
        self.epoch += 1;
        self.pending = None;
        self.device = None;
        self.params = None;
        self.subscriptions.unsubscribe_all();
        self.set_state(ConnectionState::Disconnected);
        self.telemetry.set_connected(false);
    }

    fn clear(&mut self) {
        self.stop_scan();
        self.disconnect();
        self.subscriptions.unsubscribe_all();
        if let Some(pending) = self.pending.take() {
            info!(address = %pending.address, "abandoning connection attempt");
            self.teardown();
        }
    }

    // --- Telemetry ---

    fn on_update(&mut self, update: ChannelUpdate) {
        if !self.subscriptions.is_live(update.channel(), update.id()) {
            trace!(id = %update.id(), "dropping update from released subscription");
            return;
        }

        match update {
            ChannelUpdate::HeartRate { result: Ok(hr), .. } => {
                if let Some(average) = hr.average {
                    self.telemetry.set_average_heart_rate(average);
                }
                match hr.latest_rr() {
                    Ok(rr) => self.telemetry.set_rr_interval(rr),
                    Err(e) => warn!(error = %e, "RR interval error"),
                }
            }
            ChannelUpdate::HeartRate { result: Err(e), .. } => {
                warn!(error = %e, "HR parsing error");
            }
            ChannelUpdate::Ecg { result: Ok(batch), .. } => self.append_ecg(&batch.samples),
            ChannelUpdate::Ecg { result: Err(e), .. } => {
                warn!(error = %e, "ECG parsing error");
            }
            ChannelUpdate::Failed { channel, error, .. } => {
                error!(channel = channel.label(), error = %error, "subscription error");
            }
        }
    }

    fn append_ecg(&mut self, samples: &[i32]) {
        let batch_size = self
            .params
            .map_or(self.config.default_batch_size, |p| p.batch_size);
        match self.buffer.append_batch(batch_size, samples) {
            Ok(BatchFit::Exact) => {}
            Ok(fit) => {
                warn!(
                    ?fit,
                    batch_size,
                    received = samples.len(),
                    "ECG batch length mismatch"
                );
            }
            Err(e) => {
                warn!(error = %e, "dropping ECG batch");
                return;
            }
        }
        self.telemetry.publish_ecg(&self.buffer);
    }
}
