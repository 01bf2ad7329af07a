//! Recording transport used by the session and subscription tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use movelink_protocol::DeviceDescriptor;

use crate::transport::{
    LinkEvent, NotificationSink, ScanResults, SubscriptionHandle, Transport, TransportError,
};
use crate::types::ScanSettings;

type GetReply = oneshot::Sender<Result<String, TransportError>>;

/// A subscription opened on the mock.
#[derive(Clone)]
pub(crate) struct MockSubscription {
    pub event_uri: String,
    pub contract: String,
    pub sink: NotificationSink,
    pub released: Arc<AtomicBool>,
}

impl MockSubscription {
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn notify(&self, body: &str) {
        let _ = self.sink.send(Ok(body.to_string()));
    }
}

struct MockHandle {
    released: Arc<AtomicBool>,
}

impl SubscriptionHandle for MockHandle {
    fn unsubscribe(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockState {
    scan_tx: Option<mpsc::UnboundedSender<Result<DeviceDescriptor, TransportError>>>,
    scan_error: Option<TransportError>,
    scans: usize,
    links: Vec<(String, mpsc::UnboundedSender<LinkEvent>)>,
    disconnects: Vec<String>,
    get_uris: Vec<String>,
    pending_gets: Vec<GetReply>,
    subscriptions: Vec<MockSubscription>,
    subscribe_error: Option<TransportError>,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_scan(&self, error: TransportError) {
        self.state.lock().unwrap().scan_error = Some(error);
    }

    pub fn fail_subscribe(&self, error: Option<TransportError>) {
        self.state.lock().unwrap().subscribe_error = error;
    }

    pub fn scans(&self) -> usize {
        self.state.lock().unwrap().scans
    }

    /// Emits a scan result. Returns false once the scan receiver is gone.
    pub fn found(&self, device: Result<DeviceDescriptor, TransportError>) -> bool {
        let state = self.state.lock().unwrap();
        state
            .scan_tx
            .as_ref()
            .is_some_and(|tx| tx.send(device).is_ok())
    }

    pub fn connects(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.links.iter().map(|(a, _)| a.clone()).collect()
    }

    /// Sends a link event on the most recent connect attempt for `address`.
    pub fn link(&self, address: &str, event: LinkEvent) {
        let state = self.state.lock().unwrap();
        let (_, tx) = state
            .links
            .iter()
            .rev()
            .find(|(a, _)| a == address)
            .expect("no connect attempt for address");
        let _ = tx.send(event);
    }

    /// Sends a link event on the `attempt`-th connect call, counting from 0.
    pub fn link_attempt(&self, attempt: usize, event: LinkEvent) {
        let state = self.state.lock().unwrap();
        let _ = state.links[attempt].1.send(event);
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.state.lock().unwrap().disconnects.clone()
    }

    pub fn get_uris(&self) -> Vec<String> {
        self.state.lock().unwrap().get_uris.clone()
    }

    /// Answers the oldest outstanding `get`.
    pub fn respond_get(&self, result: Result<String, TransportError>) {
        let reply = self.state.lock().unwrap().pending_gets.remove(0);
        let _ = reply.send(result);
    }

    pub fn subscriptions(&self) -> Vec<MockSubscription> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn contracts(&self) -> Vec<String> {
        self.subscriptions()
            .into_iter()
            .map(|s| s.contract)
            .collect()
    }

    pub fn live(&self) -> Vec<MockSubscription> {
        self.subscriptions()
            .into_iter()
            .filter(|s| !s.is_released())
            .collect()
    }

    /// The live subscription whose contract contains `needle`.
    pub fn live_for(&self, needle: &str) -> MockSubscription {
        self.live()
            .into_iter()
            .find(|s| s.contract.contains(needle))
            .expect("no live subscription")
    }
}

impl Transport for MockTransport {
    fn scan(&self, _settings: &ScanSettings) -> Result<ScanResults, TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.scan_error.clone() {
            return Err(e);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.scan_tx = Some(tx);
        state.scans += 1;
        Ok(rx)
    }

    fn connect(&self, address: &str, events: mpsc::UnboundedSender<LinkEvent>) {
        self.state
            .lock()
            .unwrap()
            .links
            .push((address.to_string(), events));
    }

    fn disconnect(&self, address: &str) {
        self.state
            .lock()
            .unwrap()
            .disconnects
            .push(address.to_string());
    }

    fn get(
        &self,
        uri: &str,
        _params: Option<&str>,
        reply: oneshot::Sender<Result<String, TransportError>>,
    ) {
        let mut state = self.state.lock().unwrap();
        state.get_uris.push(uri.to_string());
        state.pending_gets.push(reply);
    }

    fn subscribe(
        &self,
        event_uri: &str,
        contract: &str,
        notifications: NotificationSink,
    ) -> Result<Box<dyn SubscriptionHandle>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.subscribe_error.clone() {
            return Err(e);
        }
        let released = Arc::new(AtomicBool::new(false));
        state.subscriptions.push(MockSubscription {
            event_uri: event_uri.to_string(),
            contract: contract.to_string(),
            sink: notifications,
            released: released.clone(),
        });
        Ok(Box::new(MockHandle { released }))
    }
}

/// Lets spawned forwarding tasks run to completion on the test runtime.
pub(crate) async fn yield_many() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
