use crate::error::{ClientError, Result};
use crate::media::{LocalTrack, SyntheticDevices};
use crate::peer::SessionLinks;
use crate::signaling::SignalingSink;
use crate::transport::{PeerKey, PeerTransport, SenderId, TransportEvent, TransportFactory};
use async_trait::async_trait;
use playback_core::{ClientMessage, IceCandidate, RoomId, SessionDescription};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Transport that records every call. It succeeds unless told to reject.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<String>>,
    offers: AtomicUsize,
    pub reject_candidates: AtomicBool,
    pub reject_offers: AtomicBool,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerTransport for RecordingTransport {
    async fn create_offer(&self) -> Result<SessionDescription> {
        if self.reject_offers.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("offer rejected".to_owned()));
        }
        let n = self.offers.fetch_add(1, Ordering::SeqCst);
        self.record("create_offer".to_owned());
        Ok(SessionDescription::offer(format!("offer-{n}")))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record("create_answer".to_owned());
        Ok(SessionDescription::answer("answer"))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.record(format!("set_remote:{}", description.sdp));
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.record("rollback".to_owned());
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if self.reject_candidates.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("candidate rejected".to_owned()));
        }
        self.record(format!("candidate:{}", candidate.candidate));
        Ok(())
    }

    async fn add_track(&self, track: &LocalTrack) -> Result<SenderId> {
        self.record(format!("add_track:{}", track.id()));
        Ok(SenderId(track.id().to_owned()))
    }

    async fn remove_track(&self, sender: &SenderId) -> Result<()> {
        self.record(format!("remove_track:{}", sender.0));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record("close".to_owned());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingFactory {
    created: Mutex<Vec<(PeerKey, Arc<RecordingTransport>)>>,
    /// Transports created from now on reject `create_offer`.
    pub reject_offers: AtomicBool,
}

impl RecordingFactory {
    /// Most recent transport created for `key`.
    pub fn transport(&self, key: &PeerKey) -> Option<Arc<RecordingTransport>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, t)| t.clone())
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl TransportFactory for RecordingFactory {
    async fn create(
        &self,
        key: PeerKey,
        _events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport = Arc::new(RecordingTransport::default());
        transport
            .reject_offers
            .store(self.reject_offers.load(Ordering::SeqCst), Ordering::SeqCst);
        self.created.lock().unwrap().push((key, transport.clone()));
        Ok(transport)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<ClientMessage>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(|m| m.kind()).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl SignalingSink for RecordingSink {
    fn send(&self, message: ClientMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct TestLinks {
    pub links: SessionLinks,
    pub sink: Arc<RecordingSink>,
    pub factory: Arc<RecordingFactory>,
    pub devices: Arc<SyntheticDevices>,
    pub transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

pub fn test_links() -> TestLinks {
    let sink = Arc::new(RecordingSink::default());
    let factory = Arc::new(RecordingFactory::default());
    let devices = Arc::new(SyntheticDevices::new());
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();

    TestLinks {
        links: SessionLinks {
            room_id: RoomId::new("demo").unwrap(),
            signaling: sink.clone(),
            factory: factory.clone(),
            devices: devices.clone(),
            transport_tx,
        },
        sink,
        factory,
        devices,
        transport_rx,
    }
}
