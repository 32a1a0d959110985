//! In-memory transport for tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::MugCharacteristic;
use crate::transport::{DeviceSlot, Transport, TransportEvent};

pub(crate) const MOCK_LABEL: &str = "Mock Mug (00:00:00:00:00:00)";

pub(crate) struct MockState {
    pub device: DeviceSlot<String>,
    pub connected: bool,
    pub connect_calls: usize,
    pub disconnect_calls: usize,
    pub connect_delay: Option<Duration>,
    pub fail_connect: bool,
    pub fail_write: bool,
    pub reads: Vec<Uuid>,
    pub writes: Vec<(Uuid, Bytes)>,
    pub notifying: HashSet<Uuid>,
    pub responses: HashMap<Uuid, Bytes>,
    pub event_tx: Option<mpsc::Sender<TransportEvent>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            device: DeviceSlot::new(MOCK_LABEL.to_owned()),
            connected: false,
            connect_calls: 0,
            disconnect_calls: 0,
            connect_delay: None,
            fail_connect: false,
            fail_write: false,
            reads: Vec::new(),
            writes: Vec::new(),
            notifying: HashSet::new(),
            responses: HashMap::new(),
            event_tx: None,
        }
    }
}

/// Mock transport. Clones share state, so a test keeps one clone for
/// inspection while the session owns the other.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    pub state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        let mock = Self::new();
        mock.state.lock().connected = true;
        mock
    }

    pub fn respond(&self, characteristic: MugCharacteristic, value: &[u8]) {
        self.state
            .lock()
            .responses
            .insert(characteristic.uuid(), Bytes::copy_from_slice(value));
    }

    pub fn reads(&self) -> Vec<MugCharacteristic> {
        self.state
            .lock()
            .reads
            .iter()
            .filter_map(|uuid| MugCharacteristic::from_uuid(*uuid))
            .collect()
    }

    pub fn writes(&self) -> Vec<(MugCharacteristic, Bytes)> {
        self.state
            .lock()
            .writes
            .iter()
            .filter_map(|(uuid, data)| {
                MugCharacteristic::from_uuid(*uuid).map(|c| (c, data.clone()))
            })
            .collect()
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().disconnect_calls
    }

    pub async fn inject(&self, event: TransportEvent) {
        let tx = self.state.lock().event_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }
}

impl Transport for MockTransport {
    type Device = String;

    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let delay = {
                let mut state = self.state.lock();
                state.connect_calls += 1;
                state.connect_delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock();
            state.device.activate_pending();
            if state.fail_connect {
                return Err(Error::NotConnected);
            }
            state.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.disconnect_calls += 1;
            state.connected = false;
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn read(
        &mut self,
        characteristic: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.reads.push(characteristic);
            state
                .responses
                .get(&characteristic)
                .cloned()
                .ok_or(Error::CharacteristicNotFound {
                    uuid: characteristic,
                })
        })
    }

    fn write(
        &mut self,
        characteristic: Uuid,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            if state.fail_write {
                return Err(Error::NotConnected);
            }
            state.writes.push((characteristic, data));
            Ok(())
        })
    }

    fn start_notify(
        &mut self,
        characteristic: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().notifying.insert(characteristic);
            Ok(())
        })
    }

    fn stop_notify(
        &mut self,
        characteristic: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().notifying.remove(&characteristic);
            Ok(())
        })
    }

    fn set_event_sender(&mut self, tx: mpsc::Sender<TransportEvent>) {
        self.state.lock().event_tx = Some(tx);
    }

    fn describe(&self) -> String {
        self.state.lock().device.current().clone()
    }

    fn set_device(&mut self, device: String) {
        let mut state = self.state.lock();
        let connected = state.connected;
        state.device.replace(device, connected);
    }
}
