//! MemorySink - collects messages in process

use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{ContractError, DataSink, DriverMessage, Topic};

/// Sink that keeps every message it receives
pub struct MemorySink {
    name: String,
    store: Arc<Mutex<Vec<DriverMessage>>>,
}

/// Read side of a [`MemorySink`]
#[derive(Clone)]
pub struct MemorySinkReader {
    store: Arc<Mutex<Vec<DriverMessage>>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> (Self, MemorySinkReader) {
        let store = Arc::new(Mutex::new(Vec::new()));
        let reader = MemorySinkReader {
            store: Arc::clone(&store),
        };
        (
            Self {
                name: name.into(),
                store,
            },
            reader,
        )
    }
}

impl MemorySinkReader {
    fn lock(&self) -> MutexGuard<'_, Vec<DriverMessage>> {
        // A poisoned store still holds valid messages
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Everything received so far
    pub fn messages(&self) -> Vec<DriverMessage> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn count(&self, topic: Topic) -> usize {
        self.lock().iter().filter(|m| m.topic() == topic).count()
    }
}

impl DataSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, message: &DriverMessage) -> Result<(), ContractError> {
        self.store
            .lock()
            .map_err(|_| ContractError::sink_write(&self.name, "store poisoned"))?
            .push(message.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
