use tokio::sync::Mutex;

/// Sequence behind the synthetic document ids.
///
/// Starts at zero on every process start and is never persisted, so ids
/// from a previous run may still be live in the store.
#[derive(Debug, Default)]
pub struct DocumentCounter {
    value: Mutex<u64>,
}

impl DocumentCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(value: u64) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Increments and returns the new value in one critical section.
    pub async fn advance(&self) -> u64 {
        let mut value = self.value.lock().await;
        *value += 1;
        *value
    }

    pub async fn current(&self) -> u64 {
        *self.value.lock().await
    }
}
