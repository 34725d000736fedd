// Per-credential admission control for upstream backends.
//
// Every live adapter acquires a permit before each upstream call. Gates are
// keyed by (service, credential fingerprint) and shared across jobs, so many
// concurrent jobs on one key cannot exceed the configured cap.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// A bounded slot pool for one credential on one service.
#[derive(Clone)]
pub struct AdmissionGate {
    service: &'static str,
    semaphore: Arc<Semaphore>,
}

impl AdmissionGate {
    pub fn new(service: &'static str, permits: usize) -> Self {
        Self {
            service,
            semaphore: Arc::new(Semaphore::new(permits.max(1))),
        }
    }

    /// Wait for a slot. The slot is released when the permit drops.
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit> {
        if self.semaphore.available_permits() == 0 {
            debug!(service = self.service, "Backend at capacity, waiting for a slot");
        }
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow::anyhow!("{} admission gate closed", self.service))
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Registry handing out one shared gate per (service, credential).
pub struct AdmissionControl {
    permits: usize,
    gates: Mutex<HashMap<(&'static str, u64), AdmissionGate>>,
}

impl AdmissionControl {
    pub fn new(permits_per_credential: usize) -> Self {
        Self {
            permits: permits_per_credential.max(1),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn gate(&self, service: &'static str, credential: &str) -> AdmissionGate {
        let key = (service, fingerprint(credential));
        let mut gates = self.gates.lock().expect("admission lock poisoned");
        gates
            .entry(key)
            .or_insert_with(|| AdmissionGate::new(service, self.permits))
            .clone()
    }
}

/// Keys are never stored in the clear.
fn fingerprint(credential: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    credential.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_credential_shares_one_gate() {
        let control = AdmissionControl::new(2);
        let a = control.gate("openai", "sk-one");
        let b = control.gate("openai", "sk-one");

        let _permit = a.admit().await.unwrap();
        assert_eq!(b.available(), 1);
    }

    #[tokio::test]
    async fn different_credentials_are_independent() {
        let control = AdmissionControl::new(1);
        let a = control.gate("openai", "sk-one");
        let b = control.gate("openai", "sk-two");
        let c = control.gate("tavily", "sk-one");

        let _permit = a.admit().await.unwrap();
        assert_eq!(b.available(), 1);
        assert_eq!(c.available(), 1);
    }

    #[tokio::test]
    async fn permits_release_on_drop() {
        let gate = AdmissionGate::new("places", 1);
        {
            let _permit = gate.admit().await.unwrap();
            assert_eq!(gate.available(), 0);
        }
        assert_eq!(gate.available(), 1);
    }
}
