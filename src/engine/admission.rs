// src/engine/admission.rs

//! Admission control in front of the launcher.
//!
//! A bounded pool of run slots backed by a Tokio semaphore. With no bound
//! configured every run is admitted immediately.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Admission {
    slots: Option<Arc<Semaphore>>,
}

/// Held for the lifetime of one run; dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl Admission {
    /// `max_concurrent == 0` means unbounded.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            slots: (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent))),
        }
    }

    /// Admit immediately if a slot is free.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        match &self.slots {
            None => Some(AdmissionPermit { _permit: None }),
            Some(slots) => Arc::clone(slots)
                .try_acquire_owned()
                .ok()
                .map(|permit| AdmissionPermit {
                    _permit: Some(permit),
                }),
        }
    }

    /// Wait for a free slot.
    pub async fn admit(&self) -> AdmissionPermit {
        let permit = match &self.slots {
            None => None,
            Some(slots) => match Arc::clone(slots).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!("admission semaphore closed; admitting run without a slot");
                    None
                }
            },
        };
        AdmissionPermit { _permit: permit }
    }

    /// Free slots, or `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }
}
