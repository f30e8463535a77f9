use std::sync::{Condvar, Mutex};

use super::lock;
use crate::asset::Bitmap;
use crate::error::DecodeFailure;

pub(crate) type FlightResult = Result<Bitmap, DecodeFailure>;

/// One in-progress load that other callers for the same key wait on
pub(crate) struct InFlight {
    result: Mutex<Option<FlightResult>>,
    cv: Condvar,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self {
            result: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    pub(crate) fn set(&self, result: FlightResult) {
        let mut slot = lock(&self.result);
        if slot.is_none() {
            *slot = Some(result);
        }
        self.cv.notify_all();
    }

    pub(crate) fn wait(&self) -> FlightResult {
        let mut guard = lock(&self.result);
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            guard = self
                .cv
                .wait(guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}
