//! Single-slot pitch handoff between an audio capture thread and the
//! update loop.
//!
//! The slot holds at most one estimate. Publishing overwrites whatever the
//! update loop has not picked up yet, and taking empties the slot, so the
//! loop never sees a value twice and never falls behind a backlog.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::EstimatorConfig;
use crate::pitch::PitchEstimator;

pub struct PitchPublisher {
    tx: Sender<f32>,
    // Used only to discard the stale value before publishing.
    stale: Receiver<f32>,
}

pub struct PitchSubscriber {
    rx: Receiver<f32>,
}

pub fn latest_sample_slot() -> (PitchPublisher, PitchSubscriber) {
    let (tx, rx) = bounded(1);
    (
        PitchPublisher {
            tx,
            stale: rx.clone(),
        },
        PitchSubscriber { rx },
    )
}

impl PitchPublisher {
    /// Replace the slot contents. `None` ("no pitch in this window") just
    /// empties the slot.
    pub fn publish(&self, hz: Option<f32>) {
        while self.stale.try_recv().is_ok() {}
        if let Some(hz) = hz {
            // Only this publisher sends, and the slot was just drained
            let _ = self.tx.try_send(hz);
        }
    }
}

impl PitchSubscriber {
    /// Take the latest estimate, if one arrived since the last call.
    pub fn take_latest(&self) -> Option<f32> {
        self.rx.try_recv().ok()
    }
}

/// Capture-thread side: estimates each audio window and publishes the result.
pub struct PitchCapture {
    estimator: PitchEstimator,
    publisher: PitchPublisher,
}

impl PitchCapture {
    pub fn new(config: EstimatorConfig, publisher: PitchPublisher) -> Self {
        PitchCapture {
            estimator: PitchEstimator::new(config),
            publisher,
        }
    }

    /// Returns the estimate that was published.
    pub fn process_window(&mut self, samples: &[f32], sample_rate: f32) -> Option<f32> {
        let hz = self.estimator.estimate(samples, sample_rate);
        self.publisher.publish(hz);
        hz
    }
}
