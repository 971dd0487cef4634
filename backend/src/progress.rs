//! Placeholder progress signal for the upload page.
//!
//! The ticker counts 0, 10, ..., 100 and starts over, forever. It is not tied
//! to any batch: the value says nothing about how far a real request has got.
//! Every subscriber gets its own independent cycle.

use actix_web::web::Bytes;
use futures::stream::{self, Stream};
use std::time::Duration;
use tokio::sync::watch;

const STEP: u8 = 10;
const MAX: u8 = 100;

pub struct ProgressTicker {
    interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl ProgressTicker {
    pub fn new(interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { interval, shutdown }
    }

    /// A fresh tick stream starting at 0. Ends only after [`stop`](Self::stop).
    pub fn ticks(&self) -> impl Stream<Item = u8> + use<> {
        let interval = self.interval;
        let shutdown = self.shutdown.subscribe();

        stream::unfold((0u8, true, shutdown), move |(value, first, mut shutdown)| async move {
            if *shutdown.borrow() {
                return None;
            }
            if !first {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => return None,
                }
            }
            let next = if value >= MAX { 0 } else { value + STEP };
            Some((value, (next, false, shutdown)))
        })
    }

    /// Ends every open tick stream, current and future.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
        log::info!("Progress ticker stopped");
    }
}

/// Server-sent-events framing for one tick.
pub fn sse_frame(value: u8) -> Bytes {
    Bytes::from(format!("data: {}\n\n", value))
}
