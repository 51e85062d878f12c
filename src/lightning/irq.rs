//! # Interrupt Listener
//!
//! Runs the AS3935 interrupt handler on its own thread, triggered by falling
//! edges on the sensor's IRQ line.

use embedded_hal::spi::SpiDevice;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::driver::As3935;
use super::event::EventKind;
use crate::error::Result;

/// Default minimum interval between two accepted triggers
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2);

/// Longest single wait for an edge; bounds how long a stop request waits
pub const EDGE_WAIT: Duration = Duration::from_millis(100);

/// A line that signals the interrupt with falling edges
pub trait EdgeSource: Send + 'static {
    /// Wait up to `timeout` for the next falling edge
    ///
    /// Returns `Ok(true)` for an edge and `Ok(false)` when the wait timed out.
    fn wait_for_edge(&mut self, timeout: Duration) -> io::Result<bool>;
}

/// Handle to a running interrupt listener thread
#[derive(Debug)]
pub struct IrqListener {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl IrqListener {
    /// Spawn the listener thread
    ///
    /// Edges closer together than `debounce` are ignored. A failing handler
    /// invocation is logged and counted as a lost event; a failing edge
    /// source ends the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<SPI, E>(sensor: Arc<As3935<SPI>>, mut edges: E, debounce: Duration) -> Result<Self>
    where
        SPI: SpiDevice + Send + 'static,
        E: EdgeSource,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("as3935-irq".to_string())
            .spawn(move || {
                let mut last_trigger: Option<Instant> = None;
                info!("Lightning interrupt listener running");

                while !thread_stop.load(Ordering::Acquire) {
                    match edges.wait_for_edge(EDGE_WAIT) {
                        Ok(true) => {}
                        Ok(false) => continue,
                        Err(e) => {
                            warn!("Lightning interrupt line failed, no further events: {}", e);
                            break;
                        }
                    }
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }

                    let now = Instant::now();
                    if let Some(last) = last_trigger {
                        if now.duration_since(last) < debounce {
                            debug!("Interrupt edge ignored (debounce)");
                            continue;
                        }
                    }
                    last_trigger = Some(now);

                    match sensor.handle_interrupt() {
                        Ok(event) => match event.kind {
                            EventKind::Lightning { distance_km } => {
                                info!("Lightning detected ~{} km", distance_km)
                            }
                            kind => debug!("Interrupt: {:?}", kind),
                        },
                        Err(e) => warn!("Lightning interrupt lost: {}", e),
                    }
                }

                debug!("Lightning interrupt listener stopped");
            })?;

        Ok(Self { stop, handle })
    }

    /// Whether the listener thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the listener and join its thread
    ///
    /// Returns once the thread has exited, at most one edge wait after the
    /// request. The thread's sensor handle is dropped by then.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        if self.handle.join().is_err() {
            warn!("Lightning interrupt listener panicked");
        }
    }
}
