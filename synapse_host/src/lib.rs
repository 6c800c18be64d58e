//! Hosting layer for the synapse engine.
//!
//! The core engine ([`synapse_engine`]) only defines the shared region and
//! the two threads' protocol over it; something still has to own the
//! realtime callback and call [`Transport::process_block`] at the right
//! cadence. That something is deliberately thin here — the oscillator bank,
//! voice allocator, and any real audio-host binding are all named as
//! out-of-scope collaborators, so this crate stands in a background thread
//! for the realtime callback and exposes the engine's lifecycle as the
//! plain function calls described for the hosting layer: [`start`] and
//! [`HostHandle::stop`], plus tempo changes through the returned [`Bridge`]
//! directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use synapse_engine::{
    bridge::Bridge,
    config::EngineConfig,
    constants::{DEFAULT_MAX_DRAIN_PER_BLOCK, DEFAULT_QUOTA},
    cursor::NodeEvent,
    region::Region,
    transport::Transport,
};

/// Samples rendered per simulated callback — roughly a 2.9 ms buffer at
/// 44.1 kHz, a typical low-latency audio block size.
pub const DEFAULT_BLOCK_SAMPLES: u32 = 128;

/// Handle to the background render thread started by [`start`].
///
/// Dropping a `HostHandle` without calling [`stop`](HostHandle::stop) also
/// stops the thread — the drop glue signals and joins it — but calling
/// `stop` explicitly lets the caller observe the join rather than blocking
/// silently inside a drop.
pub struct HostHandle {
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HostHandle {
    /// Signal the render thread to stop after its current block and wait
    /// for it to exit.
    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("render thread panicked");
            }
        }
    }
}

impl Drop for HostHandle {
    fn drop(&mut self) {
        self.join();
    }
}

/// Allocate a region from `config`, start a background thread that drives
/// [`Transport::process_block`] once every `block_samples` worth of
/// samples (at `config.sample_rate`), and return a [`Bridge`] for
/// submitting commands alongside a [`HostHandle`] to stop the thread.
///
/// `on_event` is invoked on the render thread for every emitted
/// [`NodeEvent`]; it stands in for the external voice allocator, so it
/// must not block or allocate any more than that collaborator would be
/// allowed to.
pub fn start(
    config: EngineConfig,
    rng_seed: u32,
    block_samples: u32,
    mut on_event: impl FnMut(NodeEvent) + Send + 'static,
) -> (Bridge, HostHandle) {
    let block_period = Duration::from_secs_f64(block_samples as f64 / config.sample_rate);
    let region = Region::new(&config);
    let bridge = Bridge::new(Arc::clone(&region));
    let stop_flag = Arc::new(AtomicBool::new(false));
    let thread_stop_flag = Arc::clone(&stop_flag);

    let thread = std::thread::spawn(move || {
        let mut transport = Transport::new(region, rng_seed, DEFAULT_QUOTA, DEFAULT_MAX_DRAIN_PER_BLOCK);
        while !thread_stop_flag.load(Ordering::SeqCst) {
            transport.process_block(block_samples, |event| on_event(event));
            std::thread::sleep(block_period);
        }
        log::debug!("render thread stopped");
    });

    (bridge, HostHandle { stop_flag, thread: Some(thread) })
}
