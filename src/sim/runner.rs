//! Threaded simulation runner
//!
//! Each run owns two threads:
//! - the ticker, which owns the `DropState`, paces ticks off the wall clock
//!   and publishes a `Snapshot` after every tick
//! - the dispatcher, which receives events over a channel and invokes the
//!   host callbacks, so callbacks never run inside a tick
//!
//! `stop()` cancels, wakes the ticker, then joins both threads. Once it
//! returns no callback of that run will fire again. Callbacks that want to
//! end their own run use a `StopHandle`, which cancels without joining.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::board::Board;
use super::config::SimulationConfig;
use super::event::{Contact, Settled, SimEvent};
use super::fallback::settle_round_robin;
use super::state::{Ball, DropState, Snapshot};
use super::tick::tick;

/// Cancellation side of one run
#[derive(Clone)]
struct RunSignal {
    id: u64,
    cancelled: Arc<AtomicBool>,
    stop_tx: mpsc::Sender<()>,
}

impl RunSignal {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        // The ticker may already have exited; a closed channel is fine
        let _ = self.stop_tx.send(());
    }
}

/// Handles of the active (or finished but not yet reaped) run
struct Run {
    signal: RunSignal,
    ticker: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

/// Cancels whichever run a `Simulator` currently has, from any thread
///
/// Never blocks on the run's threads, so it is safe inside `on_reached_bottom`
/// or `on_collision`. The cancelled run delivers no further events; its
/// threads are reaped by the next `Simulator::stop` or `start`.
#[derive(Clone)]
pub struct StopHandle {
    current: Arc<Mutex<Option<RunSignal>>>,
}

impl StopHandle {
    pub fn stop(&self) {
        let signal = self.current.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(signal) = signal {
            log::debug!("drop run {} cancelled from handle", signal.id);
            signal.cancel();
        }
    }
}

/// Drives drops on background threads
pub struct Simulator {
    /// Base seed for reproducible runs (`None` = OS entropy)
    seed: Option<u64>,
    snapshot: Arc<Mutex<Snapshot>>,
    run: Option<Run>,
    /// Signal of the active run, shared with every `StopHandle`
    current: Arc<Mutex<Option<RunSignal>>>,
    runs_started: u64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            seed: None,
            snapshot: Arc::new(Mutex::new(Snapshot::default())),
            run: None,
            current: Arc::new(Mutex::new(None)),
            runs_started: 0,
        }
    }

    /// Reproducible runner: run `n` (0-based) uses `seed + n`
    pub fn with_seed(seed: u64) -> Self {
        let mut sim = Self::new();
        sim.seed = Some(seed);
        sim
    }

    /// Handle for cancelling runs from callbacks or other threads
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            current: self.current.clone(),
        }
    }

    /// Start a physics drop, stopping any previous run first
    ///
    /// Rejects malformed configuration without touching the current run's
    /// replacement state. Callbacks are invoked on the dispatcher thread.
    pub fn start<F, G>(
        &mut self,
        board: Board,
        config: SimulationConfig,
        balls: Vec<Ball>,
        on_reached_bottom: F,
        on_collision: G,
    ) -> Result<()>
    where
        F: FnMut(Settled) + Send + 'static,
        G: FnMut(Contact) + Send + 'static,
    {
        self.stop();
        if let Err(err) = config.validate(&board) {
            log::warn!("rejected simulation config: {err:#}");
            return Err(err);
        }

        let seed = self
            .seed
            .map(|s| s.wrapping_add(self.runs_started))
            .unwrap_or_else(rand::random);
        log::info!(
            "starting drop: {} balls, {} buckets, seed {}",
            balls.len(),
            config.bucket_count,
            seed
        );

        let state = DropState::new(balls);
        self.spawn_run(state, on_reached_bottom, on_collision, move |ctx| {
            physics_loop(ctx, board, config, Pcg32::seed_from_u64(seed))
        })
    }

    /// Start a physics-free drop: round-robin buckets after `delay`
    pub fn start_fallback<F>(
        &mut self,
        board: Board,
        config: SimulationConfig,
        balls: Vec<Ball>,
        delay: Duration,
        on_reached_bottom: F,
    ) -> Result<()>
    where
        F: FnMut(Settled) + Send + 'static,
    {
        self.stop();
        if let Err(err) = config.validate(&board) {
            log::warn!("rejected simulation config: {err:#}");
            return Err(err);
        }
        log::info!(
            "starting fallback drop: {} balls, {} buckets, delay {:?}",
            balls.len(),
            config.bucket_count,
            delay
        );

        let state = DropState::new(balls);
        self.spawn_run(state, on_reached_bottom, |_| {}, move |ctx| {
            fallback_wait(ctx, board, config.bucket_count, delay)
        })
    }

    fn spawn_run<F, G, L>(&mut self, state: DropState, mut on_reached_bottom: F, mut on_collision: G, body: L) -> Result<()>
    where
        F: FnMut(Settled) + Send + 'static,
        G: FnMut(Contact) + Send + 'static,
        L: FnOnce(TickerContext) + Send + 'static,
    {
        let id = self.runs_started;
        self.runs_started += 1;

        let cancelled = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (event_tx, event_rx) = mpsc::channel::<SimEvent>();

        publish(&self.snapshot, state.snapshot(true));

        let dispatch_cancelled = cancelled.clone();
        let dispatcher = thread::Builder::new()
            .name(format!("drop-dispatch-{id}"))
            .spawn(move || {
                // Ends when the ticker drops its sender
                for event in event_rx {
                    if dispatch_cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    match event {
                        SimEvent::ReachedBottom { ball, color, bucket } => {
                            on_reached_bottom(Settled { ball, color, bucket })
                        }
                        SimEvent::Collision {
                            a,
                            b,
                            color_a,
                            color_b,
                            midpoint,
                        } => on_collision(Contact {
                            a,
                            b,
                            color_a,
                            color_b,
                            midpoint,
                        }),
                    }
                }
            })
            .context("failed to spawn event dispatcher thread")?;

        let signal = RunSignal {
            id,
            cancelled: cancelled.clone(),
            stop_tx,
        };
        let ctx = TickerContext {
            run: id,
            state,
            cancelled,
            stop_rx,
            event_tx,
            snapshot: self.snapshot.clone(),
        };
        let ticker = match thread::Builder::new()
            .name(format!("drop-ticker-{id}"))
            .spawn(move || body(ctx))
        {
            Ok(handle) => handle,
            Err(err) => {
                // The closure (and with it the event sender) is gone, so the
                // dispatcher drains and exits on its own
                let _ = dispatcher.join();
                publish_running(&self.snapshot, false);
                return Err(err).context("failed to spawn simulation thread");
            }
        };

        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal.clone());
        self.run = Some(Run {
            signal,
            ticker: Some(ticker),
            dispatcher: Some(dispatcher),
        });
        Ok(())
    }

    /// Halt the current run; no-op when idle. Safe to call repeatedly.
    ///
    /// Waits for the run's threads. Callbacks should use a `StopHandle`
    /// instead.
    pub fn stop(&mut self) {
        let Some(mut run) = self.run.take() else {
            return;
        };

        run.signal.cancel();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;

        let current = thread::current().id();
        for handle in [run.ticker.take(), run.dispatcher.take()].into_iter().flatten() {
            if handle.thread().id() == current {
                // Called from inside a callback: the dispatcher exits on
                // its own once it sees the cancel flag
                continue;
            }
            if handle.join().is_err() {
                log::warn!("drop run {} thread panicked", run.signal.id);
            }
        }

        publish_running(&self.snapshot, false);
        log::info!("drop run {} stopped", run.signal.id);
    }

    /// A run is still ticking (or waiting out its fallback delay)
    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .and_then(|run| run.ticker.as_ref())
            .is_some_and(|ticker| !ticker.is_finished())
    }

    /// Latest published ball positions
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the ticker thread owns for one run
struct TickerContext {
    run: u64,
    state: DropState,
    cancelled: Arc<AtomicBool>,
    stop_rx: mpsc::Receiver<()>,
    event_tx: mpsc::Sender<SimEvent>,
    snapshot: Arc<Mutex<Snapshot>>,
}

impl TickerContext {
    /// Sleep until `deadline` unless stopped; true means keep going
    fn wait_until(&self, deadline: Instant) -> bool {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match self.stop_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => !self.cancelled.load(Ordering::Acquire),
            // Stop requested, or the simulator was dropped
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Hand events to the dispatcher; false once nobody is listening
    fn send_all(&self, events: &mut Vec<SimEvent>) -> bool {
        for event in events.drain(..) {
            if self.event_tx.send(event).is_err() {
                return false;
            }
        }
        true
    }
}

fn physics_loop(mut ctx: TickerContext, board: Board, config: SimulationConfig, mut rng: Pcg32) {
    let interval = Duration::from_secs_f32(config.frame_interval);
    let mut events = Vec::new();
    let mut last = Instant::now();
    let mut next = last + interval;

    loop {
        if !ctx.wait_until(next) {
            log::debug!("drop run {} cancelled at tick {}", ctx.run, ctx.state.time_ticks);
            return;
        }

        // Variable step: a late tick integrates the longer real delta
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;
        next = (next + interval).max(now);

        let done = tick(&mut ctx.state, &board, &config, &mut rng, dt, &mut events);
        publish(&ctx.snapshot, ctx.state.snapshot(!done));

        if !ctx.send_all(&mut events) {
            return;
        }
        if done {
            log::info!(
                "drop run {} settled after {} ticks",
                ctx.run,
                ctx.state.time_ticks
            );
            return;
        }
    }
}

fn fallback_wait(mut ctx: TickerContext, board: Board, bucket_count: usize, delay: Duration) {
    if !ctx.wait_until(Instant::now() + delay) {
        log::debug!("fallback run {} cancelled", ctx.run);
        return;
    }
    let mut events = settle_round_robin(&mut ctx.state, &board, bucket_count);
    publish(&ctx.snapshot, ctx.state.snapshot(false));
    ctx.send_all(&mut events);
    log::info!("fallback run {} placed {} balls", ctx.run, ctx.state.balls.len());
}

fn publish(slot: &Mutex<Snapshot>, snapshot: Snapshot) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
}

fn publish_running(slot: &Mutex<Snapshot>, running: bool) {
    slot.lock().unwrap_or_else(PoisonError::into_inner).running = running;
}
