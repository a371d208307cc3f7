//! Serial driver task
//!
//! One task owns the [`Session`] and takes commands off a bounded queue one at
//! a time. A swap command is finished, including its waits and the whole
//! cascade, before the next command is read. Fall completions and snapshots
//! bypass the queue so they are served while a cascade is blocked on the
//! barrier.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tile_swap_core::{GridError, GridSnapshot, Session, SwapOutcome};

use crate::barrier::FallBarrier;
use crate::config::EngineConfig;
use crate::controller::FallAcks;
use crate::error::{EngineError, Result};
use crate::types::{Coord, FallId, GridEvent, PaletteMode};

/// Smallest event broadcast capacity; larger grids get four slots per cell
const EVENT_CAPACITY: usize = 4096;

/// Broadcast capacity for a `width` x `height` grid. One publish emits at most
/// one cell event per cell plus a move or spawn per cell, so four per cell
/// leaves room for the initial fill and a pass before a slow reader lags.
fn event_capacity(width: u8, height: u8) -> usize {
    (4 * width as usize * height as usize).max(EVENT_CAPACITY)
}

#[derive(Debug)]
pub enum EngineCommand {
    RequestSwap {
        from: Coord,
        to: Coord,
        acks: FallAcks,
        reply: oneshot::Sender<std::result::Result<SwapOutcome, GridError>>,
    },
    ToggleMode {
        reply: oneshot::Sender<PaletteMode>,
    },
    Shutdown,
}

/// A grid event plus the kind it displays as when it was published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub event: GridEvent,
    pub kind: Option<String>,
}

/// Latest published state of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub snapshot: GridSnapshot,
    /// Displayed kinds, `kinds[y][x]`
    pub kinds: Vec<Vec<String>>,
    pub state_hash: u64,
}

impl Observation {
    fn of(session: &Session<String>) -> Self {
        let snapshot = session.snapshot();
        let state_hash = snapshot.state_hash();
        let kinds = session
            .display_rows()
            .into_iter()
            .map(|row| row.into_iter().cloned().collect())
            .collect();
        Self {
            snapshot,
            kinds,
            state_hash,
        }
    }
}

/// Cloneable front end of a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    barrier: FallBarrier,
    events: broadcast::Sender<EngineEvent>,
    observation: watch::Receiver<Observation>,
    stop: Arc<watch::Sender<bool>>,
    width: u8,
    height: u8,
    palette_size: usize,
}

impl EngineHandle {
    fn enqueue(&self, command: EngineCommand) -> Result<()> {
        self.commands.try_send(command).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => EngineError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => EngineError::Closed,
        })
    }

    /// Pure bounds and adjacency pre-check
    pub fn can_swap(&self, from: Coord, to: Coord) -> bool {
        tile_swap_core::can_swap(self.width, self.height, from, to)
    }

    /// Queue a swap and wait for its outcome.
    ///
    /// Out-of-bounds and non-adjacent pairs fail here without touching the
    /// queue. The reply arrives before the swap's waits and cascade run.
    pub async fn request_swap(&self, from: Coord, to: Coord) -> Result<SwapOutcome> {
        self.request_swap_with(from, to, FallAcks::Configured).await
    }

    /// [`request_swap`](Self::request_swap) with an explicit fall policy for
    /// the cascade it may start
    pub async fn request_swap_with(
        &self,
        from: Coord,
        to: Coord,
        acks: FallAcks,
    ) -> Result<SwapOutcome> {
        for at in [from, to] {
            if at.x >= self.width || at.y >= self.height {
                return Err(GridError::OutOfBounds {
                    at,
                    width: self.width,
                    height: self.height,
                }
                .into());
            }
        }
        if !from.is_adjacent(to) {
            return Err(GridError::NotAdjacent { from, to }.into());
        }

        let (reply, rx) = oneshot::channel();
        self.enqueue(EngineCommand::RequestSwap {
            from,
            to,
            acks,
            reply,
        })?;
        let outcome = rx.await.map_err(|_| EngineError::Closed)??;
        Ok(outcome)
    }

    pub async fn toggle_mode(&self) -> Result<PaletteMode> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(EngineCommand::ToggleMode { reply })?;
        rx.await.map_err(|_| EngineError::Closed)
    }

    /// Report a landed token. Returns false for unknown or repeated ids.
    pub fn notify_fall_complete(&self, fall: FallId) -> bool {
        self.barrier.complete(fall)
    }

    pub fn dimensions(&self) -> (u8, u8) {
        (self.width, self.height)
    }

    pub fn palette_size(&self) -> usize {
        self.palette_size
    }

    /// Complete every outstanding fall, e.g. after events were lost.
    /// Returns how many were released.
    pub fn release_falls(&self) -> usize {
        self.barrier.release_all()
    }

    pub fn outstanding_falls(&self) -> usize {
        self.barrier.outstanding()
    }

    pub fn observe(&self) -> Observation {
        self.observation.borrow().clone()
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Wait until the published state satisfies `f`
    pub async fn wait_until(&self, f: impl FnMut(&Observation) -> bool) -> Result<Observation> {
        let mut rx = self.observation.clone();
        let seen = rx.wait_for(f).await.map_err(|_| EngineError::Closed)?;
        Ok(seen.clone())
    }

    /// Stop the engine. A cascade in progress stops waiting on its falls and
    /// no further command is taken.
    pub async fn shutdown(&self) -> Result<()> {
        if self.commands.is_closed() {
            return Err(EngineError::Closed);
        }
        self.stop.send_replace(true);
        match self.commands.try_send(EngineCommand::Shutdown) {
            // A full queue is fine; the driver checks the flag between commands.
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EngineError::Closed),
        }
    }
}

pub struct Engine {
    session: Session<String>,
    config: EngineConfig,
    barrier: FallBarrier,
    commands: mpsc::Receiver<EngineCommand>,
    events: broadcast::Sender<EngineEvent>,
    observation: watch::Sender<Observation>,
    stop: watch::Receiver<bool>,
}

/// Why a cascade stopped waiting for its falls
enum Wake {
    Idle,
    ControllerLost,
    Stopped,
}

impl Engine {
    /// Build an engine on a freshly populated grid
    pub fn new(config: EngineConfig) -> Result<(Self, EngineHandle)> {
        let palettes = config.palettes()?;
        let session = Session::new(config.width, config.height, palettes, config.seed)?;
        Ok(Self::with_session(config, session))
    }

    /// Build an engine around an existing session
    pub fn with_session(config: EngineConfig, session: Session<String>) -> (Self, EngineHandle) {
        let (width, height) = session.grid().dimensions();
        let (command_tx, commands) = mpsc::channel(config.max_pending_commands.max(1));
        let (events, _) = broadcast::channel(event_capacity(width, height));
        let (observation, observation_rx) = watch::channel(Observation::of(&session));
        let (stop_tx, stop) = watch::channel(false);
        let barrier = FallBarrier::new();

        let handle = EngineHandle {
            commands: command_tx,
            barrier: barrier.clone(),
            events: events.clone(),
            observation: observation_rx,
            stop: Arc::new(stop_tx),
            width,
            height,
            palette_size: session.palettes().len(),
        };
        let engine = Self {
            session,
            config,
            barrier,
            commands,
            events,
            observation,
            stop,
        };
        (engine, handle)
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        let (width, height) = self.session.grid().dimensions();
        info!(width, height, seed = self.session.seed(), "engine started");
        self.publish();

        while let Some(command) = self.commands.recv().await {
            match command {
                EngineCommand::RequestSwap {
                    from,
                    to,
                    acks,
                    reply,
                } => {
                    let result = self.session.request_swap(from, to);
                    let outcome = result.as_ref().ok().map(SwapOutcome::is_accepted);
                    let _ = reply.send(result);
                    self.publish();

                    match outcome {
                        Some(true) => self.cascade(acks).await,
                        Some(false) => pause(self.config.snap_back).await,
                        None => {}
                    }
                }
                EngineCommand::ToggleMode { reply } => {
                    let mode = self.session.toggle_mode();
                    let _ = reply.send(mode);
                    self.publish();
                }
                EngineCommand::Shutdown => break,
            }
            if self.stopping() {
                break;
            }
        }

        info!(
            swaps = self.session.swap_count(),
            passes = self.session.pass_count(),
            "engine stopped"
        );
    }

    fn stopping(&self) -> bool {
        *self.stop.borrow()
    }

    async fn cascade(&mut self, acks: FallAcks) {
        pause(self.config.swap_animation).await;
        pause(self.config.cascade_delay).await;

        let (mut tracked, mut controller) = match acks {
            _ if self.config.auto_falls => (false, None),
            FallAcks::Configured => (true, None),
            FallAcks::Auto => (false, None),
            FallAcks::Controller(c) => (c.is_connected(), Some(c)),
        };

        loop {
            match self.session.resolve_next_pass() {
                Ok(Some(pass)) => {
                    if tracked && !self.stopping() {
                        let outstanding = self.barrier.arm(pass.falls());
                        debug!(
                            removed = pass.removed.len(),
                            outstanding, "cascade pass waiting for falls"
                        );
                    }
                    self.publish();

                    let mut stop = self.stop.clone();
                    let wake = tokio::select! {
                        _ = self.barrier.wait_idle() => Wake::Idle,
                        _ = async {
                            match controller.as_mut() {
                                Some(c) => c.lost().await,
                                None => future::pending().await,
                            }
                        } => Wake::ControllerLost,
                        _ = stop.wait_for(|s| *s) => Wake::Stopped,
                    };
                    match wake {
                        Wake::Idle => {}
                        Wake::ControllerLost => {
                            let released = self.barrier.release_all();
                            warn!(released, "controller lost mid-cascade; completing its falls");
                            tracked = false;
                            controller = None;
                        }
                        Wake::Stopped => {
                            let released = self.barrier.release_all();
                            info!(released, "engine stopping mid-cascade");
                            tracked = false;
                        }
                    }
                }
                Ok(None) => {
                    self.publish();
                    break;
                }
                Err(err) => {
                    error!(%err, "cascade pass failed");
                    self.publish();
                    break;
                }
            }
        }
    }

    /// Refresh the observation, then emit buffered events in order
    fn publish(&mut self) {
        self.observation
            .send_replace(Observation::of(&self.session));
        for event in self.session.drain_events() {
            let kind = event.token().and_then(|t| self.session.kind_of(t)).cloned();
            // No subscribers is fine.
            let _ = self.events.send(EngineEvent { event, kind });
        }
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Build an engine from `config` and run it on the current runtime
pub fn spawn(config: EngineConfig) -> Result<(EngineHandle, JoinHandle<()>)> {
    let (engine, handle) = Engine::new(config)?;
    let task = tokio::spawn(engine.run());
    Ok((handle, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use tile_swap_core::{find_matches, Grid, Palettes};
    use tokio::time::Instant;

    fn scripted(config: EngineConfig) -> (Engine, EngineHandle) {
        let grid = Grid::from_letters(&["AABC", "BCAD", "CDBE", "DEDB"]).unwrap();
        let session = Session::with_grid(grid, Palettes::default_names(), 7).unwrap();
        Engine::with_session(config, session)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_swap_snaps_back_before_next_command() {
        let config = EngineConfig {
            auto_falls: true,
            ..EngineConfig::default()
        };
        let (engine, handle) = scripted(config);
        let task = tokio::spawn(engine.run());

        let before = handle.observe().snapshot;
        let start = Instant::now();
        let outcome = handle
            .request_swap(Coord::new(0, 0), Coord::new(0, 1))
            .await
            .unwrap();
        assert_eq!(outcome, SwapOutcome::Rejected);

        handle.toggle_mode().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert_eq!(handle.observe().snapshot.cells, before.cells);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_requests_fail_without_queueing() {
        let (_engine, handle) = scripted(EngineConfig::instant());
        let err = handle
            .request_swap(Coord::new(0, 0), Coord::new(2, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Grid(GridError::NotAdjacent { .. })));

        let err = handle
            .request_swap(Coord::new(3, 3), Coord::new(4, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Grid(GridError::OutOfBounds { .. })));
        assert!(!handle.can_swap(Coord::new(3, 3), Coord::new(4, 3)));
        assert!(handle.can_swap(Coord::new(3, 3), Coord::new(3, 2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cascade_waits_for_every_fall() {
        let config = EngineConfig {
            auto_falls: false,
            ..EngineConfig::instant()
        };
        let (engine, handle) = scripted(config);
        let mut events = handle.subscribe();
        let task = tokio::spawn(engine.run());

        let outcome = handle
            .request_swap(Coord::new(2, 1), Coord::new(2, 0))
            .await
            .unwrap();
        assert!(outcome.is_accepted());

        let mut falls = Vec::new();
        let mut rewards = 0;
        loop {
            let EngineEvent { event, kind } = events.recv().await.unwrap();
            match event {
                GridEvent::TokenMoved { fall, .. } | GridEvent::TokenSpawned { fall, .. } => {
                    falls.push(fall);
                }
                GridEvent::TokensMatched { .. } => {
                    assert!(kind.is_some());
                    rewards += 1;
                }
                GridEvent::GridSettled => break,
                GridEvent::CellChanged { .. } => {
                    // All falls of the pass have been published by now.
                    if !falls.is_empty() {
                        assert!(!handle.observe().snapshot.settled);
                        assert!(handle.outstanding_falls() > 0);
                        for fall in falls.drain(..) {
                            assert!(handle.notify_fall_complete(fall));
                        }
                        assert!(!handle.notify_fall_complete(FallId(u64::MAX)));
                    }
                }
                _ => {}
            }
        }

        assert!(rewards >= 1);
        let seen = handle.observe();
        assert!(seen.snapshot.settled);
        let grid = Grid::from_rows(&seen.snapshot.cells).unwrap();
        assert!(find_matches(&grid).is_empty());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_mode_publishes_every_cell() {
        let (engine, handle) = scripted(EngineConfig::instant());
        let mut events = handle.subscribe();
        let task = tokio::spawn(engine.run());

        assert_eq!(handle.toggle_mode().await.unwrap(), PaletteMode::Hidden);
        let seen = handle
            .wait_until(|o| o.snapshot.mode == PaletteMode::Hidden)
            .await
            .unwrap();
        assert_eq!(seen.kinds[0][0], "moon");

        let mut cells = 0;
        let mut toggled = false;
        while cells < 16 {
            match events.recv().await.unwrap().event {
                GridEvent::ModeToggled { mode } => {
                    assert_eq!(mode, PaletteMode::Hidden);
                    toggled = true;
                }
                GridEvent::CellChanged { .. } if toggled => cells += 1,
                _ => {}
            }
        }

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    async fn first_fall(events: &mut broadcast::Receiver<EngineEvent>) -> FallId {
        loop {
            match events.recv().await.unwrap().event {
                GridEvent::TokenMoved { fall, .. } | GridEvent::TokenSpawned { fall, .. } => {
                    return fall
                }
                _ => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_controller_releases_its_falls() {
        let config = EngineConfig {
            auto_falls: false,
            ..EngineConfig::instant()
        };
        let (engine, handle) = scripted(config);
        let mut events = handle.subscribe();
        let task = tokio::spawn(engine.run());

        let (guard, controller) = Controller::new();
        let outcome = handle
            .request_swap_with(
                Coord::new(2, 1),
                Coord::new(2, 0),
                FallAcks::Controller(controller),
            )
            .await
            .unwrap();
        assert!(outcome.is_accepted());

        first_fall(&mut events).await;
        assert!(handle.outstanding_falls() > 0);
        drop(guard);

        let mode = tokio::time::timeout(Duration::from_secs(5), handle.toggle_mode())
            .await
            .expect("cascade should finish once its controller is gone")
            .unwrap();
        assert_eq!(mode, PaletteMode::Hidden);
        assert_eq!(handle.outstanding_falls(), 0);
        assert!(handle.observe().snapshot.settled);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_acks_never_wait() {
        let config = EngineConfig {
            auto_falls: false,
            ..EngineConfig::instant()
        };
        let (engine, handle) = scripted(config);
        let task = tokio::spawn(engine.run());

        let outcome = handle
            .request_swap_with(Coord::new(2, 1), Coord::new(2, 0), FallAcks::Auto)
            .await
            .unwrap();
        assert!(outcome.is_accepted());

        let mode = tokio::time::timeout(Duration::from_secs(5), handle.toggle_mode())
            .await
            .expect("unacknowledged cascade should not block")
            .unwrap();
        assert_eq!(mode, PaletteMode::Hidden);
        assert_eq!(handle.outstanding_falls(), 0);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_blocked_cascade() {
        let config = EngineConfig {
            auto_falls: false,
            ..EngineConfig::instant()
        };
        let (engine, handle) = scripted(config);
        let mut events = handle.subscribe();
        let task = tokio::spawn(engine.run());

        let outcome = handle
            .request_swap(Coord::new(2, 1), Coord::new(2, 0))
            .await
            .unwrap();
        assert!(outcome.is_accepted());
        first_fall(&mut events).await;
        assert!(handle.outstanding_falls() > 0);

        handle.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("engine should stop without its falls")
            .unwrap();
        assert_eq!(handle.outstanding_falls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_grid_toggle_fits_event_buffer() {
        let config = EngineConfig {
            width: 64,
            height: 64,
            ..EngineConfig::instant()
        };
        let (engine, handle) = Engine::new(config).unwrap();
        let mut events = handle.subscribe();
        let task = tokio::spawn(engine.run());

        assert_eq!(handle.toggle_mode().await.unwrap(), PaletteMode::Hidden);

        // A lagging receiver would fail `recv` here.
        let mut cells = 0;
        let mut toggled = false;
        while cells < 64 * 64 {
            match events.recv().await.unwrap().event {
                GridEvent::ModeToggled { .. } => toggled = true,
                GridEvent::CellChanged { .. } if toggled => cells += 1,
                _ => {}
            }
        }

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_engine_reports_closed() {
        let (engine, handle) = scripted(EngineConfig::instant());
        drop(engine);
        let err = handle.toggle_mode().await.unwrap_err();
        assert_eq!(err, EngineError::Closed);
    }
}
