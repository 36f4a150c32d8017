//! # ProcessSupervisor: starts the pipeline, keeps it alive, tears it down.
//!
//! The supervisor owns the event [`Bus`], the subscriber list and a
//! [`Launcher`]. A run has three phases, all driven from one task:
//!
//! ```text
//! run(token)
//!   ├─ validate config                      (fatal, nothing spawned)
//!   ├─ startup: for role in display → renderer → encoder
//!   │     launch ─► settle delay ─► still alive?  no → fatal, cleanup
//!   ├─ monitor: every poll_interval, for each stage in start order
//!   │     alive  → reset crash counter
//!   │     exited → StageCrashed, then per RestartPolicy:
//!   │                Never           → StageLost (once)
//!   │                Always{None}    → relaunch now
//!   │                Always{Some(b)} → RestartScheduled, cooldown, relaunch
//!   └─ shutdown (exactly once, reverse start order)
//!         terminate ─► wait ≤ grace ─► kill if still running
//! ```
//!
//! ## Event flow
//! ```text
//! supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                          ├─► LogWriter
//!                                                          └─► FeedRecorder
//! ```
//!
//! ## Rules
//! - Restarts are sequential: one stage at a time, never concurrent.
//! - A relaunch that fails (spawn error or death within the settle delay) is
//!   retried on the next tick; there is no retry cap.
//! - Cancellation interrupts every sleep (poll, cooldown, settle) promptly.
//! - Shutdown after a signal returns `Ok(())` even when a stage had to be
//!   force-killed.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use streamvisor::{Config, LogWriter, ProcessSupervisor, RunMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), streamvisor::RuntimeError> {
//!     let cfg = Config { mode: RunMode::Preview, ..Config::default() };
//!     ProcessSupervisor::new(cfg, vec![Arc::new(LogWriter)])
//!         .run_until_signal()
//!         .await
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::pipeline::{ManagedProcess, Pipeline};
use super::shutdown::ShutdownSignals;
use crate::config::{Config, MAX_POLL_INTERVAL};
use crate::error::{RuntimeError, StageError};
use crate::events::{Bus, Event, EventKind};
use crate::stages::{CommandSpec, Launcher, ProcessLauncher, StageExit, StageHandle, StageRole};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Result of waiting out a settle delay.
enum Settled {
    Alive,
    Exited(StageExit),
    Cancelled,
}

/// Supervises the display, renderer and encoder processes.
pub struct ProcessSupervisor<L: Launcher = ProcessLauncher> {
    cfg: Config,
    launcher: L,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ProcessSupervisor {
    /// Creates a supervisor that launches real OS processes.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self::with_launcher(cfg, ProcessLauncher, subscribers)
    }
}

impl<L: Launcher> ProcessSupervisor<L> {
    pub fn with_launcher(cfg: Config, launcher: L, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            cfg,
            launcher,
            bus,
            subscribers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Bus the supervisor publishes to; subscribe before calling `run`.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs until an OS termination signal arrives.
    pub async fn run_until_signal(self) -> Result<(), RuntimeError> {
        let signals = ShutdownSignals::register().map_err(RuntimeError::Signal)?;
        let token = CancellationToken::new();
        let watcher = tokio::spawn(signals.cancel_on_signal(token.clone()));
        let res = self.run(token).await;
        watcher.abort();
        res
    }

    /// Runs the pipeline until `token` is cancelled or startup fails.
    ///
    /// Every launched stage has been stopped when this returns, and every
    /// published event has been handed to the subscribers.
    pub async fn run(self, token: CancellationToken) -> Result<(), RuntimeError> {
        self.cfg.validate()?;

        let done = CancellationToken::new();
        let listener = self.subscriber_listener(done.clone());

        let mut pipeline = Pipeline::default();
        let res = self.drive(&mut pipeline, &token).await;

        let reason = match &res {
            Ok(()) => "termination requested".to_string(),
            Err(e) => format!("startup failed: {}", e.as_label()),
        };
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_reason(reason));
        self.shutdown(&mut pipeline).await;

        done.cancel();
        let _ = listener.await;
        res
    }

    /// Forwards bus events to a subscriber set until `done`, then drains both.
    fn subscriber_listener(&self, done: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = done.cancelled() => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
            set.shutdown().await;
        })
    }

    async fn drive(&self, p: &mut Pipeline, token: &CancellationToken) -> Result<(), RuntimeError> {
        if !self.startup(p, token).await? {
            return Ok(());
        }
        tracing::info!(mode = ?self.cfg.mode, display = %self.cfg.display, "pipeline live");
        self.monitor(p, token).await;
        Ok(())
    }

    /// Stages this run owns, in start order.
    fn roles(&self) -> impl Iterator<Item = StageRole> + '_ {
        StageRole::ALL
            .into_iter()
            .filter(|r| *r != StageRole::Display || self.cfg.manage_display)
    }

    /// Starts every stage in order. `Ok(false)` when cancelled midway.
    async fn startup(&self, p: &mut Pipeline, token: &CancellationToken) -> Result<bool, RuntimeError> {
        for role in self.roles() {
            if token.is_cancelled() {
                return Ok(false);
            }
            let handle = self
                .launch(role, 0)
                .map_err(|source| RuntimeError::Launch { role, source })?;
            let proc = p.push(ManagedProcess::new(role, handle));

            match self
                .settle(proc, 0, token)
                .await
                .map_err(|source| RuntimeError::Launch { role, source })?
            {
                Settled::Alive => {}
                Settled::Cancelled => return Ok(false),
                Settled::Exited(exit) => {
                    return Err(RuntimeError::StageStartFailed {
                        role,
                        exit,
                        stderr: proc.handle.stderr_tail(),
                    });
                }
            }
        }
        Ok(true)
    }

    fn launch(&self, role: StageRole, attempt: u32) -> Result<Box<dyn StageHandle>, StageError> {
        self.bus.publish(
            Event::new(EventKind::StageStarting)
                .with_stage(role)
                .with_attempt(attempt),
        );
        let cmd = CommandSpec::for_role(role, &self.cfg);
        self.launcher.launch(role, &cmd).inspect_err(|e| {
            self.bus.publish(
                Event::new(EventKind::StageStartFailed)
                    .with_stage(role)
                    .with_attempt(attempt)
                    .with_reason(e.to_string()),
            );
        })
    }

    /// Waits the stage's settle delay, then checks it is still running.
    async fn settle(
        &self,
        proc: &mut ManagedProcess,
        attempt: u32,
        token: &CancellationToken,
    ) -> Result<Settled, StageError> {
        tokio::select! {
            _ = token.cancelled() => return Ok(Settled::Cancelled),
            _ = time::sleep(self.cfg.settle(proc.role)) => {}
        }

        match proc.handle.try_exit()? {
            None => {
                self.bus.publish(
                    Event::new(EventKind::StageRunning)
                        .with_stage(proc.role)
                        .with_pid(proc.pid)
                        .with_attempt(attempt),
                );
                Ok(Settled::Alive)
            }
            Some(exit) => {
                let reason = match proc.handle.stderr_tail() {
                    Some(tail) => format!("{exit}: {tail}"),
                    None => exit.to_string(),
                };
                self.bus.publish(
                    Event::new(EventKind::StageStartFailed)
                        .with_stage(proc.role)
                        .with_pid(proc.pid)
                        .with_attempt(attempt)
                        .with_reason(reason),
                );
                Ok(Settled::Exited(exit))
            }
        }
    }

    /// Polls liveness every `poll_interval` until cancelled.
    async fn monitor(&self, p: &mut Pipeline, token: &CancellationToken) {
        let period = self
            .cfg
            .poll_interval
            .clamp(Duration::from_millis(1), MAX_POLL_INTERVAL);
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
            for proc in p.iter_mut() {
                if !self.check(proc, token).await {
                    return;
                }
            }
        }
    }

    /// Handles one stage on one tick. `false` when cancelled.
    async fn check(&self, proc: &mut ManagedProcess, token: &CancellationToken) -> bool {
        if proc.lost {
            return true;
        }
        let role = proc.role;
        let exit = match proc.handle.try_exit() {
            Ok(None) => {
                proc.crashes = 0;
                return true;
            }
            Ok(Some(exit)) => exit,
            Err(e) => {
                tracing::warn!(stage = %role, error = %e, "liveness probe failed");
                return true;
            }
        };

        let uptime = proc.started_at.elapsed().as_secs();
        self.bus.publish(
            Event::new(EventKind::StageCrashed)
                .with_stage(role)
                .with_pid(proc.pid)
                .with_reason(format!("{exit} after {uptime}s")),
        );

        let Some(delay) = self.cfg.restart_policy(role).delay(proc.crashes) else {
            proc.lost = true;
            self.bus.publish(
                Event::new(EventKind::StageLost)
                    .with_stage(role)
                    .with_reason(exit.to_string()),
            );
            return true;
        };

        proc.crashes = proc.crashes.saturating_add(1);
        proc.restarts = proc.restarts.saturating_add(1);
        let attempt = proc.restarts;

        if !delay.is_zero() {
            self.bus.publish(
                Event::new(EventKind::RestartScheduled)
                    .with_stage(role)
                    .with_delay(delay)
                    .with_attempt(attempt),
            );
            tokio::select! {
                _ = token.cancelled() => return false,
                _ = time::sleep(delay) => {}
            }
        }

        // on spawn failure the old, exited handle stays and the next tick retries
        let Ok(handle) = self.launch(role, attempt) else {
            return true;
        };
        proc.replace(handle);
        match self.settle(proc, attempt, token).await {
            Ok(Settled::Cancelled) => false,
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(stage = %role, error = %e, "liveness probe failed");
                true
            }
        }
    }

    /// Stops every tracked stage, in reverse start order. Runs at most once.
    async fn shutdown(&self, p: &mut Pipeline) {
        let procs = p.drain();
        if procs.is_empty() {
            return;
        }

        let mut killed = Vec::new();
        for mut proc in procs {
            if self.stop(&mut proc).await {
                killed.push(proc.role.as_str());
                self.bus.publish(
                    Event::new(EventKind::StageKilled)
                        .with_stage(proc.role)
                        .with_pid(proc.pid)
                        .with_timeout(self.cfg.grace),
                );
            } else {
                self.bus.publish(
                    Event::new(EventKind::StageStopped)
                        .with_stage(proc.role)
                        .with_pid(proc.pid),
                );
            }
        }

        if killed.is_empty() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
        } else {
            self.bus.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_reason(format!("force-killed: {}", killed.join(", "))),
            );
        }
    }

    /// Terminates one stage; returns `true` if it had to be force-killed.
    async fn stop(&self, proc: &mut ManagedProcess) -> bool {
        if let Ok(Some(_)) = proc.handle.try_exit() {
            return false;
        }
        if let Err(e) = proc.handle.terminate() {
            tracing::warn!(stage = %proc.role, error = %e, "termination request failed");
        }
        match time::timeout(self.cfg.grace, proc.handle.wait()).await {
            Ok(Ok(_)) => return false,
            Ok(Err(e)) => tracing::warn!(stage = %proc.role, error = %e, "wait failed"),
            Err(_) => {}
        }
        if let Err(e) = proc.handle.kill().await {
            tracing::warn!(stage = %proc.role, error = %e, "force-kill failed");
        }
        true
    }
}
