use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDateTime;
use tw_core::WorldState;

use crate::config::SimConfig;
use crate::engine;
use crate::error::{SimError, SimResult};
use crate::module::{BehaviorModule, ModuleRegistry};
use crate::persistence::SnapshotStore;
use crate::summary::SummaryTracker;

/// Lifecycle of a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Built but not started.
    Uninitialized,
    /// Building or restoring the world.
    Initializing,
    /// Ready to tick.
    Running,
    /// Writing the final snapshot.
    ShuttingDown,
    /// Shut down; the world can still be read.
    Stopped,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Cloneable flag that asks a running simulation to stop.
///
/// Observed only between ticks, so a tick is never left half-applied.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the run to stop after the current tick.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why [`Simulation::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The tick limit was reached.
    TickLimit,
    /// A [`StopHandle`] asked the run to stop.
    StopRequested,
}

/// Summary of one [`Simulation::run`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Ticks executed by this call.
    pub ticks_run: u64,
    /// World tick counter at the end, including ticks before a resume.
    pub final_tick: u64,
    /// Simulated time at the end.
    pub now: NaiveDateTime,
    /// Why the run ended.
    pub stop_reason: StopReason,
}

/// The top-level simulation driver.
///
/// Owns the world, the attached modules and the snapshot store, and drives
/// the tick loop: clock, modifier expiry, renewal, modules, snapshot,
/// summary.
pub struct Simulation {
    config: SimConfig,
    registry: ModuleRegistry,
    store: Box<dyn SnapshotStore>,
    world: Option<WorldState>,
    modules: Vec<Box<dyn BehaviorModule>>,
    state: DriverState,
    stop: StopHandle,
    summary: SummaryTracker,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("state", &self.state)
            .field("tick", &self.world.as_ref().map(WorldState::tick))
            .field("modules", &self.modules.len())
            .finish()
    }
}

impl Simulation {
    /// A driver over `store`, building modules from `registry`.
    pub fn new<S>(config: SimConfig, registry: ModuleRegistry, store: S) -> Self
    where
        S: SnapshotStore + 'static,
    {
        let summary = SummaryTracker::new(config.summary.clone());
        Self {
            config,
            registry,
            store: Box::new(store),
            world: None,
            modules: Vec::new(),
            state: DriverState::Uninitialized,
            stop: StopHandle::default(),
            summary,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The run configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// A handle another thread (or a signal handler) can use to stop the run.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The world, once started or resumed.
    pub fn world(&self) -> Option<&WorldState> {
        self.world.as_ref()
    }

    /// Mutable world, once started or resumed.
    pub fn world_mut(&mut self) -> Option<&mut WorldState> {
        self.world.as_mut()
    }

    /// Access an attached module by downcasting to a concrete type.
    pub fn module<T: BehaviorModule + 'static>(&self) -> Option<&T> {
        self.modules
            .iter()
            .find_map(|m| m.as_any().downcast_ref::<T>())
    }

    /// Access an attached module mutably by downcasting to a concrete type.
    pub fn module_mut<T: BehaviorModule + 'static>(&mut self) -> Option<&mut T> {
        self.modules
            .iter_mut()
            .find_map(|m| m.as_any_mut().downcast_mut::<T>())
    }

    /// Build a fresh world from config and attach its modules in order.
    pub fn start_new(&mut self) -> SimResult<()> {
        self.expect_state(DriverState::Uninitialized)?;
        self.state = DriverState::Initializing;
        let result = self.build_fresh();
        self.finish_init(result)
    }

    /// Restore the latest snapshot from the store and re-attach its modules.
    pub fn resume(&mut self) -> SimResult<()> {
        self.expect_state(DriverState::Uninitialized)?;
        self.state = DriverState::Initializing;
        let result = self.restore();
        self.finish_init(result)
    }

    fn build_fresh(&mut self) -> SimResult<()> {
        self.config.validate()?;
        let mut world = self.config.build_world()?;
        for entry in &self.config.modules {
            let module = self.registry.create(&entry.id)?;
            world.register_module(&entry.id)?;
            self.modules.push(module);
        }
        tracing::info!(
            seed = self.config.seed,
            start = %world.now(),
            resources = world.resources().count(),
            modifiers = world.modifiers().count(),
            entities = world.entity_count(),
            "starting new simulation"
        );
        self.world = Some(world);
        Ok(())
    }

    fn restore(&mut self) -> SimResult<()> {
        let snapshot = self.store.load_snapshot()?.ok_or(SimError::NoSnapshot)?;
        let world = WorldState::from_snapshot(snapshot)?;
        for id in world.module_ids() {
            self.modules.push(self.registry.create(id)?);
        }
        tracing::info!(
            tick = world.tick(),
            now = %world.now(),
            modules = world.module_ids().len(),
            "resuming simulation"
        );
        self.world = Some(world);
        Ok(())
    }

    fn finish_init(&mut self, prepared: SimResult<()>) -> SimResult<()> {
        let result = prepared.and_then(|()| self.init_modules());
        match result {
            Ok(()) => {
                if let Some(world) = &self.world {
                    self.summary.reset(world);
                }
                self.state = DriverState::Running;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "simulation failed to initialize");
                self.state = DriverState::Stopped;
                Err(e)
            }
        }
    }

    fn init_modules(&mut self) -> SimResult<()> {
        let world = self.world.as_mut().ok_or_else(no_world)?;
        for module in &mut self.modules {
            let config = self.config.module_config(module.id());
            module.init(world, config)?;
            tracing::debug!(module = module.id(), "module initialized");
        }
        Ok(())
    }

    /// Execute one tick. Any error stops the simulation.
    pub fn step(&mut self) -> SimResult<NaiveDateTime> {
        self.expect_state(DriverState::Running)?;
        match self.tick() {
            Ok(now) => Ok(now),
            Err(e) => {
                tracing::error!(error = %e, "tick failed, stopping");
                self.state = DriverState::Stopped;
                Err(e)
            }
        }
    }

    fn tick(&mut self) -> SimResult<NaiveDateTime> {
        let world = self.world.as_mut().ok_or_else(no_world)?;
        let now = world.clock_mut().advance();

        engine::expire_modifiers(world, now);
        engine::renew_modifiers(world, now)?;

        for module in &mut self.modules {
            module.on_tick(world, now)?;
        }

        let interval = self.config.snapshot_interval;
        if interval > 0 && world.tick() % interval == 0 {
            self.store.save_snapshot(&world.to_snapshot())?;
        }

        if let Some(summary) = self.summary.observe(world) {
            tracing::info!("{summary}");
        }
        Ok(now)
    }

    /// Tick until the limit is reached or a stop is requested, then shut
    /// down. `max_ticks` overrides the configured limit.
    pub fn run(&mut self, max_ticks: Option<u64>) -> SimResult<RunReport> {
        self.expect_state(DriverState::Running)?;
        let limit = max_ticks.or(self.config.max_ticks);
        let mut ticks_run = 0;

        let stop_reason = loop {
            if self.stop.is_stop_requested() {
                break StopReason::StopRequested;
            }
            if limit.is_some_and(|limit| ticks_run >= limit) {
                break StopReason::TickLimit;
            }
            self.step()?;
            ticks_run += 1;
        };

        self.shutdown()?;
        let world = self.world.as_ref().ok_or_else(no_world)?;
        let report = RunReport {
            ticks_run,
            final_tick: world.tick(),
            now: world.now(),
            stop_reason,
        };
        tracing::info!(
            ticks = report.ticks_run,
            final_tick = report.final_tick,
            now = %report.now,
            reason = ?report.stop_reason,
            "simulation stopped"
        );
        Ok(report)
    }

    /// Run module shutdown hooks and persist the final snapshot.
    pub fn shutdown(&mut self) -> SimResult<()> {
        self.expect_state(DriverState::Running)?;
        self.state = DriverState::ShuttingDown;
        let result = self.shutdown_inner();
        self.state = DriverState::Stopped;
        result
    }

    fn shutdown_inner(&mut self) -> SimResult<()> {
        let world = self.world.as_mut().ok_or_else(no_world)?;
        for module in &mut self.modules {
            module.shutdown(world)?;
        }
        self.store.save_snapshot(&world.to_snapshot())?;
        Ok(())
    }

    fn expect_state(&self, expected: DriverState) -> SimResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SimError::InvalidState {
                actual: self.state.to_string(),
                expected: expected.to_string(),
            })
        }
    }
}

fn no_world() -> SimError {
    SimError::InvalidState {
        actual: "without a world".to_string(),
        expected: "initialized".to_string(),
    }
}
