//! Top-level dispatcher owning fleet state.
//!
//! All route mutations go through one `RwLock<Fleet>`. Searches run under
//! the read lock against a consistent snapshot; commits take the write lock
//! and compare the fleet version the search saw. A mismatch means another
//! commit landed in between, so the search is redone (bounded by
//! `max_commit_retries`).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::batch::{BatchCoordinator, BatchState, Clock, FlushReport, SystemClock};
use crate::config::DispatchConfig;
use crate::distance::{MatrixCache, MatrixPair, MatrixProvider};
use crate::error::{DispatchError, UnassignedReason};
use rustc_hash::FxHashSet;

use crate::evaluation::{
    route_is_perishable, score, within_reserved_capacity, Feasibility, FeasibilityCheck,
};
use crate::ghost::{nearest_eligible, promote, trial_insertion, GhostPool, GhostTrial};
use crate::insertion::{InsertionPlan, InsertionSearch};
use crate::models::{Fleet, Location, Task, TaskId, TaskKind, Vehicle, VehicleId};
use crate::seed::SeedData;

use super::snapshot::{round2, FleetSnapshot, TaskSummary, VehicleSummary};

/// A ghost trial bound to the fleet version it was computed on.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteProposal {
    /// Vehicle the trial was run against.
    pub vehicle_id: VehicleId,
    /// Fleet version to pass to [`Dispatcher::commit_route`].
    pub version: u64,
    /// The trial itself.
    pub trial: GhostTrial,
}

/// Real-time dispatch engine.
///
/// # Examples
///
/// ```
/// use u_dispatch::config::DispatchConfig;
/// use u_dispatch::dispatch::Dispatcher;
/// use u_dispatch::models::{Fleet, Location, Task, Vehicle};
///
/// let at = Location::new(0.0, 0.0);
/// let fleet = Fleet::new(vec![Vehicle::new(1, 10).with_route(vec![Task::depot("DEPOT", at)])]);
/// let dispatcher = Dispatcher::new(fleet, DispatchConfig::default()).unwrap();
///
/// let vehicle = dispatcher.reroute_now(Task::new("T1", at, 1, 0, 100).unwrap()).unwrap();
/// assert_eq!(vehicle, 1);
/// assert_eq!(dispatcher.fleet().vehicles()[0].route().len(), 2);
/// ```
pub struct Dispatcher {
    config: DispatchConfig,
    fleet: RwLock<Fleet>,
    matrix: RwLock<MatrixCache>,
    provider: Option<Arc<dyn MatrixProvider>>,
    feasibility: Arc<dyn FeasibilityCheck>,
    batch: BatchCoordinator,
    ghosts: Mutex<GhostPool>,
    tasks: Mutex<Vec<Task>>,
}

impl Dispatcher {
    /// Creates a dispatcher over `fleet` with a permissive feasibility
    /// predicate, an empty matrix, and the system clock.
    pub fn new(fleet: Fleet, config: DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        let batch = BatchCoordinator::new(config.batch.clone(), Arc::new(SystemClock));
        Ok(Self {
            config,
            fleet: RwLock::new(fleet),
            matrix: RwLock::new(MatrixCache::new()),
            provider: None,
            feasibility: Arc::new(Feasibility::Permissive),
            batch,
            ghosts: Mutex::new(GhostPool::new()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Uses a fixed, externally built matrix.
    pub fn with_matrix(self, matrix: MatrixPair) -> Self {
        self.write_matrix().replace(matrix);
        self
    }

    /// Fetches legs for new tasks from `provider` before each search.
    pub fn with_provider(mut self, provider: Arc<dyn MatrixProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replaces the feasibility predicate used by every search.
    pub fn with_feasibility(mut self, feasibility: Arc<dyn FeasibilityCheck>) -> Self {
        self.feasibility = feasibility;
        self
    }

    /// Replaces the batch clock. Drops anything already buffered.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.batch = BatchCoordinator::new(self.config.batch.clone(), clock);
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn read_fleet(&self) -> RwLockReadGuard<'_, Fleet> {
        self.fleet.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_fleet(&self) -> RwLockWriteGuard<'_, Fleet> {
        self.fleet.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_matrix(&self) -> RwLockWriteGuard<'_, MatrixCache> {
        self.matrix.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ghost_pool(&self) -> MutexGuard<'_, GhostPool> {
        self.ghosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current fleet.
    pub fn fleet(&self) -> Fleet {
        self.read_fleet().clone()
    }

    /// Current fleet version.
    pub fn version(&self) -> u64 {
        self.read_fleet().version()
    }

    /// Current matrix snapshot.
    pub fn matrix(&self) -> Arc<MatrixPair> {
        self.matrix
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Matrix covering the fleet plus `extra`, extended through the provider
    /// when one is configured. Never called with the fleet lock held.
    fn matrix_for(&self, extra: &[Task]) -> Result<Arc<MatrixPair>, DispatchError> {
        let Some(provider) = &self.provider else {
            return Ok(self.matrix());
        };
        let mut wanted = self.read_fleet().routed_tasks();
        wanted.extend_from_slice(extra);
        let mut cache = self.write_matrix();
        cache.ensure(&wanted, provider.as_ref())?;
        Ok(cache.snapshot())
    }

    /// Like [`Self::matrix_for`] with no extra tasks, falling back to the
    /// cached snapshot when the provider fails.
    fn current_matrix(&self) -> Arc<MatrixPair> {
        self.matrix_for(&[]).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "matrix refresh failed, using cached legs");
            self.matrix()
        })
    }

    fn search<'a>(&'a self, matrix: &'a MatrixPair) -> InsertionSearch<'a> {
        InsertionSearch::new(matrix, self.feasibility.as_ref())
            .with_anchor_protection(self.config.protect_anchor)
            .with_parallelism(self.config.parallel_search)
    }

    fn check_new_task(&self, task: &Task) -> Result<(), DispatchError> {
        task.validate()?;
        let id = task.id().as_str();
        let routed = self.read_fleet().find_task(id).is_some();
        let pooled = self.ghost_pool().contains(id);
        if routed || pooled || self.batch.contains(id) {
            return Err(DispatchError::InvalidTask {
                task_id: task.id().clone(),
                reason: "task id already in use".into(),
            });
        }
        Ok(())
    }

    fn register(&self, task: &Task) {
        let mut registry = self.registry();
        if !registry.iter().any(|t| t.id() == task.id()) {
            registry.push(task.clone());
        }
    }

    /// Searches and commits, redoing the search when the fleet moved on.
    fn insert_with_retry(&self, task: &Task) -> Result<InsertionPlan, DispatchError> {
        for attempt in 1..=self.config.max_commit_retries {
            let matrix = self.matrix_for(std::slice::from_ref(task))?;
            let plan = self.search(&matrix).find(&self.read_fleet(), task)?;
            let mut fleet = self.write_fleet();
            if fleet.version() != plan.version {
                tracing::debug!(task_id = %task.id(), attempt, "fleet changed during search, retrying");
                continue;
            }
            fleet.splice(plan.vehicle_index, plan.position, task.clone());

            let route = fleet.vehicles()[plan.vehicle_index].route();
            let from = plan.position.saturating_sub(1);
            let to = (plan.position + 2).min(route.len());
            for (a, b) in matrix.missing_pairs(&route[from..to]) {
                tracing::warn!(from = %a, to = %b, "no matrix entry, assuming zero cost");
            }
            tracing::info!(
                task_id = %task.id(),
                vehicle_id = plan.vehicle_id,
                position = plan.position,
                cost = plan.cost,
                "task assigned"
            );
            return Ok(plan);
        }

        Err(DispatchError::StaleCommit {
            attempts: self.config.max_commit_retries,
        })
    }

    /// Buffers a confirmed task. Returns the flush report if this task
    /// crossed a batch threshold.
    pub fn add_task(&self, task: Task) -> Result<Option<FlushReport>, DispatchError> {
        if !task.is_confirmed() {
            return Err(DispatchError::InvalidTask {
                task_id: task.id().clone(),
                reason: "ghost tasks belong in the ghost pool".into(),
            });
        }
        self.check_new_task(&task)?;
        let task = task.from_intake();
        self.register(&task);
        Ok(self
            .batch
            .submit(task, |t| self.insert_with_retry(t).map(|plan| plan.vehicle_id)))
    }

    /// Flushes the pending batch now.
    pub fn flush(&self) -> FlushReport {
        self.batch
            .flush(|t| self.insert_with_retry(t).map(|plan| plan.vehicle_id))
    }

    /// Flushes if the time threshold passed; meant for a periodic tick.
    pub fn poll(&self) -> Option<FlushReport> {
        self.batch
            .poll(|t| self.insert_with_retry(t).map(|plan| plan.vehicle_id))
    }

    /// Number of buffered tasks.
    pub fn pending_len(&self) -> usize {
        self.batch.pending_len()
    }

    /// Batch coordinator state.
    pub fn batch_state(&self) -> BatchState {
        self.batch.state()
    }

    /// Inserts `task` immediately, bypassing the batch.
    pub fn reroute_now(&self, task: Task) -> Result<VehicleId, DispatchError> {
        self.check_new_task(&task)?;
        let task = task.from_intake();
        self.register(&task);
        self.insert_with_retry(&task).map(|plan| plan.vehicle_id)
    }

    /// Adds a forecast task to the ghost pool.
    pub fn register_ghost(&self, ghost: Task) -> Result<(), DispatchError> {
        self.check_new_task(&ghost)?;
        self.ghost_pool().insert(ghost)
    }

    /// Pooled ghosts in registration order.
    pub fn ghosts(&self) -> Vec<Task> {
        self.ghost_pool().iter().cloned().collect()
    }

    /// Confirmed tasks seen by intake, routed or not.
    pub fn tasks(&self) -> Vec<Task> {
        self.registry().clone()
    }

    /// Trial-inserts `ghost` into one vehicle without committing anything.
    pub fn trial_ghost_insertion(
        &self,
        vehicle_id: VehicleId,
        ghost: &Task,
    ) -> Result<RouteProposal, DispatchError> {
        let matrix = self.matrix_for(std::slice::from_ref(ghost))?;
        let fleet = self.read_fleet();
        let vehicle = fleet
            .vehicle(vehicle_id)
            .ok_or(DispatchError::UnknownVehicle(vehicle_id))?;
        let trial = trial_insertion(vehicle, ghost, &matrix, self.feasibility.as_ref());
        tracing::debug!(
            vehicle_id,
            ghost_id = %ghost.id(),
            improved = trial.improved(),
            cost = trial.cost,
            baseline = trial.baseline_cost,
            "ghost trial"
        );
        Ok(RouteProposal {
            vehicle_id,
            version: fleet.version(),
            trial,
        })
    }

    /// Replaces a vehicle's route with an accepted proposal.
    ///
    /// The new route must leave every stop up to the current one in place,
    /// keep the remaining stops in order, and add nothing but pooled ghosts
    /// exactly as pooled. Its demand, ghosts included, must fit the vehicle
    /// and it must pass the feasibility predicate. Added ghosts leave the
    /// ghost pool.
    pub fn commit_route(
        &self,
        vehicle_id: VehicleId,
        route: Vec<Task>,
        expected_version: u64,
    ) -> Result<(), DispatchError> {
        let matrix = self.matrix_for(&route)?;
        let mut fleet = self.write_fleet();
        if fleet.version() != expected_version {
            return Err(DispatchError::StaleCommit { attempts: 1 });
        }
        let index = fleet
            .index_of(vehicle_id)
            .ok_or(DispatchError::UnknownVehicle(vehicle_id))?;
        let vehicle = &fleet.vehicles()[index];
        let invalid = |reason: String| DispatchError::InvalidRoute { vehicle_id, reason };

        let current = vehicle.route();
        let fixed = (vehicle.progress_index() + 1).min(current.len());
        let prefix_kept = route
            .iter()
            .take(fixed)
            .map(Task::id)
            .eq(current[..fixed].iter().map(Task::id));
        if !prefix_kept {
            return Err(invalid("stops up to the current one must stay in place".into()));
        }
        if !keeps_order(current, &route) {
            return Err(invalid("existing stops must be kept in order".into()));
        }
        let unique = {
            let mut seen = FxHashSet::default();
            route.iter().all(|t| seen.insert(t.id().as_str()))
        };
        if !unique {
            return Err(invalid("route repeats a stop".into()));
        }

        let mut pool = self.ghost_pool();
        let mut added = Vec::new();
        for stop in &route {
            if vehicle.position_of(stop.id().as_str()).is_some() {
                continue;
            }
            if pool.get(stop.id().as_str()) != Some(stop) {
                return Err(invalid(format!("stop {} is not a pooled ghost", stop.id())));
            }
            added.push(stop.id().clone());
        }
        if !within_reserved_capacity(&route, vehicle) {
            return Err(invalid("capacity exceeded".into()));
        }
        if !self.feasibility.is_feasible(&route, vehicle, &matrix) {
            return Err(invalid("rejected by feasibility check".into()));
        }

        fleet.replace_route(index, route);
        pool.remove_all(&added);
        tracing::info!(vehicle_id, added = added.len(), "route committed");
        Ok(())
    }

    /// Confirms a ghost. A pooled ghost leaves the pool; a ghost already
    /// routed is confirmed in place, unless its demand no longer fits the
    /// vehicle's committed load. No route structure changes.
    pub fn promote_ghost(&self, ghost_id: &str) -> Result<Task, DispatchError> {
        let pooled = self.ghost_pool().take(ghost_id);
        if let Some(ghost) = pooled {
            let task = promote(ghost);
            self.register(&task);
            tracing::info!(ghost_id, "ghost promoted");
            return Ok(task);
        }

        let mut fleet = self.write_fleet();
        let Some((vehicle_index, position)) = fleet.find_task(ghost_id) else {
            return Err(DispatchError::UnknownGhost(TaskId::new(ghost_id)));
        };
        let vehicle = &fleet.vehicles()[vehicle_index];
        let stop = &vehicle.route()[position];
        if stop.is_confirmed() {
            return Err(DispatchError::UnknownGhost(TaskId::new(ghost_id)));
        }
        let ahead = position >= vehicle.progress_index();
        if ahead && vehicle.load() + stop.demand() > vehicle.capacity() {
            tracing::warn!(
                ghost_id,
                vehicle_id = vehicle.id(),
                load = vehicle.load(),
                capacity = vehicle.capacity(),
                "promotion would overload vehicle"
            );
            return Err(DispatchError::unassigned(stop.id(), UnassignedReason::OverCapacity));
        }
        fleet.confirm_task(ghost_id);
        let task = fleet.vehicles()[vehicle_index].route()[position].clone();
        drop(fleet);
        self.register(&task);
        tracing::info!(ghost_id, "routed ghost promoted");
        Ok(task)
    }

    /// Appends a pooled ghost to the nearest vehicle with spare capacity.
    ///
    /// `kind` overrides the ghost's kind at assignment time. On failure the
    /// ghost stays pooled.
    pub fn assign_ghost_to_nearest_eligible(
        &self,
        ghost_id: &str,
        kind: Option<TaskKind>,
    ) -> Result<VehicleId, DispatchError> {
        let mut ghost = self
            .ghost_pool()
            .get(ghost_id)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownGhost(TaskId::new(ghost_id)))?;
        if let Some(kind) = kind {
            ghost = ghost.with_kind(kind);
        }
        self.matrix_for(std::slice::from_ref(&ghost))?;

        let mut fleet = self.write_fleet();
        let mut pool = self.ghost_pool();
        let Some(index) = nearest_eligible(&fleet, &ghost) else {
            return Err(DispatchError::unassigned(ghost.id(), UnassignedReason::NoEligibleVehicle));
        };
        if pool.take(ghost_id).is_none() {
            return Err(DispatchError::UnknownGhost(TaskId::new(ghost_id)));
        }
        let vehicle_id = fleet.vehicles()[index].id();
        fleet.append(index, ghost);
        tracing::info!(ghost_id, vehicle_id, "ghost bound to nearest eligible vehicle");
        Ok(vehicle_id)
    }

    /// Changes the kind of a routed task.
    pub fn set_task_kind(&self, task_id: &str, kind: TaskKind) -> Result<(), DispatchError> {
        let mut fleet = self.write_fleet();
        if fleet.find_task(task_id).is_none() {
            return Err(DispatchError::InvalidTask {
                task_id: TaskId::new(task_id),
                reason: "task is not routed".into(),
            });
        }
        fleet.set_kind(task_id, kind);
        Ok(())
    }

    /// Cost of a vehicle's untraversed suffix.
    pub fn route_cost(&self, vehicle_id: VehicleId) -> Result<f64, DispatchError> {
        let matrix = self.matrix_for(&[])?;
        let fleet = self.read_fleet();
        let vehicle = fleet
            .vehicle(vehicle_id)
            .ok_or(DispatchError::UnknownVehicle(vehicle_id))?;
        Ok(untraversed_cost(vehicle, &matrix))
    }

    /// Records a vehicle's reported position.
    pub fn update_vehicle_location(
        &self,
        vehicle_id: VehicleId,
        location: Location,
    ) -> Result<(), DispatchError> {
        let mut fleet = self.write_fleet();
        let index = fleet
            .index_of(vehicle_id)
            .ok_or(DispatchError::UnknownVehicle(vehicle_id))?;
        fleet.set_location(index, location);
        Ok(())
    }

    /// Travel time from the current stop to the next one; `None` at the
    /// end of the route. Unknown legs use `default_eta`.
    pub fn eta_to_next(&self, vehicle_id: VehicleId) -> Result<Option<f64>, DispatchError> {
        let matrix = self.matrix_for(&[])?;
        let fleet = self.read_fleet();
        let vehicle = fleet
            .vehicle(vehicle_id)
            .ok_or(DispatchError::UnknownVehicle(vehicle_id))?;
        Ok(next_eta(vehicle, &matrix, self.config.default_eta))
    }

    /// Advances every vehicle whose next leg is shorter than
    /// `eta_advance_threshold`. Returns the vehicles that moved.
    pub fn advance_fleet(&self) -> Vec<VehicleId> {
        let matrix = self.current_matrix();
        let mut fleet = self.write_fleet();
        let mut moved = Vec::new();
        for index in 0..fleet.len() {
            let vehicle = &fleet.vehicles()[index];
            let Some(eta) = next_eta(vehicle, &matrix, self.config.default_eta) else {
                continue;
            };
            if eta < self.config.eta_advance_threshold {
                let id = vehicle.id();
                if fleet.advance(index) {
                    moved.push(id);
                }
            }
        }
        if !moved.is_empty() {
            tracing::debug!(vehicles = ?moved, "vehicles advanced");
        }
        moved
    }

    /// Dashboard view of the whole dispatcher.
    pub fn snapshot(&self) -> FleetSnapshot {
        let matrix = self.current_matrix();
        let tasks: Vec<TaskSummary> = self.registry().iter().map(TaskSummary::from).collect();
        let ghosts: Vec<TaskSummary> = self.ghost_pool().iter().map(TaskSummary::from).collect();
        let pending = self.batch.pending_len();
        let fleet = self.read_fleet();
        let vehicles = fleet
            .vehicles()
            .iter()
            .map(|v| VehicleSummary {
                id: v.id(),
                name: v.name().map(str::to_string),
                route: v.route().iter().map(|t| t.id().clone()).collect(),
                capacity: v.capacity(),
                load: v.load(),
                progress_index: v.progress_index(),
                route_cost: round2(untraversed_cost(v, &matrix)),
            })
            .collect();
        FleetSnapshot {
            version: fleet.version(),
            vehicles,
            tasks,
            ghosts,
            pending,
        }
    }

    /// Replaces the fleet and clears the batch, ghost pool, and task registry.
    ///
    /// The fleet version keeps counting up across a reset, so proposals and
    /// plans made against the old fleet are rejected as stale.
    pub fn reset(&self, fleet: Fleet) {
        {
            let mut current = self.write_fleet();
            let version = current.version().max(fleet.version()) + 1;
            *current = fleet.with_version(version);
        }
        self.batch.clear();
        self.ghost_pool().clear();
        self.registry().clear();
        if self.provider.is_some() {
            *self.write_matrix() = MatrixCache::new();
        }
        tracing::info!("dispatcher reset");
    }

    /// Resets to seeded data: fleet, registered tasks, and ghost pool.
    pub fn reseed(&self, data: SeedData) -> Result<(), DispatchError> {
        self.reset(data.fleet);
        for task in &data.tasks {
            self.register(task);
        }
        let mut pool = self.ghost_pool();
        for ghost in data.ghosts {
            pool.insert(ghost)?;
        }
        Ok(())
    }
}

fn untraversed_cost(vehicle: &Vehicle, matrix: &MatrixPair) -> f64 {
    let suffix = vehicle.untraversed();
    score(suffix, matrix, route_is_perishable(suffix))
}

fn next_eta(vehicle: &Vehicle, matrix: &MatrixPair, default_eta: f64) -> Option<f64> {
    let ahead = vehicle.untraversed();
    if ahead.len() < 2 {
        return None;
    }
    let eta = matrix
        .get(ahead[0].id().as_str(), ahead[1].id().as_str())
        .map_or(default_eta, |edge| edge.duration);
    Some(eta)
}

/// Returns `true` if `current` is a subsequence of `proposed` by task id.
fn keeps_order(current: &[Task], proposed: &[Task]) -> bool {
    let mut remaining = proposed.iter();
    current
        .iter()
        .all(|stop| remaining.any(|t| t.id() == stop.id()))
}
