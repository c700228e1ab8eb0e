//! Task, location, and time window types.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Priority assigned to confirmed tasks, and to ghosts once promoted.
pub const BASELINE_PRIORITY: f64 = 1.0;

/// Priority assigned at intake to speculative (unconfirmed) tasks.
pub const SPECULATIVE_PRIORITY: f64 = 0.1;

/// Unique task identity. Matrix lookups and route edits are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a task id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A coordinate pair (longitude, latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Longitude, or x.
    pub lon: f64,
    /// Latitude, or y.
    pub lat: f64,
}

impl Location {
    /// Creates a location.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Straight-line (Euclidean) distance in coordinate units.
    pub fn distance_to(&self, other: &Location) -> f64 {
        let dx = self.lon - other.lon;
        let dy = self.lat - other.lat;
        (dx * dx + dy * dy).sqrt()
    }
}

/// What a stop does when the vehicle reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Load is picked up.
    Pickup,
    /// Load is dropped off.
    #[serde(alias = "delivery")]
    Dropoff,
    /// Depot or anchor stop (no load).
    Depot,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Pickup => f.write_str("pickup"),
            TaskKind::Dropoff => f.write_str("dropoff"),
            TaskKind::Depot => f.write_str("depot"),
        }
    }
}

/// Service time window in integer time units.
///
/// # Examples
///
/// ```
/// use u_dispatch::models::TimeWindow;
///
/// let tw = TimeWindow::new(100, 200).unwrap();
/// assert!(tw.contains(150.0));
/// assert!(!tw.contains(250.0));
/// assert!(TimeWindow::new(200, 100).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    earliest: i64,
    latest: i64,
}

impl TimeWindow {
    /// Creates a time window. Returns `None` if `earliest > latest`.
    pub fn new(earliest: i64, latest: i64) -> Option<Self> {
        if earliest > latest {
            return None;
        }
        Some(Self { earliest, latest })
    }

    /// A window that never constrains arrival.
    pub fn unbounded() -> Self {
        Self {
            earliest: 0,
            latest: i64::MAX,
        }
    }

    /// Earliest allowable service start.
    pub fn earliest(&self) -> i64 {
        self.earliest
    }

    /// Latest allowable arrival.
    pub fn latest(&self) -> i64 {
        self.latest
    }

    /// Returns `true` if the given time falls within this window.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.earliest as f64 && time <= self.latest as f64
    }

    /// Waiting time if arriving at `arrival`; zero when on time or late.
    pub fn waiting_time(&self, arrival: f64) -> f64 {
        let earliest = self.earliest as f64;
        if arrival < earliest {
            earliest - arrival
        } else {
            0.0
        }
    }

    /// Returns `true` if arriving at `arrival` misses the window.
    pub fn is_violated(&self, arrival: f64) -> bool {
        arrival > self.latest as f64
    }
}

/// A unit of work: a pickup, a dropoff, or a depot anchor.
///
/// Identity is immutable. The only lifecycle edits are flipping `confirmed`
/// (ghost promotion) and changing `kind` at assignment time.
///
/// # Examples
///
/// ```
/// use u_dispatch::models::{Location, Task, TaskKind};
///
/// let t = Task::new("T1", Location::new(77.6, 12.9), 2, 0, 500)
///     .unwrap()
///     .with_perishable(true);
/// assert_eq!(t.demand(), 2);
/// assert!(t.is_confirmed());
/// assert_eq!(t.kind(), TaskKind::Pickup);
///
/// let ghost = Task::new("G1", Location::new(77.6, 12.9), 1, 0, 1000)
///     .unwrap()
///     .speculative();
/// assert!(!ghost.is_confirmed());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    location: Location,
    demand: i32,
    window: TimeWindow,
    #[serde(default)]
    perishable: bool,
    #[serde(default = "default_confirmed")]
    confirmed: bool,
    kind: TaskKind,
    #[serde(default = "default_priority")]
    priority: f64,
}

fn default_confirmed() -> bool {
    true
}

fn default_priority() -> f64 {
    BASELINE_PRIORITY
}

impl Task {
    /// Creates a confirmed pickup task.
    ///
    /// Returns `None` if `demand` is not positive or `earliest > latest`.
    pub fn new(
        id: impl Into<TaskId>,
        location: Location,
        demand: i32,
        earliest: i64,
        latest: i64,
    ) -> Option<Self> {
        if demand <= 0 {
            return None;
        }
        let window = TimeWindow::new(earliest, latest)?;
        Some(Self {
            id: id.into(),
            location,
            demand,
            window,
            perishable: false,
            confirmed: true,
            kind: TaskKind::Pickup,
            priority: BASELINE_PRIORITY,
        })
    }

    /// Creates a depot anchor stop (demand 0, unbounded window).
    pub fn depot(id: impl Into<TaskId>, location: Location) -> Self {
        Self {
            id: id.into(),
            location,
            demand: 0,
            window: TimeWindow::unbounded(),
            perishable: false,
            confirmed: true,
            kind: TaskKind::Depot,
            priority: BASELINE_PRIORITY,
        }
    }

    /// Normalizes a task arriving from intake: speculative tasks get
    /// [`SPECULATIVE_PRIORITY`], confirmed ones [`BASELINE_PRIORITY`].
    pub fn from_intake(mut self) -> Self {
        self.priority = if self.confirmed {
            BASELINE_PRIORITY
        } else {
            SPECULATIVE_PRIORITY
        };
        self
    }

    /// Marks the task as perishable.
    pub fn with_perishable(mut self, perishable: bool) -> Self {
        self.perishable = perishable;
        self
    }

    /// Sets the task kind.
    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the informational priority weight.
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the task as a ghost (unconfirmed, forecast demand).
    pub fn speculative(mut self) -> Self {
        self.confirmed = false;
        self
    }

    /// Checks the invariants that deserialization cannot enforce.
    pub fn validate(&self) -> Result<(), DispatchError> {
        let invalid = |reason: &str| DispatchError::InvalidTask {
            task_id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.window.earliest > self.window.latest {
            return Err(invalid("earliest is after latest"));
        }
        if self.kind == TaskKind::Depot {
            if self.demand != 0 {
                return Err(invalid("depot stops carry no demand"));
            }
        } else if self.demand <= 0 {
            return Err(invalid("demand must be positive"));
        }
        if !self.priority.is_finite() {
            return Err(invalid("priority must be finite"));
        }
        Ok(())
    }

    /// Task id.
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Task location.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Load units.
    pub fn demand(&self) -> i32 {
        self.demand
    }

    /// Service time window.
    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    /// Whether the load is perishable.
    pub fn is_perishable(&self) -> bool {
        self.perishable
    }

    /// `false` for ghost (speculative) tasks.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Task kind.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Informational priority weight; not enforced by any search.
    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Demand that counts toward vehicle capacity (zero for ghosts).
    pub fn committed_demand(&self) -> i32 {
        if self.confirmed {
            self.demand
        } else {
            0
        }
    }

    pub(crate) fn set_kind(&mut self, kind: TaskKind) {
        self.kind = kind;
    }

    pub(crate) fn confirm(&mut self) {
        self.confirmed = true;
        self.priority = BASELINE_PRIORITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new(0.0, 0.0)
    }

    #[test]
    fn test_time_window_invalid() {
        assert!(TimeWindow::new(20, 10).is_none());
        assert!(TimeWindow::new(10, 10).is_some());
    }

    #[test]
    fn test_time_window_waiting_and_violation() {
        let tw = TimeWindow::new(10, 20).expect("valid");
        assert!((tw.waiting_time(5.0) - 5.0).abs() < 1e-10);
        assert!(tw.waiting_time(15.0).abs() < 1e-10);
        assert!(!tw.is_violated(20.0));
        assert!(tw.is_violated(20.5));
    }

    #[test]
    fn test_task_new_rejects_bad_input() {
        assert!(Task::new("T", loc(), 0, 0, 10).is_none());
        assert!(Task::new("T", loc(), -1, 0, 10).is_none());
        assert!(Task::new("T", loc(), 1, 10, 0).is_none());
    }

    #[test]
    fn test_task_defaults() {
        let t = Task::new("T1", loc(), 3, 0, 100).expect("valid");
        assert_eq!(t.id().as_str(), "T1");
        assert!(t.is_confirmed());
        assert!(!t.is_perishable());
        assert_eq!(t.priority(), BASELINE_PRIORITY);
        assert_eq!(t.committed_demand(), 3);
    }

    #[test]
    fn test_ghost_demand_not_committed() {
        let g = Task::new("G", loc(), 2, 0, 100).expect("valid").speculative();
        assert_eq!(g.demand(), 2);
        assert_eq!(g.committed_demand(), 0);
    }

    #[test]
    fn test_from_intake_priority() {
        let t = Task::new("T", loc(), 1, 0, 1)
            .expect("valid")
            .with_priority(0.4)
            .from_intake();
        assert_eq!(t.priority(), BASELINE_PRIORITY);
        let g = Task::new("G", loc(), 1, 0, 1)
            .expect("valid")
            .speculative()
            .from_intake();
        assert_eq!(g.priority(), SPECULATIVE_PRIORITY);
    }

    #[test]
    fn test_depot() {
        let d = Task::depot("DEPOT_1", loc());
        assert_eq!(d.kind(), TaskKind::Depot);
        assert_eq!(d.demand(), 0);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_validate_deserialized() {
        let json = r#"{"id":"T9","location":{"lon":1.0,"lat":2.0},"demand":0,
            "window":{"earliest":0,"latest":5},"kind":"delivery"}"#;
        let t: Task = serde_json::from_str(json).expect("parses");
        assert_eq!(t.kind(), TaskKind::Dropoff);
        assert!(t.is_confirmed());
        assert!(matches!(
            t.validate(),
            Err(DispatchError::InvalidTask { .. })
        ));
    }

    #[test]
    fn test_location_distance() {
        let a = Location::new(0.0, 0.0);
        let b = Location::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-10);
    }
}
