//! Matrix providers and the incremental matrix cache.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::DispatchError;
use crate::models::{Task, TaskId};

use super::{Edge, MatrixPair};

/// Source of distance/duration legs between tasks.
///
/// Implementations typically wrap a routing service; the engine only ever
/// calls this outside of searches, so the core stays free of blocking I/O.
pub trait MatrixProvider: Send + Sync {
    /// Legs from every origin to every destination.
    fn fetch(&self, origins: &[Task], destinations: &[Task]) -> Result<MatrixPair, DispatchError>;

    /// Full matrix over `tasks`.
    fn get(&self, tasks: &[Task]) -> Result<MatrixPair, DispatchError> {
        self.fetch(tasks, tasks)
    }
}

/// In-process provider: straight-line distance, duration = distance / speed.
///
/// # Examples
///
/// ```
/// use u_dispatch::distance::{EuclideanProvider, MatrixProvider};
/// use u_dispatch::models::{Location, Task};
///
/// let tasks = vec![
///     Task::depot("D", Location::new(0.0, 0.0)),
///     Task::new("A", Location::new(3.0, 4.0), 1, 0, 100).unwrap(),
/// ];
/// let m = EuclideanProvider::new(2.0).get(&tasks).unwrap();
/// assert!((m.lookup("D", "A").distance - 5.0).abs() < 1e-10);
/// assert!((m.lookup("D", "A").duration - 2.5).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EuclideanProvider {
    speed: f64,
}

impl EuclideanProvider {
    /// Creates a provider travelling at `speed` coordinate units per time unit.
    pub fn new(speed: f64) -> Self {
        Self { speed }
    }
}

impl Default for EuclideanProvider {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl MatrixProvider for EuclideanProvider {
    fn fetch(&self, origins: &[Task], destinations: &[Task]) -> Result<MatrixPair, DispatchError> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(DispatchError::Matrix(format!("invalid speed {}", self.speed)));
        }
        let mut matrix = MatrixPair::new();
        for from in origins {
            for to in destinations {
                let d = from.location().distance_to(to.location());
                matrix.insert(from.id().clone(), to.id().clone(), Edge::new(d, d / self.speed));
            }
        }
        Ok(matrix)
    }
}

/// The current matrix snapshot plus the ids it covers.
///
/// [`MatrixCache::ensure`] fetches legs only for ids not yet covered, and
/// [`MatrixCache::invalidate`] drops ids whose location changed so the next
/// `ensure` refetches just those.
///
/// Snapshots handed out by [`MatrixCache::snapshot`] are immutable. Extending
/// the matrix while one is still held copies the whole map first
/// (copy-on-write through [`Arc::make_mut`]), so that case costs O(N²) in
/// the number of known ids. With no outstanding snapshot the delta is
/// merged in place and only the new legs are fetched either way.
///
/// # Examples
///
/// ```
/// use u_dispatch::distance::{EuclideanProvider, MatrixCache};
/// use u_dispatch::models::{Location, Task};
///
/// let provider = EuclideanProvider::default();
/// let mut cache = MatrixCache::new();
/// let a = Task::new("A", Location::new(0.0, 0.0), 1, 0, 10).unwrap();
/// let b = Task::new("B", Location::new(0.0, 2.0), 1, 0, 10).unwrap();
/// assert_eq!(cache.ensure(&[a.clone()], &provider).unwrap(), 1);
/// assert_eq!(cache.ensure(&[a, b], &provider).unwrap(), 1);
/// assert!((cache.snapshot().lookup("A", "B").distance - 2.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MatrixCache {
    matrix: Arc<MatrixPair>,
    known: Vec<Task>,
    known_ids: FxHashSet<TaskId>,
}

impl MatrixCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an externally built matrix. Its ids are not tracked, so a
    /// provider-backed `ensure` will still fetch legs for tasks it sees.
    pub fn from_matrix(matrix: MatrixPair) -> Self {
        Self {
            matrix: Arc::new(matrix),
            ..Self::default()
        }
    }

    /// The current read-only snapshot.
    pub fn snapshot(&self) -> Arc<MatrixPair> {
        Arc::clone(&self.matrix)
    }

    /// Number of tasks whose legs were fetched through this cache.
    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    /// Fetches legs between new tasks and everything already known.
    ///
    /// Returns how many new task ids were added. On provider failure the
    /// previous snapshot stays in place.
    pub fn ensure(&mut self, tasks: &[Task], provider: &dyn MatrixProvider) -> Result<usize, DispatchError> {
        let mut fresh: Vec<Task> = Vec::new();
        let mut seen = FxHashSet::default();
        for task in tasks {
            if !self.known_ids.contains(task.id()) && seen.insert(task.id().clone()) {
                fresh.push(task.clone());
            }
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        let mut delta = provider.fetch(&fresh, &fresh)?;
        if !self.known.is_empty() {
            delta.merge(&provider.fetch(&fresh, &self.known)?);
            delta.merge(&provider.fetch(&self.known, &fresh)?);
        }

        Arc::make_mut(&mut self.matrix).merge(&delta);

        let added = fresh.len();
        for task in fresh {
            self.known_ids.insert(task.id().clone());
            self.known.push(task);
        }
        tracing::debug!(added, known = self.known.len(), "matrix extended");
        Ok(added)
    }

    /// Forgets `ids` so their legs are refetched on the next `ensure`.
    pub fn invalidate(&mut self, ids: &[TaskId]) {
        Arc::make_mut(&mut self.matrix).remove_ids(ids);
        self.known.retain(|t| !ids.contains(t.id()));
        for id in ids {
            self.known_ids.remove(id);
        }
    }

    /// Replaces the snapshot and forgets all tracked ids.
    pub fn replace(&mut self, matrix: MatrixPair) {
        *self = Self::from_matrix(matrix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        pairs: AtomicUsize,
    }

    impl MatrixProvider for CountingProvider {
        fn fetch(&self, origins: &[Task], destinations: &[Task]) -> Result<MatrixPair, DispatchError> {
            self.pairs.fetch_add(origins.len() * destinations.len(), Ordering::SeqCst);
            EuclideanProvider::default().fetch(origins, destinations)
        }
    }

    struct FailingProvider;

    impl MatrixProvider for FailingProvider {
        fn fetch(&self, _: &[Task], _: &[Task]) -> Result<MatrixPair, DispatchError> {
            Err(DispatchError::Matrix("service unavailable".into()))
        }
    }

    fn task(id: &str, x: f64) -> Task {
        Task::new(id, Location::new(x, 0.0), 1, 0, 10).expect("valid")
    }

    #[test]
    fn test_ensure_fetches_only_delta() {
        let provider = CountingProvider {
            pairs: AtomicUsize::new(0),
        };
        let mut cache = MatrixCache::new();
        cache.ensure(&[task("A", 0.0), task("B", 1.0)], &provider).expect("ok");
        assert_eq!(provider.pairs.load(Ordering::SeqCst), 4);

        cache
            .ensure(&[task("A", 0.0), task("B", 1.0), task("C", 3.0)], &provider)
            .expect("ok");
        // C->C, C->{A,B}, {A,B}->C
        assert_eq!(provider.pairs.load(Ordering::SeqCst), 4 + 1 + 2 + 2);
        assert!((cache.snapshot().lookup("A", "C").distance - 3.0).abs() < 1e-10);
        assert!((cache.snapshot().lookup("C", "B").distance - 2.0).abs() < 1e-10);

        assert_eq!(cache.ensure(&[task("C", 3.0)], &provider).expect("ok"), 0);
        assert_eq!(provider.pairs.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn test_invalidate_refetches() {
        let provider = EuclideanProvider::default();
        let mut cache = MatrixCache::new();
        cache.ensure(&[task("A", 0.0), task("B", 1.0)], &provider).expect("ok");
        cache.invalidate(&[TaskId::new("B")]);
        assert!(cache.snapshot().get("A", "B").is_none());
        assert_eq!(cache.known_len(), 1);

        cache.ensure(&[task("B", 5.0)], &provider).expect("ok");
        assert!((cache.snapshot().lookup("A", "B").distance - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_failure_keeps_snapshot() {
        let mut cache = MatrixCache::new();
        cache
            .ensure(&[task("A", 0.0), task("B", 1.0)], &EuclideanProvider::default())
            .expect("ok");
        let before = cache.snapshot();
        assert!(cache.ensure(&[task("C", 2.0)], &FailingProvider).is_err());
        assert_eq!(cache.snapshot().len(), before.len());
        assert_eq!(cache.known_len(), 2);
    }

    #[test]
    fn test_held_snapshot_is_not_extended() {
        let provider = EuclideanProvider::default();
        let mut cache = MatrixCache::new();
        cache.ensure(&[task("A", 0.0)], &provider).expect("ok");
        let held = cache.snapshot();

        cache.ensure(&[task("B", 1.0)], &provider).expect("ok");
        assert!(held.get("A", "B").is_none());
        assert!(cache.snapshot().get("A", "B").is_some());

        drop(held);
        cache.invalidate(&[TaskId::new("B")]);
        assert!(cache.snapshot().get("A", "B").is_none());
    }

    #[test]
    fn test_invalid_speed() {
        assert!(EuclideanProvider::new(0.0).get(&[task("A", 0.0)]).is_err());
    }
}
