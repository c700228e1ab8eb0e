//! Id-keyed distance/duration lookup.

use rustc_hash::FxHashMap;

use crate::models::{Task, TaskId};

/// Distance and duration of one directed leg.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edge {
    /// Travel distance.
    pub distance: f64,
    /// Travel duration.
    pub duration: f64,
}

impl Edge {
    /// Creates an edge.
    pub fn new(distance: f64, duration: f64) -> Self {
        Self { distance, duration }
    }
}

/// A sparse matrix of legs keyed by task identity rather than position.
///
/// Because it is keyed by id, the same matrix serves every trial route.
/// Unknown pairs are valid: [`MatrixPair::lookup`] returns a zero edge.
///
/// # Examples
///
/// ```
/// use u_dispatch::distance::{Edge, MatrixPair};
///
/// let mut m = MatrixPair::new();
/// m.insert("A", "B", Edge::new(4.0, 2.0));
/// assert_eq!(m.get("A", "B"), Some(Edge::new(4.0, 2.0)));
/// assert_eq!(m.get("B", "A"), None);
/// assert_eq!(m.lookup("B", "A"), Edge::default());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MatrixPair {
    rows: FxHashMap<TaskId, FxHashMap<TaskId, Edge>>,
}

impl MatrixPair {
    /// Creates an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dense matrix from row-major grids in `ids` order.
    ///
    /// Returns `None` if a grid does not match `ids.len()` squared.
    pub fn from_rows(ids: &[TaskId], distances: &[Vec<f64>], durations: &[Vec<f64>]) -> Option<Self> {
        let n = ids.len();
        let square = |grid: &[Vec<f64>]| grid.len() == n && grid.iter().all(|row| row.len() == n);
        if !square(distances) || !square(durations) {
            return None;
        }
        let mut matrix = Self::new();
        for (i, from) in ids.iter().enumerate() {
            for (j, to) in ids.iter().enumerate() {
                matrix.insert(from.clone(), to.clone(), Edge::new(distances[i][j], durations[i][j]));
            }
        }
        Some(matrix)
    }

    /// Sets the leg `from -> to`.
    pub fn insert(&mut self, from: impl Into<TaskId>, to: impl Into<TaskId>, edge: Edge) {
        self.rows.entry(from.into()).or_default().insert(to.into(), edge);
    }

    /// Sets both `from -> to` and `to -> from`.
    pub fn insert_symmetric(&mut self, a: impl Into<TaskId>, b: impl Into<TaskId>, edge: Edge) {
        let a = a.into();
        let b = b.into();
        self.insert(a.clone(), b.clone(), edge);
        self.insert(b, a, edge);
    }

    /// The leg `from -> to`, if known.
    pub fn get(&self, from: &str, to: &str) -> Option<Edge> {
        self.rows.get(from).and_then(|row| row.get(to)).copied()
    }

    /// The leg `from -> to`, or a zero edge when unknown.
    pub fn lookup(&self, from: &str, to: &str) -> Edge {
        self.get(from, to).unwrap_or_default()
    }

    /// Returns `true` if any leg starts or ends at `id`.
    pub fn covers(&self, id: &str) -> bool {
        self.rows.contains_key(id) || self.rows.values().any(|row| row.contains_key(id))
    }

    /// Number of known legs.
    pub fn len(&self) -> usize {
        self.rows.values().map(|row| row.len()).sum()
    }

    /// Returns `true` if no legs are known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies every leg of `other` into this matrix, overwriting on conflict.
    pub fn merge(&mut self, other: &MatrixPair) {
        for (from, row) in &other.rows {
            let target = self.rows.entry(from.clone()).or_default();
            for (to, edge) in row {
                target.insert(to.clone(), *edge);
            }
        }
    }

    /// Drops every leg touching one of `ids`.
    pub fn remove_ids(&mut self, ids: &[TaskId]) {
        for id in ids {
            self.rows.remove(id.as_str());
        }
        for row in self.rows.values_mut() {
            for id in ids {
                row.remove(id.as_str());
            }
        }
    }

    /// Consecutive legs of `route` that the matrix does not know.
    pub fn missing_pairs(&self, route: &[Task]) -> Vec<(TaskId, TaskId)> {
        route
            .windows(2)
            .filter(|pair| self.get(pair[0].id().as_str(), pair[1].id().as_str()).is_none())
            .map(|pair| (pair[0].id().clone(), pair[1].id().clone()))
            .collect()
    }

    /// Returns `true` if every known leg equals its reverse within `tol`.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        self.rows.iter().all(|(from, row)| {
            row.iter().all(|(to, edge)| match self.get(to.as_str(), from.as_str()) {
                Some(back) => {
                    (edge.distance - back.distance).abs() <= tol
                        && (edge.duration - back.duration).abs() <= tol
                }
                None => false,
            })
        })
    }
}
