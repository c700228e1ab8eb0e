//! Pool of ghost (forecast) tasks.

use crate::error::DispatchError;
use crate::models::{Task, TaskId};

/// Speculative tasks awaiting trial, binding, or promotion.
///
/// Every member is unconfirmed; ids are unique within the pool.
#[derive(Debug, Clone, Default)]
pub struct GhostPool {
    ghosts: Vec<Task>,
}

impl GhostPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a ghost. Rejects confirmed tasks and duplicate ids.
    pub fn insert(&mut self, ghost: Task) -> Result<(), DispatchError> {
        let invalid = |reason: &str| DispatchError::InvalidTask {
            task_id: ghost.id().clone(),
            reason: reason.to_string(),
        };
        if ghost.is_confirmed() {
            return Err(invalid("ghost tasks must be unconfirmed"));
        }
        if self.contains(ghost.id().as_str()) {
            return Err(invalid("ghost already pooled"));
        }
        self.ghosts.push(ghost);
        Ok(())
    }

    /// Looks up a ghost by id.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.ghosts.iter().find(|g| g.id().as_str() == id)
    }

    /// Returns `true` if a ghost with this id is pooled.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Removes and returns a ghost.
    pub fn take(&mut self, id: &str) -> Option<Task> {
        let index = self.ghosts.iter().position(|g| g.id().as_str() == id)?;
        Some(self.ghosts.remove(index))
    }

    /// Removes every ghost whose id is in `ids`.
    pub fn remove_all(&mut self, ids: &[TaskId]) {
        self.ghosts.retain(|g| !ids.contains(g.id()));
    }

    /// Ghosts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.ghosts.iter()
    }

    /// Number of pooled ghosts.
    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    /// Returns `true` if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    /// Empties the pool.
    pub fn clear(&mut self) {
        self.ghosts.clear();
    }
}
