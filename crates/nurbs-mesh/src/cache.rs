//! Generation-keyed cache for derived tessellations.

use std::sync::Arc;

use log::trace;
use nurbs_core::{Generation, Result};

/// Holds the most recent tessellation of one object together with the
/// generation it was computed from.
#[derive(Debug)]
pub struct TessellationCache<T> {
    entry: Option<(Generation, Arc<T>)>,
    computations: usize,
}

impl<T> Default for TessellationCache<T> {
    fn default() -> Self {
        Self {
            entry: None,
            computations: 0,
        }
    }
}

impl<T> TessellationCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value if it was computed from `generation`.
    pub fn get(&self, generation: Generation) -> Option<Arc<T>> {
        match &self.entry {
            Some((g, value)) if *g == generation => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn is_fresh(&self, generation: Generation) -> bool {
        matches!(&self.entry, Some((g, _)) if *g == generation)
    }

    /// Return the cached value for `generation`, computing it with `build`
    /// when missing or stale. A failed build leaves the cache untouched.
    pub fn get_or_try_insert_with<F>(&mut self, generation: Generation, build: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.get(generation) {
            return Ok(value);
        }
        let value = Arc::new(build()?);
        self.computations += 1;
        trace!("tessellation cache: recomputed for {}", generation);
        self.entry = Some((generation, Arc::clone(&value)));
        Ok(value)
    }

    /// Store a value computed elsewhere (for example on a worker thread).
    pub fn insert(&mut self, generation: Generation, value: Arc<T>) {
        self.computations += 1;
        self.entry = Some((generation, value));
    }

    /// Drop the cached value, forcing the next request to recompute.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// How many times a value has been computed and stored.
    pub fn computations(&self) -> usize {
        self.computations
    }
}
