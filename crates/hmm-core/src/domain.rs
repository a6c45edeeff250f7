//! Dense-id mapping between opaque domain values and integer indices.

/// Ordered set of domain values addressed by dense ids `0..len`.
///
/// One `IdMap` backs the state list of every model, and a second one backs
/// the symbol alphabet of discrete models. The mapping is fixed at model
/// construction: ids never change for the model's lifetime. Passing an
/// out-of-range id is a programming error and panics via slice indexing.
#[derive(Debug, Clone)]
pub struct IdMap<T> {
    values: Vec<T>,
}

impl<T> IdMap<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Domain value for a dense id. Panics when `id >= len()`.
    pub fn value(&self, id: usize) -> &T {
        &self.values[id]
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }
}

impl<T: PartialEq> IdMap<T> {
    /// Dense id of a domain value, or `None` when it is not in the set.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }
}
