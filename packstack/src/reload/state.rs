//! State shared by the listeners of one reload.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;

use crate::resolver::ResourceManager;

/// Typed key into a [`SharedState`] store.
///
/// ```
/// use packstack::reload::StateKey;
///
/// const ATLAS_SIZE: StateKey<u32> = StateKey::new("atlas_size");
/// assert_eq!(ATLAS_SIZE.name(), "atlas_size");
/// ```
pub struct StateKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    /// Create a key; names must be unique within a reload.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The key name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateKey<T> {}

impl<T> fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateKey").field(&self.name).finish()
    }
}

struct StateInner {
    resources: Arc<dyn ResourceManager>,
    values: DashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

/// The resolver under construction plus cross-listener values.
///
/// Listeners read resources through [`SharedState::resources`] during
/// prepare. Values are seeded by
/// [`ReloadListener::prepare_shared_state`](super::ReloadListener::prepare_shared_state)
/// before any listener starts.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<StateInner>,
}

impl SharedState {
    /// Create state over `resources` with an empty store.
    pub fn new(resources: Arc<dyn ResourceManager>) -> Self {
        Self {
            inner: Arc::new(StateInner {
                resources,
                values: DashMap::new(),
            }),
        }
    }

    /// The resources being reloaded.
    pub fn resources(&self) -> &dyn ResourceManager {
        self.inner.resources.as_ref()
    }

    /// A shared handle to the resources being reloaded.
    pub fn resources_handle(&self) -> Arc<dyn ResourceManager> {
        Arc::clone(&self.inner.resources)
    }

    /// Store `value` under `key`, returning any previous value.
    pub fn insert<T: Send + Sync + 'static>(&self, key: StateKey<T>, value: T) -> Option<Arc<T>> {
        self.inner
            .values
            .insert(key.name, Arc::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// The value stored under `key`.
    ///
    /// `None` if absent or stored with a different type.
    pub fn get<T: Send + Sync + 'static>(&self, key: StateKey<T>) -> Option<Arc<T>> {
        let value = Arc::clone(self.inner.values.get(key.name)?.value());
        value.downcast::<T>().ok()
    }

    /// Whether a value is stored under `key`.
    pub fn contains<T>(&self, key: StateKey<T>) -> bool {
        self.inner.values.contains_key(key.name)
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("namespaces", &self.resources().namespaces())
            .field("values", &self.inner.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AggregateResolver;
    use crate::source::PackKind;

    const COUNT: StateKey<usize> = StateKey::new("count");
    const LABEL: StateKey<String> = StateKey::new("label");

    fn state() -> SharedState {
        SharedState::new(Arc::new(AggregateResolver::empty(PackKind::ClientResources)))
    }

    #[test]
    fn test_insert_and_get() {
        let state = state();
        assert!(state.get(COUNT).is_none());

        assert!(state.insert(COUNT, 3).is_none());
        assert_eq!(*state.get(COUNT).unwrap(), 3);

        let previous = state.insert(COUNT, 4).unwrap();
        assert_eq!(*previous, 3);
        assert!(state.contains(COUNT));
    }

    #[test]
    fn test_type_mismatch_is_none() {
        let state = state();
        state.insert(LABEL, "atlas".to_string());

        let wrong: StateKey<u64> = StateKey::new("label");
        assert!(state.get(wrong).is_none());
    }

    #[test]
    fn test_clones_share_store() {
        let state = state();
        let clone = state.clone();
        clone.insert(COUNT, 9);
        assert_eq!(*state.get(COUNT).unwrap(), 9);
    }
}
