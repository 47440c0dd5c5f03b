//! In-process registry of installed libraries.
//!
//! Maps a sanitized library name to its installed variants. Access goes
//! through a mutex so the registry can be shared between threads; callers
//! that need check-then-act semantics for one name also take the manager's
//! per-name lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::library::{Library, LibraryAlternatives};

/// Registry of installed libraries keyed by sanitized name.
#[derive(Debug, Default)]
pub struct LibraryRegistry {
    libraries: Mutex<HashMap<String, LibraryAlternatives>>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from libraries discovered by the caller.
    pub fn from_libraries(libraries: impl IntoIterator<Item = Library>) -> Self {
        let registry = Self::new();
        for library in libraries {
            registry.add(library);
        }
        registry
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, LibraryAlternatives>> {
        self.libraries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All installed variants for `name`.
    pub fn lookup(&self, name: &str) -> Option<LibraryAlternatives> {
        self.lock().get(name).cloned()
    }

    /// Whether any variant is installed under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// The user-installed variant for `name`, if any.
    pub fn user_installed(&self, name: &str) -> Option<Library> {
        self.lock()
            .get(name)
            .and_then(|alternatives| alternatives.user_installed().cloned())
    }

    /// Register a library under its name.
    pub fn add(&self, library: Library) {
        debug!(
            "Registering library {} ({}) at {:?}",
            library.name, library.location, library.install_dir
        );
        self.lock()
            .entry(library.name.clone())
            .or_default()
            .add(library);
    }

    /// Remove a library from its bucket. Returns `true` if it was registered.
    pub fn remove(&self, library: &Library) -> bool {
        let mut libraries = self.lock();
        let Some(alternatives) = libraries.get_mut(&library.name) else {
            return false;
        };

        let removed = alternatives.remove(library);
        if alternatives.is_empty() {
            libraries.remove(&library.name);
        }
        if removed {
            debug!("Unregistered library {} ({})", library.name, library.location);
        }
        removed
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
