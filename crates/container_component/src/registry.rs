//! Plugin registration table and component resolution.
//!
//! Components are registered once at process start, either as packaged entry
//! points (`dist` + `entry`) or as qualified classes (`module.path.Name`).
//! [`ComponentRegistry::resolve`] turns a [`ComponentSpec`] into a
//! [`SessionFactory`] without ever constructing a session.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::ResolutionError;
use crate::session::{ComponentConfig, Session, SessionConstructor, SessionFactory};
use crate::spec::ComponentSpec;

/// Table of session constructors this worker can host.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Entry points keyed by distribution, then entry name.
    entry_points: HashMap<String, HashMap<String, SessionConstructor>>,
    /// Classes keyed by module path, then attribute name.
    modules: HashMap<String, HashMap<String, SessionConstructor>>,
    /// Log each resolution.
    debug: bool,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log component resolution at debug level.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Register a packaged entry point.
    pub fn register_entry_point<F, S>(&mut self, dist: &str, entry: &str, constructor: F)
    where
        F: Fn(ComponentConfig) -> S + Send + Sync + 'static,
        S: Session,
    {
        self.entry_points
            .entry(dist.to_string())
            .or_default()
            .insert(entry.to_string(), boxed(constructor));
    }

    /// Register a class under its dotted qualified name.
    ///
    /// The name is split at its last `.` into a module path and an attribute,
    /// the same way [`ComponentRegistry::resolve`] looks it up.
    pub fn register_class<F, S>(&mut self, qualified_name: &str, constructor: F)
    where
        F: Fn(ComponentConfig) -> S + Send + Sync + 'static,
        S: Session,
    {
        let (module, attr) = split_qualified(qualified_name);
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(attr.to_string(), boxed(constructor));
    }

    /// Returns the number of registered constructors.
    #[must_use]
    pub fn len(&self) -> usize {
        let entries: usize = self.entry_points.values().map(HashMap::len).sum();
        let classes: usize = self.modules.values().map(HashMap::len).sum();
        entries + classes
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve `spec` into a factory producing sessions for `realm`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::EntryPointLoadFailed`] or
    /// [`ResolutionError::ClassLoadFailed`] when the referenced constructor is
    /// not registered.
    pub fn resolve(
        &self,
        spec: &ComponentSpec,
        realm: &str,
    ) -> Result<SessionFactory, ResolutionError> {
        let constructor = match spec {
            ComponentSpec::PackagedEntrypoint { dist, entry, .. } => {
                if self.debug {
                    debug!(dist, entry, realm, "starting packaged entry point");
                }
                self.load_entry_point(dist, entry)?
            }
            ComponentSpec::QualifiedClass { classname, .. } => {
                if self.debug {
                    debug!(classname, realm, "starting class");
                }
                self.load_class(classname)?
            }
        };

        let config = ComponentConfig {
            realm: realm.to_string(),
            extra: spec.extra().cloned(),
        };
        Ok(SessionFactory::new(config, constructor))
    }

    fn load_entry_point(&self, dist: &str, entry: &str) -> Result<SessionConstructor, ResolutionError> {
        let entries = self
            .entry_points
            .get(dist)
            .ok_or_else(|| ResolutionError::EntryPointLoadFailed {
                detail: format!("distribution '{dist}' not found"),
            })?;
        entries
            .get(entry)
            .cloned()
            .ok_or_else(|| ResolutionError::EntryPointLoadFailed {
                detail: format!("entry point '{entry}' not found in distribution '{dist}'"),
            })
    }

    fn load_class(&self, classname: &str) -> Result<SessionConstructor, ResolutionError> {
        let (module, attr) = split_qualified(classname);
        if module.is_empty() {
            return Err(ResolutionError::ClassLoadFailed {
                detail: format!("'{classname}' is not a qualified name"),
            });
        }
        let attrs = self
            .modules
            .get(module)
            .ok_or_else(|| ResolutionError::ClassLoadFailed {
                detail: format!("no module named '{module}'"),
            })?;
        attrs
            .get(attr)
            .cloned()
            .ok_or_else(|| ResolutionError::ClassLoadFailed {
                detail: format!("module '{module}' has no attribute '{attr}'"),
            })
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("entry_points", &self.entry_points.len())
            .field("modules", &self.modules.len())
            .field("debug", &self.debug)
            .finish()
    }
}

fn boxed<F, S>(constructor: F) -> SessionConstructor
where
    F: Fn(ComponentConfig) -> S + Send + Sync + 'static,
    S: Session,
{
    Arc::new(move |cfg| Box::new(constructor(cfg)) as Box<dyn Session>)
}

/// Split `a.b.C` into (`a.b`, `C`). A name without dots has an empty module.
fn split_qualified(name: &str) -> (&str, &str) {
    name.rsplit_once('.').unwrap_or(("", name))
}
