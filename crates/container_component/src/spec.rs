//! Component descriptors.
//!
//! A [`ComponentSpec`] names what to run: either a packaged entry point inside
//! a distribution, or a class addressed by its dotted qualified name. Both
//! carry an opaque `extra` value that ends up in the session's
//! [`ComponentConfig`](crate::ComponentConfig).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ResolutionError;

/// Descriptor `type` values accepted for packaged entry points.
const ENTRYPOINT_KINDS: &[&str] = &["packaged-entrypoint", "wamplet"];

/// Descriptor `type` values accepted for qualified classes.
const CLASS_KINDS: &[&str] = &["qualified-class", "class"];

/// What a component activation should run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ComponentSpec {
    /// A named entry point registered by a distribution.
    #[serde(alias = "wamplet")]
    PackagedEntrypoint {
        /// Distribution that registered the entry point.
        dist: String,
        /// Entry point name within the distribution.
        entry: String,
        /// Component-specific configuration.
        #[serde(default)]
        extra: Option<Value>,
    },

    /// A session type addressed as `module.path.Name`.
    #[serde(alias = "class")]
    QualifiedClass {
        /// Dotted qualified name. Older descriptors call this `name`.
        #[serde(alias = "name")]
        classname: String,
        /// Component-specific configuration.
        #[serde(default)]
        extra: Option<Value>,
    },
}

impl ComponentSpec {
    /// Build a qualified-class descriptor.
    #[must_use]
    pub fn class(classname: impl Into<String>) -> Self {
        Self::QualifiedClass {
            classname: classname.into(),
            extra: None,
        }
    }

    /// Build a packaged entry point descriptor.
    #[must_use]
    pub fn entry_point(dist: impl Into<String>, entry: impl Into<String>) -> Self {
        Self::PackagedEntrypoint {
            dist: dist.into(),
            entry: entry.into(),
            extra: None,
        }
    }

    /// Attach component-specific configuration.
    #[must_use]
    pub fn with_extra(mut self, value: Value) -> Self {
        match &mut self {
            Self::PackagedEntrypoint { extra, .. } | Self::QualifiedClass { extra, .. } => {
                *extra = Some(value);
            }
        }
        self
    }

    /// Parse a descriptor as it arrives over the management interface.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnknownKind`] if `type` is missing or not
    /// one this worker hosts, and [`ResolutionError::Malformed`] if the
    /// remaining fields do not fit the kind.
    pub fn from_value(value: &Value) -> Result<Self, ResolutionError> {
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => return Err(ResolutionError::UnknownKind(other.to_string())),
            None => return Err(ResolutionError::UnknownKind(String::new())),
        };
        if !ENTRYPOINT_KINDS.contains(&kind) && !CLASS_KINDS.contains(&kind) {
            return Err(ResolutionError::UnknownKind(kind.to_string()));
        }
        serde_json::from_value(value.clone()).map_err(|e| ResolutionError::Malformed {
            detail: e.to_string(),
        })
    }

    /// The canonical kind label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PackagedEntrypoint { .. } => ENTRYPOINT_KINDS[0],
            Self::QualifiedClass { .. } => CLASS_KINDS[0],
        }
    }

    /// Component-specific configuration, if any.
    #[must_use]
    pub fn extra(&self) -> Option<&Value> {
        match self {
            Self::PackagedEntrypoint { extra, .. } | Self::QualifiedClass { extra, .. } => {
                extra.as_ref()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_qualified_class() {
        let spec = ComponentSpec::from_value(&json!({
            "type": "qualified-class",
            "classname": "pkg.mod.MySession",
            "extra": {"greeting": "hi"}
        }))
        .unwrap();
        assert_eq!(
            spec,
            ComponentSpec::class("pkg.mod.MySession").with_extra(json!({"greeting": "hi"}))
        );
        assert_eq!(spec.kind(), "qualified-class");
    }

    #[test]
    fn test_parse_legacy_aliases() {
        let wamplet = ComponentSpec::from_value(&json!({
            "type": "wamplet", "dist": "demo", "entry": "hello"
        }))
        .unwrap();
        assert_eq!(wamplet, ComponentSpec::entry_point("demo", "hello"));

        let class = ComponentSpec::from_value(&json!({"type": "class", "classname": "a.B"})).unwrap();
        assert_eq!(class.kind(), "qualified-class");
        assert!(class.extra().is_none());

        let named = ComponentSpec::from_value(&json!({"type": "class", "name": "a.B"})).unwrap();
        assert_eq!(named, ComponentSpec::class("a.B"));
    }

    #[test]
    fn test_unknown_kind() {
        let err = ComponentSpec::from_value(&json!({"type": "plugin", "classname": "a.B"}))
            .unwrap_err();
        assert_eq!(err, ResolutionError::UnknownKind("plugin".to_string()));
        assert_eq!(err.reason(), "unknown-component-kind");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_kind() {
        let err = ComponentSpec::from_value(&json!({"classname": "a.B"})).unwrap_err();
        assert_eq!(err.reason(), "unknown-component-kind");
    }

    #[test]
    fn test_known_kind_missing_fields() {
        let err = ComponentSpec::from_value(&json!({"type": "wamplet", "dist": "demo"}))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Malformed { .. }));
        assert_eq!(err.reason(), "invalid-configuration");
    }
}
