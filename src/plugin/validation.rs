//! Structural validation of plugin descriptors.
//!
//! # Responsibilities
//! - Check names, versions, route templates and middleware entries
//! - Report every violation at once as a standalone sentence
//!
//! # Design Decisions
//! - Pure functions, no registry access (conflicts are the registry's job)
//! - Hook and handler shapes are checked by the type system, not here

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::plugin::descriptor::{MiddlewareDescriptor, PluginDescriptor, RouteMap};
use crate::routing::matcher::param_names;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{3,50}$").expect("plugin name pattern is valid")
});

// semver.org reference pattern
static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)",
        r"(?:-((?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*))*))?",
        r"(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    ))
    .expect("semver pattern is valid")
});

pub fn validate_plugin_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if !(3..=50).contains(&len) {
        return Err(format!(
            "Plugin name must be between 3 and 50 characters long (got {})",
            len
        ));
    }
    if !NAME_RE.is_match(name) {
        return Err(format!(
            "Plugin name '{}' may only contain letters, digits, '-' and '_'",
            name
        ));
    }
    Ok(())
}

pub fn validate_version(version: &str) -> Result<(), String> {
    if SEMVER_RE.is_match(version) {
        Ok(())
    } else {
        Err(format!(
            "Plugin version '{}' is not a valid semantic version (expected MAJOR.MINOR.PATCH)",
            version
        ))
    }
}

pub fn validate_routes(routes: &RouteMap) -> Vec<String> {
    let mut violations = Vec::new();
    for (path, methods) in routes {
        if !path.starts_with('/') {
            violations.push(format!("Route path '{}' must start with '/'", path));
        }
        if methods.is_empty() {
            violations.push(format!("Route path '{}' declares no methods", path));
        }

        let mut seen = HashSet::new();
        for param in param_names(path) {
            if param.is_empty() {
                violations.push(format!("Route path '{}' has an unnamed parameter", path));
            } else if !seen.insert(param) {
                violations.push(format!(
                    "Route path '{}' declares parameter ':{}' more than once",
                    path, param
                ));
            }
        }
    }
    violations
}

pub fn validate_middleware(middleware: &[MiddlewareDescriptor]) -> Vec<String> {
    let mut violations = Vec::new();

    for (index, mw) in middleware.iter().enumerate() {
        if mw.name.trim().is_empty() {
            violations.push(format!("Middleware at index {} must have a name", index));
        }

        if mw.priority < 0 {
            violations.push(format!(
                "Middleware '{}' has negative priority {}",
                mw.name, mw.priority
            ));
        }
    }
    violations
}

/// Run every check and collect all violations into one error.
pub fn validate_plugin(plugin: &PluginDescriptor) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    violations.extend(validate_plugin_name(&plugin.name).err());
    violations.extend(validate_version(&plugin.version).err());
    violations.extend(validate_routes(&plugin.routes));
    violations.extend(validate_middleware(&plugin.middleware));

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            plugin: plugin.name.clone(),
            violations,
        })
    }
}
