//! In-process application resolution.
//!
//! # Responsibilities
//! - Hold the applications an embedding binary makes available by location
//! - Walk the configured candidate list in priority order
//! - Return the first usable app, already tagged with its call convention
//!
//! # Design Decisions
//! - Order is a priority list: the first hit wins, later ones are never tried
//! - A failing candidate is logged at debug and skipped, never an error
//! - "Nothing found" is the normal outcome for a standalone server backend

use std::collections::HashMap;
use thiserror::Error;

use crate::backend::native::NativeHandler;

/// Why a single candidate could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no module named '{0}'")]
    ModuleNotFound(String),

    #[error("module '{module}' has no attribute '{attribute}'")]
    AttributeNotFound { module: String, attribute: String },

    #[error("failed to construct '{location}': {reason}")]
    Construct { location: String, reason: String },
}

type AppFactory = Box<dyn Fn() -> Result<NativeHandler, String> + Send + Sync>;

/// A `module:attribute` pair. A bare module means attribute `app`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLocation {
    pub module: String,
    pub attribute: String,
}

impl CandidateLocation {
    pub fn parse(location: &str) -> Self {
        match location.split_once(':') {
            Some((module, attribute)) => Self {
                module: module.trim().to_string(),
                attribute: attribute.trim().to_string(),
            },
            None => Self {
                module: location.trim().to_string(),
                attribute: "app".to_string(),
            },
        }
    }
}

impl std::fmt::Display for CandidateLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.module, self.attribute)
    }
}

/// Applications available for in-process dispatch, keyed by location.
#[derive(Default)]
pub struct AppRegistry {
    modules: HashMap<String, HashMap<String, AppFactory>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an app available at `location` (`module:attribute`).
    pub fn register<F>(&mut self, location: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<NativeHandler, String> + Send + Sync + 'static,
    {
        let location = CandidateLocation::parse(location);
        self.modules
            .entry(location.module)
            .or_default()
            .insert(location.attribute, Box::new(factory));
        self
    }

    /// Construct the app at `location`.
    pub fn load(&self, location: &CandidateLocation) -> Result<NativeHandler, ResolveError> {
        let module = self
            .modules
            .get(&location.module)
            .ok_or_else(|| ResolveError::ModuleNotFound(location.module.clone()))?;
        let factory = module
            .get(&location.attribute)
            .ok_or_else(|| ResolveError::AttributeNotFound {
                module: location.module.clone(),
                attribute: location.attribute.clone(),
            })?;
        factory().map_err(|reason| ResolveError::Construct {
            location: location.to_string(),
            reason,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Walks candidate locations against a registry.
pub struct BackendResolver<'a> {
    registry: &'a AppRegistry,
    candidates: Vec<CandidateLocation>,
}

impl<'a> BackendResolver<'a> {
    pub fn new(registry: &'a AppRegistry, candidates: &[String]) -> Self {
        Self {
            registry,
            candidates: candidates.iter().map(|c| CandidateLocation::parse(c)).collect(),
        }
    }

    /// First candidate that loads, or `None`.
    pub fn resolve(&self) -> Option<(CandidateLocation, NativeHandler)> {
        for candidate in &self.candidates {
            match self.registry.load(candidate) {
                Ok(handler) => {
                    tracing::info!(
                        location = %candidate,
                        capability = ?handler.capability(),
                        "Resolved in-process application"
                    );
                    return Some((candidate.clone(), handler));
                }
                Err(e) => {
                    tracing::debug!(location = %candidate, error = %e, "Candidate unavailable");
                }
            }
        }
        tracing::info!(
            candidates = self.candidates.len(),
            "No in-process application found; using supervised backend"
        );
        None
    }
}
