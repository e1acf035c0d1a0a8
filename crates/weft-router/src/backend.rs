//! Pluggable network backends.
//!
//! A backend claims addresses and links during the four-phase setup
//! sequence using the same tri-state contract as the packet hook chains:
//! `Continue` defers to the next backend, `Finish` claims the item, an
//! error aborts the entire startup. Backends are named providers selected
//! via configuration; the POSIX default is always appended last so an
//! alternate stack can claim an address or link first.

use std::fmt;
use std::sync::Arc;

use weft_core::hooks::HookResult;
use weft_io::Overlay;

use crate::config::LinkSection;
use crate::error::SetupError;
use crate::posix::PosixBackend;
use crate::router::Router;

/// Outcome of one setup hook invocation.
pub type SetupOutcome = Result<HookResult<()>, SetupError>;

/// The four-phase contract a network backend implements.
///
/// All methods run during single-threaded startup, inside a tokio runtime
/// (they may spawn socket workers). `net_start` and `net_finish` default to
/// deferring.
pub trait NetworkBackend: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Global backend initialization, before any address is claimed.
    fn net_start(&self, _router: &mut Router) -> SetupOutcome {
        Ok(HookResult::Continue)
    }

    /// Claim one bound local address.
    fn add_local(
        &self,
        router: &mut Router,
        index: usize,
        overlay: &Overlay,
        label: &str,
    ) -> SetupOutcome;

    /// Claim one external link.
    fn add_external(&self, router: &mut Router, link: &LinkSection, label: &str) -> SetupOutcome;

    /// Post-configuration initialization, e.g. driver startup.
    fn net_finish(&self, _router: &mut Router) -> SetupOutcome {
        Ok(HookResult::Continue)
    }
}

/// Registry of named backend providers.
pub struct BackendRegistry {
    providers: Vec<Arc<dyn NetworkBackend>>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// A registry carrying the built-in POSIX default.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PosixBackend));
        registry
    }

    /// Register a provider. Later registrations shadow nothing; names must
    /// be unique to be selectable.
    pub fn register(&mut self, backend: Arc<dyn NetworkBackend>) {
        self.providers.push(backend);
    }

    /// Resolve the configured backend names, in order, with the POSIX
    /// default appended last unless explicitly listed.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn NetworkBackend>>, SetupError> {
        let mut selected = Vec::with_capacity(names.len() + 1);
        for name in names {
            let backend = self
                .providers
                .iter()
                .find(|b| b.name() == name)
                .ok_or_else(|| SetupError::UnknownBackend(name.clone()))?;
            selected.push(Arc::clone(backend));
        }
        if !names.iter().any(|n| n == PosixBackend.name()) {
            let posix = self
                .providers
                .iter()
                .find(|b| b.name() == PosixBackend.name())
                .ok_or_else(|| SetupError::UnknownBackend(PosixBackend.name().to_string()))?;
            selected.push(Arc::clone(posix));
        }
        Ok(selected)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
