//! Native Entry Point Interception
//!
//! Redirects the platform's identifier accessors so that unmodified callers
//! receive the store's current identifier instead of the hardware value.
//!
//! # Architecture
//!
//! ```text
//!   host app code ──► entry point (e.g. -[UIDevice identifierForVendor])
//!                          │
//!                          ▼   redirected once by InterceptionLayer::install
//!                   HookBackend (ObjC runtime │ dispatch table)
//!                          │
//!                          ▼
//!                   IdentifierStore::current() ──► ReturnShape::render
//! ```
//!
//! Each entry point moves from `Native` to `Redirected` at most once per
//! process. Installing twice is detected and reported, never chained.

mod dispatch;
#[cfg(target_vendor = "apple")]
mod objc;

pub use dispatch::{DispatchTableBackend, NativeDispatchTable, NativeFn};
#[cfg(target_vendor = "apple")]
pub use objc::ObjcRuntimeBackend;

use crate::identifier::Identifier;
use crate::rotation::IdentifierStore;
use crate::{IdRotorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// The logical identifier accessors that can be intercepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPointKind {
    /// `UIDevice.identifierForVendor`
    VendorIdentifier,
    /// `ASIdentifierManager.advertisingIdentifier`
    AdvertisingIdentifier,
}

impl EntryPointKind {
    /// Every known entry point, in install order.
    pub const ALL: [EntryPointKind; 2] = [Self::VendorIdentifier, Self::AdvertisingIdentifier];

    /// Descriptor using the platform's native redirection strategy.
    pub fn entry_point(self) -> EntryPoint {
        match self {
            Self::VendorIdentifier => EntryPoint {
                kind: self,
                shape: ReturnShape::UuidObject,
                strategy: RedirectionStrategy::ObjcMethod {
                    class: "UIDevice",
                    selector: "identifierForVendor",
                },
            },
            Self::AdvertisingIdentifier => EntryPoint {
                kind: self,
                shape: ReturnShape::UuidObject,
                strategy: RedirectionStrategy::ObjcMethod {
                    class: "ASIdentifierManager",
                    selector: "advertisingIdentifier",
                },
            },
        }
    }
}

/// What an entry point hands back to its callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    /// A structured UUID object (`NSUUID`).
    UuidObject,
    /// A string in canonical form.
    String,
}

impl ReturnShape {
    /// Wrap an identifier in this shape. `None` mirrors the accessor's own
    /// "not available" result.
    pub fn render(self, identifier: Option<&Identifier>) -> NativeValue {
        match self {
            Self::UuidObject => NativeValue::Uuid(identifier.map(Identifier::as_uuid)),
            Self::String => NativeValue::Text(identifier.map(|id| id.as_str().to_string())),
        }
    }
}

/// A value as returned by a native entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeValue {
    /// Nullable UUID object.
    Uuid(Option<Uuid>),
    /// Nullable string.
    Text(Option<String>),
}

impl NativeValue {
    /// The canonical string carried by this value, if any.
    pub fn canonical_string(&self) -> Option<String> {
        match self {
            Self::Uuid(uuid) => uuid.map(|u| {
                u.hyphenated()
                    .encode_upper(&mut Uuid::encode_buffer())
                    .to_string()
            }),
            Self::Text(text) => text.clone(),
        }
    }
}

/// How an entry point gets redirected.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RedirectionStrategy {
    /// Swap an Objective-C instance method implementation.
    ObjcMethod {
        /// Class name
        class: &'static str,
        /// Selector name
        selector: &'static str,
    },
    /// Rewrite a named function-pointer slot.
    DispatchSlot {
        /// Slot symbol
        symbol: &'static str,
    },
}

/// Descriptor of one native entry point.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryPoint {
    /// Logical accessor.
    pub kind: EntryPointKind,
    /// Shape the accessor returns.
    pub shape: ReturnShape,
    /// How to redirect it.
    pub strategy: RedirectionStrategy,
}

impl EntryPoint {
    /// Same entry point, different strategy.
    pub fn with_strategy(mut self, strategy: RedirectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Symbol name, e.g. `-[UIDevice identifierForVendor]`.
    pub fn symbol(&self) -> String {
        match &self.strategy {
            RedirectionStrategy::ObjcMethod { class, selector } => {
                format!("-[{} {}]", class, selector)
            }
            RedirectionStrategy::DispatchSlot { symbol } => symbol.to_string(),
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol())
    }
}

/// Result of asking a backend to redirect an entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// The entry point now reads from the store.
    Redirected,
    /// The entry point was already reading from the store.
    AlreadyRedirected,
}

/// Platform mechanism that rewrites call dispatch.
///
/// Implementations must make the switch with a single atomic replacement so
/// that a concurrent caller runs either the original or the redirected code.
pub trait HookBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Redirect `entry` to read from `store`.
    ///
    /// Must detect an existing redirection and return `AlreadyRedirected`
    /// instead of redirecting again.
    fn redirect(&self, entry: &EntryPoint, store: &Arc<IdentifierStore>)
        -> Result<RedirectOutcome>;
}

/// Lifecycle state of an entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryPointState {
    /// Still runs the platform implementation.
    Native,
    /// Reads from the store; terminal.
    Redirected,
}

/// Per-entry-point result of an install pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Redirected during this pass.
    Installed,
    /// Was already redirected; left alone.
    AlreadyRedirected,
    /// Could not be redirected.
    Failed(IdRotorError),
}

/// Report of one `install` call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Outcome per configured entry point, in install order.
    pub outcomes: Vec<(EntryPointKind, InstallOutcome)>,
}

impl InstallReport {
    /// True when every configured entry point is redirected.
    pub fn is_complete(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, outcome)| !matches!(outcome, InstallOutcome::Failed(_)))
    }

    /// Entry points redirected during this pass.
    pub fn installed(&self) -> Vec<EntryPointKind> {
        self.filter(|o| matches!(o, InstallOutcome::Installed))
    }

    /// Entry points that were already redirected.
    pub fn already_redirected(&self) -> Vec<EntryPointKind> {
        self.filter(|o| matches!(o, InstallOutcome::AlreadyRedirected))
    }

    /// Entry points that failed, with their errors.
    pub fn failures(&self) -> Vec<(EntryPointKind, IdRotorError)> {
        self.outcomes
            .iter()
            .filter_map(|(kind, outcome)| match outcome {
                InstallOutcome::Failed(err) => Some((*kind, err.clone())),
                _ => None,
            })
            .collect()
    }

    fn filter(&self, predicate: impl Fn(&InstallOutcome) -> bool) -> Vec<EntryPointKind> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .map(|(kind, _)| *kind)
            .collect()
    }
}

/// One installed redirection. Lives as long as the process.
#[derive(Clone, Debug)]
struct InterceptionBinding {
    entry_point: EntryPoint,
    backend: &'static str,
}

/// Installs and tracks redirections of native entry points.
pub struct InterceptionLayer {
    store: Arc<IdentifierStore>,
    backend: Arc<dyn HookBackend>,
    entry_points: Vec<EntryPoint>,
    /// Held for the whole install pass so passes never interleave.
    bindings: Mutex<HashMap<EntryPointKind, InterceptionBinding>>,
}

impl InterceptionLayer {
    /// Create a layer over the given backend, targeting the store's configured
    /// entry points.
    pub fn new(store: Arc<IdentifierStore>, backend: Arc<dyn HookBackend>) -> Self {
        let entry_points = store
            .config()
            .entry_points
            .iter()
            .map(|kind| kind.entry_point())
            .collect();
        Self::with_entry_points(store, backend, entry_points)
    }

    /// Create a layer with an explicit entry point list.
    pub fn with_entry_points(
        store: Arc<IdentifierStore>,
        backend: Arc<dyn HookBackend>,
        entry_points: Vec<EntryPoint>,
    ) -> Self {
        Self {
            store,
            backend,
            entry_points,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    /// Create a layer over the platform's default backend.
    pub fn with_default_backend(store: Arc<IdentifierStore>) -> Self {
        Self::new(store, default_backend())
    }

    /// Redirect every configured entry point.
    ///
    /// Failures are collected per entry point and do not stop the pass.
    #[tracing::instrument(skip(self), fields(backend = self.backend.name()))]
    pub fn install(&self) -> InstallReport {
        let mut bindings = self.bindings.lock().unwrap_or_else(|e| e.into_inner());
        let mut report = InstallReport::default();

        for entry in &self.entry_points {
            if bindings.contains_key(&entry.kind) {
                report
                    .outcomes
                    .push((entry.kind, InstallOutcome::AlreadyRedirected));
                continue;
            }

            let outcome = match self.backend.redirect(entry, &self.store) {
                Ok(RedirectOutcome::Redirected) => {
                    tracing::info!(entry_point = %entry, "entry point redirected");
                    InstallOutcome::Installed
                }
                Ok(RedirectOutcome::AlreadyRedirected) => {
                    tracing::debug!(entry_point = %entry, "entry point already redirected");
                    InstallOutcome::AlreadyRedirected
                }
                Err(err) => {
                    tracing::warn!(entry_point = %entry, "redirection failed: {err}");
                    InstallOutcome::Failed(err)
                }
            };

            if !matches!(outcome, InstallOutcome::Failed(_)) {
                bindings.insert(
                    entry.kind,
                    InterceptionBinding {
                        entry_point: entry.clone(),
                        backend: self.backend.name(),
                    },
                );
            }
            report.outcomes.push((entry.kind, outcome));
        }

        report
    }

    /// Current state of each configured entry point.
    pub fn binding_states(&self) -> Vec<(EntryPointKind, EntryPointState)> {
        let bindings = self.bindings.lock().unwrap_or_else(|e| e.into_inner());
        self.entry_points
            .iter()
            .map(|entry| {
                let state = match bindings.get(&entry.kind) {
                    Some(binding) => {
                        tracing::trace!(
                            entry_point = %binding.entry_point,
                            backend = binding.backend,
                            "binding active"
                        );
                        EntryPointState::Redirected
                    }
                    None => EntryPointState::Native,
                };
                (entry.kind, state)
            })
            .collect()
    }

    /// The store redirected entry points read from.
    pub fn store(&self) -> &Arc<IdentifierStore> {
        &self.store
    }
}

/// The backend for the current target.
///
/// Apple targets swap Objective-C method implementations; everything else
/// goes through the process-wide dispatch table.
pub fn default_backend() -> Arc<dyn HookBackend> {
    #[cfg(target_vendor = "apple")]
    {
        Arc::new(ObjcRuntimeBackend::new())
    }
    #[cfg(not(target_vendor = "apple"))]
    {
        Arc::new(DispatchTableBackend::new(NativeDispatchTable::global()))
    }
}

/// Read the store in an entry point's shape. Shared by every backend.
pub(crate) fn read_redirected(store: &IdentifierStore, shape: ReturnShape) -> NativeValue {
    match store.current() {
        Ok(identifier) => shape.render(Some(&identifier)),
        Err(err) => {
            tracing::error!("redirected read before initialization: {err}");
            shape.render(None)
        }
    }
}
