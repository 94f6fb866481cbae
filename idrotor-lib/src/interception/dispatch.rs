//! In-process dispatch table backend.
//!
//! Native code that wants to be interceptable calls identifier accessors
//! through a [`NativeDispatchTable`] slot instead of directly, the same way
//! a GOT entry or vtable slot is called through. Redirecting an entry point
//! replaces the slot's target with one swap under the slot lock; callers
//! clone the target before invoking it, so an in-flight call always finishes
//! on the implementation it started with.
//!
//! A slot remembers which store it was redirected to. Only that store can
//! claim the slot afterwards; any other store is refused.

use super::{read_redirected, EntryPoint, HookBackend, NativeValue, RedirectOutcome, ReturnShape};
use crate::rotation::IdentifierStore;
use crate::{IdRotorError, Result};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Implementation stored in a dispatch slot.
pub type NativeFn = Arc<dyn Fn() -> NativeValue + Send + Sync>;

struct Slot {
    active: NativeFn,
    original: NativeFn,
    redirect_count: u32,
    /// Store the slot reads from once redirected.
    bound_to: Option<Arc<IdentifierStore>>,
}

/// Named, swappable function slots.
#[derive(Default)]
pub struct NativeDispatchTable {
    slots: RwLock<HashMap<String, Arc<RwLock<Slot>>>>,
}

static GLOBAL_TABLE: OnceLock<Arc<NativeDispatchTable>> = OnceLock::new();

impl NativeDispatchTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table injected hooks register into.
    pub fn global() -> Arc<NativeDispatchTable> {
        Arc::clone(GLOBAL_TABLE.get_or_init(|| Arc::new(NativeDispatchTable::new())))
    }

    /// Register the native implementation of `symbol`.
    ///
    /// Returns false if the symbol is already registered; the existing slot
    /// (and any redirection in it) is left alone.
    pub fn register(&self, symbol: &str, native: NativeFn) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        if slots.contains_key(symbol) {
            return false;
        }
        slots.insert(
            symbol.to_string(),
            Arc::new(RwLock::new(Slot {
                active: Arc::clone(&native),
                original: native,
                redirect_count: 0,
                bound_to: None,
            })),
        );
        true
    }

    /// Invoke `symbol` the way a native caller would.
    ///
    /// Returns None if nothing is registered under that name.
    pub fn call(&self, symbol: &str) -> Option<NativeValue> {
        let target = {
            let slot = self.slot(symbol)?;
            let slot = slot.read().unwrap_or_else(|e| e.into_inner());
            Arc::clone(&slot.active)
        };
        Some(target())
    }

    /// Invoke the implementation `symbol` was registered with.
    pub fn call_original(&self, symbol: &str) -> Option<NativeValue> {
        let target = {
            let slot = self.slot(symbol)?;
            let slot = slot.read().unwrap_or_else(|e| e.into_inner());
            Arc::clone(&slot.original)
        };
        Some(target())
    }

    /// Whether `symbol` is currently redirected.
    pub fn is_redirected(&self, symbol: &str) -> bool {
        self.redirect_count(symbol).is_some_and(|count| count > 0)
    }

    /// How many times `symbol` has been redirected (0 or 1).
    pub fn redirect_count(&self, symbol: &str) -> Option<u32> {
        let slot = self.slot(symbol)?;
        let slot = slot.read().unwrap_or_else(|e| e.into_inner());
        Some(slot.redirect_count)
    }

    /// Point `symbol` at `store`, rendered as `shape`.
    ///
    /// A slot already redirected to `store` is left alone. A slot redirected
    /// to a different store is refused: its readers would never see that
    /// store's rotations.
    pub fn redirect(
        &self,
        symbol: &str,
        store: &Arc<IdentifierStore>,
        shape: ReturnShape,
    ) -> Result<RedirectOutcome> {
        let slot = self.slot(symbol).ok_or_else(|| {
            IdRotorError::redirection(symbol, "symbol not registered in dispatch table")
        })?;
        let mut slot = slot.write().unwrap_or_else(|e| e.into_inner());
        if let Some(bound) = &slot.bound_to {
            if !Arc::ptr_eq(bound, store) {
                return Err(IdRotorError::redirection(
                    symbol,
                    "slot is already redirected to a different identifier store",
                ));
            }
            return Ok(RedirectOutcome::AlreadyRedirected);
        }
        let reader = Arc::clone(store);
        slot.active = Arc::new(move || read_redirected(&reader, shape));
        slot.bound_to = Some(Arc::clone(store));
        slot.redirect_count += 1;
        Ok(RedirectOutcome::Redirected)
    }

    fn slot(&self, symbol: &str) -> Option<Arc<RwLock<Slot>>> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.get(symbol).cloned()
    }
}

/// [`HookBackend`] that rewrites dispatch table slots.
pub struct DispatchTableBackend {
    table: Arc<NativeDispatchTable>,
}

impl DispatchTableBackend {
    /// Create a backend over `table`.
    pub fn new(table: Arc<NativeDispatchTable>) -> Self {
        Self { table }
    }

    /// The table this backend rewrites.
    pub fn table(&self) -> &Arc<NativeDispatchTable> {
        &self.table
    }
}

impl HookBackend for DispatchTableBackend {
    fn name(&self) -> &'static str {
        "dispatch-table"
    }

    fn redirect(
        &self,
        entry: &EntryPoint,
        store: &Arc<IdentifierStore>,
    ) -> Result<RedirectOutcome> {
        self.table.redirect(&entry.symbol(), store, entry.shape)
    }
}
