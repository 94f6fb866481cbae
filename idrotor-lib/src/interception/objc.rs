//! Objective-C runtime backend (Apple targets).
//!
//! Redirects `-[Class selector]` accessors by swapping the method's IMP with
//! `method_setImplementation`, which the runtime performs atomically with
//! respect to concurrent message sends. The replacement IMP builds an
//! autoreleased `NSUUID` from the store's current identifier, matching the
//! getter's return convention.

use super::{
    read_redirected, EntryPoint, HookBackend, NativeValue, RedirectOutcome, RedirectionStrategy,
    ReturnShape,
};
use crate::rotation::IdentifierStore;
use crate::{IdRotorError, Result};
use std::collections::HashMap;
use std::ffi::{c_char, c_void, CString};
use std::panic;
use std::ptr;
use std::sync::{Arc, Mutex, OnceLock};
use uuid::Uuid;

type Id = *mut c_void;
type Sel = *mut c_void;
type Class = *mut c_void;
type Method = *mut c_void;
type Imp = *const c_void;

#[link(name = "objc", kind = "dylib")]
extern "C" {
    fn objc_getClass(name: *const c_char) -> Class;
    fn sel_registerName(name: *const c_char) -> Sel;
    fn class_getInstanceMethod(cls: Class, sel: Sel) -> Method;
    fn method_getImplementation(method: Method) -> Imp;
    fn method_setImplementation(method: Method, imp: Imp) -> Imp;
    fn objc_msgSend();
}

/// Store the replacement IMP reads. First binding wins for the process.
static REDIRECT_STORE: OnceLock<Arc<IdentifierStore>> = OnceLock::new();

/// Serializes check-and-swap across every backend instance.
static SWAP_LOCK: Mutex<()> = Mutex::new(());

/// Replacement for UUID-returning getters.
extern "C" fn uuid_getter(_this: Id, _cmd: Sel) -> Id {
    panic::catch_unwind(|| {
        let Some(store) = REDIRECT_STORE.get() else {
            return ptr::null_mut();
        };
        match read_redirected(store, ReturnShape::UuidObject) {
            NativeValue::Uuid(Some(uuid)) => unsafe { autoreleased_nsuuid(uuid) },
            _ => ptr::null_mut(),
        }
    })
    .unwrap_or(ptr::null_mut())
}

/// `[[[NSUUID alloc] initWithUUIDBytes:bytes] autorelease]`
unsafe fn autoreleased_nsuuid(uuid: Uuid) -> Id {
    let class = objc_getClass(c"NSUUID".as_ptr());
    if class.is_null() {
        return ptr::null_mut();
    }
    let send: unsafe extern "C" fn(Id, Sel) -> Id =
        std::mem::transmute(objc_msgSend as unsafe extern "C" fn());
    let send_bytes: unsafe extern "C" fn(Id, Sel, *const u8) -> Id =
        std::mem::transmute(objc_msgSend as unsafe extern "C" fn());

    let allocated = send(class, sel_registerName(c"alloc".as_ptr()));
    let object = send_bytes(
        allocated,
        sel_registerName(c"initWithUUIDBytes:".as_ptr()),
        uuid.as_bytes().as_ptr(),
    );
    if object.is_null() {
        return object;
    }
    send(object, sel_registerName(c"autorelease".as_ptr()))
}

/// [`HookBackend`] that swaps Objective-C method implementations.
#[derive(Default)]
pub struct ObjcRuntimeBackend {
    /// Original IMP addresses by symbol, kept for diagnostics.
    originals: Mutex<HashMap<String, usize>>,
}

impl ObjcRuntimeBackend {
    /// Create a backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the IMP that ran before `symbol` was redirected.
    pub fn original_imp(&self, symbol: &str) -> Option<usize> {
        let originals = self.originals.lock().unwrap_or_else(|e| e.into_inner());
        originals.get(symbol).copied()
    }

    fn lookup_method(entry: &EntryPoint, class: &str, selector: &str) -> Result<Method> {
        let class_name = CString::new(class)
            .map_err(|_| IdRotorError::redirection(entry.symbol(), "class name contains NUL"))?;
        let selector_name = CString::new(selector)
            .map_err(|_| IdRotorError::redirection(entry.symbol(), "selector contains NUL"))?;

        unsafe {
            let cls = objc_getClass(class_name.as_ptr());
            if cls.is_null() {
                return Err(IdRotorError::redirection(
                    entry.symbol(),
                    format!("class {class} is not loaded"),
                ));
            }
            let method = class_getInstanceMethod(cls, sel_registerName(selector_name.as_ptr()));
            if method.is_null() {
                return Err(IdRotorError::redirection(
                    entry.symbol(),
                    format!("{class} does not implement {selector}"),
                ));
            }
            Ok(method)
        }
    }
}

impl HookBackend for ObjcRuntimeBackend {
    fn name(&self) -> &'static str {
        "objc-runtime"
    }

    fn redirect(
        &self,
        entry: &EntryPoint,
        store: &Arc<IdentifierStore>,
    ) -> Result<RedirectOutcome> {
        let RedirectionStrategy::ObjcMethod { class, selector } = &entry.strategy else {
            return Err(IdRotorError::redirection(
                entry.symbol(),
                "only Objective-C methods can be redirected by this backend",
            ));
        };
        if entry.shape != ReturnShape::UuidObject {
            return Err(IdRotorError::redirection(
                entry.symbol(),
                "only NSUUID-returning getters are supported",
            ));
        }

        let method = Self::lookup_method(entry, class, selector)?;

        let bound = REDIRECT_STORE.get_or_init(|| Arc::clone(store));
        if !Arc::ptr_eq(bound, store) {
            return Err(IdRotorError::redirection(
                entry.symbol(),
                "process is already bound to a different identifier store",
            ));
        }
        let replacement = uuid_getter as extern "C" fn(Id, Sel) -> Id as Imp;

        let _guard = SWAP_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            if method_getImplementation(method) == replacement {
                return Ok(RedirectOutcome::AlreadyRedirected);
            }
            let original = method_setImplementation(method, replacement);
            let mut originals = self.originals.lock().unwrap_or_else(|e| e.into_inner());
            originals.insert(entry.symbol(), original as usize);
        }
        Ok(RedirectOutcome::Redirected)
    }
}
