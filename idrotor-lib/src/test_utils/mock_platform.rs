//! Mock platform entry points.

use crate::interception::{EntryPointKind, NativeDispatchTable, NativeValue};
use std::sync::Arc;
use uuid::Uuid;

/// The "real hardware" identifier every mock entry point reports.
pub const HARDWARE_ID: &str = "5E2D9C1A-7B3F-4C8E-9A6D-0F1E2B3C4D5E";

/// A fresh dispatch table with every known entry point registered, each
/// returning [`HARDWARE_ID`] in its native shape.
pub fn hardware_table() -> Arc<NativeDispatchTable> {
    let table = Arc::new(NativeDispatchTable::new());
    let hardware = Uuid::parse_str(HARDWARE_ID).expect("valid fixture uuid");
    for kind in EntryPointKind::ALL {
        let entry = kind.entry_point();
        let shape = entry.shape;
        table.register(
            &entry.symbol(),
            Arc::new(move || match shape {
                crate::interception::ReturnShape::UuidObject => NativeValue::Uuid(Some(hardware)),
                crate::interception::ReturnShape::String => {
                    NativeValue::Text(Some(HARDWARE_ID.to_string()))
                }
            }),
        );
    }
    table
}
