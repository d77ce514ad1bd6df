//! The column-name trap: a temporary rebinding of the field/column mappers
//! so that fields carrying the new-shape suffix resolve to the unsuffixed
//! column on the physical table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::names::{self, NameFn};

/// Snapshot of the mappers replaced by an active trap. Owned by the schema so
/// the driver can restore them even when a step panics mid-window.
#[derive(Default)]
pub(crate) struct ColumnTrap {
    saved_field_to_column: Option<Arc<NameFn>>,
    saved_column_to_field: Option<Arc<NameFn>>,
}

impl ColumnTrap {
    /// Install the trap for a suffix.
    ///
    /// Field names ending in the suffix map to the column of the bare name,
    /// and the reverse mapping is recorded so query results flow back into
    /// the suffixed field. Everything else delegates to the snapshot.
    pub fn install(&mut self, suffix: &str) {
        assert!(
            self.saved_field_to_column.is_none() && self.saved_column_to_field.is_none(),
            "a column-name trap is already active"
        );
        let prev_field_to_column = names::current_field_name_to_column_name();
        let prev_column_to_field = names::current_column_name_to_field_name();
        let reverse: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
        let suffix = suffix.to_string();

        let field_to_column: Arc<NameFn> = {
            let prev = prev_field_to_column.clone();
            let reverse = reverse.clone();
            Arc::new(move |name: &str| {
                if let Some(bare) = name.strip_suffix(suffix.as_str()) {
                    let column = prev(bare);
                    reverse
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(column.clone(), name.to_string());
                    column
                } else {
                    prev(name)
                }
            })
        };
        let column_to_field: Arc<NameFn> = {
            let prev = prev_column_to_field.clone();
            Arc::new(move |name: &str| {
                let recorded = reverse
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(name)
                    .cloned();
                match recorded {
                    Some(field) => field,
                    None => prev(name),
                }
            })
        };

        names::set_field_name_to_column_name(field_to_column);
        names::set_column_name_to_field_name(column_to_field);
        self.saved_field_to_column = Some(prev_field_to_column);
        self.saved_column_to_field = Some(prev_column_to_field);
    }

    /// Restore the snapshots. Idempotent: safe to call on success, failure
    /// and panic paths alike.
    pub fn uninstall(&mut self) {
        if let Some(f) = self.saved_field_to_column.take() {
            names::set_field_name_to_column_name(f);
        }
        if let Some(f) = self.saved_column_to_field.take() {
            names::set_column_name_to_field_name(f);
        }
    }
}
