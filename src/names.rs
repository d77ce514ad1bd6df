//! Process-wide name mapping between record identifiers and SQL identifiers.
//!
//! The mapper consults these functions whenever it translates a record field
//! name to a column name (and back), or a record type name to a table name
//! (and back). All four are rebindable at runtime; the column-name trap
//! relies on that to make suffixed fields resolve to unsuffixed columns for
//! the duration of one statement.
//!
//! The registry is process-wide and the engine is single-threaded by
//! contract: running two migration engines concurrently in one process is
//! unsupported.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

/// Signature of a rebindable name-mapping function.
pub type NameFn = dyn Fn(&str) -> String + Send + Sync;

struct NameRegistry {
    field_to_column: Arc<NameFn>,
    column_to_field: Arc<NameFn>,
    type_to_table: Arc<NameFn>,
    table_to_type: Arc<NameFn>,
}

/// Record field names and column names are both snake_case, so the defaults
/// in that direction are the normalizing `to_snake` (identity on snake
/// input). Type names are UpperCamel with the `_migration<N>` infix, which is
/// where the camel conversions still do real work.
static REGISTRY: LazyLock<RwLock<NameRegistry>> = LazyLock::new(|| {
    RwLock::new(NameRegistry {
        field_to_column: Arc::new(|name| to_snake(name)),
        column_to_field: Arc::new(|name| to_snake(name)),
        type_to_table: Arc::new(|name| to_snake(name)),
        table_to_type: Arc::new(|name| snake_to_upper_camel(name)),
    })
});

fn read() -> std::sync::RwLockReadGuard<'static, NameRegistry> {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner)
}

fn write() -> std::sync::RwLockWriteGuard<'static, NameRegistry> {
    REGISTRY.write().unwrap_or_else(PoisonError::into_inner)
}

/// Convert a record field name to a column name.
pub fn field_name_to_column_name(name: &str) -> String {
    let f = read().field_to_column.clone();
    f(name)
}

/// Convert a result-set column name back to a record field name.
pub fn column_name_to_field_name(name: &str) -> String {
    let f = read().column_to_field.clone();
    f(name)
}

/// Convert a record type name (or a logical name) to a table name.
pub fn type_name_to_table_name(name: &str) -> String {
    let f = read().type_to_table.clone();
    f(name)
}

/// Convert a table name to a record type name.
pub fn table_name_to_type_name(name: &str) -> String {
    let f = read().table_to_type.clone();
    f(name)
}

/// Rebind the field-to-column mapping.
pub fn set_field_name_to_column_name(f: Arc<NameFn>) {
    write().field_to_column = f;
}

/// Rebind the column-to-field mapping.
pub fn set_column_name_to_field_name(f: Arc<NameFn>) {
    write().column_to_field = f;
}

/// Rebind the type-to-table mapping.
pub fn set_type_name_to_table_name(f: Arc<NameFn>) {
    write().type_to_table = f;
}

/// Rebind the table-to-type mapping.
pub fn set_table_name_to_type_name(f: Arc<NameFn>) {
    write().table_to_type = f;
}

pub(crate) fn current_field_name_to_column_name() -> Arc<NameFn> {
    read().field_to_column.clone()
}

pub(crate) fn current_column_name_to_field_name() -> Arc<NameFn> {
    read().column_to_field.clone()
}

/// ASCII uppercase letters start a new underscore segment and are lowercased.
pub fn to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, b) in name.bytes().enumerate() {
        if b.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push((b + 32) as char);
        } else {
            out.push(b as char);
        }
    }
    out
}

/// Underscores start a new camel segment and the following letter is
/// uppercased.
pub fn snake_to_upper_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut first = true;
    for b in name.bytes() {
        if b == b'_' {
            first = true;
        } else if first && b.is_ascii_lowercase() {
            out.push((b - 32) as char);
            first = false;
        } else {
            out.push(b as char);
        }
    }
    out
}

/// Serializes tests that read or rebind the process-wide registry.
#[cfg(test)]
pub(crate) fn registry_test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}
