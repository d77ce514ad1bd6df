//! The record capability surface consumed by the mapper and the migration
//! engine.
//!
//! A versioned record shape is a plain struct whose type name carries the
//! `_migration<N>` infix (`Article_migration2`). Instead of walking types at
//! runtime, every shape implements [`Record`]: it reports its unqualified
//! type name, its fields in declared order, and moves values in and out by
//! field name. The [`migration_record!`](crate::migration_record) macro
//! derives all of it.

use chrono::{DateTime, Utc};

use crate::error::Error;

pub use rusqlite::types::Value;

/// Suffix marking fields whose column exists only on the old-shape table.
pub const OLD: &str = "_old";

/// Suffix marking fields whose column exists only on the new-shape table.
/// The suffix is stripped when mapping to SQL.
pub const NEW: &str = "_new";

/// Storage class of a record field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
    Timestamp,
}

impl ColumnType {
    pub(crate) fn ddl(self, size: Option<u32>) -> String {
        match self {
            ColumnType::Integer | ColumnType::Boolean => "integer".to_string(),
            ColumnType::Real => "real".to_string(),
            ColumnType::Blob => "blob".to_string(),
            ColumnType::Text => match size {
                Some(size) => format!("varchar({})", size),
                None => "text".to_string(),
            },
            ColumnType::Timestamp => "text".to_string(),
        }
    }
}

/// A Rust type that can live in a record field and travel through a SQL
/// column.
///
/// `zero` is the freshly-constructed value used for prototypes and for
/// reading SQL `NULL` into a non-optional field.
pub trait ColumnValue: Sized {
    const TYPE: ColumnType;
    const NULLABLE: bool = false;

    fn zero() -> Self;
    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self, Error>;
}

impl ColumnValue for i64 {
    const TYPE: ColumnType = ColumnType::Integer;

    fn zero() -> Self {
        0
    }

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Integer(i) => Ok(i),
            Value::Null => Ok(0),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl ColumnValue for f64 {
    const TYPE: ColumnType = ColumnType::Real;

    fn zero() -> Self {
        0.0
    }

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Real(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            Value::Null => Ok(0.0),
            other => Err(mismatch("real", &other)),
        }
    }
}

impl ColumnValue for bool {
    const TYPE: ColumnType = ColumnType::Boolean;

    fn zero() -> Self {
        false
    }

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            Value::Null => Ok(false),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl ColumnValue for String {
    const TYPE: ColumnType = ColumnType::Text;

    fn zero() -> Self {
        String::new()
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl ColumnValue for Vec<u8> {
    const TYPE: ColumnType = ColumnType::Blob;

    fn zero() -> Self {
        Vec::new()
    }

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Blob(b) => Ok(b),
            Value::Null => Ok(Vec::new()),
            other => Err(mismatch("blob", &other)),
        }
    }
}

/// Timestamps are stored as RFC 3339 text. The zero value is the Unix epoch.
impl ColumnValue for DateTime<Utc> {
    const TYPE: ColumnType = ColumnType::Timestamp;

    fn zero() -> Self {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn to_value(&self) -> Value {
        Value::Text(self.to_rfc3339())
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| Error::Generic(format!("invalid timestamp {}: {}", s, e))),
            Value::Null => Ok(Self::zero()),
            other => Err(mismatch("timestamp", &other)),
        }
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    const TYPE: ColumnType = T::TYPE;
    const NULLABLE: bool = true;

    fn zero() -> Self {
        None
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => Ok(Some(T::from_value(other)?)),
        }
    }
}

fn mismatch(expected: &str, got: &Value) -> Error {
    Error::Generic(format!("expected a {} value, got {:?}", expected, got))
}

/// Declared metadata of one record field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub pk: bool,
    pub notnull: bool,
    pub size: Option<u32>,
}

impl FieldSpec {
    /// An integer field named `id` is implicitly the primary key.
    pub fn new<T: ColumnValue>(name: &'static str) -> Self {
        let pk = name == "id" && matches!(T::TYPE, ColumnType::Integer);
        FieldSpec {
            name,
            ty: T::TYPE,
            pk,
            notnull: false,
            size: None,
        }
    }

    pub fn pk(mut self) -> Self {
        self.pk = true;
        self
    }

    pub fn notnull(mut self) -> Self {
        self.notnull = true;
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }
}

/// Capability trait implemented by every versioned record shape.
pub trait Record {
    /// The unqualified type name, e.g. `"Article_migration2"`.
    fn type_name(&self) -> &'static str;

    /// Declared fields, in declaration order.
    fn fields(&self) -> Vec<FieldSpec>;

    /// The current value of a field, or `None` for an unknown field name.
    fn get(&self, field: &str) -> Option<Value>;

    /// Store a SQL value into a field.
    fn set(&mut self, field: &str, value: Value) -> Result<(), Error>;
}

/// A record shape captured for the registry: the unqualified type name plus a
/// live instance suitable for introspection.
pub struct Prototype {
    type_name: &'static str,
    record: Box<dyn Record>,
}

impl Prototype {
    /// Prototype of a shape from its type alone: a fresh zero-valued record.
    pub fn of<T: Record + Default + 'static>() -> Self {
        Self::from_boxed(Box::new(T::default()))
    }

    /// Prototype taken from a live record.
    pub fn from_record<T: Record + Clone + 'static>(record: &T) -> Self {
        Self::from_boxed(Box::new(record.clone()))
    }

    /// Prototype taken from a sequence of records: the first element when the
    /// sequence is non-empty, a fresh zero-valued record otherwise.
    pub fn from_records<T: Record + Clone + Default + 'static>(records: &[T]) -> Self {
        match records.first() {
            Some(record) => Self::from_record(record),
            None => Self::of::<T>(),
        }
    }

    fn from_boxed(record: Box<dyn Record>) -> Self {
        let type_name = record.type_name();
        Prototype { type_name, record }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn record(&self) -> &dyn Record {
        self.record.as_ref()
    }
}

impl std::fmt::Debug for Prototype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prototype")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Names of the record's fields that carry the given suffix.
pub(crate) fn fields_with_suffix(record: &dyn Record, suffix: &str) -> Vec<String> {
    record
        .fields()
        .iter()
        .filter(|f| f.name.ends_with(suffix))
        .map(|f| f.name.to_string())
        .collect()
}
