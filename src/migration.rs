//! The migration handle: a SQLite connection, one transaction, and the DDL
//! and row operations the schema engine drives through it.

use rusqlite::Connection;

use crate::error::Error;
use crate::model;
use crate::names;
use crate::record::{Record, Value};

/// Owns the database connection and the run's single transaction.
///
/// The transaction is driven with explicit `begin`/`commit`/`rollback`
/// statements because it must span every step of a run; shadow tables created
/// mid-run are only visible inside it.
pub struct Migration {
    conn: Option<Connection>,
    in_tx: bool,
}

impl Migration {
    pub fn new(conn: Connection) -> Self {
        Migration {
            conn: Some(conn),
            in_tx: false,
        }
    }

    /// Direct access to the underlying connection.
    pub fn connection(&self) -> &Connection {
        self.conn()
    }

    fn conn(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("migration handle has been closed")
    }

    fn execute(&self, sql: &str) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %sql, "executing");
        self.conn().execute_batch(sql)?;
        Ok(())
    }

    pub fn begin(&mut self) -> Result<(), Error> {
        if self.in_tx {
            return Err(Error::Generic("a transaction is already open".to_string()));
        }
        self.execute("begin")?;
        self.in_tx = true;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        if !self.in_tx {
            return Err(Error::Generic(
                "no transaction in progress, cannot commit".to_string(),
            ));
        }
        self.execute("commit")?;
        self.in_tx = false;
        Ok(())
    }

    /// Roll back the open transaction. A no-op when none is open, so the
    /// driver's error paths cannot double-fault.
    pub fn rollback(&mut self) {
        if !self.in_tx {
            return;
        }
        if let Err(_e) = self.execute("rollback") {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_e, "failed to roll back migration transaction");
        }
        self.in_tx = false;
    }

    pub fn in_transaction(&self) -> bool {
        self.in_tx
    }

    /// Whether the dialect supports `ALTER TABLE` column operations. SQLite
    /// does not, which is what the shadow-table protocol exists for; the flag
    /// is forwarded to the data phase untouched.
    pub fn has_column_operations(&self) -> bool {
        false
    }

    /// Create a table from a record prototype, optionally under an explicit
    /// table name and minus the omitted fields.
    pub fn create_table(
        &self,
        override_name: Option<&str>,
        prototype: &dyn Record,
        omit_fields: &[String],
    ) -> Result<(), Error> {
        let model = model::record_to_model(prototype, override_name, omit_fields);
        self.execute(&model.create_table_sql())
    }

    /// Drop the table whose name derives from the prototype's type name.
    pub fn drop_table(&self, prototype: &dyn Record) -> Result<(), Error> {
        self.drop_table_by_name(&names::type_name_to_table_name(prototype.type_name()))
    }

    pub fn drop_table_by_name(&self, table: &str) -> Result<(), Error> {
        self.execute(&format!("drop table if exists {}", table))
    }

    pub fn rename_table(&self, old: &str, new: &str) -> Result<(), Error> {
        self.execute(&format!("alter table {} rename to {}", old, new))
    }

    /// Row access inside the run's transaction. Panics when no transaction is
    /// open: row movement against shadow tables is meaningless outside it.
    pub fn same_transaction(&self) -> SameTx<'_> {
        assert!(
            self.in_tx,
            "cannot access migration data outside the run's transaction"
        );
        SameTx {
            migration: self,
            omitted: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Release the connection. Later use of the handle panics.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_conn, _e)) = conn.close() {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %_e, "failed to close database connection");
            }
        }
    }
}

/// Accessor for reads and writes inside the migration transaction, with a
/// set of record fields to leave out of the SQL.
pub struct SameTx<'m> {
    migration: &'m Migration,
    omitted: Vec<String>,
}

impl SameTx<'_> {
    /// Leave the named record fields out of subsequent selects and inserts.
    pub fn omit_fields<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omitted.extend(fields.into_iter().map(Into::into));
    }

    /// Select every row of the table as records of shape `T`. Result columns
    /// are mapped back to field names through the (possibly trapped) name
    /// registry.
    pub fn find_all<T: Record + Default>(
        &self,
        override_table: Option<&str>,
    ) -> Result<Vec<T>, Error> {
        let prototype = T::default();
        let model = model::record_to_model(&prototype, override_table, &self.omitted);
        let sql = model.select_sql();
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %sql, "querying");
        let mut stmt = self.migration.conn().prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = T::default();
            for (i, field) in model.fields.iter().enumerate() {
                let value: Value = row.get(i)?;
                let name = names::column_name_to_field_name(&field.column);
                record.set(&name, value)?;
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Insert the record and return its primary key. A zero-valued primary
    /// key (integer 0, empty string) is left to the database to assign.
    pub fn save(&self, record: &dyn Record, override_table: Option<&str>) -> Result<i64, Error> {
        let model = model::record_to_model(record, override_table, &self.omitted);
        let mut columns: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        let mut provided_pk: Option<i64> = None;
        for field in &model.fields {
            let value = record.get(&field.field).ok_or_else(|| {
                Error::Generic(format!(
                    "record {} has no field named {}",
                    record.type_name(),
                    field.field
                ))
            })?;
            if field.pk {
                if pk_is_zero(&value) {
                    continue;
                }
                if let Value::Integer(id) = value {
                    provided_pk = Some(id);
                }
            }
            columns.push(field.column.clone());
            values.push(value);
        }
        let sql = if columns.is_empty() {
            format!("insert into {} default values", model.table)
        } else {
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "insert into {} ({}) values ({})",
                model.table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %sql, "inserting");
        let conn = self.migration.conn();
        conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(provided_pk.unwrap_or_else(|| conn.last_insert_rowid()))
    }
}

fn pk_is_zero(value: &Value) -> bool {
    match value {
        Value::Integer(i) => *i == 0,
        Value::Text(t) => t.is_empty(),
        Value::Null => true,
        _ => false,
    }
}
