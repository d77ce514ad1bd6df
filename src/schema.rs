//! The reversible migration engine: the versioned table registry, the
//! rename/shadow protocol, and the transactional forward/reverse driver.
//!
//! Each database version is described by a record shape named
//! `<Logical>_migration<N>`. A step declares how one version derives from its
//! predecessor in its structure phase, and moves rows in its data phase. The
//! driver walks a range of steps in either direction inside one transaction;
//! on SQLite, which cannot alter columns in place, the live table is renamed
//! aside and an empty new-shape table is created under the canonical name so
//! the data phase can read the old shape and write the new one.

use std::panic::{self, AssertUnwindSafe};

use crate::error::Error;
use crate::migration::Migration;
use crate::names;
use crate::record::{fields_with_suffix, Prototype, Record, NEW, OLD};
use crate::trap::ColumnTrap;

/// A migration step: a declarative structure phase and an imperative data
/// phase. Either may be omitted; the defaults are no-ops.
pub trait ReversibleMigration {
    /// Declare shape changes by calling [`Schema::change_table`].
    fn structure(&self, _schema: &mut Schema) -> Result<(), Error> {
        Ok(())
    }

    /// Move rows between the old and new shapes via [`Schema::find_all`] and
    /// [`Schema::save`]. Returns the number of rows moved.
    ///
    /// `has_column_ops` is true on dialects that support `ALTER TABLE` column
    /// operations; `reverse` is true when the step runs backward, in which
    /// case the shapes declared as current are the source and the previous
    /// shapes the target.
    fn data(
        &self,
        _schema: &mut Schema,
        _has_column_ops: bool,
        _reverse: bool,
    ) -> Result<usize, Error> {
        Ok(0)
    }
}

/// A step assembled from plain function pointers, for migrations that do not
/// warrant a named type.
#[derive(Default)]
pub struct SimpleMigration {
    pub structure: Option<fn(&mut Schema) -> Result<(), Error>>,
    pub data: Option<fn(&mut Schema, bool, bool) -> Result<usize, Error>>,
}

impl ReversibleMigration for SimpleMigration {
    fn structure(&self, schema: &mut Schema) -> Result<(), Error> {
        match self.structure {
            Some(f) => f(schema),
            None => Ok(()),
        }
    }

    fn data(
        &self,
        schema: &mut Schema,
        has_column_ops: bool,
        reverse: bool,
    ) -> Result<usize, Error> {
        match self.data {
            Some(f) => f(schema, has_column_ops, reverse),
            None => Ok(0),
        }
    }
}

/// Registered shapes for one side of a step, in declaration order. The
/// protocol iterates in the order `change_table` was called, so that parent
/// tables are created before the children that reference them and dropped
/// after.
#[derive(Default)]
struct TableSet {
    entries: Vec<(String, Prototype)>,
}

impl TableSet {
    fn insert(&mut self, logical: &str, prototype: Prototype) {
        match self.entries.iter().position(|(name, _)| name == logical) {
            Some(i) => self.entries[i].1 = prototype,
            None => self.entries.push((logical.to_string(), prototype)),
        }
    }

    fn get(&self, logical: &str) -> Option<&Prototype> {
        self.entries
            .iter()
            .find(|(name, _)| name == logical)
            .map(|(_, prototype)| prototype)
    }

    fn contains(&self, logical: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == logical)
    }

    fn iter(&self) -> impl Iterator<Item = &(String, Prototype)> {
        self.entries.iter()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The canonical physical table name of a logical name.
fn physical_table_name(logical: &str) -> String {
    names::type_name_to_table_name(logical)
}

/// Per-run migration scratchpad: the previous and current shapes registered
/// by the running step, the owned [`Migration`] handle, and the column-name
/// trap state.
pub struct Schema {
    prev: TableSet,
    curr: TableSet,
    m: Migration,
    trap: ColumnTrap,
}

impl Schema {
    pub fn new(m: Migration) -> Self {
        Schema {
            prev: TableSet::default(),
            curr: TableSet::default(),
            m,
            trap: ColumnTrap::default(),
        }
    }

    /// The migration handle, for direct access to the connection.
    pub fn migration(&self) -> &Migration {
        &self.m
    }

    /// Apply the steps between two version numbers, forward when
    /// `from < to`, backward when `from > to`, all inside one transaction.
    ///
    /// On a step error the transaction is rolled back, the handle closed and
    /// the error returned unchanged. A panic inside a step is trapped here:
    /// any active column-name trap is removed, the transaction rolled back,
    /// the handle closed, and the panic surfaced as a normal error.
    pub fn run(
        &mut self,
        steps: &[Box<dyn ReversibleMigration>],
        from: usize,
        to: usize,
    ) -> Result<(), Error> {
        if from == to {
            return Ok(());
        }
        self.m.begin()?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_steps(steps, from, to)));
        match outcome {
            Ok(Ok(())) => match self.m.commit() {
                Ok(()) => Ok(()),
                Err(e) => {
                    self.m.rollback();
                    self.close();
                    Err(e)
                }
            },
            Ok(Err(e)) => {
                self.m.rollback();
                self.close();
                Err(e)
            }
            Err(payload) => {
                self.trap.uninstall();
                self.m.rollback();
                self.close();
                let message = panic_message(payload);
                #[cfg(feature = "tracing")]
                tracing::error!(
                    panic = %message,
                    backtrace = %std::backtrace::Backtrace::force_capture(),
                    "panic trapped during migration run"
                );
                Err(Error::Generic(message))
            }
        }
    }

    fn run_steps(
        &mut self,
        steps: &[Box<dyn ReversibleMigration>],
        from: usize,
        to: usize,
    ) -> Result<(), Error> {
        if from < to {
            for i in from..to {
                self.migrate(steps[i].as_ref(), false)?;
            }
        } else {
            for i in (to..from).rev() {
                self.migrate(steps[i].as_ref(), true)?;
            }
        }
        Ok(())
    }

    fn migrate(&mut self, step: &dyn ReversibleMigration, reverse: bool) -> Result<(), Error> {
        self.clear();
        step.structure(self)?;
        if reverse {
            self.flip_over();
        }
        self.rename_current_tables_add_columns()?;
        let has_column_ops = self.m.has_column_operations();
        let count = step.data(self, has_column_ops, reverse)?;
        self.remove_old_rename_columns()?;
        if count > 0 {
            #[cfg(feature = "tracing")]
            tracing::info!(rows = count, "data migration complete");
        } else {
            #[cfg(feature = "tracing")]
            tracing::info!("schema adjusted, no rows moved");
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.prev.clear();
        self.curr.clear();
    }

    /// Swap the previous and current sides: the declared targets become the
    /// sources of a reverse step.
    fn flip_over(&mut self) {
        std::mem::swap(&mut self.prev, &mut self.curr);
    }

    /// Register a table change under a logical name.
    ///
    /// `prev` alone drops the table, `curr` alone creates it, both together
    /// change its shape. Supplying neither is rejected. Every supplied
    /// prototype must be named `<logical>_migration<N>`.
    pub fn change_table(
        &mut self,
        logical: &str,
        prev: Option<Prototype>,
        curr: Option<Prototype>,
    ) -> Result<(), Error> {
        if prev.is_none() && curr.is_none() {
            return Err(Error::Generic(format!(
                "change_table for {} needs a previous shape, a current shape, or both",
                logical
            )));
        }
        if let Some(prototype) = prev {
            self.check_logical_name(logical, prototype.record());
            self.prev.insert(logical, prototype);
        }
        if let Some(prototype) = curr {
            self.check_logical_name(logical, prototype.record());
            self.curr.insert(logical, prototype);
        }
        Ok(())
    }

    /// Panics unless the record's type name is `<logical>_migration<N>`.
    fn check_logical_name(&self, logical: &str, record: &dyn Record) {
        let type_name = record.type_name();
        let (name, number) = match type_name.split_once("_migration") {
            Some(parts) => parts,
            None => panic!(
                "can't understand logical name {} with record {}",
                logical, type_name
            ),
        };
        if name != logical {
            panic!(
                "can't understand logical name {} with record {}",
                logical, type_name
            );
        }
        if number.parse::<i64>().is_err() {
            panic!(
                "can't understand migration number {} in record name {}",
                number, type_name
            );
        }
    }

    /// Move the shape-changed tables aside under their versioned names, then
    /// create the empty new-shape tables under the canonical names. While a
    /// new table is created the trap strips the new-shape suffix and the
    /// old-shape fields are left out entirely.
    fn rename_current_tables_add_columns(&mut self) -> Result<(), Error> {
        for (logical, pair) in self.prev.iter() {
            if !self.curr.contains(logical) {
                // a pure drop keeps its canonical name until finalization
                continue;
            }
            let old_name = physical_table_name(logical);
            let new_name = names::type_name_to_table_name(pair.type_name());
            self.m.rename_table(&old_name, &new_name)?;
        }
        for (logical, pair) in self.curr.iter() {
            self.trap.install(NEW);
            let result = self.m.create_table(
                Some(&physical_table_name(logical)),
                pair.record(),
                &fields_with_suffix(pair.record(), OLD),
            );
            self.trap.uninstall();
            result?;
        }
        Ok(())
    }

    /// Finalize a step by dropping the retired tables. Shape-changed tables
    /// were renamed to their versioned names; pure drops still sit under the
    /// canonical name. The new-shape tables already occupy their canonical
    /// names and need no further work.
    fn remove_old_rename_columns(&mut self) -> Result<(), Error> {
        for (logical, pair) in self.prev.iter() {
            if self.curr.contains(logical) {
                self.m.drop_table(pair.record())?;
            } else {
                self.m.drop_table_by_name(&physical_table_name(logical))?;
            }
        }
        Ok(())
    }

    /// Read every row of the previous shape registered under the logical
    /// name, as of this step (after any reverse flip).
    ///
    /// Panics when no previous shape is registered for the logical name, or
    /// when `T` is not that shape.
    pub fn find_all<T: Record + Default>(&mut self, logical: &str) -> Result<Vec<T>, Error> {
        let pair = match self.prev.get(logical) {
            Some(pair) => pair,
            None => panic!("no previous shape registered for logical name {}", logical),
        };
        let probe = T::default();
        if probe.type_name() != pair.type_name() {
            panic!(
                "logical name {} holds shape {}, not {}",
                logical,
                pair.type_name(),
                probe.type_name()
            );
        }
        let table = if self.curr.contains(logical) {
            names::type_name_to_table_name(pair.type_name())
        } else {
            physical_table_name(logical)
        };
        let omitted = fields_with_suffix(pair.record(), OLD);
        self.trap.install(NEW);
        let mut accessor = self.m.same_transaction();
        accessor.omit_fields(omitted);
        let result = accessor.find_all::<T>(Some(&table));
        self.trap.uninstall();
        result
    }

    /// Write a record into the current (new-shape) table of the logical name
    /// and return its primary key. Old-shape fields are left out of the
    /// write; new-shape fields land in their unsuffixed columns.
    pub fn save(&mut self, logical: &str, record: &dyn Record) -> Result<i64, Error> {
        self.check_logical_name(logical, record);
        let table = physical_table_name(logical);
        let omitted = fields_with_suffix(record, OLD);
        self.trap.install(NEW);
        let mut accessor = self.m.same_transaction();
        accessor.omit_fields(omitted);
        let result = accessor.save(record, Some(&table));
        self.trap.uninstall();
        result
    }

    pub fn is_closed(&self) -> bool {
        self.m.is_closed()
    }

    /// Release the migration handle and its connection.
    pub fn close(&mut self) {
        self.m.close();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
