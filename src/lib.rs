//! # Reversio
//!
//! `reversio` is a reversible schema-and-data migration engine for SQLite.
//! Each database version is described by a plain record type named
//! `<Logical>_migration<N>`; a migration step declares how one version
//! derives from its predecessor and, when rows need to move, reads the old
//! shape and writes the new one. A run moves the database between two
//! version numbers in either direction, inside a single transaction.
//!
//! SQLite cannot alter columns in place, so a shape change renames the live
//! table aside under its versioned name and creates an empty new-shape table
//! under the canonical name. Fields suffixed `_old` exist only on the old
//! table; fields suffixed `_new` exist only on the new table and lose the
//! suffix on the way into SQL, which is what lets one record type describe
//! both sides of the change.
//!
//! ## Example
//!
//! ```
//! use reversio::{migration_record, Error, Migration, Prototype, ReversibleMigration, Schema};
//! use rusqlite::Connection;
//!
//! // each database version is a record shape
//! migration_record! {
//!     struct Note_migration1 {
//!         id: i64,
//!         body: String,
//!     }
//! }
//!
//! migration_record! {
//!     struct Note_migration2 {
//!         id: i64,
//!         body_old: String,
//!         text_new: String,
//!     }
//! }
//!
//! struct AddNoteTable;
//!
//! impl ReversibleMigration for AddNoteTable {
//!     fn structure(&self, schema: &mut Schema) -> Result<(), Error> {
//!         schema.change_table("Note", None, Some(Prototype::of::<Note_migration1>()))
//!     }
//! }
//!
//! struct RenameBodyToText;
//!
//! impl ReversibleMigration for RenameBodyToText {
//!     fn structure(&self, schema: &mut Schema) -> Result<(), Error> {
//!         schema.change_table(
//!             "Note",
//!             Some(Prototype::of::<Note_migration1>()),
//!             Some(Prototype::of::<Note_migration2>()),
//!         )
//!     }
//!
//!     fn data(
//!         &self,
//!         schema: &mut Schema,
//!         _has_column_ops: bool,
//!         reverse: bool,
//!     ) -> Result<usize, Error> {
//!         if reverse {
//!             let notes: Vec<Note_migration2> = schema.find_all("Note")?;
//!             for note in &notes {
//!                 let restored = Note_migration1 { id: note.id, body: note.text_new.clone() };
//!                 schema.save("Note", &restored)?;
//!             }
//!             Ok(notes.len())
//!         } else {
//!             let notes: Vec<Note_migration1> = schema.find_all("Note")?;
//!             for note in &notes {
//!                 let moved = Note_migration2 {
//!                     id: note.id,
//!                     body_old: String::new(),
//!                     text_new: note.body.clone(),
//!                 };
//!                 schema.save("Note", &moved)?;
//!             }
//!             Ok(notes.len())
//!         }
//!     }
//! }
//!
//! let steps: Vec<Box<dyn ReversibleMigration>> =
//!     vec![Box::new(AddNoteTable), Box::new(RenameBodyToText)];
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let mut schema = Schema::new(Migration::new(conn));
//!
//! // forward to version 1, write a row, then forward to version 2
//! schema.run(&steps, 0, 1).unwrap();
//! schema
//!     .migration()
//!     .connection()
//!     .execute("INSERT INTO note (body) VALUES ('pick up milk')", [])
//!     .unwrap();
//! schema.run(&steps, 1, 2).unwrap();
//!
//! // the physical table now has a `text` column carrying the old body
//! let text: String = schema
//!     .migration()
//!     .connection()
//!     .query_row("SELECT text FROM note WHERE id = 1", [], |row| row.get(0))
//!     .unwrap();
//! assert_eq!(text, "pick up milk");
//!
//! // and back again
//! schema.run(&steps, 2, 1).unwrap();
//! let body: String = schema
//!     .migration()
//!     .connection()
//!     .query_row("SELECT body FROM note WHERE id = 1", [], |row| row.get(0))
//!     .unwrap();
//! assert_eq!(body, "pick up milk");
//! schema.close();
//! ```

mod error;
mod macros;
mod migration;
mod model;
pub mod names;
pub mod record;
mod schema;
mod trap;

pub use error::Error;
pub use migration::{Migration, SameTx};
pub use record::{ColumnType, ColumnValue, FieldSpec, Prototype, Record, Value, NEW, OLD};
pub use schema::{ReversibleMigration, Schema, SimpleMigration};
