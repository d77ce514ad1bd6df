//! Translation of a record shape into a SQL model: table name, column names
//! and the statements the handle executes.
//!
//! Column and table names flow through the process-wide registry in
//! [`names`](crate::names), so an active column-name trap changes what this
//! module produces.

use crate::names;
use crate::record::{ColumnType, Record};

pub(crate) struct ModelField {
    pub column: String,
    pub field: String,
    pub ty: ColumnType,
    pub pk: bool,
    pub notnull: bool,
    pub size: Option<u32>,
}

pub(crate) struct Model {
    pub table: String,
    pub fields: Vec<ModelField>,
}

/// Build the SQL model for a record, minus the omitted fields. When no
/// override is given the table name derives from the record's type name.
pub(crate) fn record_to_model(
    record: &dyn Record,
    override_table: Option<&str>,
    omit_fields: &[String],
) -> Model {
    let table = match override_table {
        Some(table) => table.to_string(),
        None => names::type_name_to_table_name(record.type_name()),
    };
    let mut fields = Vec::new();
    for spec in record.fields() {
        if omit_fields.iter().any(|omitted| omitted == spec.name) {
            continue;
        }
        fields.push(ModelField {
            column: names::field_name_to_column_name(spec.name),
            field: spec.name.to_string(),
            ty: spec.ty,
            pk: spec.pk,
            notnull: spec.notnull,
            size: spec.size,
        });
    }
    Model { table, fields }
}

impl Model {
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self.fields.iter().map(column_ddl).collect();
        format!("create table {} ({})", self.table, columns.join(", "))
    }

    pub fn select_sql(&self) -> String {
        let columns: Vec<&str> = self.fields.iter().map(|f| f.column.as_str()).collect();
        format!("select {} from {}", columns.join(", "), self.table)
    }
}

fn column_ddl(field: &ModelField) -> String {
    let mut ddl = format!("{} {}", field.column, field.ty.ddl(field.size));
    if field.pk {
        ddl.push_str(" primary key");
        if matches!(field.ty, ColumnType::Integer) {
            ddl.push_str(" autoincrement");
        }
    } else if field.notnull {
        ddl.push_str(" not null");
    }
    ddl
}
