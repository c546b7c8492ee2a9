//! Schema model builder
//!
//! Merges raw catalog descriptors into the [`Schema`] model: one table per
//! distinct table name in first-seen order, columns in ordinal order, every
//! table validated for a usable primary key before anything is generated.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, trace, warn};

use crate::error::GencrudError;
use crate::introspect::{CatalogSnapshot, ColumnDescriptor, TableFilter};
use crate::schema::{Column, EnumType, Schema, Table, SOFT_DELETE_COLUMN};
use crate::typemap::{array_element, find_enum, map_column_type};

/// Bookkeeping tables that never get a generated class
pub const SKIPPED_TABLES: &[&str] = &[
    "alembic_version",
    "schema_migrations",
    "_sqlx_migrations",
    "__diesel_schema_migrations",
    "flyway_schema_history",
];

/// What to do with a table that has no `deleted_at` column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SoftDeletePolicy {
    /// Generate the table without a soft `delete()`
    #[default]
    Omit,
    /// Fail the whole run
    Require,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub filter: TableFilter,
    pub soft_delete: SoftDeletePolicy,
    /// Treat unrecognized column types as fatal instead of warning
    pub strict_types: bool,
}

/// A column whose type fell back to a quoted literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeWarning {
    pub table: String,
    pub column: String,
    pub db_type: String,
}

/// Degraded conditions found while building the model
#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    pub type_warnings: Vec<TypeWarning>,
    /// Tables generated without a soft `delete()`
    pub without_soft_delete: Vec<String>,
    /// Tables dropped by the skip-list or the filter
    pub skipped_tables: Vec<String>,
    /// Identity or generated columns without a default expression, as
    /// `table.column`; these stay caller-writable
    pub server_generated: Vec<String>,
}

/// Build the model for every retained table in the snapshot
pub fn build_schema(
    snapshot: &CatalogSnapshot,
    options: &BuildOptions,
) -> Result<(Schema, BuildReport), GencrudError> {
    let mut report = BuildReport::default();

    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&ColumnDescriptor>> = HashMap::new();
    for descriptor in &snapshot.columns {
        let columns = grouped
            .entry(descriptor.table_name.as_str())
            .or_insert_with(|| {
                order.push(descriptor.table_name.as_str());
                Vec::new()
            });
        columns.push(descriptor);
    }

    let mut used_enums = HashSet::new();
    let mut tables = Vec::with_capacity(order.len());
    for table_name in order {
        if SKIPPED_TABLES.contains(&table_name) {
            debug!(table = ?table_name, "Skipping bookkeeping table");
            report.skipped_tables.push(table_name.to_string());
            continue;
        }
        if !options.filter.should_include(table_name) {
            debug!(table = ?table_name, "Table excluded by filter");
            report.skipped_tables.push(table_name.to_string());
            continue;
        }

        let mut descriptors = grouped.remove(table_name).unwrap_or_default();
        descriptors.sort_by_key(|d| d.ordinal_position);

        let table = build_table(
            table_name,
            &descriptors,
            snapshot,
            options,
            &mut used_enums,
            &mut report,
        )?;
        trace!(
            table = ?table.name,
            columns = ?table.columns.len(),
            primary_key = ?table.primary_key,
            "Built table"
        );
        tables.push(table);
    }

    info!(
        tables = ?tables.len(),
        skipped = ?report.skipped_tables.len(),
        type_warnings = ?report.type_warnings.len(),
        "Schema model built"
    );

    // Enums of the target schema, plus those retained columns borrow from
    // elsewhere
    let enums = snapshot
        .enums
        .iter()
        .filter(|e| {
            e.schema == snapshot.schema_name
                || used_enums.contains(&(e.schema.as_str(), e.name.as_str()))
        })
        .cloned()
        .collect();

    let schema = Schema {
        name: snapshot.schema_name.clone(),
        tables,
        enums,
    };
    Ok((schema, report))
}

fn build_table<'s>(
    table_name: &str,
    descriptors: &[&'s ColumnDescriptor],
    snapshot: &'s CatalogSnapshot,
    options: &BuildOptions,
    used_enums: &mut HashSet<(&'s str, &'s str)>,
    report: &mut BuildReport,
) -> Result<Table, GencrudError> {
    let primary_key = snapshot.primary_keys.resolve(table_name)?.to_string();

    let mut columns = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let mapped = map_column_type(
            &descriptor.data_type,
            &descriptor.udt_schema,
            &descriptor.udt_name,
            &snapshot.enums,
        );
        if let Some(e) = referenced_enum(descriptor, snapshot) {
            used_enums.insert((e.schema.as_str(), e.name.as_str()));
        }

        if mapped.is_fallback() {
            let db_type = if descriptor.data_type.eq_ignore_ascii_case("USER-DEFINED") {
                descriptor.udt_name.clone()
            } else {
                descriptor.data_type.clone()
            };
            if options.strict_types {
                return Err(GencrudError::UnknownColumnType {
                    table: table_name.to_string(),
                    column: descriptor.column_name.clone(),
                    db_type,
                });
            }
            warn!(
                table = ?table_name,
                column = ?descriptor.column_name,
                db_type = ?db_type,
                annotation = ?mapped.annotation(),
                "Unrecognized column type, emitting quoted literal"
            );
            report.type_warnings.push(TypeWarning {
                table: table_name.to_string(),
                column: descriptor.column_name.clone(),
                db_type,
            });
        }

        let has_default = descriptor
            .column_default
            .as_deref()
            .is_some_and(|expr| !expr.trim().is_empty());

        if !has_default && (descriptor.is_identity || descriptor.is_generated) {
            warn!(
                table = ?table_name,
                column = ?descriptor.column_name,
                identity = descriptor.is_identity,
                generated = descriptor.is_generated,
                "Server-generated column has no default expression and stays in create()/update()"
            );
            report
                .server_generated
                .push(format!("{}.{}", table_name, descriptor.column_name));
        }

        columns.push(Column {
            name: descriptor.column_name.clone(),
            db_type: descriptor.data_type.clone(),
            target_type: mapped.into_annotation(),
            has_default,
            nullable: descriptor.is_nullable,
        });
    }

    if !columns.iter().any(|col| col.name == primary_key) {
        return Err(GencrudError::MissingPrimaryKey {
            table: table_name.to_string(),
        });
    }

    if !columns.iter().any(|col| col.name == SOFT_DELETE_COLUMN) {
        match options.soft_delete {
            SoftDeletePolicy::Require => {
                return Err(GencrudError::MissingSoftDeleteColumn {
                    table: table_name.to_string(),
                });
            }
            SoftDeletePolicy::Omit => {
                warn!(table = ?table_name, "No deleted_at column, soft delete omitted");
                report.without_soft_delete.push(table_name.to_string());
            }
        }
    }

    let foreign_keys = snapshot
        .foreign_keys
        .iter()
        .filter(|fk| fk.source_schema == snapshot.schema_name && fk.source_table == table_name)
        .cloned()
        .collect();

    Ok(Table {
        name: table_name.to_string(),
        columns,
        primary_key,
        foreign_keys,
    })
}

fn referenced_enum<'s>(
    descriptor: &ColumnDescriptor,
    snapshot: &'s CatalogSnapshot,
) -> Option<&'s EnumType> {
    let name = if descriptor.data_type.eq_ignore_ascii_case("USER-DEFINED") {
        descriptor.udt_name.as_str()
    } else if descriptor.data_type.eq_ignore_ascii_case("ARRAY") {
        array_element(&descriptor.udt_name)
    } else {
        return None;
    };
    find_enum(&snapshot.enums, &descriptor.udt_schema, name)
}
