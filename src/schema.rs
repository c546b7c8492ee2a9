//! Schema data structures
//!
//! These types represent database schema information and form the contract
//! between the model builder (produces) and code generation (consumes).
//! Everything here is read-only once built and lives only for a single
//! generation run.

use std::collections::HashMap;

use crate::error::GencrudError;

/// Column that marks a row as soft-deleted
pub const SOFT_DELETE_COLUMN: &str = "deleted_at";

/// A complete database schema
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
    pub enums: Vec<EnumType>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Database table
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    /// Columns in catalog ordinal order
    pub columns: Vec<Column>,
    /// The single column addressed by read/update/delete
    pub primary_key: String,
    /// Outgoing foreign keys; descriptive only
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn primary_key_column(&self) -> Option<&Column> {
        self.column(&self.primary_key)
    }

    /// Columns the caller supplies on create and may change on update
    ///
    /// Anything with a server-side default is left to the database.
    pub fn writable_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|col| !col.has_default).collect()
    }

    pub fn soft_delete_column(&self) -> Option<&Column> {
        self.column(SOFT_DELETE_COLUMN)
    }
}

/// A table column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Type name as reported by the catalog
    pub db_type: String,
    /// Type annotation used in generated code
    pub target_type: String,
    /// Column has a non-empty default expression
    pub has_default: bool,
    pub nullable: bool,
}

impl Column {
    pub fn is_timezone_aware(&self) -> bool {
        let lower = self.db_type.to_lowercase();
        lower.contains("with time zone") || lower == "timestamptz" || lower == "timetz"
    }
}

/// A foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub constraint_name: String,
    pub source_schema: String,
    pub source_table: String,
    pub source_column: String,
    pub target_schema: String,
    pub target_table: String,
    pub target_column: String,
}

/// A custom enum type defined in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    /// Namespace the type is declared in
    pub schema: String,
    pub name: String,
    /// Labels in catalog sort order
    pub values: Vec<String>,
}

impl EnumType {
    pub fn is(&self, schema: &str, name: &str) -> bool {
        self.schema == schema && self.name == name
    }
}

/// One column of a primary key constraint as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyColumn {
    pub table_name: String,
    pub column_name: String,
    /// Position of the column within the key, starting at 1
    pub key_position: i32,
}

/// Table name to primary-key column lookup, built once per run
#[derive(Debug, Default, Clone)]
pub struct PrimaryKeyIndex {
    keys: HashMap<String, Vec<(i32, String)>>,
}

impl PrimaryKeyIndex {
    pub fn from_columns(columns: impl IntoIterator<Item = PrimaryKeyColumn>) -> Self {
        let mut keys: HashMap<String, Vec<(i32, String)>> = HashMap::new();
        for col in columns {
            keys.entry(col.table_name)
                .or_default()
                .push((col.key_position, col.column_name));
        }
        for key in keys.values_mut() {
            key.sort();
        }
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key columns of a table in key order
    pub fn columns(&self, table_name: &str) -> Vec<&str> {
        self.keys
            .get(table_name)
            .map(|key| key.iter().map(|(_, name)| name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Resolve the single key column of a table
    ///
    /// Tables without a key and tables with a composite key are both
    /// rejected; neither can be addressed by a single `$1`.
    pub fn resolve(&self, table_name: &str) -> Result<&str, GencrudError> {
        match self.columns(table_name).as_slice() {
            [] => Err(GencrudError::MissingPrimaryKey {
                table: table_name.to_string(),
            }),
            [single] => Ok(*single),
            many => Err(GencrudError::CompositePrimaryKey {
                table: table_name.to_string(),
                columns: many.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }
}

/// Convert snake_case to PascalCase
pub fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => {
                    let first_upper = first.to_uppercase().to_string();
                    first_upper + chars.as_str()
                }
            }
        })
        .collect()
}
