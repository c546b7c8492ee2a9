//! Database introspection
//!
//! This module provides functionality for extracting raw catalog metadata
//! from databases. Each supported database has its own feature-gated
//! submodule; turning the raw descriptors into a model is the job of
//! [`crate::builder`].

use tracing::info;

use crate::prelude::GencrudError;
use crate::schema::{EnumType, ForeignKey, PrimaryKeyColumn, PrimaryKeyIndex};

/// One row of column metadata as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub table_name: String,
    pub column_name: String,
    pub ordinal_position: i32,
    /// Default expression text, if any
    pub column_default: Option<String>,
    pub is_nullable: bool,
    pub data_type: String,
    /// Schema of the underlying type; resolves enums declared elsewhere
    pub udt_schema: String,
    pub udt_name: String,
    /// `GENERATED ... AS IDENTITY`
    pub is_identity: bool,
    /// `GENERATED ALWAYS AS (...) STORED`
    pub is_generated: bool,
}

/// Everything the model builder needs, captured in one pass
#[derive(Debug, Default, Clone)]
pub struct CatalogSnapshot {
    pub schema_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_keys: PrimaryKeyIndex,
    pub foreign_keys: Vec<ForeignKey>,
    pub enums: Vec<EnumType>,
}

/// Filters to apply when building the model
#[derive(Debug, Default, Clone)]
pub struct TableFilter {
    /// Only include these tables (if Some)
    pub include: Option<Vec<String>>,
    /// Exclude these tables
    pub exclude: Option<Vec<String>>,
}

impl TableFilter {
    /// Check if a table should be included
    pub fn should_include(&self, table_name: &str) -> bool {
        // Check include list
        if let Some(include) = &self.include {
            if !include.iter().any(|t| t == table_name) {
                return false;
            }
        }

        // Check exclude list
        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|t| t == table_name) {
                return false;
            }
        }

        true
    }
}

/// Source of raw catalog metadata
///
/// Every method is a single round trip; failures are fatal and never
/// retried.
pub trait CatalogSource {
    /// Columns of every table in the schema, ordered by table then ordinal
    fn columns(&mut self, schema_name: &str) -> Result<Vec<ColumnDescriptor>, GencrudError>;

    /// Primary key columns of every table in the schema
    fn primary_keys(&mut self, schema_name: &str) -> Result<Vec<PrimaryKeyColumn>, GencrudError>;

    /// All foreign key constraints in the database
    fn foreign_keys(&mut self) -> Result<Vec<ForeignKey>, GencrudError>;

    /// All enum types in the database with labels in sort order, keyed by
    /// schema and name
    fn enums(&mut self) -> Result<Vec<EnumType>, GencrudError>;

    /// Run all four queries one after another
    fn snapshot(&mut self, schema_name: &str) -> Result<CatalogSnapshot, GencrudError> {
        info!(schema = ?schema_name, "Starting catalog introspection");

        let primary_keys = PrimaryKeyIndex::from_columns(self.primary_keys(schema_name)?);
        let columns = self.columns(schema_name)?;
        let foreign_keys = self.foreign_keys()?;
        let enums = self.enums()?;

        info!(
            schema = ?schema_name,
            columns = ?columns.len(),
            keyed_tables = ?primary_keys.len(),
            foreign_keys = ?foreign_keys.len(),
            enums = ?enums.len(),
            "Catalog introspection complete"
        );

        Ok(CatalogSnapshot {
            schema_name: schema_name.to_string(),
            columns,
            primary_keys,
            foreign_keys,
            enums,
        })
    }
}

// Feature-gated database implementations
#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresCatalog;

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCatalog {
        calls: Vec<&'static str>,
    }

    impl CatalogSource for FixedCatalog {
        fn columns(&mut self, _schema_name: &str) -> Result<Vec<ColumnDescriptor>, GencrudError> {
            self.calls.push("columns");
            Ok(vec![ColumnDescriptor {
                table_name: "vlan".to_string(),
                column_name: "id".to_string(),
                ordinal_position: 1,
                column_default: Some("gen_random_uuid()".to_string()),
                is_nullable: false,
                data_type: "uuid".to_string(),
                udt_schema: "pg_catalog".to_string(),
                udt_name: "uuid".to_string(),
                is_identity: false,
                is_generated: false,
            }])
        }

        fn primary_keys(
            &mut self,
            _schema_name: &str,
        ) -> Result<Vec<PrimaryKeyColumn>, GencrudError> {
            self.calls.push("primary_keys");
            Ok(vec![PrimaryKeyColumn {
                table_name: "vlan".to_string(),
                column_name: "id".to_string(),
                key_position: 1,
            }])
        }

        fn foreign_keys(&mut self) -> Result<Vec<ForeignKey>, GencrudError> {
            self.calls.push("foreign_keys");
            Ok(vec![])
        }

        fn enums(&mut self) -> Result<Vec<EnumType>, GencrudError> {
            self.calls.push("enums");
            Err(GencrudError::Introspection {
                schema: "public".to_string(),
                message: "permission denied for pg_enum".to_string(),
            })
        }
    }

    #[test]
    fn test_table_filter_include_and_exclude() {
        let filter = TableFilter {
            include: Some(vec!["vlan".to_string(), "port".to_string()]),
            exclude: Some(vec!["port".to_string()]),
        };
        assert!(filter.should_include("vlan"));
        assert!(!filter.should_include("port"));
        assert!(!filter.should_include("device"));
        assert!(TableFilter::default().should_include("device"));
    }

    #[test]
    fn test_snapshot_stops_at_first_failure() {
        let mut catalog = FixedCatalog { calls: vec![] };
        let result = catalog.snapshot("public");

        assert!(matches!(result, Err(GencrudError::Introspection { .. })));
        assert_eq!(
            catalog.calls,
            vec!["primary_keys", "columns", "foreign_keys", "enums"]
        );
    }
}
