use postgres::Client;
use tracing::{debug, error, trace};

use super::{CatalogSource, ColumnDescriptor};
use crate::prelude::GencrudError;
use crate::schema::{EnumType, ForeignKey, PrimaryKeyColumn};

/// PostgreSQL catalog reader
pub struct PostgresCatalog<'a> {
    client: &'a mut Client,
}

impl<'a> PostgresCatalog<'a> {
    pub fn new(client: &'a mut Client) -> Self {
        Self { client }
    }
}

impl CatalogSource for PostgresCatalog<'_> {
    fn columns(&mut self, schema_name: &str) -> Result<Vec<ColumnDescriptor>, GencrudError> {
        trace!(schema = ?schema_name, "Querying columns");

        let sql = r#"
            SELECT
                c.table_name::text AS table_name,
                c.column_name::text AS column_name,
                c.ordinal_position::int4 AS ordinal_position,
                c.column_default::text AS column_default,
                (c.is_nullable = 'YES') AS is_nullable,
                c.data_type::text AS data_type,
                c.udt_schema::text AS udt_schema,
                c.udt_name::text AS udt_name,
                (c.is_identity = 'YES') AS is_identity,
                (c.is_generated = 'ALWAYS') AS is_generated
            FROM information_schema.columns c
            JOIN information_schema.tables t
                ON t.table_schema = c.table_schema
                AND t.table_name = c.table_name
            WHERE c.table_schema = $1
                AND t.table_type = 'BASE TABLE'
            ORDER BY c.table_name, c.ordinal_position
        "#;

        let rows = self.client.query(sql, &[&schema_name]).map_err(|e| {
            error!(schema = ?schema_name, error = ?e, "Failed to query columns");
            GencrudError::Introspection {
                schema: schema_name.to_string(),
                message: format!("Failed to query columns: {}", e),
            }
        })?;

        let columns: Vec<ColumnDescriptor> = rows
            .iter()
            .map(|row| ColumnDescriptor {
                table_name: row.get("table_name"),
                column_name: row.get("column_name"),
                ordinal_position: row.get("ordinal_position"),
                column_default: row.get("column_default"),
                is_nullable: row.get("is_nullable"),
                data_type: row.get("data_type"),
                udt_schema: row.get("udt_schema"),
                udt_name: row.get("udt_name"),
                is_identity: row.get("is_identity"),
                is_generated: row.get("is_generated"),
            })
            .collect();

        debug!(count = ?columns.len(), "Found columns");
        Ok(columns)
    }

    fn primary_keys(&mut self, schema_name: &str) -> Result<Vec<PrimaryKeyColumn>, GencrudError> {
        trace!(schema = ?schema_name, "Querying primary keys");

        let sql = r#"
            SELECT
                tc.table_name::text AS table_name,
                kcu.column_name::text AS column_name,
                kcu.ordinal_position::int4 AS key_position
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON kcu.constraint_catalog = tc.constraint_catalog
                AND kcu.constraint_schema = tc.constraint_schema
                AND kcu.constraint_name = tc.constraint_name
                AND kcu.table_name = tc.table_name
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_schema = $1
            ORDER BY tc.table_name, kcu.ordinal_position
        "#;

        let rows = self.client.query(sql, &[&schema_name]).map_err(|e| {
            error!(schema = ?schema_name, error = ?e, "Failed to query primary keys");
            GencrudError::Introspection {
                schema: schema_name.to_string(),
                message: format!("Failed to query primary keys: {}", e),
            }
        })?;

        let keys: Vec<PrimaryKeyColumn> = rows
            .iter()
            .map(|row| PrimaryKeyColumn {
                table_name: row.get("table_name"),
                column_name: row.get("column_name"),
                key_position: row.get("key_position"),
            })
            .collect();

        debug!(count = ?keys.len(), "Found primary key columns");
        Ok(keys)
    }

    fn foreign_keys(&mut self) -> Result<Vec<ForeignKey>, GencrudError> {
        trace!("Querying foreign keys");

        // Only the first column of each constraint is reported
        let sql = r#"
            SELECT
                o.conname::text AS constraint_name,
                sn.nspname::text AS source_schema,
                m.relname::text AS source_table,
                (SELECT a.attname::text FROM pg_attribute a
                    WHERE a.attrelid = m.oid AND a.attnum = o.conkey[1] AND NOT a.attisdropped)
                    AS source_column,
                tn.nspname::text AS target_schema,
                f.relname::text AS target_table,
                (SELECT a.attname::text FROM pg_attribute a
                    WHERE a.attrelid = f.oid AND a.attnum = o.confkey[1] AND NOT a.attisdropped)
                    AS target_column
            FROM pg_constraint o
            JOIN pg_class m ON m.oid = o.conrelid
            JOIN pg_namespace sn ON sn.oid = m.relnamespace
            JOIN pg_class f ON f.oid = o.confrelid
            JOIN pg_namespace tn ON tn.oid = f.relnamespace
            WHERE o.contype = 'f'
                AND m.relkind = 'r'
            ORDER BY sn.nspname, m.relname, o.conname
        "#;

        let rows = self.client.query(sql, &[]).map_err(|e| {
            error!(error = ?e, "Failed to query foreign keys");
            GencrudError::Introspection {
                schema: "*".to_string(),
                message: format!("Failed to query foreign keys: {}", e),
            }
        })?;

        let mut foreign_keys = Vec::with_capacity(rows.len());
        for row in rows {
            let constraint_name: String = row.get("constraint_name");
            let source_column: Option<String> = row.get("source_column");
            let target_column: Option<String> = row.get("target_column");

            let (Some(source_column), Some(target_column)) = (source_column, target_column) else {
                trace!(constraint = ?constraint_name, "Skipping foreign key on dropped column");
                continue;
            };

            foreign_keys.push(ForeignKey {
                constraint_name,
                source_schema: row.get("source_schema"),
                source_table: row.get("source_table"),
                source_column,
                target_schema: row.get("target_schema"),
                target_table: row.get("target_table"),
                target_column,
            });
        }

        debug!(count = ?foreign_keys.len(), "Found foreign keys");
        Ok(foreign_keys)
    }

    fn enums(&mut self) -> Result<Vec<EnumType>, GencrudError> {
        trace!("Querying enum types");

        let sql = r#"
            SELECT
                n.nspname::text AS enum_schema,
                t.typname::text AS enum_name,
                e.enumlabel::text AS enum_value
            FROM pg_type t
            JOIN pg_namespace n ON n.oid = t.typnamespace
            JOIN pg_enum e ON e.enumtypid = t.oid
            ORDER BY n.nspname, t.typname, e.enumsortorder
        "#;

        let rows = self.client.query(sql, &[]).map_err(|e| {
            error!(error = ?e, "Failed to query enum types");
            GencrudError::Introspection {
                schema: "*".to_string(),
                message: format!("Failed to query enums: {}", e),
            }
        })?;

        // Group enum values by schema and enum name
        let mut enums: Vec<EnumType> = Vec::new();
        for row in rows {
            let enum_schema: String = row.get("enum_schema");
            let enum_name: String = row.get("enum_name");
            let enum_value: String = row.get("enum_value");

            if let Some(existing) = enums.iter_mut().find(|e| e.is(&enum_schema, &enum_name)) {
                existing.values.push(enum_value);
            } else {
                trace!(schema = ?enum_schema, enum_name = ?enum_name, "Found new enum type");
                enums.push(EnumType {
                    schema: enum_schema,
                    name: enum_name,
                    values: vec![enum_value],
                });
            }
        }

        for e in &enums {
            trace!(schema = ?e.schema, name = ?e.name, values = ?e.values, "Enum type");
        }

        Ok(enums)
    }
}
