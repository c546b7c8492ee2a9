//! # gencrud
//!
//! Generate typed CRUD data access code from a PostgreSQL catalog
//!
//! This crate provides a CLI tool and library for introspecting database
//! catalogs, building an in-memory schema model and rendering one
//! create/read/update/delete class per table.

pub mod builder;
pub mod codegen;
pub mod config;
pub mod emit;
pub mod error;
pub mod introspect;
pub mod schema;
pub mod sql;
pub mod typemap;

pub mod prelude {
    pub use crate::builder::{build_schema, BuildOptions, BuildReport, SoftDeletePolicy};
    pub use crate::codegen::{CodeGenConfig, CodeGenerator, PythonGenerator};
    pub use crate::config::{DbConfig, DbOverrides};
    pub use crate::error::GencrudError;
    pub use crate::introspect::{CatalogSnapshot, CatalogSource, ColumnDescriptor, TableFilter};
    pub use crate::schema::{Column, EnumType, ForeignKey, PrimaryKeyIndex, Schema, Table};
    pub use crate::sql::{Assignments, CrudStatements, Patch};
}

#[cfg(feature = "postgres")]
pub use introspect::PostgresCatalog;
