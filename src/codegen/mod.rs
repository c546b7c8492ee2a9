//! Code generation
//!
//! This module provides functionality for generating typed data access code
//! from the schema model. Output is rendered completely in memory and only
//! then handed to the emitter, so a failure on any table leaves no file
//! behind.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::emit::write_artifact;
use crate::prelude::{GencrudError, Schema};

pub mod python;

pub use python::PythonGenerator;

/// Configuration for code generation
#[derive(Debug, Clone)]
pub struct CodeGenConfig {
    /// Output file path
    pub output_path: PathBuf,
    /// Timestamp written into the generated header
    pub generated_at: DateTime<Utc>,
}

impl CodeGenConfig {
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            output_path,
            generated_at: Utc::now(),
        }
    }

    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }
}

/// Trait for language-specific code generators
pub trait CodeGenerator {
    /// Render the whole artifact for the given schema
    fn render(&self, schema: &Schema, config: &CodeGenConfig) -> Result<String, GencrudError>;

    /// Render and then write the artifact in one go
    fn generate(&self, schema: &Schema, config: &CodeGenConfig) -> Result<PathBuf, GencrudError> {
        let code = self.render(schema, config)?;
        let path = write_artifact(&config.output_path, &code)?;
        info!(path = ?path, tables = schema.tables.len(), "Generated code written");
        Ok(path)
    }
}
