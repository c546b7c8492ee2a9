use thiserror::Error;

/// gencrud errors
#[derive(Error, Debug)]
pub enum GencrudError {
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    #[error("Failed to introspect schema '{schema}': {message}")]
    Introspection { schema: String, message: String },

    #[error("Table '{table}' has no primary key")]
    MissingPrimaryKey { table: String },

    #[error("Table '{table}' has a composite primary key ({}), which is not supported", .columns.join(", "))]
    CompositePrimaryKey { table: String, columns: Vec<String> },

    #[error("Table '{table}' has no 'deleted_at' column required for soft delete")]
    MissingSoftDeleteColumn { table: String },

    #[error("Column '{table}.{column}' has unrecognized type '{db_type}'")]
    UnknownColumnType {
        table: String,
        column: String,
        db_type: String,
    },

    #[error("Code generation failed for table '{table}': {message}")]
    CodeGen { table: String, message: String },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_key_message_lists_columns() {
        let err = GencrudError::CompositePrimaryKey {
            table: "port_map".to_string(),
            columns: vec!["device_id".to_string(), "port".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Table 'port_map' has a composite primary key (device_id, port), which is not supported"
        );
    }
}
