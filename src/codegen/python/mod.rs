//! Python code generator
//!
//! Generates one module of `asyncpg` CRUD classes, one class per table.
//! Every operation takes the pool as its first argument; the module holds
//! no connection state of its own.

use std::collections::{HashMap, HashSet};

use minijinja::{context, Environment};
use tracing::{debug, info};

use crate::codegen::{CodeGenConfig, CodeGenerator};
use crate::error::GencrudError;
use crate::schema::{to_pascal_case, Column, EnumType, Schema, Table};
use crate::sql::{quote_ident, CrudStatements};

/// Python keywords, which can never name a class or an argument
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Argument names the generated methods already use
const RESERVED_ARGUMENTS: &[&str] = &["self", "cls", "pool", "where_clause", "where_params"];

/// Attributes every generated instance inherits; a column must not shadow them
const RESERVED_ATTRIBUTES: &[&str] = &[
    "json", "from_json", "create", "read", "read_many", "update", "update_many", "delete",
    "delete_hard",
];

/// Module-level names bound by the header, plus the builtins generated code
/// calls at runtime
const MODULE_NAMES: &[&str] = &[
    "annotations", "datetime", "enum", "ipaddress", "json", "uuid", "Decimal", "Any",
    "Iterable", "List", "Sequence", "asyncpg", "Pool", "Unchanged", "UNCHANGED", "NotFound",
    "_assignments", "CRUDTable", "str", "isinstance", "len", "setattr", "LookupError",
];

/// Python code generator
pub struct PythonGenerator {
    env: Environment<'static>,
}

impl PythonGenerator {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_filter("pystr", python_string_literal);

        // Register templates
        env.add_template("header", include_str!("templates/header.py.jinja"))
            .expect("Failed to load header template");
        env.add_template("enum", include_str!("templates/enum.py.jinja"))
            .expect("Failed to load enum template");
        env.add_template("table", include_str!("templates/table.py.jinja"))
            .expect("Failed to load table template");

        Self { env }
    }
}

impl Default for PythonGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator for PythonGenerator {
    fn render(&self, schema: &Schema, config: &CodeGenConfig) -> Result<String, GencrudError> {
        info!(
            schema = ?schema.name,
            tables = schema.tables.len(),
            enums = schema.enums.len(),
            "Generating Python code"
        );

        check_module_names(schema)?;

        let mut sections = vec![self.render_header(schema, config)?];

        if !schema.enums.is_empty() {
            sections.push(self.render_enums(&schema.enums)?);
        }

        for table in &schema.tables {
            let code = self.render_table(table, schema)?;
            debug!(table = ?table.name, bytes = code.len(), "Rendered table class");
            sections.push(code);
        }

        let mut output = sections
            .iter()
            .map(|section| section.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n\n");
        output.push('\n');
        Ok(output)
    }
}

impl PythonGenerator {
    fn render_header(&self, schema: &Schema, config: &CodeGenConfig) -> Result<String, GencrudError> {
        let ctx = context! {
            version => env!("CARGO_PKG_VERSION"),
            generated_at => config.generated_at.format("%a %b %e %H:%M:%S %Y UTC").to_string(),
            schema_name => &schema.name,
        };
        self.render_template("header", "header", ctx)
    }

    /// Render one enum class per catalog enum
    fn render_enums(&self, enums: &[EnumType]) -> Result<String, GencrudError> {
        let ctx = context! {
            enums => enums.iter().map(|e| {
                context! {
                    name => to_pascal_case(&e.name),
                    db_name => &e.name,
                    values => enum_members(&e.values)
                        .into_iter()
                        .map(|(member, label)| context! { member => member, label => label })
                        .collect::<Vec<_>>(),
                }
            }).collect::<Vec<_>>(),
        };
        self.render_template("enum", "enums", ctx)
    }

    fn render_table(&self, table: &Table, schema: &Schema) -> Result<String, GencrudError> {
        let ctx = build_table_context(table, schema)?;
        self.render_template("table", &table.name, ctx)
    }

    fn render_template(
        &self,
        name: &str,
        table: &str,
        ctx: minijinja::Value,
    ) -> Result<String, GencrudError> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| GencrudError::CodeGen {
                table: table.to_string(),
                message: format!("Template error: {}", e),
            })?;

        template.render(ctx).map_err(|e| GencrudError::CodeGen {
            table: table.to_string(),
            message: format!("Render error: {}", e),
        })
    }
}

/// Build template context for a table
fn build_table_context(table: &Table, schema: &Schema) -> Result<minijinja::Value, GencrudError> {
    check_identifier(table, &table.name, false)?;
    for col in &table.columns {
        check_identifier(table, &col.name, true)?;
    }

    let pk = table
        .primary_key_column()
        .ok_or_else(|| GencrudError::CodeGen {
            table: table.name.clone(),
            message: format!("primary key column '{}' is not in the table", table.primary_key),
        })?;

    let statements = CrudStatements::new(&schema.name, table);
    let writable = table.writable_columns();

    let soft_delete = table.soft_delete_column().map(|col| {
        let now = if col.is_timezone_aware() {
            "datetime.datetime.now(datetime.timezone.utc)"
        } else {
            "datetime.datetime.now(datetime.timezone.utc).replace(tzinfo=None)"
        };
        context! {
            sql => statements.soft_delete(),
            now => now,
        }
    });

    Ok(context! {
        table_name => &table.name,
        qualified_table => statements.qualified_table(),
        pk => &pk.name,
        pk_type => &pk.target_type,
        columns => table.columns.iter().map(|c| context! { name => &c.name }).collect::<Vec<_>>(),
        foreign_keys => table.foreign_keys.iter().map(|fk| context! {
            constraint_name => &fk.constraint_name,
            source_column => &fk.source_column,
            target_table => &fk.target_table,
            target_column => &fk.target_column,
        }).collect::<Vec<_>>(),

        // __init__
        init_params => comma_sep(table.columns.iter(), init_param),

        // create
        create_params => comma_sep(writable.iter().copied(), init_param),
        create_args => writable.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        insert_sql => statements.insert(),

        // read / read_many
        select_by_key_sql => statements.select_by_key(),
        select_many_sql => statements.select_many(""),

        // update / update_many
        update_params => comma_sep(writable.iter().copied(), update_param),
        update_fields => writable.iter().map(|c| context! {
            column => quote_ident(&c.name).into_owned(),
            name => &c.name,
        }).collect::<Vec<_>>(),
        update_sql => format!("UPDATE {} SET ", statements.qualified_table()),
        key_where => format!(" WHERE {}", statements.key_predicate()),

        // delete / delete_hard
        soft_delete => soft_delete,
        hard_delete_sql => statements.hard_delete(),
    })
}

fn comma_sep<'a>(columns: impl Iterator<Item = &'a Column>, render: fn(&Column) -> String) -> String {
    columns.map(render).collect::<Vec<_>>().join(", ")
}

/// `name: type`, or `name: type | None = None` for nullable columns
fn init_param(col: &Column) -> String {
    if col.nullable {
        format!("{}: {} | None = None", col.name, col.target_type)
    } else {
        format!("{}: {}", col.name, col.target_type)
    }
}

/// `name: type | Unchanged = UNCHANGED`
fn update_param(col: &Column) -> String {
    if col.nullable {
        format!("{}: {} | None | Unchanged = UNCHANGED", col.name, col.target_type)
    } else {
        format!("{}: {} | Unchanged = UNCHANGED", col.name, col.target_type)
    }
}

/// Every class the module declares must be a fresh, valid name
///
/// Enum classes and table classes share the module namespace with each
/// other and with the header.
fn check_module_names(schema: &Schema) -> Result<(), GencrudError> {
    let enum_classes = schema
        .enums
        .iter()
        .map(|e| (to_pascal_case(&e.name), "enum", &e.name));
    let table_classes = schema
        .tables
        .iter()
        .map(|t| (t.name.clone(), "table", &t.name));

    let mut owners: HashMap<String, String> = HashMap::new();
    for (class, kind, owner) in enum_classes.chain(table_classes) {
        let problem = if let Some(problem) = identifier_problem(&class) {
            Some(problem.to_string())
        } else if MODULE_NAMES.contains(&class.as_str()) {
            Some("shadows a name the generated module relies on".to_string())
        } else {
            owners
                .get(&class)
                .map(|other| format!("is already declared for {}", other))
        };

        if let Some(problem) = problem {
            return Err(GencrudError::CodeGen {
                table: owner.clone(),
                message: format!("{} class '{}' {}", kind, class, problem),
            });
        }
        owners.insert(class, format!("{} '{}'", kind, owner));
    }

    debug!(classes = owners.len(), "Module names checked");
    Ok(())
}

fn identifier_problem(name: &str) -> Option<&'static str> {
    let mut chars = name.chars();
    let well_formed = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if !well_formed {
        Some("is not a valid Python identifier")
    } else if PYTHON_KEYWORDS.contains(&name) {
        Some("is a Python keyword")
    } else {
        None
    }
}

/// Reject names the generated module could not declare
fn check_identifier(table: &Table, name: &str, is_column: bool) -> Result<(), GencrudError> {
    let problem = identifier_problem(name).or(if !is_column {
        None
    } else if RESERVED_ARGUMENTS.contains(&name) {
        Some("clashes with a generated argument")
    } else if RESERVED_ATTRIBUTES.contains(&name) {
        Some("clashes with a generated method")
    } else {
        None
    });

    match problem {
        Some(problem) => Err(GencrudError::CodeGen {
            table: table.name.clone(),
            message: format!("'{}' {}", name, problem),
        }),
        None => Ok(()),
    }
}

/// Member name and label for every enum label, member names made unique
fn enum_members(labels: &[String]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .map(|label| {
            let mut member: String = label
                .chars()
                .map(|c| if c.is_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect();
            if member.is_empty() || member.starts_with(|c: char| c.is_ascii_digit()) {
                member.insert(0, '_');
            }
            // enum reserves `_sunder_` and `__dunder__` names
            if member.len() > 1 && member.starts_with('_') && member.ends_with('_') {
                member.insert(0, 'V');
            }
            let base = member.clone();
            let mut n = 2;
            while !seen.insert(member.clone()) {
                member = format!("{}_{}", base, n);
                n += 1;
            }
            (member, label.clone())
        })
        .collect()
}

/// Render a value as a single-quoted Python string literal
fn python_string_literal(value: String) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
