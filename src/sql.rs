//! SQL statement planning for the generated CRUD operations
//!
//! Every statement uses positional `$n` placeholders. The static shapes
//! (insert, select, delete) are fixed per table; update statements are
//! planned from a set of [`Patch`] values, skipping unchanged fields and
//! numbering the remaining ones contiguously in model column order.

use std::borrow::Cow;

use crate::schema::{Table, SOFT_DELETE_COLUMN};

/// First placeholder available to update fields; `$1` is the key
pub const UPDATE_FIRST_PLACEHOLDER: usize = 2;

/// First placeholder available to update-many fields
///
/// The caller's predicate already owns `$1..=$where_param_count`.
pub fn update_many_first_placeholder(where_param_count: usize) -> usize {
    1 + where_param_count
}

/// A field value for a partial update
///
/// `Unchanged` is distinct from every value, including a `Set(None)` that
/// writes NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unchanged,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unchanged
    }
}

impl<T> Patch<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Patch::Unchanged)
    }

    pub fn into_set(self) -> Option<T> {
        match self {
            Patch::Unchanged => None,
            Patch::Set(value) => Some(value),
        }
    }
}

impl<T> From<T> for Patch<T> {
    fn from(value: T) -> Self {
        Patch::Set(value)
    }
}

/// The `SET` list of an update and the values bound to it
#[derive(Debug, Clone, PartialEq)]
pub struct Assignments<'a, T> {
    pub columns: Vec<&'a str>,
    pub values: Vec<T>,
    first_placeholder: usize,
}

impl<'a, T> Assignments<'a, T> {
    /// Drop unchanged fields and number the rest from `first_placeholder`
    pub fn plan(
        fields: impl IntoIterator<Item = (&'a str, Patch<T>)>,
        first_placeholder: usize,
    ) -> Self {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (column, patch) in fields {
            if let Patch::Set(value) = patch {
                columns.push(column);
                values.push(value);
            }
        }
        Self {
            columns,
            values,
            first_placeholder,
        }
    }

    /// Nothing changed; no statement should be issued
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Placeholder numbers in assignment order
    pub fn placeholders(&self) -> Vec<usize> {
        (0..self.columns.len())
            .map(|i| self.first_placeholder + i)
            .collect()
    }

    /// `a = $2, b = $3`
    pub fn set_clause(&self) -> String {
        self.columns
            .iter()
            .zip(self.placeholders())
            .map(|(column, n)| format!("{} = ${}", quote_ident(column), n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The fixed statement shapes for one table
#[derive(Debug, Clone, Copy)]
pub struct CrudStatements<'a> {
    schema: &'a str,
    table: &'a Table,
}

impl<'a> CrudStatements<'a> {
    pub fn new(schema: &'a str, table: &'a Table) -> Self {
        Self { schema, table }
    }

    /// Schema-qualified, quoted table name
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", quote_ident(self.schema), quote_ident(&self.table.name))
    }

    /// `pk = $1`
    pub fn key_predicate(&self) -> String {
        format!("{} = $1", quote_ident(&self.table.primary_key))
    }

    /// Insert of every writable column, returning the stored row
    pub fn insert(&self) -> String {
        let columns = self.table.writable_columns();
        if columns.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES RETURNING *", self.qualified_table());
        }

        let names = columns
            .iter()
            .map(|col| quote_ident(&col.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|n| format!("${}", n))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            self.qualified_table(),
            names,
            placeholders
        )
    }

    pub fn select_by_key(&self) -> String {
        format!(
            "SELECT * FROM {} WHERE {}",
            self.qualified_table(),
            self.key_predicate()
        )
    }

    /// `SELECT *` with the caller's predicate appended verbatim
    ///
    /// The predicate is not sanitized in any way.
    pub fn select_many(&self, predicate: &str) -> String {
        let base = format!("SELECT * FROM {}", self.qualified_table());
        with_predicate(base, predicate)
    }

    /// Update addressed by key, or `None` when nothing changed
    pub fn update_by_key<T>(&self, assignments: &Assignments<'_, T>) -> Option<String> {
        if assignments.is_empty() {
            return None;
        }
        Some(format!(
            "UPDATE {} SET {} WHERE {}",
            self.qualified_table(),
            assignments.set_clause(),
            self.key_predicate()
        ))
    }

    /// Update of every row matching the caller's predicate, or `None` when
    /// nothing changed
    pub fn update_many<T>(&self, predicate: &str, assignments: &Assignments<'_, T>) -> Option<String> {
        if assignments.is_empty() {
            return None;
        }
        let base = format!(
            "UPDATE {} SET {}",
            self.qualified_table(),
            assignments.set_clause()
        );
        Some(with_predicate(base, predicate))
    }

    /// Stamp `deleted_at` with `$2` on the row keyed by `$1`
    pub fn soft_delete(&self) -> String {
        format!(
            "UPDATE {} SET {} = $2 WHERE {}",
            self.qualified_table(),
            quote_ident(SOFT_DELETE_COLUMN),
            self.key_predicate()
        )
    }

    pub fn hard_delete(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {}",
            self.qualified_table(),
            self.key_predicate()
        )
    }
}

fn with_predicate(base: String, predicate: &str) -> String {
    let predicate = predicate.trim();
    if predicate.is_empty() {
        base
    } else {
        format!("{} WHERE {}", base, predicate)
    }
}

/// Words that must be quoted when used as identifiers
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "localtime", "localtimestamp", "not",
    "null", "offset", "on", "only", "or", "order", "placing", "primary", "references",
    "returning", "select", "session_user", "some", "symmetric", "table", "then", "to",
    "trailing", "true", "union", "unique", "user", "using", "variadic", "when", "where",
    "window", "with",
];

/// Quote an identifier only when PostgreSQL would require it
pub fn quote_ident(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    let simple = match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => chars
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$'),
        _ => false,
    };

    if simple && !RESERVED.contains(&name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn column(name: &str, has_default: bool, nullable: bool) -> Column {
        Column {
            name: name.to_string(),
            db_type: "text".to_string(),
            target_type: "str".to_string(),
            has_default,
            nullable,
        }
    }

    fn vlan() -> Table {
        Table {
            name: "vlan".to_string(),
            columns: vec![
                column("id", true, false),
                column("label", false, false),
                column("vid", false, false),
                column("device_id", false, false),
                column("deleted_at", false, true),
            ],
            primary_key: "id".to_string(),
            foreign_keys: vec![],
        }
    }

    fn placeholder_numbers(sql: &str) -> Vec<usize> {
        sql.split('$')
            .skip(1)
            .map(|rest| {
                let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_insert_covers_non_default_columns_in_order() {
        let table = vlan();
        let sql = CrudStatements::new("netdb", &table).insert();

        assert_eq!(
            sql,
            "INSERT INTO netdb.vlan (label, vid, device_id, deleted_at) \
             VALUES ($1, $2, $3, $4) RETURNING *"
        );
        assert_eq!(placeholder_numbers(&sql), vec![1, 2, 3, 4]);
        assert_eq!(placeholder_numbers(&sql).len(), table.writable_columns().len());
    }

    #[test]
    fn test_insert_with_only_defaults() {
        let table = Table {
            name: "audit".to_string(),
            columns: vec![column("id", true, false), column("at", true, false)],
            primary_key: "id".to_string(),
            foreign_keys: vec![],
        };
        assert_eq!(
            CrudStatements::new("public", &table).insert(),
            "INSERT INTO public.audit DEFAULT VALUES RETURNING *"
        );
    }

    #[test]
    fn test_select_statements() {
        let table = vlan();
        let statements = CrudStatements::new("netdb", &table);

        assert_eq!(statements.select_by_key(), "SELECT * FROM netdb.vlan WHERE id = $1");
        assert_eq!(statements.select_many(""), "SELECT * FROM netdb.vlan");
        assert_eq!(
            statements.select_many("deleted_at is not null"),
            "SELECT * FROM netdb.vlan WHERE deleted_at is not null"
        );
    }

    #[test]
    fn test_update_skips_unchanged_and_starts_at_two() {
        let table = vlan();
        let statements = CrudStatements::new("netdb", &table);
        let fields = vec![
            ("label", Patch::Unchanged),
            ("vid", Patch::Set(Some(20))),
            ("device_id", Patch::Unchanged),
            ("deleted_at", Patch::Set(None)),
        ];

        let assignments = Assignments::plan(fields, UPDATE_FIRST_PLACEHOLDER);

        assert_eq!(assignments.columns, vec!["vid", "deleted_at"]);
        assert_eq!(assignments.values, vec![Some(20), None]);
        assert_eq!(assignments.placeholders(), vec![2, 3]);
        assert_eq!(
            statements.update_by_key(&assignments).unwrap(),
            "UPDATE netdb.vlan SET vid = $2, deleted_at = $3 WHERE id = $1"
        );
    }

    #[test]
    fn test_update_with_nothing_changed_issues_no_sql() {
        let table = vlan();
        let statements = CrudStatements::new("netdb", &table);
        let fields: Vec<(&str, Patch<i32>)> = vec![("label", Patch::Unchanged), ("vid", Patch::Unchanged)];

        let assignments = Assignments::plan(fields, UPDATE_FIRST_PLACEHOLDER);

        assert!(assignments.is_empty());
        assert_eq!(statements.update_by_key(&assignments), None);
        assert_eq!(statements.update_many("vid = $1", &assignments), None);
    }

    #[test]
    fn test_update_many_numbers_after_where_params() {
        let table = vlan();
        let statements = CrudStatements::new("netdb", &table);
        let where_params = ["dev-1", "10"];
        let fields = vec![("label", Patch::Set("core")), ("vid", Patch::Set("30"))];

        let first = update_many_first_placeholder(where_params.len());
        let assignments = Assignments::plan(fields, first);
        let sql = statements
            .update_many("device_id = $1 and vid = $2", &assignments)
            .unwrap();

        assert_eq!(
            sql,
            "UPDATE netdb.vlan SET label = $3, vid = $4 WHERE device_id = $1 and vid = $2"
        );
        assert!(assignments
            .placeholders()
            .iter()
            .all(|n| *n > where_params.len()));
    }

    #[test]
    fn test_placeholders_contiguous_for_every_subset() {
        let names = ["label", "vid", "device_id", "deleted_at"];
        for mask in 0u32..16 {
            let fields = names.iter().enumerate().map(|(i, name)| {
                let patch = if mask & (1 << i) != 0 {
                    Patch::Set(i)
                } else {
                    Patch::Unchanged
                };
                (*name, patch)
            });
            let assignments = Assignments::plan(fields, UPDATE_FIRST_PLACEHOLDER);

            let expected: Vec<usize> = (2..2 + mask.count_ones() as usize).collect();
            assert_eq!(assignments.placeholders(), expected);
            // relative model order survives
            assert!(assignments.values.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_delete_statements() {
        let table = vlan();
        let statements = CrudStatements::new("netdb", &table);

        assert_eq!(
            statements.soft_delete(),
            "UPDATE netdb.vlan SET deleted_at = $2 WHERE id = $1"
        );
        assert_eq!(statements.hard_delete(), "DELETE FROM netdb.vlan WHERE id = $1");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("vlan"), "vlan");
        assert_eq!(quote_ident("device_id"), "device_id");
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(quote_ident("Vlan"), "\"Vlan\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
        assert_eq!(quote_ident("1st"), "\"1st\"");
    }

    #[test]
    fn test_patch_conversions() {
        let patch: Patch<Option<i32>> = Some(3).into();
        assert_eq!(patch.clone().into_set(), Some(Some(3)));
        assert!(!patch.is_unchanged());
        assert!(Patch::<i32>::default().is_unchanged());
    }
}
