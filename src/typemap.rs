//! Type mapping from PostgreSQL catalog types to Python annotations.
//!
//! The generated code targets `asyncpg`, so the annotations name the Python
//! types that driver decodes each column into.

use crate::schema::{to_pascal_case, EnumType};

/// Result of mapping a catalog type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedType {
    /// A Python type the lookup table knows
    Known(String),
    /// Quoted literal of the raw catalog name; generated code using it is
    /// unlikely to work and callers should warn
    Fallback(String),
}

impl MappedType {
    pub fn annotation(&self) -> &str {
        match self {
            MappedType::Known(ty) | MappedType::Fallback(ty) => ty,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, MappedType::Fallback(_))
    }

    pub fn into_annotation(self) -> String {
        match self {
            MappedType::Known(ty) | MappedType::Fallback(ty) => ty,
        }
    }
}

/// Map a column's catalog type to its Python annotation
///
/// `data_type` is the `information_schema` name (`character varying`,
/// `USER-DEFINED`, `ARRAY`, ...); `udt_schema` and `udt_name` name the
/// underlying type and are used to resolve enums and array elements.
pub fn map_column_type(
    data_type: &str,
    udt_schema: &str,
    udt_name: &str,
    enums: &[EnumType],
) -> MappedType {
    let trimmed = data_type.trim();

    if trimmed.eq_ignore_ascii_case("USER-DEFINED") {
        if let Some(enum_type) = find_enum(enums, udt_schema, udt_name) {
            return MappedType::Known(to_pascal_case(&enum_type.name));
        }
        return fallback(udt_name);
    }

    if trimmed.eq_ignore_ascii_case("ARRAY") {
        let element = array_element(udt_name);
        return match python_type(element) {
            Some(inner) => MappedType::Known(format!("list[{}]", inner)),
            None => match find_enum(enums, udt_schema, element) {
                Some(enum_type) => {
                    MappedType::Known(format!("list[{}]", to_pascal_case(&enum_type.name)))
                }
                None => MappedType::Known("list".to_string()),
            },
        };
    }

    match python_type(trimmed) {
        Some(ty) => MappedType::Known(ty.to_string()),
        None => fallback(trimmed),
    }
}

/// Element type name of an array `udt_name` (`_int4` -> `int4`)
pub fn array_element(udt_name: &str) -> &str {
    udt_name.strip_prefix('_').unwrap_or(udt_name)
}

/// The enum a column refers to, matched by schema and name
pub fn find_enum<'a>(enums: &'a [EnumType], schema: &str, name: &str) -> Option<&'a EnumType> {
    enums.iter().find(|e| e.is(schema, name))
}

/// Static lookup of a catalog type name
///
/// Accepts both the `information_schema` spelling and the internal short
/// names (`int4`, `timestamptz`, ...) found in `udt_name`.
pub fn python_type(type_name: &str) -> Option<&'static str> {
    let lower = type_name.trim().to_lowercase();
    let ty = match lower.as_str() {
        // Boolean
        "boolean" | "bool" => "bool",

        // Integer types
        "smallint" | "integer" | "bigint" | "int2" | "int4" | "int8" | "int" | "smallserial"
        | "serial" | "bigserial" | "oid" => "int",

        // Floating point
        "real" | "double precision" | "float4" | "float8" | "float" => "float",

        // Decimal/numeric
        "numeric" | "decimal" => "Decimal",
        "money" => "str",

        // String types
        "text" | "character varying" | "varchar" | "character" | "char" | "bpchar" | "name"
        | "citext" | "xml" => "str",

        // Binary
        "bytea" => "bytes",

        // JSON, returned as text by asyncpg unless a codec is installed
        "json" | "jsonb" => "str",

        "uuid" => "uuid.UUID",

        // Date/time types
        "date" => "datetime.date",
        "time" | "time without time zone" | "time with time zone" | "timetz" => {
            "datetime.time"
        }
        "timestamp" | "timestamp without time zone" | "timestamp with time zone"
        | "timestamptz" => "datetime.datetime",
        "interval" => "datetime.timedelta",

        // Network types
        "inet" => "ipaddress.IPv4Interface | ipaddress.IPv6Interface",
        "cidr" => "ipaddress.IPv4Network | ipaddress.IPv6Network",
        "macaddr" | "macaddr8" => "str",

        // Bit strings
        "bit" | "bit varying" | "varbit" => "asyncpg.BitString",

        // Range types
        "int4range" | "int8range" | "numrange" | "tsrange" | "tstzrange" | "daterange"
        | "anyrange" => "asyncpg.Range",

        // Geometric types
        "point" => "asyncpg.Point",
        "line" => "asyncpg.Line",
        "lseg" => "asyncpg.LineSegment",
        "box" => "asyncpg.Box",
        "path" => "asyncpg.Path",
        "polygon" => "asyncpg.Polygon",
        "circle" => "asyncpg.Circle",

        // Pseudo types
        "anyarray" => "list",
        "anyenum" => "str",
        "record" => "asyncpg.Record",

        _ => return None,
    };
    Some(ty)
}

/// Quote a raw type name so it is at least a syntactically valid annotation
fn fallback(raw: &str) -> MappedType {
    let escaped = raw.replace('\\', "\\\\").replace('\'', "\\'");
    MappedType::Fallback(format!("'{}'", escaped))
}
