use chrono::{TimeZone, Utc};

use gencrud::builder::{build_schema, BuildOptions};
use gencrud::codegen::{CodeGenConfig, CodeGenerator, PythonGenerator};
use gencrud::introspect::{CatalogSnapshot, ColumnDescriptor};
use gencrud::schema::{PrimaryKeyColumn, PrimaryKeyIndex};
use gencrud::sql::CrudStatements;

fn column(
    table: &str,
    name: &str,
    ordinal: i32,
    default: Option<&str>,
    nullable: bool,
    data_type: &str,
    udt_name: &str,
) -> ColumnDescriptor {
    ColumnDescriptor {
        table_name: table.to_string(),
        column_name: name.to_string(),
        ordinal_position: ordinal,
        column_default: default.map(str::to_string),
        is_nullable: nullable,
        data_type: data_type.to_string(),
        udt_schema: "pg_catalog".to_string(),
        udt_name: udt_name.to_string(),
        is_identity: false,
        is_generated: false,
    }
}

/// vlan(id PK default, label, vid, device_id, deleted_at nullable default NULL)
fn vlan_snapshot() -> CatalogSnapshot {
    CatalogSnapshot {
        schema_name: "public".to_string(),
        columns: vec![
            column("vlan", "id", 1, Some("gen_random_uuid()"), false, "uuid", "uuid"),
            column("vlan", "label", 2, None, false, "text", "text"),
            column("vlan", "vid", 3, None, false, "integer", "int4"),
            column("vlan", "device_id", 4, None, false, "uuid", "uuid"),
            column(
                "vlan",
                "deleted_at",
                5,
                Some("NULL::timestamp without time zone"),
                true,
                "timestamp without time zone",
                "timestamp",
            ),
            column("alembic_version", "version_num", 1, None, false, "character varying", "varchar"),
        ],
        primary_keys: PrimaryKeyIndex::from_columns(vec![PrimaryKeyColumn {
            table_name: "vlan".to_string(),
            column_name: "id".to_string(),
            key_position: 1,
        }]),
        foreign_keys: vec![],
        enums: vec![],
    }
}

#[test]
fn test_vlan_create_inserts_exactly_caller_columns() {
    let (schema, report) = build_schema(&vlan_snapshot(), &BuildOptions::default()).unwrap();
    let vlan = schema.table("vlan").unwrap();

    assert!(report.without_soft_delete.is_empty());
    assert_eq!(
        CrudStatements::new(&schema.name, vlan).insert(),
        "INSERT INTO public.vlan (label, vid, device_id) VALUES ($1, $2, $3) RETURNING *"
    );

    let code = PythonGenerator::new()
        .render(
            &schema,
            &CodeGenConfig::new("generated.py".into())
                .with_generated_at(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
        )
        .unwrap();

    // id and deleted_at come back from RETURNING *, never from the caller
    assert!(code.contains(
        "async def create(cls, pool: Pool, *, label: str, vid: int, device_id: uuid.UUID) -> vlan:"
    ));
    assert!(code.contains("return cls(**_r)"));
    assert!(!code.contains("class alembic_version"));
    assert!(code.contains("async def delete(self, pool: Pool) -> None:"));
}

#[test]
fn test_generate_writes_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("generated.py");
    let (schema, _) = build_schema(&vlan_snapshot(), &BuildOptions::default()).unwrap();

    let written = PythonGenerator::new()
        .generate(&schema, &CodeGenConfig::new(path.clone()))
        .unwrap();

    assert_eq!(written, path);
    let code = std::fs::read_to_string(&path).unwrap();
    assert!(code.contains("class vlan(CRUDTable):"));
}

#[test]
fn test_failed_table_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("generated.py");
    let (mut schema, _) = build_schema(&vlan_snapshot(), &BuildOptions::default()).unwrap();

    let mut broken = schema.tables[0].clone();
    broken.name = "class".to_string();
    schema.tables.push(broken);

    let result = PythonGenerator::new().generate(&schema, &CodeGenConfig::new(path.clone()));

    assert!(result.is_err());
    assert!(!path.exists());
}
