//! Catalog introspection.
//!
//! Reads the structure of a PostgreSQL database through `pg_catalog` into a
//! [`SchemaSnapshot`] that can be compared with another one. Objects that
//! belong to extensions are left out, and so are system schemas.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tokio_postgres::types::FromSql;
use tokio_postgres::{Client, Row};
use tracing::debug;
use tusker_postgres::{PgError, quote_qualified};

use crate::error::{MigrateResult, MigrationError};

/// A schema-qualified object name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    /// Schema (namespace) name.
    pub schema: String,
    /// Object name.
    pub name: String,
}

impl QualifiedName {
    /// Create a qualified name.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// The name quoted for use in SQL.
    pub fn quoted(&self) -> String {
        quote_qualified(&self.schema, &self.name)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// An installed extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    /// Extension name.
    pub name: String,
    /// Schema the extension's objects live in.
    pub schema: String,
    /// Installed version.
    pub version: String,
}

/// A standalone sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceInfo {
    /// Value type (`integer`, `bigint`, ...).
    pub data_type: String,
    /// Start value.
    pub start: i64,
    /// Increment.
    pub increment: i64,
    /// Minimum value.
    pub min_value: i64,
    /// Maximum value.
    pub max_value: i64,
    /// Cache size.
    pub cache: i64,
    /// Whether the sequence wraps around.
    pub cycle: bool,
    /// Column owning the sequence (`serial` columns).
    pub owned_by: Option<ColumnRef>,
}

impl SequenceInfo {
    /// Check whether the sequence options (everything but ownership) match.
    pub fn same_options(&self, other: &Self) -> bool {
        Self {
            owned_by: None,
            ..self.clone()
        } == Self {
            owned_by: None,
            ..other.clone()
        }
    }
}

/// A reference to a table column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnRef {
    /// Owning table.
    pub table: QualifiedName,
    /// Column name.
    pub column: String,
}

/// How an identity column generates values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// `GENERATED ALWAYS AS IDENTITY`
    Always,
    /// `GENERATED BY DEFAULT AS IDENTITY`
    ByDefault,
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Formatted type, including modifiers (`character varying(40)`).
    pub data_type: String,
    /// Whether the column is `NOT NULL`.
    pub not_null: bool,
    /// Default expression.
    pub default: Option<String>,
    /// Identity kind, if this is an identity column.
    pub identity: Option<Identity>,
    /// Expression of a stored generated column.
    pub generated: Option<String>,
}

/// Kind of a table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `PRIMARY KEY`
    PrimaryKey,
    /// `UNIQUE`
    Unique,
    /// `CHECK`
    Check,
    /// `FOREIGN KEY`
    ForeignKey,
    /// `EXCLUDE`
    Exclusion,
}

impl ConstraintKind {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "p" => Some(Self::PrimaryKey),
            "u" => Some(Self::Unique),
            "c" => Some(Self::Check),
            "f" => Some(Self::ForeignKey),
            "x" => Some(Self::Exclusion),
            _ => None,
        }
    }
}

/// A table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintInfo {
    /// Constraint kind.
    pub kind: ConstraintKind,
    /// Definition as printed by `pg_get_constraintdef`.
    pub definition: String,
}

/// A table with everything attached to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableInfo {
    /// Columns in attribute order.
    pub columns: Vec<ColumnInfo>,
    /// Constraints by name.
    pub constraints: BTreeMap<String, ConstraintInfo>,
    /// Indexes not backing a constraint, name to `CREATE INDEX` statement.
    pub indexes: BTreeMap<String, String>,
    /// Triggers, name to `CREATE TRIGGER` statement.
    pub triggers: BTreeMap<String, String>,
}

impl TableInfo {
    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A view or materialized view.
#[derive(Debug, Clone)]
pub struct ViewInfo {
    /// Whether the view is materialized.
    pub materialized: bool,
    /// The view query.
    pub definition: String,
    /// Creation order within its database.
    pub position: u32,
}

impl ViewInfo {
    /// Check whether two views are defined the same way.
    pub fn same_definition(&self, other: &Self) -> bool {
        self.materialized == other.materialized && self.definition == other.definition
    }
}

/// Whether a routine is a function or a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    /// `FUNCTION`
    Function,
    /// `PROCEDURE`
    Procedure,
}

impl RoutineKind {
    /// SQL keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Function => "FUNCTION",
            Self::Procedure => "PROCEDURE",
        }
    }
}

/// Identity of a routine: its name plus argument types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RoutineKey {
    /// Qualified routine name.
    pub name: QualifiedName,
    /// Identity arguments (`a integer, b text`).
    pub arguments: String,
}

/// A function or procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineInfo {
    /// Function or procedure.
    pub kind: RoutineKind,
    /// Result type; `None` for procedures.
    pub result: Option<String>,
    /// Full `CREATE OR REPLACE` statement.
    pub definition: String,
}

/// Object kinds that carry grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GrantTarget {
    /// Tables, views and materialized views.
    Table,
    /// Sequences.
    Sequence,
}

impl GrantTarget {
    /// SQL keyword used in `GRANT ... ON`.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::Sequence => "SEQUENCE",
        }
    }
}

/// One privilege held by one grantee on one object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Grant {
    /// Object the privilege is on.
    pub object: QualifiedName,
    /// Kind of object.
    pub target: GrantTarget,
    /// Role name, or `PUBLIC`.
    pub grantee: String,
    /// Privilege (`SELECT`, `INSERT`, ...).
    pub privilege: String,
}

/// Everything introspected from one database.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    /// Non-system schemas.
    pub schemas: BTreeSet<String>,
    /// Extensions by name.
    pub extensions: BTreeMap<String, ExtensionInfo>,
    /// Enum types and their labels in sort order.
    pub enums: BTreeMap<QualifiedName, Vec<String>>,
    /// Sequences not backing identity columns.
    pub sequences: BTreeMap<QualifiedName, SequenceInfo>,
    /// Ordinary tables.
    pub tables: BTreeMap<QualifiedName, TableInfo>,
    /// Views and materialized views.
    pub views: BTreeMap<QualifiedName, ViewInfo>,
    /// Tables and views each view reads from.
    pub view_dependencies: BTreeMap<QualifiedName, BTreeSet<QualifiedName>>,
    /// Functions and procedures.
    pub routines: BTreeMap<RoutineKey, RoutineInfo>,
    /// Relation privileges, when requested.
    pub grants: BTreeSet<Grant>,
}

/// Reads a [`SchemaSnapshot`] from a connected database.
pub struct CatalogIntrospector<'a> {
    client: &'a Client,
    schema: Option<&'a str>,
}

impl<'a> CatalogIntrospector<'a> {
    /// Introspect through `client`, limited to `schema` when one is given.
    pub fn new(client: &'a Client, schema: Option<&'a str>) -> Self {
        Self { client, schema }
    }

    /// Take a snapshot. Grants are only read when `privileges` is set.
    pub async fn snapshot(&self, privileges: bool) -> MigrateResult<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::default();

        for row in self.rows(postgres_queries::SCHEMAS).await? {
            snapshot.schemas.insert(get(&row, "name")?);
        }

        for row in self.rows(postgres_queries::EXTENSIONS).await? {
            let info = ExtensionInfo {
                name: get(&row, "name")?,
                schema: get(&row, "schema")?,
                version: get(&row, "version")?,
            };
            snapshot.extensions.insert(info.name.clone(), info);
        }

        for row in self.rows(postgres_queries::ENUMS).await? {
            snapshot
                .enums
                .insert(qualified(&row, "name")?, get(&row, "labels")?);
        }

        for row in self.rows(postgres_queries::SEQUENCES).await? {
            let owned_by = match get::<Option<String>>(&row, "owner_table")? {
                Some(table) => Some(ColumnRef {
                    table: QualifiedName::new(get::<String>(&row, "owner_schema")?, table),
                    column: get(&row, "owner_column")?,
                }),
                None => None,
            };
            let info = SequenceInfo {
                data_type: get(&row, "data_type")?,
                start: get(&row, "start")?,
                increment: get(&row, "increment")?,
                min_value: get(&row, "min_value")?,
                max_value: get(&row, "max_value")?,
                cache: get(&row, "cache")?,
                cycle: get(&row, "cycle")?,
                owned_by,
            };
            snapshot.sequences.insert(qualified(&row, "name")?, info);
        }

        for row in self.rows(postgres_queries::TABLES).await? {
            snapshot
                .tables
                .insert(qualified(&row, "name")?, TableInfo::default());
        }

        for row in self.rows(postgres_queries::COLUMNS).await? {
            let identity = match get::<Option<String>>(&row, "identity")?.as_deref() {
                Some("a") => Some(Identity::Always),
                Some("d") => Some(Identity::ByDefault),
                _ => None,
            };
            let column = ColumnInfo {
                name: get(&row, "name")?,
                data_type: get(&row, "data_type")?,
                not_null: get(&row, "not_null")?,
                default: get(&row, "default_expr")?,
                identity,
                generated: get(&row, "generated_expr")?,
            };
            if let Some(table) = snapshot.tables.get_mut(&qualified(&row, "table_name")?) {
                table.columns.push(column);
            }
        }

        for row in self.rows(postgres_queries::CONSTRAINTS).await? {
            let code: String = get(&row, "kind")?;
            let Some(kind) = ConstraintKind::from_code(&code) else {
                continue;
            };
            let constraint = ConstraintInfo {
                kind,
                definition: get(&row, "definition")?,
            };
            if let Some(table) = snapshot.tables.get_mut(&qualified(&row, "table_name")?) {
                table.constraints.insert(get(&row, "name")?, constraint);
            }
        }

        for row in self.rows(postgres_queries::INDEXES).await? {
            if let Some(table) = snapshot.tables.get_mut(&qualified(&row, "table_name")?) {
                table
                    .indexes
                    .insert(get(&row, "name")?, get(&row, "definition")?);
            }
        }

        for row in self.rows(postgres_queries::TRIGGERS).await? {
            if let Some(table) = snapshot.tables.get_mut(&qualified(&row, "table_name")?) {
                table
                    .triggers
                    .insert(get(&row, "name")?, get(&row, "definition")?);
            }
        }

        for row in self.rows(postgres_queries::VIEWS).await? {
            let kind: String = get(&row, "kind")?;
            let definition: String = get(&row, "definition")?;
            let view = ViewInfo {
                materialized: kind == "m",
                definition: definition.trim().trim_end_matches(';').to_string(),
                position: get(&row, "position")?,
            };
            snapshot.views.insert(qualified(&row, "name")?, view);
        }

        for row in self.rows(postgres_queries::VIEW_DEPENDENCIES).await? {
            let reads = QualifiedName::new(
                get::<String>(&row, "ref_schema")?,
                get::<String>(&row, "ref_name")?,
            );
            snapshot
                .view_dependencies
                .entry(qualified(&row, "name")?)
                .or_default()
                .insert(reads);
        }

        for row in self.rows(postgres_queries::ROUTINES).await? {
            let kind: String = get(&row, "kind")?;
            let key = RoutineKey {
                name: qualified(&row, "name")?,
                arguments: get(&row, "arguments")?,
            };
            let definition: String = get(&row, "definition")?;
            let routine = RoutineInfo {
                kind: if kind == "p" {
                    RoutineKind::Procedure
                } else {
                    RoutineKind::Function
                },
                result: get(&row, "result")?,
                definition: definition.trim().to_string(),
            };
            snapshot.routines.insert(key, routine);
        }

        if privileges {
            for row in self.rows(postgres_queries::PRIVILEGES).await? {
                let kind: String = get(&row, "kind")?;
                snapshot.grants.insert(Grant {
                    object: qualified(&row, "name")?,
                    target: if kind == "S" {
                        GrantTarget::Sequence
                    } else {
                        GrantTarget::Table
                    },
                    grantee: get(&row, "grantee")?,
                    privilege: get(&row, "privilege")?,
                });
            }
        }

        debug!(
            schemas = snapshot.schemas.len(),
            tables = snapshot.tables.len(),
            views = snapshot.views.len(),
            routines = snapshot.routines.len(),
            "Introspected database"
        );

        Ok(snapshot)
    }

    async fn rows(&self, query: &str) -> MigrateResult<Vec<Row>> {
        let rows = self
            .client
            .query(query, &[&self.schema])
            .await
            .map_err(PgError::from)?;
        Ok(rows)
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, column: &str) -> MigrateResult<T> {
    row.try_get(column)
        .map_err(|e| MigrationError::introspection(format!("column '{}': {}", column, e)))
}

fn qualified(row: &Row, name_column: &str) -> MigrateResult<QualifiedName> {
    Ok(QualifiedName::new(
        get::<String>(row, "schema")?,
        get::<String>(row, name_column)?,
    ))
}

/// Restricts `n` (a `pg_namespace` alias) to user schemas, and to `$1` when
/// it is not null.
macro_rules! namespace_filter {
    () => {
        r"n.nspname <> 'information_schema' AND n.nspname NOT LIKE 'pg\_%' AND ($1::text IS NULL OR n.nspname = $1)"
    };
}

/// Excludes objects that are members of an extension.
macro_rules! not_extension_member {
    ($catalog:literal, $oid:literal) => {
        concat!(
            "NOT EXISTS (SELECT 1 FROM pg_depend ext WHERE ext.classid = '",
            $catalog,
            "'::regclass AND ext.objid = ",
            $oid,
            " AND ext.deptype = 'e')"
        )
    };
}

/// SQL queries for PostgreSQL introspection. Each takes the schema filter
/// as `$1`.
pub mod postgres_queries {
    /// User schemas.
    pub const SCHEMAS: &str = concat!(
        "SELECT n.nspname AS name FROM pg_namespace n WHERE ",
        namespace_filter!(),
        " AND ",
        not_extension_member!("pg_namespace", "n.oid"),
        " ORDER BY 1"
    );

    /// Installed extensions other than plpgsql.
    pub const EXTENSIONS: &str = concat!(
        "SELECT e.extname AS name, n.nspname AS schema, e.extversion AS version ",
        "FROM pg_extension e JOIN pg_namespace n ON n.oid = e.extnamespace ",
        "WHERE e.extname <> 'plpgsql' AND ",
        namespace_filter!(),
        " ORDER BY 1"
    );

    /// Enum types with their labels.
    pub const ENUMS: &str = concat!(
        "SELECT n.nspname AS schema, t.typname AS name, ",
        "array_agg(e.enumlabel::text ORDER BY e.enumsortorder) AS labels ",
        "FROM pg_type t ",
        "JOIN pg_namespace n ON n.oid = t.typnamespace ",
        "JOIN pg_enum e ON e.enumtypid = t.oid ",
        "WHERE ",
        namespace_filter!(),
        " AND ",
        not_extension_member!("pg_type", "t.oid"),
        " GROUP BY n.nspname, t.typname ORDER BY 1, 2"
    );

    /// Sequences, skipping identity sequences, with their owning column.
    pub const SEQUENCES: &str = concat!(
        "SELECT n.nspname AS schema, c.relname AS name, ",
        "format_type(s.seqtypid, NULL) AS data_type, s.seqstart AS start, ",
        "s.seqincrement AS increment, s.seqmin AS min_value, s.seqmax AS max_value, ",
        "s.seqcache AS cache, s.seqcycle AS cycle, ",
        "owner_ns.nspname AS owner_schema, owner.relname AS owner_table, ",
        "owner_col.attname AS owner_column ",
        "FROM pg_sequence s ",
        "JOIN pg_class c ON c.oid = s.seqrelid ",
        "JOIN pg_namespace n ON n.oid = c.relnamespace ",
        "LEFT JOIN pg_depend own ON own.classid = 'pg_class'::regclass AND own.objid = c.oid ",
        "AND own.refclassid = 'pg_class'::regclass AND own.deptype = 'a' ",
        "LEFT JOIN pg_class owner ON owner.oid = own.refobjid ",
        "LEFT JOIN pg_namespace owner_ns ON owner_ns.oid = owner.relnamespace ",
        "LEFT JOIN pg_attribute owner_col ON owner_col.attrelid = own.refobjid ",
        "AND owner_col.attnum = own.refobjsubid ",
        "WHERE ",
        namespace_filter!(),
        " AND ",
        not_extension_member!("pg_class", "c.oid"),
        " AND NOT EXISTS (SELECT 1 FROM pg_depend idd WHERE idd.classid = 'pg_class'::regclass ",
        "AND idd.objid = c.oid AND idd.deptype = 'i') ",
        "ORDER BY 1, 2"
    );

    /// Ordinary, non-partition tables.
    pub const TABLES: &str = concat!(
        "SELECT n.nspname AS schema, c.relname AS name ",
        "FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace ",
        "WHERE c.relkind = 'r' AND NOT c.relispartition AND ",
        namespace_filter!(),
        " AND ",
        not_extension_member!("pg_class", "c.oid"),
        " ORDER BY 1, 2"
    );

    /// Table columns in attribute order.
    pub const COLUMNS: &str = concat!(
        "SELECT n.nspname AS schema, c.relname AS table_name, a.attname AS name, ",
        "format_type(a.atttypid, a.atttypmod) AS data_type, a.attnotnull AS not_null, ",
        "CASE WHEN a.attgenerated = '' THEN pg_get_expr(d.adbin, d.adrelid) END AS default_expr, ",
        "CASE WHEN a.attgenerated <> '' THEN pg_get_expr(d.adbin, d.adrelid) END AS generated_expr, ",
        "NULLIF(a.attidentity::text, '') AS identity ",
        "FROM pg_attribute a ",
        "JOIN pg_class c ON c.oid = a.attrelid ",
        "JOIN pg_namespace n ON n.oid = c.relnamespace ",
        "LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum ",
        "WHERE c.relkind = 'r' AND a.attnum > 0 AND NOT a.attisdropped AND ",
        namespace_filter!(),
        " ORDER BY 1, 2, a.attnum"
    );

    /// Primary key, unique, check, foreign key and exclusion constraints.
    pub const CONSTRAINTS: &str = concat!(
        "SELECT n.nspname AS schema, c.relname AS table_name, co.conname AS name, ",
        "co.contype::text AS kind, pg_get_constraintdef(co.oid) AS definition ",
        "FROM pg_constraint co ",
        "JOIN pg_class c ON c.oid = co.conrelid ",
        "JOIN pg_namespace n ON n.oid = c.relnamespace ",
        "WHERE co.contype IN ('p', 'u', 'c', 'f', 'x') AND c.relkind = 'r' AND ",
        namespace_filter!(),
        " ORDER BY 1, 2, 3"
    );

    /// Indexes that do not back a constraint.
    pub const INDEXES: &str = concat!(
        "SELECT n.nspname AS schema, c.relname AS table_name, i.relname AS name, ",
        "pg_get_indexdef(i.oid) AS definition ",
        "FROM pg_index x ",
        "JOIN pg_class i ON i.oid = x.indexrelid ",
        "JOIN pg_class c ON c.oid = x.indrelid ",
        "JOIN pg_namespace n ON n.oid = c.relnamespace ",
        "WHERE c.relkind = 'r' AND ",
        namespace_filter!(),
        " AND NOT EXISTS (SELECT 1 FROM pg_constraint co WHERE co.conindid = i.oid ",
        "AND co.contype IN ('p', 'u', 'x')) ",
        "ORDER BY 1, 2, 3"
    );

    /// User-defined triggers on tables.
    pub const TRIGGERS: &str = concat!(
        "SELECT n.nspname AS schema, c.relname AS table_name, t.tgname AS name, ",
        "pg_get_triggerdef(t.oid) AS definition ",
        "FROM pg_trigger t ",
        "JOIN pg_class c ON c.oid = t.tgrelid ",
        "JOIN pg_namespace n ON n.oid = c.relnamespace ",
        "WHERE NOT t.tgisinternal AND c.relkind = 'r' AND ",
        namespace_filter!(),
        " ORDER BY 1, 2, 3"
    );

    /// Views and materialized views in creation order.
    pub const VIEWS: &str = concat!(
        "SELECT n.nspname AS schema, c.relname AS name, c.relkind::text AS kind, ",
        "pg_get_viewdef(c.oid) AS definition, c.oid AS position ",
        "FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace ",
        "WHERE c.relkind IN ('v', 'm') AND ",
        namespace_filter!(),
        " AND ",
        not_extension_member!("pg_class", "c.oid"),
        " ORDER BY c.oid"
    );

    /// Relations each view's rewrite rule refers to, other than the view
    /// itself.
    pub const VIEW_DEPENDENCIES: &str = concat!(
        "SELECT DISTINCT n.nspname AS schema, v.relname AS name, ",
        "ref_ns.nspname AS ref_schema, ref.relname AS ref_name ",
        "FROM pg_depend d ",
        "JOIN pg_rewrite r ON r.oid = d.objid ",
        "JOIN pg_class v ON v.oid = r.ev_class ",
        "JOIN pg_namespace n ON n.oid = v.relnamespace ",
        "JOIN pg_class ref ON ref.oid = d.refobjid ",
        "JOIN pg_namespace ref_ns ON ref_ns.oid = ref.relnamespace ",
        "WHERE d.classid = 'pg_rewrite'::regclass AND d.refclassid = 'pg_class'::regclass ",
        "AND d.refobjid <> r.ev_class AND v.relkind IN ('v', 'm') ",
        "AND ref.relkind IN ('r', 'v', 'm') AND ",
        namespace_filter!(),
        " ORDER BY 1, 2, 3, 4"
    );

    /// Plain functions and procedures.
    pub const ROUTINES: &str = concat!(
        "SELECT n.nspname AS schema, p.proname AS name, ",
        "pg_get_function_identity_arguments(p.oid) AS arguments, p.prokind::text AS kind, ",
        "pg_get_function_result(p.oid) AS result, pg_get_functiondef(p.oid) AS definition ",
        "FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace ",
        "WHERE p.prokind IN ('f', 'p') AND ",
        namespace_filter!(),
        " AND ",
        not_extension_member!("pg_proc", "p.oid"),
        " ORDER BY 1, 2, 3"
    );

    /// Relation privileges granted to roles other than the owner.
    pub const PRIVILEGES: &str = concat!(
        "SELECT n.nspname AS schema, c.relname AS name, c.relkind::text AS kind, ",
        "CASE WHEN a.grantee = 0 THEN 'PUBLIC' ELSE pg_get_userbyid(a.grantee)::text END AS grantee, ",
        "a.privilege_type AS privilege ",
        "FROM pg_class c ",
        "JOIN pg_namespace n ON n.oid = c.relnamespace ",
        "CROSS JOIN LATERAL aclexplode(c.relacl) a ",
        "WHERE c.relkind IN ('r', 'v', 'm', 'S') AND a.grantee <> c.relowner AND ",
        namespace_filter!(),
        " AND ",
        not_extension_member!("pg_class", "c.oid"),
        " ORDER BY 1, 2, 4, 5"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_quoting() {
        let name = QualifiedName::new("public", "User Accounts");
        assert_eq!(name.quoted(), "\"public\".\"User Accounts\"");
        assert_eq!(name.to_string(), "public.User Accounts");
    }

    #[test]
    fn test_constraint_kind_codes() {
        assert_eq!(ConstraintKind::from_code("p"), Some(ConstraintKind::PrimaryKey));
        assert_eq!(ConstraintKind::from_code("f"), Some(ConstraintKind::ForeignKey));
        assert_eq!(ConstraintKind::from_code("x"), Some(ConstraintKind::Exclusion));
        assert_eq!(ConstraintKind::from_code("n"), None);
    }

    #[test]
    fn test_sequence_same_options_ignores_owner() {
        let base = SequenceInfo {
            data_type: "integer".into(),
            start: 1,
            increment: 1,
            min_value: 1,
            max_value: i32::MAX as i64,
            cache: 1,
            cycle: false,
            owned_by: None,
        };
        let owned = SequenceInfo {
            owned_by: Some(ColumnRef {
                table: QualifiedName::new("public", "users"),
                column: "id".into(),
            }),
            ..base.clone()
        };
        assert!(base.same_options(&owned));
        assert!(!base.same_options(&SequenceInfo {
            increment: 2,
            ..base.clone()
        }));
    }

    #[test]
    fn test_view_comparison_ignores_position() {
        let a = ViewInfo {
            materialized: false,
            definition: "SELECT 1".into(),
            position: 16384,
        };
        let b = ViewInfo {
            position: 20001,
            ..a.clone()
        };
        assert!(a.same_definition(&b));
        assert!(!a.same_definition(&ViewInfo {
            materialized: true,
            ..b
        }));
    }

    #[test]
    fn test_queries_take_schema_filter() {
        for query in [
            postgres_queries::SCHEMAS,
            postgres_queries::EXTENSIONS,
            postgres_queries::ENUMS,
            postgres_queries::SEQUENCES,
            postgres_queries::TABLES,
            postgres_queries::COLUMNS,
            postgres_queries::CONSTRAINTS,
            postgres_queries::INDEXES,
            postgres_queries::TRIGGERS,
            postgres_queries::VIEWS,
            postgres_queries::VIEW_DEPENDENCIES,
            postgres_queries::ROUTINES,
            postgres_queries::PRIVILEGES,
        ] {
            assert!(query.contains("$1::text IS NULL OR n.nspname = $1"), "{query}");
        }
    }
}
