//! SQL generation for schema diffs.

use tusker_postgres::{quote_ident, quote_literal};

use crate::diff::{
    ColumnAlterDiff, ConstraintDiff, EnumPlacement, EnumValueDiff, SchemaDiff, TableAlterDiff,
    TableObject,
};
use crate::introspect::{
    ColumnInfo, ColumnRef, ExtensionInfo, Grant, Identity, QualifiedName, RoutineKey, RoutineKind,
    SequenceInfo, ViewInfo,
};

/// One generated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// The statement, `;` terminated.
    pub sql: String,
    /// Whether it removes something (objects, columns, defaults).
    pub destructive: bool,
}

impl Statement {
    fn safe(sql: String) -> Self {
        Self {
            sql,
            destructive: false,
        }
    }

    fn destructive(sql: String) -> Self {
        Self {
            sql,
            destructive: true,
        }
    }
}

/// Generated migration SQL.
#[derive(Debug, Clone, Default)]
pub struct MigrationSql {
    /// Statements in execution order.
    pub statements: Vec<Statement>,
}

impl MigrationSql {
    /// Check if nothing was generated.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statements that remove something.
    pub fn destructive(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .filter(|s| s.destructive)
            .map(|s| s.sql.as_str())
    }

    /// Statements separated by blank lines, with a trailing newline. Empty
    /// when there are no statements.
    pub fn to_script(&self) -> String {
        if self.statements.is_empty() {
            return String::new();
        }
        let mut script = self
            .statements
            .iter()
            .map(|s| s.sql.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        script.push('\n');
        script
    }
}

/// SQL generator for PostgreSQL.
pub struct PostgresSqlGenerator;

impl PostgresSqlGenerator {
    /// Generate SQL for a schema diff.
    ///
    /// Everything that goes away is dropped first, dependents before their
    /// dependencies; then new objects are created in dependency order.
    pub fn generate(&self, diff: &SchemaDiff) -> MigrationSql {
        let mut out = Vec::new();

        for grant in &diff.revoke_grants {
            out.push(Statement::safe(self.revoke(grant)));
        }
        for (name, view) in &diff.drop_views {
            out.push(Statement::destructive(self.drop_view(name, view)));
        }
        for trigger in &diff.drop_triggers {
            out.push(Statement::destructive(self.drop_trigger(trigger)));
        }
        for constraint in diff.drop_foreign_keys.iter().chain(&diff.drop_constraints) {
            out.push(Statement::destructive(self.drop_constraint(constraint)));
        }
        for index in &diff.drop_indexes {
            out.push(Statement::destructive(format!("DROP INDEX {};", index.quoted())));
        }
        for alter in &diff.alter_tables {
            out.extend(self.alter_table_removals(alter));
        }
        for table in &diff.drop_tables {
            out.push(Statement::destructive(format!("DROP TABLE {};", table.quoted())));
        }
        for (key, kind) in &diff.drop_routines {
            out.push(Statement::destructive(self.drop_routine(key, *kind)));
        }
        for sequence in &diff.drop_sequences {
            out.push(Statement::destructive(format!(
                "DROP SEQUENCE IF EXISTS {};",
                sequence.quoted()
            )));
        }
        for name in &diff.drop_enums {
            out.push(Statement::destructive(format!("DROP TYPE {};", name.quoted())));
        }
        for name in &diff.drop_extensions {
            out.push(Statement::destructive(format!(
                "DROP EXTENSION {};",
                quote_ident(name)
            )));
        }
        for name in &diff.drop_schemas {
            out.push(Statement::destructive(format!(
                "DROP SCHEMA {};",
                quote_ident(name)
            )));
        }

        for name in &diff.create_schemas {
            out.push(Statement::safe(format!(
                "CREATE SCHEMA IF NOT EXISTS {};",
                quote_ident(name)
            )));
        }
        for ext in &diff.create_extensions {
            out.push(Statement::safe(self.create_extension(ext)));
        }
        for ext in &diff.update_extensions {
            out.push(Statement::safe(format!(
                "ALTER EXTENSION {} UPDATE TO {};",
                quote_ident(&ext.name),
                quote_literal(&ext.version)
            )));
        }
        for (name, labels) in &diff.create_enums {
            out.push(Statement::safe(self.create_enum(name, labels)));
        }
        for value in &diff.add_enum_values {
            out.push(Statement::safe(self.add_enum_value(value)));
        }
        for (name, seq) in &diff.create_sequences {
            out.push(Statement::safe(format!(
                "CREATE SEQUENCE {} {};",
                name.quoted(),
                self.sequence_options(seq)
            )));
        }
        for (name, seq) in &diff.alter_sequences {
            out.push(Statement::safe(format!(
                "ALTER SEQUENCE {} {};",
                name.quoted(),
                self.sequence_options(seq)
            )));
        }
        for (name, columns) in &diff.create_tables {
            out.push(Statement::safe(self.create_table(name, columns)));
        }
        for alter in &diff.alter_tables {
            out.extend(self.alter_table_additions(alter));
        }
        for (sequence, owner) in &diff.sequence_owners {
            out.push(Statement::safe(self.sequence_owner(sequence, owner.as_ref())));
        }
        for routine in &diff.create_routines {
            out.push(Statement::safe(terminate(&routine.definition)));
        }
        for constraint in diff.add_constraints.iter().chain(&diff.add_foreign_keys) {
            out.push(Statement::safe(self.add_constraint(constraint)));
        }
        for definition in diff.create_indexes.iter().chain(&diff.create_triggers) {
            out.push(Statement::safe(terminate(definition)));
        }
        for (name, view) in &diff.create_views {
            out.push(Statement::safe(self.create_view(name, view)));
        }
        for grant in &diff.grants {
            out.push(Statement::safe(self.grant(grant)));
        }

        MigrationSql { statements: out }
    }

    fn create_extension(&self, ext: &ExtensionInfo) -> String {
        format!(
            "CREATE EXTENSION IF NOT EXISTS {} WITH SCHEMA {} VERSION {};",
            quote_ident(&ext.name),
            quote_ident(&ext.schema),
            quote_literal(&ext.version)
        )
    }

    fn create_enum(&self, name: &QualifiedName, labels: &[String]) -> String {
        let labels: Vec<String> = labels.iter().map(|l| quote_literal(l)).collect();
        format!("CREATE TYPE {} AS ENUM ({});", name.quoted(), labels.join(", "))
    }

    fn add_enum_value(&self, value: &EnumValueDiff) -> String {
        let placement = match &value.placement {
            EnumPlacement::After(label) => format!("AFTER {}", quote_literal(label)),
            EnumPlacement::Before(label) => format!("BEFORE {}", quote_literal(label)),
        };
        format!(
            "ALTER TYPE {} ADD VALUE {} {};",
            value.name.quoted(),
            quote_literal(&value.value),
            placement
        )
    }

    fn sequence_options(&self, seq: &SequenceInfo) -> String {
        format!(
            "AS {} INCREMENT BY {} MINVALUE {} MAXVALUE {} START WITH {} CACHE {} {}",
            seq.data_type,
            seq.increment,
            seq.min_value,
            seq.max_value,
            seq.start,
            seq.cache,
            if seq.cycle { "CYCLE" } else { "NO CYCLE" }
        )
    }

    fn sequence_owner(&self, sequence: &QualifiedName, owner: Option<&ColumnRef>) -> String {
        let owner = match owner {
            Some(col) => format!("{}.{}", col.table.quoted(), quote_ident(&col.column)),
            None => "NONE".to_string(),
        };
        format!("ALTER SEQUENCE {} OWNED BY {};", sequence.quoted(), owner)
    }

    fn create_table(&self, name: &QualifiedName, columns: &[ColumnInfo]) -> String {
        if columns.is_empty() {
            return format!("CREATE TABLE {} ();", name.quoted());
        }
        let columns: Vec<String> = columns
            .iter()
            .map(|c| format!("    {}", self.column_definition(c)))
            .collect();
        format!("CREATE TABLE {} (\n{}\n);", name.quoted(), columns.join(",\n"))
    }

    fn column_definition(&self, column: &ColumnInfo) -> String {
        let mut sql = format!("{} {}", quote_ident(&column.name), column.data_type);

        if let Some(expr) = &column.generated {
            sql.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", expr));
        }
        match column.identity {
            Some(Identity::Always) => sql.push_str(" GENERATED ALWAYS AS IDENTITY"),
            Some(Identity::ByDefault) => sql.push_str(" GENERATED BY DEFAULT AS IDENTITY"),
            None => {}
        }
        if let Some(default) = &column.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }

        sql
    }

    /// Column drops and default removals, which must precede dropping the
    /// objects those columns referenced.
    fn alter_table_removals(&self, alter: &TableAlterDiff) -> Vec<Statement> {
        let table = alter.table.quoted();
        let mut out = Vec::new();

        for column in &alter.drop_columns {
            out.push(Statement::destructive(format!(
                "ALTER TABLE {} DROP COLUMN {};",
                table,
                quote_ident(column)
            )));
        }
        for change in &alter.alter_columns {
            if change.from.default.is_some() && change.to.default.is_none() {
                out.push(Statement::destructive(format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                    table,
                    quote_ident(&change.to.name)
                )));
            }
        }

        out
    }

    fn alter_table_additions(&self, alter: &TableAlterDiff) -> Vec<Statement> {
        let table = alter.table.quoted();
        let mut out = Vec::new();

        for column in &alter.add_columns {
            out.push(Statement::safe(format!(
                "ALTER TABLE {} ADD COLUMN {};",
                table,
                self.column_definition(column)
            )));
        }
        for change in &alter.alter_columns {
            out.extend(self.alter_column(&table, change).into_iter().map(Statement::safe));
        }

        out
    }

    fn alter_column(&self, table: &str, change: &ColumnAlterDiff) -> Vec<String> {
        let (from, to) = (&change.from, &change.to);
        let column = quote_ident(&to.name);
        let mut out = Vec::new();

        if from.data_type != to.data_type {
            out.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                table, column, to.data_type, column, to.data_type
            ));
        }
        if let (true, Some(default)) = (from.default != to.default, &to.default) {
            out.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                table, column, default
            ));
        }
        if from.not_null != to.not_null {
            let action = if to.not_null { "SET" } else { "DROP" };
            out.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                table, column, action
            ));
        }

        out
    }

    fn add_constraint(&self, diff: &ConstraintDiff) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {};",
            diff.target.table.quoted(),
            quote_ident(&diff.target.name),
            diff.constraint.definition
        )
    }

    fn drop_constraint(&self, constraint: &TableObject) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {};",
            constraint.table.quoted(),
            quote_ident(&constraint.name)
        )
    }

    fn drop_trigger(&self, trigger: &TableObject) -> String {
        format!(
            "DROP TRIGGER {} ON {};",
            quote_ident(&trigger.name),
            trigger.table.quoted()
        )
    }

    fn drop_routine(&self, key: &RoutineKey, kind: RoutineKind) -> String {
        format!(
            "DROP {} {}({});",
            kind.keyword(),
            key.name.quoted(),
            key.arguments
        )
    }

    fn create_view(&self, name: &QualifiedName, view: &ViewInfo) -> String {
        let kind = if view.materialized {
            "MATERIALIZED VIEW"
        } else {
            "VIEW"
        };
        format!("CREATE {} {} AS\n{};", kind, name.quoted(), view.definition)
    }

    fn drop_view(&self, name: &QualifiedName, view: &ViewInfo) -> String {
        let kind = if view.materialized {
            "MATERIALIZED VIEW"
        } else {
            "VIEW"
        };
        format!("DROP {} {};", kind, name.quoted())
    }

    fn grant(&self, grant: &Grant) -> String {
        format!(
            "GRANT {} ON {} {} TO {};",
            grant.privilege,
            grant.target.keyword(),
            grant.object.quoted(),
            grantee(&grant.grantee)
        )
    }

    fn revoke(&self, grant: &Grant) -> String {
        format!(
            "REVOKE {} ON {} {} FROM {};",
            grant.privilege,
            grant.target.keyword(),
            grant.object.quoted(),
            grantee(&grant.grantee)
        )
    }
}

fn grantee(name: &str) -> String {
    if name == "PUBLIC" {
        name.to_string()
    } else {
        quote_ident(name)
    }
}

fn terminate(statement: &str) -> String {
    let statement = statement.trim_end();
    if statement.ends_with(';') {
        statement.to_string()
    } else {
        format!("{};", statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::SchemaDiffer;
    use crate::diff::tests::{column, snapshot_with_users};
    use crate::introspect::{ConstraintInfo, ConstraintKind, GrantTarget, SchemaSnapshot};
    use pretty_assertions::assert_eq;

    fn public_only() -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::default();
        snapshot.schemas.insert("public".into());
        snapshot
    }

    fn script(source: &SchemaSnapshot, target: &SchemaSnapshot) -> String {
        PostgresSqlGenerator
            .generate(&SchemaDiffer::new(source, target).diff())
            .to_script()
    }

    #[test]
    fn test_empty_diff_is_empty_script() {
        let a = snapshot_with_users();
        assert_eq!(script(&a, &a.clone()), "");
    }

    #[test]
    fn test_create_table() {
        let sql = script(&public_only(), &snapshot_with_users());
        assert_eq!(
            sql,
            "CREATE TABLE \"public\".\"users\" (\n    \"id\" integer NOT NULL,\n    \"email\" text\n);\n\n\
             ALTER TABLE \"public\".\"users\" ADD CONSTRAINT \"users_pkey\" PRIMARY KEY (id);\n"
        );
    }

    #[test]
    fn test_reverse_diff_drops_what_forward_creates() {
        let forward = PostgresSqlGenerator
            .generate(&SchemaDiffer::new(&public_only(), &snapshot_with_users()).diff());
        let backward = PostgresSqlGenerator
            .generate(&SchemaDiffer::new(&snapshot_with_users(), &public_only()).diff());

        assert!(forward.destructive().next().is_none());
        assert_eq!(
            backward.destructive().collect::<Vec<_>>(),
            vec!["DROP TABLE \"public\".\"users\";"]
        );
    }

    #[test]
    fn test_column_alterations() {
        let source = snapshot_with_users();
        let mut target = snapshot_with_users();
        let users = target
            .tables
            .get_mut(&QualifiedName::new("public", "users"))
            .unwrap();
        users.columns[1] = ColumnInfo {
            default: Some("''::text".into()),
            ..column("email", "text", true)
        };

        let sql = script(&source, &target);
        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"users\" ALTER COLUMN \"email\" SET DEFAULT ''::text;\n\n\
             ALTER TABLE \"public\".\"users\" ALTER COLUMN \"email\" SET NOT NULL;\n"
        );
    }

    #[test]
    fn test_drop_default_comes_before_drop_sequence() {
        let seq_name = QualifiedName::new("public", "users_id_seq");
        let mut source = snapshot_with_users();
        source.sequences.insert(
            seq_name,
            SequenceInfo {
                data_type: "integer".into(),
                start: 1,
                increment: 1,
                min_value: 1,
                max_value: 2147483647,
                cache: 1,
                cycle: false,
                owned_by: None,
            },
        );
        source
            .tables
            .get_mut(&QualifiedName::new("public", "users"))
            .unwrap()
            .columns[0]
            .default = Some("nextval('users_id_seq'::regclass)".into());
        let target = snapshot_with_users();

        let sql = script(&source, &target);
        let drop_default = sql.find("DROP DEFAULT").unwrap();
        let drop_sequence = sql.find("DROP SEQUENCE IF EXISTS").unwrap();
        assert!(drop_default < drop_sequence);
    }

    #[test]
    fn test_foreign_keys_after_other_constraints() {
        let mut target = snapshot_with_users();
        let mut posts = crate::introspect::TableInfo {
            columns: vec![column("id", "integer", true), column("user_id", "integer", false)],
            ..Default::default()
        };
        posts.constraints.insert(
            "posts_user_id_fkey".into(),
            ConstraintInfo {
                kind: ConstraintKind::ForeignKey,
                definition: "FOREIGN KEY (user_id) REFERENCES users(id)".into(),
            },
        );
        posts.constraints.insert(
            "posts_pkey".into(),
            ConstraintInfo {
                kind: ConstraintKind::PrimaryKey,
                definition: "PRIMARY KEY (id)".into(),
            },
        );
        target
            .tables
            .insert(QualifiedName::new("public", "posts"), posts);

        let sql = script(&public_only(), &target);
        let fk = sql.find("posts_user_id_fkey").unwrap();
        let pk = sql.find("users_pkey").unwrap();
        assert!(pk < fk);
    }

    #[test]
    fn test_sequence_and_owner() {
        let name = QualifiedName::new("public", "users_id_seq");
        let mut target = snapshot_with_users();
        target.sequences.insert(
            name,
            SequenceInfo {
                data_type: "integer".into(),
                start: 1,
                increment: 1,
                min_value: 1,
                max_value: 2147483647,
                cache: 1,
                cycle: false,
                owned_by: Some(ColumnRef {
                    table: QualifiedName::new("public", "users"),
                    column: "id".into(),
                }),
            },
        );

        let sql = script(&public_only(), &target);
        let create_seq = sql
            .find("CREATE SEQUENCE \"public\".\"users_id_seq\" AS integer INCREMENT BY 1 MINVALUE 1 MAXVALUE 2147483647 START WITH 1 CACHE 1 NO CYCLE;")
            .unwrap();
        let create_table = sql.find("CREATE TABLE").unwrap();
        let owner = sql
            .find("ALTER SEQUENCE \"public\".\"users_id_seq\" OWNED BY \"public\".\"users\".\"id\";")
            .unwrap();
        assert!(create_seq < create_table && create_table < owner);
    }

    #[test]
    fn test_enum_statements() {
        let name = QualifiedName::new("public", "mood");
        let mut source = public_only();
        source.enums.insert(name.clone(), vec!["sad".into()]);
        let mut target = public_only();
        target
            .enums
            .insert(name, vec!["sad".into(), "it's fine".into()]);

        assert_eq!(
            script(&source, &target),
            "ALTER TYPE \"public\".\"mood\" ADD VALUE 'it''s fine' AFTER 'sad';\n"
        );
    }

    #[test]
    fn test_grants_and_revokes() {
        let grant = |grantee: &str| Grant {
            object: QualifiedName::new("public", "users"),
            target: GrantTarget::Table,
            grantee: grantee.into(),
            privilege: "SELECT".into(),
        };
        let mut source = snapshot_with_users();
        source.grants.insert(grant("PUBLIC"));
        let mut target = snapshot_with_users();
        target.grants.insert(grant("reader"));

        let sql = PostgresSqlGenerator.generate(&SchemaDiffer::new(&source, &target).diff());
        assert_eq!(
            sql.to_script(),
            "REVOKE SELECT ON TABLE \"public\".\"users\" FROM PUBLIC;\n\n\
             GRANT SELECT ON TABLE \"public\".\"users\" TO \"reader\";\n"
        );
        assert!(sql.destructive().next().is_none());
    }

    #[test]
    fn test_view_statements() {
        let name = QualifiedName::new("public", "active_users");
        let mut target = public_only();
        target.views.insert(
            name,
            ViewInfo {
                materialized: true,
                definition: "SELECT 1 AS one".into(),
                position: 1,
            },
        );
        assert_eq!(
            script(&public_only(), &target),
            "CREATE MATERIALIZED VIEW \"public\".\"active_users\" AS\nSELECT 1 AS one;\n"
        );
        assert_eq!(
            script(&target, &public_only()),
            "DROP MATERIALIZED VIEW \"public\".\"active_users\";\n"
        );
    }

    #[test]
    fn test_foreign_key_dropped_before_referenced_table() {
        let mut source = snapshot_with_users();
        let mut posts = crate::introspect::TableInfo {
            columns: vec![column("user_id", "integer", false)],
            ..Default::default()
        };
        posts.constraints.insert(
            "posts_user_id_fkey".into(),
            ConstraintInfo {
                kind: ConstraintKind::ForeignKey,
                definition: "FOREIGN KEY (user_id) REFERENCES users(id)".into(),
            },
        );
        source
            .tables
            .insert(QualifiedName::new("public", "posts"), posts);

        let sql = script(&source, &public_only());
        let drop_fk = sql
            .find("ALTER TABLE \"public\".\"posts\" DROP CONSTRAINT \"posts_user_id_fkey\";")
            .unwrap();
        let drop_users = sql.find("DROP TABLE \"public\".\"users\";").unwrap();
        let drop_posts = sql.find("DROP TABLE \"public\".\"posts\";").unwrap();
        assert!(drop_fk < drop_users);
        assert!(drop_fk < drop_posts);
    }

    #[test]
    fn test_view_recreated_around_column_type_change() {
        let users = QualifiedName::new("public", "users");
        let emails = QualifiedName::new("public", "emails");
        let mut source = snapshot_with_users();
        source.views.insert(
            emails.clone(),
            ViewInfo {
                materialized: false,
                definition: "SELECT users.id FROM users".into(),
                position: 1,
            },
        );
        source
            .view_dependencies
            .insert(emails, std::collections::BTreeSet::from([users.clone()]));
        let mut target = source.clone();
        target.tables.get_mut(&users).unwrap().columns[0] = column("id", "bigint", true);

        let sql = script(&source, &target);
        let drop_view = sql.find("DROP VIEW \"public\".\"emails\";").unwrap();
        let alter = sql.find("ALTER COLUMN \"id\" TYPE bigint").unwrap();
        let create_view = sql.find("CREATE VIEW \"public\".\"emails\" AS").unwrap();
        assert!(drop_view < alter);
        assert!(alter < create_view);
    }

    #[test]
    fn test_terminate() {
        assert_eq!(terminate("CREATE INDEX i ON t (a)"), "CREATE INDEX i ON t (a);");
        assert_eq!(terminate("SELECT 1;\n"), "SELECT 1;");
    }
}
