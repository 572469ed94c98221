//! Schema diffing.
//!
//! [`SchemaDiffer`] compares two [`SchemaSnapshot`]s and produces a
//! [`SchemaDiff`]: the objects to drop, create and alter to turn the source
//! into the target. [`CatalogDiffEngine`] ties introspection, diffing and
//! SQL generation together behind the [`DiffEngine`] trait the orchestrator
//! talks to.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio_postgres::Client;
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::introspect::{
    CatalogIntrospector, ColumnInfo, ColumnRef, ConstraintInfo, ConstraintKind, ExtensionInfo,
    Grant, QualifiedName, RoutineInfo, RoutineKey, RoutineKind, SchemaSnapshot, SequenceInfo,
    TableInfo, ViewInfo,
};
use crate::sql::PostgresSqlGenerator;

/// Options shared by every comparison an orchestrator runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Only compare this schema.
    pub schema: Option<String>,
    /// Refuse to produce destructive statements.
    pub safe: bool,
    /// Compare relation privileges too.
    pub privileges: bool,
}

impl DiffOptions {
    /// Create default options: all schemas, unsafe, no privileges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the comparison to one schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set safe mode.
    pub fn safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }

    /// Set privilege comparison.
    pub fn privileges(mut self, privileges: bool) -> Self {
        self.privileges = privileges;
        self
    }
}

/// Compares two connected databases.
#[async_trait]
pub trait DiffEngine: Send + Sync {
    /// SQL that transforms the database behind `from` into the one behind
    /// `to`. An empty string means there is no difference.
    async fn diff(&self, from: &Client, to: &Client, options: &DiffOptions)
    -> MigrateResult<String>;
}

/// The built-in engine, based on `pg_catalog` introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogDiffEngine;

impl CatalogDiffEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }

    /// Render the SQL turning `source` into `target`.
    pub fn render(
        &self,
        source: &SchemaSnapshot,
        target: &SchemaSnapshot,
        options: &DiffOptions,
    ) -> MigrateResult<String> {
        let diff = SchemaDiffer::new(source, target).diff();
        debug!(summary = %diff.summary(), "Computed schema diff");

        let sql = PostgresSqlGenerator.generate(&diff);
        if options.safe {
            let destructive: Vec<String> = sql.destructive().map(str::to_string).collect();
            if !destructive.is_empty() {
                return Err(MigrationError::UnsafeMigration(destructive));
            }
        }

        Ok(sql.to_script())
    }
}

#[async_trait]
impl DiffEngine for CatalogDiffEngine {
    async fn diff(
        &self,
        from: &Client,
        to: &Client,
        options: &DiffOptions,
    ) -> MigrateResult<String> {
        let schema = options.schema.as_deref();
        let source = CatalogIntrospector::new(from, schema)
            .snapshot(options.privileges)
            .await?;
        let target = CatalogIntrospector::new(to, schema)
            .snapshot(options.privileges)
            .await?;
        self.render(&source, &target, options)
    }
}

/// An object that lives on a table (constraint, trigger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableObject {
    /// Owning table.
    pub table: QualifiedName,
    /// Object name.
    pub name: String,
}

/// A constraint to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDiff {
    /// Table and constraint name.
    pub target: TableObject,
    /// The constraint.
    pub constraint: ConstraintInfo,
}

/// Where a new enum label goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumPlacement {
    /// After an existing label.
    After(String),
    /// Before an existing label.
    Before(String),
}

/// A label to add to an existing enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValueDiff {
    /// Enum type.
    pub name: QualifiedName,
    /// New label.
    pub value: String,
    /// Position relative to an existing label.
    pub placement: EnumPlacement,
}

/// A column whose definition changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAlterDiff {
    /// Definition in the source.
    pub from: ColumnInfo,
    /// Definition in the target.
    pub to: ColumnInfo,
}

/// Column changes on a table present on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAlterDiff {
    /// The table.
    pub table: QualifiedName,
    /// Columns to add.
    pub add_columns: Vec<ColumnInfo>,
    /// Columns to drop.
    pub drop_columns: Vec<String>,
    /// Columns to alter in place.
    pub alter_columns: Vec<ColumnAlterDiff>,
}

impl TableAlterDiff {
    fn is_empty(&self) -> bool {
        self.add_columns.is_empty() && self.drop_columns.is_empty() && self.alter_columns.is_empty()
    }
}

/// A diff between two snapshots.
#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    /// Privileges to revoke.
    pub revoke_grants: Vec<Grant>,
    /// Views to drop, dependents first.
    pub drop_views: Vec<(QualifiedName, ViewInfo)>,
    /// Triggers to drop.
    pub drop_triggers: Vec<TableObject>,
    /// Foreign keys to drop.
    pub drop_foreign_keys: Vec<TableObject>,
    /// Other constraints to drop.
    pub drop_constraints: Vec<TableObject>,
    /// Indexes to drop.
    pub drop_indexes: Vec<QualifiedName>,
    /// Tables to drop.
    pub drop_tables: Vec<QualifiedName>,
    /// Functions and procedures to drop.
    pub drop_routines: Vec<(RoutineKey, RoutineKind)>,
    /// Sequences to drop.
    pub drop_sequences: Vec<QualifiedName>,
    /// Enum types to drop.
    pub drop_enums: Vec<QualifiedName>,
    /// Extensions to drop.
    pub drop_extensions: Vec<String>,
    /// Schemas to drop.
    pub drop_schemas: Vec<String>,
    /// Schemas to create.
    pub create_schemas: Vec<String>,
    /// Extensions to create.
    pub create_extensions: Vec<ExtensionInfo>,
    /// Extensions to move to another version.
    pub update_extensions: Vec<ExtensionInfo>,
    /// Enum types to create.
    pub create_enums: Vec<(QualifiedName, Vec<String>)>,
    /// Labels to add to existing enums.
    pub add_enum_values: Vec<EnumValueDiff>,
    /// Sequences to create.
    pub create_sequences: Vec<(QualifiedName, SequenceInfo)>,
    /// Sequences whose options changed.
    pub alter_sequences: Vec<(QualifiedName, SequenceInfo)>,
    /// Tables to create.
    pub create_tables: Vec<(QualifiedName, Vec<ColumnInfo>)>,
    /// Column changes on existing tables.
    pub alter_tables: Vec<TableAlterDiff>,
    /// Sequence ownership to set.
    pub sequence_owners: Vec<(QualifiedName, Option<ColumnRef>)>,
    /// Functions and procedures to create or replace.
    pub create_routines: Vec<RoutineInfo>,
    /// Non foreign key constraints to add.
    pub add_constraints: Vec<ConstraintDiff>,
    /// `CREATE INDEX` statements.
    pub create_indexes: Vec<String>,
    /// Foreign keys to add.
    pub add_foreign_keys: Vec<ConstraintDiff>,
    /// Views to create, dependencies first.
    pub create_views: Vec<(QualifiedName, ViewInfo)>,
    /// `CREATE TRIGGER` statements.
    pub create_triggers: Vec<String>,
    /// Privileges to grant.
    pub grants: Vec<Grant>,
}

impl SchemaDiff {
    /// Check if there are any differences.
    pub fn is_empty(&self) -> bool {
        self.count_drops() == 0 && self.count_creates() == 0 && self.count_alters() == 0
    }

    fn count_drops(&self) -> usize {
        self.revoke_grants.len()
            + self.drop_views.len()
            + self.drop_triggers.len()
            + self.drop_foreign_keys.len()
            + self.drop_constraints.len()
            + self.drop_indexes.len()
            + self.drop_tables.len()
            + self.drop_routines.len()
            + self.drop_sequences.len()
            + self.drop_enums.len()
            + self.drop_extensions.len()
            + self.drop_schemas.len()
    }

    fn count_creates(&self) -> usize {
        self.create_schemas.len()
            + self.create_extensions.len()
            + self.create_enums.len()
            + self.create_sequences.len()
            + self.create_tables.len()
            + self.create_routines.len()
            + self.add_constraints.len()
            + self.create_indexes.len()
            + self.add_foreign_keys.len()
            + self.create_views.len()
            + self.create_triggers.len()
            + self.grants.len()
    }

    fn count_alters(&self) -> usize {
        self.update_extensions.len()
            + self.add_enum_values.len()
            + self.alter_sequences.len()
            + self.alter_tables.len()
            + self.sequence_owners.len()
    }

    /// Get a human-readable summary of the diff.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No changes".to_string();
        }

        let mut parts = Vec::new();
        if !self.create_tables.is_empty() {
            parts.push(format!("Create {} tables", self.create_tables.len()));
        }
        if !self.drop_tables.is_empty() {
            parts.push(format!("Drop {} tables", self.drop_tables.len()));
        }
        if !self.alter_tables.is_empty() {
            parts.push(format!("Alter {} tables", self.alter_tables.len()));
        }
        if !self.create_views.is_empty() {
            parts.push(format!("Create {} views", self.create_views.len()));
        }
        if !self.drop_views.is_empty() {
            parts.push(format!("Drop {} views", self.drop_views.len()));
        }

        let others = self.count_drops() + self.count_creates() + self.count_alters()
            - self.create_tables.len()
            - self.drop_tables.len()
            - self.alter_tables.len()
            - self.create_views.len()
            - self.drop_views.len();
        if others > 0 {
            parts.push(format!("{} other changes", others));
        }

        parts.join(", ")
    }
}

/// Compares a source snapshot with a target snapshot.
pub struct SchemaDiffer<'a> {
    source: &'a SchemaSnapshot,
    target: &'a SchemaSnapshot,
}

impl<'a> SchemaDiffer<'a> {
    /// Create a differ turning `source` into `target`.
    pub fn new(source: &'a SchemaSnapshot, target: &'a SchemaSnapshot) -> Self {
        Self { source, target }
    }

    /// Compute the diff between the snapshots.
    pub fn diff(&self) -> SchemaDiff {
        let mut result = SchemaDiff::default();

        self.diff_schemas(&mut result);
        self.diff_extensions(&mut result);
        self.diff_enums(&mut result);
        self.diff_sequences(&mut result);
        self.diff_tables(&mut result);
        let rewritten = Self::rewritten_tables(&result);
        let recreated_views = self.diff_views(&mut result, &rewritten);
        self.diff_routines(&mut result);
        self.diff_grants(&mut result, &recreated_views);

        result
    }

    fn diff_schemas(&self, result: &mut SchemaDiff) {
        let (source, target) = (&self.source.schemas, &self.target.schemas);
        result.create_schemas = target.difference(source).cloned().collect();
        result.drop_schemas = source.difference(target).cloned().collect();
    }

    fn diff_extensions(&self, result: &mut SchemaDiff) {
        for (name, ext) in &self.target.extensions {
            match self.source.extensions.get(name) {
                None => result.create_extensions.push(ext.clone()),
                Some(old) if old.schema != ext.schema => {
                    result.drop_extensions.push(name.clone());
                    result.create_extensions.push(ext.clone());
                }
                Some(old) if old.version != ext.version => {
                    result.update_extensions.push(ext.clone())
                }
                Some(_) => {}
            }
        }
        for name in self.source.extensions.keys() {
            if !self.target.extensions.contains_key(name) {
                result.drop_extensions.push(name.clone());
            }
        }
    }

    fn diff_enums(&self, result: &mut SchemaDiff) {
        for (name, labels) in &self.target.enums {
            match self.source.enums.get(name) {
                None => result.create_enums.push((name.clone(), labels.clone())),
                Some(old) if old == labels => {}
                Some(old) => match added_enum_values(name, old, labels) {
                    Some(added) => result.add_enum_values.extend(added),
                    None => {
                        result.drop_enums.push(name.clone());
                        result.create_enums.push((name.clone(), labels.clone()));
                    }
                },
            }
        }
        for name in self.source.enums.keys() {
            if !self.target.enums.contains_key(name) {
                result.drop_enums.push(name.clone());
            }
        }
    }

    fn diff_sequences(&self, result: &mut SchemaDiff) {
        for (name, seq) in &self.target.sequences {
            match self.source.sequences.get(name) {
                None => {
                    result.create_sequences.push((name.clone(), seq.clone()));
                    if seq.owned_by.is_some() {
                        result
                            .sequence_owners
                            .push((name.clone(), seq.owned_by.clone()));
                    }
                }
                Some(old) => {
                    if !old.same_options(seq) {
                        result.alter_sequences.push((name.clone(), seq.clone()));
                    }
                    if old.owned_by != seq.owned_by {
                        result
                            .sequence_owners
                            .push((name.clone(), seq.owned_by.clone()));
                    }
                }
            }
        }
        for name in self.source.sequences.keys() {
            if !self.target.sequences.contains_key(name) {
                result.drop_sequences.push(name.clone());
            }
        }
    }

    fn diff_tables(&self, result: &mut SchemaDiff) {
        for (name, table) in &self.target.tables {
            match self.source.tables.get(name) {
                None => {
                    result
                        .create_tables
                        .push((name.clone(), table.columns.clone()));
                    add_table_objects(result, name, table, &TableInfo::default());
                }
                Some(old) => {
                    let alter = diff_columns(name, old, table);
                    if !alter.is_empty() {
                        result.alter_tables.push(alter);
                    }
                    drop_table_objects(result, name, old, table);
                    add_table_objects(result, name, table, old);
                }
            }
        }
        for (name, old) in &self.source.tables {
            if self.target.tables.contains_key(name) {
                continue;
            }
            // Foreign keys go first so dropped tables may reference each other.
            for (cname, constraint) in &old.constraints {
                if constraint.kind == ConstraintKind::ForeignKey {
                    result.drop_foreign_keys.push(TableObject {
                        table: name.clone(),
                        name: cname.clone(),
                    });
                }
            }
            result.drop_tables.push(name.clone());
        }
    }

    /// Tables with columns that change type or go away. Views reading them
    /// must be dropped before the `ALTER TABLE` and created again after it.
    fn rewritten_tables(result: &SchemaDiff) -> BTreeSet<QualifiedName> {
        result
            .alter_tables
            .iter()
            .filter(|alter| {
                !alter.drop_columns.is_empty()
                    || alter
                        .alter_columns
                        .iter()
                        .any(|c| c.from.data_type != c.to.data_type)
            })
            .map(|alter| alter.table.clone())
            .collect()
    }

    /// Returns the views that are dropped and created again.
    fn diff_views(
        &self,
        result: &mut SchemaDiff,
        rewritten: &BTreeSet<QualifiedName>,
    ) -> BTreeSet<QualifiedName> {
        let mut recreated = BTreeSet::new();
        let invalidated = self.invalidated_views(rewritten);

        let mut drops: Vec<(QualifiedName, ViewInfo)> = self
            .source
            .views
            .iter()
            .filter(|(name, view)| {
                invalidated.contains(*name)
                    || self
                        .target
                        .views
                        .get(*name)
                        .is_none_or(|new| !new.same_definition(view))
            })
            .map(|(name, view)| (name.clone(), view.clone()))
            .collect();
        drops.sort_by(|a, b| b.1.position.cmp(&a.1.position));

        let mut creates: Vec<(QualifiedName, ViewInfo)> = self
            .target
            .views
            .iter()
            .filter(|(name, view)| {
                invalidated.contains(*name)
                    || self
                        .source
                        .views
                        .get(*name)
                        .is_none_or(|old| !old.same_definition(view))
            })
            .map(|(name, view)| (name.clone(), view.clone()))
            .collect();
        creates.sort_by_key(|(_, view)| view.position);

        for (name, _) in &creates {
            if self.source.views.contains_key(name) {
                recreated.insert(name.clone());
            }
        }

        result.drop_views = drops;
        result.create_views = creates;
        recreated
    }

    /// Source views reading a rewritten table, directly or through other
    /// views.
    fn invalidated_views(&self, rewritten: &BTreeSet<QualifiedName>) -> BTreeSet<QualifiedName> {
        let mut invalidated = BTreeSet::new();
        if rewritten.is_empty() {
            return invalidated;
        }
        loop {
            let before = invalidated.len();
            for (view, reads) in &self.source.view_dependencies {
                if !invalidated.contains(view)
                    && reads
                        .iter()
                        .any(|r| rewritten.contains(r) || invalidated.contains(r))
                {
                    invalidated.insert(view.clone());
                }
            }
            if invalidated.len() == before {
                return invalidated;
            }
        }
    }

    fn diff_routines(&self, result: &mut SchemaDiff) {
        for (key, routine) in &self.target.routines {
            match self.source.routines.get(key) {
                None => result.create_routines.push(routine.clone()),
                Some(old) if old == routine => {}
                Some(old) if old.kind != routine.kind || old.result != routine.result => {
                    result.drop_routines.push((key.clone(), old.kind));
                    result.create_routines.push(routine.clone());
                }
                Some(_) => result.create_routines.push(routine.clone()),
            }
        }
        for (key, routine) in &self.source.routines {
            if !self.target.routines.contains_key(key) {
                result.drop_routines.push((key.clone(), routine.kind));
            }
        }
    }

    fn diff_grants(&self, result: &mut SchemaDiff, recreated: &BTreeSet<QualifiedName>) {
        let (source, target) = (&self.source.grants, &self.target.grants);

        result.revoke_grants = source
            .difference(target)
            .filter(|g| self.target_has_relation(&g.object) && !recreated.contains(&g.object))
            .cloned()
            .collect();

        result.grants = target
            .iter()
            .filter(|g| !source.contains(g) || recreated.contains(&g.object))
            .cloned()
            .collect();
    }

    fn target_has_relation(&self, name: &QualifiedName) -> bool {
        self.target.tables.contains_key(name)
            || self.target.views.contains_key(name)
            || self.target.sequences.contains_key(name)
    }
}

/// Labels to add when `new` only extends `old`; `None` when labels were
/// removed or reordered.
fn added_enum_values(
    name: &QualifiedName,
    old: &[String],
    new: &[String],
) -> Option<Vec<EnumValueDiff>> {
    let kept: Vec<&String> = new.iter().filter(|v| old.contains(v)).collect();
    if kept.len() != old.len() || kept.iter().zip(old).any(|(a, b)| *a != b) {
        return None;
    }

    let mut added = Vec::new();
    for (i, value) in new.iter().enumerate() {
        if old.contains(value) {
            continue;
        }
        let placement = match i {
            0 => EnumPlacement::Before(new.get(1)?.clone()),
            _ => EnumPlacement::After(new[i - 1].clone()),
        };
        added.push(EnumValueDiff {
            name: name.clone(),
            value: value.clone(),
            placement,
        });
    }
    Some(added)
}

fn diff_columns(name: &QualifiedName, old: &TableInfo, new: &TableInfo) -> TableAlterDiff {
    let mut alter = TableAlterDiff {
        table: name.clone(),
        add_columns: Vec::new(),
        drop_columns: Vec::new(),
        alter_columns: Vec::new(),
    };

    for column in &new.columns {
        match old.column(&column.name) {
            None => alter.add_columns.push(column.clone()),
            Some(prev) if prev == column => {}
            Some(prev) if prev.identity != column.identity || prev.generated != column.generated => {
                alter.drop_columns.push(prev.name.clone());
                alter.add_columns.push(column.clone());
            }
            Some(prev) => alter.alter_columns.push(ColumnAlterDiff {
                from: prev.clone(),
                to: column.clone(),
            }),
        }
    }
    for column in &old.columns {
        if new.column(&column.name).is_none() {
            alter.drop_columns.push(column.name.clone());
        }
    }

    alter
}

/// Queue drops for objects of `old` missing from, or changed in, `new`.
fn drop_table_objects(result: &mut SchemaDiff, name: &QualifiedName, old: &TableInfo, new: &TableInfo) {
    for (cname, constraint) in &old.constraints {
        if new.constraints.get(cname) != Some(constraint) {
            let object = TableObject {
                table: name.clone(),
                name: cname.clone(),
            };
            if constraint.kind == ConstraintKind::ForeignKey {
                result.drop_foreign_keys.push(object);
            } else {
                result.drop_constraints.push(object);
            }
        }
    }
    for (iname, definition) in &old.indexes {
        if new.indexes.get(iname) != Some(definition) {
            result
                .drop_indexes
                .push(QualifiedName::new(name.schema.clone(), iname.clone()));
        }
    }
    for (tname, definition) in &old.triggers {
        if new.triggers.get(tname) != Some(definition) {
            result.drop_triggers.push(TableObject {
                table: name.clone(),
                name: tname.clone(),
            });
        }
    }
}

/// Queue creates for objects of `new` missing from, or changed since, `old`.
fn add_table_objects(result: &mut SchemaDiff, name: &QualifiedName, new: &TableInfo, old: &TableInfo) {
    for (cname, constraint) in &new.constraints {
        if old.constraints.get(cname) != Some(constraint) {
            let diff = ConstraintDiff {
                target: TableObject {
                    table: name.clone(),
                    name: cname.clone(),
                },
                constraint: constraint.clone(),
            };
            if constraint.kind == ConstraintKind::ForeignKey {
                result.add_foreign_keys.push(diff);
            } else {
                result.add_constraints.push(diff);
            }
        }
    }
    for (iname, definition) in &new.indexes {
        if old.indexes.get(iname) != Some(definition) {
            result.create_indexes.push(definition.clone());
        }
    }
    for (tname, definition) in &new.triggers {
        if old.triggers.get(tname) != Some(definition) {
            result.create_triggers.push(definition.clone());
        }
    }
}
