//! Diff orchestration.
//!
//! The orchestrator brings backends up, hands their connections to a
//! [`DiffEngine`] and makes sure every backend it brought up is released
//! again, whatever the outcome.

use std::future::Future;

use tracing::{debug, info};

use crate::backend::{Backend, BackendKind, Materializer, SourceFiles};
use crate::diff::{CatalogDiffEngine, DiffEngine, DiffOptions};
use crate::ephemeral::{DatabaseAdmin, settle};
use crate::error::{MigrateResult, MigrationError};

/// Reject a `diff` between a backend and itself.
pub fn validate_pair(from: BackendKind, to: BackendKind) -> MigrateResult<()> {
    if from == to {
        return Err(MigrationError::usage(format!(
            "cannot diff {} against itself",
            from
        )));
    }
    Ok(())
}

/// Reject a `check` with fewer than two backends.
pub fn validate_chain(kinds: &[BackendKind]) -> MigrateResult<()> {
    if kinds.len() < 2 {
        return Err(MigrationError::usage(
            "check needs at least two backends to compare",
        ));
    }
    Ok(())
}

/// Walk adjacent pairs in order and return the first one that differs.
///
/// `diff_pair(i)` compares `kinds[i]` with `kinds[i + 1]`. Pairs after the
/// first difference are not compared.
pub async fn first_difference<F, Fut>(
    kinds: &[BackendKind],
    mut diff_pair: F,
) -> MigrateResult<Option<(BackendKind, BackendKind)>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = MigrateResult<String>>,
{
    for i in 0..kinds.len().saturating_sub(1) {
        let (a, b) = (kinds[i], kinds[i + 1]);
        let sql = diff_pair(i).await?;
        if sql.trim().is_empty() {
            debug!(from = %a, to = %b, "Backends match");
        } else {
            info!(from = %a, to = %b, "Backends differ");
            return Ok(Some((a, b)));
        }
    }
    Ok(None)
}

/// Materializes backends and compares them.
pub struct DiffOrchestrator<'a, E = CatalogDiffEngine> {
    admin: &'a DatabaseAdmin,
    sources: SourceFiles,
    engine: E,
    options: DiffOptions,
}

impl<'a> DiffOrchestrator<'a> {
    /// Create an orchestrator using the built-in diff engine.
    pub fn new(admin: &'a DatabaseAdmin, sources: SourceFiles) -> Self {
        Self {
            admin,
            sources,
            engine: CatalogDiffEngine::new(),
            options: DiffOptions::default(),
        }
    }
}

impl<'a, E: DiffEngine> DiffOrchestrator<'a, E> {
    /// Use a different diff engine.
    pub fn with_engine<E2: DiffEngine>(self, engine: E2) -> DiffOrchestrator<'a, E2> {
        DiffOrchestrator {
            admin: self.admin,
            sources: self.sources,
            engine,
            options: self.options,
        }
    }

    /// Set the options every comparison uses.
    pub fn with_options(mut self, options: DiffOptions) -> Self {
        self.options = options;
        self
    }

    /// The options in effect.
    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    fn materializer(&self) -> Materializer<'_> {
        Materializer::new(self.admin, &self.sources)
    }

    /// SQL that transforms `from` into `to`.
    pub async fn diff(&self, from: BackendKind, to: BackendKind) -> MigrateResult<String> {
        validate_pair(from, to)?;
        info!(from = %from, to = %to, "Diffing backends");

        let materializer = self.materializer();
        let source = materializer.materialize(from).await?;
        let target = match materializer.materialize(to).await {
            Ok(target) => target,
            Err(err) => return settle(Err(err), source.release().await),
        };

        let outcome = self
            .engine
            .diff(source.client(), target.client(), &self.options)
            .await;

        let outcome = settle(outcome, target.release().await);
        settle(outcome, source.release().await)
    }

    /// Compare backends pairwise in order; return the first pair that
    /// differs, or `None` when all of them match.
    ///
    /// All backends are up at the same time and released in reverse order.
    pub async fn check(
        &self,
        kinds: &[BackendKind],
    ) -> MigrateResult<Option<(BackendKind, BackendKind)>> {
        validate_chain(kinds)?;
        info!(backends = ?kinds, "Checking backends");

        let mut open = Vec::with_capacity(kinds.len());
        let mut result = self.open_and_compare(kinds, &mut open).await;

        while let Some(backend) = open.pop() {
            result = settle(result, backend.release().await);
        }

        result
    }

    async fn open_and_compare<'s>(
        &'s self,
        kinds: &[BackendKind],
        open: &mut Vec<Backend<'s>>,
    ) -> MigrateResult<Option<(BackendKind, BackendKind)>> {
        let materializer = self.materializer();
        for kind in kinds {
            open.push(materializer.materialize(*kind).await?);
        }

        let open = &*open;
        first_difference(kinds, move |i| {
            self.engine
                .diff(open[i].client(), open[i + 1].client(), &self.options)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;

    use BackendKind::{Database, Migrations, Schema};

    #[test]
    fn test_validate_pair() {
        assert!(validate_pair(Schema, Migrations).is_ok());
        let err = validate_pair(Schema, Schema).unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("schema"));
    }

    #[test]
    fn test_validate_chain() {
        assert!(validate_chain(&[Migrations, Schema]).is_ok());
        assert!(validate_chain(&[Migrations]).unwrap_err().is_usage());
        assert!(validate_chain(&[]).unwrap_err().is_usage());
    }

    #[tokio::test]
    async fn test_first_difference_none_when_all_match() {
        let mut calls = Vec::new();
        let result = first_difference(&[Migrations, Schema, Database], |i| {
            calls.push(i);
            ready(Ok(String::new()))
        })
        .await
        .unwrap();

        assert_eq!(result, None);
        assert_eq!(calls, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_first_difference_short_circuits() {
        let mut calls = Vec::new();
        let result = first_difference(&[Migrations, Schema, Database], |i| {
            calls.push(i);
            ready(Ok("CREATE TABLE t ();\n".to_string()))
        })
        .await
        .unwrap();

        assert_eq!(result, Some((Migrations, Schema)));
        assert_eq!(calls, vec![0]);
    }

    #[tokio::test]
    async fn test_first_difference_later_pair() {
        let outputs = ["", "DROP TABLE t;"];
        let result = first_difference(&[Migrations, Schema, Database], |i| {
            ready(Ok(outputs[i].to_string()))
        })
        .await
        .unwrap();

        assert_eq!(result, Some((Schema, Database)));
    }

    #[tokio::test]
    async fn test_first_difference_propagates_errors() {
        let result = first_difference(&[Migrations, Schema], |_| {
            ready(Err(MigrationError::introspection("boom")))
        })
        .await;

        assert!(matches!(result, Err(MigrationError::Introspection(_))));
    }
}
