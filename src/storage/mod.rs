mod memory;
mod rows;
mod supabase;

pub use memory::*;
pub use rows::*;
pub use supabase::*;

use async_trait::async_trait;
use log::{info, warn};
use thiserror::Error;

/// Conflict target of the store's unique index
pub const CONFLICT_COLS: [&str; 3] = ["grado_id", "dia", "bloque"];

/// Errors a schedule store can produce. The two known Postgres rejections
/// (23505 unique violation, 42P10 bad conflict target) are recoverable;
/// everything else surfaces unchanged.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    #[error("conflict target mismatch: {0}")]
    IndexMismatch(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Boundary to the external schedule table
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert(&self, rows: &[ScheduleRow]) -> StoreResult<()>;
    /// Upsert keyed on [`CONFLICT_COLS`]
    async fn upsert(&self, rows: &[ScheduleRow]) -> StoreResult<()>;
    async fn delete_version(&self, nivel: &str, version: u32) -> StoreResult<()>;
}

/// Persist rows under the conflict policy: overwrite always replaces the
/// (nivel, version) slice; otherwise try an upsert and fall back to
/// delete-then-insert when the store rejects it with a known code.
pub async fn persist_schedule(
    store: &dyn ScheduleStore,
    rows: &[ScheduleRow],
    nivel: &str,
    version: u32,
    overwrite: bool,
) -> StoreResult<()> {
    if rows.is_empty() {
        warn!("sin registros que guardar (horario vacío)");
        return Ok(());
    }

    if overwrite {
        store.delete_version(nivel, version).await?;
        store.insert(rows).await?;
        info!("horario sobrescrito para {nivel} v{version} ({} filas)", rows.len());
        return Ok(());
    }

    match store.upsert(rows).await {
        Ok(()) => {
            info!("horario cargado por upsert ({} filas)", rows.len());
            Ok(())
        }
        Err(StoreError::UniqueViolation(msg)) | Err(StoreError::IndexMismatch(msg)) => {
            info!("upsert rechazado ({msg}); se reintenta con delete+insert");
            store.delete_version(nivel, version).await?;
            store.insert(rows).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(grado: u32, dia: &str, bloque: u8) -> ScheduleRow {
        ScheduleRow {
            docente_id: 1,
            curso_id: 1,
            grado_id: grado,
            dia: dia.to_string(),
            bloque,
            nivel: "Secundaria".to_string(),
            version_num: 1,
        }
    }

    #[tokio::test]
    async fn test_overwrite_replaces_the_version() {
        let store = MemoryStore::new();
        store.insert(&[row(1, "lunes", 0)]).await.unwrap();

        persist_schedule(&store, &[row(1, "lunes", 1)], "Secundaria", 1, true)
            .await
            .unwrap();

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bloque, 1);
    }

    #[tokio::test]
    async fn test_unique_violation_falls_back_to_delete_insert() {
        let store = MemoryStore::new();
        store.insert(&[row(1, "lunes", 0)]).await.unwrap();

        // same (grado, dia, bloque) key: upsert path replaces it
        persist_schedule(&store, &[row(1, "lunes", 0)], "Secundaria", 1, false)
            .await
            .unwrap();
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_index_mismatch_falls_back_to_delete_insert() {
        let store = MemoryStore::without_upsert();
        store.insert(&[row(1, "lunes", 0)]).await.unwrap();

        persist_schedule(
            &store,
            &[row(1, "martes", 2), row(2, "martes", 2)],
            "Secundaria",
            1,
            false,
        )
        .await
        .unwrap();

        let rows = store.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.dia == "martes"));
    }

    #[tokio::test]
    async fn test_empty_rows_touch_nothing() {
        let store = MemoryStore::new();
        store.insert(&[row(1, "lunes", 0)]).await.unwrap();

        persist_schedule(&store, &[], "Secundaria", 1, true)
            .await
            .unwrap();
        assert_eq!(store.rows().len(), 1);
    }
}
