use super::{ScheduleRow, ScheduleStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::sync::Mutex;

/// In-process store mirroring the `horarios` table and its unique index on
/// (grado_id, dia, bloque)
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<ScheduleRow>>,
    /// When false, upserts fail like a store whose index does not match the
    /// conflict target (Postgres 42P10)
    upsert_supported: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            rows: Mutex::new(Vec::new()),
            upsert_supported: true,
        }
    }

    pub fn without_upsert() -> Self {
        MemoryStore {
            rows: Mutex::new(Vec::new()),
            upsert_supported: false,
        }
    }

    pub fn rows(&self) -> Vec<ScheduleRow> {
        self.rows.lock().unwrap().clone()
    }
}

fn same_slot(a: &ScheduleRow, b: &ScheduleRow) -> bool {
    a.grado_id == b.grado_id && a.dia == b.dia && a.bloque == b.bloque
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn insert(&self, rows: &[ScheduleRow]) -> StoreResult<()> {
        let mut stored = self.rows.lock().unwrap();
        for row in rows {
            if stored.iter().any(|r| same_slot(r, row)) {
                return Err(StoreError::UniqueViolation(format!(
                    "23505: llave duplicada (grado {}, {}, bloque {})",
                    row.grado_id, row.dia, row.bloque
                )));
            }
            stored.push(row.clone());
        }
        Ok(())
    }

    async fn upsert(&self, rows: &[ScheduleRow]) -> StoreResult<()> {
        if !self.upsert_supported {
            return Err(StoreError::IndexMismatch(
                "42P10: no unique or exclusion constraint matching the ON CONFLICT specification"
                    .to_string(),
            ));
        }
        let mut stored = self.rows.lock().unwrap();
        for row in rows {
            stored.retain(|r| !same_slot(r, row));
            stored.push(row.clone());
        }
        Ok(())
    }

    async fn delete_version(&self, nivel: &str, version: u32) -> StoreResult<()> {
        let mut stored = self.rows.lock().unwrap();
        stored.retain(|r| r.nivel != nivel || r.version_num != version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(grado: u32, bloque: u8, version: u32) -> ScheduleRow {
        ScheduleRow {
            docente_id: 1,
            curso_id: 1,
            grado_id: grado,
            dia: "lunes".to_string(),
            bloque,
            nivel: "Primaria".to_string(),
            version_num: version,
        }
    }

    #[tokio::test]
    async fn test_insert_enforces_the_unique_index() {
        let store = MemoryStore::new();
        store.insert(&[row(6, 0, 1)]).await.unwrap();

        let err = store.insert(&[row(6, 0, 2)]).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_delete_version_is_scoped() {
        let store = MemoryStore::new();
        store.insert(&[row(6, 0, 1), row(6, 1, 2)]).await.unwrap();

        store.delete_version("Primaria", 1).await.unwrap();
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].version_num, 2);

        store.delete_version("Secundaria", 2).await.unwrap();
        assert_eq!(store.rows().len(), 1);
    }
}
