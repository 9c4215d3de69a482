use super::{ScheduleRow, ScheduleStore, StoreError, StoreResult, CONFLICT_COLS};
use crate::error::Result;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;

/// PostgREST-backed store for the `horarios` table
pub struct SupabaseStore {
    base_url: String,
    key: String,
    client: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(base_url: impl Into<String>, key: impl Into<String>) -> Self {
        SupabaseStore {
            base_url: base_url.into(),
            key: key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SUPABASE_URL").context("SUPABASE_URL no está definido")?;
        let key = std::env::var("SUPABASE_KEY").context("SUPABASE_KEY no está definido")?;
        Ok(SupabaseStore::new(url, key))
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/horarios", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self, prefer: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(key) = HeaderValue::from_str(&self.key) {
            headers.insert("apikey", key);
        }
        if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.key)) {
            headers.insert("Authorization", bearer);
        }
        if let Ok(prefer) = HeaderValue::from_str(prefer) {
            headers.insert("Prefer", prefer);
        }
        headers
    }
}

/// Map a PostgREST rejection to the store error taxonomy by the SQLSTATE
/// the body carries
async fn check(response: reqwest::Response) -> StoreResult<()> {
    if response.status().is_success() {
        return Ok(());
    }
    let status: StatusCode = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.contains("23505") {
        Err(StoreError::UniqueViolation(body))
    } else if body.contains("42P10") {
        Err(StoreError::IndexMismatch(body))
    } else {
        Err(StoreError::Other(anyhow!(
            "la tabla horarios respondió {status}: {body}"
        )))
    }
}

#[async_trait]
impl ScheduleStore for SupabaseStore {
    async fn insert(&self, rows: &[ScheduleRow]) -> StoreResult<()> {
        let response = self
            .client
            .post(self.endpoint())
            .headers(self.headers("return=minimal"))
            .json(rows)
            .send()
            .await
            .map_err(|e| StoreError::Other(e.into()))?;
        check(response).await
    }

    async fn upsert(&self, rows: &[ScheduleRow]) -> StoreResult<()> {
        let response = self
            .client
            .post(self.endpoint())
            .headers(self.headers("resolution=merge-duplicates,return=minimal"))
            .query(&[("on_conflict", CONFLICT_COLS.join(","))])
            .json(rows)
            .send()
            .await
            .map_err(|e| StoreError::Other(e.into()))?;
        check(response).await
    }

    async fn delete_version(&self, nivel: &str, version: u32) -> StoreResult<()> {
        let response = self
            .client
            .delete(self.endpoint())
            .headers(self.headers("return=minimal"))
            .query(&[
                ("nivel", format!("eq.{nivel}")),
                ("version_num", format!("eq.{version}")),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Other(e.into()))?;
        check(response).await
    }
}
