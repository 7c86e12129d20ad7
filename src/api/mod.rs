//! Quota API — provider-agnostic interface over the quota service.
//!
//! The poll driver only talks to [`QuotaApi`]; the HTTP client is one
//! implementation, test doubles are another.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::auth::Token;
use crate::error::FetchError;

pub mod client;
pub mod v1;
pub mod v3;

pub use v1::{CurrentUsageV1, QuotaV1};
pub use v3::{CurrentUsageV3, ObjectStorageSpace, QuotaV3};

/// Records keyed by region name.
pub type ByRegion<T> = HashMap<String, T>;

#[async_trait]
pub trait QuotaApi: Send + Sync {
    // ── v1 ──

    async fn quota_v1(&self, project_id: &str, token: &Token)
        -> Result<ByRegion<QuotaV1>, FetchError>;

    async fn current_usage_v1(
        &self,
        project_id: &str,
        token: &Token,
    ) -> Result<ByRegion<CurrentUsageV1>, FetchError>;

    // ── v3 ──

    async fn quota_v3(&self, project_id: &str, token: &Token)
        -> Result<ByRegion<QuotaV3>, FetchError>;

    async fn current_usage_v3(
        &self,
        project_id: &str,
        token: &Token,
    ) -> Result<ByRegion<CurrentUsageV3>, FetchError>;
}
