//! HTTP implementation of the report provider boundary.
//!
//! Thin JSON client over the external reporting API. Row persistence for
//! downloaded reports belongs to the provider side of the boundary; this
//! client downloads, validates the document shape, and reports the count.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ReportJobStatus, ReportProvider, StatusProbe};
use crate::error::{Error, Result};
use crate::models::ReportDatasetKey;

/// Reqwest-backed [`ReportProvider`].
#[derive(Clone)]
pub struct HttpReportProvider {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CreateReportResponse {
    #[serde(default, alias = "reportId")]
    report_id: String,
}

#[derive(Deserialize)]
struct ReportStatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default, alias = "downloadUrl", alias = "url")]
    download_url: Option<String>,
}

impl HttpReportProvider {
    /// Create a provider client. Every request carries `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| Error::ExternalApi(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_error(context: &str, err: reqwest::Error) -> Error {
        Error::ExternalApi(format!("{}: {}", context, err))
    }
}

#[async_trait]
impl ReportProvider for HttpReportProvider {
    async fn create_report(&self, key: &ReportDatasetKey) -> Result<String> {
        let body = serde_json::json!({
            "accountId": key.account_id,
            "countryCode": key.country_code,
            "bucketStart": key.bucket_start.to_rfc3339(),
            "aggregation": key.aggregation.as_str(),
            "entityType": key.entity_kind.as_str(),
        });

        let response = self
            .client
            .post(format!("{}/reports", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::api_error("create report request failed", e))?
            .error_for_status()
            .map_err(|e| Self::api_error("create report rejected", e))?;

        let parsed: CreateReportResponse = response
            .json()
            .await
            .map_err(|e| Self::api_error("create report response unreadable", e))?;

        debug!(key = %key, report_id = %parsed.report_id, "report requested");
        Ok(parsed.report_id)
    }

    async fn report_status(&self, report_id: &str) -> Result<StatusProbe> {
        let response = self
            .client
            .get(format!("{}/reports/{}", self.base_url, report_id))
            .send()
            .await
            .map_err(|e| Self::api_error("report status request failed", e))?
            .error_for_status()
            .map_err(|e| Self::api_error("report status rejected", e))?;

        let parsed: ReportStatusResponse = response
            .json()
            .await
            .map_err(|e| Self::api_error("report status response unreadable", e))?;

        Ok(StatusProbe {
            status: ReportJobStatus::parse(&parsed.status),
            download_url: parsed.download_url,
        })
    }

    async fn download_and_parse(&self, download_url: &str, key: &ReportDatasetKey) -> Result<u64> {
        let response = self
            .client
            .get(download_url)
            .send()
            .await
            .map_err(|e| Self::api_error("report download failed", e))?
            .error_for_status()
            .map_err(|e| Self::api_error("report download rejected", e))?;

        let document: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Self::api_error("report document unreadable", e))?;

        let rows = document
            .as_array()
            .ok_or_else(|| Error::ExternalApi("report document is not a row array".into()))?;

        debug!(key = %key, rows = rows.len(), "report downloaded");
        Ok(rows.len() as u64)
    }
}
