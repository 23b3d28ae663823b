//! Thin client for the warehouse `jobs.query` REST endpoint.
//!
//! One call to [`BigQueryClient::query`] submits a parameterized statement,
//! polls until the job completes and follows page tokens until every row has
//! been read. Failures are mapped onto [`RepositoryError`] variants; nothing
//! is retried here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::auth::AccessTokenProvider;
use super::rows::{JobReference, QueryResponse, ResultSet, TableRow, TableSchema};
use crate::db::config::{QuerySettings, WarehouseConfig};
use crate::db::query::{CompiledQuery, QueryParameter};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};

/// Extra time given to the HTTP transport beyond the query timeout.
const TRANSPORT_GRACE: Duration = Duration::from_secs(10);
/// Upper bound for a single server-side wait while polling.
const MAX_POLL_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<WireParameter<'a>>,
    timeout_ms: u64,
    use_query_cache: bool,
    maximum_bytes_billed: String,
    request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireParameter<'a> {
    name: &'a str,
    parameter_type: WireParameterType,
    parameter_value: WireParameterValue,
}

#[derive(Debug, Serialize)]
struct WireParameterType {
    #[serde(rename = "type")]
    type_name: &'static str,
}

#[derive(Debug, Serialize)]
struct WireParameterValue {
    value: String,
}

impl<'a> From<&'a QueryParameter> for WireParameter<'a> {
    fn from(param: &'a QueryParameter) -> Self {
        Self {
            name: param.name,
            parameter_type: WireParameterType {
                type_name: param.value.type_name(),
            },
            parameter_value: WireParameterValue {
                value: param.value.to_wire(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

/// Client bound to one project and one set of query settings.
#[derive(Debug, Clone)]
pub struct BigQueryClient {
    http: reqwest::Client,
    auth: Arc<AccessTokenProvider>,
    config: WarehouseConfig,
    settings: QuerySettings,
}

impl BigQueryClient {
    /// Build a client, resolving credentials from `config.credentials`.
    pub fn new(config: WarehouseConfig, settings: QuerySettings) -> RepositoryResult<Self> {
        settings.validate()?;
        let http = reqwest::Client::builder()
            .timeout(settings.query_timeout() + TRANSPORT_GRACE)
            .build()
            .map_err(|e| {
                RepositoryError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;
        let auth = AccessTokenProvider::from_mode(&config.credentials, http.clone())?;
        Ok(Self::with_token_provider(config, settings, auth, http))
    }

    pub fn with_token_provider(
        config: WarehouseConfig,
        settings: QuerySettings,
        auth: AccessTokenProvider,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            auth: Arc::new(auth),
            config,
            settings,
        }
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Run `query` to completion and return every row.
    ///
    /// `operation` names the repository call for logs and error context.
    pub async fn query(
        &self,
        query: &CompiledQuery,
        operation: &str,
    ) -> RepositoryResult<ResultSet> {
        let started = Instant::now();
        let deadline = started + self.settings.query_timeout();
        debug!(
            "{}: executing query with {} parameters\n{}",
            operation,
            query.params.len(),
            query.sql
        );

        let request = QueryRequest {
            query: &query.sql,
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: query.params.iter().map(WireParameter::from).collect(),
            timeout_ms: self.settings.query_timeout().as_millis() as u64,
            use_query_cache: self.settings.use_query_cache,
            maximum_bytes_billed: self.settings.max_bytes_billed.to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
            location: self.config.location.as_deref(),
        };

        let url = format!(
            "{}/projects/{}/queries",
            self.config.api_base_url, self.config.project_id
        );
        let token = self.auth.access_token().await?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, operation))?;
        let mut page: QueryResponse = read_json(response, operation).await?;

        while !page.job_complete {
            let job = job_reference(&page, operation)?;
            let now = Instant::now();
            if now >= deadline {
                return Err(RepositoryError::timeout_with_context(
                    format!(
                        "Query did not complete within {}s",
                        self.settings.query_timeout_secs
                    ),
                    ErrorContext::new(operation).with_details(job.job_id),
                ));
            }
            let wait = (deadline - now).min(MAX_POLL_WAIT);
            debug!("{}: job {} still running, polling", operation, job.job_id);
            page = self.get_results(&job, None, wait, operation).await?;
        }

        let schema = page.schema.take().unwrap_or_default();
        let mut rows: Vec<TableRow> = std::mem::take(&mut page.rows);
        let mut page_token = page.page_token.take();
        while let Some(token) = page_token {
            let job = job_reference(&page, operation)?;
            page = self
                .get_results(&job, Some(&token), MAX_POLL_WAIT, operation)
                .await?;
            rows.append(&mut page.rows);
            page_token = page.page_token.take();
        }

        let elapsed = started.elapsed();
        debug!(
            "{}: {} rows in {:.3}s (cache hit: {})",
            operation,
            rows.len(),
            elapsed.as_secs_f64(),
            page.cache_hit.unwrap_or(false)
        );
        if elapsed > self.settings.slow_query_threshold() {
            warn!(
                "Slow query in {}: {:.3}s with {} parameters",
                operation,
                elapsed.as_secs_f64(),
                query.params.len()
            );
        }

        Ok(ResultSet::new(schema, rows))
    }

    async fn get_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
        wait: Duration,
        operation: &str,
    ) -> RepositoryResult<QueryResponse> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.config.api_base_url, job.project_id, job.job_id
        );
        let mut params: Vec<(&str, String)> =
            vec![("timeoutMs", wait.as_millis().to_string())];
        if let Some(location) = job.location.as_ref().or(self.config.location.as_ref()) {
            params.push(("location", location.clone()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let token = self.auth.access_token().await?;
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&params)
            .send()
            .await
            .map_err(|e| transport_error(e, operation))?;
        read_json(response, operation).await
    }
}

fn job_reference(page: &QueryResponse, operation: &str) -> RepositoryResult<JobReference> {
    page.job_reference.clone().ok_or_else(|| {
        RepositoryError::mapping_with_context(
            "Response is missing a job reference",
            ErrorContext::new(operation),
        )
    })
}

fn transport_error(err: reqwest::Error, operation: &str) -> RepositoryError {
    let context = ErrorContext::new(operation).with_entity("warehouse");
    if err.is_timeout() {
        RepositoryError::timeout_with_context(format!("Request timed out: {}", err), context)
    } else {
        RepositoryError::connection_with_context(format!("Request failed: {}", err), context)
    }
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    operation: &str,
) -> RepositoryResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(e, operation))?;

    if !status.is_success() {
        return Err(upstream_error(status, &body, operation));
    }

    serde_json::from_str(&body).map_err(|e| {
        RepositoryError::mapping_with_context(
            format!("Unexpected response body: {}", e),
            ErrorContext::new(operation).with_entity("warehouse"),
        )
    })
}

fn upstream_error(status: StatusCode, body: &str, operation: &str) -> RepositoryError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Warehouse returned {}", status));
    let reasons: Vec<&str> = parsed
        .as_ref()
        .map(|e| {
            e.error
                .errors
                .iter()
                .filter_map(|item| item.reason.as_deref())
                .collect()
        })
        .unwrap_or_default();
    let mut details = format!("http_status={}", status.as_u16());
    if let Some(status) = parsed.as_ref().and_then(|e| e.error.status.as_deref()) {
        details.push_str(&format!(", status={}", status));
    }
    if !reasons.is_empty() {
        details.push_str(&format!(", reasons={}", reasons.join("|")));
    }

    let context = ErrorContext::new(operation)
        .with_entity("warehouse")
        .with_details(details);
    let quota = reasons
        .iter()
        .any(|r| matches!(*r, "quotaExceeded" | "rateLimitExceeded"));

    if status == StatusCode::TOO_MANY_REQUESTS || quota {
        RepositoryError::query_with_context(message, context.retryable())
    } else if status.is_server_error() {
        RepositoryError::connection_with_context(message, context)
    } else {
        RepositoryError::query_with_context(message, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::ParamValue;
    use chrono::NaiveDate;

    #[test]
    fn test_wire_parameter_shape() {
        let param = QueryParameter {
            name: "start_date",
            value: ParamValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        };
        let json = serde_json::to_value(WireParameter::from(&param)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "start_date",
                "parameterType": {"type": "DATE"},
                "parameterValue": {"value": "2024-01-01"}
            })
        );
    }

    #[test]
    fn test_quota_error_is_retryable_query_error() {
        let body = r#"{"error":{"code":403,"message":"Quota exceeded","status":"PERMISSION_DENIED",
            "errors":[{"reason":"quotaExceeded","message":"Quota exceeded"}]}}"#;
        let err = upstream_error(StatusCode::FORBIDDEN, body, "fetch_forecasts");
        assert!(matches!(err, RepositoryError::QueryError { .. }));
        assert!(err.is_retryable());
        assert_eq!(err.message(), "Quota exceeded");
    }

    #[test]
    fn test_server_error_is_connection_error() {
        let err = upstream_error(StatusCode::SERVICE_UNAVAILABLE, "oops", "count_forecasts");
        assert!(matches!(err, RepositoryError::ConnectionError { .. }));
        assert!(err.message().contains("503"));
    }

    #[test]
    fn test_bad_request_is_query_error() {
        let body = r#"{"error":{"code":400,"message":"Unrecognized name: foo",
            "status":"INVALID_ARGUMENT","errors":[{"reason":"invalidQuery"}]}}"#;
        let err = upstream_error(StatusCode::BAD_REQUEST, body, "summarize_forecasts");
        assert!(matches!(err, RepositoryError::QueryError { .. }));
        assert!(!err.is_retryable());
        assert!(err
            .context()
            .details
            .as_deref()
            .unwrap()
            .contains("invalidQuery"));
    }
}
