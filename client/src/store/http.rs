use super::StoreClient;
use super::wire::{
    BatchWriteItemRequest, BatchWriteItemResponse, CreateTableRequest, CreateTableResponse,
    DescribeTableResponse, ErrorBody, GetItemResponse, KeyRequest, PutItemRequest, ScanRequest,
    ScanResponse, TableNameRequest,
};
use crate::common::errors::{BackendError, BackendResult};
use crate::logging::{StoreLogger, default_logger};
use crate::model::{
    BulkWriteResponse, Cursor, Item, Operation, ScanPage, TableDefinition, TableDescription,
};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::sync::Arc;
use std::time::Duration;

/// Target prefix of the JSON protocol version this client speaks
pub const DEFAULT_TARGET_PREFIX: &str = "DynamoDB_20120810";

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const TARGET_HEADER: &str = "X-Amz-Target";
const REQUEST_ID_HEADER: &str = "x-amzn-RequestId";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings of [`HttpStoreClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct HttpStoreConfig {
    pub endpoint: String,
    pub target_prefix: String,
    pub timeout: Duration,
    /// Log request and response bodies at debug level
    pub log_transport: bool,
}

impl HttpStoreConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            target_prefix: DEFAULT_TARGET_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
            log_transport: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_log_transport(mut self, enabled: bool) -> Self {
        self.log_transport = enabled;
        self
    }
}

/// JSON-over-HTTP store client.
///
/// Every call is one POST to the configured endpoint with the action named in
/// the `X-Amz-Target` header. Request signing is left to the caller: pass a
/// `reqwest::Client` built with whatever default headers the endpoint needs.
pub struct HttpStoreClient {
    http: reqwest::Client,
    config: HttpStoreConfig,
    logger: Arc<dyn StoreLogger>,
}

impl HttpStoreClient {
    pub fn new(http: reqwest::Client, config: HttpStoreConfig) -> Self {
        Self {
            http,
            config,
            logger: default_logger(),
        }
    }

    /// Build a client with its own `reqwest::Client` honoring `config.timeout`
    pub fn from_config(config: HttpStoreConfig) -> BackendResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self::new(http, config))
    }

    pub fn with_logger(mut self, logger: Arc<dyn StoreLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    async fn call<Req, Resp>(&self, action: &str, body: &Req) -> BackendResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_string(body)?;
        if self.config.log_transport {
            self.logger.debug(&format!("{action} request: {payload}"));
        }

        let response = self
            .http
            .post(&self.config.endpoint)
            .header(
                TARGET_HEADER,
                format!("{}.{}", self.config.target_prefix, action),
            )
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let text = response.text().await?;

        if self.config.log_transport {
            self.logger
                .debug(&format!("{action} response ({}): {text}", status.as_u16()));
        }

        if !status.is_success() {
            return Err(decode_error(status.as_u16(), request_id, &text));
        }

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            let error = BackendError::from(e).with_status(status.as_u16());
            match request_id {
                Some(id) => error.with_request_id(id),
                None => error,
            }
        })
    }
}

/// Turn a non-2xx response into a [`BackendError`].
///
/// Bodies that are not the store's error JSON keep their raw text as message
/// and get an `Http<status>` code.
fn decode_error(status: u16, request_id: Option<String>, body: &str) -> BackendError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let code = parsed
        .as_ref()
        .and_then(ErrorBody::code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Http{status}"));
    let message = parsed
        .and_then(|body| body.message)
        .unwrap_or_else(|| body.to_string());

    let error = BackendError::new(code, message).with_status(status);
    match request_id {
        Some(id) => error.with_request_id(id),
        None => error,
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn bulk_write(
        &self,
        table_name: &str,
        operations: &[Operation],
    ) -> BackendResult<BulkWriteResponse> {
        let request = BatchWriteItemRequest::new(table_name, operations);
        let response: BatchWriteItemResponse = self.call("BatchWriteItem", &request).await?;
        Ok(response.into_response(table_name))
    }

    async fn read_page(
        &self,
        table_name: &str,
        cursor: Option<&Cursor>,
        limit: Option<u32>,
    ) -> BackendResult<ScanPage> {
        let request = ScanRequest {
            table_name: table_name.to_string(),
            exclusive_start_key: cursor.map(|c| c.as_key().clone()),
            limit,
        };
        let response: ScanResponse = self.call("Scan", &request).await?;
        Ok(ScanPage::from(response))
    }

    async fn get_item(&self, table_name: &str, key: &Item) -> BackendResult<Option<Item>> {
        let request = KeyRequest {
            table_name: table_name.to_string(),
            key: key.clone(),
        };
        let response: GetItemResponse = self.call("GetItem", &request).await?;
        Ok(response.item.filter(|item| !item.is_empty()))
    }

    async fn put_item(&self, table_name: &str, item: &Item) -> BackendResult<()> {
        let request = PutItemRequest {
            table_name: table_name.to_string(),
            item: item.clone(),
        };
        self.call::<_, IgnoredAny>("PutItem", &request).await?;
        Ok(())
    }

    async fn delete_item(&self, table_name: &str, key: &Item) -> BackendResult<()> {
        let request = KeyRequest {
            table_name: table_name.to_string(),
            key: key.clone(),
        };
        self.call::<_, IgnoredAny>("DeleteItem", &request).await?;
        Ok(())
    }

    async fn create_table(&self, definition: &TableDefinition) -> BackendResult<TableDescription> {
        let request = CreateTableRequest::from(definition);
        let response: CreateTableResponse = self.call("CreateTable", &request).await?;
        TableDescription::try_from(response.table_description)
    }

    async fn delete_table(&self, table_name: &str) -> BackendResult<()> {
        let request = TableNameRequest {
            table_name: table_name.to_string(),
        };
        self.call::<_, IgnoredAny>("DeleteTable", &request).await?;
        Ok(())
    }

    async fn describe_table(&self, table_name: &str) -> BackendResult<Option<TableDescription>> {
        let request = TableNameRequest {
            table_name: table_name.to_string(),
        };
        match self
            .call::<_, DescribeTableResponse>("DescribeTable", &request)
            .await
        {
            Ok(response) => TableDescription::try_from(response.table).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_body_is_decoded() {
        let error = decode_error(
            400,
            Some("REQ1".to_string()),
            r#"{"__type":"com.amazonaws.dynamodb.v20120810#ProvisionedThroughputExceededException","message":"Rate exceeded"}"#,
        );

        assert_eq!(error.code, "ProvisionedThroughputExceededException");
        assert_eq!(error.message, "Rate exceeded");
        assert_eq!(error.status, Some(400));
        assert_eq!(error.request_id.as_deref(), Some("REQ1"));
        assert!(error.is_throttling());
    }

    #[test]
    fn non_json_error_body_keeps_raw_text() {
        let error = decode_error(502, None, "Bad Gateway");
        assert_eq!(error.code, "Http502");
        assert_eq!(error.message, "Bad Gateway");
        assert!(error.request_id.is_none());
    }

    #[test]
    fn config_defaults() {
        let config = HttpStoreConfig::new("http://localhost:8000");
        assert_eq!(config.target_prefix, DEFAULT_TARGET_PREFIX);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!config.log_transport);

        let config = config
            .with_timeout(Duration::from_secs(5))
            .with_log_transport(true);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.log_transport);
    }
}
