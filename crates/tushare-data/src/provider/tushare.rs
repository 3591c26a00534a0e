//! Tushare Pro API 클라이언트.
//!
//! 요청은 `{api_name, token, params, fields}` JSON을 POST하고 응답 envelope
//! `{request_id, code, msg, data: {fields, items, has_more}}`를 디코딩합니다.
//!
//! # Rate limit
//!
//! Tushare 기본 권한은 분당 200회입니다. 모든 HTTP 호출은 `RateGovernor`를
//! 정확히 한 번 통과하며, 페이지가 여러 개면 페이지마다 한 번씩 통과합니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use tushare_data::provider::TushareClient;
//! use tushare_data::rate_limit::{RateGovernor, RateLimitConfig};
//!
//! let governor = RateGovernor::new(RateLimitConfig::default())?;
//! let client = TushareClient::with_http(token, DEFAULT_API_URL, Duration::from_secs(30), governor)?;
//! let listed = client.fetch_stock_basic(ListStatus::Listed).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{MarketDataSource, SeriesQuery};
use crate::error::{DataError, Result};
use crate::model::{Dataset, ListStatus};
use crate::rate_limit::RateGovernor;
use crate::record::{format_ts_date, RecordBatch};
use crate::schema::{TableSchema, STOCK_BASIC, TRADE_CAL};

/// Tushare Pro HTTP 엔드포인트.
pub const DEFAULT_API_URL: &str = "http://api.waditu.com";

/// 거래 달력 기준 거래소 (상해증권거래소).
const CALENDAR_EXCHANGE: &str = "SSE";

/// API 요청 본문.
#[derive(Debug, Clone, Serialize)]
pub struct ApiRequest {
    pub api_name: String,
    pub token: String,
    pub params: Map<String, Value>,
    pub fields: Vec<String>,
}

/// API 응답 envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub request_id: String,
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<ApiData>,
}

/// 응답 데이터 (위치 기반 행).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiData {
    pub fields: Vec<String>,
    pub items: Vec<Vec<Value>>,
    #[serde(default)]
    pub has_more: bool,
}

/// 요청 전송 계층.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// reqwest 기반 HTTP 전송.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
}

impl HttpTransport {
    /// 새 HTTP 전송 생성.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::Transport(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let response = self
            .client
            .post(&self.api_url)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::Transport(format!(
                "Tushare API 오류 [{}]: {} - {}",
                request.api_name, status, body
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            DataError::Decode(format!("malformed envelope for {}: {}", request.api_name, e))
        })
    }
}

/// Tushare Pro 클라이언트.
#[derive(Clone)]
pub struct TushareClient {
    transport: Arc<dyn ProviderTransport>,
    governor: RateGovernor,
    token: String,
}

impl TushareClient {
    /// 임의의 전송 계층으로 클라이언트 생성.
    pub fn new(
        token: impl Into<String>,
        transport: Arc<dyn ProviderTransport>,
        governor: RateGovernor,
    ) -> Self {
        Self {
            transport,
            governor,
            token: token.into(),
        }
    }

    /// HTTP 전송으로 클라이언트 생성.
    pub fn with_http(
        token: impl Into<String>,
        api_url: impl Into<String>,
        timeout: Duration,
        governor: RateGovernor,
    ) -> Result<Self> {
        let transport = HttpTransport::new(api_url, timeout)?;
        Ok(Self::new(token, Arc::new(transport), governor))
    }

    /// 단일 API 호출 (한 페이지).
    pub async fn call(
        &self,
        schema: &'static TableSchema,
        params: Map<String, Value>,
        fields: &[&str],
    ) -> Result<RecordBatch> {
        let request = ApiRequest {
            api_name: schema.api_name.to_string(),
            token: self.token.clone(),
            params,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        };

        let logged_params = Value::Object(request.params.clone());
        debug!(
            api_name = schema.api_name,
            params = %logged_params,
            "Tushare API 요청"
        );

        let transport = Arc::clone(&self.transport);
        let response = self
            .governor
            .execute(move || async move { transport.send(&request).await })
            .await??;

        decode_envelope(schema, response)
    }

    /// `has_more`가 꺼질 때까지 offset을 늘려가며 모든 페이지 수집.
    pub async fn call_all(
        &self,
        schema: &'static TableSchema,
        params: Map<String, Value>,
        fields: &[&str],
    ) -> Result<RecordBatch> {
        let mut batch = self.call(schema, params.clone(), fields).await?;

        while batch.has_more() {
            let mut page_params = params.clone();
            page_params.insert("offset".to_string(), json!(batch.len()));

            let page = self.call(schema, page_params, fields).await?;
            if page.is_empty() {
                warn!(
                    api_name = schema.api_name,
                    rows = batch.len(),
                    "has_more 응답 이후 빈 페이지"
                );
                break;
            }
            batch.append(page)?;
        }

        Ok(batch)
    }
}

fn decode_envelope(schema: &'static TableSchema, response: ApiResponse) -> Result<RecordBatch> {
    if response.code != 0 {
        return Err(DataError::Provider {
            code: response.code,
            message: response.msg.unwrap_or_default(),
        });
    }

    let data = response.data.ok_or_else(|| {
        DataError::Decode(format!(
            "response {} for {} has no data",
            response.request_id, schema.api_name
        ))
    })?;

    RecordBatch::decode(schema, &data.fields, &data.items, data.has_more)
}

fn params<const N: usize>(pairs: [(&str, String); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v)))
        .collect()
}

#[async_trait]
impl MarketDataSource for TushareClient {
    async fn fetch_stock_basic(&self, status: ListStatus) -> Result<RecordBatch> {
        let fields = STOCK_BASIC.field_names();
        self.call_all(
            &STOCK_BASIC,
            params([("list_status", status.as_code().to_string())]),
            &fields,
        )
        .await
    }

    async fn fetch_series(&self, dataset: Dataset, query: &SeriesQuery) -> Result<RecordBatch> {
        let schema = dataset.schema();
        let request_params = match query {
            SeriesQuery::Range {
                ts_code,
                start,
                end,
            } => params([
                ("ts_code", ts_code.clone()),
                ("start_date", format_ts_date(*start)),
                ("end_date", format_ts_date(*end)),
            ]),
            SeriesQuery::TradeDate(date) => params([("trade_date", format_ts_date(*date))]),
        };

        let fields = schema.field_names();
        self.call_all(schema, request_params, &fields).await
    }

    async fn fetch_trade_calendar(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let batch = self
            .call_all(
                &TRADE_CAL,
                params([
                    ("exchange", CALENDAR_EXCHANGE.to_string()),
                    ("start_date", format_ts_date(start)),
                    ("end_date", format_ts_date(end)),
                    ("is_open", "1".to_string()),
                ]),
                &["exchange", "cal_date", "is_open"],
            )
            .await?;

        let mut dates: Vec<NaiveDate> = batch
            .records()
            .filter(|r| r.get("is_open").and_then(|v| v.as_text()) == Some("1"))
            .filter_map(|r| r.get("cal_date").and_then(|v| v.as_date()))
            .filter(|d| *d >= start && *d <= end)
            .collect();
        dates.sort_unstable();
        dates.dedup();

        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitConfig;
    use crate::schema::ADJ_FACTOR;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// 요청을 기록하고 준비된 응답을 순서대로 돌려주는 전송.
    struct ScriptedTransport {
        responses: Mutex<Vec<Result<ApiResponse>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(mut responses: Vec<Result<ApiResponse>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProviderTransport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(DataError::Transport("no scripted response".to_string())))
        }
    }

    fn ok_response(fields: &[&str], items: Vec<Vec<Value>>, has_more: bool) -> Result<ApiResponse> {
        Ok(ApiResponse {
            request_id: "req".to_string(),
            code: 0,
            msg: None,
            data: Some(ApiData {
                fields: fields.iter().map(|f| f.to_string()).collect(),
                items,
                has_more,
            }),
        })
    }

    fn client(transport: Arc<dyn ProviderTransport>) -> TushareClient {
        let governor = RateGovernor::new(RateLimitConfig::new(100, Duration::from_secs(1))).unwrap();
        TushareClient::new("test-token", transport, governor)
    }

    #[tokio::test]
    async fn test_fetch_series_by_range_encodes_params() {
        let transport = ScriptedTransport::new(vec![ok_response(
            &["ts_code", "trade_date", "adj_factor"],
            vec![vec![json!("000001.SZ"), json!("20240102"), json!(108.031)]],
            false,
        )]);
        let client = client(transport.clone());

        let query = SeriesQuery::Range {
            ts_code: "000001.SZ".to_string(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        let batch = client.fetch_series(Dataset::AdjFactor, &query).await.unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.schema(), &ADJ_FACTOR);
        assert_eq!(batch.rows()[0][2].as_decimal(), Some(dec!(108.031)));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].api_name, "adj_factor");
        assert_eq!(requests[0].token, "test-token");
        assert_eq!(requests[0].params["start_date"], json!("20240101"));
        assert_eq!(requests[0].params["end_date"], json!("20240131"));
        assert_eq!(requests[0].fields, vec!["ts_code", "trade_date", "adj_factor"]);
    }

    #[tokio::test]
    async fn test_provider_error_code() {
        let transport = ScriptedTransport::new(vec![Ok(ApiResponse {
            request_id: "req".to_string(),
            code: 40203,
            msg: Some("抱歉，您每分钟最多访问该接口200次".to_string()),
            data: None,
        })]);
        let client = client(transport);

        let err = client
            .fetch_series(
                Dataset::Daily,
                &SeriesQuery::TradeDate(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Provider { code: 40203, .. }));
    }

    #[tokio::test]
    async fn test_missing_data_is_decode_error() {
        let transport = ScriptedTransport::new(vec![Ok(ApiResponse {
            request_id: "req".to_string(),
            code: 0,
            msg: None,
            data: None,
        })]);
        let err = client(transport)
            .fetch_stock_basic(ListStatus::Listed)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Decode(_)));
    }

    #[tokio::test]
    async fn test_pagination_follows_has_more() {
        let transport = ScriptedTransport::new(vec![
            ok_response(
                &["ts_code", "trade_date", "adj_factor"],
                vec![
                    vec![json!("000001.SZ"), json!("20240102"), json!(1.0)],
                    vec![json!("000002.SZ"), json!("20240102"), json!(2.0)],
                ],
                true,
            ),
            ok_response(
                &["trade_date", "adj_factor", "ts_code"],
                vec![vec![json!("20240102"), json!(3.0), json!("000004.SZ")]],
                false,
            ),
        ]);
        let client = client(transport.clone());

        let batch = client
            .fetch_series(
                Dataset::AdjFactor,
                &SeriesQuery::TradeDate(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            )
            .await
            .unwrap();

        assert_eq!(batch.len(), 3);
        let last = batch.records().last().unwrap();
        assert_eq!(last.get("ts_code").and_then(|v| v.as_text()), Some("000004.SZ"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].params.get("offset").is_none());
        assert_eq!(requests[1].params["offset"], json!(2));
    }

    #[tokio::test]
    async fn test_trade_calendar_filters_and_sorts() {
        let transport = ScriptedTransport::new(vec![ok_response(
            &["exchange", "cal_date", "is_open"],
            vec![
                vec![json!("SSE"), json!("20240104"), json!(1)],
                vec![json!("SSE"), json!("20240102"), json!("1")],
                vec![json!("SSE"), json!("20240106"), json!(0)],
                vec![json!("SSE"), json!("20240103"), json!(1)],
            ],
            false,
        )]);
        let client = client(transport.clone());

        let dates = client
            .fetch_trade_calendar(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            ]
        );
        assert_eq!(transport.requests()[0].params["exchange"], json!("SSE"));
    }

    #[tokio::test]
    async fn test_http_transport_posts_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({
                "api_name": "stock_basic",
                "token": "secret",
                "params": { "list_status": "D" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "request_id": "abc",
                    "code": 0,
                    "msg": "",
                    "data": {
                        "fields": ["ts_code", "symbol", "name", "list_status", "list_date", "delist_date"],
                        "items": [["600001.SH", "600001", "邯郸钢铁", "D", "19980122", "20091229"]],
                        "has_more": false
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let governor = RateGovernor::new(RateLimitConfig::default()).unwrap();
        let client =
            TushareClient::with_http("secret", server.url(), Duration::from_secs(5), governor)
                .unwrap();

        let batch = client.fetch_stock_basic(ListStatus::Delisted).await.unwrap();
        mock.assert_async().await;

        let record = batch.records().next().unwrap();
        assert_eq!(
            record.get("delist_date").and_then(|v| v.as_date()),
            NaiveDate::from_ymd_opt(2009, 12, 29)
        );
    }

    #[tokio::test]
    async fn test_http_transport_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let transport = HttpTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = client(Arc::new(transport))
            .fetch_stock_basic(ListStatus::Listed)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Transport(_)));
    }

    #[tokio::test]
    async fn test_http_transport_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let transport = HttpTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = client(Arc::new(transport))
            .fetch_stock_basic(ListStatus::Listed)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Decode(_)));
    }
}
