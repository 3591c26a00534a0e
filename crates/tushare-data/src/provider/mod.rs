//! 데이터 Provider 모듈.
//!
//! ## Tushare Pro
//! - `TushareClient`: JSON-over-HTTP 클라이언트 (모든 호출은 `RateGovernor` 경유)
//! - 종목 기본 정보 (`stock_basic`), 일봉 (`daily`), 복권 인자 (`adj_factor`)
//! - 거래 달력 (`trade_cal`)

pub mod tushare;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{Dataset, ListStatus};
use crate::record::RecordBatch;

pub use tushare::{
    ApiData, ApiRequest, ApiResponse, HttpTransport, ProviderTransport, TushareClient,
    DEFAULT_API_URL,
};

/// 시계열 조회 조건.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesQuery {
    /// 단일 종목의 기간 조회
    Range {
        ts_code: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// 특정 거래일의 전 종목 조회
    TradeDate(NaiveDate),
}

/// 동기화에 필요한 원격 데이터 소스.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// 상장 상태별 종목 기본 정보 조회.
    async fn fetch_stock_basic(&self, status: ListStatus) -> Result<RecordBatch>;

    /// 일별 시계열 조회.
    async fn fetch_series(&self, dataset: Dataset, query: &SeriesQuery) -> Result<RecordBatch>;

    /// `start..=end` 구간의 거래일 목록 (오름차순).
    async fn fetch_trade_calendar(&self, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<NaiveDate>>;
}
