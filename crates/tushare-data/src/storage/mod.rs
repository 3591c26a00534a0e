//! 저장소 레이어.
//!
//! - `Database`: PostgreSQL 연결 풀
//! - `BatchUpsertWriter`: 청크 단위 트랜잭션 upsert
//! - `PgSyncStore`: 동기화 오케스트레이터가 사용하는 조회/쓰기 구현

pub mod database;
pub mod repository;
pub mod upsert;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{Dataset, Instrument};
use crate::record::RecordBatch;

pub use database::{Database, DatabaseConfig};
pub use repository::PgSyncStore;
pub use upsert::{build_upsert, plan_chunks, BatchUpsertWriter, DEFAULT_UPSERT_CHUNK_SIZE};

/// 동기화 대상 저장소.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// 참조 테이블(`stock_basic`)의 모든 종목.
    async fn list_instruments(&self) -> Result<Vec<Instrument>>;

    /// 데이터셋 테이블에서 종목별 최신 거래일.
    ///
    /// 레코드가 없는 종목은 결과에 포함되지 않습니다.
    async fn latest_trade_dates(&self, dataset: Dataset) -> Result<HashMap<String, NaiveDate>>;

    /// 배치 upsert (원자적). 영향받은 행 수 반환.
    async fn upsert(&self, batch: &RecordBatch) -> Result<u64>;
}
