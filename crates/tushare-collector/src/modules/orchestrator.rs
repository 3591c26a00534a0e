//! 증분 동기화 오케스트레이터.
//!
//! 실행 모드별로 작업(`WorkItem`) 목록을 계획한 뒤 고정 크기 그룹 단위로 실행합니다.
//!
//! - 그룹은 순차 실행, 그룹 내 작업은 동시 실행
//! - 모든 Provider 호출은 추가로 `RateGovernor`를 거침
//! - 그룹 내 작업이 하나라도 실패하면 그룹이 끝난 뒤 실행 중단 (이전 그룹은 커밋 유지)
//! - 재시도 없음. 복구는 gap-fill 재실행

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{debug, error, info, warn};
use tushare_data::{
    DataError, Dataset, Instrument, ListStatus, MarketDataSource, SeriesQuery, SyncStore,
};

use super::cursor::global_cursor;
use super::work_item::{Feed, Span, Target, WorkItem};
use crate::error::CollectorError;
use crate::{CollectionStats, Result};

/// 기본 그룹 크기 (그룹 내 동시 실행 수).
pub const DEFAULT_PARALLELISM: usize = 2;

/// Gap-fill 계획 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapFillPlan {
    /// 참조 테이블이 비어 있어 전체 백필로 전환
    Degrade,
    /// 누락된 (거래일, 데이터셋) 작업 (날짜 오름차순)
    Items(Vec<WorkItem>),
}

/// 동기화 오케스트레이터.
pub struct SyncOrchestrator {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn SyncStore>,
    parallelism: usize,
}

impl SyncOrchestrator {
    pub fn new(source: Arc<dyn MarketDataSource>, store: Arc<dyn SyncStore>) -> Self {
        Self {
            source,
            store,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    /// 그룹 크기 변경 (최소 1).
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// 종목 기본 정보 동기화 (L, D, P 상태별 1건).
    pub async fn sync_reference(&self) -> Result<CollectionStats> {
        info!("종목 기본 정보 동기화 시작");
        let items = ListStatus::ALL.into_iter().map(WorkItem::listing).collect();
        self.dispatch(items).await
    }

    /// 전체 백필: 참조 동기화 후 종목별 상장일~상장폐지일(또는 오늘) 전체 이력 수집.
    pub async fn full_backfill(&self, today: NaiveDate) -> Result<CollectionStats> {
        let mut stats = self.sync_reference().await?;

        let instruments = self.store.list_instruments().await?;
        let items = plan_backfill(&instruments, today);
        info!(
            instruments = instruments.len(),
            items = items.len(),
            "전체 백필 계획 완료"
        );

        stats.merge(&self.dispatch(items).await?);
        Ok(stats)
    }

    /// 단일 거래일 업데이트: 데이터셋별로 `today` 전 종목을 한 번에 수집.
    pub async fn daily_update(&self, today: NaiveDate) -> Result<CollectionStats> {
        let items = plan_daily(today);
        info!(date = %today, items = items.len(), "일별 업데이트 시작");
        self.dispatch(items).await
    }

    /// Gap-fill: 저장된 최신 거래일 이후 누락된 거래일만 수집.
    pub async fn gap_fill(&self, today: NaiveDate) -> Result<CollectionStats> {
        match self.plan_gap_fill(today).await? {
            GapFillPlan::Degrade => {
                warn!("stock_basic이 비어 있음, 전체 백필로 전환");
                self.full_backfill(today).await
            }
            GapFillPlan::Items(items) => {
                info!(items = items.len(), "Gap-fill 시작");
                self.dispatch(items).await
            }
        }
    }

    /// Gap-fill 작업 계획.
    ///
    /// 데이터셋별 전역 커서에서 첫 누락일을 구하고, 가장 이른 누락일부터 오늘까지의
    /// 거래 달력을 한 번 조회합니다.
    pub async fn plan_gap_fill(&self, today: NaiveDate) -> Result<GapFillPlan> {
        let instruments = self.store.list_instruments().await?;
        if instruments.is_empty() {
            return Ok(GapFillPlan::Degrade);
        }

        let mut starts: Vec<(Dataset, NaiveDate)> = Vec::new();
        for dataset in Dataset::ALL {
            let latest = self.store.latest_trade_dates(dataset).await?;
            let cursor = global_cursor(&instruments, &latest);
            debug!(dataset = %dataset, cursor = ?cursor, "전역 커서 계산");

            match cursor.and_then(|c| c.first_missing()) {
                Some(start) if start <= today => starts.push((dataset, start)),
                _ => debug!(dataset = %dataset, "누락 구간 없음"),
            }
        }

        let Some(earliest) = starts.iter().map(|(_, start)| *start).min() else {
            info!("모든 데이터셋이 최신 상태");
            return Ok(GapFillPlan::Items(Vec::new()));
        };

        let calendar = self.source.fetch_trade_calendar(earliest, today).await?;
        debug!(
            start = %earliest,
            end = %today,
            trading_days = calendar.len(),
            "거래 달력 조회 완료"
        );

        Ok(GapFillPlan::Items(plan_gap_items(&calendar, &starts)))
    }

    /// 작업 목록을 그룹 단위로 실행.
    async fn dispatch(&self, items: Vec<WorkItem>) -> Result<CollectionStats> {
        let started = Instant::now();
        let mut stats = CollectionStats::new();
        stats.total = items.len();

        let group_count = items.len().div_ceil(self.parallelism);

        for (group_idx, group) in items.chunks(self.parallelism).enumerate() {
            debug!(
                progress = format!("{}/{}", group_idx + 1, group_count),
                items = group.len(),
                "그룹 실행"
            );

            let outcomes = join_all(group.iter().map(|item| self.run_item(item))).await;

            let mut failure: Option<(WorkItem, DataError)> = None;
            for (item, outcome) in group.iter().zip(outcomes) {
                match outcome {
                    Ok(0) => {
                        stats.empty += 1;
                        debug!(item = %item, "데이터 없음");
                    }
                    Ok(rows) => {
                        stats.success += 1;
                        stats.rows_written += rows;
                        debug!(item = %item, rows, "수집 및 저장 완료");
                    }
                    Err(e) => {
                        stats.errors += 1;
                        error!(item = %item, error = %e, "작업 실패");
                        if failure.is_none() {
                            failure = Some((item.clone(), e));
                        }
                    }
                }
            }

            if let Some((item, source)) = failure {
                stats.elapsed = started.elapsed();
                stats.log_aborted("그룹 실행", &item.to_string());
                return Err(CollectorError::Aborted { item, source });
            }
        }

        stats.elapsed = started.elapsed();
        Ok(stats)
    }

    /// 단일 작업: 조회 후 비어 있지 않으면 upsert. 저장된 행 수 반환.
    async fn run_item(&self, item: &WorkItem) -> tushare_data::Result<u64> {
        let batch = match (item.feed(), item.target(), item.span()) {
            (Feed::StockBasic, Target::Listing(status), _) => {
                self.source.fetch_stock_basic(*status).await?
            }
            (Feed::Series(dataset), Target::Entity(ts_code), Span::Range { start, end }) => {
                let query = SeriesQuery::Range {
                    ts_code: ts_code.clone(),
                    start,
                    end,
                };
                self.source.fetch_series(dataset, &query).await?
            }
            (Feed::Series(dataset), Target::All, Span::Day(date)) => {
                self.source
                    .fetch_series(dataset, &SeriesQuery::TradeDate(date))
                    .await?
            }
            _ => {
                return Err(DataError::InvalidConfig(format!(
                    "unsupported work item: {}",
                    item
                )))
            }
        };

        if batch.is_empty() {
            return Ok(0);
        }

        self.store.upsert(&batch).await?;
        Ok(batch.len() as u64)
    }
}

/// 전체 백필 작업: 종목별, 데이터셋별 전체 이력 구간.
pub fn plan_backfill(instruments: &[Instrument], today: NaiveDate) -> Vec<WorkItem> {
    let mut items = Vec::with_capacity(instruments.len() * Dataset::ALL.len());

    for inst in instruments {
        let end = inst.history_end(today);
        if inst.list_date > end {
            debug!(ts_code = %inst.ts_code, list_date = %inst.list_date, "수집 구간 없음, 건너뜀");
            continue;
        }
        for dataset in Dataset::ALL {
            items.push(WorkItem::entity_range(
                dataset,
                inst.ts_code.clone(),
                inst.list_date,
                end,
            ));
        }
    }

    items
}

/// 단일 거래일 작업: 데이터셋별 1건.
pub fn plan_daily(today: NaiveDate) -> Vec<WorkItem> {
    Dataset::ALL
        .into_iter()
        .map(|dataset| WorkItem::trade_date(dataset, today))
        .collect()
}

/// 거래일별, 데이터셋별 gap-fill 작업.
///
/// 각 데이터셋은 자신의 첫 누락일 이후의 거래일만 받습니다.
pub fn plan_gap_items(calendar: &[NaiveDate], starts: &[(Dataset, NaiveDate)]) -> Vec<WorkItem> {
    let mut dates = calendar.to_vec();
    dates.sort_unstable();
    dates.dedup();

    dates
        .into_iter()
        .flat_map(|date| {
            starts
                .iter()
                .filter(move |(_, start)| date >= *start)
                .map(move |(dataset, _)| WorkItem::trade_date(*dataset, date))
        })
        .collect()
}
