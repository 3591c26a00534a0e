//! 동기화 작업 단위.

use std::fmt;

use chrono::NaiveDate;
use tushare_data::{format_ts_date, Dataset, ListStatus};

/// 작업이 채우는 대상 테이블.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    /// 종목 기본 정보 (`stock_basic`)
    StockBasic,
    /// 일별 시계열
    Series(Dataset),
}

/// 조회 대상.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// 상장 상태별 전체 종목
    Listing(ListStatus),
    /// 단일 종목
    Entity(String),
    /// 전 종목
    All,
}

/// 조회 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Span {
    Unbounded,
    Range { start: NaiveDate, end: NaiveDate },
    Day(NaiveDate),
}

/// 하나의 Provider 조회 + 저장 단위.
///
/// 생성자를 통해서만 만들어지며 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    feed: Feed,
    target: Target,
    span: Span,
}

impl WorkItem {
    /// 상장 상태별 종목 기본 정보.
    pub fn listing(status: ListStatus) -> Self {
        Self {
            feed: Feed::StockBasic,
            target: Target::Listing(status),
            span: Span::Unbounded,
        }
    }

    /// 단일 종목의 기간 시계열.
    pub fn entity_range(
        dataset: Dataset,
        ts_code: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            feed: Feed::Series(dataset),
            target: Target::Entity(ts_code.into()),
            span: Span::Range { start, end },
        }
    }

    /// 특정 거래일의 전 종목 시계열.
    pub fn trade_date(dataset: Dataset, date: NaiveDate) -> Self {
        Self {
            feed: Feed::Series(dataset),
            target: Target::All,
            span: Span::Day(date),
        }
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.feed {
            Feed::StockBasic => f.write_str("stock_basic")?,
            Feed::Series(dataset) => write!(f, "{}", dataset)?,
        }
        match &self.target {
            Target::Listing(status) => write!(f, " list_status={}", status)?,
            Target::Entity(ts_code) => write!(f, " {}", ts_code)?,
            Target::All => f.write_str(" *")?,
        }
        match self.span {
            Span::Unbounded => Ok(()),
            Span::Range { start, end } => {
                write!(f, " {}..{}", format_ts_date(start), format_ts_date(end))
            }
            Span::Day(date) => write!(f, " @{}", format_ts_date(date)),
        }
    }
}
