//! 동기화 도메인 타입.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::schema::{TableSchema, ADJ_FACTOR, DAILY};

/// 상장 상태 (L: 상장, D: 상장폐지, P: 상장 중단).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListStatus {
    Listed,
    Delisted,
    Paused,
}

impl ListStatus {
    /// 전체 상태 (참조 데이터 동기화 순서).
    pub const ALL: [ListStatus; 3] = [ListStatus::Listed, ListStatus::Delisted, ListStatus::Paused];

    /// Tushare 코드.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Listed => "L",
            Self::Delisted => "D",
            Self::Paused => "P",
        }
    }
}

impl FromStr for ListStatus {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L" => Ok(Self::Listed),
            "D" => Ok(Self::Delisted),
            "P" => Ok(Self::Paused),
            other => Err(DataError::Decode(format!("unknown list_status '{}'", other))),
        }
    }
}

impl fmt::Display for ListStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// 추적 대상 종목 (`stock_basic`에서 조회).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    /// TS 코드 (예: 000001.SZ)
    pub ts_code: String,
    pub list_status: ListStatus,
    pub list_date: NaiveDate,
    pub delist_date: Option<NaiveDate>,
}

impl Instrument {
    /// 영구 상장폐지 여부.
    pub fn is_delisted(&self) -> bool {
        self.list_status == ListStatus::Delisted
    }

    /// 이력 수집 종료일 (상장폐지일 또는 오늘).
    pub fn history_end(&self, today: NaiveDate) -> NaiveDate {
        self.delist_date.map_or(today, |d| d.min(today))
    }
}

/// 일별 시계열 데이터셋.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dataset {
    /// 일봉 (`daily_md`)
    Daily,
    /// 복권 인자 (`adj_factor`)
    AdjFactor,
}

impl Dataset {
    /// 동기화 대상 전체 데이터셋.
    pub const ALL: [Dataset; 2] = [Dataset::Daily, Dataset::AdjFactor];

    pub fn schema(&self) -> &'static TableSchema {
        match self {
            Self::Daily => &DAILY,
            Self::AdjFactor => &ADJ_FACTOR,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema().api_name)
    }
}
