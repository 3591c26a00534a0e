//! 에러 타입 정의.

use thiserror::Error;
use tushare_data::DataError;

use crate::modules::WorkItem;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 데이터 계층 에러 (Provider, 저장소)
    #[error(transparent)]
    Data(#[from] DataError),

    /// 그룹 내 작업 실패로 실행 중단 (이전 그룹은 커밋 유지)
    #[error("Sync aborted at {item}: {source}")]
    Aborted {
        item: WorkItem,
        #[source]
        source: DataError,
    },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
