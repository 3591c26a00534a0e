//! Tushare 증분 동기화 collector.
//!
//! 이 crate는 Tushare Pro 데이터를 PostgreSQL에 동기화하는 바이너리를 제공합니다:
//! - 종목 기본 정보 동기화 (`stock_basic`)
//! - 전체 백필, 단일 거래일 업데이트, gap-fill
//! - 데몬 모드 (주기적 gap-fill)

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
