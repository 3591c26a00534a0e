//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 동기화 실행 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 계획된 작업 수
    pub total: usize,
    /// 성공한 작업 수
    pub success: usize,
    /// 실패한 작업 수
    pub errors: usize,
    /// 빈 응답 (조회 성공, 데이터 없음)
    pub empty: usize,
    /// 저장된 총 행 수
    pub rows_written: u64,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 다른 단계의 통계를 합산
    pub fn merge(&mut self, other: &CollectionStats) {
        self.total += other.total;
        self.success += other.success;
        self.errors += other.errors;
        self.empty += other.empty;
        self.rows_written += other.rows_written;
        self.elapsed += other.elapsed;
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            empty = self.empty,
            rows_written = self.rows_written,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );
    }

    /// 실패로 중단된 실행의 통계 로그 출력
    pub fn log_aborted(&self, operation: &str, failed_item: &str) {
        tracing::warn!(
            operation = operation,
            failed_item = failed_item,
            total = self.total,
            success = self.success,
            errors = self.errors,
            empty = self.empty,
            rows_written = self.rows_written,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 중단"
        );
    }
}
