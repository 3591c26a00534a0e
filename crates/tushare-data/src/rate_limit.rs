//! Provider 호출 rate governor.
//!
//! Token Bucket 알고리즘으로 외부 호출을 `capacity`회 / `interval`로 제한합니다.
//!
//! # 동작 방식
//!
//! 1. `execute()`는 작업을 채널(FIFO 큐)에 넣고 결과를 기다립니다
//! 2. 전용 소비자 태스크 하나가 큐에서 작업을 꺼냅니다
//! 3. 토큰이 있으면 1개 소비 후 작업을 끝까지 실행합니다
//! 4. 토큰이 없으면 `interval / capacity` 만큼 대기 후 다시 리필을 확인합니다
//!
//! 소비자 태스크는 한 번에 하나의 작업만 실행하므로 호출 순서는 제출 순서와 같습니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use tushare_data::rate_limit::{RateGovernor, RateLimitConfig};
//!
//! let governor = RateGovernor::new(RateLimitConfig::default())?;
//! let body = governor.execute(move || async move { client.send(request).await }).await??;
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{DataError, Result};

/// Rate governor 설정.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// interval 당 최대 허용 호출 수
    pub capacity: u32,
    /// 토큰 리필 기준 구간
    pub interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // Tushare Pro 기본 권한: 분당 200회
        Self {
            capacity: 200,
            interval: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// 새 설정 생성.
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self { capacity, interval }
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(DataError::InvalidConfig(
                "rate limit capacity must be greater than zero".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(DataError::InvalidConfig(
                "rate limit interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Token Bucket 상태.
///
/// 소비자 태스크만 소유하고 변경합니다.
#[derive(Debug)]
pub struct TokenBucket {
    /// 현재 토큰 수 (`0..=capacity`)
    tokens: f64,
    /// 최대 토큰 수
    capacity: u32,
    /// 리필 구간
    interval: Duration,
    /// 마지막 리필 시간
    last_refill: Instant,
}

impl TokenBucket {
    /// 가득 찬 버킷 생성.
    pub fn new(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: f64::from(config.capacity),
            capacity: config.capacity,
            interval: config.interval,
            last_refill: now,
        }
    }

    /// 현재 토큰 수.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// 경과 시간에 비례해 토큰 리필.
    ///
    /// `floor(elapsed * capacity / interval)`개를 더하고 `capacity`에서 자릅니다.
    /// 시계가 역행하면 경과 시간은 0입니다. 정수 토큰이 하나 이상 추가될 때만
    /// 기준 시각을 옮기므로 짧은 대기가 반복되어도 경과 시간이 버려지지 않습니다.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let to_add =
            elapsed.as_nanos() * u128::from(self.capacity) / self.interval.as_nanos();
        if to_add == 0 {
            return;
        }

        let capacity = f64::from(self.capacity);
        self.tokens = (self.tokens + to_add.min(u128::from(self.capacity)) as f64).min(capacity);
        self.last_refill = now;
    }

    /// 토큰 1개 소비 시도.
    pub fn try_acquire(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// 토큰 1개가 리필되는 주기 (`interval / capacity`).
    pub fn refill_period(&self) -> Duration {
        self.interval / self.capacity
    }
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// 전역 호출 수를 제한하는 rate governor.
///
/// 복제된 핸들은 모두 같은 큐와 버킷을 공유합니다. 마지막 핸들이 drop되고
/// 큐가 비면 소비자 태스크도 종료됩니다.
#[derive(Clone)]
pub struct RateGovernor {
    sender: mpsc::UnboundedSender<Job>,
    config: RateLimitConfig,
}

impl std::fmt::Debug for RateGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGovernor")
            .field("capacity", &self.config.capacity)
            .field("interval", &self.config.interval)
            .finish()
    }
}

impl RateGovernor {
    /// 새 governor 생성 및 소비자 태스크 시작.
    ///
    /// tokio 런타임 안에서 호출해야 합니다. `capacity` 또는 `interval`이 0이면
    /// `DataError::InvalidConfig`를 반환합니다.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let bucket = TokenBucket::new(&config, Instant::now());
        tokio::spawn(run_consumer(receiver, bucket));

        debug!(
            capacity = config.capacity,
            interval_ms = config.interval.as_millis() as u64,
            "Rate governor 시작"
        );

        Ok(Self { sender, config })
    }

    /// 작업을 큐에 넣고 허용 순서가 되면 실행하여 결과를 반환.
    ///
    /// 작업이 반환한 값(`Result` 포함)은 그대로 호출자에게 전달됩니다.
    /// 작업이 panic하면 해당 호출자만 `DataError::TaskPanicked`를 받고
    /// 나머지 큐는 계속 처리됩니다.
    pub async fn execute<F, Fut, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            async move {
                let outcome = AssertUnwindSafe(async move { task().await })
                    .catch_unwind()
                    .await;
                // 호출자가 이미 포기했으면 결과는 버림
                let _ = result_tx.send(outcome);
            }
            .boxed()
        });

        self.sender
            .send(job)
            .map_err(|_| DataError::GovernorClosed)?;

        match result_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(DataError::TaskPanicked),
            Err(_) => Err(DataError::GovernorClosed),
        }
    }
}

/// 단일 소비자 루프.
async fn run_consumer(mut receiver: mpsc::UnboundedReceiver<Job>, mut bucket: TokenBucket) {
    while let Some(job) = receiver.recv().await {
        loop {
            bucket.refill(Instant::now());
            if bucket.try_acquire() {
                break;
            }

            let wait = bucket.refill_period();
            trace!(wait_ms = wait.as_millis() as u64, "토큰 소진, 리필 대기");
            tokio::time::sleep(wait).await;
        }

        trace!(tokens = bucket.tokens(), "작업 실행");
        job().await;
    }

    debug!("Rate governor 소비자 종료 (모든 핸들 drop)");
}
