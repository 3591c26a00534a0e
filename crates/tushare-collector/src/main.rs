//! Tushare 동기화 CLI.

use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Shanghai;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tushare_collector::modules::SyncOrchestrator;
use tushare_collector::CollectorConfig;
use tushare_data::{
    parse_ts_date, BatchUpsertWriter, Database, PgSyncStore, RateGovernor, TushareClient,
};

#[derive(Parser)]
#[command(name = "tushare-collector")]
#[command(about = "Tushare Pro incremental market data synchronizer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 종목 기본 정보 동기화 (L, D, P)
    SyncSymbols,

    /// 전체 백필 (종목 동기화 → 종목별 전체 이력)
    Backfill,

    /// 단일 거래일 업데이트
    Daily {
        /// 대상 거래일 (YYYYMMDD, 기본: 오늘)
        #[arg(long)]
        date: Option<String>,
    },

    /// 마지막 저장일 이후 누락된 거래일 수집
    GapFill,

    /// 데몬 모드: 주기적으로 종목 동기화 + gap-fill 실행
    Daemon,
}

/// 거래소 기준 오늘 날짜 (Asia/Shanghai).
fn exchange_today() -> NaiveDate {
    Utc::now().with_timezone(&Shanghai).date_naive()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "tushare_collector={0},tushare_data={0}",
                    cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Tushare Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(tushare = ?config.tushare, sync = ?config.sync, "설정 로드 완료");

    // DB 연결
    let db = Database::connect(&config.database).await?;
    db.health_check().await?;

    let result = run(cli.command, &config, &db).await;

    db.close().await;
    tracing::info!("Tushare Collector 종료");

    result
}

async fn run(command: Commands, config: &CollectorConfig, db: &Database) -> anyhow::Result<()> {
    let writer =
        BatchUpsertWriter::new(db.clone()).with_chunk_size(config.sync.upsert_chunk_size);
    let store = Arc::new(PgSyncStore::new(db.clone(), writer));

    let governor = RateGovernor::new(config.tushare.rate_limit())?;
    let client = TushareClient::with_http(
        config.tushare.token.clone(),
        config.tushare.api_url.clone(),
        config.tushare.timeout(),
        governor,
    )?;

    let orchestrator = SyncOrchestrator::new(Arc::new(client), store)
        .with_parallelism(config.sync.parallelism);

    match command {
        Commands::SyncSymbols => {
            let stats = orchestrator.sync_reference().await?;
            stats.log_summary("종목 동기화");
        }
        Commands::Backfill => {
            let stats = orchestrator.full_backfill(exchange_today()).await?;
            stats.log_summary("전체 백필");
        }
        Commands::Daily { date } => {
            let day = match date {
                Some(s) => parse_ts_date(&s).context("--date 형식은 YYYYMMDD")?,
                None => exchange_today(),
            };
            let stats = orchestrator.daily_update(day).await?;
            stats.log_summary("일별 업데이트");
        }
        Commands::GapFill => {
            let stats = orchestrator.gap_fill(exchange_today()).await?;
            stats.log_summary("Gap-fill");
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.daemon.interval_minutes
            );

            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        tracing::info!("=== 워크플로우 실행 시작 ===");

                        // 1. 종목 동기화
                        match orchestrator.sync_reference().await {
                            Ok(stats) => stats.log_summary("종목 동기화"),
                            Err(e) => tracing::error!("종목 동기화 실패: {}", e),
                        }

                        // 2. Gap-fill
                        match orchestrator.gap_fill(exchange_today()).await {
                            Ok(stats) => stats.log_summary("Gap-fill"),
                            Err(e) => tracing::error!("Gap-fill 실패: {}", e),
                        }

                        tracing::info!(
                            "=== 워크플로우 완료, 다음 실행: {}분 후 ===",
                            config.daemon.interval_minutes
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
