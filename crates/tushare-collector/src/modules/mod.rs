//! 동기화 모듈.

pub mod cursor;
pub mod orchestrator;
pub mod work_item;

pub use cursor::{global_cursor, SyncCursor};
pub use orchestrator::{
    plan_backfill, plan_daily, plan_gap_items, GapFillPlan, SyncOrchestrator, DEFAULT_PARALLELISM,
};
pub use work_item::{Feed, Span, Target, WorkItem};
