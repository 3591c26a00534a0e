//! 배치 upsert writer.
//!
//! 하나의 `RecordBatch`를 자연 키 기준 upsert로 저장합니다.
//!
//! - 행은 청크(기본 1000행)로 나뉘며, PostgreSQL 바인드 파라미터 한도(65535)를
//!   넘지 않도록 컬럼 수에 따라 청크 크기가 줄어듭니다
//! - 한 배치의 모든 청크는 하나의 트랜잭션에서 실행됩니다 (전부 커밋 또는 전부 롤백)
//! - 충돌 시 키가 아닌 모든 컬럼을 새 값으로 덮어씁니다 (last-write-wins)
//! - 쓰는 컬럼은 정확히 배치의 필드 목록입니다

use std::ops::Range;

use sqlx::query_builder::Separated;
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, instrument, warn};

use super::database::Database;
use crate::error::{DataError, Result};
use crate::record::{FieldValue, RecordBatch};
use crate::schema::{ColumnDef, ColumnKind, TableSchema};

/// 기본 청크 크기 (행).
pub const DEFAULT_UPSERT_CHUNK_SIZE: usize = 1000;

/// PostgreSQL 단일 문장 최대 바인드 파라미터 수.
const PG_MAX_BIND_PARAMS: usize = 65_535;

/// 배치 upsert writer.
#[derive(Clone)]
pub struct BatchUpsertWriter {
    db: Database,
    chunk_size: usize,
}

impl BatchUpsertWriter {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            chunk_size: DEFAULT_UPSERT_CHUNK_SIZE,
        }
    }

    /// 청크 크기 변경 (최소 1).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// 배치를 하나의 트랜잭션으로 upsert.
    ///
    /// 빈 배치는 아무 작업도 하지 않습니다. 청크 하나라도 실패하면 전체를
    /// 롤백하고 `DataError::WriteError`를 반환합니다.
    #[instrument(skip(self, batch), fields(table = batch.schema().table, rows = batch.len()))]
    pub async fn upsert(&self, batch: &RecordBatch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let schema = batch.schema();
        if !schema.is_persisted() {
            return Err(DataError::SchemaMismatch {
                table: schema.table,
                reason: "schema has no natural key and cannot be persisted".to_string(),
            });
        }

        let chunks = plan_chunks(batch.len(), batch.columns().len(), self.chunk_size);
        let mut tx = self.db.pool().begin().await?;
        let mut affected = 0u64;

        for (idx, range) in chunks.iter().enumerate() {
            let mut builder = build_upsert(schema, batch.columns(), &batch.rows()[range.clone()]);
            match builder.build().execute(&mut *tx).await {
                Ok(result) => affected += result.rows_affected(),
                Err(e) => {
                    warn!(
                        table = schema.table,
                        chunk = idx,
                        chunks = chunks.len(),
                        error = %e,
                        "upsert 청크 실패, 트랜잭션 롤백"
                    );
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "롤백 실패 (연결 반환 시 폐기됨)");
                    }
                    return Err(chunk_failure(schema.table, idx, chunks.len(), &e));
                }
            }
        }

        tx.commit().await?;

        debug!(
            table = schema.table,
            chunks = chunks.len(),
            affected,
            "배치 upsert 커밋"
        );

        Ok(affected)
    }
}

/// 실패한 청크 위치(1부터)를 담은 쓰기 오류.
fn chunk_failure(table: &str, idx: usize, chunks: usize, err: &sqlx::Error) -> DataError {
    DataError::WriteError(format!("{} chunk {}/{} failed: {}", table, idx + 1, chunks, err))
}

/// 행 수와 컬럼 수로 청크 구간 계산.
pub fn plan_chunks(row_count: usize, column_count: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let max_rows_by_params = PG_MAX_BIND_PARAMS / column_count.max(1);
    let size = chunk_size.min(max_rows_by_params).max(1);

    (0..row_count)
        .step_by(size)
        .map(|start| start..(start + size).min(row_count))
        .collect()
}

/// `INSERT ... VALUES ... ON CONFLICT` 문 생성.
///
/// 테이블/컬럼 식별자는 정적 스키마에서만 가져오고, 값은 모두 바인드합니다.
pub fn build_upsert(
    schema: &TableSchema,
    columns: &[&'static ColumnDef],
    rows: &[Vec<FieldValue>],
) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new("INSERT INTO ");
    builder.push(schema.table).push(" (");
    {
        let mut names = builder.separated(", ");
        for column in columns {
            names.push(column.name);
        }
        names.push_unseparated(") ");
    }

    builder.push_values(rows, |mut tuple, row| {
        for (column, value) in columns.iter().zip(row) {
            bind_value(&mut tuple, column.kind, value);
        }
    });

    builder.push(" ON CONFLICT (");
    builder.push(schema.key.join(", "));
    builder.push(") ");

    let updates: Vec<&str> = columns
        .iter()
        .map(|c| c.name)
        .filter(|name| !schema.is_key(name))
        .collect();

    if updates.is_empty() {
        builder.push("DO NOTHING");
    } else {
        builder.push("DO UPDATE SET ");
        let mut assignments = builder.separated(", ");
        for name in updates {
            assignments.push(format!("{0} = EXCLUDED.{0}", name));
        }
    }

    builder
}

fn bind_value(
    tuple: &mut Separated<'_, 'static, Postgres, &'static str>,
    kind: ColumnKind,
    value: &FieldValue,
) {
    match kind {
        ColumnKind::Text => tuple.push_bind(value.as_text().map(str::to_owned)),
        ColumnKind::Numeric => tuple.push_bind(value.as_decimal()),
        ColumnKind::Date => tuple.push_bind(value.as_date()),
    };
}
