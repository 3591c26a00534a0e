//! Provider 응답 레코드 배치.
//!
//! Tushare는 `fields` 목록과 위치 기반 `items` 행을 반환합니다. 필드 순서는
//! 호출마다 달라질 수 있으므로 항상 응답의 `fields`를 기준으로 스키마 컬럼과
//! 짝지어 디코딩합니다.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{DataError, Result};
use crate::schema::{ColumnDef, ColumnKind, TableSchema};

/// Wire 날짜 형식 (YYYYMMDD).
pub const TS_DATE_FORMAT: &str = "%Y%m%d";

/// 날짜를 Tushare 형식 문자열로 변환.
pub fn format_ts_date(date: NaiveDate) -> String {
    date.format(TS_DATE_FORMAT).to_string()
}

/// Tushare 형식 문자열을 날짜로 변환.
pub fn parse_ts_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, TS_DATE_FORMAT)
        .map_err(|e| DataError::Decode(format!("invalid date '{}': {}", value, e)))
}

/// 타입이 결정된 단일 값.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Numeric(Decimal),
    Date(NaiveDate),
}

impl FieldValue {
    /// JSON 스칼라를 컬럼 타입에 맞게 디코딩.
    pub fn decode(column: &ColumnDef, raw: &Value) -> Result<Self> {
        let invalid = || {
            DataError::Decode(format!(
                "column '{}' expects {:?}, got {}",
                column.name, column.kind, raw
            ))
        };

        match (column.kind, raw) {
            (_, Value::Null) => Ok(FieldValue::Null),
            (ColumnKind::Text, Value::String(s)) => Ok(FieldValue::Text(s.clone())),
            (ColumnKind::Text, Value::Number(n)) => Ok(FieldValue::Text(n.to_string())),
            (ColumnKind::Numeric, Value::Number(n)) => parse_decimal(&n.to_string())
                .map(FieldValue::Numeric)
                .ok_or_else(invalid),
            (ColumnKind::Numeric, Value::String(s)) => parse_decimal(s)
                .map(FieldValue::Numeric)
                .ok_or_else(invalid),
            (ColumnKind::Date, Value::String(s)) if s.is_empty() => Ok(FieldValue::Null),
            (ColumnKind::Date, Value::String(s)) => parse_ts_date(s).map(FieldValue::Date),
            (ColumnKind::Date, Value::Number(n)) => parse_ts_date(&n.to_string()).map(FieldValue::Date),
            _ => Err(invalid()),
        }
    }

    /// 컬럼 타입과 일치하는 값인지 여부 (`Null`은 항상 일치).
    pub fn matches(&self, kind: ColumnKind) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Null, _)
                | (FieldValue::Text(_), ColumnKind::Text)
                | (FieldValue::Numeric(_), ColumnKind::Numeric)
                | (FieldValue::Date(_), ColumnKind::Date)
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Numeric(d) => Some(*d),
            _ => None,
        }
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// 필드 목록과 짝지어진 한 행.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [&'static ColumnDef],
    values: &'a [FieldValue],
}

impl<'a> Record<'a> {
    /// 필드 이름으로 값 조회.
    pub fn get(&self, name: &str) -> Option<&'a FieldValue> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|idx| &self.values[idx])
    }
}

/// 동일 스키마 레코드 묶음.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    schema: &'static TableSchema,
    columns: Vec<&'static ColumnDef>,
    rows: Vec<Vec<FieldValue>>,
    has_more: bool,
}

impl RecordBatch {
    /// Provider 응답(`fields`, `items`)을 스키마 기준으로 디코딩.
    ///
    /// 스키마에 없는 필드, 중복 필드, 누락된 키 필드, 길이가 다른 행은 거부합니다.
    pub fn decode(
        schema: &'static TableSchema,
        fields: &[String],
        items: &[Vec<Value>],
        has_more: bool,
    ) -> Result<Self> {
        let columns = resolve_columns(schema, fields)?;

        let rows = items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                if item.len() != columns.len() {
                    return Err(DataError::SchemaMismatch {
                        table: schema.table,
                        reason: format!(
                            "row {} has {} values for {} fields",
                            idx,
                            item.len(),
                            columns.len()
                        ),
                    });
                }
                columns
                    .iter()
                    .zip(item)
                    .map(|(column, raw)| FieldValue::decode(column, raw))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema,
            columns,
            rows,
            has_more,
        })
    }

    /// 이미 타입이 정해진 행으로 배치 생성.
    pub fn from_rows(
        schema: &'static TableSchema,
        fields: &[&str],
        rows: Vec<Vec<FieldValue>>,
    ) -> Result<Self> {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let columns = resolve_columns(schema, &fields)?;

        if let Some(idx) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(DataError::SchemaMismatch {
                table: schema.table,
                reason: format!("row {} does not match field count {}", idx, columns.len()),
            });
        }
        for row in &rows {
            if let Some((column, _)) = columns
                .iter()
                .zip(row)
                .find(|(column, value)| !value.matches(column.kind))
            {
                return Err(DataError::SchemaMismatch {
                    table: schema.table,
                    reason: format!("value type mismatch for '{}'", column.name),
                });
            }
        }

        Ok(Self {
            schema,
            columns,
            rows,
            has_more: false,
        })
    }

    /// 빈 배치 (스키마 전체 컬럼).
    pub fn empty(schema: &'static TableSchema) -> Self {
        Self {
            schema,
            columns: schema.columns.iter().collect(),
            rows: Vec::new(),
            has_more: false,
        }
    }

    pub fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    /// 응답 순서의 컬럼 목록.
    pub fn columns(&self) -> &[&'static ColumnDef] {
        &self.columns
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Provider가 추가 페이지가 있다고 알렸는지 여부.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// 필드 이름과 짝지어진 행 순회.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        self.rows.iter().map(move |values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// 다음 페이지를 이어 붙임.
    ///
    /// 페이지마다 필드 순서가 다를 수 있으므로 이름 기준으로 재정렬합니다.
    /// 필드 집합이 다르면 거부합니다.
    pub fn append(&mut self, page: RecordBatch) -> Result<()> {
        if page.schema != self.schema {
            return Err(DataError::SchemaMismatch {
                table: self.schema.table,
                reason: format!("cannot append page of {}", page.schema.table),
            });
        }
        if page.columns.len() != self.columns.len() {
            return Err(DataError::SchemaMismatch {
                table: self.schema.table,
                reason: "page field set differs from first page".to_string(),
            });
        }

        let mapping = self
            .columns
            .iter()
            .map(|column| {
                page.columns
                    .iter()
                    .position(|c| c.name == column.name)
                    .ok_or_else(|| DataError::SchemaMismatch {
                        table: self.schema.table,
                        reason: format!("page is missing field '{}'", column.name),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        self.rows.extend(
            page.rows
                .into_iter()
                .map(|row| mapping.iter().map(|&idx| row[idx].clone()).collect()),
        );
        self.has_more = page.has_more;
        Ok(())
    }
}

fn resolve_columns(
    schema: &'static TableSchema,
    fields: &[String],
) -> Result<Vec<&'static ColumnDef>> {
    let mut columns: Vec<&'static ColumnDef> = Vec::with_capacity(fields.len());

    for field in fields {
        let column = schema
            .column(field)
            .ok_or_else(|| DataError::SchemaMismatch {
                table: schema.table,
                reason: format!("unknown field '{}'", field),
            })?;
        if columns.iter().any(|c| c.name == column.name) {
            return Err(DataError::SchemaMismatch {
                table: schema.table,
                reason: format!("duplicate field '{}'", field),
            });
        }
        columns.push(column);
    }

    if let Some(missing) = schema
        .key
        .iter()
        .find(|key| !columns.iter().any(|c| c.name == **key))
    {
        return Err(DataError::SchemaMismatch {
            table: schema.table,
            reason: format!("missing key field '{}'", missing),
        });
    }

    Ok(columns)
}
