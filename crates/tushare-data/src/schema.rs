//! 테이블 스키마 디스크립터.
//!
//! Provider 응답의 필드 목록과 upsert 컬럼은 모두 여기 선언된 정적 스키마로
//! 검증됩니다. SQL에 들어가는 식별자는 항상 이 상수에서 가져옵니다.

/// 컬럼 값 타입.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// 문자열 (`text`)
    Text,
    /// 수치 (`numeric`)
    Numeric,
    /// 날짜 (`date`, wire 형식은 `YYYYMMDD`)
    Date,
}

/// 컬럼 정의.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnKind::Text,
    }
}

const fn numeric(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnKind::Numeric,
    }
}

const fn date(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnKind::Date,
    }
}

/// 엔티티 타입별 스키마.
#[derive(Debug, PartialEq, Eq)]
pub struct TableSchema {
    /// 저장 테이블 이름
    pub table: &'static str,
    /// Tushare API 이름
    pub api_name: &'static str,
    /// 자연 키 (비어 있으면 저장하지 않는 조회 전용 스키마)
    pub key: &'static [&'static str],
    /// 선언 순서의 컬럼 목록
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    /// 이름으로 컬럼 조회.
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        let columns: &'static [ColumnDef] = self.columns;
        columns.iter().find(|c| c.name == name)
    }

    /// 자연 키 컬럼 여부.
    pub fn is_key(&self, name: &str) -> bool {
        self.key.contains(&name)
    }

    /// 테이블에 저장 가능한 스키마인지 여부.
    pub fn is_persisted(&self) -> bool {
        !self.key.is_empty()
    }

    /// API 요청용 전체 필드 목록.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

/// 종목 기본 정보 (`stock_basic`).
pub static STOCK_BASIC: TableSchema = TableSchema {
    table: "stock_basic",
    api_name: "stock_basic",
    key: &["symbol"],
    columns: &[
        text("ts_code"),
        text("symbol"),
        text("name"),
        text("area"),
        text("industry"),
        text("fullname"),
        text("enname"),
        text("cnspell"),
        text("market"),
        text("exchange"),
        text("curr_type"),
        text("list_status"),
        date("list_date"),
        date("delist_date"),
        text("is_hs"),
        text("act_name"),
        text("act_ent_type"),
    ],
};

/// A주 일봉 (`daily`, 미수정 주가).
pub static DAILY: TableSchema = TableSchema {
    table: "daily_md",
    api_name: "daily",
    key: &["ts_code", "trade_date"],
    columns: &[
        text("ts_code"),
        date("trade_date"),
        numeric("open"),
        numeric("high"),
        numeric("low"),
        numeric("close"),
        numeric("pre_close"),
        numeric("change"),
        numeric("pct_chg"),
        numeric("vol"),
        numeric("amount"),
    ],
};

/// 복권 인자 (`adj_factor`).
pub static ADJ_FACTOR: TableSchema = TableSchema {
    table: "adj_factor",
    api_name: "adj_factor",
    key: &["ts_code", "trade_date"],
    columns: &[text("ts_code"), date("trade_date"), numeric("adj_factor")],
};

/// 거래 달력 (`trade_cal`). 조회 전용.
pub static TRADE_CAL: TableSchema = TableSchema {
    table: "trade_cal",
    api_name: "trade_cal",
    key: &[],
    columns: &[
        text("exchange"),
        date("cal_date"),
        text("is_open"),
        date("pretrade_date"),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_keys_are_declared_columns() {
        for schema in [&STOCK_BASIC, &DAILY, &ADJ_FACTOR] {
            assert!(schema.is_persisted());
            for key in schema.key {
                assert!(schema.column(key).is_some(), "{}.{}", schema.table, key);
            }
        }
        assert!(!TRADE_CAL.is_persisted());
    }

    #[test]
    fn test_column_lookup() {
        assert_eq!(DAILY.column("trade_date").map(|c| c.kind), Some(ColumnKind::Date));
        assert_eq!(DAILY.column("close").map(|c| c.kind), Some(ColumnKind::Numeric));
        assert!(DAILY.column("volume").is_none());
        assert!(STOCK_BASIC.is_key("symbol"));
        assert!(!STOCK_BASIC.is_key("ts_code"));
        assert_eq!(STOCK_BASIC.field_names().len(), 17);
    }
}
