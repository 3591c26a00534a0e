//! Gap-fill 커서 계산.
//!
//! 종목별 커서는 저장된 최신 거래일(또는 상장일)에서 파생되며 저장하지 않습니다.
//! 전역 커서는 모든 종목 커서의 최솟값이며, 그 다음 날부터(저장된 데이터가 없으면
//! 상장일부터) 오늘까지가 gap-fill 구간입니다.
//!
//! 상장폐지 종목에 저장된 행이 하나라도 있으면 완전히 동기화된 것으로 보고
//! `Closed`로 취급해 최솟값 계산에서 제외합니다. 상장폐지일이 나중에 정정되면
//! 실제 누락 구간이 가려질 수 있는 휴리스틱입니다.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;
use tushare_data::Instrument;

/// 종목별 동기화 커서.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCursor {
    /// 최신 저장 거래일
    Persisted(NaiveDate),
    /// 저장된 데이터 없음 (상장일)
    Listed(NaiveDate),
    /// 동기화 완료된 상장폐지 종목 (모든 실제 날짜보다 뒤)
    Closed,
}

impl SyncCursor {
    /// 종목과 저장된 최신 거래일로 커서 계산.
    pub fn for_instrument(instrument: &Instrument, latest: Option<NaiveDate>) -> Self {
        match latest {
            Some(_) if instrument.is_delisted() => SyncCursor::Closed,
            Some(date) => SyncCursor::Persisted(date),
            None => SyncCursor::Listed(instrument.list_date),
        }
    }

    /// 아직 저장되지 않은 첫 날짜.
    pub fn first_missing(&self) -> Option<NaiveDate> {
        match self {
            SyncCursor::Persisted(date) => date.succ_opt(),
            SyncCursor::Listed(date) => Some(*date),
            SyncCursor::Closed => None,
        }
    }

    fn sort_key(&self) -> (bool, Option<NaiveDate>, u8) {
        match self {
            SyncCursor::Listed(_) => (false, self.first_missing(), 0),
            SyncCursor::Persisted(_) => (false, self.first_missing(), 1),
            SyncCursor::Closed => (true, None, 2),
        }
    }
}

impl Ord for SyncCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for SyncCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 전역 커서 (모든 종목 커서의 최솟값). 종목이 없으면 `None`.
pub fn global_cursor(
    instruments: &[Instrument],
    latest: &HashMap<String, NaiveDate>,
) -> Option<SyncCursor> {
    instruments
        .iter()
        .map(|inst| SyncCursor::for_instrument(inst, latest.get(&inst.ts_code).copied()))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tushare_data::ListStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn instrument(code: &str, status: ListStatus, list_date: NaiveDate) -> Instrument {
        Instrument {
            ts_code: code.to_string(),
            list_status: status,
            list_date,
            delist_date: None,
        }
    }

    #[test]
    fn test_cursor_is_earliest_listing_date_without_rows() {
        let a1 = date(2020, 3, 2);
        let a2 = date(2021, 6, 1);
        let instruments = vec![
            instrument("000002.SZ", ListStatus::Listed, a2),
            instrument("000001.SZ", ListStatus::Listed, a1),
        ];

        let cursor = global_cursor(&instruments, &HashMap::new()).unwrap();
        assert_eq!(cursor, SyncCursor::Listed(a1));
        assert_eq!(cursor.first_missing(), Some(a1));
    }

    #[test]
    fn test_delisted_synced_instrument_does_not_block() {
        let mut delisted = instrument("600001.SH", ListStatus::Delisted, date(1998, 1, 5));
        delisted.delist_date = Some(date(2009, 12, 29));
        let active = instrument("000001.SZ", ListStatus::Listed, date(1991, 4, 3));

        let latest = HashMap::from([
            ("600001.SH".to_string(), date(2009, 12, 28)),
            ("000001.SZ".to_string(), date(2024, 5, 10)),
        ]);

        let cursor = global_cursor(&[delisted.clone(), active], &latest).unwrap();
        assert_eq!(cursor, SyncCursor::Persisted(date(2024, 5, 10)));
        assert_eq!(cursor.first_missing(), Some(date(2024, 5, 11)));

        assert_eq!(
            SyncCursor::for_instrument(&delisted, Some(date(2009, 12, 28))),
            SyncCursor::Closed
        );
    }

    #[test]
    fn test_delisted_without_rows_still_counts() {
        let delisted = instrument("600001.SH", ListStatus::Delisted, date(1998, 1, 5));
        assert_eq!(
            SyncCursor::for_instrument(&delisted, None),
            SyncCursor::Listed(date(1998, 1, 5))
        );
    }

    #[test]
    fn test_closed_sorts_after_every_date() {
        assert!(SyncCursor::Closed > SyncCursor::Persisted(NaiveDate::MAX.pred_opt().unwrap()));
        assert!(SyncCursor::Listed(date(2020, 1, 1)) < SyncCursor::Persisted(date(2020, 1, 1)));
        assert_eq!(SyncCursor::Closed.first_missing(), None);
    }

    #[test]
    fn test_all_closed_has_no_start() {
        let delisted = instrument("600001.SH", ListStatus::Delisted, date(1998, 1, 5));
        let latest = HashMap::from([("600001.SH".to_string(), date(2009, 12, 28))]);
        let cursor = global_cursor(&[delisted], &latest).unwrap();
        assert_eq!(cursor.first_missing(), None);
        assert!(global_cursor(&[], &latest).is_none());
    }
}
