use crate::shared::errors::{AppError, AppResult};
use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// 特典・クーポンの状態を表す列挙型
///
/// used / expired は現在の期間に対して終端状態であり、
/// 明示的な取り消しまたは期間リセットでのみ離脱できる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// 利用可能
    Available,
    /// 使用済み（現在の期間では終端）
    Used,
    /// 期限切れ（現在の期間では終端）
    Expired,
}

impl ItemStatus {
    /// データベース格納用の文字列表現を取得
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Used => "used",
            ItemStatus::Expired => "expired",
        }
    }

    /// 文字列表現から状態を復元する
    ///
    /// # 引数
    /// * `s` - 文字列表現（"available" / "used" / "expired"）
    ///
    /// # 戻り値
    /// 状態、または未知の文字列の場合はバリデーションエラー
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "available" => Ok(ItemStatus::Available),
            "used" => Ok(ItemStatus::Used),
            "expired" => Ok(ItemStatus::Expired),
            _ => Err(AppError::validation(format!("未知の状態です: {s}"))),
        }
    }

    /// 現在の期間に対する終端状態かどうか
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Used | ItemStatus::Expired)
    }
}

impl ToSql for ItemStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ItemStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ItemStatus::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// 繰り返し周期を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// 毎月
    Monthly,
    /// 四半期ごと
    Quarterly,
    /// 半年ごと
    Semiannual,
    /// 毎年
    Annual,
    /// 繰り返しなし（一回限り）
    OneTime,
}

impl Frequency {
    /// データベース格納用の文字列表現を取得
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Semiannual => "semiannual",
            Frequency::Annual => "annual",
            Frequency::OneTime => "one_time",
        }
    }

    /// 文字列表現から周期を復元する
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "semiannual" => Ok(Frequency::Semiannual),
            "annual" => Ok(Frequency::Annual),
            "one_time" => Ok(Frequency::OneTime),
            _ => Err(AppError::validation(format!("未知の周期です: {s}"))),
        }
    }

    /// 周期に対応する月数を取得
    ///
    /// # 戻り値
    /// 繰り返し周期の場合は月数、一回限りの場合はNone
    pub fn months(&self) -> Option<u32> {
        match self {
            Frequency::Monthly => Some(1),
            Frequency::Quarterly => Some(3),
            Frequency::Semiannual => Some(6),
            Frequency::Annual => Some(12),
            Frequency::OneTime => None,
        }
    }

    /// 繰り返し周期かどうか
    pub fn is_recurring(&self) -> bool {
        self.months().is_some()
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Frequency::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// 緊急度の分類
///
/// 残り日数から導出される表示・ソート・フィルタ用の区分。
/// 導出値であり、永続化されることはない。
/// 並び順は緊急度の高い順（PastDueが最小）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    /// 期限超過
    PastDue,
    /// 本日期限
    DueToday,
    /// 緊急（残り1〜3日）
    Urgent,
    /// まもなく期限（残り4〜7日）
    ExpiringSoon,
    /// 余裕あり（残り8日以上）
    Safe,
}

/// 期間ウィンドウ
///
/// 繰り返しアイテムの現在の期間（開始日・終了日）と次回リセット日。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    /// 期間開始日
    pub start: NaiveDate,
    /// 期間終了日
    pub end: NaiveDate,
    /// 次回リセット日
    pub next_reset: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_status_roundtrip() {
        // 文字列表現との往復をテスト
        for status in [ItemStatus::Available, ItemStatus::Used, ItemStatus::Expired] {
            assert_eq!(ItemStatus::parse(status.as_str()).unwrap(), status);
        }

        // 未知の文字列はエラー
        assert!(ItemStatus::parse("cancelled").is_err());
    }

    #[test]
    fn test_item_status_terminal() {
        assert!(!ItemStatus::Available.is_terminal());
        assert!(ItemStatus::Used.is_terminal());
        assert!(ItemStatus::Expired.is_terminal());
    }

    #[test]
    fn test_frequency_months() {
        assert_eq!(Frequency::Monthly.months(), Some(1));
        assert_eq!(Frequency::Quarterly.months(), Some(3));
        assert_eq!(Frequency::Semiannual.months(), Some(6));
        assert_eq!(Frequency::Annual.months(), Some(12));
        assert_eq!(Frequency::OneTime.months(), None);
    }

    #[test]
    fn test_frequency_roundtrip() {
        for freq in [
            Frequency::Monthly,
            Frequency::Quarterly,
            Frequency::Semiannual,
            Frequency::Annual,
            Frequency::OneTime,
        ] {
            assert_eq!(Frequency::parse(freq.as_str()).unwrap(), freq);
        }

        assert!(Frequency::parse("weekly").is_err());
    }

    #[test]
    fn test_urgency_tier_ordering() {
        // 緊急度の高い順に並ぶことを確認
        assert!(UrgencyTier::PastDue < UrgencyTier::DueToday);
        assert!(UrgencyTier::DueToday < UrgencyTier::Urgent);
        assert!(UrgencyTier::Urgent < UrgencyTier::ExpiringSoon);
        assert!(UrgencyTier::ExpiringSoon < UrgencyTier::Safe);
    }
}
