use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// リマインダー対象のアイテム種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// 特典
    Benefit,
    /// サブスクリプション
    Subscription,
    /// クーポン
    Coupon,
}

impl ItemKind {
    /// ログ出力用の文字列表現を取得
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Benefit => "benefit",
            ItemKind::Subscription => "subscription",
            ItemKind::Coupon => "coupon",
        }
    }
}

/// 外部の通知スケジューラに渡すリマインダー要求
///
/// このコアは通知を配信しない。要求の生成までが責務で、
/// 実際のスケジュールと配信は外部のスケジューラが行う。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRequest {
    /// 対象アイテムの種別
    pub kind: ItemKind,
    /// 対象アイテムのID
    pub item_id: i64,
    /// 通知に表示するタイトル
    pub title: String,
    /// 通知を発火する日
    pub fire_on: NaiveDate,
    /// このリマインダーを識別するハンドル
    pub reminder_id: String,
}
