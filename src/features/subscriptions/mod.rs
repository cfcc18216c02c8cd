/// サブスクリプション機能モジュール
///
/// このモジュールは、サブスクリプション管理に関連するすべての機能を提供します：
/// - サブスクリプションの作成、読み取り、更新、削除
/// - 解約と再開（更新日は保持される）
/// - 更新日を過ぎたサブスクリプションの定期スイープ
/// - 月額換算の合計金額の計算
pub mod models;
pub mod repository;

// 公開インターフェース
pub use models::{CreateSubscriptionDto, Subscription, UpdateSubscriptionDto};

pub use repository::{
    calculate_monthly_total, cancel, create, delete, find_all, find_by_id, find_due_within,
    reactivate, record_reminder_scheduled, snooze, sweep_renewals, update,
};
