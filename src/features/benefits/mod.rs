/// 特典機能モジュール
///
/// このモジュールは、カード特典の管理に関連するすべての機能を提供します：
/// - 特典の作成、読み取り、更新、削除
/// - 使用済み・取り消し・期限切れ・期間リセットの各ライフサイクル操作
/// - 期限切れと期間リセットの定期スイープ
/// - 利用履歴（スナップショット付き）と金額集計
pub mod models;
pub mod repository;

// 公開インターフェース
pub use models::{Benefit, BenefitUsage, CreateBenefitDto, UpdateBenefitDto, ValueTotals};

pub use repository::{
    create, delete, expire_overdue, find_all, find_all_usages, find_by_id, find_usages,
    mark_used, record_reminder_scheduled, reset_period, snooze, sweep_resets, undo_mark_used,
    update, value_totals,
};
