/// クーポン機能モジュール
///
/// このモジュールは、一回限りのクーポン管理に関連する機能を提供します：
/// - クーポンの作成、読み取り、更新、削除
/// - 使用済み・取り消し・期限切れの各ライフサイクル操作
/// - 期限切れの定期スイープと金額集計
pub mod models;
pub mod repository;

// 公開インターフェース
pub use models::{Coupon, CreateCouponDto, UpdateCouponDto};

pub use repository::{
    create, delete, expire_overdue, find_all, find_by_id, mark_used, record_reminder_scheduled,
    snooze, total_available_value, undo_mark_used, update,
};
