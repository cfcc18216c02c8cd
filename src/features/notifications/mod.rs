/// 通知計画機能モジュール
///
/// このモジュールは、リマインダー通知の計画に関連する機能を提供します：
/// - 本日発火すべきリマインダー要求の導出
/// - リマインダーハンドルの発行
///
/// 通知の実際のスケジュールと配信は外部のスケジューラの責務であり、
/// このモジュールは計画（どのアイテムに、いつ、何を通知するか）のみを扱います。
pub mod models;
pub mod service;

// 公開インターフェース
pub use models::{ItemKind, ReminderRequest};

pub use service::plan_reminders;
