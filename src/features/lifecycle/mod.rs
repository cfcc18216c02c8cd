/// ライフサイクルエンジンモジュール
///
/// このモジュールは、特典・サブスクリプション・クーポンに共通する
/// ライフサイクル規則を純粋関数として提供します：
/// - 残り日数と緊急度の導出
/// - 状態遷移の可否判定
/// - 繰り返し周期に基づく次期間の計算
///
/// このモジュールはI/Oを一切行いません。基準日は常に呼び出し側が
/// 明示的に渡し、同じ入力には常に同じ結果を返します。
pub mod models;
pub mod period;
pub mod transitions;
pub mod urgency;

// 公開インターフェース
pub use models::{Frequency, ItemStatus, PeriodWindow, UrgencyTier};

pub use period::{advance, initial_window};

pub use transitions::{next_status, validate_snooze, Operation};

pub use urgency::{classify, classify_days, days_remaining, days_remaining_display};
