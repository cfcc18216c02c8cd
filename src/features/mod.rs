/// 機能別モジュール
///
/// このモジュールは、アプリケーションの機能を機能別に整理したモジュール群を提供します。
/// 各機能モジュールは、その機能に関連するすべてのコード（モデル、データベース操作、
/// ライフサイクル操作）を含む自己完結型のユニットです。
// 機能モジュールの宣言
pub mod benefits;
pub mod cards;
pub mod coupons;
pub mod lifecycle;
pub mod notifications;
pub mod subscriptions;
