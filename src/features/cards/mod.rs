/// カード機能モジュール
///
/// このモジュールは、クレジットカード管理に関連する機能を提供します：
/// - カードの作成、読み取り、更新、削除
/// - カード削除時の特典スナップショットの維持
pub mod models;
pub mod repository;

// 公開インターフェース
pub use models::{CreateCardDto, UpdateCardDto, UserCard};

pub use repository::{create, delete, find_all, find_by_id, update};
