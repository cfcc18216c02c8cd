/// アプリケーション初期化関連のモジュール
pub mod initialization;

/// アプリケーション設定（シングルトン）のモジュール
pub mod preferences;

// 便利な再エクスポート
pub use initialization::{
    initialize_application, initialize_logging_system, log_initialization_complete,
    InitializationResult,
};
pub use preferences::{preferences, AppPreferences};
