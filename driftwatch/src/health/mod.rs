//! ヘルスチェック
//!
//! 基準時刻の取得、ターゲットへのHTTPプローブ、時刻ずれの判定、
//! および定期実行スケジューラー

/// 判定ロジック
pub mod evaluator;
/// ターゲットへのHTTPプローブ
pub mod probe;
/// 基準時刻の取得
pub mod reference_time;
/// 監視スケジューラー
pub mod scheduler;
/// ステータスページ出力
pub mod status_page;

pub use evaluator::{drift_seconds, evaluate};
pub use probe::{HttpProbe, ProbeResponse, ReqwestProbe};
pub use reference_time::{acquire_reference_time, Clock, SystemClock, TimeSource, WorldTimeSource};
pub use scheduler::{CheckScheduler, CycleReport, SchedulerState};
pub use status_page::StatusPageWriter;
