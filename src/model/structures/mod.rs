pub mod game_result;
pub mod period_policy;
pub mod system_kind;
