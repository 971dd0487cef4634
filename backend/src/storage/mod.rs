pub mod emotion_log;
pub mod paths;
