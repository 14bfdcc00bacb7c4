//! # leafguard-storage
//!
//! 추가 전용 실행 기록 저장소.
//! SQLite(WAL + synchronous=FULL)에 `RunRecord`를 JSON 페이로드로 기록한다.

pub mod migration;
pub mod sqlite;

pub use sqlite::SqliteRunLog;
