//! # leafguard-pipeline
//!
//! 캡처 → 판별 → 판정 → 구동 → 기록을 하나의 실행 단위로 묶는 오케스트레이터.

pub mod orchestrator;

pub use orchestrator::{PipelineOrchestrator, StageTimeouts};
