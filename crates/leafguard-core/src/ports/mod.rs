//! 포트 인터페이스 (Hexagonal Architecture).
//!
//! 어댑터 crate가 구현하고 파이프라인이 `Arc<dyn Trait>`로 소비한다.

pub mod actuator;
pub mod capture;
pub mod detection;
pub mod run_log;
