//! 도메인 모델.
//!
//! 파이프라인 한 번의 실행 동안 생성/소비되는 데이터 구조체.
//! `RunRecord`만 영구 저장된다.

pub mod actuation;
pub mod capture;
pub mod decision;
pub mod detection;
pub mod run;
