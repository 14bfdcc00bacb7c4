//! # leafguard-core
//!
//! LeafGuard 도메인 모델, 포트(trait) 정의, 에러 타입, 분무 판정 엔진.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 캡처/판별/결정/구동/실행 기록 데이터 구조체
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 애플리케이션 설정 및 시작 시 검증
//! - [`decision`] — 심각도 → 분무 결정 순수 함수

pub mod config;
pub mod decision;
pub mod error;
pub mod models;
pub mod ports;
