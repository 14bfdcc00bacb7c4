//! # leafguard-network
//!
//! 네트워크 경계를 넘는 어댑터.
//!
//! - [`plant_id`] — plant.id 건강 진단 API 판별 백엔드
//! - [`gemini`] — Gemini 멀티모달 모델 판별 백엔드
//! - [`slave_client`] — master → slave `/sprinkle` 원격 구동 드라이버

mod http;

pub mod gemini;
pub mod plant_id;
pub mod slave_client;
