//! # leafguard-actuator
//!
//! 분무기 하드웨어 구동.
//!
//! - [`driver`] — `SprayerDriver` 구현 (sysfs GPIO, 시뮬레이션) + 생성 시점 기능 확인 팩토리
//! - [`controller`] — 분무기 단일 소유자. 모든 구동 요청을 직렬화하는 `Actuator` 구현

pub mod controller;
pub mod driver;
