//! 로컬 판별 백엔드.
//!
//! 원격 백엔드(plant.id, Gemini)는 `leafguard-network`에 있다.

mod mock;
mod tflite;

pub use mock::{MockDetector, MOCK_LABELS};
pub use tflite::TfliteDetector;
