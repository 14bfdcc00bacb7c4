//! 합성 잎 이미지 캡처 (개발/테스트용).

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use leafguard_core::error::CoreError;
use leafguard_core::models::capture::{CaptureResult, CaptureSource};
use leafguard_core::ports::capture::CaptureProvider;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::finish_capture;
use crate::store::CaptureStore;

/// 병반 개수 상한
const MAX_SPOTS: u32 = 6;

/// 합성 이미지 소스. 항상 성공한다
pub struct MockCamera {
    width: u32,
    height: u32,
    store: Option<Arc<CaptureStore>>,
    sequence: AtomicU64,
}

impl MockCamera {
    pub fn new(width: u32, height: u32, store: Option<Arc<CaptureStore>>) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            store,
            sequence: AtomicU64::new(0),
        }
    }

    /// 녹색 잎 배경에 갈색 병반을 찍은 JPEG 생성
    ///
    /// 같은 `seed`는 같은 이미지를 만든다.
    pub fn synthesize(&self, seed: u64) -> Result<Vec<u8>, CoreError> {
        let (w, h) = (self.width, self.height);
        let mut img = RgbImage::from_fn(w, h, |x, y| {
            let shade = ((x + y) * 40 / (w + h)) as u8;
            Rgb([40 + shade / 2, 120 + shade, 40])
        });

        let mut rng = StdRng::seed_from_u64(seed);
        let spots = rng.random_range(0..=MAX_SPOTS);
        let max_radius = (w.min(h) / 12).max(2) as i64;
        for _ in 0..spots {
            let cx = i64::from(rng.random_range(0..w));
            let cy = i64::from(rng.random_range(0..h));
            let r = rng.random_range(2..2 + max_radius);
            for y in (cy - r).max(0)..(cy + r).min(i64::from(h)) {
                for x in (cx - r).max(0)..(cx + r).min(i64::from(w)) {
                    if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                        img.put_pixel(x as u32, y as u32, Rgb([110, 70, 30]));
                    }
                }
            }
        }

        let mut output = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut output, image::ImageFormat::Jpeg)
            .map_err(|e| CoreError::Capture(format!("합성 이미지 인코딩 실패: {e}")))?;
        Ok(output.into_inner())
    }
}

#[async_trait]
impl CaptureProvider for MockCamera {
    async fn capture(&self) -> Result<CaptureResult, CoreError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let seed = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default() as u64
            ^ seq;

        let bytes = self.synthesize(seed)?;
        debug!("합성 이미지 생성: {}x{} ({}bytes)", self.width, self.height, bytes.len());
        finish_capture(CaptureSource::Mock, bytes, self.store.as_deref()).await
    }

    fn source_kind(&self) -> CaptureSource {
        CaptureSource::Mock
    }
}
