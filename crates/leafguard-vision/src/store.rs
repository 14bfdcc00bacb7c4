//! 캡처 이미지 파일 저장소.
//!
//! 구조: `<image_dir>/YYYY-MM-DD/capture_HHMMSS_mmm_NNN.<ext>`
//! 반환되는 `file_reference`는 `image_dir` 기준 상대 경로이며 실행 기록에 남는다.

use chrono::{DateTime, Utc};
use leafguard_core::error::CoreError;
use leafguard_core::models::capture::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

/// 캡처 이미지 저장소
pub struct CaptureStore {
    /// 이미지 루트 디렉토리
    root: PathBuf,
    /// 동일 밀리초 내 파일명 중복 방지 카운터
    counter: AtomicU32,
}

impl CaptureStore {
    /// 저장소 생성 (디렉토리 없으면 생성)
    pub async fn new(root: PathBuf) -> Result<Self, CoreError> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CoreError::Storage(format!("이미지 디렉토리 생성 실패: {e}")))?;

        info!("캡처 저장소 초기화: {}", root.display());

        Ok(Self {
            root,
            counter: AtomicU32::new(0),
        })
    }

    /// 이미지 저장, 상대 경로 반환
    pub async fn save(
        &self,
        captured_at: DateTime<Utc>,
        bytes: &[u8],
        format: ImageFormat,
    ) -> Result<String, CoreError> {
        let date_str = captured_at.format("%Y-%m-%d").to_string();
        let day_dir = self.root.join(&date_str);
        fs::create_dir_all(&day_dir)
            .await
            .map_err(|e| CoreError::Storage(format!("일자 폴더 생성 실패: {e}")))?;

        let counter = self.counter.fetch_add(1, Ordering::SeqCst) % 1000;
        let filename = format!(
            "capture_{}_{counter:03}.{}",
            captured_at.format("%H%M%S_%3f"),
            format.extension()
        );

        fs::write(day_dir.join(&filename), bytes)
            .await
            .map_err(|e| CoreError::Storage(format!("캡처 파일 저장 실패: {e}")))?;

        let relative = format!("{date_str}/{filename}");
        debug!("캡처 저장: {relative} ({}bytes)", bytes.len());
        Ok(relative)
    }

    /// 상대 경로로 이미지 로드
    #[cfg(test)]
    pub async fn load(&self, file_reference: &str) -> Result<Vec<u8>, CoreError> {
        let path = self.resolve(file_reference)?;
        fs::read(&path)
            .await
            .map_err(|e| CoreError::Storage(format!("캡처 파일 읽기 실패 ({file_reference}): {e}")))
    }

    /// 상대 경로를 절대 경로로 변환. 루트 밖을 가리키면 거부
    #[cfg(test)]
    pub fn resolve(&self, file_reference: &str) -> Result<PathBuf, CoreError> {
        let relative = Path::new(file_reference);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(CoreError::Storage(format!(
                "잘못된 파일 참조: {file_reference}"
            )));
        }
        Ok(self.root.join(relative))
    }

    /// 보존 기간보다 오래된 캡처 삭제, 삭제한 파일 수 반환
    ///
    /// 비게 된 일자 폴더도 함께 제거한다.
    pub async fn enforce_retention(&self, max_age: Duration) -> Result<usize, CoreError> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut deleted = 0;
        for day_dir in list_date_dirs(&self.root).await? {
            let mut entries = fs::read_dir(&day_dir)
                .await
                .map_err(|e| CoreError::Storage(format!("일자 폴더 읽기 실패: {e}")))?;

            let mut remaining = 0;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| CoreError::Storage(format!("디렉토리 항목 읽기 실패: {e}")))?
            {
                let modified = entry.metadata().await.and_then(|m| m.modified());
                match modified {
                    Ok(t) if t < cutoff => match fs::remove_file(entry.path()).await {
                        Ok(()) => deleted += 1,
                        Err(e) => {
                            warn!("오래된 캡처 삭제 실패: {e}");
                            remaining += 1;
                        }
                    },
                    _ => remaining += 1,
                }
            }

            if remaining == 0 {
                if let Err(e) = fs::remove_dir(&day_dir).await {
                    warn!("빈 일자 폴더 삭제 실패: {e}");
                }
            }
        }

        if deleted > 0 {
            info!("캡처 보존 정책: {deleted}개 파일 삭제 (>{}시간)", max_age.as_secs() / 3600);
        }
        Ok(deleted)
    }

    /// 이미지 루트 디렉토리
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// `YYYY-MM-DD` 형식 일자 폴더 목록
async fn list_date_dirs(root: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let mut dirs = Vec::new();
    if !root.exists() {
        return Ok(dirs);
    }

    let mut entries = fs::read_dir(root)
        .await
        .map_err(|e| CoreError::Storage(format!("이미지 디렉토리 읽기 실패: {e}")))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CoreError::Storage(format!("항목 읽기 실패: {e}")))?
    {
        let path = entry.path();
        if path.is_dir() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.len() == 10 && name.chars().nth(4) == Some('-') {
                    dirs.push(path);
                }
            }
        }
    }

    Ok(dirs)
}
