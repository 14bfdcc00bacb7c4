//! Linux sysfs GPIO 분무기 드라이버.
//!
//! `<root>/export`에 라인 번호를 기록해 `<root>/gpioN/`을 만들고,
//! `direction`을 `out`으로, `value`에 레벨을 기록한다.
//! active-LOW 릴레이는 레벨을 반전한다.
//!
//! 커널 6.6부터 Raspberry Pi GPIO 칩의 sysfs base가 0이 아니다(512 이상).
//! BCM 핀 번호는 `gpiochipN/{label,base,ngpio}`로 찾은 칩 base를 더해 라인 번호로 바꾼다.

use async_trait::async_trait;
use leafguard_core::error::CoreError;
use leafguard_core::models::actuation::{ActuationTarget, SlaveResponse};
use leafguard_core::models::decision::Decision;
use leafguard_core::ports::actuator::SprayerDriver;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, error, info};

/// export 후 핀 디렉토리 생성을 기다리는 횟수 (udev 권한 적용 대기)
const EXPORT_WAIT_ATTEMPTS: u32 = 10;
const EXPORT_WAIT_INTERVAL: Duration = Duration::from_millis(50);

/// Raspberry Pi 헤더 핀을 제공하는 GPIO 칩 라벨 (Pi 1–3, Pi 4, Pi 5)
const PI_CHIP_LABELS: [&str; 3] = ["pinctrl-bcm2835", "pinctrl-bcm2711", "pinctrl-rp1"];

/// sysfs GPIO 드라이버
pub struct SysfsGpioDriver {
    pin: u32,
    /// sysfs 라인 번호 (칩 base + BCM 핀)
    line: u32,
    pin_dir: PathBuf,
    active_low: bool,
}

impl SysfsGpioDriver {
    /// 핀을 출력으로 설정하고 비활성 레벨로 초기화
    ///
    /// sysfs 루트가 없거나 쓸 수 없으면 에러. 호출 측이 시뮬레이션으로 폴백한다.
    pub async fn open(root: &Path, pin: u32, active_low: bool) -> Result<Self, CoreError> {
        if !root.join("export").exists() {
            return Err(CoreError::Actuation(format!(
                "GPIO sysfs 없음: {}",
                root.display()
            )));
        }

        let line = resolve_line(root, pin).await?;
        if line != pin {
            info!("BCM {pin} → sysfs 라인 {line}");
        }

        let pin_dir = root.join(format!("gpio{line}"));
        if !pin_dir.exists() {
            fs::write(root.join("export"), line.to_string())
                .await
                .map_err(|e| CoreError::Actuation(format!("GPIO {pin} export 실패: {e}")))?;

            let mut attempts = 0;
            while !pin_dir.join("direction").exists() {
                attempts += 1;
                if attempts > EXPORT_WAIT_ATTEMPTS {
                    return Err(CoreError::Actuation(format!(
                        "GPIO {pin} export 후 핀 디렉토리 없음"
                    )));
                }
                tokio::time::sleep(EXPORT_WAIT_INTERVAL).await;
            }
        }

        fs::write(pin_dir.join("direction"), "out")
            .await
            .map_err(|e| CoreError::Actuation(format!("GPIO {pin} 방향 설정 실패: {e}")))?;

        let driver = Self {
            pin,
            line,
            pin_dir,
            active_low,
        };
        driver.set_active(false).await?;
        info!("GPIO {pin} 출력 초기화 완료 (비활성)");
        Ok(driver)
    }

    /// 릴레이 활성/비활성
    async fn set_active(&self, active: bool) -> Result<(), CoreError> {
        let level = if active != self.active_low { "1" } else { "0" };
        fs::write(self.pin_dir.join("value"), level)
            .await
            .map_err(|e| CoreError::Actuation(format!("GPIO {} 쓰기 실패: {e}", self.pin)))?;
        debug!(pin = self.pin, line = self.line, level, "GPIO 레벨 설정");
        Ok(())
    }
}

/// BCM 핀 번호 → sysfs 라인 번호
///
/// `gpiochip*` 항목이 없으면(구형 커널 또는 칩 정보 비노출) 핀 번호를 그대로 쓴다.
/// 칩은 있지만 Pi 헤더 칩을 찾지 못하면 에러.
async fn resolve_line(root: &Path, pin: u32) -> Result<u32, CoreError> {
    let mut entries = fs::read_dir(root).await.map_err(|e| {
        CoreError::Actuation(format!("GPIO sysfs 읽기 실패 ({}): {e}", root.display()))
    })?;

    let mut chips = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with("gpiochip") {
            continue;
        }
        chips += 1;

        let dir = entry.path();
        let label = read_trimmed(&dir.join("label")).await;
        if !PI_CHIP_LABELS.iter().any(|l| label.as_deref() == Some(*l)) {
            continue;
        }
        let base = read_trimmed(&dir.join("base"))
            .await
            .and_then(|v| v.parse::<u32>().ok());
        let ngpio = read_trimmed(&dir.join("ngpio"))
            .await
            .and_then(|v| v.parse::<u32>().ok());

        match (base, ngpio) {
            (Some(base), Some(ngpio)) if pin < ngpio => {
                debug!(chip = ?name, base, ngpio, "GPIO 칩 선택");
                return Ok(base + pin);
            }
            (Some(_), Some(ngpio)) => {
                return Err(CoreError::Actuation(format!(
                    "BCM {pin}이(가) 칩 라인 수({ngpio}) 범위를 벗어남"
                )))
            }
            _ => {
                return Err(CoreError::Actuation(format!(
                    "GPIO 칩 정보 해석 실패: {}",
                    dir.display()
                )))
            }
        }
    }

    if chips == 0 {
        Ok(pin)
    } else {
        Err(CoreError::Actuation(format!(
            "Raspberry Pi GPIO 칩을 찾을 수 없음 ({chips}개 칩 검사)"
        )))
    }
}

async fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .await
        .ok()
        .map(|v| v.trim().to_string())
}

#[async_trait]
impl SprayerDriver for SysfsGpioDriver {
    async fn drive(&self, decision: &Decision) -> Result<Option<SlaveResponse>, CoreError> {
        if !decision.requires_drive() {
            self.set_active(false).await?;
            return Ok(None);
        }

        info!(pin = self.pin, duration_ms = decision.duration_ms, "분무기 ON");
        self.set_active(true).await?;
        tokio::time::sleep(Duration::from_millis(decision.duration_ms)).await;

        if let Err(e) = self.set_active(false).await {
            error!("분무기 OFF 실패: {e}");
            return Err(e);
        }
        info!(pin = self.pin, "분무기 OFF");
        Ok(None)
    }

    fn target(&self) -> ActuationTarget {
        ActuationTarget::LocalGpio
    }

    fn name(&self) -> &'static str {
        "sysfs-gpio"
    }
}
