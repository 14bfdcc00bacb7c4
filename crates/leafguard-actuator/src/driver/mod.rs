//! 로컬 분무기 드라이버.
//!
//! 하드웨어 존재 여부는 생성 시 한 번만 확인한다. GPIO를 쓸 수 없는 호스트에서는
//! 의도를 로그로 남기고 분무 시간만큼 대기하는 시뮬레이션 드라이버로 대체한다.

mod simulated;
pub(crate) mod sysfs;

pub use simulated::SimulatedDriver;
pub use sysfs::SysfsGpioDriver;

use leafguard_core::config::AppConfig;
use leafguard_core::ports::actuator::SprayerDriver;
use std::sync::Arc;
use tracing::{info, warn};

/// 로컬 GPIO 드라이버 생성 (사용 불가 시 시뮬레이션 폴백)
pub async fn create_local_driver(config: &AppConfig) -> Arc<dyn SprayerDriver> {
    match SysfsGpioDriver::open(
        &config.gpio_sysfs_root,
        config.gpio_pin_sprayer,
        config.gpio_active_low,
    )
    .await
    {
        Ok(driver) => {
            info!(
                "GPIO 분무기 드라이버: BCM {} (active_low={})",
                config.gpio_pin_sprayer, config.gpio_active_low
            );
            Arc::new(driver)
        }
        Err(e) => {
            warn!("GPIO 사용 불가 ({e}), 시뮬레이션으로 대체");
            Arc::new(SimulatedDriver::new(config.gpio_pin_sprayer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn missing_gpio_falls_back_to_simulation() {
        let config = AppConfig {
            gpio_sysfs_root: PathBuf::from("/nonexistent/leafguard/gpio"),
            ..AppConfig::default()
        };
        let driver = create_local_driver(&config).await;
        assert_eq!(driver.name(), "simulated");
    }

    #[tokio::test]
    async fn available_gpio_uses_sysfs() {
        let root = tempfile::tempdir().unwrap();
        sysfs::tests::fake_sysfs(root.path(), 17);

        let config = AppConfig {
            gpio_sysfs_root: root.path().to_path_buf(),
            ..AppConfig::default()
        };
        let driver = create_local_driver(&config).await;
        assert_eq!(driver.name(), "sysfs-gpio");
    }

    #[tokio::test]
    async fn factory_returns_send_sync() {
        let driver = create_local_driver(&AppConfig {
            gpio_sysfs_root: PathBuf::from("/nonexistent"),
            ..AppConfig::default()
        })
        .await;
        fn assert_send_sync<T: Send + Sync>(_: &T) {}
        assert_send_sync(&driver);
    }
}
