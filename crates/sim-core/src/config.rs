//! 설정 관리.
//!
//! 이 모듈은 시뮬레이터 설정을 정의하고 관리합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// 기본 허용 최대 낙폭 (1.0 = 강제 청산 비활성)
pub const DEFAULT_MAX_DRAWDOWN_ALLOWED: Decimal = Decimal::ONE;

/// 기본 재생 속도 (밀리초)
pub const DEFAULT_REPLAY_SPEED_MS: u64 = 500;

/// 시뮬레이터 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 백테스트 설정
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// 재생 설정
    #[serde(default)]
    pub replay: ReplaySettings,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 백테스트 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BacktestSettings {
    /// 허용 최대 낙폭 (0, 1]
    #[serde(default = "default_max_drawdown_allowed")]
    pub max_drawdown_allowed: Decimal,
}

fn default_max_drawdown_allowed() -> Decimal {
    DEFAULT_MAX_DRAWDOWN_ALLOWED
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            max_drawdown_allowed: default_max_drawdown_allowed(),
        }
    }
}

/// 재생 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplaySettings {
    /// 자동 재생 간격 (밀리초)
    #[serde(default = "default_speed_ms")]
    pub speed_ms: u64,
}

fn default_speed_ms() -> u64 {
    DEFAULT_REPLAY_SPEED_MS
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            speed_ms: default_speed_ms(),
        }
    }
}

/// 허용 최대 낙폭이 (0, 1] 범위인지 검증합니다.
pub fn validate_max_drawdown(value: Decimal) -> ConfigResult<Decimal> {
    if value <= Decimal::ZERO || value > Decimal::ONE {
        return Err(ConfigError::MaxDrawdownOutOfRange(value));
    }
    Ok(value)
}

impl SimConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        Self::build(Some(path.as_ref()))
    }

    /// 환경 변수만으로 설정을 로드합니다 (파일 없음).
    pub fn from_env() -> ConfigResult<Self> {
        Self::build(None)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> ConfigResult<Self> {
        Self::load("config/default.toml")
    }

    fn build(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("backtest.max_drawdown_allowed", "1.0")?
            .set_default("replay.speed_ms", DEFAULT_REPLAY_SPEED_MS)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        // 환경 변수로 오버라이드 (예: SIM__BACKTEST__MAX_DRAWDOWN_ALLOWED=0.2)
        let config = builder
            .add_source(
                config::Environment::with_prefix("SIM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// 설정 검증
    pub fn validate(&self) -> ConfigResult<()> {
        validate_max_drawdown(self.backtest.max_drawdown_allowed)?;
        if self.replay.speed_ms == 0 {
            return Err(ConfigError::InvalidSpeed(0));
        }
        Ok(())
    }
}
