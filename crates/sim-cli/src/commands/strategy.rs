//! 전략 설정 파일.
//!
//! ```toml
//! name = "SMA 5/20 교차"
//! max_drawdown_allowed = 0.15
//!
//! [entry]
//! type = "sma_cross"
//! fast = 5
//! slow = 20
//!
//! [exit]
//! type = "sma_cross"
//! fast = 5
//! slow = 20
//! direction = "below"
//! ```

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_analytics::signals::{Signal, SignalSpec};
use std::path::Path;

/// 전략 설정 파일 형식
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyFile {
    /// 전략 이름
    pub name: String,
    /// 허용 최대 낙폭 (없으면 전역 설정 사용)
    #[serde(default)]
    pub max_drawdown_allowed: Option<Decimal>,
    /// 진입 신호
    pub entry: SignalSpec,
    /// 청산 신호
    pub exit: SignalSpec,
}

impl StrategyFile {
    /// 진입/청산 신호를 생성합니다.
    pub fn build_signals(&self) -> Result<(Box<dyn Signal>, Box<dyn Signal>)> {
        let entry = self
            .entry
            .build()
            .map_err(|e| anyhow!("진입 신호 설정 오류: {}", e))?;
        let exit = self
            .exit
            .build()
            .map_err(|e| anyhow!("청산 신호 설정 오류: {}", e))?;
        Ok((entry, exit))
    }
}

/// 전략 설정 파일 로드 (TOML 또는 JSON)
pub fn load_strategy(path: impl AsRef<Path>) -> Result<StrategyFile> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(anyhow!("전략 설정 파일이 없습니다: {}", path.display()));
    }

    let content = std::fs::read_to_string(path)?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(toml::from_str(&content)?),
        Some("json") => Ok(serde_json::from_str(&content)?),
        _ => Err(anyhow!(
            "지원하지 않는 설정 형식입니다. .toml 또는 .json을 사용하세요: {}",
            path.display()
        )),
    }
}

/// 사용 가능한 신호 목록 출력
pub fn print_available_signals() {
    println!("\n📋 사용 가능한 신호 목록:");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  type         | 매개변수                       | 설명");
    println!("  ─────────────────────────────────────────────────────────────");
    println!("  at_indices   | indices = [..]                 | 지정 캔들 인덱스에서 발생");
    println!("  sma_cross    | fast, slow, direction          | 단기/장기 SMA 교차");
    println!("  rsi          | period, level, direction       | RSI 임계값 교차");
    println!("  never        | -                              | 발생하지 않음");
    println!();
    println!("  direction: \"above\" (상향 돌파, 기본) | \"below\" (하향 이탈)");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("예시 설정 파일 (config/strategies/rsi.toml):");
    println!("  name = \"RSI 30/70\"");
    println!("  max_drawdown_allowed = 0.2");
    println!("  ");
    println!("  [entry]");
    println!("  type = \"rsi\"");
    println!("  period = 14");
    println!("  level = 30.0");
    println!("  direction = \"above\"");
    println!("  ");
    println!("  [exit]");
    println!("  type = \"rsi\"");
    println!("  period = 14");
    println!("  level = 70.0");
    println!("  direction = \"below\"");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sim_analytics::signals::CrossDirection;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("sim-cli-{}-{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_toml() {
        let path = write_temp(
            "strategy.toml",
            r#"
            name = "SMA"
            max_drawdown_allowed = 0.15

            [entry]
            type = "sma_cross"
            fast = 5
            slow = 20

            [exit]
            type = "never"
            "#,
        );
        let strategy = load_strategy(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(strategy.name, "SMA");
        assert_eq!(strategy.max_drawdown_allowed, Some(dec!(0.15)));
        assert_eq!(
            strategy.entry,
            SignalSpec::SmaCross {
                fast: 5,
                slow: 20,
                direction: CrossDirection::Above
            }
        );
        assert!(strategy.build_signals().is_ok());
    }

    #[test]
    fn test_load_json() {
        let path = write_temp(
            "strategy.json",
            r#"{"name": "idx", "entry": {"type": "at_indices", "indices": [1]},
                "exit": {"type": "at_indices", "indices": [3]}}"#,
        );
        let strategy = load_strategy(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(strategy.max_drawdown_allowed, None);
        assert_eq!(strategy.exit, SignalSpec::AtIndices { indices: vec![3] });
    }

    #[test]
    fn test_unsupported_extension() {
        let path = write_temp("strategy.yaml", "name: x");
        let result = load_strategy(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_signal_reported() {
        let strategy = StrategyFile {
            name: "bad".to_string(),
            max_drawdown_allowed: None,
            entry: SignalSpec::AtIndices { indices: vec![] },
            exit: SignalSpec::Never,
        };
        let err = strategy.build_signals().err().unwrap();
        assert!(err.to_string().contains("진입 신호"));
    }
}
