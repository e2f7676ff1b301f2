//! CSV 캔들 데이터 로더.
//!
//! 형식: `time,open,high,low,close[,volume]`
//!
//! - `time`은 unix 초 또는 `YYYY-MM-DD`
//! - 주석을 제외한 첫 줄은 어느 컬럼도 값으로 읽히지 않을 때만 헤더로 건너뜁니다.
//!   그 외에 읽을 수 없는 줄은 모두 줄 번호와 함께 에러입니다
//! - 빈 줄과 `#` 주석 줄은 무시합니다
//!
//! 시계열 정합성(시간 순서, 가격 범위)은 여기서 검사하지 않습니다.
//! 엔진이 검증 후 빈 결과로 처리합니다.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sim_core::Candle;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// CSV 파일에서 캔들을 로드합니다.
pub fn load_candles_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("데이터 파일을 읽을 수 없습니다: {}", path.display()))?;

    let candles = parse_candles(&content)
        .with_context(|| format!("데이터 파일 파싱 실패: {}", path.display()))?;
    debug!(path = %path.display(), count = candles.len(), "캔들 데이터 로드");
    Ok(candles)
}

/// CSV 문자열을 캔들 목록으로 파싱합니다.
pub fn parse_candles(content: &str) -> Result<Vec<Candle>> {
    let mut candles = Vec::new();
    let mut first_row = true;

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split(',').map(str::trim).collect();

        // 헤더는 첫 줄에만 허용
        if std::mem::take(&mut first_row) && is_header(&parts) {
            debug!(line = line_no + 1, "헤더 줄 건너뜀");
            continue;
        }

        if parts.len() < 5 {
            return Err(anyhow!(
                "{}번째 줄: 최소 5개 컬럼이 필요합니다 (time,open,high,low,close)",
                line_no + 1
            ));
        }

        let time = parse_time(parts[0]).with_context(|| format!("{}번째 줄", line_no + 1))?;
        let price = |idx: usize, name: &str| -> Result<Decimal> {
            Decimal::from_str(parts[idx])
                .map_err(|e| anyhow!("{}번째 줄: {} 값 오류 '{}': {}", line_no + 1, name, parts[idx], e))
        };

        let mut candle = Candle::new(
            time,
            price(1, "open")?,
            price(2, "high")?,
            price(3, "low")?,
            price(4, "close")?,
        );
        if let Some(volume) = parts.get(5).filter(|v| !v.is_empty()) {
            candle = candle.with_volume(
                Decimal::from_str(volume)
                    .map_err(|e| anyhow!("{}번째 줄: volume 값 오류: {}", line_no + 1, e))?,
            );
        }

        candles.push(candle);
    }

    Ok(candles)
}

/// 어느 컬럼도 시간이나 숫자로 읽히지 않는 줄
fn is_header(parts: &[&str]) -> bool {
    parts.first().is_some_and(|time| parse_time(time).is_err())
        && parts.iter().skip(1).all(|value| Decimal::from_str(value).is_err())
}

/// unix 초 또는 `YYYY-MM-DD` 시간을 파싱합니다.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = value.parse::<i64>() {
        return DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| anyhow!("잘못된 타임스탬프: {}", value));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| anyhow!("시간 형식 오류 (unix 초 또는 YYYY-MM-DD): {}", value))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("잘못된 날짜: {}", value))
}
