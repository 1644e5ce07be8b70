/// 경매 및 봇 설정
/// 모든 튜닝 값은 외부에서 주입되며, 기본값은 운영 설정과 동일하다.
// region:    --- Imports
use crate::auction::timing::PhaseBoundaries;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Config Error
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("환경 변수 {key} 값이 올바르지 않습니다: {value}")]
    InvalidValue { key: String, value: String },
    #[error("잘못된 설정: {0}")]
    Invalid(String),
}
// endregion: --- Config Error

// region:    --- Auction Config
/// 페이즈 1, 2 공통 튜닝 값
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTuning {
    /// 페이즈 길이 대비 대기 비율 (이 비율이 지나야 선제 입찰)
    pub wait_fraction: f64,
    /// 사람 입찰에 반응하는 시간 창(초)
    pub reaction_window: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuctionConfig {
    pub default_duration: i64,
    pub default_start_price: Decimal,
    pub bid_increments: Vec<Decimal>,

    // 페이즈 경계 (전체 시간 대비 비율)
    pub phase_1_end: f64,
    pub phase_2_end: f64,

    pub phase_1: PhaseTuning,
    pub phase_2: PhaseTuning,

    // 페이즈 3 (서든 데스)
    pub phase_3_reaction_window: f64,
    pub phase_3_bid_probability: f64,
    pub phase_3_human_boost: f64,
    pub phase_3_probability_cap: f64,
    pub phase_3_extension: i64,
    pub extension_threshold: f64,
    pub max_extension: i64,

    // 봇 반응 지연 (초)
    pub reaction_delay_min: f64,
    pub reaction_delay_max: f64,

    // 티커 주기
    pub tick_interval: Duration,
    pub tick_interval_phase_3: Duration,
    pub error_backoff: Duration,

    pub rng_seed: Option<u64>,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            default_duration: 90,
            default_start_price: Decimal::new(100000, 2),
            bid_increments: vec![Decimal::from(100), Decimal::from(500), Decimal::from(1000)],
            phase_1_end: 0.25,
            phase_2_end: 0.75,
            phase_1: PhaseTuning {
                wait_fraction: 0.75,
                reaction_window: 5.0,
            },
            phase_2: PhaseTuning {
                wait_fraction: 0.5,
                reaction_window: 8.0,
            },
            phase_3_reaction_window: 5.0,
            phase_3_bid_probability: 0.30,
            phase_3_human_boost: 0.20,
            phase_3_probability_cap: 0.90,
            phase_3_extension: 5,
            extension_threshold: 5.0,
            max_extension: 30,
            reaction_delay_min: 1.0,
            reaction_delay_max: 3.0,
            tick_interval: Duration::from_secs(2),
            tick_interval_phase_3: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
            rng_seed: None,
        }
    }
}

impl AuctionConfig {
    /// 환경 변수로 기본값 덮어쓰기
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 구성 (테스트에서 환경 변수 없이 사용)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, "AUCTION_DEFAULT_DURATION")? {
            config.default_duration = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_DEFAULT_START_PRICE")? {
            config.default_start_price = v;
        }
        if let Some(raw) = lookup("AUCTION_BID_INCREMENTS") {
            config.bid_increments = raw
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| {
                    Decimal::from_str(s).map_err(|_| ConfigError::InvalidValue {
                        key: "AUCTION_BID_INCREMENTS".to_string(),
                        value: raw.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_1_END")? {
            config.phase_1_end = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_2_END")? {
            config.phase_2_end = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_1_WAIT_FRACTION")? {
            config.phase_1.wait_fraction = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_1_REACTION_WINDOW")? {
            config.phase_1.reaction_window = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_2_WAIT_FRACTION")? {
            config.phase_2.wait_fraction = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_2_REACTION_WINDOW")? {
            config.phase_2.reaction_window = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_3_REACTION_WINDOW")? {
            config.phase_3_reaction_window = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_3_BID_PROBABILITY")? {
            config.phase_3_bid_probability = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_3_HUMAN_BOOST")? {
            config.phase_3_human_boost = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_3_PROBABILITY_CAP")? {
            config.phase_3_probability_cap = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_PHASE_3_EXTENSION")? {
            config.phase_3_extension = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_EXTENSION_THRESHOLD")? {
            config.extension_threshold = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_MAX_EXTENSION")? {
            config.max_extension = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_REACTION_DELAY_MIN")? {
            config.reaction_delay_min = v;
        }
        if let Some(v) = parse(&lookup, "AUCTION_REACTION_DELAY_MAX")? {
            config.reaction_delay_max = v;
        }
        if let Some(ms) = parse::<u64, _>(&lookup, "AUCTION_TICK_INTERVAL_MS")? {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64, _>(&lookup, "AUCTION_TICK_INTERVAL_PHASE_3_MS")? {
            config.tick_interval_phase_3 = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64, _>(&lookup, "AUCTION_ERROR_BACKOFF_MS")? {
            config.error_backoff = Duration::from_millis(ms);
        }
        if let Some(seed) = parse(&lookup, "AUCTION_RNG_SEED")? {
            config.rng_seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_duration <= 0 {
            return Err(ConfigError::Invalid(
                "기본 경매 시간은 0보다 커야 합니다.".to_string(),
            ));
        }
        if self.default_start_price <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "기본 시작 가격은 0보다 커야 합니다.".to_string(),
            ));
        }
        if self.bid_increments.is_empty() {
            return Err(ConfigError::Invalid("입찰 단위가 비어 있습니다.".to_string()));
        }
        if self.bid_increments.iter().any(|inc| *inc <= Decimal::ZERO) {
            return Err(ConfigError::Invalid(
                "입찰 단위는 모두 0보다 커야 합니다.".to_string(),
            ));
        }
        let ordered = 0.0 < self.phase_1_end
            && self.phase_1_end < self.phase_2_end
            && self.phase_2_end < 1.0;
        if !ordered {
            return Err(ConfigError::Invalid(format!(
                "페이즈 경계가 올바르지 않습니다: {} / {}",
                self.phase_1_end, self.phase_2_end
            )));
        }
        for (name, tuning) in [("phase_1", &self.phase_1), ("phase_2", &self.phase_2)] {
            if !(0.0..=1.0).contains(&tuning.wait_fraction) || tuning.reaction_window < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} 튜닝 값이 올바르지 않습니다.",
                    name
                )));
            }
        }
        for (name, p) in [
            ("phase_3_bid_probability", self.phase_3_bid_probability),
            ("phase_3_human_boost", self.phase_3_human_boost),
            ("phase_3_probability_cap", self.phase_3_probability_cap),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!(
                    "{}는 0과 1 사이여야 합니다: {}",
                    name, p
                )));
            }
        }
        if self.phase_3_extension < 0 || self.max_extension < 0 || self.extension_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "연장 설정은 음수일 수 없습니다.".to_string(),
            ));
        }
        if self.reaction_delay_min < 0.0 || self.reaction_delay_min > self.reaction_delay_max {
            return Err(ConfigError::Invalid(format!(
                "반응 지연 범위가 올바르지 않습니다: {}..{}",
                self.reaction_delay_min, self.reaction_delay_max
            )));
        }
        Ok(())
    }

    pub fn phase_boundaries(&self) -> PhaseBoundaries {
        PhaseBoundaries {
            phase_1_end: self.phase_1_end,
            phase_2_end: self.phase_2_end,
        }
    }

    /// 최소 입찰 단위
    pub fn min_increment(&self) -> Decimal {
        self.bid_increments
            .iter()
            .copied()
            .min()
            .unwrap_or(Decimal::ONE)
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}
// endregion: --- Auction Config
