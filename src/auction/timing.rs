/// 경매 시간 모델 및 페이즈 정책
/// 시작 시간, 종료 시간, 현재 시각으로부터 경과/잔여 시간과 페이즈를 계산하는 순수 함수 모음
// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

// endregion: --- Imports

// region:    --- Clock
/// 현재 시각 공급자
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동으로 조작하는 시계 (테스트, 시뮬레이션용)
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// 초 단위로 시계 진행 (밀리초 정밀도)
    pub fn advance_secs(&self, secs: f64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::milliseconds((secs * 1000.0).round() as i64);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
// endregion: --- Clock

// region:    --- Phase
/// 경매 페이즈
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    One,
    Two,
    Three,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::One, Phase::Two, Phase::Three];

    /// 저장용 번호 (1, 2, 3)
    pub fn number(self) -> i16 {
        match self {
            Phase::One => 1,
            Phase::Two => 2,
            Phase::Three => 3,
        }
    }

    pub fn from_number(n: i16) -> Option<Phase> {
        match n {
            1 => Some(Phase::One),
            2 => Some(Phase::Two),
            3 => Some(Phase::Three),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// 페이즈 경계 (전체 시간 대비 비율)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseBoundaries {
    pub phase_1_end: f64,
    pub phase_2_end: f64,
}

impl Default for PhaseBoundaries {
    fn default() -> Self {
        Self {
            phase_1_end: 0.25,
            phase_2_end: 0.75,
        }
    }
}

impl PhaseBoundaries {
    /// 페이즈 1 종료 시점(초)
    pub fn phase_1_end_secs(&self, duration: i64) -> f64 {
        duration as f64 * self.phase_1_end
    }

    /// 페이즈 2 종료 시점(초)
    pub fn phase_2_end_secs(&self, duration: i64) -> f64 {
        duration as f64 * self.phase_2_end
    }

    /// 해당 페이즈의 (시작, 길이)를 초 단위로 반환. 페이즈 3의 길이는 원래 경매 시간 기준.
    pub fn window(&self, phase: Phase, duration: i64) -> (f64, f64) {
        let p1 = self.phase_1_end_secs(duration);
        let p2 = self.phase_2_end_secs(duration);
        match phase {
            Phase::One => (0.0, p1),
            Phase::Two => (p1, p2 - p1),
            Phase::Three => (p2, duration as f64 - p2),
        }
    }
}
// endregion: --- Phase

// region:    --- Time Functions
fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// 경과 시간(초). 종료 시간이 지나면 종료 시점에서 고정된다.
pub fn elapsed_secs(
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    let Some(start) = start_time else {
        return 0.0;
    };
    match end_time {
        Some(end) if now > end => secs_between(start, end),
        _ => secs_between(start, now),
    }
}

/// 잔여 시간(초). 종료 시간이 없으면 0.
pub fn remaining_secs(end_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match end_time {
        Some(end) => secs_between(now, end).max(0.0),
        None => 0.0,
    }
}

/// 경과 시간에 해당하는 페이즈
/// 페이즈 1: [0, p1], 페이즈 2: (p1, p2], 페이즈 3: (p2, ..)
pub fn phase_at(elapsed: f64, duration: i64, bounds: &PhaseBoundaries) -> Phase {
    if elapsed <= bounds.phase_1_end_secs(duration) {
        Phase::One
    } else if elapsed <= bounds.phase_2_end_secs(duration) {
        Phase::Two
    } else {
        Phase::Three
    }
}

/// 현재 페이즈 안에서의 진행률 [0, 1]
pub fn phase_progress(elapsed: f64, duration: i64, bounds: &PhaseBoundaries) -> f64 {
    let phase = phase_at(elapsed, duration, bounds);
    let (start, len) = bounds.window(phase, duration);
    if len <= 0.0 {
        return 0.0;
    }
    ((elapsed - start) / len).clamp(0.0, 1.0)
}
// endregion: --- Time Functions
