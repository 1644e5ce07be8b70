use super::timing::{self, Phase, PhaseBoundaries};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type AuctionId = i64;
pub type UserId = i64;

// 경매 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Pending => "pending",
            AuctionStatus::Active => "active",
            AuctionStatus::Completed => "completed",
            AuctionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<AuctionStatus> {
        match s {
            "pending" => Some(AuctionStatus::Pending),
            "active" => Some(AuctionStatus::Active),
            "completed" => Some(AuctionStatus::Completed),
            "cancelled" => Some(AuctionStatus::Cancelled),
            _ => None,
        }
    }

    /// 허용되는 상태 전이: pending -> active -> {completed, cancelled}
    pub fn can_transition_to(&self, next: AuctionStatus) -> bool {
        matches!(
            (self, next),
            (AuctionStatus::Pending, AuctionStatus::Active)
                | (AuctionStatus::Pending, AuctionStatus::Cancelled)
                | (AuctionStatus::Active, AuctionStatus::Completed)
                | (AuctionStatus::Active, AuctionStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// 경매 모델
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub title: String,
    pub description: String,
    pub start_price: Decimal,
    /// 봇 최대 입찰가
    pub max_bid: Decimal,
    pub current_price: Decimal,
    /// 경매 시간(초)
    pub duration: i64,
    pub status: AuctionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// 누적 연장 시간(초)
    pub extended_time: i64,
    pub bot_active: bool,
    pub bot_current_bid: Decimal,
    pub winner_id: Option<UserId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Auction {
    pub fn is_active(&self) -> bool {
        self.status == AuctionStatus::Active
    }

    pub fn elapsed_time(&self, now: DateTime<Utc>) -> f64 {
        timing::elapsed_secs(self.start_time, self.end_time, now)
    }

    /// 대기 중인 경매는 전체 시간을 표시용으로 반환
    pub fn remaining_time(&self, now: DateTime<Utc>) -> f64 {
        match self.status {
            AuctionStatus::Pending => self.duration as f64,
            _ if self.start_time.is_none() => 0.0,
            _ => timing::remaining_secs(self.end_time, now),
        }
    }

    /// 시작되지 않았거나 진행 중이 아니면 None
    pub fn current_phase(&self, now: DateTime<Utc>, bounds: &PhaseBoundaries) -> Option<Phase> {
        if self.start_time.is_none() || !self.is_active() {
            return None;
        }
        Some(timing::phase_at(self.elapsed_time(now), self.duration, bounds))
    }

    pub fn phase_progress(&self, now: DateTime<Utc>, bounds: &PhaseBoundaries) -> f64 {
        if self.start_time.is_none() || !self.is_active() {
            return 0.0;
        }
        timing::phase_progress(self.elapsed_time(now), self.duration, bounds)
    }
}

// 경매 생성 입력
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuction {
    pub title: String,
    pub description: String,
    pub start_price: Decimal,
    pub max_bid: Decimal,
    pub duration: i64,
    pub bot_active: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl NewAuction {
    /// 저장 전 초기 상태의 경매 (id는 저장소가 부여)
    pub fn into_auction(self, id: AuctionId) -> Auction {
        Auction {
            id,
            title: self.title,
            description: self.description,
            start_price: self.start_price,
            max_bid: self.max_bid,
            current_price: self.start_price,
            duration: self.duration,
            status: AuctionStatus::Pending,
            start_time: None,
            end_time: None,
            extended_time: 0,
            bot_active: self.bot_active,
            bot_current_bid: Decimal::ZERO,
            winner_id: None,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn pending() -> Auction {
        NewAuction {
            title: "테스트 경매".to_string(),
            description: String::new(),
            start_price: dec!(1000),
            max_bid: dec!(2000),
            duration: 90,
            bot_active: true,
            created_by: 1,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
        .into_auction(1)
    }

    #[test]
    fn test_pending_auction_has_no_phase_and_full_remaining_time() {
        let auction = pending();
        let now = auction.created_at;
        assert_eq!(auction.status, AuctionStatus::Pending);
        assert_eq!(auction.current_price, dec!(1000));
        assert_eq!(auction.current_phase(now, &PhaseBoundaries::default()), None);
        assert_eq!(auction.remaining_time(now), 90.0);
        assert_eq!(auction.phase_progress(now, &PhaseBoundaries::default()), 0.0);
    }

    #[test]
    fn test_active_auction_phase() {
        let mut auction = pending();
        let start = auction.created_at;
        auction.status = AuctionStatus::Active;
        auction.start_time = Some(start);
        auction.end_time = Some(start + Duration::seconds(90));

        let bounds = PhaseBoundaries::default();
        assert_eq!(
            auction.current_phase(start + Duration::seconds(10), &bounds),
            Some(Phase::One)
        );
        assert_eq!(
            auction.current_phase(start + Duration::seconds(80), &bounds),
            Some(Phase::Three)
        );
        assert_eq!(auction.remaining_time(start + Duration::seconds(80)), 10.0);

        auction.status = AuctionStatus::Completed;
        assert_eq!(auction.current_phase(start + Duration::seconds(10), &bounds), None);
    }

    #[test]
    fn test_status_transitions_never_go_backward() {
        use AuctionStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(!Active.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Active));
        for status in [Pending, Active, Completed, Cancelled] {
            assert_eq!(AuctionStatus::parse(status.as_str()), Some(status));
        }
    }
}
