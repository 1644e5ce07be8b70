/// 입찰 원장
/// 경매별 입찰 기록 (최신순 정렬, 추가만 가능)
// region:    --- Imports
use super::model::{Bid, BidderType};
use crate::auction::model::UserId;
use crate::auction::timing::Phase;
use chrono::{DateTime, Duration, Utc};

// endregion: --- Imports

// region:    --- Bid Query
/// 입찰 조회 조건
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BidQuery {
    pub bidder_type: Option<BidderType>,
    pub phase: Option<Phase>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl BidQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn bidder_type(mut self, bidder_type: BidderType) -> Self {
        self.bidder_type = Some(bidder_type);
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, bid: &Bid) -> bool {
        self.bidder_type.map_or(true, |t| bid.bidder_type == t)
            && self.phase.map_or(true, |p| bid.phase == Some(p))
            && self.since.map_or(true, |s| bid.timestamp >= s)
    }
}
// endregion: --- Bid Query

// region:    --- Bid Ledger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BidLedger {
    // 최신순 (timestamp DESC, id DESC)
    bids: Vec<Bid>,
}

impl BidLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 임의 순서의 입찰 목록으로 원장 생성
    pub fn from_bids(mut bids: Vec<Bid>) -> Self {
        bids.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Self { bids }
    }

    /// 입찰 추가. 정렬 순서를 유지한다.
    pub fn push(&mut self, bid: Bid) {
        let pos = self
            .bids
            .iter()
            .position(|b| (b.timestamp, b.id) < (bid.timestamp, bid.id))
            .unwrap_or(self.bids.len());
        self.bids.insert(pos, bid);
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    /// 최신순 순회
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Bid> {
        self.bids.iter()
    }

    pub fn latest(&self) -> Option<&Bid> {
        self.bids.first()
    }

    pub fn latest_human(&self) -> Option<&Bid> {
        self.bids.iter().find(|b| b.is_human())
    }

    /// 낙찰자: 가장 최근 사람 입찰자 (봇만 입찰했다면 없음)
    pub fn winner(&self) -> Option<UserId> {
        self.latest_human().and_then(|b| b.bidder_id)
    }

    /// 아직 봇이 응답하지 않은 최근 사람 입찰
    /// 가장 최근 입찰이 시간 창 안의 사람 입찰일 때만 반환한다.
    pub fn unanswered_human_bid(&self, now: DateTime<Utc>, window_secs: f64) -> Option<&Bid> {
        self.latest()
            .filter(|b| b.is_human() && b.timestamp >= now - window(window_secs))
    }

    pub fn count(&self, bidder_type: BidderType) -> usize {
        self.bids.iter().filter(|b| b.bidder_type == bidder_type).count()
    }

    pub fn count_in_phase(&self, phase: Phase) -> usize {
        self.bids.iter().filter(|b| b.phase == Some(phase)).count()
    }

    /// 페이즈별 입찰 수 [1, 2, 3]
    pub fn phase_counts(&self) -> [usize; 3] {
        Phase::ALL.map(|p| self.count_in_phase(p))
    }

    pub fn bot_has_bid_in(&self, phase: Phase) -> bool {
        self.bids
            .iter()
            .any(|b| b.is_bot() && b.phase == Some(phase))
    }

    pub fn query(&self, query: &BidQuery) -> Vec<Bid> {
        let matching = self.bids.iter().filter(|b| query.matches(b)).cloned();
        match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    pub fn into_vec(self) -> Vec<Bid> {
        self.bids
    }
}

fn window(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}
// endregion: --- Bid Ledger
