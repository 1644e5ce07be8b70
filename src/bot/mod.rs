/// 페이즈 기반 입찰 봇
/// 1. 페이즈 1, 2: 사람 입찰에 반응하거나 대기 비율 이후 한 번 선제 입찰
/// 2. 페이즈 3: 매 틱마다 확률적으로 입찰 (서든 데스), 마감 직전 입찰 시 시간 연장
// region:    --- Imports
use crate::auction::events::{AuctionEvent, NewLog};
use crate::auction::model::{Auction, AuctionId};
use crate::auction::timing::{Phase, PhaseBoundaries};
use crate::bidding::ledger::BidLedger;
use crate::bidding::model::NewBid;
use crate::config::{AuctionConfig, PhaseTuning};
use crate::error::AuctionError;
use crate::lifecycle;
use crate::store::{AuctionStore, AuctionTx, MAX_RETRIES};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Decisions
/// 입찰 계기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidTrigger {
    /// 최근 사람 입찰에 대한 반응
    Reaction,
    /// 페이즈 대기 비율 경과 후 선제 입찰 (페이즈당 최대 1회)
    WaitThreshold,
    /// 페이즈 3 확률 입찰
    SuddenDeath,
}

impl BidTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidTrigger::Reaction => "reaction",
            BidTrigger::WaitThreshold => "wait_threshold",
            BidTrigger::SuddenDeath => "sudden_death",
        }
    }
}

/// 틱마다 내리는 봇 결정
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BotDecision {
    Hold,
    Bid { phase: Phase, trigger: BidTrigger },
    /// 사람처럼 잠시 기다린 뒤 입찰
    React { phase: Phase, delay: Duration },
}

/// 커밋된 봇 입찰
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotBid {
    pub amount: Decimal,
    pub phase: Phase,
    pub extended: bool,
}
// endregion: --- Decisions

// region:    --- Auction Bot
/// 입찰 가능 여부
/// 봇 활성, 경매 진행 중, 최대 입찰가 미도달, (페이즈 3 외에는) 잔여 시간 존재
pub fn bot_can_bid(auction: &Auction, now: DateTime<Utc>, bounds: &PhaseBoundaries) -> bool {
    if !auction.bot_active || !auction.is_active() {
        return false;
    }
    if auction.bot_current_bid >= auction.max_bid {
        return false;
    }
    let phase = auction.current_phase(now, bounds);
    if phase != Some(Phase::Three) && auction.remaining_time(now) <= 0.0 {
        return false;
    }
    true
}

pub struct AuctionBot<R = StdRng> {
    config: Arc<AuctionConfig>,
    rng: R,
}

impl AuctionBot<StdRng> {
    /// 설정의 시드가 있으면 재현 가능한 난수, 없으면 엔트로피 사용
    pub fn from_config(config: Arc<AuctionConfig>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }
}

impl<R: Rng> AuctionBot<R> {
    pub fn new(config: Arc<AuctionConfig>, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    pub fn can_bid(&self, auction: &Auction, now: DateTime<Utc>) -> bool {
        bot_can_bid(auction, now, &self.config.phase_boundaries())
    }

    /// 다음 입찰 금액
    /// 무작위 입찰 단위를 더하고, 최소 단위 이상 / 최대 입찰가 이하로 맞춘다.
    pub fn next_bid_amount(&mut self, auction: &Auction) -> Decimal {
        let min_increment = self.config.min_increment();
        let increment = self
            .config
            .bid_increments
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(min_increment);

        let floor = auction.current_price + min_increment;
        let mut candidate = (auction.current_price + increment).max(floor);
        if candidate > auction.max_bid {
            candidate = auction.max_bid;
        }
        candidate.round_dp(2)
    }

    /// 커밋 직전 금액 검증: 현재 가격보다 높고 최대 입찰가 이하
    pub fn is_valid_bid(auction: &Auction, amount: Decimal) -> bool {
        amount > Decimal::ZERO && amount > auction.current_price && amount <= auction.max_bid
    }

    pub fn should_bid_in_phase_1(
        &self,
        auction: &Auction,
        ledger: &BidLedger,
        now: DateTime<Utc>,
    ) -> Option<BidTrigger> {
        self.should_bid_in_tuned_phase(Phase::One, &self.config.phase_1, auction, ledger, now)
    }

    /// 페이즈 2는 페이즈 2 시작 시점부터 측정
    pub fn should_bid_in_phase_2(
        &self,
        auction: &Auction,
        ledger: &BidLedger,
        now: DateTime<Utc>,
    ) -> Option<BidTrigger> {
        self.should_bid_in_tuned_phase(Phase::Two, &self.config.phase_2, auction, ledger, now)
    }

    fn should_bid_in_tuned_phase(
        &self,
        phase: Phase,
        tuning: &PhaseTuning,
        auction: &Auction,
        ledger: &BidLedger,
        now: DateTime<Utc>,
    ) -> Option<BidTrigger> {
        if ledger
            .unanswered_human_bid(now, tuning.reaction_window)
            .is_some()
        {
            return Some(BidTrigger::Reaction);
        }

        let (phase_start, phase_len) = self
            .config
            .phase_boundaries()
            .window(phase, auction.duration);
        let phase_elapsed = auction.elapsed_time(now) - phase_start;
        if phase_elapsed >= phase_len * tuning.wait_fraction && !ledger.bot_has_bid_in(phase) {
            return Some(BidTrigger::WaitThreshold);
        }
        None
    }

    /// 페이즈 3 입찰 확률. 응답하지 않은 최근 사람 입찰이 있으면 상향 (상한 적용)
    pub fn phase_3_probability(&self, ledger: &BidLedger, now: DateTime<Utc>) -> f64 {
        let base = self.config.phase_3_bid_probability;
        if ledger
            .unanswered_human_bid(now, self.config.phase_3_reaction_window)
            .is_some()
        {
            (base + self.config.phase_3_human_boost)
                .min(self.config.phase_3_probability_cap)
                .max(base)
        } else {
            base
        }
    }

    pub fn should_bid_in_phase_3(&mut self, ledger: &BidLedger, now: DateTime<Utc>) -> bool {
        let probability = self.phase_3_probability(ledger, now);
        self.rng.gen::<f64>() < probability
    }

    /// 사람처럼 보이기 위한 반응 지연
    pub fn reaction_delay(&mut self) -> Duration {
        let min = self.config.reaction_delay_min;
        let max = self.config.reaction_delay_max;
        let secs = if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        };
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// 현재 상태로 이번 틱의 결정
    pub fn decide(
        &mut self,
        auction: &Auction,
        ledger: &BidLedger,
        now: DateTime<Utc>,
    ) -> BotDecision {
        if !self.can_bid(auction, now) || auction.current_price >= auction.max_bid {
            return BotDecision::Hold;
        }
        let Some(phase) = auction.current_phase(now, &self.config.phase_boundaries()) else {
            return BotDecision::Hold;
        };

        let trigger = match phase {
            Phase::One => self.should_bid_in_phase_1(auction, ledger, now),
            Phase::Two => self.should_bid_in_phase_2(auction, ledger, now),
            Phase::Three => self
                .should_bid_in_phase_3(ledger, now)
                .then_some(BidTrigger::SuddenDeath),
        };

        match trigger {
            None => BotDecision::Hold,
            Some(BidTrigger::Reaction) => BotDecision::React {
                phase,
                delay: self.reaction_delay(),
            },
            Some(trigger) => BotDecision::Bid { phase, trigger },
        }
    }

    /// 트랜잭션 안에서 다시 읽은 상태로 입찰 반영
    /// 페이즈는 결정 시점이 아니라 커밋 시점 기준이다. 조건을 만족하지 못하면 아무것도 바꾸지 않고 None
    pub fn commit_bid(
        &mut self,
        tx: &mut AuctionTx,
        trigger: BidTrigger,
        now: DateTime<Utc>,
    ) -> Option<BotBid> {
        if !self.can_bid(tx.auction(), now) {
            return None;
        }
        let phase = tx
            .auction()
            .current_phase(now, &self.config.phase_boundaries())?;
        // 선제 입찰은 페이즈당 한 번
        if trigger == BidTrigger::WaitThreshold && tx.ledger().bot_has_bid_in(phase) {
            return None;
        }

        let amount = self.next_bid_amount(tx.auction());
        if !Self::is_valid_bid(tx.auction(), amount) {
            return None;
        }

        tx.add_bid(NewBid::bot(amount, phase, now));

        let auction = tx.auction_mut();
        // 사람이 이미 더 높은 가격을 불렀을 수 있다
        if amount > auction.current_price {
            auction.current_price = amount;
        }
        auction.bot_current_bid = amount;
        let extended =
            phase == Phase::Three && lifecycle::extend_for_late_bid(auction, now, &self.config);
        let (end_time, extended_time) = (auction.end_time, auction.extended_time);

        if extended {
            tx.add_log(
                NewLog::new(
                    AuctionEvent::Extended,
                    format!(
                        "마감 직전 봇 입찰로 {}초 연장 (누적 {}초)",
                        self.config.phase_3_extension, extended_time
                    ),
                    now,
                )
                .with_metadata(serde_json::json!({
                    "extension": self.config.phase_3_extension,
                    "extended_time": extended_time,
                    "end_time": end_time,
                })),
            );
        }
        tx.add_log(
            NewLog::new(
                AuctionEvent::BotAction,
                format!("봇 입찰: {} (페이즈 {})", amount, phase),
                now,
            )
            .with_metadata(serde_json::json!({
                "amount": amount.to_string(),
                "phase": phase.number(),
                "trigger": trigger.as_str(),
            })),
        );

        Some(BotBid {
            amount,
            phase,
            extended,
        })
    }
}

impl<R: Rng + Send> AuctionBot<R> {
    /// 봇 입찰 커밋
    /// 최신 상태를 다시 읽어 조건을 재확인한 뒤 반영한다. 조건 불충족은 Ok(false).
    pub async fn place_bid<S: AuctionStore>(
        &mut self,
        store: &S,
        auction_id: AuctionId,
        trigger: BidTrigger,
        now: DateTime<Utc>,
    ) -> Result<bool, AuctionError> {
        let mut retries = 0;
        let placed = loop {
            let result = store
                .transaction(auction_id, |tx| {
                    Ok(self.commit_bid(tx, trigger, now))
                })
                .await;
            match result {
                Err(e) if e.is_retryable() && retries < MAX_RETRIES => {
                    retries += 1;
                    warn!(
                        "{:<12} --> 경매 {} 봇 입찰 충돌: 재시도 ({}회)",
                        "Bot", auction_id, retries
                    );
                }
                result => break result?,
            }
        };

        match placed {
            Some(bid) => {
                info!(
                    "{:<12} --> 봇 입찰 완료: 경매 {}, 금액 {}, 페이즈 {}, 계기 {}",
                    "Bot",
                    auction_id,
                    bid.amount,
                    bid.phase,
                    trigger.as_str()
                );
                if bid.extended {
                    info!(
                        "{:<12} --> 경매 {} 마감 {}초 연장",
                        "Bot", auction_id, self.config.phase_3_extension
                    );
                }
                Ok(true)
            }
            None => {
                debug!(
                    "{:<12} --> 경매 {} 봇 입찰 조건 불충족",
                    "Bot", auction_id
                );
                Ok(false)
            }
        }
    }
}
// endregion: --- Auction Bot

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::model::AuctionStatus;
    use crate::bidding::model::{Bid, BidderType};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn at(secs: f64) -> DateTime<Utc> {
        t0() + ChronoDuration::milliseconds((secs * 1000.0) as i64)
    }

    fn active_auction() -> Auction {
        Auction {
            id: 1,
            title: "봇 테스트".to_string(),
            description: String::new(),
            start_price: dec!(1000),
            max_bid: dec!(2000),
            current_price: dec!(1000),
            duration: 90,
            status: AuctionStatus::Active,
            start_time: Some(t0()),
            end_time: Some(t0() + ChronoDuration::seconds(90)),
            extended_time: 0,
            bot_active: true,
            bot_current_bid: Decimal::ZERO,
            winner_id: None,
            created_by: 1,
            created_at: t0(),
        }
    }

    fn human_bid(id: i64, amount: Decimal, phase: Phase, secs: f64) -> Bid {
        Bid {
            id,
            auction_id: 1,
            bidder_id: Some(7),
            bidder_type: BidderType::Human,
            amount,
            phase: Some(phase),
            timestamp: at(secs),
        }
    }

    fn bot_bid(id: i64, amount: Decimal, phase: Phase, secs: f64) -> Bid {
        Bid {
            id,
            auction_id: 1,
            bidder_id: None,
            bidder_type: BidderType::Bot,
            amount,
            phase: Some(phase),
            timestamp: at(secs),
        }
    }

    fn bot_with(config: AuctionConfig, seed: u64) -> AuctionBot<StdRng> {
        AuctionBot::new(Arc::new(config), StdRng::seed_from_u64(seed))
    }

    fn bot() -> AuctionBot<StdRng> {
        bot_with(AuctionConfig::default(), 7)
    }

    #[test]
    fn test_can_bid_preconditions() {
        let bot = bot();
        let auction = active_auction();
        assert!(bot.can_bid(&auction, at(10.0)));

        let mut disabled = auction.clone();
        disabled.bot_active = false;
        assert!(!bot.can_bid(&disabled, at(10.0)));

        let mut completed = auction.clone();
        completed.status = AuctionStatus::Completed;
        assert!(!bot.can_bid(&completed, at(10.0)));

        let mut at_ceiling = auction.clone();
        at_ceiling.bot_current_bid = dec!(2000);
        assert!(!bot.can_bid(&at_ceiling, at(10.0)));

        // 페이즈 3에서는 잔여 시간이 없어도 입찰 가능
        assert!(bot.can_bid(&auction, at(95.0)));
    }

    #[test]
    fn test_next_bid_never_exceeds_ceiling() {
        let mut bot = bot();
        let mut auction = active_auction();
        for _ in 0..200 {
            let amount = bot.next_bid_amount(&auction);
            assert!(amount <= auction.max_bid);
            assert!(amount >= auction.current_price + dec!(100) || amount == auction.max_bid);
        }

        auction.current_price = dec!(1950);
        for _ in 0..50 {
            assert_eq!(bot.next_bid_amount(&auction), dec!(2000));
        }

        // 사람이 이미 최대 입찰가를 넘겼다면 유효한 입찰이 없다
        auction.current_price = dec!(2100);
        let amount = bot.next_bid_amount(&auction);
        assert!(!AuctionBot::<StdRng>::is_valid_bid(&auction, amount));
    }

    #[test]
    fn test_sub_cent_increment_is_rejected_by_gate() {
        let mut config = AuctionConfig::default();
        config.bid_increments = vec![dec!(0.001)];
        let mut bot = bot_with(config, 3);
        let auction = active_auction();
        // 반올림하면 현재 가격과 같아지므로 커밋 불가
        let amount = bot.next_bid_amount(&auction);
        assert_eq!(amount, dec!(1000.00));
        assert!(!AuctionBot::<StdRng>::is_valid_bid(&auction, amount));

        let mut tx = AuctionTx::new(auction, BidLedger::new());
        assert!(bot
            .commit_bid(&mut tx, BidTrigger::SuddenDeath, at(80.0))
            .is_none());
    }

    #[test]
    fn test_phase_1_waits_then_bids_once() {
        let bot = bot();
        let auction = active_auction();
        let ledger = BidLedger::new();

        // 페이즈 1 길이 22.5초, 대기 비율 0.75 => 16.875초
        assert_eq!(bot.should_bid_in_phase_1(&auction, &ledger, at(10.0)), None);
        assert_eq!(
            bot.should_bid_in_phase_1(&auction, &ledger, at(17.0)),
            Some(BidTrigger::WaitThreshold)
        );

        let mut ledger = BidLedger::new();
        ledger.push(bot_bid(1, dec!(1100), Phase::One, 17.0));
        assert_eq!(bot.should_bid_in_phase_1(&auction, &ledger, at(19.0)), None);
    }

    #[test]
    fn test_phase_1_reacts_to_recent_human_bid() {
        let mut bot = bot();
        let mut auction = active_auction();
        auction.current_price = dec!(1500);
        let mut ledger = BidLedger::new();
        ledger.push(human_bid(1, dec!(1500), Phase::One, 12.0));

        assert_eq!(
            bot.should_bid_in_phase_1(&auction, &ledger, at(13.0)),
            Some(BidTrigger::Reaction)
        );
        match bot.decide(&auction, &ledger, at(13.0)) {
            BotDecision::React { phase, delay } => {
                assert_eq!(phase, Phase::One);
                assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3));
            }
            other => panic!("반응 결정이 아님: {:?}", other),
        }

        // 반응 창(5초)이 지나면 반응하지 않는다
        assert_eq!(
            bot.should_bid_in_phase_1(&auction, &ledger, at(18.5)),
            Some(BidTrigger::WaitThreshold)
        );
        ledger.push(bot_bid(2, dec!(1600), Phase::One, 14.0));
        assert_eq!(bot.should_bid_in_phase_1(&auction, &ledger, at(15.0)), None);
    }

    #[test]
    fn test_phase_2_measures_from_phase_start() {
        let bot = bot();
        let auction = active_auction();
        let ledger = BidLedger::new();
        // 페이즈 2: 22.5 ~ 67.5초, 길이 45초, 대기 비율 0.5 => 45초 시점
        assert_eq!(bot.should_bid_in_phase_2(&auction, &ledger, at(40.0)), None);
        assert_eq!(
            bot.should_bid_in_phase_2(&auction, &ledger, at(46.0)),
            Some(BidTrigger::WaitThreshold)
        );

        // 페이즈 1 봇 입찰은 페이즈 2 제한에 영향 없음
        let mut ledger = BidLedger::new();
        ledger.push(bot_bid(1, dec!(1100), Phase::One, 18.0));
        assert_eq!(
            bot.should_bid_in_phase_2(&auction, &ledger, at(46.0)),
            Some(BidTrigger::WaitThreshold)
        );
    }

    #[test]
    fn test_phase_3_probability_boost_is_capped() {
        let mut config = AuctionConfig::default();
        config.phase_3_bid_probability = 0.8;
        config.phase_3_human_boost = 0.5;
        config.phase_3_probability_cap = 0.95;
        let bot = bot_with(config, 1);

        let mut ledger = BidLedger::new();
        assert_eq!(bot.phase_3_probability(&ledger, at(80.0)), 0.8);
        ledger.push(human_bid(1, dec!(1500), Phase::Three, 79.0));
        assert_eq!(bot.phase_3_probability(&ledger, at(80.0)), 0.95);
    }

    #[test]
    fn test_phase_3_bids_with_configured_probability() {
        let mut always = AuctionConfig::default();
        always.phase_3_bid_probability = 1.0;
        let mut bot = bot_with(always, 11);
        let auction = active_auction();
        assert_eq!(
            bot.decide(&auction, &BidLedger::new(), at(80.0)),
            BotDecision::Bid {
                phase: Phase::Three,
                trigger: BidTrigger::SuddenDeath
            }
        );

        let mut never = AuctionConfig::default();
        never.phase_3_bid_probability = 0.0;
        never.phase_3_human_boost = 0.0;
        let mut bot = bot_with(never, 11);
        for _ in 0..20 {
            assert_eq!(bot.decide(&auction, &BidLedger::new(), at(80.0)), BotDecision::Hold);
        }
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let auction = active_auction();
        let ledger = BidLedger::new();
        let mut a = bot_with(AuctionConfig::default(), 99);
        let mut b = bot_with(AuctionConfig::default(), 99);
        for step in 0..30 {
            let now = at(68.0 + step as f64);
            assert_eq!(a.decide(&auction, &ledger, now), b.decide(&auction, &ledger, now));
            assert_eq!(a.next_bid_amount(&auction), b.next_bid_amount(&auction));
        }
    }

    #[test]
    fn test_commit_updates_price_and_extends_near_deadline() {
        let mut bot = bot();
        let mut tx = AuctionTx::new(active_auction(), BidLedger::new());
        let now = at(87.0);

        let bid = bot
            .commit_bid(&mut tx, BidTrigger::SuddenDeath, now)
            .unwrap();
        assert!(bid.extended);
        assert_eq!(tx.auction().current_price, bid.amount);
        assert_eq!(tx.auction().bot_current_bid, bid.amount);
        assert_eq!(tx.auction().extended_time, 5);
        assert_eq!(tx.auction().end_time, Some(t0() + ChronoDuration::seconds(95)));
        assert_eq!(tx.pending_bids().len(), 1);
        assert_eq!(tx.pending_bids()[0].bidder_id, None);
        assert_eq!(tx.pending_bids()[0].bidder_type, BidderType::Bot);
    }

    #[test]
    fn test_commit_keeps_higher_human_price() {
        let mut bot = bot();
        let mut auction = active_auction();
        auction.current_price = dec!(1500);
        let mut tx = AuctionTx::new(auction, BidLedger::new());
        let bid = bot
            .commit_bid(&mut tx, BidTrigger::Reaction, at(40.0))
            .unwrap();
        assert!(bid.amount > dec!(1500));
        assert!(!bid.extended);

        // 최대 입찰가 이상이면 커밋하지 않는다
        let mut auction = active_auction();
        auction.current_price = dec!(2000);
        let mut tx = AuctionTx::new(auction, BidLedger::new());
        assert!(bot
            .commit_bid(&mut tx, BidTrigger::Reaction, at(40.0))
            .is_none());
        assert!(!tx.is_dirty());
    }

    #[test]
    fn test_commit_rechecks_wait_threshold_guard() {
        let mut bot = bot();
        let mut ledger = BidLedger::new();
        ledger.push(bot_bid(1, dec!(1100), Phase::One, 17.0));
        let mut auction = active_auction();
        auction.current_price = dec!(1100);
        auction.bot_current_bid = dec!(1100);

        let mut tx = AuctionTx::new(auction.clone(), ledger.clone());
        assert!(bot
            .commit_bid(&mut tx, BidTrigger::WaitThreshold, at(18.0))
            .is_none());

        // 반응 입찰은 제한 대상이 아니다
        let mut tx = AuctionTx::new(auction, ledger);
        assert!(bot
            .commit_bid(&mut tx, BidTrigger::Reaction, at(18.0))
            .is_some());
    }

    #[test]
    fn test_delayed_reaction_commits_in_phase_at_commit_time() {
        let mut bot = bot();
        let mut auction = active_auction();
        auction.current_price = dec!(1500);
        let mut ledger = BidLedger::new();
        ledger.push(human_bid(1, dec!(1500), Phase::Two, 66.0));

        // 페이즈 2에서 내린 반응 결정
        match bot.decide(&auction, &ledger, at(66.5)) {
            BotDecision::React { phase, .. } => assert_eq!(phase, Phase::Two),
            other => panic!("반응 결정이 아님: {:?}", other),
        }

        // 지연 후 커밋 시점은 페이즈 3, 마감 직전
        let mut tx = AuctionTx::new(auction, ledger);
        let bid = bot
            .commit_bid(&mut tx, BidTrigger::Reaction, at(86.0))
            .unwrap();
        assert_eq!(bid.phase, Phase::Three);
        assert!(bid.extended);
        assert_eq!(tx.pending_bids()[0].phase, Some(Phase::Three));
        assert_eq!(tx.auction().extended_time, 5);
    }
}
