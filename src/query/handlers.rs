// region:    --- Imports
use crate::auction::events::AuctionLog;
use crate::auction::model::{Auction, AuctionId, AuctionStatus, UserId};
use crate::bidding::ledger::{BidLedger, BidQuery};
use crate::bidding::model::{Bid, BidderType};
use crate::config::AuctionConfig;
use crate::error::AuctionError;
use crate::store::AuctionStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

// endregion: --- Imports

// region:    --- Status Info
/// 입찰 수 집계
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BidCounts {
    pub total: usize,
    pub human: usize,
    pub bot: usize,
    pub phase_1: usize,
    pub phase_2: usize,
    pub phase_3: usize,
}

impl BidCounts {
    pub fn from_ledger(ledger: &BidLedger) -> Self {
        let [phase_1, phase_2, phase_3] = ledger.phase_counts();
        Self {
            total: ledger.len(),
            human: ledger.count(BidderType::Human),
            bot: ledger.count(BidderType::Bot),
            phase_1,
            phase_2,
            phase_3,
        }
    }
}

/// 경매 상태 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuctionStatusInfo {
    pub auction_id: AuctionId,
    pub status: AuctionStatus,
    pub current_phase: Option<i16>,
    pub phase_progress: f64,
    pub remaining_time: f64,
    pub elapsed_time: f64,
    pub start_price: Decimal,
    pub current_price: Decimal,
    pub max_bid: Decimal,
    pub extended_time: i64,
    pub bot_active: bool,
    pub bot_current_bid: Decimal,
    pub winner_id: Option<UserId>,
    pub bids: BidCounts,
}

impl AuctionStatusInfo {
    pub fn build(
        auction: &Auction,
        ledger: &BidLedger,
        now: DateTime<Utc>,
        config: &AuctionConfig,
    ) -> Self {
        let bounds = config.phase_boundaries();
        Self {
            auction_id: auction.id,
            status: auction.status,
            current_phase: auction.current_phase(now, &bounds).map(|p| p.number()),
            phase_progress: auction.phase_progress(now, &bounds),
            remaining_time: auction.remaining_time(now),
            elapsed_time: auction.elapsed_time(now),
            start_price: auction.start_price,
            current_price: auction.current_price,
            max_bid: auction.max_bid,
            extended_time: auction.extended_time,
            bot_active: auction.bot_active,
            bot_current_bid: auction.bot_current_bid,
            winner_id: auction.winner_id,
            bids: BidCounts::from_ledger(ledger),
        }
    }
}
// endregion: --- Status Info

// region:    --- Query Handlers

/// 경매 상태 조회
pub async fn status_info<S: AuctionStore>(
    store: &S,
    auction_id: AuctionId,
    now: DateTime<Utc>,
    config: &AuctionConfig,
) -> Result<AuctionStatusInfo, AuctionError> {
    info!("{:<12} --> 경매 상태 조회 id: {}", "Query", auction_id);
    let auction = store.get_auction(auction_id).await?;
    let ledger = store.ledger(auction_id).await?;
    Ok(AuctionStatusInfo::build(&auction, &ledger, now, config))
}

/// 경매 조회
pub async fn get_auction<S: AuctionStore>(
    store: &S,
    auction_id: AuctionId,
) -> Result<Auction, AuctionError> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    store.get_auction(auction_id).await
}

/// 경매 목록 조회
pub async fn get_auctions<S: AuctionStore>(
    store: &S,
    status: Option<AuctionStatus>,
) -> Result<Vec<Auction>, AuctionError> {
    info!("{:<12} --> 경매 목록 조회 (상태: {:?})", "Query", status);
    store.list_auctions(status).await
}

/// 최고 입찰가 조회
pub async fn get_highest_bid<S: AuctionStore>(
    store: &S,
    auction_id: AuctionId,
) -> Result<Option<Decimal>, AuctionError> {
    info!("{:<12} --> 최고 입찰가 조회 id: {}", "Query", auction_id);
    let ledger = store.ledger(auction_id).await?;
    Ok(ledger.iter().map(|b| b.amount).max())
}

/// 입찰 기록 조회 (최신순)
pub async fn get_bid_history<S: AuctionStore>(
    store: &S,
    auction_id: AuctionId,
    query: &BidQuery,
) -> Result<Vec<Bid>, AuctionError> {
    info!("{:<12} --> 입찰 기록 조회 id: {}", "Query", auction_id);
    store.bids(auction_id, query).await
}

/// 경매 로그 조회 (최신순)
pub async fn get_auction_logs<S: AuctionStore>(
    store: &S,
    auction_id: AuctionId,
) -> Result<Vec<AuctionLog>, AuctionError> {
    info!("{:<12} --> 경매 로그 조회 id: {}", "Query", auction_id);
    store.logs(auction_id).await
}

// endregion: --- Query Handlers

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::timing::Phase;
    use crate::bidding::model::NewBid;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .put_auction(Auction {
                id: 3,
                title: "상태 조회".to_string(),
                description: String::new(),
                start_price: dec!(1000),
                max_bid: dec!(2000),
                current_price: dec!(1000),
                duration: 90,
                status: AuctionStatus::Active,
                start_time: Some(t0()),
                end_time: Some(t0() + Duration::seconds(90)),
                extended_time: 0,
                bot_active: true,
                bot_current_bid: Decimal::ZERO,
                winner_id: None,
                created_by: 1,
                created_at: t0(),
            })
            .await;
        store
            .transaction(3, |tx| {
                tx.add_bid(NewBid::human(
                    7,
                    dec!(1500),
                    Some(Phase::One),
                    t0() + Duration::seconds(12),
                ));
                tx.add_bid(NewBid::bot(dec!(1600), Phase::One, t0() + Duration::seconds(14)));
                tx.add_bid(NewBid::bot(dec!(1700), Phase::Two, t0() + Duration::seconds(50)));
                let auction = tx.auction_mut();
                auction.current_price = dec!(1700);
                auction.bot_current_bid = dec!(1700);
                Ok(())
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_status_info_snapshot() {
        let store = seeded_store().await;
        let config = AuctionConfig::default();
        let info = status_info(&store, 3, t0() + Duration::seconds(45), &config)
            .await
            .unwrap();

        assert_eq!(info.current_phase, Some(2));
        assert_eq!(info.phase_progress, 0.5);
        assert_eq!(info.remaining_time, 45.0);
        assert_eq!(info.elapsed_time, 45.0);
        assert_eq!(info.current_price, dec!(1700));
        assert_eq!(
            info.bids,
            BidCounts {
                total: 3,
                human: 1,
                bot: 2,
                phase_1: 2,
                phase_2: 1,
                phase_3: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_highest_bid_and_filtered_history() {
        let store = seeded_store().await;
        assert_eq!(get_highest_bid(&store, 3).await.unwrap(), Some(dec!(1700)));

        let bot_bids = get_bid_history(&store, 3, &BidQuery::all().bidder_type(BidderType::Bot))
            .await
            .unwrap();
        assert_eq!(bot_bids.len(), 2);
        assert_eq!(bot_bids[0].amount, dec!(1700));

        let latest = get_bid_history(&store, 3, &BidQuery::all().limit(1)).await.unwrap();
        assert_eq!(latest.len(), 1);

        assert!(matches!(
            status_info(&store, 99, t0(), &AuctionConfig::default()).await,
            Err(AuctionError::NotFound(99))
        ));
    }
}
