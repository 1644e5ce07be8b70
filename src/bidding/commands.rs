/// 입찰 관련 커맨드 처리
/// 1. 사람 입찰
// region:    --- Imports
use crate::auction::events::{AuctionEvent, NewLog};
use crate::auction::model::{Auction, AuctionId, AuctionStatus, UserId};
use crate::auction::timing::Clock;
use crate::bidding::model::NewBid;
use crate::config::AuctionConfig;
use crate::error::{AuctionError, ValidationError};
use crate::store::{with_retries, AuctionStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

// endregion: --- Imports

// region:    --- Commands
/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: AuctionId,
    pub bidder_id: UserId,
    pub amount: Decimal,
    /// 선택한 입찰 단위 (있으면 금액과 일치해야 함)
    #[serde(default)]
    pub increment: Option<Decimal>,
}

/// 입찰 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidAccepted {
    pub auction_id: AuctionId,
    pub amount: Decimal,
    pub current_price: Decimal,
    pub phase: Option<i16>,
}

/// 진행 중인 경매에 대한 입찰 검증
pub fn validate_bid(
    auction: &Auction,
    cmd: &PlaceBidCommand,
    config: &AuctionConfig,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(), AuctionError> {
    if cmd.amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount.into());
    }
    if auction.status != AuctionStatus::Active {
        return Err(AuctionError::Conflict {
            expected: AuctionStatus::Active,
            actual: auction.status,
        });
    }
    if auction.remaining_time(now) <= 0.0 {
        return Err(ValidationError::AuctionEnded.into());
    }

    if let Some(increment) = cmd.increment {
        if !config.bid_increments.contains(&increment)
            || cmd.amount - auction.current_price != increment
        {
            return Err(ValidationError::InvalidIncrement {
                allowed: config.bid_increments.clone(),
            }
            .into());
        }
    }

    let min_bid = auction.current_price + config.min_increment();
    if cmd.amount < min_bid {
        return Err(ValidationError::BidTooLow {
            min_bid,
            current_price: auction.current_price,
        }
        .into());
    }
    Ok(())
}

/// 1. 사람 입찰
/// 최신 상태를 다시 읽어 검증한 뒤 입찰 기록과 현재 가격을 함께 반영한다.
pub async fn handle_place_bid<S: AuctionStore>(
    cmd: PlaceBidCommand,
    store: &S,
    config: &AuctionConfig,
    clock: &dyn Clock,
) -> Result<BidAccepted, AuctionError> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);
    let bounds = config.phase_boundaries();

    let accepted = with_retries("입찰", || {
        let cmd = cmd.clone();
        let now = clock.now();
        store.transaction(cmd.auction_id, move |tx| {
            validate_bid(tx.auction(), &cmd, config, now)?;

            let phase = tx.auction().current_phase(now, &bounds);
            tx.add_bid(NewBid::human(cmd.bidder_id, cmd.amount, phase, now));
            tx.auction_mut().current_price = cmd.amount;
            tx.add_log(
                NewLog::new(
                    AuctionEvent::BidPlaced,
                    format!("사용자 {} 입찰: {}", cmd.bidder_id, cmd.amount),
                    now,
                )
                .with_metadata(serde_json::json!({
                    "bidder_id": cmd.bidder_id,
                    "amount": cmd.amount.to_string(),
                    "phase": phase.map(|p| p.number()),
                })),
            );

            Ok(BidAccepted {
                auction_id: cmd.auction_id,
                amount: cmd.amount,
                current_price: cmd.amount,
                phase: phase.map(|p| p.number()),
            })
        })
    })
    .await?;

    info!(
        "{:<12} --> 입찰 완료: 경매 {}, 금액 {}",
        "Command", accepted.auction_id, accepted.amount
    );
    Ok(accepted)
}
// endregion: --- Commands

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::timing::ManualClock;
    use crate::bidding::model::BidderType;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    async fn store_with_active() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .put_auction(Auction {
                id: 1,
                title: "입찰 테스트".to_string(),
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
    }

    fn bid(amount: Decimal, increment: Option<Decimal>) -> PlaceBidCommand {
        PlaceBidCommand {
            auction_id: 1,
            bidder_id: 7,
            amount,
            increment,
        }
    }

    #[tokio::test]
    async fn test_place_bid_records_phase_and_price() {
        let store = store_with_active().await;
        let config = AuctionConfig::default();
        let clock = ManualClock::new(t0() + Duration::seconds(12));

        let accepted = handle_place_bid(bid(dec!(1500), None), &store, &config, &clock)
            .await
            .unwrap();
        assert_eq!(accepted.current_price, dec!(1500));
        assert_eq!(accepted.phase, Some(1));

        let ledger = store.ledger(1).await.unwrap();
        let latest = ledger.latest().unwrap();
        assert_eq!(latest.bidder_type, BidderType::Human);
        assert_eq!(latest.bidder_id, Some(7));
        assert_eq!(store.get_auction(1).await.unwrap().current_price, dec!(1500));
        let logs = store.logs(1).await.unwrap();
        assert_eq!(logs[0].event, AuctionEvent::BidPlaced);
    }

    #[tokio::test]
    async fn test_low_bid_reports_minimum() {
        let store = store_with_active().await;
        let config = AuctionConfig::default();
        let clock = ManualClock::new(t0() + Duration::seconds(12));

        let err = handle_place_bid(bid(dec!(1050), None), &store, &config, &clock)
            .await
            .unwrap_err();
        match err {
            AuctionError::Validation(ValidationError::BidTooLow { min_bid, .. }) => {
                assert_eq!(min_bid, dec!(1100))
            }
            other => panic!("예상치 못한 오류: {:?}", other),
        }
        assert!(store.ledger(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_increment_must_match_amount() {
        let store = store_with_active().await;
        let config = AuctionConfig::default();
        let clock = ManualClock::new(t0() + Duration::seconds(12));

        let err = handle_place_bid(bid(dec!(1500), Some(dec!(100))), &store, &config, &clock)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INCREMENT");

        let err = handle_place_bid(bid(dec!(1300), Some(dec!(300))), &store, &config, &clock)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INCREMENT");

        handle_place_bid(bid(dec!(1500), Some(dec!(500))), &store, &config, &clock)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejects_bids_outside_active_window() {
        let store = store_with_active().await;
        let config = AuctionConfig::default();

        let late = ManualClock::new(t0() + Duration::seconds(95));
        let err = handle_place_bid(bid(dec!(1500), None), &store, &config, &late)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ALREADY_ENDED");

        let err = handle_place_bid(bid(dec!(0), None), &store, &config, &late)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NON_POSITIVE_AMOUNT");

        store
            .transaction(1, |tx| {
                tx.auction_mut().status = AuctionStatus::Completed;
                Ok(())
            })
            .await
            .unwrap();
        let on_time = ManualClock::new(t0() + Duration::seconds(12));
        let err = handle_place_bid(bid(dec!(1500), None), &store, &config, &on_time)
            .await
            .unwrap_err();
        assert!(matches!(err, AuctionError::Conflict { .. }));
    }
}
