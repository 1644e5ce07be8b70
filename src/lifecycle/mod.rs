/// 경매 수명 주기 관리
/// 1. 생성
/// 2. 시작 (봇 티커 시작)
/// 3. 중지 (수동 종료)
/// 4. 삭제 (대기 중인 경매만)
/// 5. 종료 조건 확인 및 낙찰자 결정
/// 6. 종료된 경매의 낙찰자 재계산
// region:    --- Imports
use crate::auction::events::{AuctionEvent, NewLog};
use crate::auction::model::{Auction, AuctionId, AuctionStatus, NewAuction, UserId};
use crate::auction::timing::{Clock, Phase};
use crate::bidding::ledger::BidLedger;
use crate::bot::bot_can_bid;
use crate::config::AuctionConfig;
use crate::error::{AuctionError, ValidationError};
use crate::scheduler::TickerControl;
use crate::store::{with_retries, AuctionStore, AuctionTx};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Completion Rules
/// 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// 현재 가격 또는 봇 입찰가가 최대 입찰가에 도달
    MaxBidReached,
    /// 시간 만료 (연장 불가)
    TimeExpired,
    /// 생성자가 수동으로 종료
    Stopped,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::MaxBidReached => "max_bid_reached",
            CompletionReason::TimeExpired => "time_expired",
            CompletionReason::Stopped => "stopped",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            CompletionReason::MaxBidReached => "최대 입찰가 도달로 경매 종료",
            CompletionReason::TimeExpired => "시간 만료로 경매 종료",
            CompletionReason::Stopped => "경매 생성자가 경매를 종료했습니다.",
        }
    }
}

/// 진행 중인 경매의 종료 사유. 계속 진행해야 하면 None.
/// 페이즈 3에서 시간이 다 됐더라도 연장 여유가 있고 봇이 입찰할 수 있으면 기다린다.
pub fn completion_reason(
    auction: &Auction,
    now: DateTime<Utc>,
    config: &AuctionConfig,
) -> Option<CompletionReason> {
    if !auction.is_active() {
        return None;
    }
    if auction.current_price >= auction.max_bid || auction.bot_current_bid >= auction.max_bid {
        return Some(CompletionReason::MaxBidReached);
    }
    if auction.remaining_time(now) > 0.0 {
        return None;
    }

    let bounds = config.phase_boundaries();
    let in_phase_3 = auction.current_phase(now, &bounds) == Some(Phase::Three);
    let extension_exhausted = auction.extended_time >= config.max_extension;
    if !in_phase_3 || extension_exhausted || !bot_can_bid(auction, now, &bounds) {
        return Some(CompletionReason::TimeExpired);
    }
    None
}

/// 낙찰자: 가장 최근 사람 입찰자
pub fn determine_winner(ledger: &BidLedger) -> Option<UserId> {
    ledger.winner()
}

/// 마감 직전 입찰에 대한 시간 연장
/// 잔여 시간이 임계값 이하이고 누적 연장이 상한 미만일 때만 적용한다.
pub fn extend_for_late_bid(
    auction: &mut Auction,
    now: DateTime<Utc>,
    config: &AuctionConfig,
) -> bool {
    if auction.remaining_time(now) > config.extension_threshold {
        return false;
    }
    if auction.extended_time >= config.max_extension {
        return false;
    }
    let Some(end_time) = auction.end_time else {
        return false;
    };
    auction.end_time = Some(end_time + Duration::seconds(config.phase_3_extension));
    auction.extended_time += config.phase_3_extension;
    true
}

/// 트랜잭션 안에서 경매 종료 처리
/// 종료 시각을 앞당기고 낙찰자를 확정한다.
pub fn complete(
    tx: &mut AuctionTx,
    now: DateTime<Utc>,
    reason: CompletionReason,
) -> Option<UserId> {
    let winner = determine_winner(tx.ledger());
    let auction = tx.auction_mut();
    auction.status = AuctionStatus::Completed;
    if auction.end_time.map_or(true, |end| now < end) {
        auction.end_time = Some(now);
    }
    auction.winner_id = winner;
    let final_price = auction.current_price;

    tx.add_log(
        NewLog::new(AuctionEvent::Completed, reason.message(), now).with_metadata(
            serde_json::json!({
                "reason": reason.as_str(),
                "final_price": final_price.to_string(),
                "winner_id": winner,
            }),
        ),
    );
    winner
}
// endregion: --- Completion Rules

// region:    --- Commands
/// 경매 생성 명령 (비어 있는 값은 설정 기본값 사용)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAuctionCommand {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_price: Option<Decimal>,
    pub max_bid: Decimal,
    pub duration: Option<i64>,
    pub bot_active: Option<bool>,
}
// endregion: --- Commands

// region:    --- Auction Service
pub struct AuctionService<S> {
    store: Arc<S>,
    config: Arc<AuctionConfig>,
    clock: Arc<dyn Clock>,
}

impl<S: AuctionStore> AuctionService<S> {
    pub fn new(store: Arc<S>, config: Arc<AuctionConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &Arc<AuctionConfig> {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// 1. 생성
    pub async fn create_auction(
        &self,
        creator: UserId,
        cmd: CreateAuctionCommand,
    ) -> Result<Auction, AuctionError> {
        let start_price = cmd.start_price.unwrap_or(self.config.default_start_price);
        let duration = cmd.duration.unwrap_or(self.config.default_duration);

        if start_price <= Decimal::ZERO {
            return Err(ValidationError::InvalidStartPrice.into());
        }
        if cmd.max_bid <= Decimal::ZERO {
            return Err(ValidationError::InvalidMaxBid.into());
        }
        if cmd.max_bid <= start_price {
            return Err(ValidationError::MaxBidNotAboveStart.into());
        }
        if duration <= 0 {
            return Err(ValidationError::InvalidDuration.into());
        }

        let auction = self
            .store
            .insert_auction(NewAuction {
                title: cmd.title,
                description: cmd.description,
                start_price,
                max_bid: cmd.max_bid,
                duration,
                bot_active: cmd.bot_active.unwrap_or(true),
                created_by: creator,
                created_at: self.now(),
            })
            .await?;
        info!(
            "{:<12} --> 경매 생성: {} (시작가 {}, 최대 입찰가 {}, {}초)",
            "Lifecycle", auction.id, auction.start_price, auction.max_bid, auction.duration
        );
        Ok(auction)
    }

    /// 2. 시작
    pub async fn start_auction(
        &self,
        id: AuctionId,
        user: UserId,
        tickers: &dyn TickerControl,
    ) -> Result<Auction, AuctionError> {
        let now = self.now();
        let auction = with_retries("경매 시작", || {
            self.store.transaction(id, move |tx| {
                ensure_creator(tx.auction(), user, "경매를 시작")?;
                ensure_transition(tx.auction(), AuctionStatus::Pending, AuctionStatus::Active)?;

                let auction = tx.auction_mut();
                auction.status = AuctionStatus::Active;
                auction.start_time = Some(now);
                auction.end_time = Some(now + Duration::seconds(auction.duration));
                auction.current_price = auction.start_price;
                auction.extended_time = 0;
                auction.bot_current_bid = Decimal::ZERO;
                let started = auction.clone();

                tx.add_log(
                    NewLog::new(AuctionEvent::Started, "경매가 시작되었습니다.", now).with_metadata(
                        serde_json::json!({
                            "start_price": started.start_price.to_string(),
                            "duration": started.duration,
                            "bot_active": started.bot_active,
                        }),
                    ),
                );
                Ok(started)
            })
        })
        .await?;

        info!("{:<12} --> 경매 {} 시작", "Lifecycle", id);
        // 봇 비활성 경매도 티커가 종료를 처리한다
        tickers.start_ticker(id);
        Ok(auction)
    }

    /// 3. 중지
    pub async fn stop_auction(
        &self,
        id: AuctionId,
        user: UserId,
        tickers: &dyn TickerControl,
    ) -> Result<Auction, AuctionError> {
        let current = self.store.get_auction(id).await?;
        ensure_creator(&current, user, "경매를 종료")?;
        ensure_transition(&current, AuctionStatus::Active, AuctionStatus::Completed)?;

        tickers.stop_ticker(id);

        let now = self.now();
        let auction = with_retries("경매 종료", || {
            self.store.transaction(id, move |tx| {
                ensure_transition(tx.auction(), AuctionStatus::Active, AuctionStatus::Completed)?;
                complete(tx, now, CompletionReason::Stopped);
                Ok(tx.auction().clone())
            })
        })
        .await?;

        info!(
            "{:<12} --> 경매 {} 수동 종료 (낙찰자: {:?})",
            "Lifecycle", id, auction.winner_id
        );
        Ok(auction)
    }

    /// 4. 삭제
    pub async fn delete_auction(&self, id: AuctionId, user: UserId) -> Result<(), AuctionError> {
        let auction = self.store.get_auction(id).await?;
        ensure_creator(&auction, user, "경매를 삭제")?;
        ensure_status(&auction, AuctionStatus::Pending)?;

        if !self.store.delete_pending_auction(id).await? {
            // 확인 이후 다른 요청이 상태를 바꾼 경우
            let actual = self.store.get_auction(id).await?.status;
            return Err(AuctionError::Conflict {
                expected: AuctionStatus::Pending,
                actual,
            });
        }
        info!("{:<12} --> 경매 {} 삭제", "Lifecycle", id);
        Ok(())
    }

    /// 5. 종료 조건 확인
    /// 종료 처리했으면 true. 이미 종료된 경매는 아무것도 바꾸지 않는다.
    pub async fn check_and_complete(&self, id: AuctionId) -> Result<bool, AuctionError> {
        let now = self.now();
        let config = Arc::clone(&self.config);
        let completed = with_retries("종료 확인", || {
            let config = Arc::clone(&config);
            self.store.transaction(id, move |tx| {
                let Some(reason) = completion_reason(tx.auction(), now, &config) else {
                    return Ok(None);
                };
                let winner = complete(tx, now, reason);
                Ok(Some((reason, winner)))
            })
        })
        .await?;

        match completed {
            Some((reason, winner)) => {
                info!(
                    "{:<12} --> 경매 {} 종료: {} (낙찰자: {:?})",
                    "Lifecycle",
                    id,
                    reason.as_str(),
                    winner
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 6. 낙찰자 재계산
    /// 종료된 경매의 낙찰자를 입찰 원장 기준으로 다시 맞춘다. 바로잡은 경매 수를 반환한다.
    pub async fn fix_auction_winners(&self) -> Result<usize, AuctionError> {
        let completed = self
            .store
            .list_auctions(Some(AuctionStatus::Completed))
            .await?;

        let mut fixed = 0;
        for auction in completed {
            let id = auction.id;
            let corrected = with_retries("낙찰자 재계산", || {
                self.store.transaction(id, move |tx| {
                    let winner = determine_winner(tx.ledger());
                    if tx.auction().status != AuctionStatus::Completed
                        || tx.auction().winner_id == winner
                    {
                        return Ok(None);
                    }
                    let previous = tx.auction().winner_id;
                    tx.auction_mut().winner_id = winner;
                    Ok(Some((previous, winner)))
                })
            })
            .await?;

            if let Some((previous, winner)) = corrected {
                info!(
                    "{:<12} --> 경매 {} 낙찰자 수정: {:?} -> {:?}",
                    "Lifecycle", id, previous, winner
                );
                fixed += 1;
            }
        }
        info!("{:<12} --> 낙찰자 {}건 수정", "Lifecycle", fixed);
        Ok(fixed)
    }

    /// 경매와 입찰 원장 조회 (결정용, 커밋 시 다시 읽음)
    pub async fn snapshot(&self, id: AuctionId) -> Result<(Auction, BidLedger), AuctionError> {
        let auction = self.store.get_auction(id).await?;
        let ledger = self.store.ledger(id).await?;
        Ok((auction, ledger))
    }

    /// 페이즈 전환 기록
    pub async fn log_phase_change(
        &self,
        id: AuctionId,
        from: Option<Phase>,
        to: Phase,
    ) -> Result<(), AuctionError> {
        let message = match from {
            Some(from) => format!("페이즈 {} -> 페이즈 {}", from, to),
            None => format!("페이즈 {} 진입", to),
        };
        debug!("{:<12} --> 경매 {} {}", "Lifecycle", id, message);
        self.store
            .append_log(
                id,
                NewLog::new(AuctionEvent::PhaseChanged, message, self.now()).with_metadata(
                    serde_json::json!({
                        "from": from.map(Phase::number),
                        "to": to.number(),
                    }),
                ),
            )
            .await
    }
}

fn ensure_creator(
    auction: &Auction,
    user: UserId,
    action: &'static str,
) -> Result<(), AuctionError> {
    if auction.created_by != user {
        return Err(AuctionError::Unauthorized { action });
    }
    Ok(())
}

/// 현재 상태가 `from`이고 `from -> to` 전이가 허용되는지
fn ensure_transition(
    auction: &Auction,
    from: AuctionStatus,
    to: AuctionStatus,
) -> Result<(), AuctionError> {
    if auction.status != from || !auction.status.can_transition_to(to) {
        return Err(AuctionError::Conflict {
            expected: from,
            actual: auction.status,
        });
    }
    Ok(())
}

fn ensure_status(auction: &Auction, expected: AuctionStatus) -> Result<(), AuctionError> {
    if auction.status != expected {
        return Err(AuctionError::Conflict {
            expected,
            actual: auction.status,
        });
    }
    Ok(())
}
// endregion: --- Auction Service
