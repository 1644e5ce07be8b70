/// 경매별 티커 스케줄러
/// 진행 중인 경매마다 하나의 티커 태스크가 주기적으로 종료 조건을 확인하고 봇 결정을 내린다.
/// 티커는 세대 번호를 가지며, 등록이 사라지거나 교체되면 다음 주기에 스스로 종료한다.
// region:    --- Imports
use crate::auction::model::{AuctionId, AuctionStatus};
use crate::auction::timing::Phase;
use crate::bot::{AuctionBot, BidTrigger, BotDecision};
use crate::error::AuctionError;
use crate::lifecycle::AuctionService;
use crate::store::AuctionStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Ticker Control
/// 경매 수명 주기에서 티커를 켜고 끄는 창구
/// 두 연산 모두 멱등이다.
pub trait TickerControl: Send + Sync {
    fn start_ticker(&self, auction_id: AuctionId);
    fn stop_ticker(&self, auction_id: AuctionId);
}

/// 티커 상태 조회 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerStatus {
    pub auction_id: AuctionId,
    pub bot_active: bool,
    pub registered: bool,
    pub task_alive: bool,
    pub total_tickers: usize,
}
// endregion: --- Ticker Control

// region:    --- Registry
struct TickerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

type Registry = Arc<Mutex<HashMap<AuctionId, TickerEntry>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<AuctionId, TickerEntry>> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

fn is_current(registry: &Registry, auction_id: AuctionId, generation: u64) -> bool {
    lock(registry)
        .get(&auction_id)
        .is_some_and(|entry| entry.generation == generation)
}

/// 같은 세대일 때만 등록 해제
fn release(registry: &Registry, auction_id: AuctionId, generation: u64) {
    let mut tickers = lock(registry);
    if tickers
        .get(&auction_id)
        .is_some_and(|entry| entry.generation == generation)
    {
        tickers.remove(&auction_id);
    }
}
// endregion: --- Registry

// region:    --- Bot Scheduler
pub struct BotScheduler<S> {
    service: Arc<AuctionService<S>>,
    tickers: Registry,
    next_generation: AtomicU64,
}

impl<S: AuctionStore> BotScheduler<S> {
    pub fn new(service: Arc<AuctionService<S>>) -> Self {
        Self {
            service,
            tickers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn service(&self) -> &Arc<AuctionService<S>> {
        &self.service
    }

    /// 티커가 등록되어 있고 태스크가 살아 있는지
    pub fn is_running(&self, auction_id: AuctionId) -> bool {
        lock(&self.tickers)
            .get(&auction_id)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    /// 등록된 티커의 경매 목록
    pub fn active_tickers(&self) -> Vec<AuctionId> {
        let mut ids: Vec<AuctionId> = lock(&self.tickers).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn ticker_status(
        &self,
        auction_id: AuctionId,
    ) -> Result<TickerStatus, AuctionError> {
        let auction = self.service.store().get_auction(auction_id).await?;
        let tickers = lock(&self.tickers);
        let entry = tickers.get(&auction_id);
        Ok(TickerStatus {
            auction_id,
            bot_active: auction.bot_active,
            registered: entry.is_some(),
            task_alive: entry.is_some_and(|e| !e.handle.is_finished()),
            total_tickers: tickers.len(),
        })
    }

    /// 프로세스 시작 시 진행 중인 경매의 티커 복구
    pub async fn resume_active_tickers(&self) -> Result<usize, AuctionError> {
        let auctions = self
            .service
            .store()
            .list_auctions(Some(AuctionStatus::Active))
            .await?;
        let mut resumed = 0;
        for auction in &auctions {
            self.start_ticker(auction.id);
            resumed += 1;
        }
        info!(
            "{:<12} --> 진행 중인 경매 {}건의 티커 복구",
            "Scheduler", resumed
        );
        Ok(resumed)
    }

    /// 모든 티커 종료 (프로세스 종료 시)
    pub fn stop_all(&self) {
        let drained: Vec<(AuctionId, TickerEntry)> = lock(&self.tickers).drain().collect();
        for (auction_id, entry) in drained {
            entry.handle.abort();
            debug!("{:<12} --> 경매 {} 티커 중단", "Scheduler", auction_id);
        }
        info!("{:<12} --> 모든 봇 티커 종료", "Scheduler");
    }
}

impl<S: AuctionStore> TickerControl for BotScheduler<S> {
    /// 티커 시작. 기존 티커가 있으면 교체한다.
    fn start_ticker(&self, auction_id: AuctionId) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let mut tickers = lock(&self.tickers);
        let handle = tokio::spawn(run_ticker(
            Arc::clone(&self.service),
            Arc::clone(&self.tickers),
            auction_id,
            generation,
        ));
        if tickers
            .insert(auction_id, TickerEntry { generation, handle })
            .is_some()
        {
            debug!("{:<12} --> 경매 {} 기존 티커 교체", "Scheduler", auction_id);
        }
        info!(
            "{:<12} --> 경매 {} 티커 시작 (세대 {})",
            "Scheduler", auction_id, generation
        );
    }

    /// 티커 정지. 태스크는 다음 주기에 스스로 종료한다.
    fn stop_ticker(&self, auction_id: AuctionId) {
        if lock(&self.tickers).remove(&auction_id).is_some() {
            info!("{:<12} --> 경매 {} 봇 티커 정지", "Scheduler", auction_id);
        }
    }
}
// endregion: --- Bot Scheduler

// region:    --- Ticker
enum TickOutcome {
    Continue(Option<Phase>),
    Finished,
}

async fn run_ticker<S: AuctionStore>(
    service: Arc<AuctionService<S>>,
    registry: Registry,
    auction_id: AuctionId,
    generation: u64,
) {
    let config = Arc::clone(service.config());
    let mut bot = AuctionBot::from_config(Arc::clone(&config));
    let mut last_phase: Option<Phase> = None;

    loop {
        if !is_current(&registry, auction_id, generation) {
            debug!("{:<12} --> 경매 {} 티커 등록 해제 확인", "Ticker", auction_id);
            break;
        }

        let outcome = tick(
            &service,
            &mut bot,
            &registry,
            auction_id,
            generation,
            &mut last_phase,
        )
        .await;
        match outcome {
            Ok(TickOutcome::Continue(phase)) => {
                let interval = if phase == Some(Phase::Three) {
                    config.tick_interval_phase_3
                } else {
                    config.tick_interval
                };
                sleep(interval).await;
            }
            Ok(TickOutcome::Finished) => break,
            Err(AuctionError::NotFound(_)) => {
                warn!("{:<12} --> 경매 {}를 찾을 수 없어 티커 종료", "Ticker", auction_id);
                break;
            }
            Err(e) => {
                error!(
                    "{:<12} --> 경매 {} 티커 처리 중 오류 발생: {:?}",
                    "Ticker", auction_id, e
                );
                sleep(config.error_backoff).await;
            }
        }
    }

    release(&registry, auction_id, generation);
    info!("{:<12} --> 경매 {} 티커 종료", "Ticker", auction_id);
}

async fn tick<S: AuctionStore>(
    service: &AuctionService<S>,
    bot: &mut AuctionBot,
    registry: &Registry,
    auction_id: AuctionId,
    generation: u64,
    last_phase: &mut Option<Phase>,
) -> Result<TickOutcome, AuctionError> {
    let (auction, ledger) = service.snapshot(auction_id).await?;
    if !auction.is_active() {
        return Ok(TickOutcome::Finished);
    }
    // 봇 비활성 경매도 종료 조건은 티커가 확인한다
    if service.check_and_complete(auction_id).await? {
        return Ok(TickOutcome::Finished);
    }

    let now = service.now();
    let phase = auction.current_phase(now, &service.config().phase_boundaries());
    if let Some(phase) = phase {
        if *last_phase != Some(phase) {
            service.log_phase_change(auction_id, *last_phase, phase).await?;
            *last_phase = Some(phase);
        }
    }

    if !auction.bot_active {
        return Ok(TickOutcome::Continue(phase));
    }

    let placed = match bot.decide(&auction, &ledger, now) {
        BotDecision::Hold => {
            debug!("{:<12} --> 경매 {} 대기", "Ticker", auction_id);
            false
        }
        BotDecision::Bid { trigger, .. } => {
            bot.place_bid(service.store().as_ref(), auction_id, trigger, now)
                .await?
        }
        BotDecision::React { delay, .. } => {
            debug!(
                "{:<12} --> 경매 {} 사람 입찰에 {:?} 후 반응",
                "Ticker", auction_id, delay
            );
            sleep(delay).await;
            if !is_current(registry, auction_id, generation) {
                return Ok(TickOutcome::Finished);
            }
            let now = service.now();
            bot.place_bid(
                service.store().as_ref(),
                auction_id,
                BidTrigger::Reaction,
                now,
            )
            .await?
        }
    };

    if placed && service.check_and_complete(auction_id).await? {
        return Ok(TickOutcome::Finished);
    }
    Ok(TickOutcome::Continue(phase))
}
// endregion: --- Ticker
