/// 경매 저장소
/// 경매 단위(경매 + 입찰 + 로그)로 원자적 읽기-수정-쓰기를 제공한다.
// region:    --- Imports
use crate::auction::events::{AuctionLog, NewLog};
use crate::auction::model::{Auction, AuctionId, AuctionStatus, NewAuction};
use crate::bidding::ledger::{BidLedger, BidQuery};
use crate::bidding::model::{Bid, NewBid};
use crate::error::AuctionError;
use async_trait::async_trait;
use std::future::Future;
use tracing::warn;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

// endregion: --- Imports

// 최대 재시도 횟수
pub const MAX_RETRIES: u32 = 100;

// region:    --- Auction Tx
/// 트랜잭션 안에서 다루는 경매 단위
/// 트랜잭션 시작 시점에 다시 읽은 경매와 입찰 원장을 담는다.
#[derive(Debug)]
pub struct AuctionTx {
    auction: Auction,
    ledger: BidLedger,
    dirty: bool,
    new_bids: Vec<NewBid>,
    new_logs: Vec<NewLog>,
}

impl AuctionTx {
    pub fn new(auction: Auction, ledger: BidLedger) -> Self {
        Self {
            auction,
            ledger,
            dirty: false,
            new_bids: Vec::new(),
            new_logs: Vec::new(),
        }
    }

    pub fn auction(&self) -> &Auction {
        &self.auction
    }

    /// 경매 수정 (커밋 시 저장)
    pub fn auction_mut(&mut self) -> &mut Auction {
        self.dirty = true;
        &mut self.auction
    }

    /// 트랜잭션 시작 시점의 입찰 원장
    pub fn ledger(&self) -> &BidLedger {
        &self.ledger
    }

    pub fn add_bid(&mut self, bid: NewBid) {
        self.new_bids.push(bid);
    }

    pub fn add_log(&mut self, log: NewLog) {
        self.new_logs.push(log);
    }

    pub fn pending_bids(&self) -> &[NewBid] {
        &self.new_bids
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn into_parts(self) -> (Auction, bool, Vec<NewBid>, Vec<NewLog>) {
        (self.auction, self.dirty, self.new_bids, self.new_logs)
    }
}
// endregion: --- Auction Tx

// region:    --- Auction Store Trait
/// 경매 저장소 트레이트
#[async_trait]
pub trait AuctionStore: Send + Sync + 'static {
    async fn insert_auction(&self, auction: NewAuction) -> Result<Auction, AuctionError>;

    async fn get_auction(&self, id: AuctionId) -> Result<Auction, AuctionError>;

    /// 상태 필터 (None이면 전체), 최신 생성순
    async fn list_auctions(
        &self,
        status: Option<AuctionStatus>,
    ) -> Result<Vec<Auction>, AuctionError>;

    /// 대기 중인 경매만 삭제. 입찰과 로그도 함께 삭제된다.
    /// 대기 상태가 아니면 false.
    async fn delete_pending_auction(&self, id: AuctionId) -> Result<bool, AuctionError>;

    /// 경매의 전체 입찰 원장
    async fn ledger(&self, id: AuctionId) -> Result<BidLedger, AuctionError>;

    async fn bids(&self, id: AuctionId, query: &BidQuery) -> Result<Vec<Bid>, AuctionError>;

    /// 최신순 로그
    async fn logs(&self, id: AuctionId) -> Result<Vec<AuctionLog>, AuctionError>;

    async fn append_log(&self, id: AuctionId, log: NewLog) -> Result<(), AuctionError>;

    /// 원자적 읽기-수정-쓰기
    /// 경매를 다시 읽어 `f`에 넘기고, `f`가 Ok를 반환하면 변경 사항을 커밋한다.
    /// Err이면 아무것도 반영하지 않는다.
    async fn transaction<F, R>(&self, id: AuctionId, f: F) -> Result<R, AuctionError>
    where
        F: FnOnce(&mut AuctionTx) -> Result<R, AuctionError> + Send,
        R: Send;
}
// endregion: --- Auction Store Trait

// region:    --- Retry
/// 재시도 가능한 저장소 오류에 대해 작업 반복
pub async fn with_retries<T, Op, Fut>(label: &str, mut op: Op) -> Result<T, AuctionError>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AuctionError>>,
{
    let mut retries = 0;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && retries < MAX_RETRIES => {
                retries += 1;
                warn!(
                    "{:<12} --> {} 충돌로 인한 재시도 ({}회)",
                    "Store", label, retries
                );
            }
            result => return result,
        }
    }
}
// endregion: --- Retry

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_with_retries_retries_conflicts_only() {
        let attempts = AtomicU32::new(0);
        let result = with_retries("테스트", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(AuctionError::Storage(StoreError::Conflict))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);

        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retries("테스트", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AuctionError::NotFound(1)) }
        })
        .await;
        assert!(matches!(result, Err(AuctionError::NotFound(1))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
