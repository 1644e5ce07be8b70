// region:    --- Imports
use super::{AuctionStore, AuctionTx};
use crate::auction::events::{AuctionLog, NewLog};
use crate::auction::model::{Auction, AuctionId, AuctionStatus, NewAuction};
use crate::bidding::ledger::{BidLedger, BidQuery};
use crate::bidding::model::Bid;
use crate::error::AuctionError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

// endregion: --- Imports

// region:    --- Memory Store
#[derive(Debug, Default)]
struct MemoryState {
    next_auction_id: i64,
    next_bid_id: i64,
    next_log_id: i64,
    auctions: BTreeMap<AuctionId, Auction>,
    ledgers: HashMap<AuctionId, BidLedger>,
    logs: HashMap<AuctionId, Vec<AuctionLog>>,
}

impl MemoryState {
    fn auction(&self, id: AuctionId) -> Result<&Auction, AuctionError> {
        self.auctions.get(&id).ok_or(AuctionError::NotFound(id))
    }

    fn push_log(&mut self, id: AuctionId, log: NewLog) {
        self.next_log_id += 1;
        let log = log.into_log(self.next_log_id, id);
        // 최신순 유지
        self.logs.entry(id).or_default().insert(0, log);
    }
}

/// 메모리 저장소
/// 단일 잠금으로 모든 트랜잭션을 직렬화한다.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 경매를 그대로 덮어쓰기 (테스트 준비용)
    pub async fn put_auction(&self, auction: Auction) {
        let mut state = self.state.lock().await;
        state.next_auction_id = state.next_auction_id.max(auction.id);
        state.ledgers.entry(auction.id).or_default();
        state.auctions.insert(auction.id, auction);
    }

    /// 저장된 입찰 추가 (테스트 준비용)
    pub async fn put_bid(&self, bid: Bid) {
        let mut state = self.state.lock().await;
        state.next_bid_id = state.next_bid_id.max(bid.id);
        state.ledgers.entry(bid.auction_id).or_default().push(bid);
    }
}

#[async_trait]
impl AuctionStore for MemoryStore {
    async fn insert_auction(&self, auction: NewAuction) -> Result<Auction, AuctionError> {
        let mut state = self.state.lock().await;
        state.next_auction_id += 1;
        let auction = auction.into_auction(state.next_auction_id);
        state.ledgers.insert(auction.id, BidLedger::new());
        state.auctions.insert(auction.id, auction.clone());
        Ok(auction)
    }

    async fn get_auction(&self, id: AuctionId) -> Result<Auction, AuctionError> {
        let state = self.state.lock().await;
        state.auction(id).cloned()
    }

    async fn list_auctions(
        &self,
        status: Option<AuctionStatus>,
    ) -> Result<Vec<Auction>, AuctionError> {
        let state = self.state.lock().await;
        let mut auctions: Vec<Auction> = state
            .auctions
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        auctions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(auctions)
    }

    async fn delete_pending_auction(&self, id: AuctionId) -> Result<bool, AuctionError> {
        let mut state = self.state.lock().await;
        if state.auction(id)?.status != AuctionStatus::Pending {
            return Ok(false);
        }
        state.auctions.remove(&id);
        state.ledgers.remove(&id);
        state.logs.remove(&id);
        Ok(true)
    }

    async fn ledger(&self, id: AuctionId) -> Result<BidLedger, AuctionError> {
        let state = self.state.lock().await;
        state.auction(id)?;
        Ok(state.ledgers.get(&id).cloned().unwrap_or_default())
    }

    async fn bids(&self, id: AuctionId, query: &BidQuery) -> Result<Vec<Bid>, AuctionError> {
        let state = self.state.lock().await;
        state.auction(id)?;
        Ok(state
            .ledgers
            .get(&id)
            .map(|ledger| ledger.query(query))
            .unwrap_or_default())
    }

    async fn logs(&self, id: AuctionId) -> Result<Vec<AuctionLog>, AuctionError> {
        let state = self.state.lock().await;
        state.auction(id)?;
        Ok(state.logs.get(&id).cloned().unwrap_or_default())
    }

    async fn append_log(&self, id: AuctionId, log: NewLog) -> Result<(), AuctionError> {
        let mut state = self.state.lock().await;
        state.auction(id)?;
        state.push_log(id, log);
        Ok(())
    }

    async fn transaction<F, R>(&self, id: AuctionId, f: F) -> Result<R, AuctionError>
    where
        F: FnOnce(&mut AuctionTx) -> Result<R, AuctionError> + Send,
        R: Send,
    {
        let mut state = self.state.lock().await;
        let auction = state.auction(id)?.clone();
        let ledger = state.ledgers.get(&id).cloned().unwrap_or_default();

        let mut tx = AuctionTx::new(auction, ledger);
        let result = f(&mut tx)?;

        let (auction, dirty, new_bids, new_logs) = tx.into_parts();
        if dirty {
            state.auctions.insert(id, auction);
        }
        for bid in new_bids {
            state.next_bid_id += 1;
            let bid = bid.into_bid(state.next_bid_id, id);
            state.ledgers.entry(id).or_default().push(bid);
        }
        for log in new_logs {
            state.push_log(id, log);
        }
        Ok(result)
    }
}
// endregion: --- Memory Store
