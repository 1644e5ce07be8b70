// region:    --- Imports
use super::{AuctionStore, AuctionTx};
use crate::auction::events::{AuctionEvent, AuctionLog, NewLog};
use crate::auction::model::{Auction, AuctionId, AuctionStatus, NewAuction};
use crate::auction::timing::Phase;
use crate::bidding::ledger::{BidLedger, BidQuery};
use crate::bidding::model::{Bid, BidderType};
use crate::database::DatabaseManager;
use crate::error::{AuctionError, StoreError};
use crate::query::queries;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::sync::Arc;
use tracing::debug;

// endregion: --- Imports

// region:    --- Rows
#[derive(Debug, FromRow)]
struct AuctionRow {
    id: i64,
    title: String,
    description: String,
    start_price: Decimal,
    max_bid: Decimal,
    current_price: Decimal,
    duration: i64,
    status: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    extended_time: i64,
    bot_active: bool,
    bot_current_bid: Decimal,
    winner_id: Option<i64>,
    created_by: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuctionRow> for Auction {
    type Error = StoreError;

    fn try_from(row: AuctionRow) -> Result<Self, Self::Error> {
        let status = AuctionStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("알 수 없는 경매 상태: {}", row.status)))?;
        Ok(Auction {
            id: row.id,
            title: row.title,
            description: row.description,
            start_price: row.start_price,
            max_bid: row.max_bid,
            current_price: row.current_price,
            duration: row.duration,
            status,
            start_time: row.start_time,
            end_time: row.end_time,
            extended_time: row.extended_time,
            bot_active: row.bot_active,
            bot_current_bid: row.bot_current_bid,
            winner_id: row.winner_id,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BidRow {
    id: i64,
    auction_id: i64,
    bidder_id: Option<i64>,
    bidder_type: String,
    amount: Decimal,
    phase: Option<i16>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<BidRow> for Bid {
    type Error = StoreError;

    fn try_from(row: BidRow) -> Result<Self, Self::Error> {
        let bidder_type = BidderType::parse(&row.bidder_type).ok_or_else(|| {
            StoreError::Corrupt(format!("알 수 없는 입찰자 유형: {}", row.bidder_type))
        })?;
        let phase = match row.phase {
            None => None,
            Some(n) => Some(
                Phase::from_number(n)
                    .ok_or_else(|| StoreError::Corrupt(format!("알 수 없는 페이즈: {}", n)))?,
            ),
        };
        Ok(Bid {
            id: row.id,
            auction_id: row.auction_id,
            bidder_id: row.bidder_id,
            bidder_type,
            amount: row.amount,
            phase,
            timestamp: row.timestamp,
        })
    }
}

#[derive(Debug, FromRow)]
struct LogRow {
    id: i64,
    auction_id: i64,
    event_type: String,
    message: String,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl TryFrom<LogRow> for AuctionLog {
    type Error = StoreError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let event = AuctionEvent::parse(&row.event_type).ok_or_else(|| {
            StoreError::Corrupt(format!("알 수 없는 이벤트 유형: {}", row.event_type))
        })?;
        Ok(AuctionLog {
            id: row.id,
            auction_id: row.auction_id,
            event,
            message: row.message,
            metadata: row.metadata,
            timestamp: row.timestamp,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AuctionError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(AuctionError::from))
        .collect()
}
// endregion: --- Rows

// region:    --- Postgres Store
/// PostgreSQL 저장소
/// 트랜잭션마다 경매 행을 `FOR UPDATE`로 잠근 뒤 다시 읽는다.
pub struct PostgresStore {
    db: Arc<DatabaseManager>,
}

impl PostgresStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    async fn ensure_exists(&self, id: AuctionId) -> Result<(), AuctionError> {
        let exists = sqlx::query_scalar::<_, bool>(queries::AUCTION_EXISTS)
            .bind(id)
            .fetch_one(self.db.pool())
            .await?;
        if exists {
            Ok(())
        } else {
            Err(AuctionError::NotFound(id))
        }
    }
}

#[async_trait]
impl AuctionStore for PostgresStore {
    async fn insert_auction(&self, auction: NewAuction) -> Result<Auction, AuctionError> {
        let row = self
            .db
            .transaction(|tx| {
                Box::pin(async move {
                    sqlx::query_as::<_, AuctionRow>(queries::INSERT_AUCTION)
                        .bind(&auction.title)
                        .bind(&auction.description)
                        .bind(auction.start_price)
                        .bind(auction.max_bid)
                        .bind(auction.duration)
                        .bind(auction.bot_active)
                        .bind(auction.created_by)
                        .bind(auction.created_at)
                        .fetch_one(&mut **tx)
                        .await
                })
            })
            .await
            .map_err(AuctionError::from)?;
        Ok(Auction::try_from(row)?)
    }

    async fn get_auction(&self, id: AuctionId) -> Result<Auction, AuctionError> {
        let row = sqlx::query_as::<_, AuctionRow>(queries::GET_AUCTION)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(AuctionError::NotFound(id))?;
        Ok(Auction::try_from(row)?)
    }

    async fn list_auctions(
        &self,
        status: Option<AuctionStatus>,
    ) -> Result<Vec<Auction>, AuctionError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, AuctionRow>(queries::GET_AUCTIONS_BY_STATUS)
                    .bind(status.as_str())
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                sqlx::query_as::<_, AuctionRow>(queries::GET_ALL_AUCTIONS)
                    .fetch_all(self.db.pool())
                    .await?
            }
        };
        convert_all(rows)
    }

    async fn delete_pending_auction(&self, id: AuctionId) -> Result<bool, AuctionError> {
        self.ensure_exists(id).await?;
        let deleted = sqlx::query_scalar::<_, i64>(queries::DELETE_PENDING_AUCTION)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(deleted.is_some())
    }

    async fn ledger(&self, id: AuctionId) -> Result<BidLedger, AuctionError> {
        self.ensure_exists(id).await?;
        let rows = sqlx::query_as::<_, BidRow>(queries::GET_AUCTION_BIDS)
            .bind(id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(BidLedger::from_bids(convert_all(rows)?))
    }

    async fn bids(&self, id: AuctionId, query: &BidQuery) -> Result<Vec<Bid>, AuctionError> {
        self.ensure_exists(id).await?;
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(queries::SELECT_BIDS);
        builder.push_bind(id);
        if let Some(bidder_type) = query.bidder_type {
            builder.push(" AND bidder_type = ").push_bind(bidder_type.as_str());
        }
        if let Some(phase) = query.phase {
            builder.push(" AND phase = ").push_bind(phase.number());
        }
        if let Some(since) = query.since {
            builder.push(" AND timestamp >= ").push_bind(since);
        }
        builder.push(" ORDER BY timestamp DESC, id DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        let rows = builder
            .build_query_as::<BidRow>()
            .fetch_all(self.db.pool())
            .await?;
        convert_all(rows)
    }

    async fn logs(&self, id: AuctionId) -> Result<Vec<AuctionLog>, AuctionError> {
        self.ensure_exists(id).await?;
        let rows = sqlx::query_as::<_, LogRow>(queries::GET_AUCTION_LOGS)
            .bind(id)
            .fetch_all(self.db.pool())
            .await?;
        convert_all(rows)
    }

    async fn append_log(&self, id: AuctionId, log: NewLog) -> Result<(), AuctionError> {
        self.ensure_exists(id).await?;
        sqlx::query(queries::INSERT_LOG)
            .bind(id)
            .bind(log.event.as_str())
            .bind(&log.message)
            .bind(&log.metadata)
            .bind(log.timestamp)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn transaction<F, R>(&self, id: AuctionId, f: F) -> Result<R, AuctionError>
    where
        F: FnOnce(&mut AuctionTx) -> Result<R, AuctionError> + Send,
        R: Send,
    {
        // 트랜잭션 시작
        let mut tx = self.db.pool().begin().await?;

        // 경매 행 잠금 후 최신 상태 조회
        let row = sqlx::query_as::<_, AuctionRow>(queries::LOCK_AUCTION)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Err(AuctionError::NotFound(id));
        };
        let auction = Auction::try_from(row)?;
        let bid_rows = sqlx::query_as::<_, BidRow>(queries::GET_AUCTION_BIDS)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        let ledger = BidLedger::from_bids(convert_all(bid_rows)?);

        let mut unit = AuctionTx::new(auction, ledger);
        let result = match f(&mut unit) {
            Ok(result) => result,
            Err(e) => {
                // 롤백
                tx.rollback().await?;
                return Err(e);
            }
        };

        let (auction, dirty, new_bids, new_logs) = unit.into_parts();
        if dirty {
            sqlx::query(queries::UPDATE_AUCTION)
                .bind(auction.id)
                .bind(auction.current_price)
                .bind(auction.status.as_str())
                .bind(auction.start_time)
                .bind(auction.end_time)
                .bind(auction.extended_time)
                .bind(auction.bot_active)
                .bind(auction.bot_current_bid)
                .bind(auction.winner_id)
                .execute(&mut *tx)
                .await?;
        }

        // 입찰 기록 추가
        for bid in &new_bids {
            sqlx::query(queries::INSERT_BID)
                .bind(id)
                .bind(bid.bidder_id)
                .bind(bid.bidder_type.as_str())
                .bind(bid.amount)
                .bind(bid.phase.map(Phase::number))
                .bind(bid.timestamp)
                .execute(&mut *tx)
                .await?;
        }

        // 로그 추가
        for log in &new_logs {
            sqlx::query(queries::INSERT_LOG)
                .bind(id)
                .bind(log.event.as_str())
                .bind(&log.message)
                .bind(&log.metadata)
                .bind(log.timestamp)
                .execute(&mut *tx)
                .await?;
        }

        // 트랜잭션 커밋
        tx.commit().await?;
        debug!(
            "{:<12} --> 경매 {} 트랜잭션 커밋 (입찰 {}건, 로그 {}건)",
            "Store",
            id,
            new_bids.len(),
            new_logs.len()
        );
        Ok(result)
    }
}
// endregion: --- Postgres Store
