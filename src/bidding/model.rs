use crate::auction::model::{AuctionId, UserId};
use crate::auction::timing::Phase;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// 입찰자 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidderType {
    Human,
    Bot,
}

impl BidderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidderType::Human => "human",
            BidderType::Bot => "bot",
        }
    }

    pub fn parse(s: &str) -> Option<BidderType> {
        match s {
            "human" => Some(BidderType::Human),
            "bot" => Some(BidderType::Bot),
            _ => None,
        }
    }
}

// 입찰 모델 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub auction_id: AuctionId,
    /// None이면 봇
    pub bidder_id: Option<UserId>,
    pub bidder_type: BidderType,
    pub amount: Decimal,
    pub phase: Option<Phase>,
    pub timestamp: DateTime<Utc>,
}

impl Bid {
    pub fn is_human(&self) -> bool {
        self.bidder_type == BidderType::Human
    }

    pub fn is_bot(&self) -> bool {
        self.bidder_type == BidderType::Bot
    }
}

// 저장 전 입찰
#[derive(Debug, Clone, PartialEq)]
pub struct NewBid {
    pub bidder_id: Option<UserId>,
    pub bidder_type: BidderType,
    pub amount: Decimal,
    pub phase: Option<Phase>,
    pub timestamp: DateTime<Utc>,
}

impl NewBid {
    pub fn human(
        bidder_id: UserId,
        amount: Decimal,
        phase: Option<Phase>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            bidder_id: Some(bidder_id),
            bidder_type: BidderType::Human,
            amount,
            phase,
            timestamp,
        }
    }

    pub fn bot(amount: Decimal, phase: Phase, timestamp: DateTime<Utc>) -> Self {
        Self {
            bidder_id: None,
            bidder_type: BidderType::Bot,
            amount,
            phase: Some(phase),
            timestamp,
        }
    }

    pub fn into_bid(self, id: i64, auction_id: AuctionId) -> Bid {
        Bid {
            id,
            auction_id,
            bidder_id: self.bidder_id,
            bidder_type: self.bidder_type,
            amount: self.amount,
            phase: self.phase,
            timestamp: self.timestamp,
        }
    }
}
