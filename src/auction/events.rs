use super::model::AuctionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuctionEvent {
    // 경매 시작
    Started,
    // 사람 입찰
    BidPlaced,
    // 페이즈 전환
    PhaseChanged,
    // 페이즈 3 시간 연장
    Extended,
    // 경매 종료
    Completed,
    // 봇 입찰
    BotAction,
}

impl AuctionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionEvent::Started => "started",
            AuctionEvent::BidPlaced => "bid_placed",
            AuctionEvent::PhaseChanged => "phase_changed",
            AuctionEvent::Extended => "extended",
            AuctionEvent::Completed => "completed",
            AuctionEvent::BotAction => "bot_action",
        }
    }

    pub fn parse(s: &str) -> Option<AuctionEvent> {
        match s {
            "started" => Some(AuctionEvent::Started),
            "bid_placed" => Some(AuctionEvent::BidPlaced),
            "phase_changed" => Some(AuctionEvent::PhaseChanged),
            "extended" => Some(AuctionEvent::Extended),
            "completed" => Some(AuctionEvent::Completed),
            "bot_action" => Some(AuctionEvent::BotAction),
            _ => None,
        }
    }
}

/// 감사 로그 (결정 로직에서는 읽지 않음)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuctionLog {
    pub id: i64,
    pub auction_id: AuctionId,
    pub event: AuctionEvent,
    pub message: String,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// 저장 전 로그
#[derive(Debug, Clone, PartialEq)]
pub struct NewLog {
    pub event: AuctionEvent,
    pub message: String,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl NewLog {
    pub fn new(event: AuctionEvent, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event,
            message: message.into(),
            metadata: serde_json::json!({}),
            timestamp,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn into_log(self, id: i64, auction_id: AuctionId) -> AuctionLog {
        AuctionLog {
            id,
            auction_id,
            event: self.event,
            message: self.message,
            metadata: self.metadata,
            timestamp: self.timestamp,
        }
    }
}
