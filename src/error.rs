/// 경매 오류 분류
/// 1. 입력 검증 실패
/// 2. 권한 없음
/// 3. 상태 충돌
/// 4. 대상 없음
/// 5. 저장소 오류
// region:    --- Imports
use crate::auction::model::{AuctionId, AuctionStatus};
use rust_decimal::Decimal;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Errors
/// 입력 검증 실패 (호출자에게 거절 사유로 전달, 시스템 오류로 기록하지 않음)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("입찰 금액은 0보다 커야 합니다.")]
    NonPositiveAmount,
    #[error("입찰 금액은 최소 {min_bid} 이상이어야 합니다. 현재 가격은 {current_price}입니다.")]
    BidTooLow {
        min_bid: Decimal,
        current_price: Decimal,
    },
    #[error("입찰 단위는 다음 중 하나여야 합니다: {allowed:?}")]
    InvalidIncrement { allowed: Vec<Decimal> },
    #[error("경매가 이미 종료되었습니다.")]
    AuctionEnded,
    #[error("시작 가격은 0보다 커야 합니다.")]
    InvalidStartPrice,
    #[error("최대 입찰가는 0보다 커야 합니다.")]
    InvalidMaxBid,
    #[error("최대 입찰가는 시작 가격보다 커야 합니다.")]
    MaxBidNotAboveStart,
    #[error("경매 시간은 0보다 커야 합니다.")]
    InvalidDuration,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::NonPositiveAmount => "NON_POSITIVE_AMOUNT",
            ValidationError::BidTooLow { .. } => "LOW_BID",
            ValidationError::InvalidIncrement { .. } => "INVALID_INCREMENT",
            ValidationError::AuctionEnded => "ALREADY_ENDED",
            ValidationError::InvalidStartPrice => "INVALID_START_PRICE",
            ValidationError::InvalidMaxBid => "INVALID_MAX_BID",
            ValidationError::MaxBidNotAboveStart => "MAX_BID_NOT_ABOVE_START",
            ValidationError::InvalidDuration => "INVALID_DURATION",
        }
    }
}

/// 저장소 오류
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
    #[error("저장된 데이터가 올바르지 않습니다: {0}")]
    Corrupt(String),
    #[error("버전 충돌")]
    Conflict,
}

impl StoreError {
    /// 재시도로 해결될 수 있는 오류인지 (직렬화 실패, 교착 상태)
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Conflict => true,
            StoreError::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Conflict,
    NotFound,
    Storage,
}

#[derive(Debug, Error)]
pub enum AuctionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("경매 생성자만 {action} 할 수 있습니다.")]
    Unauthorized { action: &'static str },
    #[error("경매 상태가 {expected}이어야 하지만 현재 {actual}입니다.")]
    Conflict {
        expected: AuctionStatus,
        actual: AuctionStatus,
    },
    #[error("경매를 찾을 수 없습니다: {0}")]
    NotFound(AuctionId),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<sqlx::Error> for AuctionError {
    fn from(e: sqlx::Error) -> Self {
        AuctionError::Storage(StoreError::Database(e))
    }
}

impl AuctionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuctionError::Validation(_) => ErrorKind::Validation,
            AuctionError::Unauthorized { .. } => ErrorKind::Unauthorized,
            AuctionError::Conflict { .. } => ErrorKind::Conflict,
            AuctionError::NotFound(_) => ErrorKind::NotFound,
            AuctionError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuctionError::Validation(v) => v.code(),
            AuctionError::Unauthorized { .. } => "UNAUTHORIZED",
            AuctionError::Conflict { actual, .. } => match actual {
                AuctionStatus::Pending => "NOT_STARTED",
                AuctionStatus::Completed | AuctionStatus::Cancelled => "ALREADY_ENDED",
                AuctionStatus::Active => "INVALID_STATUS",
            },
            AuctionError::NotFound(_) => "NOT_FOUND",
            AuctionError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AuctionError::Storage(e) if e.is_retryable())
    }

    /// 호출자에게 돌려줄 오류 본문
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let AuctionError::Validation(ValidationError::BidTooLow {
            min_bid,
            current_price,
        }) = self
        {
            body["min_bid"] = serde_json::json!(min_bid.to_string());
            body["current_price"] = serde_json::json!(current_price.to_string());
        }
        body
    }
}
// endregion: --- Errors

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_kinds_are_distinct() {
        let validation = AuctionError::from(ValidationError::AuctionEnded);
        let unauthorized = AuctionError::Unauthorized { action: "시작" };
        let conflict = AuctionError::Conflict {
            expected: AuctionStatus::Pending,
            actual: AuctionStatus::Active,
        };
        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert_eq!(unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert_eq!(AuctionError::NotFound(3).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_low_bid_body_names_the_minimum() {
        let err = AuctionError::from(ValidationError::BidTooLow {
            min_bid: dec!(1600.00),
            current_price: dec!(1500.00),
        });
        let body = err.to_json();
        assert_eq!(body["code"], "LOW_BID");
        assert_eq!(body["min_bid"], "1600.00");
        assert!(body["error"].as_str().unwrap().contains("1600.00"));
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(AuctionError::Storage(StoreError::Conflict).is_retryable());
        assert!(!AuctionError::Storage(StoreError::Corrupt("x".into())).is_retryable());
        assert!(!AuctionError::NotFound(1).is_retryable());
    }

    #[test]
    fn test_conflict_codes() {
        let completed = AuctionError::Conflict {
            expected: AuctionStatus::Active,
            actual: AuctionStatus::Completed,
        };
        assert_eq!(completed.code(), "ALREADY_ENDED");
        let pending = AuctionError::Conflict {
            expected: AuctionStatus::Active,
            actual: AuctionStatus::Pending,
        };
        assert_eq!(pending.code(), "NOT_STARTED");
    }
}
