/// 경매 생성
pub const INSERT_AUCTION: &str = r#"
    INSERT INTO auctions (title, description, start_price, max_bid, current_price, duration, status, bot_active, bot_current_bid, created_by, created_at)
    VALUES ($1, $2, $3, $4, $3, $5, 'pending', $6, 0, $7, $8)
    RETURNING id, title, description, start_price, max_bid, current_price, duration, status, start_time, end_time, extended_time, bot_active, bot_current_bid, winner_id, created_by, created_at
"#;

/// 경매 조회
pub const GET_AUCTION: &str = "SELECT id, title, description, start_price, max_bid, current_price, duration, status, start_time, end_time, extended_time, bot_active, bot_current_bid, winner_id, created_by, created_at FROM auctions WHERE id = $1";

/// 경매 조회 (행 잠금)
pub const LOCK_AUCTION: &str = "SELECT id, title, description, start_price, max_bid, current_price, duration, status, start_time, end_time, extended_time, bot_active, bot_current_bid, winner_id, created_by, created_at FROM auctions WHERE id = $1 FOR UPDATE";

/// 모든 경매 조회
pub const GET_ALL_AUCTIONS: &str = "SELECT id, title, description, start_price, max_bid, current_price, duration, status, start_time, end_time, extended_time, bot_active, bot_current_bid, winner_id, created_by, created_at FROM auctions ORDER BY created_at DESC, id DESC";

/// 상태별 경매 조회
pub const GET_AUCTIONS_BY_STATUS: &str = "SELECT id, title, description, start_price, max_bid, current_price, duration, status, start_time, end_time, extended_time, bot_active, bot_current_bid, winner_id, created_by, created_at FROM auctions WHERE status = $1 ORDER BY created_at DESC, id DESC";

/// 경매 상태 갱신
pub const UPDATE_AUCTION: &str = r#"
    UPDATE auctions
    SET current_price = $2, status = $3, start_time = $4, end_time = $5, extended_time = $6,
        bot_active = $7, bot_current_bid = $8, winner_id = $9, updated_at = NOW()
    WHERE id = $1
"#;

/// 대기 중 경매 삭제
pub const DELETE_PENDING_AUCTION: &str =
    "DELETE FROM auctions WHERE id = $1 AND status = 'pending' RETURNING id";

/// 입찰 이력 조회 (최신순)
pub const GET_AUCTION_BIDS: &str = r#"
    SELECT id, auction_id, bidder_id, bidder_type, amount, phase, timestamp
    FROM bids
    WHERE auction_id = $1
    ORDER BY timestamp DESC, id DESC
"#;

/// 입찰 조회 기본 쿼리 (조건은 QueryBuilder로 추가)
pub const SELECT_BIDS: &str =
    "SELECT id, auction_id, bidder_id, bidder_type, amount, phase, timestamp FROM bids WHERE auction_id = ";

/// 입찰 기록 추가
pub const INSERT_BID: &str = r#"
    INSERT INTO bids (auction_id, bidder_id, bidder_type, amount, phase, timestamp)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

/// 로그 조회 (최신순)
pub const GET_AUCTION_LOGS: &str = r#"
    SELECT id, auction_id, event_type, message, metadata, timestamp
    FROM auction_logs
    WHERE auction_id = $1
    ORDER BY timestamp DESC, id DESC
"#;

/// 로그 추가
pub const INSERT_LOG: &str = r#"
    INSERT INTO auction_logs (auction_id, event_type, message, metadata, timestamp)
    VALUES ($1, $2, $3, $4, $5)
"#;

/// 경매 존재 여부
pub const AUCTION_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM auctions WHERE id = $1)";
