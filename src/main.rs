// region:    --- Imports
use auction_bot::auction::timing::SystemClock;
use auction_bot::config::AuctionConfig;
use auction_bot::database::DatabaseManager;
use auction_bot::lifecycle::AuctionService;
use auction_bot::scheduler::BotScheduler;
use auction_bot::store::PostgresStore;
use std::sync::Arc;
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // .env 로드 (없어도 됨)
    dotenvy::dotenv().ok();

    // 경매 설정
    let config = match AuctionConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{:<12} --> 설정 로드 실패: {}", "Main", e);
            return Err(e.into());
        }
    };
    info!(
        "{:<12} --> 설정 로드 완료 (기본 경매 시간 {}초, 입찰 단위 {:?})",
        "Main", config.default_duration, config.bid_increments
    );

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::from_env().await?);

    // 데이터베이스 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    let store = Arc::new(PostgresStore::new(Arc::clone(&db_manager)));
    let service = Arc::new(AuctionService::new(
        store,
        Arc::clone(&config),
        Arc::new(SystemClock),
    ));
    let scheduler = BotScheduler::new(service);

    // 재시작 전 진행 중이던 경매의 봇 복구
    // 복구 실패는 기록만 하고 계속 실행
    if let Err(e) = scheduler.resume_active_tickers().await {
        error!("{:<12} --> 봇 티커 복구 실패: {:?}", "Main", e);
    }

    info!("{:<12} --> 경매 봇 실행 중 (Ctrl+C로 종료)", "Main");
    tokio::signal::ctrl_c().await?;

    scheduler.stop_all();
    info!("{:<12} --> 종료", "Main");
    Ok(())
}
// endregion: --- Main
