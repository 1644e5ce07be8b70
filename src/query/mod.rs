pub mod handlers;
pub mod queries;

pub use handlers::{status_info, AuctionStatusInfo, BidCounts};
