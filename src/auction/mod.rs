pub mod model;

pub use model::{highest_by_price, AuctionItem, Bid, LedgerEntry};
