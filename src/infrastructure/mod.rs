pub mod http;
pub mod mock;
pub mod observability;
pub mod trade_log;
pub mod upstox;
