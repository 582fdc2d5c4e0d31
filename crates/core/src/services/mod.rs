pub mod aggregator_service;
pub mod chat_service;
pub mod fundamentals_service;
pub mod metrics_service;
pub mod quote_service;
