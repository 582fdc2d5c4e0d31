pub mod chat;
pub mod fundamentals;
pub mod holding;
pub mod portfolio;
pub mod quote;
pub mod settings;
