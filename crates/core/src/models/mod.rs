pub mod investment;
pub mod investment_transaction;
pub mod report;
pub mod session;
pub mod settings;
pub mod transaction;
