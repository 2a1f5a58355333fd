pub mod investment_service;
pub mod report_service;
pub mod settings_service;
pub mod subscription;
pub mod transaction_service;
