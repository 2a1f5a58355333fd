pub mod messages;
pub mod transaction_form;
pub mod transaction_list;
