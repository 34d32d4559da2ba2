pub mod gateway_client;
pub mod history;
