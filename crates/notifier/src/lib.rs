pub mod clock;
pub mod gateway;
pub mod retry;
pub mod service;
pub mod store;
pub mod worker;
