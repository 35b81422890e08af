pub mod account;
pub mod quote;
pub mod recommendation;
