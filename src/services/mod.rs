pub mod auth;
pub mod backend;
pub mod catalog;
pub mod countdown;
pub mod flow;
pub mod lock;
pub mod projector;
