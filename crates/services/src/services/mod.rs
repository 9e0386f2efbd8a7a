pub mod board;
pub mod files;
pub mod gateway;
pub mod queue;
pub mod session;
