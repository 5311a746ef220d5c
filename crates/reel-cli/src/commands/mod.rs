pub mod common;
pub mod logs;
pub mod movies;
pub mod session;
