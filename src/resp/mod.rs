pub mod jwt;
pub mod problem;
