pub mod audit;
pub mod auth;
pub mod linemen;
pub mod live;
pub mod requests;
