pub mod auth;
pub mod error;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod session;
pub mod state;
pub mod uploads;
pub mod users;
pub mod videos;
