pub mod api;
pub mod controller;
pub mod errors;
pub mod serialize;
pub mod server;
pub mod state;
pub mod types;
pub mod view;
