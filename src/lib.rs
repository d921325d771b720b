pub mod api;
pub mod config;
pub mod course;
pub mod db;
pub mod enrollment;
pub mod error;
pub mod review;
pub mod stats;
pub mod user;
pub mod utils;
