//! `LearnHub` Server
//!
//! User records for the e-learning platform: learners, instructors and
//! admins, stored in `PostgreSQL`.

pub mod config;
pub mod db;
pub mod users;
