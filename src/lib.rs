//! Polls - a small teaching web application
//!
//! People, posts, categories, groups, poll questions and a message log,
//! served as HTML views, a JSON API and a model admin.

pub mod admin;
pub mod api;
pub mod cache;
pub mod config;
pub mod converters;
pub mod db;
pub mod models;
pub mod services;
pub mod templates;
pub mod urls;
pub mod web;
