//! Blogwatch - a blog activity dashboard
//!
//! This crate tracks the blogs of a regional association, normalizing
//! their RSS/Atom feeds into a canonical form and classifying each blog
//! as active or inactive from its posting recency.

pub mod activity;
pub mod config;
pub mod feed;
pub mod fetcher;
pub mod routes;
pub mod store;
