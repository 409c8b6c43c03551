//! Background ingestion pipeline for a scored, summarized syndication
//! reader: collect candidate articles from feeds, resolve aggregator
//! redirects, fetch and extract readable content, evaluate via an LLM,
//! and notify a webhook on high scores.
//!
//! The read API, CRUD endpoints, dialogue-script prompt, and browser UI
//! are external collaborators and live outside this crate; this crate is
//! the worker and the thin CLI (`main.rs`) that drives it.

pub mod cancel;
pub mod config;
pub mod domain_queue;
pub mod extractor;
pub mod feeds;
pub mod llm;
pub mod models;
pub mod notifier;
pub mod repository;
pub mod scrapers;
pub mod worker;
