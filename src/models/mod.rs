//! Data models for the ingestion pipeline.

mod article;
mod article_error;
mod blocked_domain;
mod config;
mod crawler_status;
mod source;

pub use article::{Article, ArticleUpsert, Scores};
pub use article_error::{ArticleError, Phase};
pub use blocked_domain::BlockedDomain;
pub use config::Config;
pub use crawler_status::{CrawlerStatus, CrawlerStatusUpdate};
pub use source::Source;
