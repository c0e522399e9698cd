//! Client for an article-generation service.
//!
//! The interesting part is [`ingestor`]: it consumes the service's
//! server-sent-event stream incrementally, reassembling UTF-8 and framed
//! lines across arbitrary block boundaries, and reports cumulative text to
//! a [`ingestor::StreamSink`]. [`render`] turns that text into markup and
//! reading statistics.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod ingestor;
pub mod render;
pub mod request;
pub mod sse;

pub use client::ArticleClient;
pub use config::Config;
pub use error::{ArticleError, Result};
pub use ingestor::{sink_fn, Outcome, SessionHandle, StreamIngestor, StreamSession, StreamSink};
pub use render::{render, render_streaming, stats, ArticleStats};
pub use request::{ArticleLength, ArticleRequest, ArticleStyle, ArticleTone, HealthStatus};
pub use sse::{StreamEvent, StreamPayload};
