//! Site cartography: robots.txt, sitemaps, spidering, sampling, and page discovery.

pub mod crawler;
pub mod discovery;
pub mod rate_limiter;
pub mod robots;
pub mod robots_cache;
pub mod sampler;
pub mod sitemap;
pub mod url_classifier;
