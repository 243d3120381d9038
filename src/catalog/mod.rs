//! Catalog Module
//!
//! Cached access to the upstream course catalog API: categories, cities,
//! courses, search, blogs, sitemap and SEO metadata.

mod client;
mod endpoint;

pub use client::{filters, CatalogClient, Filters};
pub use endpoint::Endpoint;
