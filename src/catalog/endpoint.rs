//! Catalog Endpoints
//!
//! Upstream resources served through the cache, with their cache namespace
//! and REST path.

use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

// == Endpoint ==
/// A resource of the upstream catalog API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Categories,
    Category,
    Cities,
    City,
    Courses,
    Course,
    Search,
    Blogs,
    Blog,
    Sitemap,
    Seo,
}

impl Endpoint {
    /// Every endpoint, in a stable order.
    pub const ALL: [Endpoint; 11] = [
        Endpoint::Categories,
        Endpoint::Category,
        Endpoint::Cities,
        Endpoint::City,
        Endpoint::Courses,
        Endpoint::Course,
        Endpoint::Search,
        Endpoint::Blogs,
        Endpoint::Blog,
        Endpoint::Sitemap,
        Endpoint::Seo,
    ];

    /// Cache key namespace for this endpoint.
    pub fn namespace(self) -> &'static str {
        match self {
            Endpoint::Categories => "categories",
            Endpoint::Category => "category",
            Endpoint::Cities => "cities",
            Endpoint::City => "city",
            Endpoint::Courses => "courses",
            Endpoint::Course => "course",
            Endpoint::Search => "search",
            Endpoint::Blogs => "blogs",
            Endpoint::Blog => "blog",
            Endpoint::Sitemap => "sitemap",
            Endpoint::Seo => "seo",
        }
    }

    /// Whether the resource is addressed by a slug.
    pub fn needs_slug(self) -> bool {
        matches!(
            self,
            Endpoint::Category | Endpoint::City | Endpoint::Course | Endpoint::Blog
        )
    }

    /// Whether results change often enough to use the short search TTL.
    pub fn is_volatile(self) -> bool {
        matches!(self, Endpoint::Search)
    }

    /// Upstream path, relative to the API base URL.
    pub fn path(self, slug: Option<&str>) -> Result<String, FetchError> {
        let collection = match self {
            Endpoint::Categories | Endpoint::Category => "categories",
            Endpoint::Cities | Endpoint::City => "cities",
            Endpoint::Courses | Endpoint::Course => "courses",
            Endpoint::Blogs | Endpoint::Blog => "blogs",
            Endpoint::Search => "search",
            Endpoint::Sitemap => "sitemap",
            Endpoint::Seo => "seo",
        };

        match (self.needs_slug(), slug) {
            (true, Some(slug)) if is_valid_slug(slug) => Ok(format!("/{}/{}", collection, slug)),
            (true, Some(slug)) => Err(FetchError::InvalidRequest(format!("Invalid slug '{}'", slug))),
            (true, None) => Err(FetchError::InvalidRequest(format!(
                "Endpoint '{}' requires a slug",
                self
            ))),
            (false, None) => Ok(format!("/{}", collection)),
            (false, Some(_)) => Err(FetchError::InvalidRequest(format!(
                "Endpoint '{}' does not take a slug",
                self
            ))),
        }
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

impl FromStr for Endpoint {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|ep| ep.namespace() == s)
            .ok_or_else(|| FetchError::UnknownEndpoint(s.to_string()))
    }
}
