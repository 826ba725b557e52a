//! Blog content bundled into the binary at build time.
//!
//! Posts and categories live in `data/blog.json`. The index is parsed once on
//! first access and is immutable afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::error;

const BUNDLED_BLOG: &str = include_str!("../data/blog.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogCategory {
    pub slug: String,
    pub name: String,
    pub name_geo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    /// Slug of the owning category
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
    pub published_at: NaiveDate,
    pub reading_minutes: u32,
}

impl BlogPost {
    fn matches(&self, query: &str) -> bool {
        query.is_empty()
            || self.title.to_lowercase().contains(query)
            || self.excerpt.to_lowercase().contains(query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(query))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogIndex {
    categories: Vec<BlogCategory>,
    posts: Vec<BlogPost>,
}

static INDEX: OnceLock<BlogIndex> = OnceLock::new();

impl BlogIndex {
    /// The bundled blog index
    pub fn get() -> &'static BlogIndex {
        INDEX.get_or_init(|| {
            Self::from_json(BUNDLED_BLOG).unwrap_or_else(|e| {
                error!("Bundled blog content is invalid: {}", e);
                BlogIndex::default()
            })
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn categories(&self) -> &[BlogCategory] {
        &self.categories
    }

    pub fn category(&self, slug: &str) -> Option<&BlogCategory> {
        self.categories.iter().find(|c| c.slug == slug)
    }

    pub fn post(&self, slug: &str) -> Option<&BlogPost> {
        self.posts.iter().find(|p| p.slug == slug)
    }

    /// Posts matching a free-text query and optional category, newest first
    pub fn search(&self, query: &str, category: Option<&str>) -> Vec<&BlogPost> {
        let query = query.trim().to_lowercase();
        let mut results: Vec<&BlogPost> = self
            .posts
            .iter()
            .filter(|p| category.map_or(true, |c| p.category == c))
            .filter(|p| p.matches(&query))
            .collect();
        results.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        results
    }
}
