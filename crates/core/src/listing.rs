//! Job and gig listings and the in-memory search applied to them.

use chrono::{DateTime, Utc};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Job,
    Gig,
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingKind::Job => write!(f, "job"),
            ListingKind::Gig => write!(f, "gig"),
        }
    }
}

impl std::str::FromStr for ListingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "job" => Ok(ListingKind::Job),
            "gig" => Ok(ListingKind::Gig),
            other => Err(format!("unknown listing kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub kind: ListingKind,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub remote: bool,
    pub pay_min: Option<i64>,
    pub pay_max: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Client-side search criteria over an already fetched set of listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub kind: Option<ListingKind>,
    #[serde(default)]
    pub remote_only: bool,
}

/// Filters `listings` by `query`, best text match first, then newest first.
pub fn search_listings<'a>(listings: &'a [Listing], query: &ListingQuery) -> Vec<&'a Listing> {
    let matcher = SkimMatcherV2::default().ignore_case();
    let pattern = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let mut hits: Vec<(i64, &Listing)> = listings
        .iter()
        .filter(|l| query.kind.is_none_or(|k| l.kind == k))
        .filter(|l| !query.remote_only || l.remote)
        .filter(|l| {
            query
                .category
                .as_deref()
                .is_none_or(|c| l.category.eq_ignore_ascii_case(c))
        })
        .filter_map(|l| match pattern {
            None => Some((0, l)),
            Some(p) => [l.title.as_str(), l.category.as_str(), l.description.as_str()]
                .iter()
                .filter_map(|field| matcher.fuzzy_match(field, p))
                .max()
                .map(|score| (score, l)),
        })
        .collect();

    hits.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(b.created_at.cmp(&a.created_at)));
    hits.into_iter().map(|(_, l)| l).collect()
}
