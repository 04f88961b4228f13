use serde::{Deserialize, Serialize};

use crate::db::models::file_extension;
use crate::extract::is_document_extension;
use crate::search::index::SearchHit;

/// Post-filtering applied to raw similarity hits before they are shown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchPolicy {
    pub top_k: usize,
    /// Minimum similarity for ordinary queries.
    pub threshold: f64,
    /// Minimum similarity when the query is a bare extension like `pdf`.
    pub extension_threshold: f64,
    /// Added to hits whose extension equals the extension query.
    pub extension_boost: f64,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            top_k: 20,
            threshold: 0.1,
            extension_threshold: -0.05,
            extension_boost: 1.0,
        }
    }
}

/// The document extension a query names, if the whole query is one.
pub fn extension_query(query: &str) -> Option<String> {
    let token = query.trim().to_lowercase();
    is_document_extension(&token).then_some(token)
}

impl SearchPolicy {
    /// `hits` must already be sorted by descending similarity.
    pub fn apply(&self, query: &str, hits: Vec<SearchHit>) -> Vec<SearchHit> {
        let Some(extension) = extension_query(query) else {
            return hits
                .into_iter()
                .filter(|hit| hit.score >= self.threshold)
                .collect();
        };

        let mut boosted: Vec<SearchHit> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.extension_threshold)
            .map(|mut hit| {
                if file_extension(&hit.path).as_deref() == Some(extension.as_str()) {
                    hit.score += self.extension_boost;
                }
                hit
            })
            .collect();

        boosted.sort_by(|a, b| b.score.total_cmp(&a.score));
        boosted
    }
}
