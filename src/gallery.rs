//! Image library browsing: filter, sort and paginate image records.
//!
//! [`apply`] is a pure function of its inputs. It is recomputed from scratch
//! on every query change, which keeps it trivially idempotent.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// An image in the library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Name of the image set this image belongs to.
    #[serde(default)]
    pub set_name: String,
    /// ISO 8601 upload timestamp; compares correctly as a string.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Whether the image has an embedding and can be found by search.
    #[serde(default)]
    pub has_embedding: bool,
    #[serde(default)]
    pub url: Option<String>,
}

/// Tri-state filter on [`ImageRecord::has_embedding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmbeddingFilter {
    #[default]
    Any,
    WithEmbedding,
    WithoutEmbedding,
}

impl EmbeddingFilter {
    fn matches(self, record: &ImageRecord) -> bool {
        match self {
            EmbeddingFilter::Any => true,
            EmbeddingFilter::WithEmbedding => record.has_embedding,
            EmbeddingFilter::WithoutEmbedding => !record.has_embedding,
        }
    }
}

/// Sort order for gallery results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GallerySort {
    #[default]
    Newest,
    Oldest,
    /// By filename, case-insensitive.
    Name,
    /// By set name, then filename.
    Collection,
}

/// Everything the gallery view can ask for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryQuery {
    /// Free text matched against description, filename and set name.
    pub search: String,
    /// Only show this set, if given.
    pub set_name: Option<String>,
    pub embedding: EmbeddingFilter,
    pub sort: GallerySort,
    /// 1-indexed; clamped into range.
    pub page: usize,
    pub page_size: usize,
}

impl Default for GalleryQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            set_name: None,
            embedding: EmbeddingFilter::Any,
            sort: GallerySort::Newest,
            page: 1,
            page_size: 20,
        }
    }
}

/// One window of filtered, sorted results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryPage {
    pub items: Vec<ImageRecord>,
    /// The page actually shown, after clamping.
    pub page: usize,
    pub page_size: usize,
    /// Records matching the filters, across all pages.
    pub total_items: usize,
    pub total_pages: usize,
}

/// Filter, sort and paginate `records` according to `query`.
pub fn apply(records: &[ImageRecord], query: &GalleryQuery) -> GalleryPage {
    let needle = query.search.trim().to_lowercase();
    let mut matched: Vec<&ImageRecord> = records
        .iter()
        .filter(|r| needle.is_empty() || matches_text(r, &needle))
        .filter(|r| match &query.set_name {
            Some(name) => &r.set_name == name,
            None => true,
        })
        .filter(|r| query.embedding.matches(r))
        .collect();

    // `sort_by` is stable: ties keep their input order.
    matched.sort_by(|a, b| compare(a, b, query.sort));

    let page_size = query.page_size.max(1);
    let total_items = matched.len();
    let total_pages = total_items.div_ceil(page_size);
    let page = query.page.clamp(1, total_pages.max(1));

    let items = matched
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    GalleryPage {
        items,
        page,
        page_size,
        total_items,
        total_pages,
    }
}

/// Sorted, de-duplicated set names, for the set filter dropdown.
pub fn set_names(records: &[ImageRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.set_name.clone())
        .filter(|n| !n.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn matches_text(record: &ImageRecord, needle: &str) -> bool {
    record
        .description
        .as_deref()
        .is_some_and(|d| d.to_lowercase().contains(needle))
        || record.filename.to_lowercase().contains(needle)
        || record.set_name.to_lowercase().contains(needle)
}

fn compare(a: &ImageRecord, b: &ImageRecord, sort: GallerySort) -> Ordering {
    match sort {
        // Records without a timestamp go last in both directions.
        GallerySort::Newest => match (&a.created_at, &b.created_at) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        GallerySort::Oldest => match (&a.created_at, &b.created_at) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        GallerySort::Name => a.filename.to_lowercase().cmp(&b.filename.to_lowercase()),
        GallerySort::Collection => a
            .set_name
            .to_lowercase()
            .cmp(&b.set_name.to_lowercase())
            .then_with(|| a.filename.to_lowercase().cmp(&b.filename.to_lowercase())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, set: &str, desc: &str, at: Option<&str>, emb: bool) -> ImageRecord {
        ImageRecord {
            id: id.into(),
            filename: format!("{id}.png"),
            description: Some(desc.into()),
            set_name: set.into(),
            created_at: at.map(str::to_string),
            has_embedding: emb,
            url: None,
        }
    }

    fn library() -> Vec<ImageRecord> {
        vec![
            rec("apple", "food", "A red apple", Some("2024-03-01T10:00:00Z"), true),
            rec("bus", "transport", "A city bus", Some("2024-01-15T08:00:00Z"), false),
            rec("bread", "food", "Sliced bread", Some("2024-05-20T12:00:00Z"), true),
            rec("doctor", "health", "Doctor with stethoscope", None, true),
            rec("train", "transport", "Train at platform", Some("2024-02-02T09:30:00Z"), true),
        ]
    }

    fn ids(page: &GalleryPage) -> Vec<&str> {
        page.items.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn newest_first_with_undated_last() {
        let page = apply(&library(), &GalleryQuery::default());
        assert_eq!(ids(&page), vec!["bread", "apple", "train", "bus", "doctor"]);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn oldest_first() {
        let q = GalleryQuery {
            sort: GallerySort::Oldest,
            ..Default::default()
        };
        assert_eq!(
            ids(&apply(&library(), &q)),
            vec!["bus", "train", "apple", "bread", "doctor"]
        );
    }

    #[test]
    fn search_matches_description_and_set_case_insensitively() {
        let q = GalleryQuery {
            search: "FOOD".into(),
            sort: GallerySort::Name,
            ..Default::default()
        };
        assert_eq!(ids(&apply(&library(), &q)), vec!["apple", "bread"]);

        let q = GalleryQuery {
            search: "stethoscope".into(),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&library(), &q)), vec!["doctor"]);
    }

    #[test]
    fn search_matches_filename() {
        let q = GalleryQuery {
            search: "Train.PNG".into(),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&library(), &q)), vec!["train"]);
    }

    #[test]
    fn set_and_embedding_filters_combine() {
        let q = GalleryQuery {
            set_name: Some("transport".into()),
            embedding: EmbeddingFilter::WithEmbedding,
            ..Default::default()
        };
        assert_eq!(ids(&apply(&library(), &q)), vec!["train"]);

        let q = GalleryQuery {
            embedding: EmbeddingFilter::WithoutEmbedding,
            ..Default::default()
        };
        assert_eq!(ids(&apply(&library(), &q)), vec!["bus"]);
    }

    #[test]
    fn collection_sort_is_stable_on_ties() {
        let mut lib = library();
        lib.push(ImageRecord {
            id: "apple-2".into(),
            filename: "apple.png".into(),
            set_name: "food".into(),
            ..Default::default()
        });
        let q = GalleryQuery {
            sort: GallerySort::Collection,
            ..Default::default()
        };
        assert_eq!(
            ids(&apply(&lib, &q)),
            vec!["apple", "apple-2", "bread", "doctor", "bus", "train"]
        );
    }

    #[test]
    fn pagination_windows_and_clamps() {
        let q = GalleryQuery {
            sort: GallerySort::Name,
            page_size: 2,
            page: 2,
            ..Default::default()
        };
        let page = apply(&library(), &q);
        assert_eq!(ids(&page), vec!["bus", "doctor"]);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 5);

        let past_end = GalleryQuery { page: 99, ..q };
        let page = apply(&library(), &past_end);
        assert_eq!(page.page, 3);
        assert_eq!(ids(&page), vec!["train"]);
    }

    #[test]
    fn empty_result_is_page_one_of_zero() {
        let q = GalleryQuery {
            search: "submarine".into(),
            page: 4,
            ..Default::default()
        };
        let page = apply(&library(), &q);
        assert!(page.items.is_empty());
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn applying_twice_is_identical() {
        let q = GalleryQuery {
            search: "a".into(),
            sort: GallerySort::Collection,
            page_size: 3,
            ..Default::default()
        };
        let lib = library();
        assert_eq!(apply(&lib, &q), apply(&lib, &q));
    }

    #[test]
    fn set_names_sorted_unique() {
        assert_eq!(set_names(&library()), vec!["food", "health", "transport"]);
    }
}
