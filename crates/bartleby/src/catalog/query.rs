//! Client-side filtering and sorting of catalog listings.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{Document, InventoryItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub column: String,
    pub direction: SortDirection,
}

/// A catalog row that can be filtered and sorted by column name.
pub trait CatalogRecord: Serialize {
    /// Columns compared as numbers. Missing values count as 0.
    const NUMERIC_COLUMNS: &'static [&'static str];

    /// Columns matched by free-text search. `None` searches every column.
    const SEARCH_COLUMNS: Option<&'static [&'static str]>;

    fn category(&self) -> Option<&str>;
}

impl CatalogRecord for InventoryItem {
    const NUMERIC_COLUMNS: &'static [&'static str] = &["import_cost", "retail_price"];
    const SEARCH_COLUMNS: Option<&'static [&'static str]> =
        Some(&["name", "description", "material", "origin_source"]);

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

impl CatalogRecord for Document {
    const NUMERIC_COLUMNS: &'static [&'static str] = &["publication_year"];
    const SEARCH_COLUMNS: Option<&'static [&'static str]> = None;

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// Category filter, free-text search and sort order for a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub category: Option<String>,
    pub search: String,
    pub sort: Option<SortState>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = (!category.is_empty()).then_some(category);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn sorted_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortState {
            column: column.into(),
            direction,
        });
        self
    }

    /// Same column flips the direction, a new column starts ascending.
    pub fn toggle_sort(&mut self, column: &str) {
        self.sort = Some(match self.sort.take() {
            Some(state) if state.column == column => SortState {
                column: state.column,
                direction: state.direction.flipped(),
            },
            _ => SortState {
                column: column.to_string(),
                direction: SortDirection::Asc,
            },
        });
    }

    /// Returns the matching records in display order.
    pub fn apply<'a, R: CatalogRecord>(&self, records: &'a [R]) -> Vec<&'a R> {
        let needle = self.search.trim().to_lowercase();

        let mut rows: Vec<(&R, Value)> = records
            .iter()
            .filter(|r| match &self.category {
                Some(category) => r.category() == Some(category.as_str()),
                None => true,
            })
            .map(|r| (r, serde_json::to_value(r).unwrap_or(Value::Null)))
            .filter(|(_, value)| needle.is_empty() || matches_text::<R>(value, &needle))
            .collect();

        if let Some(sort) = &self.sort {
            let numeric = R::NUMERIC_COLUMNS.contains(&sort.column.as_str());
            rows.sort_by(|(_, a), (_, b)| {
                let ordering = if numeric {
                    number_of(a.get(&sort.column))
                        .partial_cmp(&number_of(b.get(&sort.column)))
                        .unwrap_or(Ordering::Equal)
                } else {
                    text_of(a.get(&sort.column))
                        .to_lowercase()
                        .cmp(&text_of(b.get(&sort.column)).to_lowercase())
                };
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        rows.into_iter().map(|(r, _)| r).collect()
    }
}

/// Distinct non-empty categories in first-seen order.
pub fn categories<R: CatalogRecord>(records: &[R]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for category in records.iter().filter_map(|r| r.category()) {
        if !category.is_empty() && !seen.iter().any(|c| c == category) {
            seen.push(category.to_string());
        }
    }
    seen
}

fn matches_text<R: CatalogRecord>(value: &Value, needle: &str) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    match R::SEARCH_COLUMNS {
        Some(columns) => columns
            .iter()
            .any(|c| text_of(object.get(*c)).to_lowercase().contains(needle)),
        None => object
            .values()
            .any(|v| text_of(Some(v)).to_lowercase().contains(needle)),
    }
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(false)) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn number_of(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inventory() -> Vec<InventoryItem> {
        serde_json::from_value(json!([
            {"id": 1, "name": "Oak table", "category": "Furniture", "material": "Oak", "retail_price": 450},
            {"id": 2, "name": "brass lamp", "category": "Lighting", "origin_source": "Morocco", "retail_price": "80"},
            {"id": 3, "name": "Armchair", "category": "Furniture", "description": "Velvet, oak legs"},
            {"id": 4, "name": "Candle", "category": "", "retail_price": null}
        ]))
        .unwrap()
    }

    fn documents() -> Vec<Document> {
        serde_json::from_value(json!([
            {"id": 10, "title": "Walden", "author": "Thoreau", "publication_year": 1854, "category": "Books"},
            {"id": 11, "title": "Self-Reliance", "author": "Emerson", "publication_year": "1841", "category": "Articles"},
            {"id": 12, "title": "Nature", "author": "Emerson", "category": "Books"}
        ]))
        .unwrap()
    }

    fn ids<R>(rows: Vec<&R>, id: impl Fn(&R) -> i64) -> Vec<i64> {
        rows.into_iter().map(id).collect()
    }

    #[test]
    fn test_no_query_keeps_order() {
        let items = inventory();
        let rows = RecordQuery::new().apply(&items);
        assert_eq!(ids(rows, |i| i.id), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_category_filter() {
        let items = inventory();
        let rows = RecordQuery::new().with_category("Furniture").apply(&items);
        assert_eq!(ids(rows, |i| i.id), vec![1, 3]);
    }

    #[test]
    fn test_inventory_search_fields() {
        let items = inventory();
        let rows = RecordQuery::new().with_search("OAK").apply(&items);
        assert_eq!(ids(rows, |i| i.id), vec![1, 3]);

        let rows = RecordQuery::new().with_search("morocco").apply(&items);
        assert_eq!(ids(rows, |i| i.id), vec![2]);

        // category is not a searched inventory column
        let rows = RecordQuery::new().with_search("lighting").apply(&items);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_document_search_covers_every_field() {
        let docs = documents();
        let rows = RecordQuery::new().with_search("emerson").apply(&docs);
        assert_eq!(ids(rows, |d| d.id), vec![11, 12]);

        let rows = RecordQuery::new().with_search("1854").apply(&docs);
        assert_eq!(ids(rows, |d| d.id), vec![10]);
    }

    #[test]
    fn test_numeric_sort_treats_missing_as_zero() {
        let items = inventory();
        let rows = RecordQuery::new()
            .sorted_by("retail_price", SortDirection::Asc)
            .apply(&items);
        assert_eq!(ids(rows, |i| i.id), vec![3, 4, 2, 1]);

        let rows = RecordQuery::new()
            .sorted_by("retail_price", SortDirection::Desc)
            .apply(&items);
        assert_eq!(ids(rows, |i| i.id), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_text_sort_is_case_insensitive() {
        let items = inventory();
        let rows = RecordQuery::new()
            .sorted_by("name", SortDirection::Asc)
            .apply(&items);
        assert_eq!(ids(rows, |i| i.id), vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_publication_year_sorts_numerically() {
        let docs = documents();
        let rows = RecordQuery::new()
            .sorted_by("publication_year", SortDirection::Desc)
            .apply(&docs);
        assert_eq!(ids(rows, |d| d.id), vec![10, 11, 12]);
    }

    #[test]
    fn test_toggle_sort() {
        let mut query = RecordQuery::new();
        query.toggle_sort("name");
        assert_eq!(query.sort.as_ref().unwrap().direction, SortDirection::Asc);
        query.toggle_sort("name");
        assert_eq!(query.sort.as_ref().unwrap().direction, SortDirection::Desc);
        query.toggle_sort("color");
        let sort = query.sort.unwrap();
        assert_eq!(sort.column, "color");
        assert_eq!(sort.direction, SortDirection::Asc);
    }

    #[test]
    fn test_categories_first_seen_order() {
        assert_eq!(categories(&inventory()), vec!["Furniture", "Lighting"]);
        assert_eq!(categories(&documents()), vec!["Books", "Articles"]);
    }

    #[test]
    fn test_empty_category_means_all() {
        let query = RecordQuery::new().with_category("");
        assert_eq!(query.category, None);
    }
}
