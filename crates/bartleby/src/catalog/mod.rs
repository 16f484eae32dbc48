//! The current inventory and document listings and the operations that change them.

pub mod query;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{info, info_span, warn, Instrument};

use crate::api::{
    CatalogApi, Document, ExportFormat, ExportKind, InventoryItem, SearchRequest, SearchResult,
};
use crate::error::{Result, ValidationError};

pub use query::{categories, CatalogRecord, RecordQuery, SortDirection, SortState};

pub const RESET_INVENTORY_PROMPT: &str =
    "Are you sure you want to reset the current inventory? This will delete all entries and images.";
pub const RESET_DOCUMENTS_PROMPT: &str =
    "Are you sure you want to reset the documents? This will delete all document entries.";

/// Table reset when no name is given.
pub const DEFAULT_INVENTORY_TABLE: &str = "products";

/// Category choice that means "no filter".
pub const ALL_CATEGORIES: &str = "All Categories";

/// Categories offered by the document search form.
pub const SEARCH_CATEGORIES: &[&str] = &[ALL_CATEGORIES, "Research", "Reports", "Articles", "Books"];

/// Asks the user to confirm a destructive action.
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> ConfirmPrompt for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset,
    Cancelled,
}

/// Downloaded export with the file name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    pub inventory: Vec<InventoryItem>,
    pub documents: Vec<Document>,
}

/// Holds the last fetched catalog. Every successful mutation is followed by a refresh.
pub struct CatalogStore {
    api: Arc<dyn CatalogApi>,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    generation: AtomicU64,
}

impl CatalogStore {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        Self {
            api,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Number of times the snapshot has been replaced.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Re-fetches both listings and replaces the snapshot.
    ///
    /// A listing that cannot be fetched is shown as empty.
    pub async fn refresh(&self) -> Arc<CatalogSnapshot> {
        let (inventory, documents) = async {
            tokio::join!(self.api.fetch_inventory(), self.api.fetch_documents())
        }
        .instrument(info_span!("refresh_catalog"))
        .await;

        let inventory = inventory.unwrap_or_else(|e| {
            warn!(error = %e, "No inventory data available");
            Vec::new()
        });
        let documents = documents.unwrap_or_else(|e| {
            warn!(error = %e, "No documents data available");
            Vec::new()
        });
        info!(
            inventory = inventory.len(),
            documents = documents.len(),
            "Catalog refreshed"
        );

        let snapshot = Arc::new(CatalogSnapshot {
            inventory,
            documents,
        });
        match self.snapshot.write() {
            Ok(mut guard) => *guard = Arc::clone(&snapshot),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&snapshot),
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        snapshot
    }

    /// Clears an inventory table after confirmation. Defaults to the `products` table.
    pub async fn reset_inventory(
        &self,
        table_name: Option<&str>,
        prompt: &dyn ConfirmPrompt,
    ) -> Result<ResetOutcome> {
        if !prompt.confirm(RESET_INVENTORY_PROMPT) {
            info!("Inventory reset cancelled");
            return Ok(ResetOutcome::Cancelled);
        }
        let table = table_name
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_INVENTORY_TABLE);
        self.api.reset_inventory(Some(table)).await?;
        info!(table, "Inventory reset");
        self.refresh().await;
        Ok(ResetOutcome::Reset)
    }

    pub async fn reset_documents(&self, prompt: &dyn ConfirmPrompt) -> Result<ResetOutcome> {
        if !prompt.confirm(RESET_DOCUMENTS_PROMPT) {
            info!("Documents reset cancelled");
            return Ok(ResetOutcome::Cancelled);
        }
        self.api.reset_documents().await?;
        info!("Documents reset");
        self.refresh().await;
        Ok(ResetOutcome::Reset)
    }

    /// Starts a new, empty inventory table under `name`.
    pub async fn create_inventory_table(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidTableName.into());
        }
        self.api.reset_inventory(Some(name)).await?;
        info!(table = name, "Inventory table created");
        self.refresh().await;
        Ok(())
    }

    /// Semantic document search. `All Categories` or an empty category searches everything.
    pub async fn search(&self, query: &str, category: Option<&str>) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
            .map(str::to_string);
        let request = SearchRequest {
            query: query.to_string(),
            category,
        };
        let results = self.api.search_documents(&request).await?;
        info!(hits = results.len(), "Document search finished");
        Ok(results)
    }

    pub async fn export(&self, kind: ExportKind, format: ExportFormat) -> Result<ExportFile> {
        let bytes = self.api.export(kind, format).await?;
        Ok(ExportFile {
            file_name: format!("{}.{}", kind, format),
            bytes,
        })
    }

    pub async fn download_document(&self, id: i64) -> Result<Vec<u8>> {
        Ok(self.api.download_document(id).await?)
    }
}
