//! Best-effort synchronization of the secondary search index.
//!
//! # Invariants
//! - No method returns an index error to its caller; failures end here as
//!   log entries.
//! - Queries without filters never reach the index.

use crate::logging::{EventLog, LogFacade};
use crate::search::{
    SearchDocument, SearchDocumentBuilder, SearchError, SearchHit, SearchIndex, SearchQuery,
    SearchResult,
};

/// Index writer whose failures are absorbed and logged.
pub struct SearchSync<I, L = LogFacade> {
    index: I,
    log: L,
}

impl<I: SearchIndex> SearchSync<I> {
    pub fn new(index: I) -> Self {
        Self {
            index,
            log: LogFacade,
        }
    }
}

impl<I: SearchIndex, L: EventLog> SearchSync<I, L> {
    pub fn with_log<L2: EventLog>(self, log: L2) -> SearchSync<I, L2> {
        SearchSync {
            index: self.index,
            log,
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn put_document(&self, index_name: &str, builder: &impl SearchDocumentBuilder) {
        let document = builder.build();
        let outcome = self.index.put_document(index_name, &document);
        self.absorb(outcome, || {
            format!(
                "event=search_put module=search_sync status=error index={index_name} doc_id={}",
                document.id
            )
        });
    }

    pub fn put_documents<B: SearchDocumentBuilder>(&self, index_name: &str, builders: &[B]) {
        let documents = builders
            .iter()
            .map(SearchDocumentBuilder::build)
            .collect::<Vec<SearchDocument>>();
        let outcome = self.index.put_documents(index_name, &documents);
        self.absorb(outcome, || {
            let ids = documents
                .iter()
                .map(|document| document.id.as_str())
                .collect::<Vec<_>>()
                .join(",");
            format!(
                "event=search_put_batch module=search_sync status=error index={index_name} count={} doc_ids={ids}",
                documents.len()
            )
        });
    }

    /// Returns `None` for filterless queries and for any index failure.
    pub fn search_documents(
        &self,
        index_name: &str,
        query: &SearchQuery,
    ) -> Option<Vec<SearchHit>> {
        if query.filter_size() == 0 {
            return None;
        }

        match self.index.search(index_name, query) {
            Ok(hits) => Some(hits),
            Err(SearchError::UnsupportedQuery { query: expr, .. }) => {
                self.log.info(&format!(
                    "event=search_query module=search_sync status=unsupported index={index_name} query={expr}"
                ));
                None
            }
            Err(err) => {
                self.log.error(&format!(
                    "event=search_query module=search_sync status=error index={index_name} query={query} error={err}"
                ));
                None
            }
        }
    }

    /// Missing documents and other failures are indistinguishable to callers.
    pub fn delete_document(&self, index_name: &str, document_id: &str) {
        if let Err(err) = self.index.delete_document(index_name, document_id) {
            self.log.info(&format!(
                "event=search_delete module=search_sync status=error index={index_name} doc_id={document_id} error={err}"
            ));
        }
    }

    fn absorb(&self, outcome: SearchResult<()>, describe: impl FnOnce() -> String) {
        if let Err(err) = outcome {
            self.log.error(&format!("{} error={err}", describe()));
        }
    }
}
