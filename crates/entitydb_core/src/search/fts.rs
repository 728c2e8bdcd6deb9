//! SQLite FTS5-backed [`SearchIndex`].
//!
//! # Invariants
//! - Every query is scoped to one `index_name`.
//! - Result ordering is deterministic by rank, then document id.
//! - FTS syntax failures surface as `SearchError::UnsupportedQuery`.

use crate::db::ensure_migrated;
use crate::search::{
    SearchDocument, SearchError, SearchHit, SearchIndex, SearchQuery, SearchResult,
};
use rusqlite::{params, Connection};

/// FTS5 index over a borrowed, migrated connection.
pub struct SqliteFtsIndex<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFtsIndex<'conn> {
    pub fn try_new(conn: &'conn Connection) -> SearchResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }

    fn replace_document(&self, index_name: &str, document: &SearchDocument) -> SearchResult<()> {
        self.remove_document(index_name, &document.id)?;
        self.conn.execute(
            "INSERT INTO search_documents (content, index_name, doc_id) VALUES (?1, ?2, ?3);",
            params![document.text(), index_name, document.id],
        )?;
        Ok(())
    }

    fn remove_document(&self, index_name: &str, document_id: &str) -> SearchResult<()> {
        self.conn.execute(
            "DELETE FROM search_documents WHERE index_name = ?1 AND doc_id = ?2;",
            params![index_name, document_id],
        )?;
        Ok(())
    }
}

impl SearchIndex for SqliteFtsIndex<'_> {
    fn put_document(&self, index_name: &str, document: &SearchDocument) -> SearchResult<()> {
        self.replace_document(index_name, document)
    }

    fn put_documents(&self, index_name: &str, documents: &[SearchDocument]) -> SearchResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for document in documents {
            self.replace_document(index_name, document)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_document(&self, index_name: &str, document_id: &str) -> SearchResult<()> {
        self.remove_document(index_name, document_id)
    }

    fn search(&self, index_name: &str, query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
        let Some(match_expr) = build_match_expression(query) else {
            return Ok(Vec::new());
        };
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT
                doc_id,
                snippet(search_documents, 0, '[', ']', ' ... ', 10) AS snippet
             FROM search_documents
             WHERE search_documents MATCH ?1
               AND index_name = ?2
             ORDER BY bm25(search_documents), doc_id ASC
             LIMIT ?3",
        )?;
        let mut rows = stmt
            .query(params![match_expr, index_name, i64::from(query.limit)])
            .map_err(|err| map_query_error(err, &match_expr))?;
        let mut hits = Vec::new();

        while let Some(row) = rows
            .next()
            .map_err(|err| map_query_error(err, &match_expr))?
        {
            hits.push(SearchHit {
                document_id: row.get("doc_id")?,
                snippet: row.get("snippet")?,
            });
        }

        Ok(hits)
    }
}

fn build_match_expression(query: &SearchQuery) -> Option<String> {
    if query.filters.is_empty() {
        return None;
    }

    let terms = if query.raw_syntax {
        query.filters.clone()
    } else {
        query
            .filters
            .iter()
            .map(|filter| escape_fts_term(filter))
            .collect()
    };

    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::UnsupportedQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }
    err.into()
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
                || msg.contains("no such column")
        }
        _ => false,
    }
}
