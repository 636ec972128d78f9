//! Tantivy-based full-text search over stored reviews.

use crate::batch::BatchRecord;
use crate::pipeline::DocumentStatus;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter, ReloadPolicy};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("index error: {0}")]
    IndexError(#[from] tantivy::TantivyError),
    #[error("query parse error: {0}")]
    QueryError(#[from] tantivy::query::QueryParserError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A review matching a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub batch_key: String,
    pub id: u64,
    pub name: String,
}

struct Fields {
    batch_key: Field,
    id: Field,
    name: Field,
    analysis: Field,
}

/// Tantivy-based search index for reviewed documents.
pub struct SearchIndex {
    index: Index,
    fields: Fields,
}

impl SearchIndex {
    /// Open or create a search index at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SearchError> {
        let mut schema_builder = Schema::builder();
        let batch_key = schema_builder.add_text_field("batch_key", STRING | STORED);
        let id = schema_builder.add_u64_field("id", STORED);
        let name = schema_builder.add_text_field("name", TEXT | STORED);
        let analysis = schema_builder.add_text_field("analysis", TEXT);
        let schema: Schema = schema_builder.build();

        let index_path = path.as_ref();
        std::fs::create_dir_all(index_path)?;

        let index = Index::create_in_dir(index_path, schema)
            .or_else(|_| Index::open_in_dir(index_path))?;

        Ok(Self {
            index,
            fields: Fields {
                batch_key,
                id,
                name,
                analysis,
            },
        })
    }

    /// Like [`SearchIndex::open`], but a broken index only costs a warning.
    ///
    /// Reviews are stored without being indexed when this returns `None`.
    pub fn open_or_warn<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "search index unavailable; reviews will not be indexed");
                None
            }
        }
    }

    /// Index every reviewed entry of a batch, replacing earlier entries for the key
    pub fn index_batch(&self, key: &str, record: &BatchRecord) -> Result<usize, SearchError> {
        let mut index_writer: IndexWriter = self.index.writer_with_num_threads(1, 50_000_000)?;
        let f = &self.fields;

        index_writer.delete_term(tantivy::Term::from_field_text(f.batch_key, key));

        let mut indexed = 0;
        for entry in &record.entries {
            let Some(analysis) = &entry.analysis else {
                continue;
            };
            if entry.status == DocumentStatus::Failed {
                continue;
            }
            index_writer.add_document(doc!(
                f.batch_key => key,
                f.id => entry.id,
                f.name => entry.name.clone(),
                f.analysis => analysis.clone(),
            ))?;
            indexed += 1;
        }

        index_writer.commit()?;
        Ok(indexed)
    }

    /// Drop every indexed entry of a batch
    pub fn remove_batch(&self, key: &str) -> Result<(), SearchError> {
        let mut index_writer: IndexWriter = self.index.writer_with_num_threads(1, 50_000_000)?;
        index_writer.delete_term(tantivy::Term::from_field_text(self.fields.batch_key, key));
        index_writer.commit()?;
        Ok(())
    }

    /// Search reviews matching the query
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        let searcher = reader.searcher();
        let f = &self.fields;

        let query_parser = QueryParser::for_index(&self.index, vec![f.name, f.analysis]);
        let query = query_parser.parse_query(query_str)?;

        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut results = Vec::new();
        for (_score, doc_address) in top_docs {
            let retrieved_doc = searcher.doc::<tantivy::TantivyDocument>(doc_address)?;
            let batch_key = retrieved_doc.get_first(f.batch_key).and_then(|v| v.as_str());
            let id = retrieved_doc.get_first(f.id).and_then(|v| v.as_u64());
            let name = retrieved_doc.get_first(f.name).and_then(|v| v.as_str());

            if let (Some(batch_key), Some(id), Some(name)) = (batch_key, id, name) {
                results.push(SearchHit {
                    batch_key: batch_key.to_string(),
                    id,
                    name: name.to_string(),
                });
            }
        }

        Ok(results)
    }
}
