use neo4rs::{Graph, Query};

use crate::GraphError;

/// Writes an ingested document as a `Document` node with ordered `Chunk` nodes.
///
/// `(:Document)-[:HAS_CHUNK]->(:Chunk)` for every chunk, and
/// `(:Chunk)-[:NEXT]->(:Chunk)` between neighbours in document order.
pub struct ChunkGraphIndexer {
    graph: Graph,
}

impl ChunkGraphIndexer {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn init_schema(&self) -> anyhow::Result<()> {
        use anyhow::Context;

        for statement in SCHEMA_STATEMENTS {
            self.graph
                .run(Query::new(statement.to_string()))
                .await
                .with_context(|| format!("Failed to run schema statement: {}", statement))?;
        }
        tracing::info!("Graph indexes ready");
        Ok(())
    }

    pub async fn index_document(
        &self,
        doc_id: &str,
        result: &ingest::IngestionResult,
    ) -> Result<(), GraphError> {
        let chunk_count = result.chunks.len();

        for step in index_steps(chunk_count) {
            let query = match step {
                IndexStep::Upsert => document_query(doc_id, result),
                // Drop chunks left over from an earlier, longer version of the document.
                IndexStep::Prune => Query::new(PRUNE_CHUNKS.to_string())
                    .param("doc_id", doc_id.to_string())
                    .param("count", chunk_count as i64),
                IndexStep::Link => {
                    Query::new(LINK_CHUNKS.to_string()).param("doc_id", doc_id.to_string())
                }
            };
            self.run(query).await?;
        }

        tracing::info!(doc_id = %doc_id, chunks = chunk_count, "Indexed document graph");
        Ok(())
    }

    async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph
            .run(query)
            .await
            .map_err(|e| GraphError::Query(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexStep {
    Upsert,
    Prune,
    Link,
}

/// Statements run for a document of `chunk_count` chunks, in order.
fn index_steps(chunk_count: usize) -> Vec<IndexStep> {
    let mut steps = vec![IndexStep::Upsert, IndexStep::Prune];
    if chunk_count > 1 {
        steps.push(IndexStep::Link);
    }
    steps
}

const SCHEMA_STATEMENTS: [&str; 2] = [
    "CREATE INDEX document_id_index IF NOT EXISTS FOR (d:Document) ON (d.id)",
    "CREATE INDEX chunk_id_index IF NOT EXISTS FOR (c:Chunk) ON (c.id)",
];

const UPSERT_DOCUMENT: &str = r#"
MERGE (d:Document {id: $doc_id})
SET d.filename = $filename,
    d.byte_size = $byte_size,
    d.parser = $parser,
    d.chunk_size = $chunk_size,
    d.chunk_overlap = $chunk_overlap
WITH d
UNWIND range(0, size($chunks) - 1) AS i
MERGE (c:Chunk {id: $doc_id + ':' + toString(i)})
SET c.index = i,
    c.text = $chunks[i]
MERGE (d)-[:HAS_CHUNK]->(c)
"#;

const PRUNE_CHUNKS: &str = r#"
MATCH (:Document {id: $doc_id})-[:HAS_CHUNK]->(c:Chunk)
WHERE c.index >= $count
DETACH DELETE c
"#;

const LINK_CHUNKS: &str = r#"
MATCH (d:Document {id: $doc_id})-[:HAS_CHUNK]->(a:Chunk)
MATCH (d)-[:HAS_CHUNK]->(b:Chunk {index: a.index + 1})
MERGE (a)-[:NEXT]->(b)
"#;

fn document_query(doc_id: &str, result: &ingest::IngestionResult) -> Query {
    Query::new(UPSERT_DOCUMENT.to_string())
        .param("doc_id", doc_id.to_string())
        .param("filename", result.filename.clone())
        .param("byte_size", result.byte_size as i64)
        .param("parser", result.metadata.parser.clone())
        .param("chunk_size", result.metadata.chunk_size as i64)
        .param("chunk_overlap", result.metadata.chunk_overlap as i64)
        .param("chunks", result.chunks.clone())
}
