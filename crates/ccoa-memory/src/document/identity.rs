use serde::{Deserialize, Serialize};

use super::splitter::Chunk;

/// Per-chunk metadata stored next to the embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub chunk_index: usize,
}

/// Composite chunk identifier `{file_path}_{chunk_index}`.
///
/// Unique only as long as relative paths are unique within a repository.
#[must_use]
pub fn chunk_id(file_path: &str, chunk_index: usize) -> String {
    format!("{file_path}_{chunk_index}")
}

/// Parallel sequences ready for upsert: `texts[i]`, `metadatas[i]` and
/// `ids[i]` describe the same chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkBatch {
    pub texts: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub ids: Vec<String>,
}

impl ChunkBatch {
    /// Append the chunks of one file, numbering them from zero.
    pub fn push_file(&mut self, file_path: &str, chunks: Vec<Chunk>) {
        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            self.ids.push(chunk_id(file_path, chunk_index));
            self.metadatas.push(ChunkMetadata {
                file_path: file_path.to_owned(),
                chunk_index,
            });
            self.texts.push(chunk.content);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of distinct files contributing chunks.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.metadatas.iter().filter(|m| m.chunk_index == 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> Chunk {
        Chunk {
            content: content.into(),
            offset: 0,
        }
    }

    #[test]
    fn ids_follow_path_and_index() {
        let mut batch = ChunkBatch::default();
        batch.push_file("src/app.py", vec![chunk("a"), chunk("b"), chunk("c")]);
        assert_eq!(batch.ids, vec!["src/app.py_0", "src/app.py_1", "src/app.py_2"]);
        assert_eq!(batch.metadatas[2].chunk_index, 2);
        assert_eq!(batch.metadatas[2].file_path, "src/app.py");
        assert_eq!(batch.texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn index_restarts_per_file() {
        let mut batch = ChunkBatch::default();
        batch.push_file("a.rs", vec![chunk("1"), chunk("2")]);
        batch.push_file("b.rs", vec![chunk("3")]);
        assert_eq!(batch.ids, vec!["a.rs_0", "a.rs_1", "b.rs_0"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.file_count(), 2);
    }

    #[test]
    fn assignment_is_deterministic() {
        let build = || {
            let mut b = ChunkBatch::default();
            b.push_file("x.go", vec![chunk("package main"), chunk("func main() {}")]);
            b
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn file_without_chunks_adds_nothing() {
        let mut batch = ChunkBatch::default();
        batch.push_file("empty.md", Vec::new());
        assert!(batch.is_empty());
    }

    #[test]
    fn metadata_serializes_with_field_names() {
        let json = serde_json::to_value(ChunkMetadata {
            file_path: "main.py".into(),
            chunk_index: 0,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"file_path": "main.py", "chunk_index": 0}));
    }
}
