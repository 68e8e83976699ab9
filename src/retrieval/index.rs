//! 语义索引：文章分块、向量化与余弦近邻检索
//!
//! 文章渲染为 "Title: ...\nContent: ...\nTags: ..." 后按重叠窗口分块，
//! 查询时将报告距离转为相似度分（1 - distance，截断到 [0,1]），
//! 命中块通过 "Content:" 标记拆出标题与 <=200 字符摘录。

use std::sync::Arc;

use crate::config::RetrievalSection;
use crate::llm::EmbeddingProvider;
use crate::retrieval::{KnowledgeArticle, RetrievedArticle, SearchOutcome};

/// 摘录最大字符数
const EXCERPT_CHARS: usize = 200;

/// 文档块：保留来源标题用于窗口不含 "Title:" 前缀时的标题恢复
#[derive(Clone, Debug)]
pub struct Chunk {
    pub text: String,
    pub source_title: String,
}

/// 分块器：目标窗口大小与相邻窗口重叠（字符数），优先在分隔符处断开
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<&'static str>,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: vec!["\n\n", "\n", ". ", "! ", "? ", " "],
        }
    }

    /// 将文档分割为重叠窗口（UTF-8 安全）
    pub fn chunk(&self, source_title: &str, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        if total_chars == 0 {
            return chunks;
        }

        let mut current_idx = 0;

        while current_idx < total_chars {
            let target_end = (current_idx + self.chunk_size).min(total_chars);
            let mut actual_end = target_end;

            // 不在文档末尾时尝试在分隔符处断开
            if target_end < total_chars {
                let slice: String = chars[current_idx..target_end].iter().collect();
                for sep in &self.separators {
                    if let Some(pos) = slice.rfind(sep) {
                        let chars_to_sep = slice[..pos].chars().count() + sep.chars().count();
                        if chars_to_sep > 0 {
                            actual_end = current_idx + chars_to_sep;
                            break;
                        }
                    }
                }
            }

            // 至少前进一个字符
            if actual_end <= current_idx {
                actual_end = (current_idx + 1).min(total_chars);
            }

            let chunk_text: String = chars[current_idx..actual_end].iter().collect();
            let trimmed = chunk_text.trim();
            if !trimmed.is_empty() {
                chunks.push(Chunk {
                    text: trimmed.to_string(),
                    source_title: source_title.to_string(),
                });
            }

            let overlap = self.chunk_overlap.min(actual_end - current_idx);
            let next_start = actual_end.saturating_sub(overlap);
            current_idx = if next_start > current_idx {
                next_start
            } else {
                actual_end
            };
        }

        chunks
    }
}

/// 将文章渲染为索引文本
pub fn render_article(article: &KnowledgeArticle) -> String {
    format!(
        "Title: {}\nContent: {}\nTags: {}",
        article.title,
        article.content,
        article.tags.as_deref().unwrap_or("")
    )
}

/// 语义索引：(块, 向量) 列表 + 嵌入提供方
pub struct SemanticIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl SemanticIndex {
    /// 对全部文章分块并批量嵌入；任何一块失败即整体失败（调用方回退关键词模式）
    pub fn build(
        articles: &[KnowledgeArticle],
        embedder: Arc<dyn EmbeddingProvider>,
        cfg: &RetrievalSection,
    ) -> Result<Self, String> {
        let chunker = Chunker::new(cfg.chunk_size, cfg.chunk_overlap);
        let mut chunks = Vec::new();
        for article in articles {
            let text = render_article(article);
            chunks.extend(chunker.chunk(&article.title, &text));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_many(&texts)?;
        if embeddings.len() != chunks.len() {
            return Err(format!(
                "embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                embeddings.len()
            ));
        }
        if embeddings.iter().any(|e| e.is_empty()) {
            return Err("empty embedding returned for a chunk".to_string());
        }

        Ok(Self {
            entries: chunks.into_iter().zip(embeddings).collect(),
            embedder,
            top_k: cfg.top_k,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn search(&self, query: &str) -> SearchOutcome {
        if self.entries.is_empty() {
            return SearchOutcome::failure(query, "knowledge base is empty");
        }

        let query_embedding = match self.embedder.embed_sync(query) {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => return SearchOutcome::failure(query, "empty query embedding"),
            Err(e) => return SearchOutcome::failure(query, e),
        };

        let mut scored: Vec<(f32, &Chunk)> = self
            .entries
            .iter()
            .map(|(chunk, emb)| {
                let distance = 1.0 - cosine_similarity(&query_embedding, emb);
                ((1.0 - distance).clamp(0.0, 1.0), chunk)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let articles = scored
            .into_iter()
            .take(self.top_k)
            .map(|(score, chunk)| to_retrieved(chunk, score))
            .collect();
        SearchOutcome::hits(query, articles)
    }
}

/// 命中块 -> 摘录：按 "Content:" 标记恢复标题与正文
fn to_retrieved(chunk: &Chunk, score: f32) -> RetrievedArticle {
    let (title, body) = match chunk.text.split_once("Content:") {
        Some((head, tail)) => {
            let title = head.trim_start_matches("Title:").trim();
            let title = if title.is_empty() {
                chunk.source_title.clone()
            } else {
                title.to_string()
            };
            (title, tail.trim())
        }
        // 中段窗口没有标记，退回来源标题
        None => (chunk.source_title.clone(), chunk.text.as_str()),
    };
    // Tags 行不属于摘录正文
    let body = body.split("\nTags:").next().unwrap_or(body).trim();
    let excerpt: String = body.chars().take(EXCERPT_CHARS).collect();
    RetrievedArticle {
        title,
        excerpt,
        content: chunk.text.clone(),
        relevance_score: score,
    }
}

/// 余弦相似度
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    /// 测试用确定性嵌入：按词哈希到固定维度的词袋向量
    struct HashEmbedder;

    impl EmbeddingProvider for HashEmbedder {
        fn embed_sync(&self, text: &str) -> Result<Vec<f32>, String> {
            let mut v = vec![0.0f32; 16];
            for word in text.to_lowercase().split_whitespace() {
                let mut h = DefaultHasher::new();
                word.hash(&mut h);
                v[(h.finish() % 16) as usize] += 1.0;
            }
            Ok(v)
        }
    }

    fn retrieval_cfg() -> RetrievalSection {
        RetrievalSection::default()
    }

    fn article(title: &str, content: &str, tags: &str) -> KnowledgeArticle {
        KnowledgeArticle {
            title: title.to_string(),
            content: content.to_string(),
            tags: Some(tags.to_string()),
        }
    }

    #[test]
    fn test_chunking_overlap() {
        let chunker = Chunker::new(100, 20);
        let text = "one two three. ".repeat(30);
        let chunks = chunker.chunk("doc", &text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.text.is_empty());
            assert_eq!(chunk.source_title, "doc");
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);
    }

    #[test]
    fn test_title_recovery_and_excerpt() {
        let articles = vec![article(
            "Password Reset",
            "Open the app and tap 'Forgot password'. A reset link is sent to your email.",
            "login, password",
        )];
        let index =
            SemanticIndex::build(&articles, Arc::new(HashEmbedder), &retrieval_cfg()).unwrap();
        let outcome = index.search("How do I reset my password?");
        assert!(outcome.success);
        assert!(!outcome.articles.is_empty());
        let top = &outcome.articles[0];
        assert_eq!(top.title, "Password Reset");
        assert!(top.excerpt.starts_with("Open the app"));
        assert!(top.excerpt.chars().count() <= 200);
        assert!(top.relevance_score >= 0.0 && top.relevance_score <= 1.0);
    }

    #[test]
    fn test_empty_index_fails() {
        let index = SemanticIndex::build(&[], Arc::new(HashEmbedder), &retrieval_cfg()).unwrap();
        let outcome = index.search("anything");
        assert!(!outcome.success);
        assert_eq!(outcome.count, 0);
    }
}
