//! 关键词回退检索
//!
//! 嵌入服务不可用时的确定性打分：查询分词（小写、去停用词）后
//! 按标题 x3 / 正文 x2 / 标签 x1 的词重叠加权，整句子串命中再加分；
//! 得分 >= 阈值者按分数降序取前 top_k。相同语料与查询总是得到相同排序。

use std::collections::HashSet;

use crate::config::RetrievalSection;
use crate::retrieval::{KnowledgeArticle, RetrievedArticle, SearchOutcome};

const EXCERPT_CHARS: usize = 200;

/// 过滤掉的常见虚词
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "i", "my", "me", "we", "you", "it", "is", "am", "are", "was", "be", "do",
    "does", "did", "to", "of", "in", "on", "at", "for", "and", "or", "not", "no", "how", "what",
    "when", "can", "cant", "with", "this", "that", "have", "has", "get", "need", "want", "please",
];

/// 词重叠权重：标题 / 正文 / 标签
const TITLE_WEIGHT: f32 = 3.0;
const CONTENT_WEIGHT: f32 = 2.0;
const TAGS_WEIGHT: f32 = 1.0;

/// 查询分词：小写字母数字词，去停用词与单字符
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn overlap(query: &HashSet<String>, field: &str) -> f32 {
    let field_tokens = tokenize(field);
    query.intersection(&field_tokens).count() as f32
}

/// 关键词索引：持有原始文章列表，打分时逐篇扫描
pub struct KeywordIndex {
    articles: Vec<KnowledgeArticle>,
    min_score: f32,
    top_k: usize,
}

impl KeywordIndex {
    pub fn new(articles: Vec<KnowledgeArticle>, cfg: &RetrievalSection) -> Self {
        Self {
            articles,
            min_score: cfg.min_keyword_score,
            top_k: cfg.top_k,
        }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    fn score(&self, article: &KnowledgeArticle, query_tokens: &HashSet<String>, query_lower: &str) -> f32 {
        let tags = article.tags.as_deref().unwrap_or("");
        let mut score = overlap(query_tokens, &article.title) * TITLE_WEIGHT
            + overlap(query_tokens, &article.content) * CONTENT_WEIGHT
            + overlap(query_tokens, tags) * TAGS_WEIGHT;

        // 整句子串命中的额外加分
        if article.title.to_lowercase().contains(query_lower) {
            score += TITLE_WEIGHT;
        }
        if article.content.to_lowercase().contains(query_lower) {
            score += CONTENT_WEIGHT;
        }
        if tags.to_lowercase().contains(query_lower) {
            score += TAGS_WEIGHT;
        }
        score
    }

    pub fn search(&self, query: &str) -> SearchOutcome {
        if self.articles.is_empty() {
            return SearchOutcome::failure(query, "knowledge base is empty");
        }

        let query_lower = query.trim().to_lowercase();
        let query_tokens = tokenize(query);

        let mut scored: Vec<(f32, &KnowledgeArticle)> = self
            .articles
            .iter()
            .map(|a| (self.score(a, &query_tokens, &query_lower), a))
            .filter(|(score, _)| *score >= self.min_score)
            .collect();
        // 稳定排序：同分保持语料顺序，保证结果可复现
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let articles = scored
            .into_iter()
            .take(self.top_k)
            .map(|(score, a)| RetrievedArticle {
                title: a.title.clone(),
                excerpt: a.content.chars().take(EXCERPT_CHARS).collect(),
                content: a.content.clone(),
                relevance_score: score,
            })
            .collect();
        SearchOutcome::hits(query, articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, content: &str, tags: &str) -> KnowledgeArticle {
        KnowledgeArticle {
            title: title.to_string(),
            content: content.to_string(),
            tags: Some(tags.to_string()),
        }
    }

    fn corpus() -> Vec<KnowledgeArticle> {
        vec![
            article(
                "Password Reset",
                "Open the app, tap 'Forgot password' and follow the reset link sent to your email.",
                "login, password, account",
            ),
            article(
                "Subscription Tiers",
                "CultPass offers basic and premium subscription tiers with monthly quotas.",
                "subscription, billing",
            ),
            article(
                "Canceling a Reservation",
                "Reservations can be cancelled up to 24 hours before the experience starts.",
                "reservation, cancel",
            ),
        ]
    }

    fn index(articles: Vec<KnowledgeArticle>) -> KeywordIndex {
        KeywordIndex::new(articles, &RetrievalSection::default())
    }

    #[test]
    fn test_tokenize_drops_stop_words() {
        let tokens = tokenize("How do I reset my password?");
        assert!(tokens.contains("reset"));
        assert!(tokens.contains("password"));
        assert!(!tokens.contains("how"));
        assert!(!tokens.contains("my"));
    }

    #[test]
    fn test_title_weight_dominates() {
        let outcome = index(corpus()).search("password reset");
        assert!(outcome.success);
        assert_eq!(outcome.articles[0].title, "Password Reset");
        assert!(outcome.articles[0].relevance_score >= 2.0);
    }

    #[test]
    fn test_threshold_filters_weak_matches() {
        let outcome = index(corpus()).search("quantum blockchain weather");
        assert!(outcome.success);
        assert_eq!(outcome.count, 0);
    }

    #[test]
    fn test_empty_corpus_is_failure() {
        let outcome = index(vec![]).search("password");
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_deterministic_ranking() {
        let a = index(corpus()).search("cancel my reservation");
        let b = index(corpus()).search("cancel my reservation");
        assert_eq!(a.count, b.count);
        for (x, y) in a.articles.iter().zip(b.articles.iter()) {
            assert_eq!(x.title, y.title);
            assert_eq!(x.relevance_score, y.relevance_score);
        }
    }

    #[test]
    fn test_top_k_limit() {
        let mut articles = corpus();
        for i in 0..5 {
            articles.push(article(
                &format!("Password Article {}", i),
                "More password guidance for account login issues.",
                "password",
            ));
        }
        let outcome = index(articles).search("password login");
        assert!(outcome.count <= 3);
    }
}
