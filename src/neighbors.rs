//! Fixed-capacity nearest-neighbor recall buffer, per §4.6.

use std::collections::{HashMap, VecDeque};

use crate::types::NeighborMatch;

#[derive(Debug, Clone)]
struct BufferedLine {
    raw: String,
    term_freq: HashMap<String, u32>,
    norm: f64,
    seq: u64,
}

fn term_freq_of(tokens: &[String]) -> HashMap<String, u32> {
    let mut freq = HashMap::new();
    for t in tokens {
        *freq.entry(t.clone()).or_insert(0) += 1;
    }
    freq
}

fn norm_of(freq: &HashMap<String, u32>) -> f64 {
    freq.values().map(|&c| (c as f64) * (c as f64)).sum::<f64>().sqrt()
}

fn cosine_similarity(
    query: &HashMap<String, u32>,
    query_norm: f64,
    candidate: &HashMap<String, u32>,
    candidate_norm: f64,
) -> f64 {
    if query_norm == 0.0 || candidate_norm == 0.0 {
        return 0.0;
    }
    let (small, large) = if query.len() <= candidate.len() {
        (query, candidate)
    } else {
        (candidate, query)
    };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, &count)| large.get(term).map(|&other| (count as f64) * (other as f64)))
        .sum();
    dot / (query_norm * candidate_norm)
}

/// Ring buffer of the most recently observed lines, queryable by cosine
/// similarity over term-frequency vectors (§4.6).
#[derive(Debug, Clone)]
pub struct NeighborBuffer {
    capacity: usize,
    lines: VecDeque<BufferedLine>,
    similarity_floor: f64,
    seq: u64,
}

impl NeighborBuffer {
    pub fn new(capacity: usize, similarity_floor: f64) -> Self {
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity),
            similarity_floor,
            seq: 0,
        }
    }

    /// Appends a line's token multiset, evicting the oldest entry once the
    /// ring is at capacity.
    pub fn push(&mut self, raw: &str, tokens: &[String]) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        let term_freq = term_freq_of(tokens);
        let norm = norm_of(&term_freq);
        self.seq += 1;
        self.lines.push_back(BufferedLine {
            raw: raw.to_string(),
            term_freq,
            norm,
            seq: self.seq,
        });
    }

    /// Top-`k` most similar buffered lines to `tokens`, descending by
    /// similarity with ties broken by recency (most recent first). Excludes
    /// candidates below the configured similarity floor.
    pub fn query(&self, tokens: &[String], k: usize) -> Vec<NeighborMatch> {
        let query_freq = term_freq_of(tokens);
        let query_norm = norm_of(&query_freq);

        let mut scored: Vec<(f64, u64, &str)> = self
            .lines
            .iter()
            .map(|entry| {
                let sim = cosine_similarity(&query_freq, query_norm, &entry.term_freq, entry.norm);
                (sim, entry.seq, entry.raw.as_str())
            })
            .filter(|(sim, _, _)| *sim >= self.similarity_floor)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        scored
            .into_iter()
            .take(k)
            .map(|(similarity, _, line)| NeighborMatch {
                similarity,
                line: line.to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(|t| t.to_string()).collect()
    }

    #[test]
    fn bounded_capacity_evicts_oldest() {
        let mut buf = NeighborBuffer::new(2, 0.0);
        buf.push("a", &toks("a"));
        buf.push("b", &toks("b"));
        buf.push("c", &toks("c"));
        assert_eq!(buf.len(), 2);
        let matches = buf.query(&toks("a"), 5);
        assert!(matches.iter().all(|m| m.line != "a"));
    }

    #[test]
    fn ranks_by_similarity_descending() {
        let mut buf = NeighborBuffer::new(10, 0.0);
        buf.push("x y z", &toks("x y z"));
        buf.push("x y", &toks("x y"));
        buf.push("q", &toks("q"));
        let matches = buf.query(&toks("x y z"), 3);
        assert_eq!(matches[0].line, "x y z");
        assert_eq!(matches[1].line, "x y");
    }

    #[test]
    fn excludes_below_similarity_floor() {
        let mut buf = NeighborBuffer::new(10, 0.3);
        buf.push("totally unrelated content here", &toks("totally unrelated content here"));
        let matches = buf.query(&toks("completely different words"), 5);
        assert!(matches.is_empty());
    }

    #[test]
    fn ties_broken_by_recency() {
        let mut buf = NeighborBuffer::new(10, 0.0);
        buf.push("first", &toks("a b"));
        buf.push("second", &toks("a b"));
        let matches = buf.query(&toks("a b"), 2);
        assert_eq!(matches[0].line, "second");
        assert_eq!(matches[1].line, "first");
    }

    #[test]
    fn identical_lines_have_similarity_one() {
        let mut buf = NeighborBuffer::new(10, 0.0);
        buf.push("a a b", &toks("a a b"));
        let matches = buf.query(&toks("a a b"), 1);
        assert!((matches[0].similarity - 1.0).abs() < 1e-9);
    }
}
