//! Search over paths and document content
//!
//! Path matches are ranked in tiers: exact file name, file name containing
//! the query, path containing the query, then fuzzy matches where the query
//! characters appear in order anywhere in the path. Within a tier shorter
//! paths come first.
//!
//! Content search looks at text documents only and returns, for each
//! matching document, the paragraphs that contain the query.

use serde::Serialize;
use strongbox_core::domain::{DocumentType, FileId};
use tracing::debug;

use crate::errors::SearchError;
use crate::Strongbox;

/// Characters of context kept on each side of a content match
const SNIPPET_RADIUS: usize = 60;

/// Paragraph snippets kept per document
const MAX_SNIPPETS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathMatch {
    pub id: FileId,
    pub path: String,
    /// 0 is the best tier
    pub rank: u8,
    /// Char positions in `path` that matched
    pub matched_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentMatch {
    pub id: FileId,
    pub path: String,
    pub matches: usize,
    pub snippets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    pub paths: Vec<PathMatch>,
    pub contents: Vec<ContentMatch>,
}

impl Strongbox {
    /// Searches file paths, document content, or both
    pub async fn search(
        &self,
        query: &str,
        search_paths: bool,
        search_docs: bool,
    ) -> Result<SearchResults, SearchError> {
        let query = query.trim();
        let mut results = SearchResults::default();
        if query.is_empty() || !(search_paths || search_docs) {
            return Ok(results);
        }

        let _guard = self.tree_lock.lock().await;
        let mut tree = self.load_tree().await?;
        let root = tree.root()?;

        let mut files = Vec::new();
        for id in tree.visible_ids() {
            if id == root {
                continue;
            }
            let path = tree.path_of(&id)?;
            let name = tree.display_name(&id)?;
            files.push((id, path, name));
        }

        if search_paths {
            results.paths = files
                .iter()
                .filter_map(|(id, path, name)| {
                    let (rank, matched_indices) = match_path(query, path, name)?;
                    Some(PathMatch {
                        id: *id,
                        path: path.clone(),
                        rank,
                        matched_indices,
                    })
                })
                .collect();
            results.paths.sort_by(|a, b| {
                a.rank
                    .cmp(&b.rank)
                    .then(a.path.len().cmp(&b.path.len()))
                    .then_with(|| a.path.cmp(&b.path))
            });
        }

        if search_docs {
            for (id, path, name) in &files {
                if DocumentType::from_name(name) != DocumentType::Text
                    || !tree.find(id)?.is_document()
                {
                    continue;
                }
                let content = self.read_content(&mut tree, id).await?;
                let text = String::from_utf8_lossy(&content);
                if let Some((matches, snippets)) = match_content(query, &text) {
                    results.contents.push(ContentMatch {
                        id: *id,
                        path: path.clone(),
                        matches,
                        snippets,
                    });
                }
            }
            results
                .contents
                .sort_by(|a, b| b.matches.cmp(&a.matches).then_with(|| a.path.cmp(&b.path)));
        }

        debug!(
            query,
            paths = results.paths.len(),
            contents = results.contents.len(),
            "Search finished"
        );
        Ok(results)
    }
}

fn eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Char index of the first case-insensitive occurrence of `needle`
fn find_ignore_case(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&start| {
        haystack[start..start + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| eq_ignore_case(*a, *b))
    })
}

/// Positions of `needle`'s chars appearing in order in `haystack`
fn fuzzy_indices(haystack: &[char], needle: &[char]) -> Option<Vec<usize>> {
    let mut indices = Vec::with_capacity(needle.len());
    let mut wanted = needle.iter().peekable();
    for (i, c) in haystack.iter().enumerate() {
        match wanted.peek() {
            Some(w) if eq_ignore_case(*c, **w) => {
                indices.push(i);
                wanted.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    wanted.peek().is_none().then_some(indices)
}

/// Rank and matched positions of `path`, or `None` if it does not match
fn match_path(query: &str, path: &str, name: &str) -> Option<(u8, Vec<usize>)> {
    let query: Vec<char> = query.chars().collect();
    let path_chars: Vec<char> = path.trim_end_matches('/').chars().collect();
    let name_chars: Vec<char> = name.chars().collect();
    let name_start = path_chars.len() - name_chars.len().min(path_chars.len());
    let span = |start: usize| (start..start + query.len()).collect::<Vec<_>>();

    if name_chars.len() == query.len() && find_ignore_case(&name_chars, &query) == Some(0) {
        return Some((0, span(name_start)));
    }
    if let Some(at) = find_ignore_case(&name_chars, &query) {
        return Some((1, span(name_start + at)));
    }
    if let Some(at) = find_ignore_case(&path_chars, &query) {
        return Some((2, span(at)));
    }
    fuzzy_indices(&path_chars, &query).map(|indices| (3, indices))
}

/// Number of matching paragraphs and snippets of the first few
fn match_content(query: &str, text: &str) -> Option<(usize, Vec<String>)> {
    let query: Vec<char> = query.chars().collect();
    let mut matches = 0;
    let mut snippets = Vec::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let chars: Vec<char> = paragraph.chars().collect();
        if let Some(at) = find_ignore_case(&chars, &query) {
            matches += 1;
            if snippets.len() < MAX_SNIPPETS {
                snippets.push(snippet(&chars, at, query.len()));
            }
        }
    }

    (matches > 0).then_some((matches, snippets))
}

/// The match with up to `SNIPPET_RADIUS` chars of context, on one line
fn snippet(chars: &[char], at: usize, len: usize) -> String {
    let start = at.saturating_sub(SNIPPET_RADIUS);
    let end = (at + len + SNIPPET_RADIUS).min(chars.len());
    let mut out = String::new();
    if start > 0 {
        out.push('…');
    }
    out.extend(chars[start..end].iter().map(|c| if *c == '\n' { ' ' } else { *c }));
    if end < chars.len() {
        out.push('…');
    }
    out
}
