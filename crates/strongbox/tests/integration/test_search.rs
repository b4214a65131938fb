//! Path and content search

use crate::common::{server, signed_up, Device};
use strongbox::SearchResults;

async fn library(alice: &Device) {
    for (path, content) in [
        ("/recipes/bread.md", "Flour, water, salt.\n\nBake at 230C until golden."),
        ("/recipes/soup.md", "Simmer the stock.\n\nAdd bread croutons."),
        ("/notes/todo.md", "buy bread\n\ncall the bakery\n\nbread again"),
        ("/photos/bread.png", "bread bread bread"),
    ] {
        let doc = alice.create_at_path(path).await.unwrap();
        alice
            .write_document(doc.id, content.as_bytes())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_path_ranking() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    library(&alice).await;

    let results = alice.search("bread.md", true, false).await.unwrap();
    assert!(results.contents.is_empty());
    assert_eq!(results.paths[0].path, "/recipes/bread.md");
    assert_eq!(results.paths[0].rank, 0);

    let results = alice.search("bread", true, false).await.unwrap();
    let paths: Vec<&str> = results.paths.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(paths, vec!["/photos/bread.png", "/recipes/bread.md"]);
    assert!(results.paths.iter().all(|m| m.rank == 1));
}

#[tokio::test]
async fn test_fuzzy_path_match() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    library(&alice).await;

    let results = alice.search("rcpsp", true, false).await.unwrap();
    assert_eq!(results.paths.len(), 1);
    let hit = &results.paths[0];
    assert_eq!(hit.path, "/recipes/soup.md");
    assert_eq!(hit.rank, 3);
    assert_eq!(hit.matched_indices.len(), 5);
}

#[tokio::test]
async fn test_content_search_skips_binary_types() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    library(&alice).await;

    let results = alice.search("BREAD", false, true).await.unwrap();
    assert!(results.paths.is_empty());

    let hits: Vec<(&str, usize)> = results
        .contents
        .iter()
        .map(|m| (m.path.as_str(), m.matches))
        .collect();
    assert_eq!(hits, vec![("/notes/todo.md", 2), ("/recipes/soup.md", 1)]);
    assert_eq!(results.contents[0].snippets, vec!["buy bread", "bread again"]);
}

#[tokio::test]
async fn test_empty_query_finds_nothing() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    library(&alice).await;

    assert_eq!(
        alice.search("   ", true, true).await.unwrap(),
        SearchResults::default()
    );
    assert_eq!(
        alice.search("bread", false, false).await.unwrap(),
        SearchResults::default()
    );
}

#[tokio::test]
async fn test_deleted_files_not_found() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    library(&alice).await;

    let recipes = alice.get_by_path("/recipes/").await.unwrap();
    alice.delete_file(recipes.id).await.unwrap();

    let results = alice.search("soup", true, true).await.unwrap();
    assert!(results.paths.is_empty());
    assert!(results.contents.is_empty());
}
