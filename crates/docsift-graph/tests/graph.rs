//! Integration test: chunk → hierarchy → relationships → validate.

use std::collections::HashSet;

use docsift_chunker::Chunker;
use docsift_core::{ChunkerConfig, Document, DocumentMeta, Framework};
use docsift_graph::{build_hierarchy, build_relationships, validate_graph};

fn document(path: &str, title: &str, content: &str) -> Document {
    Document {
        content: content.into(),
        meta: DocumentMeta {
            file_path: path.into(),
            framework: Framework::from_path(path),
            source_url: format!("https://docs.example.com/{}", path.trim_end_matches(".md")),
            title: title.into(),
            version: None,
        },
    }
}

fn corpus() -> Vec<Document> {
    vec![
        document(
            "components.md",
            "Components",
            "# Components\n\nAll UI components.\n\n## Data components\n\nGrid, tree grid and lists show data.",
        ),
        document(
            "components/grid.md",
            "Grid",
            "# Grid\n\nGrid shows tabular data.\n\n## Columns\n\nColumn configuration.\n\n### Sorting\n\nSort rows.",
        ),
        document(
            "components/grid/index.md",
            "Grid API",
            "# Grid API\n\nReference.",
        ),
        document("components/grid/renderers.md", "Renderers", "Renderers show custom cells."),
        document("orphans/lonely.md", "Lonely", "# Lonely\n\nNobody links here."),
        document("empty/blank.md", "Blank", ""),
    ]
}

#[test]
fn child_root_links_into_parent_document() {
    let by_file = Chunker::new(ChunkerConfig::default()).chunk_all(&[
        document("a.md", "A", "# A\n\nRoot document."),
        document("a/b.md", "B", "# B\n\nChild document.\n\n## Details\n\nMore."),
    ]);
    let a_ids: HashSet<String> = by_file["a.md"].iter().map(|c| c.chunk_id.clone()).collect();
    let b_root = by_file["a/b.md"][0].chunk_id.clone();

    let tree = build_hierarchy(by_file.keys());
    let graph = build_relationships(by_file, &tree);

    let root = graph.iter().find(|c| c.chunk_id == b_root).unwrap();
    let parent = root.parent_id.as_ref().expect("b.md root has a cross-file parent");
    assert!(a_ids.contains(parent));

    let report = validate_graph(&graph);
    assert!(report.is_valid(), "{:?}", report.violations);
}

#[test]
fn corpus_graph_is_a_valid_forest() {
    let docs = corpus();
    let by_file = Chunker::new(ChunkerConfig::default()).chunk_all(&docs);
    let chunk_count: usize = by_file.values().map(Vec::len).sum();

    let tree = build_hierarchy(by_file.keys());
    assert_eq!(
        tree["components/grid/renderers.md"].parent_path.as_deref(),
        Some("components/grid/index.md")
    );
    assert_eq!(
        tree["components/grid/index.md"].parent_path.as_deref(),
        Some("components.md")
    );
    assert_eq!(tree["orphans/lonely.md"].parent_path, None);

    let graph = build_relationships(by_file, &tree);
    assert_eq!(graph.len(), chunk_count, "no chunk is lost or duplicated");

    let report = validate_graph(&graph);
    assert!(report.is_valid(), "{:?}", report.violations);

    // root documents stay roots, documents with parents don't
    let lonely = graph.iter().find(|c| c.file_path == "orphans/lonely.md").unwrap();
    assert_eq!(lonely.parent_id, None);
    let grid_root = graph.iter().find(|c| c.file_path == "components/grid.md").unwrap();
    let anchor = grid_root.parent_id.as_deref().unwrap();
    let anchor_chunk = graph.iter().find(|c| c.chunk_id == anchor).unwrap();
    assert_eq!(anchor_chunk.file_path, "components.md");
    assert_eq!(anchor_chunk.heading(), "Data components", "topic match on 'grid'");
}

#[test]
fn every_parent_resolves() {
    let by_file = Chunker::new(ChunkerConfig::default()).chunk_all(&corpus());
    let tree = build_hierarchy(by_file.keys());
    let graph = build_relationships(by_file, &tree);
    let ids: HashSet<&str> = graph.iter().map(|c| c.chunk_id.as_str()).collect();
    for chunk in &graph {
        if let Some(parent) = &chunk.parent_id {
            assert!(ids.contains(parent.as_str()));
            assert_ne!(parent, &chunk.chunk_id);
        }
    }
}
