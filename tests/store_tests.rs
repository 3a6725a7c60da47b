//! Store-level behavior: chunk upserts, hash-collision refusal, FTS
//! queries with filters and pagination, and vector shadow invariants.

use code_index::connector::store::{ChunkQuery, IndexStore};
use code_index::domain::{
    hash, now_ms, Chunk, ChunkContext, ChunkKind, EmbeddingVector, FileRecord, IndexError,
    Language, Span,
};

fn chunk_for(file_path: &str, name: &str, body: &str, kind: ChunkKind) -> Chunk {
    let signature = format!("function {}()", name);
    Chunk::new(
        file_path.to_string(),
        kind,
        name.to_string(),
        body.to_string(),
        hash::normalize(body),
        Span::new(1, 0, body.lines().count().max(1) as u32, 0, 0, body.len()),
        Language::TypeScript,
        ChunkContext {
            module_path: Some("src.sample".to_string()),
            is_top_level: true,
            ..Default::default()
        },
        None,
        Some(signature.clone()),
        hash::hash_parts(&[None, Some(signature.as_str()), Some(body)]),
    )
}

async fn store_with_file(path: &str) -> (IndexStore, i64) {
    let store = IndexStore::in_memory(4).await.unwrap();
    let record = FileRecord::new(path.to_string(), 1_000, now_ms(), Language::TypeScript);
    let file_id = store.upsert_file(&record, 100).await.unwrap();
    (store, file_id)
}

#[tokio::test]
async fn upsert_then_requery_round_trips() {
    let (store, file_id) = store_with_file("src/sample.ts").await;
    let chunk = chunk_for(
        "src/sample.ts",
        "greet",
        "function greet() { return 'hi'; }",
        ChunkKind::Function,
    );

    let uids = store
        .upsert_chunks(file_id, "src/sample.ts", std::slice::from_ref(&chunk))
        .await
        .unwrap();
    assert_eq!(uids.len(), 1);

    let results = store
        .query_chunks(&ChunkQuery::new().with_match("greet"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name(), "greet");
    assert_eq!(results[0].chunk_hash(), chunk.chunk_hash());
    assert_eq!(
        results[0].context().module_path.as_deref(),
        Some("src.sample")
    );
}

#[tokio::test]
async fn rediscovered_hash_keeps_stored_uid() {
    let (store, file_id) = store_with_file("src/sample.ts").await;
    let chunk = chunk_for(
        "src/sample.ts",
        "stable",
        "function stable() { return 1; }",
        ChunkKind::Function,
    );

    let first = store
        .upsert_chunks(file_id, "src/sample.ts", std::slice::from_ref(&chunk))
        .await
        .unwrap();

    // A re-parse constructs a fresh Chunk (new surrogate id) with the same
    // hash; the store keeps the original uid.
    let reparsed = chunk_for(
        "src/sample.ts",
        "stable",
        "function stable() { return 1; }",
        ChunkKind::Function,
    );
    let second = store
        .upsert_chunks(file_id, "src/sample.ts", std::slice::from_ref(&reparsed))
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn hash_collision_is_fatal_and_rolls_back() {
    let (store, file_id) = store_with_file("src/sample.ts").await;
    let chunk = chunk_for(
        "src/sample.ts",
        "original",
        "function original() { return 1; }",
        ChunkKind::Function,
    );
    store
        .upsert_chunks(file_id, "src/sample.ts", std::slice::from_ref(&chunk))
        .await
        .unwrap();

    // Same declared hash, different normalized content.
    let forged = Chunk::new(
        "src/sample.ts".to_string(),
        ChunkKind::Function,
        "forged".to_string(),
        "function forged() { return 2; }".to_string(),
        hash::normalize("function forged() { return 2; }"),
        Span::new(1, 0, 1, 0, 0, 10),
        Language::TypeScript,
        ChunkContext::default(),
        None,
        None,
        chunk.chunk_hash().to_string(),
    );

    let err = store
        .upsert_chunks(file_id, "src/sample.ts", std::slice::from_ref(&forged))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::HashCollision { .. }));

    // The original row survived the rolled-back transaction.
    let results = store
        .query_chunks(&ChunkQuery::new().with_match("original"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn query_filters_and_pagination() {
    let (store, file_id) = store_with_file("src/sample.ts").await;

    let chunks: Vec<Chunk> = (0..5)
        .map(|i| {
            chunk_for(
                "src/sample.ts",
                &format!("fn{}", i),
                &format!("function fn{}() {{ return {}; }}", i, i),
                if i % 2 == 0 {
                    ChunkKind::Function
                } else {
                    ChunkKind::Method
                },
            )
        })
        .collect();
    store
        .upsert_chunks(file_id, "src/sample.ts", &chunks)
        .await
        .unwrap();

    let functions = store
        .query_chunks(&ChunkQuery::new().with_kinds(vec![ChunkKind::Function]))
        .await
        .unwrap();
    assert_eq!(functions.len(), 3);

    let page1 = store
        .query_chunks(&ChunkQuery::new().with_page(2, 0))
        .await
        .unwrap();
    let page2 = store
        .query_chunks(&ChunkQuery::new().with_page(2, 2))
        .await
        .unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page2.len(), 2);

    let by_language = store
        .query_chunks(&ChunkQuery::new().with_languages(vec![Language::Python]))
        .await
        .unwrap();
    assert!(by_language.is_empty());

    let by_file = store
        .query_chunks(&ChunkQuery::new().with_file_id(file_id).with_page(100, 0))
        .await
        .unwrap();
    assert_eq!(by_file.len(), 5);
}

#[tokio::test]
async fn deleting_a_file_keeps_fts_consistent() {
    let (store, file_id) = store_with_file("src/sample.ts").await;
    let chunk = chunk_for(
        "src/sample.ts",
        "gone",
        "function gone() { return 0; }",
        ChunkKind::Function,
    );
    store
        .upsert_chunks(file_id, "src/sample.ts", std::slice::from_ref(&chunk))
        .await
        .unwrap();

    let removed = store.delete_file("src/sample.ts").await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.fts_is_consistent().await.unwrap());

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.chunk_count, 0);
    assert_eq!(stats.fts_count, 0);
    assert_eq!(stats.file_count, 0);
}

#[tokio::test]
async fn embedding_dimension_is_enforced() {
    let (store, file_id) = store_with_file("src/sample.ts").await;
    let chunk = chunk_for(
        "src/sample.ts",
        "vec",
        "function vec() { return 0; }",
        ChunkKind::Function,
    );
    let uids = store
        .upsert_chunks(file_id, "src/sample.ts", std::slice::from_ref(&chunk))
        .await
        .unwrap();

    let bad = EmbeddingVector::new(
        uids[0].clone(),
        "model".to_string(),
        "1".to_string(),
        chunk.chunk_hash().to_string(),
        vec![0.1, 0.2],
        now_ms(),
    );
    assert!(store.upsert_embedding(&bad).await.is_err());

    let good = EmbeddingVector::new(
        uids[0].clone(),
        "model".to_string(),
        "1".to_string(),
        chunk.chunk_hash().to_string(),
        vec![0.1, 0.2, 0.3, 0.4],
        now_ms(),
    );
    store.upsert_embedding(&good).await.unwrap();
    assert!(store
        .has_embedding(&uids[0], "model", chunk.chunk_hash())
        .await
        .unwrap());
}

#[tokio::test]
async fn knn_returns_nearest_first() {
    let (store, file_id) = store_with_file("src/sample.ts").await;

    let a = chunk_for(
        "src/sample.ts",
        "north",
        "function north() { return 1; }",
        ChunkKind::Function,
    );
    let b = chunk_for(
        "src/sample.ts",
        "east",
        "function east() { return 2; }",
        ChunkKind::Function,
    );
    let uids = store
        .upsert_chunks(file_id, "src/sample.ts", &[a.clone(), b.clone()])
        .await
        .unwrap();

    for (uid, chunk, vector) in [
        (&uids[0], &a, vec![1.0, 0.0, 0.0, 0.0]),
        (&uids[1], &b, vec![0.0, 1.0, 0.0, 0.0]),
    ] {
        store
            .upsert_embedding(&EmbeddingVector::new(
                uid.clone(),
                "model".to_string(),
                "1".to_string(),
                chunk.chunk_hash().to_string(),
                vector,
                now_ms(),
            ))
            .await
            .unwrap();
    }

    let hits = store.knn(&[1.0, 0.0, 0.0, 0.0], 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].0, uids[0]);
    assert!(hits[0].1 < hits[1].1);
}

#[tokio::test]
async fn knn_on_empty_shadow_is_empty() {
    let store = IndexStore::in_memory(4).await.unwrap();
    let hits = store.knn(&[0.0, 0.0, 0.0, 1.0], 5).await.unwrap();
    assert!(hits.is_empty());
}

#[test]
fn fts_escape_quotes_terms() {
    assert_eq!(IndexStore::fts_escape("two words"), "\"two\" \"words\"");
    assert_eq!(IndexStore::fts_escape("with\"quote"), "\"with\"\"quote\"");
    assert_eq!(IndexStore::fts_escape("  "), "");
}
