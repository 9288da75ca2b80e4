//! Property and persistence tests for the in-memory vector index.

use std::collections::HashMap;
use std::sync::Arc;

use docqa_rag::document::VectorEntry;
use docqa_rag::embedding::{EmbeddingProvider, HashingEmbeddingProvider};
use docqa_rag::inmemory::{DistanceMetric, InMemoryVectorIndex};
use docqa_rag::vectorstore::{QueryInput, VectorIndex};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate an entry with a normalized embedding.
fn arb_entry(dim: usize) -> impl Strategy<Value = VectorEntry> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim))
        .prop_map(|(id, text, embedding)| VectorEntry { id, embedding, text })
}

/// Nearest-neighbour queries return at most `top_k` results, ordered by
/// ascending distance, with ids, texts and distances aligned.
mod prop_query_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_ascending_and_bounded_by_top_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique) = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                index.create_collection("test", DIM).await.unwrap();

                // Later entries with the same id replace earlier ones
                let mut deduped: HashMap<String, VectorEntry> = HashMap::new();
                for entry in &entries {
                    deduped.insert(entry.id.clone(), entry.clone());
                }
                for entry in deduped.values() {
                    index.add("test", entry.clone()).await.unwrap();
                }
                let results =
                    index.query("test", QueryInput::Vector(&query), top_k).await.unwrap();
                (results, deduped)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert!(results.len() <= unique.len());
            prop_assert_eq!(results.len(), top_k.min(unique.len()));

            for window in results.distances().windows(2) {
                prop_assert!(
                    window[0] <= window[1],
                    "distances not ascending: {} > {}",
                    window[0],
                    window[1]
                );
            }

            for hit in results.iter() {
                let stored = &unique[hit.id];
                prop_assert_eq!(hit.text, stored.text.as_str());
                let expected = DistanceMetric::SquaredL2.distance(&query, &stored.embedding);
                prop_assert!((hit.distance - expected).abs() < 1e-4);
            }
        }
    }
}

/// Deleted entries never come back from a query.
mod prop_delete_excludes {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn deleted_id_is_never_returned(
            entries in proptest::collection::vec(arb_entry(DIM), 1..12),
            query in arb_normalized_embedding(DIM),
            victim in any::<prop::sample::Index>(),
        ) {
            let victim_id = victim.get(&entries).id.clone();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                index.create_collection("test", DIM).await.unwrap();
                for entry in &entries {
                    index.add("test", entry.clone()).await.unwrap();
                }
                index.delete("test", &victim_id).await.unwrap();
                index.query("test", QueryInput::Vector(&query), entries.len()).await.unwrap()
            });

            prop_assert!(!results.ids().contains(&victim_id));
        }
    }
}

#[tokio::test]
async fn text_queries_use_the_attached_provider() {
    let provider = Arc::new(HashingEmbeddingProvider::new(64));
    let index = InMemoryVectorIndex::new().with_embedding_provider(provider.clone());
    index.create_collection("docs", 64).await.unwrap();

    for (id, text) in [("a", "red apples and green pears"), ("b", "steam engines and railways")] {
        let embedding = provider.embed(text).await.unwrap();
        index
            .add("docs", VectorEntry { id: id.into(), embedding, text: text.into() })
            .await
            .unwrap();
    }

    let results = index.query("docs", QueryInput::Text("green pears"), 1).await.unwrap();
    assert_eq!(results.ids(), ["a"]);
}

#[tokio::test]
async fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");

    {
        let index = InMemoryVectorIndex::persistent(&path).await.unwrap();
        index.create_collection("docs", 2).await.unwrap();
        index
            .add("docs", VectorEntry { id: "x".into(), embedding: vec![1.0, 0.0], text: "x".into() })
            .await
            .unwrap();
        index
            .add("docs", VectorEntry { id: "y".into(), embedding: vec![0.0, 1.0], text: "y".into() })
            .await
            .unwrap();
        index.delete("docs", "y").await.unwrap();
    }

    let reopened = InMemoryVectorIndex::persistent(&path).await.unwrap();
    assert_eq!(reopened.ids("docs").await.unwrap(), ["x"]);
    let entry = reopened.get("docs", "x").await.unwrap().unwrap();
    assert_eq!(entry.embedding, vec![1.0, 0.0]);
}

#[tokio::test]
async fn empty_collection_returns_no_results() {
    let index = InMemoryVectorIndex::new();
    index.create_collection("docs", 3).await.unwrap();
    let results = index.query("docs", QueryInput::Vector(&[1.0, 0.0, 0.0]), 3).await.unwrap();
    assert!(results.is_empty());
}
