//! In-process listening and prediction statistics.
//!
//! Independent counters are atomics; only the rating sum and count share a
//! lock since they must move together. Nothing is persisted and nothing ever
//! decreases.

mod counters;
mod feedback;

pub use counters::KeyedCounters;
pub use feedback::{FeedbackItem, FeedbackPayload};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Entries reported in each top list of a snapshot.
pub const TOP_LIST_SIZE: usize = 10;

#[derive(Debug, Default)]
struct RatingTotals {
    sum: i64,
    count: u64,
}

#[derive(Default)]
pub struct TelemetryStore {
    total_predictions: AtomicU64,
    total_likes: AtomicU64,
    total_dislikes: AtomicU64,
    genres: KeyedCounters,
    plays: KeyedCounters,
    song_likes: KeyedCounters,
    ratings: Mutex<RatingTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreCount {
    #[serde(rename = "genero")]
    pub genre: String,
    #[serde(rename = "conteo")]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCount {
    pub id: String,
    #[serde(rename = "conteo")]
    pub count: u64,
}

/// Point-in-time view of the counters, as served by `/api/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    #[serde(rename = "totalPredicciones", alias = "totalpredicciones")]
    pub total_predictions: u64,
    #[serde(rename = "porGenero", alias = "porgenero")]
    pub genre_counts: Vec<GenreCount>,
    #[serde(rename = "likesTotales", alias = "likestotales")]
    pub total_likes: u64,
    #[serde(rename = "dislikesTotales", alias = "dislikestotales")]
    pub total_dislikes: u64,
    #[serde(rename = "ratingPromedio", alias = "ratingpromedio")]
    pub average_rating: f64,
    #[serde(rename = "ratingsCount", alias = "ratingscount")]
    pub rating_count: u64,
    #[serde(rename = "topReproducciones", alias = "topreproducciones")]
    pub top_played: Vec<ItemCount>,
    #[serde(rename = "topLikes", alias = "toplikes")]
    pub top_liked: Vec<ItemCount>,
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn item_counts(ranked: Vec<(String, u64)>) -> Vec<ItemCount> {
    ranked
        .into_iter()
        .map(|(id, count)| ItemCount { id, count })
        .collect()
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_prediction(&self, genre: Option<&str>) {
        self.total_predictions.fetch_add(1, Ordering::Relaxed);
        if let Some(genre) = genre.filter(|g| !g.trim().is_empty()) {
            self.genres.increment(genre);
        }
    }

    pub fn record_play(&self, song_id: Option<&str>) {
        if let Some(song_id) = song_id.filter(|id| !id.trim().is_empty()) {
            self.plays.increment(song_id);
        }
    }

    /// Folds one feedback submission into the counters.
    ///
    /// Item votes and the top-level `liked` are mutually exclusive: the
    /// top-level value only counts when no item carried a vote. Items with a
    /// blank id are skipped entirely.
    pub fn record_feedback(&self, liked: Option<bool>, rating: Option<i32>, items: &[FeedbackItem]) {
        if let Some(rating) = rating.filter(|r| *r > 0) {
            let mut totals = self.ratings.lock().unwrap_or_else(|e| e.into_inner());
            totals.sum += i64::from(rating);
            totals.count += 1;
        }

        let mut any_item_vote = false;
        for item in items.iter().filter(|item| !item.id.trim().is_empty()) {
            match item.liked {
                Some(true) => {
                    any_item_vote = true;
                    self.total_likes.fetch_add(1, Ordering::Relaxed);
                    self.song_likes.increment(&item.id);
                }
                Some(false) => {
                    any_item_vote = true;
                    self.total_dislikes.fetch_add(1, Ordering::Relaxed);
                }
                None => {}
            }
        }

        if !any_item_vote {
            match liked {
                Some(true) => {
                    self.total_likes.fetch_add(1, Ordering::Relaxed);
                }
                Some(false) => {
                    self.total_dislikes.fetch_add(1, Ordering::Relaxed);
                }
                None => {}
            }
        }

        debug!(
            "Recorded feedback: liked={:?} rating={:?} items={} item_votes={}",
            liked,
            rating,
            items.len(),
            any_item_vote
        );
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let (rating_sum, rating_count) = {
            let totals = self.ratings.lock().unwrap_or_else(|e| e.into_inner());
            (totals.sum, totals.count)
        };
        let average_rating = if rating_count == 0 {
            0.0
        } else {
            round_to_cents(rating_sum as f64 / rating_count as f64)
        };

        TelemetrySnapshot {
            total_predictions: self.total_predictions.load(Ordering::Relaxed),
            genre_counts: self
                .genres
                .ranked(None)
                .into_iter()
                .map(|(genre, count)| GenreCount { genre, count })
                .collect(),
            total_likes: self.total_likes.load(Ordering::Relaxed),
            total_dislikes: self.total_dislikes.load(Ordering::Relaxed),
            average_rating,
            rating_count,
            top_played: item_counts(self.plays.ranked(Some(TOP_LIST_SIZE))),
            top_liked: item_counts(self.song_likes.ranked(Some(TOP_LIST_SIZE))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn empty_snapshot() {
        let snapshot = TelemetryStore::new().snapshot();
        assert_eq!(snapshot.total_predictions, 0);
        assert_eq!(snapshot.average_rating, 0.0);
        assert_eq!(snapshot.rating_count, 0);
        assert!(snapshot.genre_counts.is_empty());
        assert!(snapshot.top_played.is_empty());
    }

    #[test]
    fn predictions_count_genres_case_insensitively() {
        let store = TelemetryStore::new();
        store.record_prediction(Some("Rock"));
        store.record_prediction(Some("rock"));
        store.record_prediction(Some("jazz"));
        store.record_prediction(Some("  "));
        store.record_prediction(None);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.total_predictions, 5);
        assert_eq!(
            snapshot.genre_counts,
            vec![
                GenreCount {
                    genre: "Rock".into(),
                    count: 2
                },
                GenreCount {
                    genre: "jazz".into(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn blank_plays_are_ignored() {
        let store = TelemetryStore::new();
        store.record_play(Some(""));
        store.record_play(None);
        store.record_play(Some("blues.00002"));

        assert_eq!(
            store.snapshot().top_played,
            vec![ItemCount {
                id: "blues.00002".into(),
                count: 1
            }]
        );
    }

    #[test]
    fn top_level_vote_without_items() {
        let store = TelemetryStore::new();
        store.record_feedback(Some(true), None, &[]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.total_likes, 1);
        assert_eq!(snapshot.total_dislikes, 0);
        assert!(snapshot.top_liked.is_empty());
    }

    #[test]
    fn item_votes_only() {
        let store = TelemetryStore::new();
        store.record_feedback(
            None,
            None,
            &[
                FeedbackItem::vote("a", Some(true)),
                FeedbackItem::vote("b", Some(false)),
            ],
        );

        let snapshot = store.snapshot();
        assert_eq!(snapshot.total_likes, 1);
        assert_eq!(snapshot.total_dislikes, 1);
        assert_eq!(
            snapshot.top_liked,
            vec![ItemCount {
                id: "a".into(),
                count: 1
            }]
        );
        assert_eq!(store.song_likes.get("b"), 0);
        assert_eq!(store.song_likes.len(), 1);
    }

    #[test]
    fn item_votes_suppress_top_level_fallback() {
        let store = TelemetryStore::new();
        store.record_feedback(Some(false), None, &[FeedbackItem::vote("a", Some(true))]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.total_likes, 1);
        assert_eq!(snapshot.total_dislikes, 0);
    }

    #[test]
    fn unvoted_or_blank_items_keep_fallback() {
        let store = TelemetryStore::new();
        store.record_feedback(
            Some(false),
            None,
            &[
                FeedbackItem::vote("a", None),
                FeedbackItem::vote(" ", Some(true)),
            ],
        );

        let snapshot = store.snapshot();
        assert_eq!(snapshot.total_likes, 0);
        assert_eq!(snapshot.total_dislikes, 1);
        assert!(snapshot.top_liked.is_empty());
    }

    #[test]
    fn rating_average() {
        let store = TelemetryStore::new();
        store.record_feedback(None, Some(4), &[]);
        store.record_feedback(None, Some(5), &[]);
        store.record_feedback(None, Some(0), &[]);
        store.record_feedback(None, Some(-3), &[]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.rating_count, 2);
        assert_eq!(snapshot.average_rating, 4.5);
    }

    #[test]
    fn rating_average_is_rounded_to_two_decimals() {
        let store = TelemetryStore::new();
        for rating in [5, 4, 4] {
            store.record_feedback(None, Some(rating), &[]);
        }
        assert_eq!(store.snapshot().average_rating, 4.33);
    }

    #[test]
    fn top_lists_are_capped_and_sorted() {
        let store = TelemetryStore::new();
        for i in 0..15 {
            for _ in 0..=i {
                store.record_play(Some(&format!("song-{}", i)));
            }
        }

        let top = store.snapshot().top_played;
        assert_eq!(top.len(), TOP_LIST_SIZE);
        assert_eq!(top[0].id, "song-14");
        assert_eq!(top[0].count, 15);
        assert!(top.windows(2).all(|w| w[0].count > w[1].count));
    }

    #[test]
    fn snapshot_is_idempotent() {
        let store = TelemetryStore::new();
        store.record_prediction(Some("pop"));
        store.record_play(Some("x"));
        store.record_play(Some("y"));
        store.record_feedback(Some(true), Some(3), &[]);

        assert_eq!(store.snapshot(), store.snapshot());
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let store = Arc::new(TelemetryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        store.record_prediction(Some(if i % 2 == 0 { "rock" } else { "ROCK" }));
                        store.record_play(Some(&format!("song-{}", t)));
                        store.record_feedback(
                            None,
                            Some(2),
                            &[FeedbackItem::vote("shared", Some(true))],
                        );
                        let snapshot = store.snapshot();
                        assert!(snapshot.rating_count <= 4000);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.total_predictions, 4000);
        assert_eq!(snapshot.genre_counts.len(), 1);
        assert_eq!(snapshot.genre_counts[0].count, 4000);
        assert_eq!(snapshot.total_likes, 4000);
        assert_eq!(snapshot.rating_count, 4000);
        assert_eq!(snapshot.average_rating, 2.0);
        assert_eq!(snapshot.top_played.len(), 8);
        assert!(snapshot.top_played.iter().all(|p| p.count == 500));
        assert_eq!(snapshot.top_liked[0].count, 4000);
    }

    #[test]
    fn snapshot_wire_names() {
        let store = TelemetryStore::new();
        store.record_prediction(Some("rock"));
        let value = serde_json::to_value(store.snapshot()).unwrap();

        for key in [
            "totalPredicciones",
            "porGenero",
            "likesTotales",
            "dislikesTotales",
            "ratingPromedio",
            "ratingsCount",
            "topReproducciones",
            "topLikes",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["porGenero"][0]["genero"], "rock");
        assert_eq!(value["porGenero"][0]["conteo"], 1);
    }
}
