//! Shared constants for end-to-end tests

/// Song present in every test library, as `<id>.mp3`.
pub const LIBRARY_SONG_ID: &str = "rock.00001";

/// Second library song, stored as `.wav`.
pub const SECOND_SONG_ID: &str = "jazz.00002";

/// Content of the library song files.
pub const SONG_BYTES: &[u8] = b"not really an mp3, but long enough to range over";

/// What the fake inference script prints by default.
pub const RESULT_JSON: &str = r#"{"Genero":"rock","recomendaciones":[{"titulo":"Opening Track","artista":"The Test Band","caratula":"cover.jpg","songId":"rock.00001"},{"titulo":"Outside the library","artista":"Nobody","caratula":""}]}"#;

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
