use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

use crate::movies::repo_types::Movie;

/// Runtime in minutes, written on the wire as `"<n> mins"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Runtime(pub i32);

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{} mins", self.0))
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuntimeVisitor;

        impl<'de> de::Visitor<'de> for RuntimeVisitor {
            type Value = Runtime;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(r#"a runtime such as "102 mins""#)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Runtime, E> {
                let minutes = v
                    .strip_suffix(" mins")
                    .and_then(|n| n.parse::<i32>().ok())
                    .ok_or_else(|| E::custom("invalid runtime format"))?;
                Ok(Runtime(minutes))
            }
        }

        deserializer.deserialize_str(RuntimeVisitor)
    }
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

impl From<Movie> for MovieResponse {
    fn from(m: Movie) -> Self {
        Self {
            id: m.id,
            created_at: m.created_at,
            title: m.title,
            year: m.year,
            runtime: Runtime(m.runtime),
            genres: m.genres,
            version: m.version,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieEnvelope {
    pub movie: MovieResponse,
}

#[derive(Debug, Serialize)]
pub struct MoviesEnvelope {
    pub movies: Vec<MovieResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(alias = "Year")]
    pub year: i32,
    #[serde(alias = "Runtime")]
    pub runtime: Runtime,
    #[serde(default, alias = "Genres")]
    pub genres: Vec<String>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Deserialize)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 20 }
