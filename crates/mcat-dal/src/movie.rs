use futures::{StreamExt as _, TryStreamExt as _};
use garde::Validate;
use mcat_types::{FieldErrors, validation::unique};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, Pool, Row, types::Json};
use time::PrimitiveDateTime;
use tracing::debug;

use crate::{
    ChosenRow, Error,
    error::Result,
    filter::{MetaData, MovieSearch},
    query::{ListQuery, MOVIE_COLUMNS, search_form},
};

/// Columns a movie listing may be sorted by.
pub const VALID_ORDER_FIELDS: &[&str] = &["id", "title", "year", "runtime"];

#[allow(clippy::ptr_arg)]
fn unique_genres(genres: &Vec<String>, _ctx: &()) -> garde::Result {
    if unique(genres) {
        Ok(())
    } else {
        Err(garde::Error::new("genres should be unique"))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Validate)]
pub struct CreateMovie {
    #[garde(length(chars, min = 1, max = 500))]
    pub title: String,
    #[garde(range(min = 1888))]
    pub year: i32,
    #[garde(range(min = 1))]
    pub runtime: i32,
    #[garde(
        length(min = 1, max = 5),
        custom(unique_genres),
        inner(length(min = 1, max = 255))
    )]
    pub genres: Vec<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Movie {
    pub id: i64,
    #[serde(skip_serializing)]
    pub created_at: PrimitiveDateTime,
    pub title: String,
    pub year: i32,
    pub runtime: i32,
    pub genres: Vec<String>,
    pub version: i64,
}

impl Movie {
    fn content(&self) -> CreateMovie {
        CreateMovie {
            title: self.title.clone(),
            year: self.year,
            runtime: self.runtime,
            genres: self.genres.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        self.content().validate().map_err(FieldErrors::from)
    }
}

impl FromRow<'_, ChosenRow> for Movie {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        let genres: Json<Vec<String>> = row.try_get("genres")?;
        Ok(Movie {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            title: row.try_get("title")?,
            year: row.try_get("year")?,
            runtime: row.try_get("runtime")?,
            genres: genres.0,
            version: row.try_get("version")?,
        })
    }
}

struct MovieRow {
    total: i64,
    movie: Movie,
}

impl FromRow<'_, ChosenRow> for MovieRow {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        Ok(MovieRow {
            total: row.try_get("total")?,
            movie: Movie::from_row(row)?,
        })
    }
}

/// A field of a partial update, either sent by the client or not.
///
/// Unlike `Option` this keeps "not sent" apart from any value the field can
/// hold, zero included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Absent,
    Present(T),
}

impl<T> Patch<T> {
    pub fn apply_to(self, target: &mut T) {
        if let Patch::Present(value) = self {
            *target = value;
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Present(v),
            None => Patch::Absent,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Patch::Present)
    }
}

/// Partial update of a movie. `version`, when given, is the version the client
/// last read; otherwise the freshly read one is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MoviePatch {
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub year: Patch<i32>,
    #[serde(default)]
    pub runtime: Patch<i32>,
    #[serde(default)]
    pub genres: Patch<Vec<String>>,
    #[serde(default)]
    pub version: Option<i64>,
}

impl MoviePatch {
    pub fn apply(self, movie: &mut Movie) {
        self.title.apply_to(&mut movie.title);
        self.year.apply_to(&mut movie.year);
        self.runtime.apply_to(&mut movie.runtime);
        self.genres.apply_to(&mut movie.genres);
        if let Some(version) = self.version {
            movie.version = version;
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct MovieList {
    pub metadata: MetaData,
    pub movies: Vec<Movie>,
}

pub type MovieRepository = MovieRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct MovieRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> MovieRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Stores a new movie, id, creation time and version 1 are assigned by the
    /// database in the same statement.
    pub async fn create(&self, payload: CreateMovie) -> Result<Movie> {
        payload.validate().map_err(FieldErrors::from)?;

        let (id, created_at, version): (i64, PrimitiveDateTime, i64) = sqlx::query_as(
            "INSERT INTO movies (title, title_search, year, runtime, genres) VALUES (?, ?, ?, ?, ?) \
             RETURNING id, created_at, version",
        )
        .bind(&payload.title)
        .bind(search_form(&payload.title))
        .bind(payload.year)
        .bind(payload.runtime)
        .bind(Json(&payload.genres))
        .fetch_one(&self.executor)
        .await?;

        Ok(Movie {
            id,
            created_at,
            title: payload.title,
            year: payload.year,
            runtime: payload.runtime,
            genres: payload.genres,
            version,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Movie> {
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = ?");
        sqlx::query_as::<_, Movie>(&sql)
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound(format!("Movie {id}")))
    }

    /// Writes `movie` if the stored version still equals `movie.version` and
    /// returns the new version.
    ///
    /// When no row matches, a record that still exists was changed by somebody
    /// else since it was read ([`Error::EditConflict`]), otherwise it is gone
    /// ([`Error::RecordNotFound`]).
    pub async fn update(&self, id: i64, movie: &Movie) -> Result<i64> {
        movie.validate()?;

        let new_version: Option<i64> = sqlx::query_scalar(
            "UPDATE movies SET title = ?, title_search = ?, year = ?, runtime = ?, genres = ?, \
             version = version + 1 WHERE id = ? AND version = ? RETURNING version",
        )
        .bind(&movie.title)
        .bind(search_form(&movie.title))
        .bind(movie.year)
        .bind(movie.runtime)
        .bind(Json(&movie.genres))
        .bind(id)
        .bind(movie.version)
        .fetch_optional(&self.executor)
        .await?;

        match new_version {
            Some(version) => Ok(version),
            None if self.exists(id).await? => {
                debug!("Movie {id} not updated, version {} is stale", movie.version);
                Err(Error::EditConflict {
                    id,
                    version: movie.version,
                })
            }
            None => Err(Error::RecordNotFound(format!("Movie {id}"))),
        }
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM movies WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.executor)
            .await?;
        Ok(exists)
    }

    /// Reads the movie, overlays the fields present in `patch` and writes it
    /// back with [`Self::update`].
    pub async fn patch(&self, id: i64, patch: MoviePatch) -> Result<Movie> {
        let mut movie = self.get(id).await?;
        patch.apply(&mut movie);
        movie.version = self.update(id, &movie).await?;
        Ok(movie)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound(format!("Movie {id}")))
        } else {
            Ok(())
        }
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM movies")
            .fetch_one(&self.executor)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// One page of movies matching `search`, plus paging metadata.
    ///
    /// The total comes from the window count carried by every row, so a page
    /// past the end reports a total of 0.
    pub async fn list(&self, search: &MovieSearch) -> Result<MovieList> {
        let query = ListQuery::build(search);
        debug!(sql = query.sql(), "Listing movies");
        let rows = query
            .query_as::<MovieRow>()
            .fetch(&self.executor)
            .take(crate::MAX_LIMIT)
            .try_collect::<Vec<_>>()
            .await?;

        let total = rows.first().map(|r| r.total.max(0) as u64).unwrap_or(0);
        Ok(MovieList {
            metadata: MetaData::calculate(total, &search.filter),
            movies: rows.into_iter().map(|r| r.movie).collect(),
        })
    }
}
