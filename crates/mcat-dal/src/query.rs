//! SQL for movie listings.
//!
//! User supplied values (title fragment, wanted genres, paging window) are
//! always bound as parameters. The only identifier placed into the SQL text is
//! the sort column, which comes from a validated [`Filter`] and thus from the
//! caller's allow-list.

use sqlx::query::QueryAs;

use crate::{ChosenDB, ChosenRow, filter::MovieSearch};

pub(crate) const MOVIE_COLUMNS: &str = "id, created_at, title, year, runtime, genres, version";

const GENRES_PREDICATE: &str = "NOT EXISTS (SELECT 1 FROM json_each(?) AS wanted \
     WHERE wanted.value NOT IN (SELECT value FROM json_each(movies.genres)))";

const TITLE_PREDICATE: &str = r"title_search LIKE '%' || ? || '%' ESCAPE '\'";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bind {
    Text(String),
    Int(i64),
}

/// Which rows a listing selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate<'a> {
    All,
    Genres(&'a [String]),
    Title(&'a str),
    TitleAndGenres { title: &'a str, genres: &'a [String] },
}

impl<'a> Predicate<'a> {
    pub fn select(title: &'a str, genres: &'a [String]) -> Self {
        match (title.is_empty(), genres.is_empty()) {
            (true, true) => Predicate::All,
            (true, false) => Predicate::Genres(genres),
            (false, true) => Predicate::Title(title),
            (false, false) => Predicate::TitleAndGenres { title, genres },
        }
    }

    fn push_where(&self, sql: &mut String, binds: &mut Vec<Bind>) {
        match self {
            Predicate::All => {}
            Predicate::Genres(genres) => {
                sql.push_str(" WHERE ");
                sql.push_str(GENRES_PREDICATE);
                binds.push(genres_bind(genres));
            }
            Predicate::Title(title) => {
                sql.push_str(" WHERE ");
                sql.push_str(TITLE_PREDICATE);
                binds.push(title_bind(title));
            }
            Predicate::TitleAndGenres { title, genres } => {
                sql.push_str(" WHERE ");
                sql.push_str(GENRES_PREDICATE);
                sql.push_str(" AND ");
                sql.push_str(TITLE_PREDICATE);
                binds.push(genres_bind(genres));
                binds.push(title_bind(title));
            }
        }
    }
}

/// Wanted genres travel as one JSON array parameter.
fn genres_bind(genres: &[String]) -> Bind {
    Bind::Text(serde_json::Value::from(genres.to_vec()).to_string())
}

fn title_bind(title: &str) -> Bind {
    Bind::Text(escape_like(&search_form(title)))
}

/// Form of a title kept in the `title_search` column and matched by listings.
pub(crate) fn search_form(title: &str) -> String {
    title.to_lowercase()
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A parameterized listing statement with its bind values in order.
///
/// Every row carries `total`, the number of rows matching the predicate
/// regardless of the paging window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    sql: String,
    binds: Vec<Bind>,
    offset: i64,
    limit: i64,
}

impl ListQuery {
    pub fn build(search: &MovieSearch) -> Self {
        let filter = &search.filter;
        let predicate = Predicate::select(&search.title, &search.genres);
        let mut binds = Vec::with_capacity(4);
        let mut sql = format!("SELECT count(*) OVER () AS total, {MOVIE_COLUMNS} FROM movies");
        predicate.push_where(&mut sql, &mut binds);

        sql.push_str(&format!(" ORDER BY {}, id ASC LIMIT ? OFFSET ?", filter.order()));
        binds.push(Bind::Int(filter.limit()));
        binds.push(Bind::Int(filter.offset()));

        ListQuery {
            sql,
            binds,
            offset: filter.offset(),
            limit: filter.limit(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[Bind] {
        &self.binds
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn query_as<'q, O>(
        &'q self,
    ) -> QueryAs<'q, ChosenDB, O, <ChosenDB as sqlx::Database>::Arguments<'q>>
    where
        O: for<'r> sqlx::FromRow<'r, ChosenRow>,
    {
        let mut query = sqlx::query_as::<_, O>(&self.sql);
        for bind in &self.binds {
            query = match bind {
                Bind::Text(s) => query.bind(s.as_str()),
                Bind::Int(n) => query.bind(*n),
            };
        }
        query
    }
}
