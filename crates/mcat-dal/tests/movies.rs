use std::time::Duration;

use mcat_dal::{
    Error, Filter, FilterParams, MetaData, MovieSearch,
    movie::{
        CreateMovie, MoviePatch, MovieRepository, MovieRepositoryImpl, Patch, VALID_ORDER_FIELDS,
    },
};
use tracing_test::traced_test;

async fn init_db() -> sqlx::Pool<sqlx::Sqlite> {
    const DB_URL: &str = "sqlite::memory:";
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect(DB_URL)
        .await
        .unwrap();
    mcat_dal::init_schema(&conn).await.unwrap();
    conn
}

fn new_movie(title: &str, year: i32, runtime: i32, genres: &[&str]) -> CreateMovie {
    CreateMovie {
        title: title.to_string(),
        year,
        runtime,
        genres: genres.iter().map(|g| g.to_string()).collect(),
    }
}

fn search(title: &str, genres: &str, page: &str, page_size: &str, sort: &str) -> MovieSearch {
    FilterParams {
        page: Some(page.to_string()),
        page_size: Some(page_size.to_string()),
        sort: Some(sort.to_string()),
        title: Some(title.to_string()),
        genres: Some(genres.to_string()),
    }
    .normalize(VALID_ORDER_FIELDS, 20)
    .unwrap()
}

async fn seed(repo: &MovieRepository) {
    let movies = [
        new_movie("Arrival", 2016, 116, &["scifi", "drama"]),
        new_movie("Alien", 1979, 117, &["scifi", "horror"]),
        new_movie("Aliens", 1986, 137, &["scifi", "action"]),
        new_movie("The Thing", 1982, 109, &["horror", "scifi"]),
        new_movie("Heat", 1995, 170, &["crime", "drama"]),
        new_movie("100% Wolf", 2020, 96, &["animation"]),
    ];
    for movie in movies {
        repo.create(movie).await.unwrap();
    }
}

fn titles(list: &mcat_dal::movie::MovieList) -> Vec<&str> {
    list.movies.iter().map(|m| m.title.as_str()).collect()
}

#[tokio::test]
async fn test_movie_create() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);

    let movie = repo
        .create(new_movie("Arrival", 2016, 116, &["scifi", "drama"]))
        .await
        .unwrap();
    assert!(movie.id > 0);
    assert_eq!(movie.version, 1);
    assert_eq!(movie.genres, vec!["scifi", "drama"]);

    let stored = repo.get(movie.id).await.unwrap();
    assert_eq!(stored, movie);

    let other = repo
        .create(new_movie("Heat", 1995, 170, &["crime"]))
        .await
        .unwrap();
    assert!(other.id > movie.id);
    assert_eq!(repo.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_invalid_movie_not_persisted() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);

    let too_many = new_movie("Heat", 1995, 170, &["a", "b", "c", "d", "e", "f"]);
    match repo.create(too_many).await {
        Err(Error::ValidationFailed(errors)) => assert!(errors.contains_key("genres")),
        other => panic!("Unexpected result {other:?}"),
    }

    let duplicate = new_movie("Heat", 1995, 170, &["crime", "crime"]);
    match repo.create(duplicate).await {
        Err(Error::ValidationFailed(errors)) => {
            assert_eq!(errors.get("genres"), Some("genres should be unique"))
        }
        other => panic!("Unexpected result {other:?}"),
    }

    let broken = new_movie("", 1800, 0, &[]);
    match repo.create(broken).await {
        Err(Error::ValidationFailed(errors)) => assert_eq!(errors.len(), 4),
        other => panic!("Unexpected result {other:?}"),
    }

    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_get_missing() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);
    assert!(matches!(repo.get(42).await, Err(Error::RecordNotFound(_))));
}

#[tokio::test]
#[traced_test]
async fn test_update_and_conflict() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);

    let mut movie = repo
        .create(new_movie("Arrival", 2016, 116, &["scifi", "drama"]))
        .await
        .unwrap();
    let stale = movie.clone();

    movie.title = "Arrival (2016)".to_string();
    let version = repo.update(movie.id, &movie).await.unwrap();
    assert_eq!(version, 2);

    let mut second = stale.clone();
    second.runtime = 118;
    match repo.update(second.id, &second).await {
        Err(Error::EditConflict { id, version }) => {
            assert_eq!(id, movie.id);
            assert_eq!(version, 1);
        }
        other => panic!("Unexpected result {other:?}"),
    }

    let stored = repo.get(movie.id).await.unwrap();
    assert_eq!(stored.title, "Arrival (2016)");
    assert_eq!(stored.runtime, 116);
    assert_eq!(stored.version, 2);
    assert!(logs_contain("version 1 is stale"));
}

#[tokio::test]
async fn test_update_missing_is_not_conflict() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);

    let mut movie = repo
        .create(new_movie("Ran", 1985, 162, &["drama", "war"]))
        .await
        .unwrap();
    repo.delete(movie.id).await.unwrap();

    movie.runtime = 160;
    assert!(matches!(
        repo.update(movie.id, &movie).await,
        Err(Error::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_update_validates_before_writing() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);

    let mut movie = repo
        .create(new_movie("Alien", 1979, 117, &["scifi"]))
        .await
        .unwrap();
    movie.year = 1700;
    assert!(matches!(
        repo.update(movie.id, &movie).await,
        Err(Error::ValidationFailed(_))
    ));
    assert_eq!(repo.get(movie.id).await.unwrap().version, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_single_winner() {
    let dir = tempfile::TempDir::with_prefix("concurrent_updates_").unwrap();
    let url = format!("sqlite://{}/movies.db", dir.path().display());
    let pool = mcat_dal::new_pool(&url).await.unwrap();
    mcat_dal::init_schema(&pool).await.unwrap();

    let movie = MovieRepositoryImpl::new(pool.clone())
        .create(new_movie("Heat", 1995, 170, &["crime"]))
        .await
        .unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let repo = MovieRepositoryImpl::new(pool.clone());
            let mut candidate = movie.clone();
            candidate.runtime = 170 + i;
            tokio::spawn(async move { repo.update(candidate.id, &candidate).await })
        })
        .collect();

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(version) => winners.push(version),
            Err(Error::EditConflict { .. }) => conflicts += 1,
            Err(e) => panic!("Unexpected error {e:?}"),
        }
    }
    assert_eq!(winners, vec![2]);
    assert_eq!(conflicts, 15);

    let repo = MovieRepositoryImpl::new(pool.clone());
    assert_eq!(repo.get(movie.id).await.unwrap().version, 2);
    pool.close().await;
}

#[tokio::test]
async fn test_patch() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);

    let movie = repo
        .create(new_movie("Arrival", 2016, 116, &["scifi", "drama"]))
        .await
        .unwrap();

    let patched = repo
        .patch(
            movie.id,
            MoviePatch {
                runtime: Patch::Present(118),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(patched.runtime, 118);
    assert_eq!(patched.title, "Arrival");
    assert_eq!(patched.version, 2);

    // client presents the version it read before the previous patch
    let stale = MoviePatch {
        title: Patch::Present("Story of Your Life".to_string()),
        version: Some(1),
        ..Default::default()
    };
    assert!(matches!(
        repo.patch(movie.id, stale).await,
        Err(Error::EditConflict { version: 1, .. })
    ));

    let zero_runtime = MoviePatch {
        runtime: Patch::Present(0),
        ..Default::default()
    };
    match repo.patch(movie.id, zero_runtime).await {
        Err(Error::ValidationFailed(errors)) => assert!(errors.contains_key("runtime")),
        other => panic!("Unexpected result {other:?}"),
    }

    assert!(matches!(
        repo.patch(999, MoviePatch::default()).await,
        Err(Error::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_delete() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);
    seed(&repo).await;

    assert!(matches!(repo.delete(999).await, Err(Error::RecordNotFound(_))));
    assert_eq!(repo.count().await.unwrap(), 6);

    repo.delete(1).await.unwrap();
    assert_eq!(repo.count().await.unwrap(), 5);
    assert!(matches!(repo.get(1).await, Err(Error::RecordNotFound(_))));
    assert!(matches!(repo.delete(1).await, Err(Error::RecordNotFound(_))));
}

#[tokio::test]
async fn test_list_pages() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);

    for i in 0..25 {
        repo.create(new_movie(&format!("Movie {i:02}"), 1990 + i, 90, &["drama"]))
            .await
            .unwrap();
    }

    let list = repo.list(&search("", "", "2", "10", "-year")).await.unwrap();
    assert_eq!(
        list.metadata,
        MetaData {
            current_page: 2,
            last_page: 3,
            total: 25
        }
    );
    let years: Vec<i32> = list.movies.iter().map(|m| m.year).collect();
    assert_eq!(years, (2000..=2004).rev().chain((1995..=1999).rev()).collect::<Vec<_>>());

    let last = repo.list(&search("", "", "3", "10", "-year")).await.unwrap();
    assert_eq!(last.movies.len(), 5);
    assert_eq!(last.metadata.total, 25);

    let past_end = repo.list(&search("", "", "4", "10", "-year")).await.unwrap();
    assert!(past_end.movies.is_empty());
    assert_eq!(past_end.metadata.total, 0);
    assert_eq!(past_end.metadata.last_page, 0);
}

#[tokio::test]
async fn test_list_ties_broken_by_id() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);

    let mut ids = Vec::new();
    for title in ["C", "A", "B", "D"] {
        ids.push(repo.create(new_movie(title, 2000, 100, &["drama"])).await.unwrap().id);
    }

    for sort in ["year", "-year", "runtime"] {
        let first = repo.list(&search("", "", "1", "2", sort)).await.unwrap();
        let second = repo.list(&search("", "", "2", "2", sort)).await.unwrap();
        let listed: Vec<i64> = first
            .movies
            .iter()
            .chain(second.movies.iter())
            .map(|m| m.id)
            .collect();
        assert_eq!(listed, ids, "sort {sort}");
    }
}

#[tokio::test]
async fn test_list_filters() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);
    seed(&repo).await;

    let all = repo.list(&search("", "", "1", "20", "id")).await.unwrap();
    assert_eq!(all.metadata.total, 6);

    let scifi_horror = repo
        .list(&search("", "horror,scifi", "1", "20", "year"))
        .await
        .unwrap();
    assert_eq!(titles(&scifi_horror), vec!["Alien", "The Thing"]);
    assert_eq!(scifi_horror.metadata.total, 2);

    let title = repo.list(&search("ALIEN", "", "1", "20", "-title")).await.unwrap();
    assert_eq!(titles(&title), vec!["Aliens", "Alien"]);

    let both = repo
        .list(&search("alien", "action", "1", "20", "id"))
        .await
        .unwrap();
    assert_eq!(titles(&both), vec!["Aliens"]);

    let literal = repo.list(&search("0%", "", "1", "20", "id")).await.unwrap();
    assert_eq!(titles(&literal), vec!["100% Wolf"]);

    let nothing = repo
        .list(&search("", "western", "1", "20", "id"))
        .await
        .unwrap();
    assert!(nothing.movies.is_empty());
    assert_eq!(
        nothing.metadata,
        MetaData {
            current_page: 1,
            last_page: 0,
            total: 0
        }
    );
}

#[tokio::test]
async fn test_title_search_folds_unicode_case() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);
    seed(&repo).await;
    let elite = repo
        .create(new_movie("Élite Squad", 2007, 115, &["crime", "action"]))
        .await
        .unwrap();

    for query in ["élite", "ÉLITE", "Élite", "e squad"] {
        let found = repo.list(&search(query, "", "1", "20", "id")).await.unwrap();
        assert_eq!(titles(&found), vec!["Élite Squad"], "query {query}");
    }

    let patch = MoviePatch {
        title: Patch::Present("ÖSTERREICH".to_string()),
        ..Default::default()
    };
    repo.patch(elite.id, patch).await.unwrap();
    let found = repo
        .list(&search("österreich", "crime", "1", "20", "id"))
        .await
        .unwrap();
    assert_eq!(titles(&found), vec!["ÖSTERREICH"]);
    let stale = repo.list(&search("élite", "", "1", "20", "id")).await.unwrap();
    assert!(stale.movies.is_empty());
}

#[tokio::test]
async fn test_list_with_filter_value() {
    let conn = init_db().await;
    let repo = MovieRepositoryImpl::new(conn);
    seed(&repo).await;

    let filter = Filter::new(1, 2, "-runtime", VALID_ORDER_FIELDS).unwrap();
    let list = repo.list(&MovieSearch::all(filter)).await.unwrap();
    assert_eq!(titles(&list), vec!["Heat", "Aliens"]);
    assert_eq!(list.metadata.last_page, 3);
}

#[tokio::test]
async fn test_connection_check() {
    let conn = init_db().await;
    mcat_dal::check_connection(&conn, Duration::from_secs(5))
        .await
        .unwrap();
}
