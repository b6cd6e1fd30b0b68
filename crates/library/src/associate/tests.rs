use super::*;
use std::sync::Arc;
use time::UtcDateTime;
use tome_catalog::{BookFields, Database, Link, Manifest};
use tome_storage::backend::{LocalBackend, MockBackend, Operation};

struct Fixture {
    db: Database,
    repo: Repository,
    download: DownloadId,
}

async fn fixture(directory: &str, files: Manifest) -> Fixture {
    let db = Database::connect_in_memory().await.unwrap();
    let repo = Repository::from(&db);
    let download = DownloadId::generate();
    let staged = StagedDownload { id: download, directory: directory.to_string(), files, created_at: UtcDateTime::now() };
    repo.insert_download(&staged).await.unwrap();
    Fixture { db, repo, download }
}

fn audio(paths: &[&str]) -> Manifest {
    Manifest { audio: paths.iter().map(PathBuf::from).collect(), ..Default::default() }
}

async fn book(repo: &Repository, authors: &[&str], series: Option<(&str, &str)>) -> BookId {
    let mut tx = repo.begin().await.unwrap();
    let id = tx.insert_book(&BookFields { title: "Foundation".to_string(), ..Default::default() }).await.unwrap();
    let mut links = Vec::new();
    for name in authors {
        let category = tx.insert_category(CategoryKind::Author, name).await.unwrap();
        links.push(Link { category: category.id, volume: None });
    }
    tx.write_links(id, CategoryKind::Author, &links).await.unwrap();
    if let Some((name, volume)) = series {
        let category = tx.insert_category(CategoryKind::Series, name).await.unwrap();
        let link = Link { category: category.id, volume: Some(volume.to_string()) };
        tx.write_links(id, CategoryKind::Series, &[link]).await.unwrap();
    }
    tx.commit().await.unwrap();
    id
}

/// Makes the commit step fail by refusing to delete staged downloads.
async fn break_commit(db: &Database) {
    let sql = "CREATE TRIGGER refuse_download_delete BEFORE DELETE ON downloads BEGIN SELECT RAISE(ABORT, 'refused'); END";
    sqlx::query(sql).execute(db.pool()).await.unwrap();
}

fn mock_ctx() -> Context {
    Context::new("/staging", "/library").unwrap()
}

#[tokio::test]
async fn test_associate_moves_and_links() {
    let temp_dir = tempfile::tempdir().unwrap();
    let staging = temp_dir.path().join("staging");
    let library = temp_dir.path().join("library");
    std::fs::create_dir_all(staging.join("book1")).unwrap();
    std::fs::create_dir_all(&library).unwrap();
    std::fs::write(staging.join("book1/a.m4b"), b"audio").unwrap();
    let backend: BackendHandle = Arc::new(LocalBackend::new("local"));
    let ctx = Context::new(&staging, &library).unwrap();
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;

    let association = associate(&backend, &repo, &ctx, download, book).await.unwrap();
    assert_eq!(association.from, staging.join("book1"));
    assert_eq!(association.to, library.join("Asimov/book1"));
    assert!(association.sidecar);

    let record = repo.get_book(book).await.unwrap().unwrap();
    assert_eq!(record.directory, Some(PathBuf::from("Asimov/book1")));
    assert_eq!(record.files.audio, [PathBuf::from("Asimov/book1/a.m4b")]);
    assert!(repo.get_download(download).await.unwrap().is_none());
    assert!(!staging.join("book1").exists());
    assert_eq!(std::fs::read(library.join("Asimov/book1/a.m4b")).unwrap(), b"audio");
    let sidecar = std::fs::read_to_string(library.join("Asimov/book1/metadata.json")).unwrap();
    assert!(sidecar.contains(r#""authors":["Asimov"]"#));
    assert!(!ctx.reservations.is_reserved(download));
}

#[tokio::test]
async fn test_associate_into_series_directory() {
    let backend: BackendHandle = Arc::new(MockBackend::with_files([("/staging/book1/a.m4b", b"audio")]).with_dirs(["/library"]));
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Frank Herbert", "Brian Herbert"], Some(("Dune", "1"))).await;

    let association = associate(&backend, &repo, &mock_ctx(), download, book).await.unwrap();
    assert_eq!(association.to, Path::new("/library/Frank Herbert/Dune/book1"));
    let record = repo.get_book(book).await.unwrap().unwrap();
    assert_eq!(record.directory, Some(PathBuf::from("Frank Herbert/Dune/book1")));
}

#[tokio::test]
async fn test_dot_series_keeps_the_layout() {
    let backend: BackendHandle = Arc::new(MockBackend::with_files([("/staging/book1/a.m4b", b"audio")]).with_dirs(["/library"]));
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], Some(("..", "1"))).await;
    let association = associate(&backend, &repo, &mock_ctx(), download, book).await.unwrap();
    assert_eq!(association.to, Path::new("/library/Asimov/__/book1"));
}

#[tokio::test]
async fn test_book_without_author_goes_under_unknown() {
    let backend: BackendHandle = Arc::new(MockBackend::with_files([("/staging/book1/a.m4b", b"audio")]).with_dirs(["/library"]));
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &[], None).await;
    let association = associate(&backend, &repo, &mock_ctx(), download, book).await.unwrap();
    assert_eq!(association.to, Path::new("/library/Unknown/book1"));
}

#[tokio::test]
async fn test_vanished_staging_directory_is_not_found() {
    let backend: BackendHandle = Arc::new(MockBackend::default().with_dirs(["/staging", "/library"]));
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;

    let err = associate(&backend, &repo, &mock_ctx(), download, book).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));
    assert!(err.is_client_error());
    assert!(!backend.exists(Path::new("/library/Asimov")).await.unwrap());
    assert!(repo.get_download(download).await.unwrap().is_some());
}

#[tokio::test]
async fn test_staging_directory_gone_at_rename_is_not_found() {
    let backend: BackendHandle = Arc::new(MockBackend::with_files([("/staging/book1/a.m4b", b"audio")]).with_dirs(["/library"]));
    let moved = Move::perform(&backend, PathBuf::from("/staging/book2"), PathBuf::from("/library/book2")).await;
    let err = moved.err().unwrap();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));
}

#[tokio::test]
async fn test_missing_download_or_book_touches_nothing() {
    let mock = Arc::new(MockBackend::with_files([("/staging/book1/a.m4b", b"audio")]).with_dirs(["/library"]));
    let backend: BackendHandle = mock.clone();
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;
    let ctx = mock_ctx();

    let err = associate(&backend, &repo, &ctx, DownloadId::generate(), book).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));
    let err = associate(&backend, &repo, &ctx, download, BookId::generate()).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));

    assert!(mock.contents("/staging/book1/a.m4b").await.is_some());
    assert!(!backend.exists(Path::new("/library/Asimov")).await.unwrap());
    assert!(repo.get_download(download).await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_commit_moves_files_back() {
    let temp_dir = tempfile::tempdir().unwrap();
    let staging = temp_dir.path().join("staging");
    let library = temp_dir.path().join("library");
    std::fs::create_dir_all(staging.join("book1")).unwrap();
    std::fs::create_dir_all(&library).unwrap();
    std::fs::write(staging.join("book1/a.m4b"), b"audio").unwrap();
    let backend: BackendHandle = Arc::new(LocalBackend::new("local"));
    let ctx = Context::new(&staging, &library).unwrap();
    let Fixture { db, repo, download } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;
    break_commit(&db).await;

    let err = associate(&backend, &repo, &ctx, download, book).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Compensated));
    assert!(!err.needs_intervention());
    assert!(!library.join("Asimov/book1").exists());
    assert_eq!(std::fs::read(staging.join("book1/a.m4b")).unwrap(), b"audio");
    assert!(repo.get_download(download).await.unwrap().is_some());
    assert_eq!(repo.get_book(book).await.unwrap().unwrap().directory, None);
    assert!(!ctx.reservations.is_reserved(download));
}

#[tokio::test]
async fn test_row_deleted_elsewhere_is_compensated() {
    let backend: BackendHandle = Arc::new(MockBackend::with_files([("/staging/book1/a.m4b", b"audio")]).with_dirs(["/library"]));
    let ctx = mock_ctx();
    let Fixture { db, repo, download } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;
    // Another process's scanner got there first: the delete matches no row.
    let sql = "CREATE TRIGGER download_already_gone BEFORE DELETE ON downloads BEGIN SELECT RAISE(IGNORE); END";
    sqlx::query(sql).execute(db.pool()).await.unwrap();

    let err = associate(&backend, &repo, &ctx, download, book).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Compensated));
    assert!(backend.exists(Path::new("/staging/book1/a.m4b")).await.unwrap());
    assert!(!backend.exists(Path::new("/library/Asimov/book1")).await.unwrap());
    assert_eq!(repo.get_book(book).await.unwrap().unwrap().directory, None);
}

#[tokio::test]
async fn test_failed_compensation_is_stranded() {
    let mock = Arc::new(
        MockBackend::with_files([("/staging/book1/a.m4b", b"audio")])
            .with_dirs(["/library"])
            .fail_on(Operation::Rename, "/library/Asimov/book1"),
    );
    let backend: BackendHandle = mock.clone();
    let Fixture { db, repo, download } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;
    break_commit(&db).await;

    let err = associate(&backend, &repo, &mock_ctx(), download, book).await.unwrap_err();
    match &*err {
        ErrorKind::Stranded { from, to } => {
            assert_eq!(from, Path::new("/staging/book1"));
            assert_eq!(to, Path::new("/library/Asimov/book1"));
        },
        other => panic!("expected stranded files, got {other:?}"),
    }
    assert!(err.needs_intervention());
    assert!(mock.contents("/library/Asimov/book1/a.m4b").await.is_some());
}

#[tokio::test]
async fn test_occupied_destination_is_a_conflict() {
    let mock = Arc::new(MockBackend::with_files([
        ("/staging/book1/a.m4b", b"audio".as_slice()),
        ("/library/Asimov/book1/other.m4b", b"other".as_slice()),
    ]));
    let backend: BackendHandle = mock.clone();
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;

    let err = associate(&backend, &repo, &mock_ctx(), download, book).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Conflict(_)));
    assert!(mock.contents("/staging/book1/a.m4b").await.is_some());
    assert!(repo.get_download(download).await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_association_is_a_conflict() {
    let backend: BackendHandle = Arc::new(MockBackend::with_files([("/staging/book1/a.m4b", b"audio")]).with_dirs(["/library"]));
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;
    let ctx = mock_ctx();
    let _claim = ctx.reservations.try_reserve(download).unwrap();

    let err = associate(&backend, &repo, &ctx, download, book).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Conflict(_)));
}

#[tokio::test]
async fn test_sidecar_failure_keeps_the_association() {
    let backend: BackendHandle = Arc::new(
        MockBackend::with_files([("/staging/book1/a.m4b", b"audio")])
            .with_dirs(["/library"])
            .fail_on(Operation::Write, "/library/Asimov/book1/metadata.json"),
    );
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;

    let association = associate(&backend, &repo, &mock_ctx(), download, book).await.unwrap();
    assert!(!association.sidecar);
    assert!(repo.get_download(download).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sidecar_can_be_disabled() {
    let mock = Arc::new(MockBackend::with_files([("/staging/book1/a.m4b", b"audio")]).with_dirs(["/library"]));
    let backend: BackendHandle = mock.clone();
    let Fixture { repo, download, .. } = fixture("book1", audio(&["book1/a.m4b"])).await;
    let book = book(&repo, &["Asimov"], None).await;

    let ctx = mock_ctx().with_sidecar(false);
    let association = associate(&backend, &repo, &ctx, download, book).await.unwrap();
    assert!(!association.sidecar);
    assert!(mock.contents("/library/Asimov/book1/metadata.json").await.is_none());
}
