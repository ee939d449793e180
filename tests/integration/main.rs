//! Integration tests for streams-cache

const SHELL: &[(&str, &str)] = &[
    ("/index.html", "<html>streams</html>"),
    ("/streams.png", "png-bytes"),
    ("/apps/clock.js", "clock()"),
];

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn streams(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("streams-cache");
        cmd.env("STREAMS_CACHE_CONFIG", dir.path().join("config.toml"))
            .env("STREAMS_CACHE_STATE_DIR", dir.path().join("state"))
            .env("CI", "1");
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("versioned asset-caching proxy"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("streams-cache"));
    }

    #[test]
    fn config_path_follows_env() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                dir.path().join("config.toml").display().to_string(),
            ));
    }

    #[test]
    fn config_show_defaults() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[worker]"))
            .stdout(predicate::str::contains("api.open-meteo.com"));
    }

    #[test]
    fn config_init_then_set() {
        let dir = TempDir::new().unwrap();
        streams(&dir).args(["config", "init"]).assert().success();
        streams(&dir)
            .args(["config", "set", "worker.version", "13.3"])
            .assert()
            .success();

        let content = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
        assert!(content.contains("version = \"13.3\""));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown key"));
    }

    #[test]
    fn caches_empty() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .args(["caches", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn send_without_active_worker() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .args(["send", r#"{"action":"skipWaiting"}"#])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No active worker"))
            .stderr(predicate::str::contains("streams-cache install"));
    }

    #[test]
    fn send_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .args(["send", "{nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not valid JSON"));
    }

    #[test]
    fn skip_waiting_without_waiting_worker() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .arg("skip-waiting")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No waiting worker"));
    }

    #[test]
    fn status_runs() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("streams-cache-v13.2"))
            .stdout(predicate::str::contains("api.open-meteo.com"));
    }

    #[test]
    fn install_fails_when_origin_unreachable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[network]\norigin = \"http://127.0.0.1:9\"\n",
        )
        .unwrap();

        streams(&dir)
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Install of streams-cache-v13.2 failed"));

        streams(&dir)
            .args(["caches", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn detach_unknown_client() {
        let dir = TempDir::new().unwrap();
        streams(&dir)
            .args(["clients", "detach", "6f1c0f9e-55a4-4d43-9d0e-0d7b1c0c2f5a"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Client not found"));
    }
}

mod served_tests {
    use super::SHELL;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Serve the shell routes; anything else gets wiremock's default 404
    async fn setup() -> (TempDir, MockServer) {
        let server = MockServer::start().await;
        for (route, body) in SHELL {
            Mock::given(method("GET"))
                .and(path(*route))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("Content-Type", "text/plain")
                        .set_body_string(*body),
                )
                .mount(&server)
                .await;
        }

        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            format!(
                "[worker]\ncore_assets = [\"/index.html\", \"/streams.png\"]\n\n[network]\norigin = \"{}\"\n",
                server.uri()
            ),
        )
        .unwrap();
        (dir, server)
    }

    fn streams(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("streams-cache");
        cmd.env("STREAMS_CACHE_CONFIG", dir.path().join("config.toml"))
            .env("STREAMS_CACHE_STATE_DIR", dir.path().join("state"))
            .env("CI", "1");
        cmd
    }

    async fn hits(server: &MockServer, route: &str) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == route)
            .count()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn install_then_fetch_from_cache() {
        let (dir, server) = setup().await;
        streams(&dir)
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("streams-cache-v13.2 is active"));
        assert_eq!(hits(&server, "/index.html").await, 1);
        assert_eq!(hits(&server, "/streams.png").await, 1);

        streams(&dir)
            .args(["entries", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/index.html"))
            .stdout(predicate::str::contains("/streams.png"));

        streams(&dir)
            .args(["fetch", "/index.html"])
            .assert()
            .success()
            .stdout("<html>streams</html>");

        // served from the cache without touching the origin
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn miss_is_cached_but_404_is_not() {
        let (dir, server) = setup().await;
        streams(&dir).arg("install").assert().success();

        for _ in 0..2 {
            streams(&dir)
                .args(["fetch", "/apps/clock.js"])
                .assert()
                .success()
                .stdout("clock()");
        }
        assert_eq!(hits(&server, "/apps/clock.js").await, 1);

        for _ in 0..2 {
            streams(&dir)
                .args(["fetch", "-i", "/nothing-here"])
                .assert()
                .success()
                .stdout(predicate::str::starts_with("404"));
        }
        assert_eq!(hits(&server, "/nothing-here").await, 2);

        let listed = streams(&dir)
            .args(["entries", "--format", "plain"])
            .output()
            .unwrap();
        let listed = String::from_utf8(listed.stdout).unwrap();
        assert!(listed.contains("/apps/clock.js"));
        assert!(!listed.contains("/nothing-here"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cache_and_uncache_app() {
        let (dir, _server) = setup().await;
        streams(&dir).arg("install").assert().success();

        streams(&dir)
            .args([
                "send",
                "--format",
                "json",
                r#"{"action":"cache-app","files":["/apps/clock.js","/apps/missing.js"]}"#,
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"outcome\": \"cache-app\""))
            .stdout(predicate::str::contains("/apps/missing.js"));

        streams(&dir)
            .args([
                "send",
                "--format",
                "plain",
                r#"{"action":"uncache-app","filesToDelete":["/apps/clock.js","/apps/never.js"]}"#,
            ])
            .assert()
            .success()
            .stdout("uncache-app\n");

        streams(&dir)
            .args(["send", "--format", "plain", r#"{"action":"cache-app","files":[]}"#])
            .assert()
            .success()
            .stdout("ignored\n");

        streams(&dir)
            .args(["entries", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/apps/clock.js").not());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upgrade_waits_for_clients_then_purges_old_cache() {
        let (dir, _server) = setup().await;
        streams(&dir).arg("install").assert().success();

        let attached = streams(&dir).args(["clients", "attach"]).output().unwrap();
        assert!(attached.status.success());
        let client = String::from_utf8(attached.stdout).unwrap().trim().to_string();

        streams(&dir)
            .args(["config", "set", "worker.version", "13.3"])
            .assert()
            .success();
        streams(&dir)
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("waiting"));

        streams(&dir)
            .args(["caches", "--format", "plain"])
            .assert()
            .success()
            .stdout("streams-cache-v13.2\nstreams-cache-v13.3\n");

        streams(&dir)
            .args(["clients", "detach", &client])
            .assert()
            .success()
            .stdout(predicate::str::contains("Deleted stale cache streams-cache-v13.2"));

        streams(&dir)
            .args(["caches", "--format", "plain"])
            .assert()
            .success()
            .stdout("streams-cache-v13.3\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn skip_waiting_promotes_new_version() {
        let (dir, _server) = setup().await;
        streams(&dir).arg("install").assert().success();
        streams(&dir).args(["clients", "attach"]).assert().success();
        streams(&dir)
            .args(["config", "set", "worker.version", "13.3"])
            .assert()
            .success();
        streams(&dir).arg("install").assert().success();

        streams(&dir)
            .args(["send", "--waiting", r#"{"action":"skipWaiting"}"#])
            .assert()
            .success();

        streams(&dir)
            .args(["clients", "list", "--format", "table"])
            .assert()
            .success()
            .stdout(predicate::str::contains("streams-cache-v13.3"));
        streams(&dir)
            .args(["caches", "--format", "plain"])
            .assert()
            .success()
            .stdout("streams-cache-v13.3\n");
    }
}

mod lifecycle_tests {
    use std::sync::Arc;
    use streams_cache::events::EventLog;
    use streams_cache::fetch::{StubFetcher, StubRoute};
    use streams_cache::storage::{CacheStorage, DiskStorage};
    use streams_cache::worker::{Registration, Registry, WorkerRecord, WorkerState};
    use tempfile::TempDir;
    use url::Url;

    fn record(version: &str) -> WorkerRecord {
        WorkerRecord::new(
            format!("streams-cache-v{}", version),
            vec!["/index.html".to_string(), "/streams.png".to_string()],
            vec![
                "api.open-meteo.com".to_string(),
                "nominatim.openstreetmap.org".to_string(),
            ],
        )
    }

    fn fetcher() -> Arc<StubFetcher> {
        Arc::new(
            StubFetcher::new()
                .route("http://localhost:8080/index.html", StubRoute::ok("<html>"))
                .route("http://localhost:8080/streams.png", StubRoute::ok("png")),
        )
    }

    #[tokio::test]
    async fn upgrade_on_disk_storage() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(DiskStorage::new(dir.path().join("caches")));
        let mut registry = Registry::new(
            Registration::default(),
            Url::parse("http://localhost:8080/").unwrap(),
            storage.clone(),
            fetcher(),
            EventLog::disabled(),
        );

        assert_eq!(
            registry.register(record("13.2")).await.unwrap(),
            WorkerState::Activated
        );
        let v2 = storage.open("streams-cache-v13.2").await.unwrap();
        assert_eq!(v2.keys().await.unwrap().len(), 2);

        assert_eq!(
            registry.register(record("13.3")).await.unwrap(),
            WorkerState::Activated
        );
        assert_eq!(storage.keys().await.unwrap(), vec!["streams-cache-v13.3"]);

        // a fresh handle sees the same caches
        let reopened = DiskStorage::new(dir.path().join("caches"));
        assert!(!reopened.has("streams-cache-v13.2").await.unwrap());
        let v3 = reopened.open("streams-cache-v13.3").await.unwrap();
        assert_eq!(v3.keys().await.unwrap().len(), 2);
    }
}
