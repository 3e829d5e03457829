// HTTP server end to end over a real socket

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use webmerge::config::Config;
use webmerge::modules::ModuleRegistry;
use webmerge::server::{build_pipeline, serve, AppState};

use super::test_harness::Site;

struct RunningServer {
    address: std::net::SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    async fn start(site: &Site, context_path: &str) -> Self {
        let mut config = Config::default();
        config.site.root = site.root().to_path_buf();
        config.site.context_path = context_path.to_string();
        config.validate().unwrap();

        let pipeline = build_pipeline(&config, &ModuleRegistry::builtin()).unwrap();
        let state = Arc::new(AppState::new(Arc::new(pipeline), &config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, state, async move {
            let _ = rx.await;
        }));

        Self {
            address,
            shutdown: Some(tx),
            task,
        }
    }

    /// Send one raw request and return the full raw response
    async fn request(&self, method: &str, target: &str, extra_headers: &str) -> String {
        let mut stream = TcpStream::connect(self.address).await.unwrap();
        let request = format!(
            "{} {} HTTP/1.1\r\nHost: localhost\r\n{}Connection: close\r\n\r\n",
            method, target, extra_headers
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        String::from_utf8_lossy(&raw).into_owned()
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}

fn status_of(raw: &str) -> u16 {
    raw.split_whitespace().nth(1).unwrap().parse().unwrap()
}

fn body_of(raw: &str) -> &str {
    raw.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}

fn header_of<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.split("\r\n\r\n").next()?.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

fn site() -> Site {
    let site = Site::new();
    site.write("js/a.js", "var a = 1;\n")
        .write("js/b.js", "var b = 2;\n")
        .write("index.html", "<h1>hi</h1>");
    site
}

#[tokio::test]
async fn test_merged_response_over_http() {
    let site = site();
    let server = RunningServer::start(&site, "").await;

    let raw = server.request("GET", "/js/a,b.js", "").await;

    assert_eq!(status_of(&raw), 200);
    assert_eq!(body_of(&raw), "var a = 1;\nvar b = 2;\n");
    assert_eq!(header_of(&raw, "content-type"), Some("text/javascript"));
    assert_eq!(header_of(&raw, "x-optimized-by"), Some("webmerge"));
    assert!(header_of(&raw, "etag").is_some());
    server.stop().await;
}

#[tokio::test]
async fn test_not_modified_over_http() {
    let site = site();
    let server = RunningServer::start(&site, "").await;
    let first = server.request("GET", "/js/a,b.js", "").await;
    let etag = header_of(&first, "etag").unwrap().to_string();

    let raw = server
        .request("GET", "/js/a,b.js", &format!("If-None-Match: {}\r\n", etag))
        .await;

    assert_eq!(status_of(&raw), 304);
    assert_eq!(body_of(&raw), "");
    server.stop().await;
}

#[tokio::test]
async fn test_context_path_and_encoded_paths() {
    let site = site();
    site.write("js/with space.js", "space();\n");
    let server = RunningServer::start(&site, "/static").await;

    let raw = server.request("GET", "/static/js/a,with%20space.js", "").await;

    assert_eq!(status_of(&raw), 200);
    assert_eq!(body_of(&raw), "var a = 1;\nspace();\n");
    server.stop().await;
}

#[tokio::test]
async fn test_missing_and_static_files() {
    let site = site();
    let server = RunningServer::start(&site, "").await;

    let missing = server.request("GET", "/js/missing1,missing2.js", "").await;
    assert_eq!(status_of(&missing), 404);

    let page = server.request("GET", "/index.html", "").await;
    assert_eq!(status_of(&page), 200);
    assert_eq!(body_of(&page), "<h1>hi</h1>");

    let head = server.request("HEAD", "/index.html", "").await;
    assert_eq!(status_of(&head), 200);
    assert_eq!(header_of(&head, "content-length"), Some("11"));
    assert_eq!(body_of(&head), "");
    server.stop().await;
}
