use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Canned `GET` responses keyed by request path.
#[derive(Debug, Clone, Default)]
pub struct Routes {
    responses: HashMap<String, (u16, String)>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(mut self, path: &str, body: impl Into<String>) -> Self {
        self.responses.insert(path.to_owned(), (200, body.into()));
        self
    }

    pub fn status(mut self, path: &str, status: u16, body: impl Into<String>) -> Self {
        self.responses.insert(path.to_owned(), (status, body.into()));
        self
    }
}

/// Document store served from a background thread; unknown paths answer 404.
pub struct StoreStub {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StoreStub {
    pub fn spawn(routes: Routes) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start store stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let hits = Arc::new(Mutex::new(Vec::new()));
        let hits_for_thread = Arc::clone(&hits);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                hits_for_thread
                    .lock()
                    .expect("lock hits")
                    .push(path.clone());

                let (status, body) = routes
                    .responses
                    .get(&path)
                    .cloned()
                    .unwrap_or((404, "not found".to_owned()));
                let _ = request
                    .respond(tiny_http::Response::from_string(body).with_status_code(status));
            }
        });

        Self {
            base_url,
            hits,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[allow(dead_code)]
    pub fn hit_count(&self, path: &str) -> usize {
        self.hits
            .lock()
            .expect("lock hits")
            .iter()
            .filter(|hit| hit.as_str() == path)
            .count()
    }
}

impl Drop for StoreStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// `chapters.json` body with one entry per `(number, url, filename)`.
#[allow(dead_code)]
pub fn manifest_json(title: &str, completed: bool, chapters: &[(u32, &str, &str)]) -> String {
    let chapters = chapters
        .iter()
        .map(|(number, url, filename)| {
            serde_json::json!({
                "chapter": number,
                "url": url,
                "filename": filename,
            })
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "novel_title": title,
        "total_chapters": chapters.len(),
        "last_updated": "2025-10-14 06:00:12 UTC",
        "completed": completed,
        "chapters": chapters,
    })
    .to_string()
}
