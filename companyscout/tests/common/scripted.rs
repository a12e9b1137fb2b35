use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use companyscout::fetcher::{RawResponse, Transport, TransportError};

/// What the scripted transport does for one request
#[derive(Debug, Clone)]
pub enum Reply {
    Page(String),
    Status(u16),
    Timeout,
    Refused,
    /// Sleep on the tokio clock, then serve the page
    Slow(Duration, String),
}

/// Transport that replays scripted replies per URL and records request times.
///
/// Each URL's replies are consumed in order; the last one repeats. Unknown
/// URLs get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, url: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(Url::parse(url).unwrap().to_string(), replies.into());
        self
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.on(url, vec![Reply::Page(html.to_string())])
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn request_count(&self, url: &str) -> usize {
        let url = Url::parse(url).unwrap().to_string();
        self.requests.lock().unwrap().iter().filter(|(u, _)| *u == url).count()
    }

    /// Gaps between consecutive requests, in order
    pub fn gaps(&self) -> Vec<Duration> {
        let requests = self.requests.lock().unwrap();
        requests.windows(2).map(|w| w[1].1 - w[0].1).collect()
    }

    fn next_reply(&self, url: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::Status(404)),
            None => Reply::Status(404),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push((url.to_string(), Instant::now()));
        let reply = self.next_reply(url.as_str());

        let ok = |body: String| RawResponse {
            status: 200,
            final_url: url.clone(),
            body,
        };
        match reply {
            Reply::Page(html) => Ok(ok(html)),
            Reply::Status(status) => Ok(RawResponse {
                status,
                final_url: url.clone(),
                body: String::new(),
            }),
            Reply::Timeout => Err(TransportError::Timeout),
            Reply::Refused => Err(TransportError::Connect("connection refused".to_string())),
            Reply::Slow(delay, html) => {
                tokio::time::sleep(delay).await;
                Ok(ok(html))
            }
        }
    }
}
