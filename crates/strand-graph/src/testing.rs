use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use strand_source::{Request, SourceError, SourceResult, Transport};

type Handler = Box<dyn Fn(&Request) -> SourceResult<Value> + Send + Sync>;

/// In-memory transport answering by request path and recording every
/// request it sees. Unknown paths answer 404.
pub struct MockTransport {
    handlers: HashMap<String, Handler>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, path: &str, value: Value) -> Self {
        self.with_handler(path, move |_| Ok(value.clone()))
    }

    pub fn with_error(
        self,
        path: &str,
        error: impl Fn() -> SourceError + Send + Sync + 'static,
    ) -> Self {
        self.with_handler(path, move |_| Err(error()))
    }

    pub fn with_handler(
        mut self,
        path: &str,
        handler: impl Fn(&Request) -> SourceResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(path.to_string(), Box::new(handler));
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &Request) -> SourceResult<Value> {
        self.requests.lock().unwrap().push(request.clone());
        match self.handlers.get(&request.path) {
            Some(handler) => handler(request),
            None => Err(SourceError::Status {
                status: 404,
                message: format!("no mock for {}", request.path),
            }),
        }
    }
}
