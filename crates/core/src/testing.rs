use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::{json, Value};

use crate::error::TransportError;
use crate::transport::{ApiRequest, Transport};

type Reply = Result<Value, TransportError>;

/// In-memory transport with canned replies per `(method, path)`.
///
/// Queued replies are consumed in order; the last one keeps answering. Unscripted
/// routes answer 404. Every request is recorded.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reply(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Drop any queued replies for the route and answer with `reply` from now on.
    pub(crate) fn replace(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .insert((method, path.to_string()), VecDeque::from([reply]));
        self
    }

    pub(crate) fn ok(&self, method: Method, path: &str, body: Value) -> &Self {
        self.reply(method, path, Ok(body))
    }

    pub(crate) fn status(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.reply(method, path, Err(TransportError::Status { status, body }))
    }

    pub(crate) fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let key = (request.method.clone(), request.path.clone());
        self.calls.lock().push(request);

        let mut routes = self.routes.lock();
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| Ok(Value::Null)),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Ok(Value::Null)),
            None => Err(TransportError::Status {
                status: 404,
                body: json!({ "message": "Not Found" }),
            }),
        }
    }
}

pub(crate) fn task_json(id: u64, title: &str, project_id: Option<u64>, tags: &[&str]) -> Value {
    let tags: Vec<Value> = tags
        .iter()
        .enumerate()
        .map(|(idx, name)| json!({ "id": idx as u64 + 1, "name": name, "user_id": 1 }))
        .collect();
    json!({
        "id": id,
        "title": title,
        "description": null,
        "status": "todo",
        "due_date": null,
        "user_id": 1,
        "project_id": project_id,
        "tags": tags,
        "created_at": "2025-01-01T00:00:00.000000Z",
        "updated_at": "2025-01-01T00:00:00.000000Z"
    })
}

pub(crate) fn project_json(id: u64, name: &str) -> Value {
    json!({ "id": id, "name": name, "description": null, "user_id": 1 })
}
