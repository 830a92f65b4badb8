//! Scripted in-process data source for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::storage::{DataSource, FetchedRows, Row, SourceError};

struct Script {
    pattern: String,
    result: Result<FetchedRows, SourceError>,
    delay: Option<Duration>,
}

/// Answers statements by substring match against registered scripts.
///
/// Scripts are tried in registration order; the first whose pattern occurs
/// in the statement wins. Unscripted statements fail as a missing object.
pub struct ScriptedSource {
    id: String,
    scripts: Vec<Script>,
    reachable: bool,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedSource {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            scripts: Vec::new(),
            reachable: true,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_rows(self, pattern: &str, rows: Vec<Row>) -> Self {
        self.with_fetched(pattern, rows.into_iter().map(Ok).collect())
    }

    pub fn with_fetched(mut self, pattern: &str, rows: FetchedRows) -> Self {
        self.scripts.push(Script {
            pattern: pattern.to_string(),
            result: Ok(rows),
            delay: None,
        });
        self
    }

    pub fn with_error(mut self, pattern: &str, err: SourceError) -> Self {
        self.scripts.push(Script {
            pattern: pattern.to_string(),
            result: Err(err),
            delay: None,
        });
        self
    }

    /// Delay every script registered under `pattern`.
    pub fn with_delay(mut self, pattern: &str, delay: Duration) -> Self {
        for script in self.scripts.iter_mut().filter(|s| s.pattern == pattern) {
            script.delay = Some(delay);
        }
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// How many fetches matched `pattern`.
    pub fn calls(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(pattern)
            .copied()
            .unwrap_or(0)
    }

    /// Total fetches across all scripts.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn ping(&self) -> Result<(), SourceError> {
        if self.reachable {
            Ok(())
        } else {
            Err(SourceError::Connection("connection refused".into()))
        }
    }

    async fn fetch(&self, sql: &str) -> Result<FetchedRows, SourceError> {
        if !self.reachable {
            return Err(SourceError::Connection("connection refused".into()));
        }
        let Some(script) = self.scripts.iter().find(|s| sql.contains(&s.pattern)) else {
            return Err(SourceError::Query(format!("object not found for: {sql}")));
        };
        *self
            .calls
            .lock()
            .unwrap()
            .entry(script.pattern.clone())
            .or_default() += 1;
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }
        script.result.clone()
    }
}
