#![allow(dead_code)]

pub mod starwars;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scoped_dataload::{BatchFunction, BatchResult, SourceError};
use tokio::sync::Notify;

/// Shared by the data sources below; remembers every batch they were called with.
#[derive(Default)]
pub struct Recorder {
    batches: Mutex<Vec<Vec<String>>>,
    started: Notify,
    release: Notify,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, keys: &[String]) {
        self.batches.lock().unwrap().push(keys.to_vec());
        self.started.notify_one();
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Resolves once a data source has been entered.
    pub async fn fetch_started(&self) {
        self.started.notified().await
    }

    /// Lets a waiting [`GatedSource`] answer.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

pub fn keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| (*k).to_owned()).collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn names(keys: &[String]) -> BatchResult<String> {
    Ok(keys.iter().map(|k| Ok(format!("name-{}", k))).collect())
}

/// `id -> "name-" + id`
#[derive(Clone)]
pub struct NameSource;

#[async_trait]
impl BatchFunction<String, String> for NameSource {
    type Context = Arc<Recorder>;
    async fn load(keys: &[String], recorder: &Arc<Recorder>) -> BatchResult<String> {
        recorder.record(keys);
        names(keys)
    }
}

/// Like [`NameSource`] but fails every key that starts with `missing`.
pub struct PartialSource;

#[async_trait]
impl BatchFunction<String, String> for PartialSource {
    type Context = Arc<Recorder>;
    async fn load(keys: &[String], recorder: &Arc<Recorder>) -> BatchResult<String> {
        recorder.record(keys);
        Ok(keys
            .iter()
            .map(|k| {
                if k.starts_with("missing") {
                    Err(SourceError::new(format!("no record for {}", k)))
                } else {
                    Ok(format!("name-{}", k))
                }
            })
            .collect())
    }
}

pub struct FailingSource;

#[async_trait]
impl BatchFunction<String, String> for FailingSource {
    type Context = Arc<Recorder>;
    async fn load(keys: &[String], recorder: &Arc<Recorder>) -> BatchResult<String> {
        recorder.record(keys);
        Err(SourceError::new("backend unavailable"))
    }
}

/// Drops the last value of every batch.
pub struct ShortSource;

#[async_trait]
impl BatchFunction<String, String> for ShortSource {
    type Context = Arc<Recorder>;
    async fn load(keys: &[String], recorder: &Arc<Recorder>) -> BatchResult<String> {
        recorder.record(keys);
        let mut values = names(keys)?;
        values.pop();
        Ok(values)
    }
}

pub struct PanickingSource;

#[async_trait]
impl BatchFunction<String, String> for PanickingSource {
    type Context = Arc<Recorder>;
    async fn load(keys: &[String], recorder: &Arc<Recorder>) -> BatchResult<String> {
        recorder.record(keys);
        panic!("boom")
    }
}

pub struct SlowSource;

#[async_trait]
impl BatchFunction<String, String> for SlowSource {
    type Context = Arc<Recorder>;
    async fn load(keys: &[String], recorder: &Arc<Recorder>) -> BatchResult<String> {
        recorder.record(keys);
        tokio::time::sleep(Duration::from_secs(60)).await;
        names(keys)
    }
}

/// Answers only after [`Recorder::release`] is called.
pub struct GatedSource;

#[async_trait]
impl BatchFunction<String, String> for GatedSource {
    type Context = Arc<Recorder>;
    async fn load(keys: &[String], recorder: &Arc<Recorder>) -> BatchResult<String> {
        recorder.record(keys);
        recorder.release.notified().await;
        names(keys)
    }
}
