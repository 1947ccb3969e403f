//! Test doubles for the generation and blob capabilities.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use studyaid_blob::{BlobStatus, BlobStore};
use studyaid_llm::StudyGenerator;
use studyaid_shared::{Difficulty, Question, Result, StudyAidError, UserId};

/// Scripted outcome of one capability method.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Value(T),
    Fail,
}

impl<T: Clone> Reply<T> {
    fn resolve(&self, what: &str) -> Result<T> {
        match self {
            Reply::Value(v) => Ok(v.clone()),
            Reply::Fail => Err(StudyAidError::Generation(format!("{what} failed"))),
        }
    }
}

/// A [`StudyGenerator`] returning fixed replies and recording its inputs.
pub struct FakeGenerator {
    available: bool,
    inputs: Mutex<Vec<String>>,
    summary: Mutex<Reply<String>>,
    quiz: Mutex<Reply<Vec<Question>>>,
    concepts: Mutex<Reply<Vec<String>>>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn available() -> Self {
        Self {
            available: true,
            inputs: Mutex::new(Vec::new()),
            summary: Mutex::new(Reply::Value("A generated summary.".into())),
            quiz: Mutex::new(Reply::Value(vec![
                tf("Mitochondria generate ATP."),
                tf("Ribosomes assemble proteins."),
            ])),
            concepts: Mutex::new(Reply::Value(vec!["ATP".into(), "Ribosome".into()])),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    pub fn with_summary(self, reply: Reply<String>) -> Self {
        self.set_summary(reply);
        self
    }

    pub fn with_quiz(self, reply: Reply<Vec<Question>>) -> Self {
        self.set_quiz(reply);
        self
    }

    pub fn with_concepts(self, reply: Reply<Vec<String>>) -> Self {
        self.set_concepts(reply);
        self
    }

    pub fn set_summary(&self, reply: Reply<String>) {
        *self.summary.lock().expect("lock") = reply;
    }

    pub fn set_quiz(&self, reply: Reply<Vec<Question>>) {
        *self.quiz.lock().expect("lock") = reply;
    }

    pub fn set_concepts(&self, reply: Reply<Vec<String>>) {
        *self.concepts.lock().expect("lock") = reply;
    }

    /// Total capability calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Text passed to each call, in call order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().expect("lock").clone()
    }

    fn record(&self, text: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().expect("lock").push(text.to_string());
    }
}

#[async_trait]
impl StudyGenerator for FakeGenerator {
    fn is_available(&self) -> bool {
        self.available
    }

    fn model(&self) -> Option<String> {
        self.available.then(|| "fake-model".to_string())
    }

    async fn generate_summary(&self, text: &str, _max_length: usize) -> Result<String> {
        self.record(text);
        self.summary.lock().expect("lock").resolve("summary")
    }

    async fn generate_quiz(
        &self,
        text: &str,
        _num_mcq: usize,
        _num_short: usize,
    ) -> Result<Vec<Question>> {
        self.record(text);
        self.quiz.lock().expect("lock").resolve("quiz")
    }

    async fn generate_key_concepts(&self, text: &str, _max_count: usize) -> Result<Vec<String>> {
        self.record(text);
        self.concepts.lock().expect("lock").resolve("concepts")
    }
}

/// A valid true/false question.
pub fn tf(text: &str) -> Question {
    match Question::true_false(text, true, "From the material.", Difficulty::Easy, None) {
        Ok(q) => q,
        Err(e) => panic!("invalid test question {text:?}: {e}"),
    }
}

/// An in-memory [`BlobStore`] addressing objects as `https://blobs.test/{name}`.
pub struct FakeBlobStore {
    configured: bool,
    uploaded: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeBlobStore {
    pub fn configured() -> Self {
        Self {
            configured: true,
            uploaded: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::configured()
        }
    }

    /// File names uploaded so far.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().expect("lock").clone()
    }

    /// URLs deleted so far.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("lock").clone()
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn status(&self) -> BlobStatus {
        BlobStatus {
            supabase_url: self.configured,
            supabase_anon_key: self.configured,
            supabase_service_role_key: self.configured,
            bucket_name: "study-materials".into(),
            storage_url: self.configured,
            client_initialized: self.configured,
            is_configured: self.configured,
        }
    }

    async fn upload(
        &self,
        _bytes: Vec<u8>,
        file_name: &str,
        _content_type: &str,
        _owner: UserId,
    ) -> Result<String> {
        if !self.configured {
            return Err(StudyAidError::Unavailable("Storage service".into()));
        }
        self.uploaded.lock().expect("lock").push(file_name.to_string());
        Ok(format!("https://blobs.test/{file_name}"))
    }

    async fn delete(&self, url: &str) -> bool {
        self.deleted.lock().expect("lock").push(url.to_string());
        true
    }

    async fn sign(&self, url: &str, ttl_secs: u64) -> String {
        format!("{url}?token=signed&ttl={ttl_secs}")
    }
}
