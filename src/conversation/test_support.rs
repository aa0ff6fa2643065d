//! Scripted fakes for the downstream capabilities.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::ClientFuture;
use crate::common::errors::{AssistantError, AssistantResult};
use crate::common::session::{ContextAnalysis, TokenUsage, Turn};
use crate::conversation::orchestrator::{
    ConversationDeps, ConversationOrchestrator, TurnSettings,
};
use crate::llm::analyzer::ContextAnalyzer;
use crate::llm::completion::{CompletionClient, CompletionOutput, CompletionRequest};
use crate::session::store::SessionStore;
use crate::voice::audio_store::InMemoryAudioStore;
use crate::voice::synthesis::SynthesisClient;

type Hook = Box<dyn Fn() + Send + Sync>;

enum CompletionScript {
    Replies(Mutex<VecDeque<String>>),
    Fail,
    Hang,
}

pub struct FakeCompletion {
    script: CompletionScript,
    calls: AtomicUsize,
    hook: Mutex<Option<Hook>>,
}

impl FakeCompletion {
    pub fn replying(replies: &[&str]) -> Arc<Self> {
        let replies = replies.iter().map(ToString::to_string).collect();
        Self::with_script(CompletionScript::Replies(Mutex::new(replies)))
    }

    pub fn failing() -> Arc<Self> {
        Self::with_script(CompletionScript::Fail)
    }

    pub fn hanging() -> Arc<Self> {
        Self::with_script(CompletionScript::Hang)
    }

    fn with_script(script: CompletionScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            hook: Mutex::new(None),
        })
    }

    /// Run `hook` every time a completion is requested.
    pub fn on_call(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionClient for FakeCompletion {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> ClientFuture<'_, AssistantResult<CompletionOutput>> {
        assert!(!request.messages.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook();
        }

        let outcome = match &self.script {
            CompletionScript::Replies(replies) => replies
                .lock()
                .unwrap()
                .pop_front()
                .map(|text| CompletionOutput {
                    text,
                    usage: TokenUsage {
                        input_tokens: 12,
                        output_tokens: 6,
                        total_tokens: 18,
                    },
                    model: "fake-model".to_string(),
                })
                .ok_or_else(|| {
                    AssistantError::Completion("script exhausted".to_string())
                }),
            CompletionScript::Fail => {
                Err(AssistantError::Completion("upstream 500".to_string()))
            }
            CompletionScript::Hang => return Box::pin(std::future::pending()),
        };
        Box::pin(async move { outcome })
    }
}

pub struct FakeAnalyzer {
    outcome: Option<ContextAnalysis>,
    hang: bool,
    calls: AtomicUsize,
    windows: Mutex<Vec<usize>>,
}

impl FakeAnalyzer {
    pub fn ok(analysis: ContextAnalysis) -> Arc<Self> {
        Self::new(Some(analysis), false)
    }

    pub fn failing() -> Arc<Self> {
        Self::new(None, false)
    }

    pub fn hanging() -> Arc<Self> {
        Self::new(None, true)
    }

    fn new(outcome: Option<ContextAnalysis>, hang: bool) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            hang,
            calls: AtomicUsize::new(0),
            windows: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn window_sizes(&self) -> Vec<usize> {
        self.windows.lock().unwrap().clone()
    }
}

impl ContextAnalyzer for FakeAnalyzer {
    fn analyze(&self, turns: Vec<Turn>) -> ClientFuture<'_, AssistantResult<ContextAnalysis>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push(turns.len());
        if self.hang {
            return Box::pin(std::future::pending());
        }
        let outcome = self
            .outcome
            .clone()
            .ok_or_else(|| AssistantError::Analysis("malformed reply".to_string()));
        Box::pin(async move { outcome })
    }
}

#[derive(Clone, Copy)]
enum SynthesisScript {
    Succeed,
    Fail,
    Hang,
}

pub struct FakeSynthesis {
    script: SynthesisScript,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl FakeSynthesis {
    pub fn ok() -> Arc<Self> {
        Self::new(SynthesisScript::Succeed)
    }

    pub fn failing() -> Arc<Self> {
        Self::new(SynthesisScript::Fail)
    }

    pub fn hanging() -> Arc<Self> {
        Self::new(SynthesisScript::Hang)
    }

    fn new(script: SynthesisScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

impl SynthesisClient for FakeSynthesis {
    fn synthesize(&self, text: String) -> ClientFuture<'_, AssistantResult<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text);
        let outcome = match self.script {
            SynthesisScript::Succeed => Ok(vec![0x49, 0x44, 0x33]),
            SynthesisScript::Fail => {
                Err(AssistantError::Synthesis("voice quota exceeded".to_string()))
            }
            SynthesisScript::Hang => return Box::pin(std::future::pending()),
        };
        Box::pin(async move { outcome })
    }
}

/// Orchestrator over a fresh store (history limit 10) and the given fakes.
pub fn orchestrator_with(
    completion: &Arc<FakeCompletion>,
    analyzer: &Arc<FakeAnalyzer>,
    synthesis: &Arc<FakeSynthesis>,
    settings: TurnSettings,
) -> (ConversationOrchestrator, Arc<SessionStore>) {
    let store = Arc::new(SessionStore::with_history_limit(10));
    let audio = InMemoryAudioStore::new("http://localhost:3000", 16).unwrap();
    let deps = ConversationDeps {
        completion: completion.clone(),
        analyzer: analyzer.clone(),
        synthesis: synthesis.clone(),
        audio: Arc::new(audio),
    };
    let orchestrator =
        ConversationOrchestrator::new(Arc::clone(&store), deps, settings).unwrap();
    (orchestrator, store)
}
