//! Process descriptors: the two shapes a user computation can take.
//!
//! A process never mutates a channel directly. It receives an `input`
//! value already resolved by the Planner (see [`crate::planner`]) and
//! returns the writes it wants applied at the next step boundary, as
//! `(channel name, value)` pairs - the Rust shape of the `send` binding
//! from the design doc. The other two bindings, `read` and `step`, are
//! carried in [`RunContext`].

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Per-invocation context passed alongside `input`.
///
/// `read` is backed by an immutable snapshot taken at the start of the
/// step, matching the concurrency model's requirement that channels are
/// frozen for the duration of a step: no lock is needed because every
/// task shares the same `Arc` over read-only data.
#[derive(Clone)]
pub struct RunContext {
    /// The step currently being executed.
    pub step: usize,
    snapshot: Arc<HashMap<String, Value>>,
}

impl RunContext {
    pub(crate) fn new(step: usize, snapshot: Arc<HashMap<String, Value>>) -> Self {
        Self { step, snapshot }
    }

    /// Reads a channel's value as of the start of this step.
    ///
    /// Returns `None` if the channel was empty at that point, matching
    /// the design doc's "`EmptyChannel` is converted to the none-sentinel
    /// at the process-facing boundary" rule.
    pub fn read(&self, channel: &str) -> Option<Value> {
        self.snapshot.get(channel).cloned()
    }
}

/// A user computation. One `execute` call corresponds to one process
/// invocation in one step.
///
/// Implementors do not need to know about channels at all: they receive
/// a plain `Value` and return the writes they want made.
pub trait NodeExecutor: Send + Sync {
    /// Runs the computation and returns the writes it produces.
    fn execute(
        &self,
        input: Value,
        ctx: RunContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<(String, Value)>>> + Send + '_>>;
}

impl<F, Fut> NodeExecutor for F
where
    F: Fn(Value, RunContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<(String, Value)>>> + Send + 'static,
{
    fn execute(
        &self,
        input: Value,
        ctx: RunContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<(String, Value)>>> + Send + '_>> {
        Box::pin(self(input, ctx))
    }
}

/// How an `Invoke` process's subscribed channels map onto its input.
///
/// Mirrors the design doc's singleton-none key: `Raw` is the `{∅: name}`
/// form (the process receives the channel's value directly), `Record`
/// is the keyed form (the process receives an object of `{key: value}`).
/// Modeling the sentinel as a variant rather than a literal `None` key in
/// a map keeps the "exactly one entry, no other keys" invariant
/// unrepresentable-by-construction instead of checked at runtime.
#[derive(Debug, Clone)]
pub enum Subscription {
    /// Subscribes to exactly one channel; input is that channel's value.
    Raw(String),
    /// Subscribes to one or more channels by local key; input is a JSON
    /// object built from the keyed values.
    Record(HashMap<String, String>),
}

impl Subscription {
    /// The channel names this subscription reads from, in no particular
    /// order.
    pub fn channel_names(&self) -> Vec<&str> {
        match self {
            Subscription::Raw(name) => vec![name.as_str()],
            Subscription::Record(map) => map.values().map(String::as_str).collect(),
        }
    }
}

/// One of the two process shapes THE CORE understands.
pub enum Process {
    /// Runs once per step in which any subscribed channel was updated,
    /// receiving a key-value mapping (or a raw value for a singleton
    /// subscription).
    Invoke {
        /// Name used in tracing and error messages.
        name: String,
        subscription: Subscription,
        /// Channel names this process is declared to write to, used for
        /// topology validation. The executor decides, per invocation,
        /// which of these (if any) it actually writes.
        writes_to: Vec<String>,
        executor: Arc<dyn NodeExecutor>,
    },
    /// Runs once per step in which its single subscribed channel (whose
    /// current value is a sequence) was updated, receiving the full
    /// sequence.
    Batch {
        /// Name used in tracing and error messages.
        name: String,
        channel: String,
        /// When set, each element `v` of the input sequence is wrapped
        /// as `{key: v}` before being passed to the executor.
        key: Option<String>,
        writes_to: Vec<String>,
        executor: Arc<dyn NodeExecutor>,
    },
}

impl Process {
    /// The process's name, for tracing and error messages.
    pub fn name(&self) -> &str {
        match self {
            Process::Invoke { name, .. } | Process::Batch { name, .. } => name,
        }
    }

    /// Channel names this process declares it may write to.
    pub fn writes_to(&self) -> &[String] {
        match self {
            Process::Invoke { writes_to, .. } | Process::Batch { writes_to, .. } => writes_to,
        }
    }

    /// Channel names this process reads from.
    pub fn reads_from(&self) -> Vec<&str> {
        match self {
            Process::Invoke { subscription, .. } => subscription.channel_names(),
            Process::Batch { channel, .. } => vec![channel.as_str()],
        }
    }

    pub(crate) fn executor(&self) -> &Arc<dyn NodeExecutor> {
        match self {
            Process::Invoke { executor, .. } | Process::Batch { executor, .. } => executor,
        }
    }

    /// Builds an `Invoke` subscribing to a single channel and writing its
    /// transform's result to a single output channel.
    ///
    /// A convenience constructor for the common `read one, write one`
    /// shape (e.g. `x -> x + "!"`); processes that need multiple writes
    /// or multiple reads should implement [`NodeExecutor`] directly.
    pub fn invoke<F>(name: impl Into<String>, from: impl Into<String>, to: impl Into<String>, transform: F) -> Process
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let to = to.into();
        let writes_to = vec![to.clone()];
        let executor = SingleOutput { to, transform };
        Process::Invoke {
            name: name.into(),
            subscription: Subscription::Raw(from.into()),
            writes_to,
            executor: Arc::new(executor),
        }
    }

    /// Builds a `Batch` process reading the full sequence of `channel`
    /// and writing its transform's result to a single output channel.
    pub fn batch<F>(name: impl Into<String>, channel: impl Into<String>, key: Option<String>, to: impl Into<String>, transform: F) -> Process
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let to = to.into();
        let writes_to = vec![to.clone()];
        let executor = SingleOutput { to, transform };
        Process::Batch {
            name: name.into(),
            channel: channel.into(),
            key,
            writes_to,
            executor: Arc::new(executor),
        }
    }
}

struct SingleOutput<F> {
    to: String,
    transform: F,
}

impl<F> NodeExecutor for SingleOutput<F>
where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync,
{
    fn execute(
        &self,
        input: Value,
        _ctx: RunContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<(String, Value)>>> + Send + '_>> {
        let result = (self.transform)(input);
        let to = self.to.clone();
        Box::pin(async move { result.map(|v| vec![(to, v)]) })
    }
}
