use super::policy::{MessageHandler, SelectionPolicy, TakeAll, Unimplemented};
use super::Processor::Processor;
use crate::Core::error::DispatchResult;

use std::sync::Arc;
use std::time::Duration;

/// Loop timing and thread naming for a [`Processor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Name given to the loop thread.
    pub thread_name: String,
    /// Sleep after a fast iteration when work is still queued.
    pub busy_sleep: Duration,
    /// Sleep after a fast iteration when both lanes are empty.
    pub idle_sleep: Duration,
    /// Iterations shorter than this are followed by a sleep; longer ones
    /// only yield.
    pub fast_loop_threshold: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            thread_name: "dmxp-processor".to_string(),
            busy_sleep: Duration::from_millis(1),
            idle_sleep: Duration::from_millis(10),
            fast_loop_threshold: Duration::from_millis(1),
        }
    }
}

pub struct ProcessorBuilder {
    config: ProcessorConfig,
    handler: Option<Arc<dyn MessageHandler>>,
    policy: Option<Arc<dyn SelectionPolicy>>,
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self {
            config: ProcessorConfig::default(),
            handler: None,
            policy: None,
        }
    }
}

impl ProcessorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn with_busy_sleep(mut self, sleep: Duration) -> Self {
        self.config.busy_sleep = sleep;
        self
    }

    pub fn with_idle_sleep(mut self, sleep: Duration) -> Self {
        self.config.idle_sleep = sleep;
        self
    }

    pub fn with_fast_loop_threshold(mut self, threshold: Duration) -> Self {
        self.config.fast_loop_threshold = threshold;
        self
    }

    pub fn with_handler<H>(mut self, handler: H) -> Self
    where
        H: MessageHandler + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: SelectionPolicy + 'static,
    {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Builds a stopped processor. Without a handler every message fails
    /// with `NotImplemented`; without a policy every lane is drained fully.
    pub fn build(self) -> Processor {
        let handler = self.handler.unwrap_or_else(|| Arc::new(Unimplemented));
        let policy = self.policy.unwrap_or_else(|| Arc::new(TakeAll));
        Processor::new(self.config, handler, policy)
    }

    pub fn build_started(self) -> DispatchResult<Processor> {
        let processor = self.build();
        processor.start()?;
        Ok(processor)
    }
}
