use std::sync::Arc;

use crate::{
    events::NoopEventRecorder,
    random::ThreadRandom,
    storage::{MemoryStorage, SharedStorage, Storage},
    EventRecorder, ExperienceClient, RandomSource,
};

/// Configuration for [`ExperienceClient`].
pub struct ClientConfig<'a> {
    pub(crate) durable_storage: SharedStorage,
    pub(crate) session_storage: SharedStorage,
    pub(crate) random: Box<dyn RandomSource + Send + Sync + 'a>,
    pub(crate) event_recorder: Box<dyn EventRecorder + Send + Sync + 'a>,
}

impl<'a> ClientConfig<'a> {
    /// Create a default configuration: in-memory storages, thread-local randomness and no event
    /// recording.
    ///
    /// ```
    /// # use pb_experience::ClientConfig;
    /// ClientConfig::new();
    /// ```
    pub fn new() -> Self {
        ClientConfig {
            durable_storage: Arc::new(MemoryStorage::new()),
            session_storage: Arc::new(MemoryStorage::new()),
            random: Box::new(ThreadRandom),
            event_recorder: Box::new(NoopEventRecorder),
        }
    }

    /// Set storage for the visitor id and variant assignments. It should outlive browser
    /// sessions.
    pub fn durable_storage(&mut self, storage: impl Storage + Send + Sync + 'static) -> &mut Self {
        self.durable_storage = Arc::new(storage);
        self
    }

    /// Set storage for the session id.
    pub fn session_storage(&mut self, storage: impl Storage + Send + Sync + 'static) -> &mut Self {
        self.session_storage = Arc::new(storage);
        self
    }

    /// Override the random source used for first-time variant draws.
    ///
    /// ```
    /// # use pb_experience::ClientConfig;
    /// let mut config = ClientConfig::new();
    /// config.random_source(|| 0.5_f64);
    /// ```
    pub fn random_source(&mut self, random: impl RandomSource + Send + Sync + 'a) -> &mut Self {
        self.random = Box::new(random);
        self
    }

    /// Set event recorder to pass experience events to your analytics pipeline.
    ///
    /// ```
    /// # use pb_experience::{ClientConfig, ExperienceEvent};
    /// let mut config = ClientConfig::new();
    /// config.event_recorder(|event: ExperienceEvent| {
    ///   println!("{:?}", event);
    /// });
    /// ```
    pub fn event_recorder(
        &mut self,
        event_recorder: impl EventRecorder + Send + Sync + 'a,
    ) -> &mut Self {
        self.event_recorder = Box::new(event_recorder);
        self
    }

    /// Create a new [`ExperienceClient`] using the specified configuration.
    ///
    /// ```
    /// # use pb_experience::{ClientConfig, ExperienceClient};
    /// let client: ExperienceClient = ClientConfig::new().to_client();
    /// ```
    pub fn to_client(self) -> ExperienceClient<'a> {
        ExperienceClient::new(self)
    }
}

impl Default for ClientConfig<'_> {
    fn default() -> Self {
        Self::new()
    }
}
