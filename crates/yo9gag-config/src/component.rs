use crate::{LogConfig, RankingConfig, RuntimeConfig, ServerConfig, StoreConfig, YoConfig};

/// Which of the two processes the configuration is loaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Long-running webhook responder
    Server,
    /// One-shot candidate set refresh
    Uploader,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Server => "server",
            Component::Uploader => "uploader",
        }
    }

    /// Get component-specific defaults
    pub fn defaults(&self) -> RuntimeConfig {
        let server = match self {
            Component::Server => Some(ServerConfig::default()),
            Component::Uploader => None,
        };

        RuntimeConfig {
            store: StoreConfig::default(),
            yo: YoConfig::default(),
            ranking: RankingConfig::default(),
            log: LogConfig::default(),
            server,
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
