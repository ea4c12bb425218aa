//! Process-wide owner of the mixer store and its Wave Link connection.
//!
//! Every filter instance in a process reads the same [`MixerStore`]. The
//! context is started by the first instance that asks for it and torn down
//! when the last one lets go.

use anyhow::Context;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::watch;

use super::client::{ConnectionState, WaveLinkClient};
use crate::config::SyncConfig;
use crate::mixer::MixerStore;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

static SHARED: Lazy<Mutex<Weak<SyncContext>>> = Lazy::new(|| Mutex::new(Weak::new()));

pub struct SyncContext {
    client: Arc<WaveLinkClient>,
    shutdown: watch::Sender<bool>,
    runtime: Option<Runtime>,
}

impl SyncContext {
    /// Starts a private context on its own single-worker runtime.
    pub fn start(config: SyncConfig) -> anyhow::Result<Arc<Self>> {
        config.validate().context("invalid Wave Link settings")?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("wavelink-sync")
            .enable_all()
            .build()
            .context("failed to start the Wave Link runtime")?;

        let store = Arc::new(MixerStore::new());
        let client = Arc::new(WaveLinkClient::new(config, store));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let runner = Arc::clone(&client);
        runtime.spawn(async move {
            if let Err(err) = runner.run(shutdown_rx).await {
                log::error!("Wave Link client stopped: {}", err);
            }
        });

        log::info!("Wave Link sync started for {}", client.config().url);
        Ok(Arc::new(Self {
            client,
            shutdown,
            runtime: Some(runtime),
        }))
    }

    /// Returns the context shared by this process, starting it with
    /// [`SyncConfig::from_env`] if no instance currently holds one.
    pub fn shared() -> anyhow::Result<Arc<Self>> {
        let mut shared = SHARED.lock();
        if let Some(context) = shared.upgrade() {
            return Ok(context);
        }

        let context = Self::start(SyncConfig::from_env())?;
        *shared = Arc::downgrade(&context);
        Ok(context)
    }

    pub fn store(&self) -> &Arc<MixerStore> {
        self.client.store()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.client.subscribe_state()
    }

    pub fn refresh(&self) {
        self.client.refresh();
    }
}

/// Must not be dropped from inside an async context.
impl Drop for SyncContext {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
        }
        log::info!("Wave Link sync stopped");
    }
}
