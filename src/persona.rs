//! Time-boxed cache for the persona string served by CORE.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::core_api::{CoreClient, CoreError};

/// How long a fetched persona is reused before CORE is asked again.
pub const PERSONA_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, thiserror::Error)]
pub enum PersonaFetchError {
    #[error("Failed to fetch persona: {0}")]
    Status(String),

    #[error("Failed to fetch persona: {0}")]
    Core(#[source] CoreError),

    #[error("Failed to fetch persona: response has no persona")]
    Missing,
}

impl From<CoreError> for PersonaFetchError {
    fn from(e: CoreError) -> Self {
        match e.status_text() {
            Some(reason) => Self::Status(reason.to_string()),
            None => Self::Core(e),
        }
    }
}

/// Single-slot cache holding `(persona, fetched_at)`.
///
/// The slot lock is only held to read or replace the value, never across the fetch, so two
/// callers that miss at the same time both go to CORE and the later write wins.
#[derive(Debug)]
pub struct PersonaCache {
    slot: Mutex<Option<(String, Instant)>>,
    ttl: Duration,
}

impl Default for PersonaCache {
    fn default() -> Self {
        Self::new(PERSONA_TTL)
    }
}

impl PersonaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    fn fresh(&self) -> Option<String> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|(_, fetched_at)| fetched_at.elapsed() < self.ttl)
            .map(|(persona, _)| persona.clone())
    }

    /// Return the cached persona if fresh, otherwise fetch it from CORE and cache it.
    pub async fn fetch(&self, core: &CoreClient) -> Result<String, PersonaFetchError> {
        if let Some(persona) = self.fresh() {
            tracing::debug!("persona cache hit");
            return Ok(persona);
        }

        let me = core.me().await?;
        let persona = me.persona.ok_or(PersonaFetchError::Missing)?;

        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some((persona.clone(), Instant::now()));
        tracing::info!(persona_len = persona.len(), "persona refreshed from CORE");

        Ok(persona)
    }
}
