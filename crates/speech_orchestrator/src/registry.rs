//! Provider registry with atomically swappable priority chains
//!
//! The registry owns one STT chain and one TTS chain, each a priority-sorted
//! immutable snapshot behind an [`ArcSwap`]. Readers (the fallback
//! coordinator) load a snapshot once per operation and iterate it without
//! locking; [`ProviderRegistry::promote_stt`] and
//! [`ProviderRegistry::promote_tts`] publish a reordered snapshot without
//! disturbing iterations already in flight.
//!
//! Chain membership is fixed after construction. Disabled descriptors are
//! excluded at load, duplicate ids are a configuration error.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use speech_core::{ProviderDescriptor, ProviderKind, SpeechError, SttProvider, TtsProvider};
use tracing::{debug, info, warn};

/// One provider in a chain, paired with its identity and priority
#[derive(Clone)]
pub struct ProviderEntry<P: ?Sized> {
    /// Unique provider identifier
    pub id: String,
    /// Chain position; lower values are tried first
    pub priority: u32,
    /// The provider behind its port trait
    pub provider: Arc<P>,
}

impl<P: ?Sized> fmt::Debug for ProviderEntry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// A chain entry for Speech-to-Text
pub type SttEntry = ProviderEntry<dyn SttProvider>;
/// A chain entry for Text-to-Speech
pub type TtsEntry = ProviderEntry<dyn TtsProvider>;

type Chain<P> = Arc<Vec<Arc<ProviderEntry<P>>>>;

/// Priority-ordered STT and TTS provider chains
pub struct ProviderRegistry {
    stt: ArcSwap<Vec<Arc<SttEntry>>>,
    tts: ArcSwap<Vec<Arc<TtsEntry>>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("stt", &*self.stt.load())
            .field("tts", &*self.tts.load())
            .finish()
    }
}

impl ProviderRegistry {
    /// Build the registry from descriptor/provider pairs
    ///
    /// Disabled descriptors are dropped. The remaining entries are sorted by
    /// ascending priority; ties keep registration order.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` on duplicate enabled ids within a
    /// kind, or when a descriptor's kind does not match the list it was
    /// registered under.
    pub fn new(
        stt: Vec<(ProviderDescriptor, Arc<dyn SttProvider>)>,
        tts: Vec<(ProviderDescriptor, Arc<dyn TtsProvider>)>,
    ) -> Result<Self, SpeechError> {
        let stt_chain = build_chain(stt, ProviderKind::Stt)?;
        let tts_chain = build_chain(tts, ProviderKind::Tts)?;

        info!(
            stt_providers = stt_chain.len(),
            tts_providers = tts_chain.len(),
            "Provider registry loaded"
        );

        Ok(Self {
            stt: ArcSwap::from_pointee(stt_chain),
            tts: ArcSwap::from_pointee(tts_chain),
        })
    }

    /// Current STT chain snapshot, highest priority first
    #[must_use]
    pub fn stt_chain(&self) -> Chain<dyn SttProvider> {
        self.stt.load_full()
    }

    /// Current TTS chain snapshot, highest priority first
    #[must_use]
    pub fn tts_chain(&self) -> Chain<dyn TtsProvider> {
        self.tts.load_full()
    }

    /// Move an STT provider to the front of its chain
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::NotAvailable` if no enabled provider has the id.
    pub fn promote_stt(&self, provider_id: &str) -> Result<(), SpeechError> {
        promote(&self.stt, provider_id)
    }

    /// Move a TTS provider to the front of its chain
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::NotAvailable` if no enabled provider has the id.
    pub fn promote_tts(&self, provider_id: &str) -> Result<(), SpeechError> {
        promote(&self.tts, provider_id)
    }

    /// Run `initialize` on every registered provider
    ///
    /// A failing hook is logged and does not abort the rest; the failing
    /// provider will surface errors per call and trip its breaker instead.
    pub async fn initialize_all(&self) {
        for entry in self.stt.load().iter() {
            if let Err(error) = entry.provider.initialize().await {
                warn!(provider = %entry.id, %error, "STT provider initialization failed");
            }
        }
        for entry in self.tts.load().iter() {
            if let Err(error) = entry.provider.initialize().await {
                warn!(provider = %entry.id, %error, "TTS provider initialization failed");
            }
        }
    }

    /// Run `shutdown` on every registered provider
    pub async fn shutdown_all(&self) {
        for entry in self.stt.load().iter() {
            if let Err(error) = entry.provider.shutdown().await {
                warn!(provider = %entry.id, %error, "STT provider shutdown failed");
            }
        }
        for entry in self.tts.load().iter() {
            if let Err(error) = entry.provider.shutdown().await {
                warn!(provider = %entry.id, %error, "TTS provider shutdown failed");
            }
        }
    }
}

fn build_chain<P: ?Sized>(
    providers: Vec<(ProviderDescriptor, Arc<P>)>,
    expected_kind: ProviderKind,
) -> Result<Vec<Arc<ProviderEntry<P>>>, SpeechError> {
    let mut entries = Vec::new();

    for (descriptor, provider) in providers {
        if descriptor.kind != expected_kind {
            return Err(SpeechError::Configuration(format!(
                "provider '{}' is declared as {} but registered as {}",
                descriptor.id, descriptor.kind, expected_kind
            )));
        }
        if !descriptor.enabled {
            debug!(provider = %descriptor.id, "Skipping disabled provider");
            continue;
        }
        if entries
            .iter()
            .any(|entry: &Arc<ProviderEntry<P>>| entry.id == descriptor.id)
        {
            return Err(SpeechError::Configuration(format!(
                "duplicate {} provider id '{}'",
                expected_kind, descriptor.id
            )));
        }

        entries.push(Arc::new(ProviderEntry {
            id: descriptor.id,
            priority: descriptor.priority,
            provider,
        }));
    }

    // Stable sort keeps registration order among equal priorities.
    entries.sort_by_key(|entry| entry.priority);
    Ok(entries)
}

fn promote<P: ?Sized>(
    slot: &ArcSwap<Vec<Arc<ProviderEntry<P>>>>,
    provider_id: &str,
) -> Result<(), SpeechError> {
    // Membership never changes after construction, so a pre-check cannot
    // race with concurrent promotes.
    if !slot.load().iter().any(|entry| entry.id == provider_id) {
        return Err(SpeechError::NotAvailable(provider_id.to_string()));
    }

    slot.rcu(|current| {
        let mut reordered: Vec<_> = current.iter().map(Arc::clone).collect();
        if let Some(position) = reordered.iter().position(|entry| entry.id == provider_id) {
            let entry = reordered.remove(position);
            reordered.insert(0, entry);
        }
        reordered
    });

    info!(provider = %provider_id, "Provider promoted to front of chain");
    Ok(())
}
