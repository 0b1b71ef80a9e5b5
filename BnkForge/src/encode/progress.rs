//! Progress events and cooperative cancellation for encode jobs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Progress callback type
pub type ProgressCallback<'a> = &'a dyn Fn(&EncodeProgress);

/// A callback that ignores every event
pub fn no_progress(_: &EncodeProgress) {}

/// Shared cancellation flag
///
/// Searches check it between probes. The external encoder also polls it while
/// waiting and kills the running process once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if cancellation was requested
    pub fn check(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            Err(crate::error::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Phase of an encode job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodePhase {
    /// Setting up the working directory
    Preparing,
    /// Binary search over quality
    QualitySearch,
    /// Resampling the source to a candidate rate
    Resampling,
    /// Feasibility probe at a candidate rate
    RateSearch,
    /// Copying and padding the winning artifact
    Finalizing,
    /// Job finished
    Complete,
}

impl EncodePhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodePhase::Preparing => "Preparing",
            EncodePhase::QualitySearch => "Searching quality",
            EncodePhase::Resampling => "Resampling",
            EncodePhase::RateSearch => "Searching sample rate",
            EncodePhase::Finalizing => "Finalizing",
            EncodePhase::Complete => "Complete",
        }
    }
}

/// Progress information during an encode job
#[derive(Debug, Clone)]
pub struct EncodeProgress {
    /// Current phase
    pub phase: EncodePhase,
    /// Probe number within the current search (1-indexed, 0 outside searches)
    pub probe: usize,
    /// Quality being probed
    pub quality: Option<i32>,
    /// Sample rate being probed (`None` = source rate)
    pub sample_rate: Option<u32>,
    /// Size produced by the probe, once known
    pub size: Option<u64>,
    /// Target size of the job
    pub target: u64,
    /// Whether the probe was answered from the conversion cache
    pub cache_hit: bool,
}

impl EncodeProgress {
    /// Create a phase-only progress update
    #[must_use]
    pub fn new(phase: EncodePhase, target: u64) -> Self {
        Self {
            phase,
            probe: 0,
            quality: None,
            sample_rate: None,
            size: None,
            target,
            cache_hit: false,
        }
    }

    /// Whether the probe result fits within the target
    #[must_use]
    pub fn fits(&self) -> Option<bool> {
        self.size.map(|size| size <= self.target)
    }

    /// Short human-readable description
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = self.phase.as_str().to_string();
        if let Some(rate) = self.sample_rate {
            text.push_str(&format!(" @ {rate} Hz"));
        }
        if let Some(quality) = self.quality {
            text.push_str(&format!(" q={quality}"));
        }
        if let Some(size) = self.size {
            text.push_str(&format!(" -> {size}/{} bytes", self.target));
        }
        if self.cache_hit {
            text.push_str(" (cached)");
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(crate::error::Error::Cancelled)));
    }

    #[test]
    fn test_describe() {
        let mut progress = EncodeProgress::new(EncodePhase::QualitySearch, 850);
        progress.quality = Some(3);
        progress.size = Some(800);
        assert_eq!(progress.describe(), "Searching quality q=3 -> 800/850 bytes");
        assert_eq!(progress.fits(), Some(true));
    }
}
