//! Single-user diagnosis session.
//!
//! Holds the credential the user configured, allows one diagnosis in flight
//! at a time and one active engine recording at a time.

use crate::advisor::MechanicAdvisor;
use crate::models::{MechanicResponse, MediaInput, VehicleInfo};
use crate::vin::VinLookup;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Clears its flag when dropped.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Exclusive access to the microphone.
#[derive(Debug, Default)]
pub struct RecordingSlot {
    active: AtomicBool,
}

/// An active recording. Dropping it without [`finish`](Self::finish)
/// discards the capture.
pub struct RecordingGuard<'a> {
    _flag: FlagGuard<'a>,
}

impl RecordingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn start(&self) -> Result<RecordingGuard<'_>> {
        let flag = FlagGuard::acquire(&self.active).ok_or(Error::RecordingActive)?;
        tracing::debug!("Recording started");
        Ok(RecordingGuard { _flag: flag })
    }
}

impl RecordingGuard<'_> {
    /// Stop recording and wrap the captured audio for a diagnosis request.
    pub fn finish(self, audio: &[u8], mime_type: &str) -> MediaInput {
        tracing::debug!("Recording finished ({} bytes)", audio.len());
        MediaInput::from_bytes(audio, mime_type)
    }
}

pub struct Session {
    advisor: MechanicAdvisor,
    credential: Option<String>,
    vin_lookup: Option<Box<dyn VinLookup>>,
    in_flight: AtomicBool,
    recording: RecordingSlot,
}

impl Session {
    /// `credential` is the configured default key, if any.
    pub fn new(advisor: MechanicAdvisor, credential: Option<String>) -> Self {
        let mut session = Self {
            advisor,
            credential: None,
            vin_lookup: None,
            in_flight: AtomicBool::new(false),
            recording: RecordingSlot::new(),
        };
        session.set_credential(credential);
        session
    }

    pub fn with_vin_lookup(mut self, lookup: Box<dyn VinLookup>) -> Self {
        self.vin_lookup = Some(lookup);
        self
    }

    /// Replace the key used for the primary provider. A blank key clears it,
    /// which sends later requests to the fallback provider.
    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn recording(&self) -> &RecordingSlot {
        &self.recording
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn decode_vin(&self, vin: &str) -> Result<Option<VehicleInfo>> {
        match &self.vin_lookup {
            Some(lookup) => lookup.decode(vin).await,
            None => Ok(None),
        }
    }

    /// Submit one diagnosis. Fails with [`Error::Busy`] while another is
    /// still outstanding.
    pub async fn submit(
        &self,
        text: &str,
        media: Option<MediaInput>,
        vehicle: Option<&VehicleInfo>,
    ) -> Result<MechanicResponse> {
        if text.trim().is_empty() && media.is_none() {
            return Err(Error::EmptyRequest);
        }

        let _in_flight = FlagGuard::acquire(&self.in_flight).ok_or(Error::Busy)?;
        self.advisor
            .advise_with_vehicle(text, media, vehicle, self.credential())
            .await
    }
}
