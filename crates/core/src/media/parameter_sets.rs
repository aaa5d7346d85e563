use base64::prelude::{BASE64_STANDARD, Engine as _};

use crate::error::{FramingError, Result, SpropErrorKind};

/// H.264 NAL unit type of a sequence parameter set.
pub const SPS_UNIT_TYPE: u8 = 7;
/// H.264 NAL unit type of a picture parameter set.
pub const PPS_UNIT_TYPE: u8 = 8;

/// The two parameter-set kinds a decoder must hold before slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSetKind {
    Sps,
    Pps,
}

impl ParameterSetKind {
    /// Classify a NAL unit type, `None` for anything that is not a
    /// parameter set.
    pub fn from_unit_type(unit_type: u8) -> Option<Self> {
        match unit_type {
            SPS_UNIT_TYPE => Some(Self::Sps),
            PPS_UNIT_TYPE => Some(Self::Pps),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sps => "SPS",
            Self::Pps => "PPS",
        }
    }
}

/// Cache of the most recently accepted SPS and PPS.
///
/// Each slot always holds a byte-exact copy of the last unit of that kind
/// passed to [`submit`](Self::submit) (or seeded out of band). A changed
/// SPS invalidates the cached PPS, so the next PPS counts as a first
/// sighting again.
///
/// A first sighting is *not* reported as a change.
#[derive(Debug, Default)]
pub struct ParameterSetTracker {
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl ParameterSetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sps(&self) -> Option<&[u8]> {
        self.sps.as_deref()
    }

    pub fn pps(&self) -> Option<&[u8]> {
        self.pps.as_deref()
    }

    /// Record a parameter-set unit and report whether it differs from the
    /// cached one.
    pub fn submit(&mut self, unit: &[u8], kind: ParameterSetKind) -> bool {
        let slot = match kind {
            ParameterSetKind::Sps => &mut self.sps,
            ParameterSetKind::Pps => &mut self.pps,
        };

        let changed = match slot {
            None => {
                tracing::debug!(
                    kind = kind.name(),
                    len = unit.len(),
                    "first parameter set received"
                );
                *slot = Some(unit.to_vec());
                return false;
            }
            Some(cached) if cached.as_slice() == unit => false,
            Some(cached) => {
                tracing::info!(
                    kind = kind.name(),
                    old_len = cached.len(),
                    new_len = unit.len(),
                    "parameter set changed"
                );
                *cached = unit.to_vec();
                true
            }
        };

        if changed && kind == ParameterSetKind::Sps {
            self.pps = None;
        }
        changed
    }

    /// Seed both slots from an SDP `sprop-parameter-sets` value
    /// (`<base64 SPS>,<base64 PPS>`, RFC 6184 §8.1).
    ///
    /// Seeded sets are treated as already accepted: an identical in-band
    /// copy arriving later is not a change.
    pub fn seed_from_sprop(&mut self, sprop: &str) -> Result<()> {
        let (sps, pps) = sprop
            .split_once(',')
            .ok_or(FramingError::Sprop(SpropErrorKind::MissingSeparator))?;
        let sps = BASE64_STANDARD.decode(sps.trim())?;
        let pps = BASE64_STANDARD.decode(pps.trim())?;
        if sps.is_empty() || pps.is_empty() {
            return Err(FramingError::Sprop(SpropErrorKind::Empty));
        }

        tracing::info!(
            sps_len = sps.len(),
            pps_len = pps.len(),
            "parameter sets seeded from sprop-parameter-sets"
        );
        self.sps = Some(sps);
        self.pps = Some(pps);
        Ok(())
    }

    /// `sprop-parameter-sets` value for the cached SPS/PPS, if both are known.
    pub fn sprop_parameter_sets(&self) -> Option<String> {
        let sps = self.sps.as_deref()?;
        let pps = self.pps.as_deref()?;
        Some(format!(
            "{},{}",
            BASE64_STANDARD.encode(sps),
            BASE64_STANDARD.encode(pps)
        ))
    }

    /// `profile-level-id` from the cached SPS (RFC 6184 §8.1): bytes 1–3 are
    /// profile_idc, constraint flags and level_idc.
    pub fn profile_level_id(&self) -> Option<String> {
        match self.sps.as_deref()? {
            [_, profile, constraints, level, ..] => {
                Some(format!("{profile:02x}{constraints:02x}{level:02x}"))
            }
            _ => None,
        }
    }

    /// Drop both cached sets (end of session).
    pub fn clear(&mut self) {
        self.sps = None;
        self.pps = None;
    }
}
