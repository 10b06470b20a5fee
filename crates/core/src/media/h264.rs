//! Inspection of encoded H.264 Annex-B output.
//!
//! The pipeline never writes bitstream syntax itself; these helpers read
//! what the encoder produced:
//!
//! - [`nal_units`] splits an Annex-B buffer on `00 00 01` / `00 00 00 01`
//!   start codes without copying.
//! - [`is_key_frame`] reports whether a buffer carries an IDR slice.
//! - [`ParameterSets`] keeps the latest SPS/PPS seen, and renders the
//!   `profile-level-id` / `sprop-parameter-sets` values a transport needs
//!   for SDP (RFC 6184 §8.1).

use base64::prelude::{BASE64_STANDARD, Engine as _};

/// H.264 NAL unit type (ITU-T H.264 Table 7-1), low five bits of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalType {
    /// Coded slice of a non-IDR picture.
    Slice,
    /// Coded slice of an IDR picture.
    Idr,
    /// Supplemental enhancement information.
    Sei,
    /// Sequence parameter set.
    Sps,
    /// Picture parameter set.
    Pps,
    /// Access unit delimiter.
    Aud,
    Other(u8),
}

impl From<u8> for NalType {
    fn from(header: u8) -> Self {
        match header & 0x1f {
            1 => Self::Slice,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            other => Self::Other(other),
        }
    }
}

/// Iterator over the NAL units of an Annex-B buffer, start codes excluded.
#[derive(Debug, Clone)]
pub struct NalUnits<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Split `data` into NAL units. Bytes before the first start code are skipped.
pub fn nal_units(data: &[u8]) -> NalUnits<'_> {
    NalUnits { data, pos: 0 }
}

/// Offset and length of the next start code at or after `from`.
fn find_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                return Some((i, 3));
            }
            if data[i + 2] == 0 && i + 3 < data.len() && data[i + 3] == 1 {
                return Some((i, 4));
            }
        }
        i += 1;
    }
    None
}

impl<'a> Iterator for NalUnits<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (offset, len) = find_start_code(self.data, self.pos)?;
            let start = offset + len;
            let end = find_start_code(self.data, start).map_or(self.data.len(), |(next, _)| next);
            self.pos = end;
            if start < end {
                return Some(&self.data[start..end]);
            }
        }
    }
}

/// Whether `data` contains an IDR slice.
pub fn is_key_frame(data: &[u8]) -> bool {
    nal_units(data).any(|nal| NalType::from(nal[0]) == NalType::Idr)
}

/// Most recent SPS and PPS seen in the encoder's output.
///
/// Encoders emit parameter sets in front of each key frame (or only the
/// first one). Feeding every encoded buffer through
/// [`capture`](Self::capture) keeps the latest pair available for
/// out-of-band signalling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSets {
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl ParameterSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record any SPS/PPS in `data`. Returns `true` if either changed.
    pub fn capture(&mut self, data: &[u8]) -> bool {
        let mut changed = false;
        for nal in nal_units(data) {
            let slot = match NalType::from(nal[0]) {
                NalType::Sps => &mut self.sps,
                NalType::Pps => &mut self.pps,
                _ => continue,
            };
            if slot.as_deref() != Some(nal) {
                *slot = Some(nal.to_vec());
                changed = true;
            }
        }
        if changed {
            tracing::debug!(
                sps_len = self.sps.as_ref().map_or(0, Vec::len),
                pps_len = self.pps.as_ref().map_or(0, Vec::len),
                "H.264 parameter sets captured"
            );
        }
        changed
    }

    pub fn sps(&self) -> Option<&[u8]> {
        self.sps.as_deref()
    }

    pub fn pps(&self) -> Option<&[u8]> {
        self.pps.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }

    /// `profile_idc`, constraint flags, and `level_idc` from the SPS as six
    /// hex digits (SPS bytes 1-3).
    pub fn profile_level_id(&self) -> Option<String> {
        let sps = self.sps.as_deref()?;
        if sps.len() < 4 {
            return None;
        }
        Some(format!("{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]))
    }

    /// Base64 SPS and PPS joined by a comma.
    pub fn sprop_parameter_sets(&self) -> Option<String> {
        let sps = self.sps.as_deref()?;
        let pps = self.pps.as_deref()?;
        Some(format!(
            "{},{}",
            BASE64_STANDARD.encode(sps),
            BASE64_STANDARD.encode(pps)
        ))
    }

    /// SDP `a=fmtp` line for the given RTP payload type.
    pub fn fmtp(&self, payload_type: u8) -> String {
        let mut fmtp = format!("a=fmtp:{payload_type} packetization-mode=1");
        if let Some(pl) = self.profile_level_id() {
            fmtp.push_str(&format!(";profile-level-id={pl}"));
        }
        if let Some(sprop) = self.sprop_parameter_sets() {
            fmtp.push_str(&format!(";sprop-parameter-sets={sprop}"));
        }
        fmtp
    }
}
