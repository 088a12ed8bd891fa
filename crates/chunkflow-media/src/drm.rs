//! DRM initialization data attached to chunks.
//!
//! This module only describes key material. Decryption happens downstream,
//! in whatever renderer consumes the samples.

use std::collections::BTreeMap;
use uuid::Uuid;

/// Widevine scheme identifier.
pub const WIDEVINE_UUID: Uuid = Uuid::from_u128(0xedef8ba9_79d6_4ace_a3c8_27dcd51d21ed);

/// PlayReady scheme identifier.
pub const PLAYREADY_UUID: Uuid = Uuid::from_u128(0x9a04f079_9840_4286_ab92_e65be0885f95);

/// W3C common (ClearKey) scheme identifier.
pub const CLEARKEY_UUID: Uuid = Uuid::from_u128(0x1077efec_c0b2_4d02_ace3_3c1e52e2fb4b);

/// Initialization data for a single DRM scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemeInitData {
    /// MIME type of the data (e.g. `video/mp4` for a PSSH box).
    pub mime_type: String,
    /// Raw initialization data.
    pub data: Vec<u8>,
}

impl SchemeInitData {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Key material for the samples of a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum DrmInitData {
    /// Separate data per scheme, keyed by scheme UUID.
    Mapped(BTreeMap<Uuid, SchemeInitData>),
    /// One blob that applies to every scheme.
    Universal(SchemeInitData),
}

impl DrmInitData {
    /// Create an empty mapped set.
    pub fn mapped() -> Self {
        Self::Mapped(BTreeMap::new())
    }

    /// Add data for a scheme. Has no effect on `Universal` data.
    pub fn with_scheme(mut self, scheme: Uuid, data: SchemeInitData) -> Self {
        if let Self::Mapped(map) = &mut self {
            map.insert(scheme, data);
        }
        self
    }

    /// Look up the initialization data for `scheme`.
    pub fn get(&self, scheme: &Uuid) -> Option<&SchemeInitData> {
        match self {
            Self::Mapped(map) => map.get(scheme),
            Self::Universal(data) => Some(data),
        }
    }

    /// Scheme UUIDs with explicit entries. Empty for `Universal`.
    pub fn schemes(&self) -> Vec<Uuid> {
        match self {
            Self::Mapped(map) => map.keys().copied().collect(),
            Self::Universal(_) => Vec::new(),
        }
    }
}

/// What is known about a chunk's key material.
///
/// `Pending` and `Unencrypted` are deliberately distinct: `Pending` means the
/// key material lives in the stream and the load has not surfaced it yet,
/// while `Unencrypted` is a settled answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DrmState {
    #[default]
    Pending,
    Unencrypted,
    Known(DrmInitData),
}

impl DrmState {
    /// Settle from an optional value.
    pub fn resolved(data: Option<DrmInitData>) -> Self {
        match data {
            Some(data) => Self::Known(data),
            None => Self::Unencrypted,
        }
    }

    /// Whether the state is final.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Key material, if known.
    pub fn init_data(&self) -> Option<&DrmInitData> {
        match self {
            Self::Known(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_lookup() {
        let drm = DrmInitData::mapped()
            .with_scheme(WIDEVINE_UUID, SchemeInitData::new("video/mp4", vec![1, 2, 3]))
            .with_scheme(PLAYREADY_UUID, SchemeInitData::new("video/mp4", vec![9]));

        assert_eq!(drm.get(&WIDEVINE_UUID).unwrap().data, vec![1, 2, 3]);
        assert!(drm.get(&CLEARKEY_UUID).is_none());
        assert_eq!(drm.schemes().len(), 2);
    }

    #[test]
    fn test_universal_matches_any_scheme() {
        let drm = DrmInitData::Universal(SchemeInitData::new("video/mp4", vec![7]));
        assert_eq!(drm.get(&WIDEVINE_UUID), drm.get(&CLEARKEY_UUID));
        assert!(drm.schemes().is_empty());

        // with_scheme is a no-op on universal data
        let same = drm.clone().with_scheme(PLAYREADY_UUID, SchemeInitData::new("x", vec![]));
        assert_eq!(same, drm);
    }

    #[test]
    fn test_state_distinguishes_pending_from_none() {
        assert!(!DrmState::Pending.is_resolved());
        assert!(DrmState::Unencrypted.is_resolved());
        assert_ne!(DrmState::Pending, DrmState::Unencrypted);
        assert_eq!(DrmState::resolved(None), DrmState::Unencrypted);

        let known = DrmState::resolved(Some(DrmInitData::mapped()));
        assert!(known.init_data().is_some());
    }
}
