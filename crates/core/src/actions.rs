//! Transport action mask advertised by a media session.
//!
//! Bit values follow Android's `PlaybackState.ACTION_*` constants, which is the
//! richest mask any backend reports. Other backends translate their own
//! capability flags into these bits.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransportActions: i64 {
        const STOP                  = 1 << 0;
        const PAUSE                 = 1 << 1;
        const PLAY                  = 1 << 2;
        const REWIND                = 1 << 3;
        const SKIP_TO_PREVIOUS      = 1 << 4;
        const SKIP_TO_NEXT          = 1 << 5;
        const FAST_FORWARD          = 1 << 6;
        const SET_RATING            = 1 << 7;
        const SEEK_TO               = 1 << 8;
        /// Single toggle; some sessions only advertise this instead of PLAY + PAUSE
        const PLAY_PAUSE            = 1 << 9;
        const PLAY_FROM_MEDIA_ID    = 1 << 10;
        const PLAY_FROM_SEARCH      = 1 << 11;
        const SKIP_TO_QUEUE_ITEM    = 1 << 12;
        const PLAY_FROM_URI         = 1 << 13;
        const PREPARE               = 1 << 14;
        const PREPARE_FROM_MEDIA_ID = 1 << 15;
        const PREPARE_FROM_SEARCH   = 1 << 16;
        const PREPARE_FROM_URI      = 1 << 17;
        const SET_PLAYBACK_SPEED    = 1 << 22;
    }
}

impl TransportActions {
    /// Build from a raw native mask, keeping bits this type has no name for.
    pub fn from_raw(bits: i64) -> Self {
        Self::from_bits_retain(bits)
    }

    pub fn can_play(&self) -> bool {
        self.contains(Self::PLAY)
    }

    pub fn can_pause(&self) -> bool {
        self.contains(Self::PAUSE)
    }

    /// The combined toggle bit and the separate PLAY + PAUSE pair are equivalent.
    pub fn can_play_pause(&self) -> bool {
        self.contains(Self::PLAY_PAUSE) || self.contains(Self::PLAY | Self::PAUSE)
    }

    pub fn can_skip_to_next(&self) -> bool {
        self.contains(Self::SKIP_TO_NEXT)
    }

    pub fn can_skip_to_previous(&self) -> bool {
        self.contains(Self::SKIP_TO_PREVIOUS)
    }
}

impl Serialize for TransportActions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.bits())
    }
}

impl<'de> Deserialize<'de> for TransportActions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = i64::deserialize(deserializer)?;
        Ok(Self::from_raw(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ControlAbility;

    #[test]
    fn test_combined_bit_alone_grants_play_pause() {
        let actions = TransportActions::PLAY_PAUSE;
        assert!(actions.can_play_pause());
        assert!(!actions.can_play());
        assert!(!actions.can_pause());
    }

    #[test]
    fn test_play_without_pause_is_not_play_pause() {
        assert!(!TransportActions::PLAY.can_play_pause());
        assert!(!TransportActions::PAUSE.can_play_pause());
    }

    #[test]
    fn test_separate_pair_grants_play_pause() {
        let actions = TransportActions::PLAY | TransportActions::PAUSE;
        assert!(actions.can_play_pause());
    }

    #[test]
    fn test_unknown_bits_are_retained() {
        let raw = (1 << 40) | TransportActions::SKIP_TO_NEXT.bits();
        let actions = TransportActions::from_raw(raw);
        assert_eq!(actions.bits(), raw);
        assert!(actions.can_skip_to_next());
        assert!(!actions.can_skip_to_previous());
    }

    #[test]
    fn test_ability_from_missing_mask() {
        assert_eq!(ControlAbility::from_actions(None), ControlAbility::default());
    }

    #[test]
    fn test_ability_from_full_mask() {
        let actions = TransportActions::PLAY
            | TransportActions::PAUSE
            | TransportActions::SKIP_TO_NEXT
            | TransportActions::SKIP_TO_PREVIOUS;
        let ability = ControlAbility::from_actions(Some(actions));
        assert!(ability.can_play_pause);
        assert!(ability.can_go_next);
        assert!(ability.can_go_previous);
    }

    #[test]
    fn test_serde_as_raw_integer() {
        let actions = TransportActions::PLAY_PAUSE | TransportActions::SKIP_TO_NEXT;
        let json = serde_json::to_string(&actions).unwrap();
        assert_eq!(json, "544");
        let back: TransportActions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, actions);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::models::ControlAbility;
    use proptest::prelude::*;

    proptest! {
        /// No ability is reported unless the mask advertises it.
        #[test]
        fn prop_ability_never_exceeds_mask(bits in any::<i64>()) {
            let actions = TransportActions::from_raw(bits);
            let ability = ControlAbility::from_actions(Some(actions));

            let play_pause = bits & TransportActions::PLAY_PAUSE.bits() != 0
                || (bits & TransportActions::PLAY.bits() != 0
                    && bits & TransportActions::PAUSE.bits() != 0);
            prop_assert_eq!(ability.can_play_pause, play_pause);
            prop_assert_eq!(ability.can_go_next, bits & TransportActions::SKIP_TO_NEXT.bits() != 0);
            prop_assert_eq!(
                ability.can_go_previous,
                bits & TransportActions::SKIP_TO_PREVIOUS.bits() != 0
            );
        }
    }
}
