//! Channel Attack Models
//!
//! Degrades an outbound application payload according to a selected attack
//! mode before it is framed for transmission. Corruption is confined to the
//! text portion after the `"<id>:"` prefix: the id stays intact so the
//! receive side can still correlate sent and received records and measure
//! the bit error rate of the content. A more realistic attacker could also
//! corrupt the id; that is deliberately out of scope.
//!
//! Intensity scales inversely with the link quality factor, a `[0.1, 1.0]`
//! score computed in [`link_quality`] from the simulated RF geometry.

use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

pub mod link_quality;

pub use link_quality::{link_quality, LinkParams};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AttackError {
    #[error("unknown attack mode: {0:?}")]
    UnknownMode(String),
}

/// Selectable channel-degradation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttackMode {
    #[default]
    None,
    Modify,
    Noise,
    Jamming,
    Drop,
}

impl FromStr for AttackMode {
    type Err = AttackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "modify" => Ok(Self::Modify),
            "noise" => Ok(Self::Noise),
            "jamming" => Ok(Self::Jamming),
            "drop" => Ok(Self::Drop),
            other => Err(AttackError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for AttackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Modify => "modify",
            Self::Noise => "noise",
            Self::Jamming => "jamming",
            Self::Drop => "drop",
        };
        f.write_str(s)
    }
}

/// Outcome of applying an attack to one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackOutcome {
    /// The datagram is suppressed entirely.
    Drop,
    /// The (possibly corrupted) payload to transmit. Byte length always
    /// equals the input length.
    Deliver(Vec<u8>),
}

/// Apply `mode` to an application payload of the form `"<id>:<text>"`
/// (NUL-padded). `link_quality` is clamped to `[0.1, 1.0]`.
///
/// Content attacks only ever touch the text bytes between the `:` separator
/// and the trailing NUL padding; the payload length never changes. A payload
/// with no discoverable id prefix is delivered unchanged with a warning
/// (Drop still drops).
pub fn apply<R: Rng + ?Sized>(
    payload: &[u8],
    mode: AttackMode,
    link_quality: f64,
    rng: &mut R,
) -> AttackOutcome {
    if mode == AttackMode::Drop {
        return AttackOutcome::Drop;
    }
    if mode == AttackMode::None {
        return AttackOutcome::Deliver(payload.to_vec());
    }

    let quality = link_quality.clamp(0.1, 1.0);
    let Some(window) = text_window(payload) else {
        warn!(
            len = payload.len(),
            %mode,
            "payload has no \"<id>:\" prefix, skipping content attack"
        );
        return AttackOutcome::Deliver(payload.to_vec());
    };
    if window.is_empty() {
        return AttackOutcome::Deliver(payload.to_vec());
    }

    let mut out = payload.to_vec();
    match mode {
        AttackMode::Modify => {
            let n = (1.0 + (1.0 - quality) * 2.0).round() as usize;
            modify_bytes(&mut out[window.clone()], n, rng);
        }
        AttackMode::Noise => {
            let fraction = 0.01 + (1.0 - quality) * 0.09;
            flip_bit_fraction(&mut out[window.clone()], fraction, rng);
        }
        AttackMode::Jamming => {
            let fraction = 0.10 + (1.0 - quality) * 0.40;
            flip_bit_fraction(&mut out[window.clone()], fraction, rng);
        }
        AttackMode::None | AttackMode::Drop => unreachable!(),
    }
    AttackOutcome::Deliver(out)
}

/// Byte range of the corruptible text: everything after the `"<digits>:"`
/// prefix, excluding trailing NUL padding. `None` when there is no prefix.
fn text_window(payload: &[u8]) -> Option<std::ops::Range<usize>> {
    let colon = payload.iter().position(|&b| b == b':')?;
    if colon == 0 || !payload[..colon].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let end = payload
        .iter()
        .rposition(|&b| b != 0x00)
        .map_or(0, |pos| pos + 1);
    let start = colon + 1;
    if end < start {
        return Some(start..start);
    }
    Some(start..end)
}

/// Replace `n` distinct bytes with random values, never the original byte
/// and never 0x00 (an injected NUL would look like padding downstream).
fn modify_bytes<R: Rng + ?Sized>(window: &mut [u8], n: usize, rng: &mut R) {
    let n = n.clamp(1, window.len());
    for idx in sample(rng, window.len(), n) {
        let original = window[idx];
        let replacement = loop {
            let candidate: u8 = rng.gen_range(1..=255);
            if candidate != original {
                break candidate;
            }
        };
        window[idx] = replacement;
    }
}

/// Flip `fraction` of the window's bits at distinct pseudo-random positions,
/// MSB-first bit addressing. At least one bit flips.
fn flip_bit_fraction<R: Rng + ?Sized>(window: &mut [u8], fraction: f64, rng: &mut R) {
    let total_bits = window.len() * 8;
    let n = ((fraction * total_bits as f64).round() as usize).clamp(1, total_bits);
    for bit in sample(rng, total_bits, n) {
        window[bit / 8] ^= 0x80 >> (bit % 8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5A7_11_4B)
    }

    fn padded_payload(text: &str) -> Vec<u8> {
        let mut p = text.as_bytes().to_vec();
        p.resize(64, 0x00);
        p
    }

    #[test]
    fn test_none_is_passthrough() {
        let payload = padded_payload("7:hello");
        let out = apply(&payload, AttackMode::None, 0.1, &mut rng());
        assert_eq!(out, AttackOutcome::Deliver(payload));
    }

    #[test]
    fn test_drop_always_drops() {
        let out = apply(b"garbage without prefix", AttackMode::Drop, 1.0, &mut rng());
        assert_eq!(out, AttackOutcome::Drop);
    }

    #[test]
    fn test_modify_changes_text_only() {
        let payload = padded_payload("123:hello world");
        let AttackOutcome::Deliver(out) = apply(&payload, AttackMode::Modify, 0.5, &mut rng())
        else {
            panic!("modify must deliver");
        };
        assert_eq!(out.len(), payload.len());
        assert_eq!(&out[..4], b"123:");
        assert_ne!(&out[4..], &payload[4..]);
        // Modify at q=0.5 flips round(1 + 0.5*2) = 2 bytes.
        let changed = out.iter().zip(&payload).filter(|(a, b)| a != b).count();
        assert_eq!(changed, 2);
    }

    #[test]
    fn test_noise_flips_expected_bit_count() {
        let payload = padded_payload("7:abcdefghij");
        let AttackOutcome::Deliver(out) = apply(&payload, AttackMode::Noise, 1.0, &mut rng())
        else {
            panic!("noise must deliver");
        };
        let flipped: u32 = out
            .iter()
            .zip(&payload)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        // 10 text bytes = 80 bits; fraction at q=1.0 is 0.01 -> 1 bit.
        assert_eq!(flipped, 1);
        assert_eq!(&out[..2], b"7:");
    }

    #[test]
    fn test_jamming_is_heavier_than_noise() {
        let payload = padded_payload("7:abcdefghij");
        let count = |mode| {
            let AttackOutcome::Deliver(out) = apply(&payload, mode, 0.1, &mut rng()) else {
                panic!("must deliver");
            };
            out.iter()
                .zip(&payload)
                .map(|(a, b)| (a ^ b).count_ones())
                .sum::<u32>()
        };
        assert!(count(AttackMode::Jamming) > count(AttackMode::Noise));
    }

    #[test]
    fn test_missing_prefix_skips_content_attack() {
        let payload = b"no prefix at all".to_vec();
        for mode in [AttackMode::Modify, AttackMode::Noise, AttackMode::Jamming] {
            let out = apply(&payload, mode, 0.1, &mut rng());
            assert_eq!(out, AttackOutcome::Deliver(payload.clone()));
        }
    }

    #[test]
    fn test_empty_text_window_unchanged() {
        let payload = padded_payload("99:");
        let out = apply(&payload, AttackMode::Jamming, 0.1, &mut rng());
        assert_eq!(out, AttackOutcome::Deliver(payload));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("jamming".parse(), Ok(AttackMode::Jamming));
        assert_eq!(" NONE ".parse(), Ok(AttackMode::None));
        assert_eq!("drop".parse(), Ok(AttackMode::Drop));
        assert!(matches!(
            "replay".parse::<AttackMode>(),
            Err(AttackError::UnknownMode(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_non_drop_modes_preserve_length(
            text in "[a-zA-Z0-9 ]{0,100}",
            id in 0u64..100_000,
            quality in 0.1f64..=1.0,
            seed in any::<u64>(),
            mode_idx in 0usize..3,
        ) {
            let mode = [AttackMode::Modify, AttackMode::Noise, AttackMode::Jamming][mode_idx];
            let payload = format!("{id}:{text}").into_bytes();
            let mut rng = StdRng::seed_from_u64(seed);
            let AttackOutcome::Deliver(out) = apply(&payload, mode, quality, &mut rng) else {
                return Err(TestCaseError::fail("non-drop mode dropped"));
            };
            prop_assert_eq!(out.len(), payload.len());
            // Id prefix is never corrupted.
            let prefix = format!("{id}:");
            prop_assert_eq!(&out[..prefix.len()], prefix.as_bytes());
        }
    }
}
