//! Link-quality scoring from simulated RF geometry.
//!
//! Produces a single `[0.1, 1.0]` factor that scales attack intensity. The
//! shape follows a standard link budget: received power is transmit power
//! plus both antenna gains minus free-space path loss, then mapped linearly
//! onto the score range between a floor and ceiling in dBm.

use serde::{Deserialize, Serialize};

/// RF parameters of the simulated ground-to-space link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkParams {
    pub transmit_power_dbm: f64,
    pub antenna_gain_dbi: f64,
    pub distance_km: f64,
    pub frequency_ghz: f64,
}

impl Default for LinkParams {
    fn default() -> Self {
        // Small ground terminal to a LEO pass near the horizon.
        Self {
            transmit_power_dbm: 0.0,
            antenna_gain_dbi: 10.0,
            distance_km: 3000.0,
            frequency_ghz: 2.4,
        }
    }
}

/// Received power below this maps to the minimum quality of 0.1.
const RX_FLOOR_DBM: f64 = -170.0;
/// Received power above this maps to the maximum quality of 1.0.
const RX_CEILING_DBM: f64 = -130.0;

/// Free-space path loss in dB for km/GHz units.
fn fspl_db(distance_km: f64, frequency_ghz: f64) -> f64 {
    20.0 * distance_km.max(1.0).log10() + 20.0 * frequency_ghz.max(0.001).log10() + 92.45
}

/// Score the link in `[0.1, 1.0]`. Identical gain is assumed at both ends.
pub fn link_quality(params: &LinkParams) -> f64 {
    let rx_dbm = params.transmit_power_dbm + 2.0 * params.antenna_gain_dbi
        - fspl_db(params.distance_km, params.frequency_ghz);
    let score = (rx_dbm - RX_FLOOR_DBM) / (RX_CEILING_DBM - RX_FLOOR_DBM);
    score.clamp(0.1, 1.0)
}
