// ============================================================================
// metrics.rs - physarum
// Trail-field diagnostics computed from GPU readback, for periodic logging.
// ============================================================================

use crate::world::TRAIL_CHANNELS;

/// Summary of one trail-map readback.
pub struct TrailStats {
    /// Summed intensity over all cells and species channels.
    pub total_intensity: f32,
    /// Per-species-channel intensity sums.
    pub channel_totals: [f32; 3],
    pub max_intensity: f32,
    /// Cells with any channel above the live threshold.
    pub occupied_cells: u32,
    pub occupied_fraction: f32,
}

const LIVE_THRESHOLD: f32 = 1.0 / 65536.0;

impl TrailStats {
    /// `trail` is the row-major readback with `TRAIL_CHANNELS` values per
    /// cell, as produced by `WorldState::readback_trail`.
    pub fn from_trail(trail: &[f32]) -> Self {
        let mut channel_totals = [0.0f64; 3];
        let mut max_intensity = 0.0f32;
        let mut occupied_cells = 0u32;

        let cells = trail.chunks_exact(TRAIL_CHANNELS as usize);
        let num_cells = cells.len();
        for cell in cells {
            let mut live = false;
            for ch in 0..3 {
                let v = cell[ch];
                channel_totals[ch] += v as f64;
                if v > max_intensity {
                    max_intensity = v;
                }
                if v >= LIVE_THRESHOLD {
                    live = true;
                }
            }
            if live {
                occupied_cells += 1;
            }
        }

        let total_intensity = (channel_totals[0] + channel_totals[1] + channel_totals[2]) as f32;
        TrailStats {
            total_intensity,
            channel_totals: channel_totals.map(|v| v as f32),
            max_intensity,
            occupied_cells,
            occupied_fraction: if num_cells > 0 {
                occupied_cells as f32 / num_cells as f32
            } else {
                0.0
            },
        }
    }

    pub fn log(&self, frame: u32) {
        log::info!(
            "frame {}: trail total={:.1} (r={:.1} g={:.1} b={:.1}) | max={:.3} | occupied={} ({:.1}%)",
            frame,
            self.total_intensity,
            self.channel_totals[0],
            self.channel_totals[1],
            self.channel_totals[2],
            self.max_intensity,
            self.occupied_cells,
            self.occupied_fraction * 100.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_has_zero_stats() {
        let trail = vec![0.0f32; 16 * 4];
        let stats = TrailStats::from_trail(&trail);
        assert_eq!(stats.total_intensity, 0.0);
        assert_eq!(stats.occupied_cells, 0);
        assert_eq!(stats.max_intensity, 0.0);
    }

    #[test]
    fn sums_channels_and_counts_cells() {
        // Two cells of four channels; the fourth channel is ignored.
        let trail = vec![
            1.0, 2.0, 0.0, 9.0, //
            0.5, 0.0, 4.0, 9.0,
        ];
        let stats = TrailStats::from_trail(&trail);
        assert_eq!(stats.channel_totals, [1.5, 2.0, 4.0]);
        assert_eq!(stats.total_intensity, 7.5);
        assert_eq!(stats.max_intensity, 4.0);
        assert_eq!(stats.occupied_cells, 2);
        assert_eq!(stats.occupied_fraction, 1.0);
    }
}
