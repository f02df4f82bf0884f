//! Synthetic pulse and background shapes.

/// Double-exponential pulse starting at the trace midpoint plus `offset` seconds, peak-normalized.
///
/// `exp(-t / tau_fall) - exp(-t / tau_rise)` for `t >= 0`, zero before.
pub fn make_template(nbins: usize, sample_rate: f64, tau_rise: f64, tau_fall: f64, offset: f64) -> Vec<f64> {
    let start = nbins as f64 / 2.0 + offset * sample_rate;
    let raw: Vec<f64> = (0..nbins)
        .map(|i| {
            let t = (i as f64 - start) / sample_rate;
            if t < 0.0 {
                0.0
            } else {
                (-t / tau_fall).exp() - (-t / tau_rise).exp()
            }
        })
        .collect();
    normalize_peak(raw)
}

/// One pulse template per TTL edge: onsets at `k * sample_rate / ttl_rate` samples for `k >= 1`,
/// as long as the onset falls inside the trace. Each template is peak-normalized.
pub fn make_ttl_templates(
    nbins: usize,
    sample_rate: f64,
    tau_rise: f64,
    tau_fall: f64,
    ttl_rate: f64,
) -> Vec<Vec<f64>> {
    if !(ttl_rate.is_finite() && ttl_rate > 0.0) {
        return Vec::new();
    }
    let period = sample_rate / ttl_rate;
    let centre = nbins as f64 / 2.0;
    (1..)
        .map(|k| k as f64 * period)
        .take_while(|&onset| onset < nbins as f64)
        .map(|onset| make_template(nbins, sample_rate, tau_rise, tau_fall, (onset - centre) / sample_rate))
        .collect()
}

/// Decaying exponential already in progress at the first sample (tail of an earlier large pulse).
pub fn make_muon_tail(nbins: usize, sample_rate: f64, tau: f64) -> Vec<f64> {
    (0..nbins)
        .map(|i| (-(i as f64) / sample_rate / tau).exp())
        .collect()
}

/// Constant offset.
pub fn make_dc(nbins: usize) -> Vec<f64> {
    vec![1.0; nbins]
}

/// Linear ramp from -1 to 1 across the trace.
pub fn make_slope(nbins: usize) -> Vec<f64> {
    if nbins < 2 {
        return vec![0.0; nbins];
    }
    let last = (nbins - 1) as f64;
    (0..nbins).map(|i| 2.0 * i as f64 / last - 1.0).collect()
}

/// Circular shift by `delay` samples (positive moves the trace later).
pub fn shifted(trace: &[f64], delay: i64) -> Vec<f64> {
    let n = trace.len() as i64;
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| trace[(i - delay).rem_euclid(n) as usize])
        .collect()
}

fn normalize_peak(mut trace: Vec<f64>) -> Vec<f64> {
    let peak = trace.iter().cloned().fold(0.0_f64, f64::max);
    if peak > 0.0 {
        trace.iter_mut().for_each(|v| *v /= peak);
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_is_peak_normalized_and_causal() {
        let t = make_template(512, 625e3, 20e-6, 100e-6, 0.0);
        let peak = t.iter().cloned().fold(f64::MIN, f64::max);
        assert!((peak - 1.0).abs() < 1e-12);
        assert!(t[..256].iter().all(|&v| v == 0.0));
        assert!(t[300] > 0.0);
    }

    #[test]
    fn offset_moves_the_onset() {
        let t = make_template(512, 625e3, 20e-6, 100e-6, 10.0 / 625e3);
        assert_eq!(t[265], 0.0);
        assert!(t[268] > 0.0);
        let base = make_template(512, 625e3, 20e-6, 100e-6, 0.0);
        assert!((t[300] - base[290]).abs() < 1e-9);
    }

    #[test]
    fn shift_wraps_around() {
        assert_eq!(shifted(&[1.0, 2.0, 3.0, 4.0], 1), vec![4.0, 1.0, 2.0, 3.0]);
        assert_eq!(shifted(&[1.0, 2.0, 3.0, 4.0], -1), vec![2.0, 3.0, 4.0, 1.0]);
    }

    #[test]
    fn slope_spans_unit_range() {
        let s = make_slope(5);
        assert_eq!(s, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn ttl_templates_start_on_each_edge() {
        // 625 kHz, 2 kHz TTL: one edge every 312.5 samples.
        let ttl = make_ttl_templates(1024, 625e3, 20e-6, 200e-6, 2e3);
        assert_eq!(ttl.len(), 3);
        for (k, template) in ttl.iter().enumerate() {
            let onset = ((k + 1) as f64 * 312.5).ceil() as usize;
            assert_eq!(template[onset - 1], 0.0, "edge {k}");
            assert!(template[onset + 2] > 0.0, "edge {k}");
        }
        assert!(make_ttl_templates(1024, 625e3, 20e-6, 200e-6, 0.0).is_empty());
    }
}
