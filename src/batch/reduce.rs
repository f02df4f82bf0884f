//! Per-event reduction of raw traces into flat scalar quantities.
//!
//! For every event the summed trace (and optionally each channel) is reduced to:
//!
//! - a delay fit constrained to a window around the pretrigger
//! - a pileup search given that fit
//! - an unconstrained delay fit
//! - a no-delay fit
//! - the low-frequency chi-square of the constrained fit
//! - the pre-pulse baseline
//!
//! Results come out as `BTreeMap<String, f64>` so a downstream sink can build tables without
//! knowing the fit types.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::base::OfBase;
use crate::domain::{FitResult, PulseDirection, WindowSpec};
use crate::error::{OfError, Result};
use crate::fit::DelayOptions;

/// Quantity names, in output order.
pub const RQ_NAMES: [&str; 13] = [
    "ofamp_constrain",
    "t0_constrain",
    "chi2_constrain",
    "ofamp_pileup",
    "t0_pileup",
    "chi2_pileup",
    "ofamp_noconstrain",
    "t0_noconstrain",
    "chi2_noconstrain",
    "ofamp_nodelay",
    "chi2_nodelay",
    "chi2_lowfreq",
    "baseline",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Width (samples) of the constrained window, centred on the pretrigger.
    pub nconstrain: usize,
    /// Width (samples) of the pileup search window, centred on the pretrigger.
    pub pileup_nconstrain: usize,
    /// Search the pileup pulse outside its window instead of inside.
    pub pileup_outside: bool,
    pub direction: PulseDirection,
    /// Low-frequency chi-square cutoff; the channel default when `None`.
    pub lowfreq_cutoff_hz: Option<f64>,
    /// Samples kept between the baseline average and the earliest fitted pulse.
    pub baseline_buffer: usize,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            nconstrain: 80,
            pileup_nconstrain: 80,
            pileup_outside: false,
            direction: PulseDirection::Any,
            lowfreq_cutoff_hz: None,
            baseline_buffer: 50,
        }
    }
}

/// Reduced quantities for one trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRq {
    pub constrain: FitResult,
    pub pileup: FitResult,
    pub noconstrain: FitResult,
    pub nodelay: FitResult,
    pub chi2_lowfreq: f64,
    pub baseline: f64,
}

impl EventRq {
    /// Flat name -> value map; `suffix` is appended to every name (e.g. `_ch0`).
    pub fn to_map(&self, suffix: &str) -> BTreeMap<String, f64> {
        let values = [
            self.constrain.amp,
            self.constrain.t0,
            self.constrain.chi2,
            self.pileup.amp,
            self.pileup.t0,
            self.pileup.chi2,
            self.noconstrain.amp,
            self.noconstrain.t0,
            self.noconstrain.chi2,
            self.nodelay.amp,
            self.nodelay.chi2,
            self.chi2_lowfreq,
            self.baseline,
        ];
        RQ_NAMES
            .iter()
            .zip(values)
            .map(|(name, v)| (format!("{name}{suffix}"), v))
            .collect()
    }
}

/// Centred window of `width` samples in the pretrigger-aligned frame.
fn centred_window(pretrigger: usize, width: usize) -> WindowSpec {
    let pre = pretrigger as i64;
    let half = (width / 2) as i64;
    WindowSpec::indices(pre - half, pre + half + (width % 2) as i64)
}

/// Reduce one trace with the template `tag` of `base`.
pub fn reduce_trace(base: &mut OfBase, tag: &str, trace: &[f64], config: &ReductionConfig) -> Result<EventRq> {
    base.update_signal(trace, Some(&[tag][..]))?;
    let pretrigger = base.pretrigger()?;

    let constrain_opts = DelayOptions {
        window: centred_window(pretrigger, config.nconstrain),
        direction: config.direction,
        interpolate: false,
    };
    let constrain = base.fit_with_delay(tag, &constrain_opts)?;

    let mut pileup_window = centred_window(pretrigger, config.pileup_nconstrain);
    if config.pileup_outside {
        pileup_window = pileup_window.outside();
    }
    let pileup_opts = DelayOptions {
        window: pileup_window,
        ..constrain_opts
    };
    let pileup = base.fit_pileup(tag, &constrain, &pileup_opts)?;

    let noconstrain = base.fit_with_delay(
        tag,
        &DelayOptions {
            direction: config.direction,
            ..DelayOptions::default()
        },
    )?;
    let nodelay = base.fit_no_delay(tag, None, true)?;
    let chi2_lowfreq = base.chi2_lowfreq(tag, &constrain, config.lowfreq_cutoff_hz)?;

    let fs = base.sample_rate();
    let earliest = (constrain.t0 * fs).trunc().min((noconstrain.t0 * fs).trunc()) as i64 + pretrigger as i64;
    let baseline = baseline(trace, earliest, config.baseline_buffer);

    Ok(EventRq {
        constrain,
        pileup,
        noconstrain,
        nodelay,
        chi2_lowfreq,
        baseline,
    })
}

/// Mean of the samples before `pulse_index - buffer` (at least the first `buffer` samples).
pub fn baseline(trace: &[f64], pulse_index: i64, buffer: usize) -> f64 {
    let end = (pulse_index - buffer as i64).max(buffer as i64).max(1) as usize;
    let end = end.min(trace.len());
    if end == 0 {
        return 0.0;
    }
    trace[..end].iter().sum::<f64>() / end as f64
}

/// Sum an event's channels sample by sample.
pub fn sum_channels(channels: &[Vec<f64>]) -> Result<Vec<f64>> {
    let Some(first) = channels.first() else {
        return Err(OfError::dimension("Event has no channels."));
    };
    if let Some(bad) = channels.iter().position(|c| c.len() != first.len()) {
        return Err(OfError::dimension(format!(
            "Channel {bad} has {} samples, channel 0 has {}.",
            channels[bad].len(),
            first.len()
        )));
    }
    let mut total = vec![0.0; first.len()];
    for channel in channels {
        for (t, v) in total.iter_mut().zip(channel) {
            *t += v;
        }
    }
    Ok(total)
}

/// Reduces events (channels x samples) with one orchestrator.
///
/// The summed trace uses `tag`; with per-channel templates each channel is also reduced with its
/// own template and PSD and its quantities carry a `_ch{i}` suffix.
#[derive(Debug, Clone)]
pub struct EventReducer {
    base: OfBase,
    tag: String,
    channel_tags: Vec<String>,
    config: ReductionConfig,
}

impl EventReducer {
    pub fn new(mut base: OfBase, tag: &str, config: ReductionConfig) -> Result<Self> {
        if base.kernel(tag).is_err() {
            base.calc_kernel(tag)?;
        }
        Ok(Self {
            base,
            tag: tag.to_string(),
            channel_tags: Vec::new(),
            config,
        })
    }

    /// Add one template and PSD per channel.
    pub fn with_channels(mut self, templates: &[Vec<f64>], psds: &[Vec<f64>]) -> Result<Self> {
        if templates.len() != psds.len() {
            return Err(OfError::dimension(format!(
                "{} channel templates but {} channel PSDs.",
                templates.len(),
                psds.len()
            )));
        }
        let mut tags = Vec::with_capacity(templates.len());
        for (i, (template, psd)) in templates.iter().zip(psds).enumerate() {
            let tag = format!("{}_ch{i}", self.tag);
            self.base.update_template(&tag, template, None)?;
            self.base.set_psd_for(&tag, psd, None)?;
            self.base.calc_kernel(&tag)?;
            tags.push(tag);
        }
        self.channel_tags = tags;
        Ok(self)
    }

    pub fn base(&self) -> &OfBase {
        &self.base
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Reduce one event given as channels x samples (a single channel is fine).
    pub fn process_event(&mut self, channels: &[Vec<f64>]) -> Result<BTreeMap<String, f64>> {
        if !self.channel_tags.is_empty() && channels.len() != self.channel_tags.len() {
            return Err(OfError::dimension(format!(
                "Event has {} channels, {} channel templates are configured.",
                channels.len(),
                self.channel_tags.len()
            )));
        }
        let total = sum_channels(channels)?;
        let mut out = reduce_trace(&mut self.base, &self.tag, &total, &self.config)?.to_map("");

        for (i, (tag, trace)) in self.channel_tags.iter().zip(channels).enumerate() {
            let rq = reduce_trace(&mut self.base, tag, trace, &self.config)?;
            out.extend(rq.to_map(&format!("_ch{i}")));
        }
        Ok(out)
    }

    /// Reduce many events in parallel, one reducer clone per worker. Output keeps event order.
    pub fn process_events(&self, events: &[Vec<Vec<f64>>]) -> Result<Vec<BTreeMap<String, f64>>> {
        debug!(events = events.len(), tag = %self.tag, "reducing events");
        events
            .par_iter()
            .map_init(|| self.clone(), |reducer, event| reducer.process_event(event))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_skips_the_pulse_region() {
        let mut trace = vec![1.0; 200];
        trace[120..].iter_mut().for_each(|v| *v = 5.0);
        assert_eq!(baseline(&trace, 120, 50), 1.0);
        // Never fewer than `buffer` samples.
        assert_eq!(baseline(&trace, 60, 50), 1.0);
        assert_eq!(baseline(&trace[..30], 10, 50), 1.0);
    }

    #[test]
    fn channels_sum_elementwise() {
        let total = sum_channels(&[vec![1.0, 2.0], vec![0.5, -2.0]]).unwrap();
        assert_eq!(total, vec![1.5, 0.0]);
        assert!(matches!(
            sum_channels(&[vec![1.0], vec![1.0, 2.0]]),
            Err(OfError::Dimension(_))
        ));
        assert!(sum_channels(&[]).is_err());
    }

    #[test]
    fn map_names_carry_suffix() {
        let fit = FitResult {
            amp: 1.0,
            t0: 0.0,
            chi2: 2.0,
        };
        let rq = EventRq {
            constrain: fit,
            pileup: fit,
            noconstrain: fit,
            nodelay: fit,
            chi2_lowfreq: 3.0,
            baseline: 4.0,
        };
        let map = rq.to_map("_ch1");
        assert_eq!(map.len(), RQ_NAMES.len());
        assert_eq!(map["baseline_ch1"], 4.0);
        assert_eq!(map["chi2_lowfreq_ch1"], 3.0);
    }

    #[test]
    fn centred_window_bounds() {
        assert_eq!(centred_window(100, 80), WindowSpec::indices(60, 140));
        assert_eq!(centred_window(100, 5), WindowSpec::indices(98, 103));
    }
}
