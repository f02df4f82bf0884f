//! Per-channel optimal filter orchestrator.
//!
//! `OfBase` owns every cache for one channel:
//!
//! - template spectra per tag
//! - the channel PSD (plus optional per-tag overrides)
//! - filter kernels per tag
//! - the current signal and its per-tag projections
//! - template cross-correlation tables and inverted normal matrices for multi-template fits
//!
//! Kernels are computed by `calc_kernel` and dropped whenever their template or PSD changes; they
//! are never silently rebuilt from stale inputs. A new signal replaces every projection.
//!
//! An instance is not meant to be shared between threads while fitting. Parallel pipelines clone
//! it once per worker.

use std::collections::HashMap;

use num_complex::Complex64;
use tracing::{debug, warn};

use crate::domain::{Coupling, FitResult, MultiFitOutput, OfConfig, PulseDirection};
use crate::error::{OfError, Result};
use crate::filter::{EffectivePsd, FilterKernel, SignalProjection, TemplateSpectrum, chisq_amp, signal_spectrum};
use crate::fit::{
    DelayOptions, FitContext, MultiContext, MultiFitRequest, NormalInverses, TemplateCross, energy_resolution,
    search_lags, time_resolution,
};
use crate::math::Fourier;

/// Tags, shift candidates, polarities and searched signal lags of a multi-template request.
type InverseKey = (Vec<String>, Vec<Vec<i64>>, Vec<PulseDirection>, Vec<usize>);

#[derive(Debug, Clone)]
struct SignalState {
    samples: Vec<f64>,
    fft: Vec<Complex64>,
    projections: HashMap<String, SignalProjection>,
}

/// Shape of the traces on this channel, fixed by the first array handed in.
#[derive(Debug, Clone)]
struct TraceShape {
    fourier: Fourier,
    pretrigger: usize,
    /// Pretrigger fell back to the trace midpoint.
    defaulted: bool,
}

#[derive(Debug, Clone)]
pub struct OfBase {
    config: OfConfig,
    shape: Option<TraceShape>,
    templates: HashMap<String, TemplateSpectrum>,
    psd: Option<EffectivePsd>,
    psd_overrides: HashMap<String, EffectivePsd>,
    kernels: HashMap<String, FilterKernel>,
    cross: HashMap<Vec<String>, TemplateCross>,
    inverses: HashMap<InverseKey, NormalInverses>,
    signal: Option<SignalState>,
}

impl OfBase {
    pub fn new(config: OfConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shape: None,
            templates: HashMap::new(),
            psd: None,
            psd_overrides: HashMap::new(),
            kernels: HashMap::new(),
            cross: HashMap::new(),
            inverses: HashMap::new(),
            signal: None,
        })
    }

    pub fn config(&self) -> &OfConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    /// Trace length, once any template, PSD or signal has been supplied.
    pub fn nbins(&self) -> Option<usize> {
        self.shape.as_ref().map(|s| s.fourier.len())
    }

    pub fn pretrigger(&self) -> Result<usize> {
        self.shape
            .as_ref()
            .map(|s| s.pretrigger)
            .ok_or_else(|| OfError::not_found("Trace length unknown; add a template or PSD first."))
    }

    /// Known template tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.templates.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn has_template(&self, tag: &str) -> bool {
        self.templates.contains_key(tag)
    }

    /// Shape for an array of `len` samples: the channel's own, or a new one if none is fixed yet.
    ///
    /// Nothing is stored; `adopt_shape` fixes it once the array has been accepted.
    fn shape_for(&self, len: usize, what: &str) -> Result<TraceShape> {
        if len == 0 {
            return Err(OfError::configuration(format!("{what} is empty.")));
        }
        if let Some(shape) = &self.shape {
            if shape.fourier.len() != len {
                return Err(OfError::configuration(format!(
                    "{what} has {len} samples; this channel uses {}.",
                    shape.fourier.len()
                )));
            }
            return Ok(shape.clone());
        }

        let (pretrigger, defaulted) = self.config.resolve_pretrigger(len)?;
        Ok(TraceShape {
            fourier: Fourier::new(len),
            pretrigger,
            defaulted,
        })
    }

    fn adopt_shape(&mut self, shape: TraceShape) {
        if self.shape.is_some() {
            return;
        }
        if shape.defaulted {
            warn!(
                channel = %self.config.channel_name,
                pretrigger = shape.pretrigger,
                "no pretrigger configured, using the trace midpoint"
            );
        }
        self.shape = Some(shape);
    }

    fn fourier(&self) -> Result<&Fourier> {
        self.shape
            .as_ref()
            .map(|s| &s.fourier)
            .ok_or_else(|| OfError::not_found("Trace length unknown; add a template or PSD first."))
    }

    /// Register a new template. Tags are unique; use `update_template` to replace one.
    ///
    /// `integral_norm` falls back to the channel configuration when `None`.
    pub fn add_template(&mut self, tag: &str, samples: &[f64], integral_norm: Option<bool>) -> Result<()> {
        if self.templates.contains_key(tag) {
            return Err(OfError::configuration(format!(
                "Template '{tag}' already exists; use update_template to replace it."
            )));
        }
        self.store_template(tag, samples, integral_norm)
    }

    /// Replace (or add) a template and drop everything derived from it.
    pub fn update_template(&mut self, tag: &str, samples: &[f64], integral_norm: Option<bool>) -> Result<()> {
        self.store_template(tag, samples, integral_norm)
    }

    fn store_template(&mut self, tag: &str, samples: &[f64], integral_norm: Option<bool>) -> Result<()> {
        let shape = self.shape_for(samples.len(), "Template")?;
        let integral_norm = integral_norm.unwrap_or(self.config.integral_norm);
        let template = TemplateSpectrum::new(samples, self.config.sample_rate, integral_norm, &shape.fourier)?;

        self.adopt_shape(shape);
        self.templates.insert(tag.to_string(), template);
        self.kernels.remove(tag);
        self.drop_multi_caches();
        if let Some(signal) = &mut self.signal {
            signal.projections.remove(tag);
        }
        debug!(channel = %self.config.channel_name, tag, integral_norm, "template stored");
        Ok(())
    }

    /// Set the channel PSD. `coupling` falls back to the channel configuration when `None`.
    ///
    /// Every kernel built on the channel PSD is dropped.
    pub fn set_psd(&mut self, psd: &[f64], coupling: Option<Coupling>) -> Result<()> {
        let shape = self.shape_for(psd.len(), "PSD")?;
        let coupling = coupling.unwrap_or(self.config.coupling);
        let effective = EffectivePsd::new(psd, coupling)?;

        self.adopt_shape(shape);
        self.psd = Some(effective);
        let overrides = &self.psd_overrides;
        self.kernels.retain(|tag, _| overrides.contains_key(tag));
        if let Some(signal) = &mut self.signal {
            signal.projections.retain(|tag, _| overrides.contains_key(tag));
        }
        self.drop_multi_caches();
        debug!(channel = %self.config.channel_name, %coupling, "PSD set");
        Ok(())
    }

    /// Use a dedicated PSD for one tag instead of the channel PSD.
    pub fn set_psd_for(&mut self, tag: &str, psd: &[f64], coupling: Option<Coupling>) -> Result<()> {
        if !self.templates.contains_key(tag) {
            return Err(OfError::not_found(format!("No template with tag '{tag}'.")));
        }
        self.shape_for(psd.len(), "PSD")?;
        let coupling = coupling.unwrap_or(self.config.coupling);
        let effective = EffectivePsd::new(psd, coupling)?;

        self.psd_overrides.insert(tag.to_string(), effective);
        self.kernels.remove(tag);
        self.drop_multi_caches();
        if let Some(signal) = &mut self.signal {
            signal.projections.remove(tag);
        }
        debug!(channel = %self.config.channel_name, tag, %coupling, "PSD override set");
        Ok(())
    }

    fn drop_multi_caches(&mut self) {
        self.cross.clear();
        self.inverses.clear();
    }

    /// Effective PSD used for `tag`.
    pub fn psd_for(&self, tag: &str) -> Result<&EffectivePsd> {
        self.psd_overrides
            .get(tag)
            .or(self.psd.as_ref())
            .ok_or_else(|| OfError::not_found(format!("No PSD set for tag '{tag}'.")))
    }

    pub fn template(&self, tag: &str) -> Result<&TemplateSpectrum> {
        self.templates
            .get(tag)
            .ok_or_else(|| OfError::not_found(format!("No template with tag '{tag}'.")))
    }

    pub fn kernel(&self, tag: &str) -> Result<&FilterKernel> {
        self.template(tag)?;
        self.kernels
            .get(tag)
            .ok_or_else(|| OfError::not_found(format!("No filter kernel for tag '{tag}'; call calc_kernel.")))
    }

    /// (Re)build the filter kernel for `tag` from its template and PSD.
    pub fn calc_kernel(&mut self, tag: &str) -> Result<()> {
        let template = self.template(tag)?;
        let psd = self.psd_for(tag)?;
        let fourier = self.fourier()?;
        let kernel = FilterKernel::build(template, psd, self.config.sample_rate, fourier)?;

        debug!(
            channel = %self.config.channel_name,
            tag,
            norm = kernel.norm(),
            "filter kernel computed"
        );
        self.kernels.insert(tag.to_string(), kernel);
        if let Some(signal) = &mut self.signal {
            signal.projections.remove(tag);
        }
        Ok(())
    }

    /// Set the current signal and project it onto the kernels of `tags`.
    ///
    /// With `tags = None` every tag that has a kernel is projected. Listed tags without a kernel
    /// get one built first. On error the previous signal is kept.
    pub fn update_signal(&mut self, samples: &[f64], tags: Option<&[&str]>) -> Result<()> {
        let shape = self.shape_for(samples.len(), "Signal")?;
        let fourier = shape.fourier.clone();
        let fft = signal_spectrum(samples, self.config.sample_rate, &fourier)?;

        let tags: Vec<String> = match tags {
            Some(list) => list.iter().map(|t| t.to_string()).collect(),
            None => {
                let mut all: Vec<String> = self.kernels.keys().cloned().collect();
                all.sort();
                all
            }
        };
        for tag in &tags {
            if !self.kernels.contains_key(tag) {
                self.calc_kernel(tag)?;
            }
        }

        let mut projections = HashMap::with_capacity(tags.len());
        for tag in tags {
            let kernel = self.kernel(&tag)?;
            let psd = self.psd_for(&tag)?;
            let projection = SignalProjection::compute(&fft, kernel, psd, &fourier);
            projections.insert(tag, projection);
        }

        debug!(
            channel = %self.config.channel_name,
            projected = projections.len(),
            "signal updated"
        );
        self.adopt_shape(shape);
        self.signal = Some(SignalState {
            samples: samples.to_vec(),
            fft,
            projections,
        });
        Ok(())
    }

    pub fn signal(&self) -> Result<&[f64]> {
        self.signal
            .as_ref()
            .map(|s| s.samples.as_slice())
            .ok_or_else(|| OfError::not_found("No signal set; call update_signal."))
    }

    pub fn signal_fft(&self) -> Result<&[Complex64]> {
        self.signal
            .as_ref()
            .map(|s| s.fft.as_slice())
            .ok_or_else(|| OfError::not_found("No signal set; call update_signal."))
    }

    pub fn projection(&self, tag: &str) -> Result<&SignalProjection> {
        let signal = self
            .signal
            .as_ref()
            .ok_or_else(|| OfError::not_found("No signal set; call update_signal."))?;
        signal.projections.get(tag).ok_or_else(|| {
            OfError::not_found(format!(
                "Current signal is not projected on tag '{tag}'; list it in update_signal."
            ))
        })
    }

    /// Everything a single-template fit on `tag` reads.
    pub fn context(&self, tag: &str) -> Result<FitContext<'_>> {
        Ok(FitContext {
            template: self.template(tag)?,
            kernel: self.kernel(tag)?,
            psd: self.psd_for(tag)?,
            projection: self.projection(tag)?,
            signal_fft: self.signal_fft()?,
            fourier: self.fourier()?,
            sample_rate: self.config.sample_rate,
            pretrigger: self.pretrigger()?,
        })
    }

    pub fn fit_with_delay(&self, tag: &str, opts: &DelayOptions) -> Result<FitResult> {
        crate::fit::fit_with_delay(&self.context(tag)?, opts)
    }

    pub fn fit_no_delay(&self, tag: &str, shift_usec: Option<f64>, use_chisq_alltimes: bool) -> Result<FitResult> {
        crate::fit::fit_no_delay(&self.context(tag)?, shift_usec, use_chisq_alltimes)
    }

    pub fn fit_pileup(&self, tag: &str, primary: &FitResult, opts: &DelayOptions) -> Result<FitResult> {
        crate::fit::fit_pileup(&self.context(tag)?, primary, opts)
    }

    /// Low-frequency chi-square of a fit on `tag`; the channel cutoff when `cutoff_hz` is `None`.
    pub fn chi2_lowfreq(&self, tag: &str, fit: &FitResult, cutoff_hz: Option<f64>) -> Result<f64> {
        let cutoff = cutoff_hz.unwrap_or(self.config.lowfreq_cutoff_hz);
        crate::fit::chi2_lowfreq(&self.context(tag)?, fit, cutoff)
    }

    /// Simultaneous signal + background fit on the current signal.
    ///
    /// Every template is weighted with the signal tag's PSD. Cross-correlations and inverted normal
    /// matrices are cached per request shape and reused for every later signal.
    pub fn fit_multi(&mut self, request: &MultiFitRequest) -> Result<MultiFitOutput> {
        let shifts = request.resolved_shifts()?;
        let polarity = request.resolved_polarity()?;

        let mut tags = Vec::with_capacity(request.background_tags.len() + 1);
        tags.push(request.signal_tag.clone());
        tags.extend(request.background_tags.iter().cloned());
        for tag in &tags {
            self.template(tag)?;
        }
        if let Some(dup) = tags.iter().enumerate().find(|&(i, t)| tags[..i].contains(t)) {
            return Err(OfError::dimension(format!("Template '{}' listed twice.", dup.1)));
        }

        if !self.cross.contains_key(&tags) {
            let templates: Vec<&TemplateSpectrum> =
                tags.iter().map(|t| self.template(t)).collect::<Result<_>>()?;
            let cross = TemplateCross::build(
                &templates,
                self.psd_for(&request.signal_tag)?,
                self.config.sample_rate,
                self.fourier()?,
            );
            debug!(channel = %self.config.channel_name, templates = tags.len(), "template cross-correlations computed");
            self.cross.insert(tags.clone(), cross);
        }

        let nbins = self.fourier()?.len();
        let pretrigger = self.pretrigger()?;
        let lags = search_lags(request, nbins, pretrigger, self.config.sample_rate)?;
        let key: InverseKey = (tags.clone(), shifts, polarity, lags);
        if !self.inverses.contains_key(&key) {
            let cross = self
                .cross
                .get(&tags)
                .ok_or_else(|| OfError::not_found("Template cross-correlations missing."))?;
            let inverses = NormalInverses::build(cross, &key.1, &key.2, key.3.clone(), nbins)?;
            self.inverses.insert(key.clone(), inverses);
        }

        let signal_fft = self.signal_fft()?;
        let psd = self.psd_for(&request.signal_tag)?;
        let fourier = self.fourier()?;
        let df = self.config.sample_rate / fourier.len() as f64;
        let inverses = self
            .inverses
            .get(&key)
            .ok_or_else(|| OfError::not_found("Inverted normal matrices missing."))?;

        let ctx = MultiContext {
            signal_fft,
            templates: tags.iter().map(|t| self.template(t)).collect::<Result<_>>()?,
            psd,
            inverses,
            chisq_amp: chisq_amp(signal_fft, psd, df),
            fourier,
            sample_rate: self.config.sample_rate,
            pretrigger,
        };
        crate::fit::fit_multi(&ctx, request, self.config.lowfreq_cutoff_hz)
    }

    pub fn energy_resolution(&self, tag: &str) -> Result<f64> {
        Ok(energy_resolution(self.kernel(tag)?))
    }

    pub fn time_resolution(&self, tag: &str, amp: f64) -> Result<f64> {
        time_resolution(self.template(tag)?, self.psd_for(tag)?, self.config.sample_rate, amp)
    }
}
