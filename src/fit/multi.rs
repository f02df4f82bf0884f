//! Simultaneous signal + background template fits (N signal x M background).
//!
//! For a fixed delay of every template the least-squares amplitudes solve the normal equations
//! `P a = q` with
//!
//! - `P[i][j] = C_ij[(d_i - d_j) mod N]`, `C_ij` the PSD-weighted cross-correlation of templates
//! - `q[i] = Q_i[d_i mod N]`, `Q_i` the PSD-weighted correlation of template `i` with the signal
//! - `chi2 = chisq_amp - qᵀ a`
//!
//! `P` never depends on the signal, so its inverse is built once per request shape
//! (`NormalInverses`) and every candidate costs one small matrix-vector product.
//!
//! The search space is the Cartesian product of
//! - the admissible signal delays (window),
//! - the per-background shift candidates,
//! - the active subsets ("bit combinations") of polarity-constrained backgrounds.
//!
//! Inactive backgrounds carry amplitude 0. A candidate is admissible when every active
//! constrained amplitude (and the signal amplitude) has the required sign. The outer search is a
//! plain min-reduce over candidates in enumeration order; ties keep the first candidate.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::domain::{MultiFit, MultiFitOutput, PulseDirection, WindowSpec};
use crate::error::{OfError, Result};
use crate::filter::{EffectivePsd, TemplateSpectrum, weighted_correlation};
use crate::fit::residual::{model_spectrum, residual_chi2, residual_trace};
use crate::fit::window::{ResolvedWindow, resolve_window};
use crate::math::{Fourier, fft_freqs, invert_normal_matrix, is_well_conditioned, parabola_at, parabola_vertex};

/// Largest number of polarity-constrained backgrounds enumerated as bit combinations.
const MAX_CONSTRAINED_BACKGROUNDS: usize = 16;

/// Smallest share of a template's spectral energy that must fall in weighted bins.
const MIN_VISIBLE_FRACTION: f64 = 1e-12;

/// What to fit and how.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiFitRequest {
    pub signal_tag: String,
    pub background_tags: Vec<String>,
    /// Signed sample shifts allowed for each background. Empty means `[0]` for all.
    pub shift_candidates: Vec<Vec<i64>>,
    /// Sign constraint for each background. Empty means unconstrained.
    pub background_polarity: Vec<PulseDirection>,
    pub signal_polarity: PulseDirection,
    /// Signal delay window for the global search.
    pub window: WindowSpec,
    /// Optional second window; its minimum is reported separately.
    pub constrained_window: Option<WindowSpec>,
    pub interpolate: bool,
    /// Low-frequency chi-square cutoff; the channel default when `None`.
    pub lowfreq_cutoff_hz: Option<f64>,
}

impl MultiFitRequest {
    pub fn new(signal_tag: impl Into<String>, background_tags: Vec<String>) -> Self {
        Self {
            signal_tag: signal_tag.into(),
            background_tags,
            shift_candidates: Vec::new(),
            background_polarity: Vec::new(),
            signal_polarity: PulseDirection::Any,
            window: WindowSpec::all(),
            constrained_window: None,
            interpolate: false,
            lowfreq_cutoff_hz: None,
        }
    }

    pub fn with_shift_candidates(mut self, candidates: Vec<Vec<i64>>) -> Self {
        self.shift_candidates = candidates;
        self
    }

    pub fn with_background_polarity(mut self, polarity: Vec<PulseDirection>) -> Self {
        self.background_polarity = polarity;
        self
    }

    pub fn with_signal_polarity(mut self, polarity: PulseDirection) -> Self {
        self.signal_polarity = polarity;
        self
    }

    pub fn with_window(mut self, window: WindowSpec) -> Self {
        self.window = window;
        self
    }

    pub fn with_constrained_window(mut self, window: WindowSpec) -> Self {
        self.constrained_window = Some(window);
        self
    }

    pub fn with_interpolation(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }

    /// Shift candidates with defaults filled in, after checking dimensions.
    pub fn resolved_shifts(&self) -> Result<Vec<Vec<i64>>> {
        let nb = self.background_tags.len();
        if self.shift_candidates.is_empty() {
            return Ok(vec![vec![0]; nb]);
        }
        if self.shift_candidates.len() != nb {
            return Err(OfError::dimension(format!(
                "{} shift candidate sets given for {nb} background templates.",
                self.shift_candidates.len()
            )));
        }
        if let Some(b) = self.shift_candidates.iter().position(|c| c.is_empty()) {
            return Err(OfError::dimension(format!(
                "Background template {b} has no shift candidates."
            )));
        }
        Ok(self.shift_candidates.clone())
    }

    /// Background polarities with defaults filled in, after checking dimensions.
    pub fn resolved_polarity(&self) -> Result<Vec<PulseDirection>> {
        let nb = self.background_tags.len();
        if self.background_polarity.is_empty() {
            return Ok(vec![PulseDirection::Any; nb]);
        }
        if self.background_polarity.len() != nb {
            return Err(OfError::dimension(format!(
                "{} polarity constraints given for {nb} background templates.",
                self.background_polarity.len()
            )));
        }
        Ok(self.background_polarity.clone())
    }
}

/// PSD-weighted cross-correlations between every pair of templates.
///
/// Depends only on templates and PSD, so the orchestrator caches it per tag list.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateCross {
    /// `tables[i][j][m] = C_ij[m]`.
    tables: Vec<Vec<Vec<f64>>>,
    /// Per template: `C_ii[0]` over its energy weighted by the largest PSD weight.
    visible: Vec<f64>,
}

impl TemplateCross {
    pub fn build(
        templates: &[&TemplateSpectrum],
        psd: &EffectivePsd,
        sample_rate: f64,
        fourier: &Fourier,
    ) -> Self {
        let df = sample_rate / fourier.len() as f64;
        let weights = psd.weights();
        let nt = templates.len();
        let mut tables = vec![vec![Vec::new(); nt]; nt];
        for i in 0..nt {
            for j in i..nt {
                let c = weighted_correlation(fourier, templates[i].fft(), templates[j].fft(), &weights, df);
                if i != j {
                    // C_ji[m] = C_ij[-m]
                    let n = c.len();
                    tables[j][i] = (0..n).map(|m| c[(n - m) % n]).collect();
                }
                tables[i][j] = c;
            }
        }

        let w_max = weights.iter().cloned().fold(0.0_f64, f64::max);
        let visible = (0..nt)
            .map(|i| {
                let energy = df * w_max * templates[i].fft().iter().map(|s| s.norm_sqr()).sum::<f64>();
                if energy > 0.0 { tables[i][i][0] / energy } else { 0.0 }
            })
            .collect();
        Self { tables, visible }
    }

    pub fn template_count(&self) -> usize {
        self.tables.len()
    }

    /// Whether template `i` is (numerically) invisible under the PSD, e.g. a constant offset
    /// with AC coupling.
    pub fn is_degenerate(&self, i: usize) -> bool {
        !(self.visible[i] > MIN_VISIBLE_FRACTION)
    }

    fn at(&self, i: usize, j: usize, lag: usize) -> f64 {
        self.tables[i][j][lag]
    }
}

/// Normal-matrix inverses for one request shape (tags, shifts, polarity and searched lags).
///
/// `P` depends on the templates, the PSD, the relative lags and the active subset, never on the
/// signal. The orchestrator builds this once and every later event only computes `a = P⁻¹ q`.
#[derive(Debug, Clone)]
pub struct NormalInverses {
    combos: Vec<Combination>,
    /// Signal lags covered, ascending.
    lags: Vec<usize>,
    /// `inverses[l][c]` for `lags[l]` and combination `c`; `None` when singular.
    inverses: Vec<Vec<Option<DMatrix<f64>>>>,
}

impl NormalInverses {
    /// Invert `P` for every combination at every lag in `lags`.
    ///
    /// Fails when a template carries no weight under the PSD, when the background block is
    /// degenerate, or when the request dimensions do not match `cross`.
    pub fn build(
        cross: &TemplateCross,
        shifts: &[Vec<i64>],
        polarity: &[PulseDirection],
        lags: Vec<usize>,
        nbins: usize,
    ) -> Result<Self> {
        let nb = shifts.len();
        if polarity.len() != nb || cross.template_count() != nb + 1 {
            return Err(OfError::dimension(format!(
                "{} templates, {nb} shift sets and {} polarities do not match.",
                cross.template_count(),
                polarity.len()
            )));
        }
        let combos = enumerate_combinations(shifts, polarity, nbins)?;
        check_background_block(cross, shifts, nbins)?;

        let inverses: Vec<Vec<Option<DMatrix<f64>>>> = lags
            .par_iter()
            .map(|&lag| {
                combos
                    .iter()
                    .map(|c| invert_normal_matrix(&normal_matrix(cross, c, lag, nbins)))
                    .collect()
            })
            .collect();
        debug!(
            lags = lags.len(),
            combinations = combos.len(),
            "normal matrices inverted"
        );
        Ok(Self {
            combos,
            lags,
            inverses,
        })
    }

    pub fn combination_count(&self) -> usize {
        self.combos.len()
    }

    pub fn background_count(&self) -> usize {
        self.combos.first().map_or(0, |c| c.lags.len())
    }

    fn inverse(&self, lag: usize, combo: usize) -> Option<&DMatrix<f64>> {
        let l = self.lags.binary_search(&lag).ok()?;
        self.inverses[l][combo].as_ref()
    }
}

/// Signal lags (mod N) a request can visit: its windows, plus their neighbours when interpolating.
pub fn search_lags(
    request: &MultiFitRequest,
    nbins: usize,
    pretrigger: usize,
    sample_rate: f64,
) -> Result<Vec<usize>> {
    let mut delays = resolve_window(&request.window, nbins, pretrigger, sample_rate)?
        .indices()
        .to_vec();
    if let Some(spec) = &request.constrained_window {
        delays.extend_from_slice(resolve_window(spec, nbins, pretrigger, sample_rate)?.indices());
    }
    if request.interpolate {
        let neighbours: Vec<usize> = delays
            .iter()
            .flat_map(|&d| [d.checked_sub(1), Some(d + 1).filter(|&j| j < nbins)])
            .flatten()
            .collect();
        delays.extend(neighbours);
    }
    let mut lags: Vec<usize> = delays
        .into_iter()
        .map(|d| signal_lag(d, pretrigger, nbins))
        .collect();
    lags.sort_unstable();
    lags.dedup();
    Ok(lags)
}

fn signal_lag(delay: usize, pretrigger: usize, nbins: usize) -> usize {
    (delay + nbins - pretrigger % nbins) % nbins
}

fn normal_matrix(cross: &TemplateCross, combo: &Combination, signal_lag: usize, n: usize) -> DMatrix<f64> {
    let lag_of = |t: usize| if t == 0 { signal_lag } else { combo.lags[t - 1] };
    let k = combo.active.len();
    DMatrix::from_fn(k, k, |a, b| {
        let (ta, tb) = (combo.active[a], combo.active[b]);
        cross.at(ta, tb, (lag_of(ta) + n - lag_of(tb)) % n)
    })
}

/// Inputs of a multi-template fit for the current signal.
#[derive(Debug, Clone)]
pub struct MultiContext<'a> {
    pub signal_fft: &'a [Complex64],
    /// Signal template first, then backgrounds in request order.
    pub templates: Vec<&'a TemplateSpectrum>,
    /// The signal tag's effective PSD, used to weight every template.
    pub psd: &'a EffectivePsd,
    pub inverses: &'a NormalInverses,
    pub chisq_amp: f64,
    pub fourier: &'a Fourier,
    pub sample_rate: f64,
    pub pretrigger: usize,
}

/// One enumerated background configuration.
#[derive(Debug, Clone, PartialEq)]
struct Combination {
    /// Background lags (mod N), one per background.
    lags: Vec<usize>,
    /// Background shifts as requested (samples, signed).
    shifts: Vec<i64>,
    /// Template indices taking part in the solve (always includes 0, the signal).
    active: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
struct Solution {
    /// Amplitude per template (0 for inactive backgrounds).
    amps: Vec<f64>,
    chi2: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Best {
    delay: usize,
    combo: usize,
    solution: Solution,
}

/// Every ordered choice of one shift per background.
pub fn shift_combinations(candidates: &[Vec<i64>]) -> Vec<Vec<i64>> {
    candidates.iter().fold(vec![Vec::new()], |acc, set| {
        acc.iter()
            .flat_map(|prefix| {
                set.iter().map(move |&s| {
                    let mut next = prefix.clone();
                    next.push(s);
                    next
                })
            })
            .collect()
    })
}

/// Run the full multi-template search.
///
/// `ctx.inverses` must have been built for this request's shifts, polarity and search lags.
pub fn fit_multi(
    ctx: &MultiContext<'_>,
    request: &MultiFitRequest,
    default_cutoff_hz: f64,
) -> Result<MultiFitOutput> {
    let nb = request.background_tags.len();
    let nt = nb + 1;
    if ctx.templates.len() != nt || ctx.inverses.background_count() != nb {
        return Err(OfError::dimension(format!(
            "Expected {nt} templates (1 signal + {nb} background), got {}.",
            ctx.templates.len()
        )));
    }
    let polarity = request.resolved_polarity()?;
    let cutoff = request.lowfreq_cutoff_hz.unwrap_or(default_cutoff_hz);
    if !(cutoff.is_finite() && cutoff > 0.0) {
        return Err(OfError::invalid_value(format!("Invalid low-frequency cutoff: {cutoff} Hz.")));
    }

    let n = ctx.fourier.len();
    let df = ctx.sample_rate / n as f64;
    let weights = ctx.psd.weights();
    let projections: Vec<Vec<f64>> = ctx
        .templates
        .iter()
        .map(|t| weighted_correlation(ctx.fourier, t.fft(), ctx.signal_fft, &weights, df))
        .collect();

    let search = Search {
        ctx,
        projections: &projections,
        combos: &ctx.inverses.combos,
        polarity: &polarity,
        signal_polarity: request.signal_polarity,
    };
    debug!(
        templates = nt,
        combinations = ctx.inverses.combination_count(),
        "multi-template search"
    );

    let window = resolve_window(&request.window, n, ctx.pretrigger, ctx.sample_rate)?;
    let global = search.run(&window)?;
    let global_interpolated = request
        .interpolate
        .then(|| search.interpolate(&global, &window));

    let (constrained, constrained_interpolated) = match &request.constrained_window {
        Some(spec) => {
            let cwindow = resolve_window(spec, n, ctx.pretrigger, ctx.sample_rate)?;
            let best = search.run(&cwindow)?;
            let interp = request.interpolate.then(|| search.interpolate(&best, &cwindow));
            (Some(best), interp)
        }
        None => (None, None),
    };

    let finish = |best: &Best, offset: f64| -> MultiFit {
        search.to_multi_fit(best.delay as f64 + offset, &best.solution, best.combo, cutoff, &weights)
    };

    let out = MultiFitOutput {
        global: finish(&global, 0.0),
        global_interpolated: global_interpolated.map(|(b, off)| finish(&b, off)),
        constrained: constrained.as_ref().map(|b| finish(b, 0.0)),
        constrained_interpolated: constrained_interpolated.map(|(b, off)| finish(&b, off)),
    };
    debug!(
        amps = ?out.global.amps,
        t0 = out.global.t0s[0],
        chi2 = out.global.chi2,
        "multi-template fit selected"
    );
    Ok(out)
}

fn enumerate_combinations(
    shifts: &[Vec<i64>],
    polarity: &[PulseDirection],
    n: usize,
) -> Result<Vec<Combination>> {
    let constrained: Vec<usize> = (0..polarity.len())
        .filter(|&b| polarity[b].is_constrained())
        .collect();
    if constrained.len() > MAX_CONSTRAINED_BACKGROUNDS {
        return Err(OfError::dimension(format!(
            "{} polarity-constrained backgrounds exceed the limit of {MAX_CONSTRAINED_BACKGROUNDS}.",
            constrained.len()
        )));
    }

    let mut out = Vec::new();
    for combo in shift_combinations(shifts) {
        let lags: Vec<usize> = combo
            .iter()
            .map(|&s| s.rem_euclid(n as i64) as usize)
            .collect();
        for mask in 0..(1usize << constrained.len()) {
            let mut active = vec![0];
            for b in 0..polarity.len() {
                let on = match constrained.iter().position(|&c| c == b) {
                    Some(bit) => mask & (1 << bit) != 0,
                    None => true,
                };
                if on {
                    active.push(b + 1);
                }
            }
            out.push(Combination {
                lags: lags.clone(),
                shifts: combo.clone(),
                active,
            });
        }
    }
    Ok(out)
}

/// The background-only normal matrix must be solvable for every shift combination.
fn check_background_block(cross: &TemplateCross, shifts: &[Vec<i64>], n: usize) -> Result<()> {
    if let Some(i) = (0..cross.template_count()).find(|&i| cross.is_degenerate(i)) {
        return Err(OfError::singular(format!(
            "Template {i} carries no weight under the PSD."
        )));
    }
    let nb = shifts.len();
    if nb == 0 {
        return Ok(());
    }
    for combo in shift_combinations(shifts) {
        let lags: Vec<usize> = combo.iter().map(|&s| s.rem_euclid(n as i64) as usize).collect();
        let p = DMatrix::from_fn(nb, nb, |a, b| {
            cross.at(a + 1, b + 1, (lags[a] + n - lags[b]) % n)
        });
        if !is_well_conditioned(&p) {
            return Err(OfError::singular(format!(
                "Background templates are degenerate for shifts {combo:?}."
            )));
        }
    }
    Ok(())
}

struct Search<'s, 'a> {
    ctx: &'s MultiContext<'a>,
    projections: &'s [Vec<f64>],
    combos: &'s [Combination],
    polarity: &'s [PulseDirection],
    signal_polarity: PulseDirection,
}

impl Search<'_, '_> {
    fn n(&self) -> usize {
        self.ctx.fourier.len()
    }

    /// Least-squares amplitudes of one candidate, ignoring sign constraints. `None` if singular.
    fn solve(&self, delay: usize, combo: usize) -> Option<Solution> {
        let c = &self.combos[combo];
        let signal_lag = signal_lag(delay, self.ctx.pretrigger, self.n());
        let Some(inverse) = self.ctx.inverses.inverse(signal_lag, combo) else {
            trace!(delay, combo, "skipping singular combination");
            return None;
        };

        let lag_of = |t: usize| if t == 0 { signal_lag } else { c.lags[t - 1] };
        let q = DVector::from_fn(c.active.len(), |a, _| {
            let t = c.active[a];
            self.projections[t][lag_of(t)]
        });
        let a = inverse * &q;
        if a.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let mut amps = vec![0.0; c.lags.len() + 1];
        for (idx, &t) in c.active.iter().enumerate() {
            amps[t] = a[idx];
        }
        let chi2 = (self.ctx.chisq_amp - q.dot(&a)).max(0.0);
        Some(Solution { amps, chi2 })
    }

    /// Whether every active amplitude has its required sign.
    fn admits(&self, combo: usize, solution: &Solution) -> bool {
        let c = &self.combos[combo];
        self.signal_polarity.admits(solution.amps[0])
            && c.active
                .iter()
                .filter(|&&t| t > 0)
                .all(|&t| self.polarity[t - 1].admits(solution.amps[t]))
    }

    /// Solve one candidate. `None` if singular or a sign constraint is violated.
    fn evaluate(&self, delay: usize, combo: usize) -> Option<Solution> {
        self.solve(delay, combo)
            .filter(|solution| self.admits(combo, solution))
    }

    fn run(&self, window: &ResolvedWindow) -> Result<Best> {
        // Each delay is independent (parallel); `collect` keeps window order.
        let per_delay: Vec<Best> = window
            .indices()
            .par_iter()
            .filter_map(|&delay| self.best_at(delay))
            .collect();

        // Deterministic selection: first minimum in enumeration order.
        let mut best: Option<&Best> = None;
        for candidate in &per_delay {
            if best.is_none_or(|b| candidate.solution.chi2 < b.solution.chi2) {
                best = Some(candidate);
            }
        }
        best.cloned().ok_or_else(|| {
            OfError::window("No admissible delay / background combination in the window.")
        })
    }

    fn best_at(&self, delay: usize) -> Option<Best> {
        let mut best: Option<Best> = None;
        for combo in 0..self.combos.len() {
            let Some(solution) = self.evaluate(delay, combo) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| solution.chi2 < b.solution.chi2) {
                best = Some(Best {
                    delay,
                    combo,
                    solution,
                });
            }
        }
        best
    }

    /// Parabolic refinement of the signal delay with the background configuration held fixed.
    ///
    /// The parabola runs through the unconstrained solutions at the neighbouring delays; the
    /// offset is clipped to the side(s) whose neighbour is inside the window and admissible.
    /// Returns the refined solution and its offset (samples) from the discrete delay.
    fn interpolate(&self, best: &Best, window: &ResolvedWindow) -> (Best, f64) {
        let n = self.n();
        let unchanged = (best.clone(), 0.0);
        if best.delay == 0 || best.delay + 1 >= n {
            return unchanged;
        }
        let neighbour = |d: usize| self.solve(d, best.combo);
        let (Some(minus), Some(plus)) = (neighbour(best.delay - 1), neighbour(best.delay + 1)) else {
            return unchanged;
        };
        let usable = |d: usize, s: &Solution| window.contains(d) && self.admits(best.combo, s);
        let lo = if usable(best.delay - 1, &minus) { -1.0 } else { 0.0 };
        let hi = if usable(best.delay + 1, &plus) { 1.0 } else { 0.0 };
        if lo == 0.0 && hi == 0.0 {
            return unchanged;
        }

        let centre = &best.solution;
        let vertex = parabola_vertex(minus.chi2, centre.chi2, plus.chi2);
        let offset = vertex.offset.clamp(lo, hi);
        let chi2 = parabola_at(minus.chi2, centre.chi2, plus.chi2, offset).max(0.0);
        let amps = (0..centre.amps.len())
            .map(|t| parabola_at(minus.amps[t], centre.amps[t], plus.amps[t], offset))
            .collect();

        (
            Best {
                delay: best.delay,
                combo: best.combo,
                solution: Solution { amps, chi2 },
            },
            offset,
        )
    }

    fn to_multi_fit(
        &self,
        delay: f64,
        solution: &Solution,
        combo: usize,
        cutoff_hz: f64,
        weights: &[f64],
    ) -> MultiFit {
        let ctx = self.ctx;
        let n = self.n();
        let mut t0s = Vec::with_capacity(solution.amps.len());
        t0s.push((delay - ctx.pretrigger as f64) / ctx.sample_rate);
        t0s.extend(
            self.combos[combo]
                .shifts
                .iter()
                .map(|&s| s as f64 / ctx.sample_rate),
        );

        let freqs = fft_freqs(n, ctx.sample_rate);
        let ffts: Vec<&[Complex64]> = ctx.templates.iter().map(|t| t.fft()).collect();
        let model = model_spectrum(&ffts, &solution.amps, &t0s, &freqs);
        let df = ctx.sample_rate / n as f64;

        MultiFit {
            amps: solution.amps.clone(),
            t0s,
            chi2: solution.chi2,
            chi2_lowfreq: residual_chi2(ctx.signal_fft, &model, weights, &freqs, df, Some(cutoff_hz)),
            residual: residual_trace(ctx.fourier, ctx.signal_fft, &model, ctx.sample_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_combinations_is_cartesian_in_order() {
        let combos = shift_combinations(&[vec![0, 1], vec![5], vec![-1, 2]]);
        assert_eq!(
            combos,
            vec![
                vec![0, 5, -1],
                vec![0, 5, 2],
                vec![1, 5, -1],
                vec![1, 5, 2],
            ]
        );
        assert_eq!(shift_combinations(&[]), vec![Vec::<i64>::new()]);
    }

    #[test]
    fn request_dimension_checks() {
        let request = MultiFitRequest::new("signal", vec!["a".into(), "b".into()])
            .with_shift_candidates(vec![vec![0]]);
        assert!(matches!(request.resolved_shifts(), Err(OfError::Dimension(_))));

        let request = MultiFitRequest::new("signal", vec!["a".into(), "b".into()])
            .with_background_polarity(vec![PulseDirection::Positive]);
        assert!(matches!(request.resolved_polarity(), Err(OfError::Dimension(_))));

        let request = MultiFitRequest::new("signal", vec!["a".into()])
            .with_shift_candidates(vec![vec![]]);
        assert!(matches!(request.resolved_shifts(), Err(OfError::Dimension(_))));

        let request = MultiFitRequest::new("signal", vec!["a".into(), "b".into()]);
        assert_eq!(request.resolved_shifts().unwrap(), vec![vec![0], vec![0]]);
        assert_eq!(
            request.resolved_polarity().unwrap(),
            vec![PulseDirection::Any, PulseDirection::Any]
        );
    }

    #[test]
    fn bit_combinations_cover_constrained_subsets() {
        let combos = enumerate_combinations(
            &[vec![0], vec![0], vec![3]],
            &[PulseDirection::Positive, PulseDirection::Any, PulseDirection::Negative],
            16,
        )
        .unwrap();
        let actives: Vec<Vec<usize>> = combos.iter().map(|c| c.active.clone()).collect();
        assert_eq!(
            actives,
            vec![vec![0, 2], vec![0, 1, 2], vec![0, 2, 3], vec![0, 1, 2, 3]]
        );
        assert!(combos.iter().all(|c| c.lags == vec![0, 0, 3]));
    }

    #[test]
    fn search_lags_cover_windows_and_neighbours() {
        let request = MultiFitRequest::new("signal", Vec::new())
            .with_window(WindowSpec::indices(4, 6))
            .with_interpolation(true);
        assert_eq!(search_lags(&request, 16, 5, 1.0).unwrap(), vec![0, 1, 14, 15]);

        let request = request
            .with_interpolation(false)
            .with_constrained_window(WindowSpec::indices(10, 11));
        assert_eq!(search_lags(&request, 16, 5, 1.0).unwrap(), vec![0, 5, 15]);
    }
}
