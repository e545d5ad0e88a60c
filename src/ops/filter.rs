//! Butterworth filtering
//!
//! Digital design through the analog prototype, frequency transform and
//! bilinear transform, then zero-phase application (forward and backward
//! passes with odd-extension padding and steady-state initial conditions).
//!
//! Cutoffs are given as fractions of the sample rate in (0, 0.5) and are
//! normalized by the Nyquist value 0.5 before design.

use super::{coerce_number, single_input, OperationKind, OperationResult, Parameters, SignalOperation};
use crate::data::Signal;
use crate::error::{OperationError, ValidationError};
use crate::utils::{format_number, format_pair};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::f64::consts::PI;
use tracing::warn;

const NYQUIST: f64 = 0.5;
const DEFAULT_CUTOFF: f64 = 0.1;
const DEFAULT_BAND: (f64, f64) = (0.1, 0.4);
const DEFAULT_ORDER: usize = 4;
const MAX_ORDER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Bandstop,
}

impl FilterType {
    pub const ALL: [FilterType; 4] = [
        FilterType::Lowpass,
        FilterType::Highpass,
        FilterType::Bandpass,
        FilterType::Bandstop,
    ];

    /// Accepts `lowpass`, `Low-Pass`, `low pass` and so on.
    pub fn parse(name: &str) -> Option<Self> {
        let compact: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == compact)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::Lowpass => "lowpass",
            FilterType::Highpass => "highpass",
            FilterType::Bandpass => "bandpass",
            FilterType::Bandstop => "bandstop",
        }
    }

    pub fn is_band(&self) -> bool {
        matches!(self, FilterType::Bandpass | FilterType::Bandstop)
    }

    fn label(&self) -> &'static str {
        match self {
            FilterType::Lowpass => "Lowpass",
            FilterType::Highpass => "Highpass",
            FilterType::Bandpass => "Bandpass",
            FilterType::Bandstop => "Bandstop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cutoff {
    Single(f64),
    Band(f64, f64),
}

impl Cutoff {
    fn to_value(self) -> Value {
        match self {
            Cutoff::Single(c) => json!(c),
            Cutoff::Band(lo, hi) => json!([lo, hi]),
        }
    }

    fn describe(self) -> String {
        match self {
            Cutoff::Single(c) => format_number(c),
            Cutoff::Band(lo, hi) => format_pair(lo, hi),
        }
    }

    fn normalized(self) -> Vec<f64> {
        match self {
            Cutoff::Single(c) => vec![c / NYQUIST],
            Cutoff::Band(lo, hi) => vec![lo / NYQUIST, hi / NYQUIST],
        }
    }
}

/// Fully resolved filter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub filter_type: FilterType,
    pub cutoff: Cutoff,
    pub order: usize,
}

impl FilterSpec {
    /// Resolve from request parameters, applying defaults. A band filter
    /// whose cutoff is not a numeric pair falls back to the default band.
    pub fn from_params(params: &Parameters) -> Result<Self, ValidationError> {
        let filter_type = match params.get("filter_type") {
            None | Some(Value::Null) => {
                return Err(ValidationError::invalid(
                    "filter",
                    "filter_type is required (lowpass, highpass, bandpass or bandstop)",
                ))
            }
            Some(raw) => raw.as_str().and_then(FilterType::parse).ok_or_else(|| {
                ValidationError::invalid(
                    "filter",
                    format!(
                        "invalid filter_type {}; expected lowpass, highpass, bandpass or bandstop",
                        raw
                    ),
                )
            })?,
        };

        let order = match params.get("order") {
            None | Some(Value::Null) => DEFAULT_ORDER,
            Some(raw) => coerce_number(raw)
                .filter(|o| o.fract() == 0.0 && *o >= 1.0 && *o <= MAX_ORDER as f64)
                .map(|o| o as usize)
                .ok_or_else(|| {
                    ValidationError::invalid(
                        "filter",
                        format!("order must be an integer between 1 and {}, got {}", MAX_ORDER, raw),
                    )
                })?,
        };

        let cutoff = if filter_type.is_band() {
            band_cutoff(filter_type, params.get("cutoff_freq"))
        } else {
            single_cutoff(filter_type, params.get("cutoff_freq"))?
        };
        check_range(filter_type, cutoff)?;

        Ok(Self {
            filter_type,
            cutoff,
            order,
        })
    }

    fn write_params(&self, params: &mut Parameters) {
        params.insert("filter_type".into(), json!(self.filter_type.as_str()));
        params.insert("cutoff_freq".into(), self.cutoff.to_value());
        params.insert("order".into(), json!(self.order));
    }

    pub fn design(&self) -> Result<FilterDesign, OperationError> {
        butterworth(self.order, self.filter_type, &self.cutoff.normalized())
    }
}

fn single_cutoff(filter_type: FilterType, raw: Option<&Value>) -> Result<Cutoff, ValidationError> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(Cutoff::Single(DEFAULT_CUTOFF)),
        Some(Value::Array(items)) if items.len() == 1 => coerce_number(&items[0]),
        Some(other) => coerce_number(other),
    };
    value.map(Cutoff::Single).ok_or_else(|| {
        ValidationError::invalid(
            "filter",
            format!(
                "cutoff_freq for {} must be a single number, got {}",
                filter_type.as_str(),
                raw.map(|v| v.to_string()).unwrap_or_default()
            ),
        )
    })
}

fn band_cutoff(filter_type: FilterType, raw: Option<&Value>) -> Cutoff {
    if let Some(Value::Array(items)) = raw {
        if let [lo, hi] = items.as_slice() {
            if let (Some(lo), Some(hi)) = (coerce_number(lo), coerce_number(hi)) {
                return Cutoff::Band(lo, hi);
            }
        }
    }
    warn!(
        "{} cutoff {} is not a [low, high] pair; using [{}, {}]",
        filter_type.as_str(),
        raw.map(|v| v.to_string()).unwrap_or_else(|| "(missing)".into()),
        DEFAULT_BAND.0,
        DEFAULT_BAND.1
    );
    Cutoff::Band(DEFAULT_BAND.0, DEFAULT_BAND.1)
}

fn check_range(filter_type: FilterType, cutoff: Cutoff) -> Result<(), ValidationError> {
    let in_range = |c: f64| c > 0.0 && c < NYQUIST;
    match cutoff {
        Cutoff::Single(c) if !in_range(c) => Err(ValidationError::invalid(
            "filter",
            format!("cutoff_freq must be between 0 and 0.5 (exclusive), got {}", c),
        )),
        Cutoff::Band(lo, hi) if !in_range(lo) || !in_range(hi) || lo >= hi => {
            Err(ValidationError::invalid(
                "filter",
                format!(
                    "{} cutoff must satisfy 0 < low < high < 0.5, got {}",
                    filter_type.as_str(),
                    format_pair(lo, hi)
                ),
            ))
        }
        _ => Ok(()),
    }
}

/// Transfer function coefficients, `a[0] == 1`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDesign {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

/// Digital Butterworth design. `wn` holds one (lowpass/highpass) or two
/// (bandpass/bandstop) critical frequencies normalized to (0, 1), where 1 is
/// the Nyquist frequency.
pub fn butterworth(
    order: usize,
    filter_type: FilterType,
    wn: &[f64],
) -> Result<FilterDesign, OperationError> {
    if order == 0 {
        return Err(OperationError::InvalidInput("filter order must be at least 1".into()));
    }
    let expected = if filter_type.is_band() { 2 } else { 1 };
    if wn.len() != expected || wn.iter().any(|w| !(*w > 0.0 && *w < 1.0)) {
        return Err(OperationError::InvalidInput(format!(
            "{} needs {} critical frequencies in (0, 1), got {:?}",
            filter_type.as_str(),
            expected,
            wn
        )));
    }

    // Analog prototype: poles on the left half of the unit circle, unit gain.
    let n = order as f64;
    let prototype: Vec<Complex64> = (0..order)
        .map(|i| {
            let m = -n + 1.0 + 2.0 * i as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();

    // Pre-warp for the bilinear transform at fs = 2.
    let warp = |w: f64| 4.0 * (PI * w / 2.0).tan();
    let inverse_gain = || {
        let prod: Complex64 = prototype.iter().map(|p| -*p).product();
        (Complex64::new(1.0, 0.0) / prod).re
    };

    let (zeros, poles, gain): (Vec<Complex64>, Vec<Complex64>, f64) = match filter_type {
        FilterType::Lowpass => {
            let wo = warp(wn[0]);
            let poles = prototype.iter().map(|p| *p * wo).collect();
            (Vec::new(), poles, wo.powi(order as i32))
        }
        FilterType::Highpass => {
            let wo = warp(wn[0]);
            let poles = prototype.iter().map(|p| wo / *p).collect();
            (vec![Complex64::new(0.0, 0.0); order], poles, inverse_gain())
        }
        FilterType::Bandpass => {
            let (w1, w2) = (warp(wn[0]), warp(wn[1]));
            let bw = w2 - w1;
            let wo = (w1 * w2).sqrt();
            let scaled: Vec<Complex64> = prototype.iter().map(|p| *p * (bw / 2.0)).collect();
            (
                vec![Complex64::new(0.0, 0.0); order],
                split_poles(&scaled, wo),
                bw.powi(order as i32),
            )
        }
        FilterType::Bandstop => {
            let (w1, w2) = (warp(wn[0]), warp(wn[1]));
            let bw = w2 - w1;
            let wo = (w1 * w2).sqrt();
            let inverted: Vec<Complex64> = prototype.iter().map(|p| (bw / 2.0) / *p).collect();
            let mut zeros = vec![Complex64::new(0.0, wo); order];
            zeros.extend(std::iter::repeat(Complex64::new(0.0, -wo)).take(order));
            (zeros, split_poles(&inverted, wo), inverse_gain())
        }
    };

    let (zeros, poles, gain) = bilinear(&zeros, &poles, gain);
    let b = poly(&zeros).into_iter().map(|c| c.re * gain).collect();
    let a = poly(&poles).into_iter().map(|c| c.re).collect();
    Ok(FilterDesign { b, a })
}

/// `p ± sqrt(p² - wo²)`, all `+` roots first.
fn split_poles(poles: &[Complex64], wo: f64) -> Vec<Complex64> {
    let wo2 = Complex64::new(wo * wo, 0.0);
    let roots: Vec<Complex64> = poles.iter().map(|p| (*p * *p - wo2).sqrt()).collect();
    poles
        .iter()
        .zip(&roots)
        .map(|(p, r)| *p + *r)
        .chain(poles.iter().zip(&roots).map(|(p, r)| *p - *r))
        .collect()
}

fn bilinear(
    zeros: &[Complex64],
    poles: &[Complex64],
    gain: f64,
) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let fs2 = Complex64::new(4.0, 0.0);
    let degree = poles.len().saturating_sub(zeros.len());

    let mut z: Vec<Complex64> = zeros.iter().map(|z| (fs2 + *z) / (fs2 - *z)).collect();
    z.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));
    let p: Vec<Complex64> = poles.iter().map(|p| (fs2 + *p) / (fs2 - *p)).collect();

    let num: Complex64 = zeros.iter().map(|z| fs2 - *z).product();
    let den: Complex64 = poles.iter().map(|p| fs2 - *p).product();
    (z, p, gain * (num / den).re)
}

/// Monic polynomial coefficients (highest power first) from its roots.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, c) in coeffs.iter().enumerate() {
            next[i] += *c;
            next[i + 1] -= *c * *root;
        }
        coeffs = next;
    }
    coeffs
}

/// Zero-phase filtering with odd-extension padding of `3 * taps` samples.
pub fn filtfilt(design: &FilterDesign, x: &[f64]) -> Result<Vec<f64>, OperationError> {
    let (b, a) = normalize(design)?;
    let padlen = 3 * b.len();
    if x.len() <= padlen {
        return Err(OperationError::InsufficientSamples {
            operation: "filter".into(),
            needed: padlen + 1,
            found: x.len(),
        });
    }

    let ext = odd_extend(x, padlen);
    let zi = steady_state(&b, &a)?;

    let x0 = ext[0];
    let forward = lfilter(&b, &a, ext.iter().copied(), zi.iter().map(|z| z * x0).collect());
    let y0 = forward[forward.len() - 1];
    let mut backward = lfilter(
        &b,
        &a,
        forward.iter().rev().copied(),
        zi.iter().map(|z| z * y0).collect(),
    );
    backward.reverse();

    Ok(backward[padlen..backward.len() - padlen].to_vec())
}

/// Scale so that `a[0] == 1` and pad both sides to the same length.
fn normalize(design: &FilterDesign) -> Result<(Vec<f64>, Vec<f64>), OperationError> {
    let a0 = match design.a.first() {
        Some(a0) if *a0 != 0.0 => *a0,
        _ => {
            return Err(OperationError::InvalidInput(
                "leading denominator coefficient must be non-zero".into(),
            ))
        }
    };
    let taps = design.a.len().max(design.b.len());
    let mut b: Vec<f64> = design.b.iter().map(|v| v / a0).collect();
    let mut a: Vec<f64> = design.a.iter().map(|v| v / a0).collect();
    b.resize(taps, 0.0);
    a.resize(taps, 0.0);
    Ok((b, a))
}

fn odd_extend(x: &[f64], padlen: usize) -> Vec<f64> {
    let n = x.len();
    let (first, last) = (x[0], x[n - 1]);
    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));
    ext
}

/// Initial state for a unit-step input at steady state.
fn steady_state(b: &[f64], a: &[f64]) -> Result<Vec<f64>, OperationError> {
    let n = b.len();
    if n < 2 {
        return Ok(Vec::new());
    }
    let m = n - 1;
    let mut matrix = vec![vec![0.0; m]; m];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[i] = 1.0;
        row[0] += a[i + 1];
        if i + 1 < m {
            row[i + 1] -= 1.0;
        }
    }
    let rhs: Vec<f64> = (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();
    solve(matrix, rhs)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>, OperationError> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() < 1e-14 {
            return Err(OperationError::InvalidInput(
                "filter initial conditions are singular".into(),
            ));
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        let pivot_row = m[col].clone();
        let pivot_rhs = rhs[col];
        for row in col + 1..n {
            let factor = m[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[row][k] -= factor * pivot_row[k];
            }
            rhs[row] -= factor * pivot_rhs;
        }
    }

    let mut out = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * out[k]).sum();
        out[row] = (rhs[row] - tail) / m[row][row];
    }
    Ok(out)
}

/// Direct form II transposed.
fn lfilter(b: &[f64], a: &[f64], x: impl Iterator<Item = f64>, mut z: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    let mut out = Vec::new();
    for xi in x {
        let y = b[0] * xi + z.first().copied().unwrap_or(0.0);
        if n > 1 {
            for i in 0..n - 2 {
                z[i] = b[i + 1] * xi + z[i + 1] - a[i + 1] * y;
            }
            z[n - 2] = b[n - 1] * xi - a[n - 1] * y;
        }
        out.push(y);
    }
    out
}

pub struct FilterOperation;

impl SignalOperation for FilterOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Filter
    }

    fn summary(&self) -> &'static str {
        "Zero-phase Butterworth filter (cutoff as a fraction of the sample rate, below 0.5)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filter_type": {"type": "string", "enum": ["lowpass", "highpass", "bandpass", "bandstop"]},
                "cutoff_freq": {
                    "description": "number for lowpass/highpass, [low, high] for bandpass/bandstop",
                    "default": DEFAULT_CUTOFF
                },
                "order": {"type": "integer", "minimum": 1, "maximum": MAX_ORDER, "default": DEFAULT_ORDER}
            },
            "required": ["filter_type"]
        })
    }

    fn check(&self, params: &mut Parameters) -> Result<(), ValidationError> {
        let spec = FilterSpec::from_params(params)?;
        spec.write_params(params);
        Ok(())
    }

    fn execute(
        &self,
        inputs: &[&Signal],
        params: &Parameters,
    ) -> Result<OperationResult, OperationError> {
        let signal = single_input(inputs, self.kind())?;
        let spec = FilterSpec::from_params(params)?;
        let design = spec.design()?;
        let data = filtfilt(&design, &signal.samples)?;

        let mut resolved = params.clone();
        spec.write_params(&mut resolved);
        Ok(OperationResult::new(
            self.kind(),
            &[signal.name.as_str()],
            &resolved,
            format!(
                "{} filtered {} with cutoff {}, order {}",
                spec.filter_type.label(),
                signal.name,
                spec.cutoff.describe(),
                spec.order
            ),
            data,
        ))
    }
}
