// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Stateful IIR filters: a generic `(b, a)` direct-form-II-transposed
//! filter, biquad sections, Butterworth cascades and the resonant peak
//! filter used for pilot extraction.
//!
//! Every filter keeps its delay line between calls, so feeding a signal
//! in chunks gives exactly the same output as feeding it whole. Call
//! `reset()` to start an independent run.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::{Error, Result};

/// Evaluate `sum(c[k] * z^-k)` at `z^-1 = zinv`.
fn poly_at(coeffs: &[f64], zinv: Complex64) -> Complex64 {
    coeffs
        .iter()
        .rev()
        .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * zinv + c)
}

fn unit_delay(freq_hz: f64, sample_rate: f64) -> Complex64 {
    Complex64::from_polar(1.0, -2.0 * PI * freq_hz / sample_rate)
}

/// True when every root of `a` (in `z^-1` form) lies strictly inside the
/// unit circle. Schur-Cohn step-down recursion.
pub fn poles_inside_unit_circle(a: &[f64]) -> bool {
    let mut poly: Vec<f64> = a.to_vec();
    while poly.len() > 1 && poly[poly.len() - 1] == 0.0 {
        poly.pop();
    }
    if poly.is_empty() || poly[0] == 0.0 {
        return false;
    }
    while poly.len() > 1 {
        let n = poly.len() - 1;
        let k = poly[n] / poly[0];
        if k.abs() >= 1.0 {
            return false;
        }
        let scale = 1.0 / (1.0 - k * k);
        poly = (0..n)
            .map(|i| (poly[i] - k * poly[n - i]) * scale)
            .collect();
    }
    true
}

/// Linear time-invariant IIR filter defined by feed-forward `b` and
/// feed-back `a` coefficients, `a[0]` normalised to 1.
#[derive(Debug, Clone)]
pub struct IirFilter {
    b: Vec<f64>,
    a: Vec<f64>,
    z: Vec<f64>,
}

impl IirFilter {
    pub fn new(b: &[f64], a: &[f64]) -> Result<Self> {
        if b.is_empty() || a.is_empty() {
            return Err(Error::InvalidConfig(
                "IIR filter needs at least one b and one a coefficient".into(),
            ));
        }
        let a0 = a[0];
        if a0 == 0.0 || !a0.is_finite() {
            return Err(Error::InvalidConfig("IIR filter a[0] must be non-zero".into()));
        }
        let order = b.len().max(a.len());
        let mut bn = vec![0.0; order];
        let mut an = vec![0.0; order];
        for (dst, &src) in bn.iter_mut().zip(b) {
            *dst = src / a0;
        }
        for (dst, &src) in an.iter_mut().zip(a) {
            *dst = src / a0;
        }
        Ok(Self {
            b: bn,
            a: an,
            z: vec![0.0; order - 1],
        })
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn a(&self) -> &[f64] {
        &self.a
    }

    pub fn is_stable(&self) -> bool {
        poles_inside_unit_circle(&self.a)
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        let n = self.b.len();
        let y = self.b[0] * x + self.z.first().copied().unwrap_or(0.0);
        if n > 1 {
            for i in 0..n - 2 {
                self.z[i] = self.b[i + 1] * x + self.z[i + 1] - self.a[i + 1] * y;
            }
            self.z[n - 2] = self.b[n - 1] * x - self.a[n - 1] * y;
        }
        y
    }

    pub fn process(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&x| self.process_sample(x)).collect()
    }

    pub fn reset(&mut self) {
        self.z.fill(0.0);
    }

    pub fn response(&self, freq_hz: f64, sample_rate: f64) -> Complex64 {
        let zinv = unit_delay(freq_hz, sample_rate);
        poly_at(&self.b, zinv) / poly_at(&self.a, zinv)
    }
}

/// Second-order section in direct form II transposed. First-order
/// sections are stored with `b2 = a2 = 0`.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

fn clamp_freq(freq_hz: f64, sample_rate: f64) -> f64 {
    freq_hz.clamp(1e-3, sample_rate * 0.499)
}

impl Biquad {
    fn from_coeffs(b: [f64; 3], a: [f64; 3]) -> Self {
        let inv_a0 = 1.0 / a[0];
        Self {
            b0: b[0] * inv_a0,
            b1: b[1] * inv_a0,
            b2: b[2] * inv_a0,
            a1: a[1] * inv_a0,
            a2: a[2] * inv_a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// RBJ low-pass with bilinear prewarp at the cutoff.
    pub fn lowpass(sample_rate: f64, cutoff_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * clamp_freq(cutoff_hz, sample_rate) / sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        let cos_w0 = w0.cos();
        Self::from_coeffs(
            [(1.0 - cos_w0) * 0.5, 1.0 - cos_w0, (1.0 - cos_w0) * 0.5],
            [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
        )
    }

    /// RBJ high-pass with bilinear prewarp at the cutoff.
    pub fn highpass(sample_rate: f64, cutoff_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * clamp_freq(cutoff_hz, sample_rate) / sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        let cos_w0 = w0.cos();
        Self::from_coeffs(
            [(1.0 + cos_w0) * 0.5, -(1.0 + cos_w0), (1.0 + cos_w0) * 0.5],
            [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
        )
    }

    /// Bilinear transform of the analog one-pole low-pass `wc / (s + wc)`.
    pub fn first_order_lowpass(sample_rate: f64, cutoff_hz: f64) -> Self {
        let k = (PI * clamp_freq(cutoff_hz, sample_rate) / sample_rate).tan();
        Self::from_coeffs([k, k, 0.0], [1.0 + k, k - 1.0, 0.0])
    }

    /// Bilinear transform of the analog one-pole high-pass `s / (s + wc)`.
    pub fn first_order_highpass(sample_rate: f64, cutoff_hz: f64) -> Self {
        let k = (PI * clamp_freq(cutoff_hz, sample_rate) / sample_rate).tan();
        Self::from_coeffs([1.0, -1.0, 0.0], [1.0 + k, k - 1.0, 0.0])
    }

    /// Resonant peak: unity gain and zero phase at `center_hz`, -3 dB
    /// bandwidth `center_hz / q`, zeros at DC and Nyquist.
    pub fn peak(sample_rate: f64, center_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * clamp_freq(center_hz, sample_rate) / sample_rate;
        let bw = w0 / q.max(1e-3);
        let beta = (bw / 2.0).tan();
        let gain = 1.0 / (1.0 + beta);
        Self::from_coeffs(
            [1.0 - gain, 0.0, -(1.0 - gain)],
            [1.0, -2.0 * gain * w0.cos(), 2.0 * gain - 1.0],
        )
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    pub fn process(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&x| self.process_sample(x)).collect()
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    pub fn is_stable(&self) -> bool {
        poles_inside_unit_circle(&[1.0, self.a1, self.a2])
    }

    pub fn response(&self, freq_hz: f64, sample_rate: f64) -> Complex64 {
        let zinv = unit_delay(freq_hz, sample_rate);
        poly_at(&[self.b0, self.b1, self.b2], zinv) / poly_at(&[1.0, self.a1, self.a2], zinv)
    }
}

/// Cascade of [`Biquad`] sections.
#[derive(Debug, Clone, Default)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

/// Q of each conjugate pole pair of an order-`order` Butterworth prototype.
fn butterworth_qs(order: usize) -> Vec<f64> {
    let n = order as f64;
    (0..order / 2)
        .map(|k| {
            let angle = PI * (n - 1.0 - 2.0 * k as f64) / (2.0 * n);
            1.0 / (2.0 * angle.cos())
        })
        .collect()
}

impl SosFilter {
    pub fn new(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    pub fn butterworth_lowpass(order: usize, cutoff_hz: f64, sample_rate: f64) -> Self {
        let mut sections: Vec<Biquad> = butterworth_qs(order)
            .into_iter()
            .map(|q| Biquad::lowpass(sample_rate, cutoff_hz, q))
            .collect();
        if order % 2 == 1 {
            sections.push(Biquad::first_order_lowpass(sample_rate, cutoff_hz));
        }
        Self { sections }
    }

    pub fn butterworth_highpass(order: usize, cutoff_hz: f64, sample_rate: f64) -> Self {
        let mut sections: Vec<Biquad> = butterworth_qs(order)
            .into_iter()
            .map(|q| Biquad::highpass(sample_rate, cutoff_hz, q))
            .collect();
        if order % 2 == 1 {
            sections.push(Biquad::first_order_highpass(sample_rate, cutoff_hz));
        }
        Self { sections }
    }

    /// Band-pass as a low-pass at `high_hz` cascaded with a high-pass at
    /// `low_hz`, both of the given order.
    pub fn butterworth_bandpass(order: usize, low_hz: f64, high_hz: f64, sample_rate: f64) -> Self {
        let mut sections = Self::butterworth_lowpass(order, high_hz, sample_rate).sections;
        sections.extend(Self::butterworth_highpass(order, low_hz, sample_rate).sections);
        Self { sections }
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(x, |acc, section| section.process_sample(acc))
    }

    pub fn process(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&x| self.process_sample(x)).collect()
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(Biquad::is_stable)
    }

    pub fn response(&self, freq_hz: f64, sample_rate: f64) -> Complex64 {
        self.sections
            .iter()
            .map(|s| s.response(freq_hz, sample_rate))
            .product()
    }

    /// Group delay in samples at `freq_hz`, by central difference of the
    /// phase response.
    pub fn group_delay(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let df = sample_rate * 1e-6;
        let lo = self.response(freq_hz - df, sample_rate);
        let hi = self.response(freq_hz + df, sample_rate);
        let dphi = (hi / lo).arg();
        let dw = 2.0 * PI * 2.0 * df / sample_rate;
        -dphi / dw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 192_000.0;

    fn tone(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_iir_matches_direct_difference_equation() {
        let b = [0.2, 0.3];
        let a = [1.0, -0.5];
        let mut filter = IirFilter::new(&b, &a).unwrap();
        let x = [1.0, 0.0, 0.0, 2.0, -1.0];
        let y = filter.process(&x);
        let mut expected = Vec::new();
        let mut y1 = 0.0;
        let mut x1 = 0.0;
        for &xn in &x {
            let yn = 0.2 * xn + 0.3 * x1 + 0.5 * y1;
            expected.push(yn);
            y1 = yn;
            x1 = xn;
        }
        for (got, want) in y.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-12, "{got} != {want}");
        }
    }

    #[test]
    fn test_iir_normalises_a0() {
        let filter = IirFilter::new(&[2.0], &[2.0, -1.0]).unwrap();
        assert_eq!(filter.b(), &[1.0, 0.0]);
        assert_eq!(filter.a(), &[1.0, -0.5]);
        assert!(IirFilter::new(&[1.0], &[0.0, 1.0]).is_err());
    }

    #[test]
    fn test_chunked_processing_is_bit_identical() {
        let x = tone(1234.0, FS, 1000);
        let mut whole = SosFilter::butterworth_bandpass(5, 23_000.0, 53_000.0, FS);
        let mut chunked = whole.clone();
        let expected = whole.process(&x);
        let mut got = chunked.process(&x[..333]);
        got.extend(chunked.process(&x[333..334]));
        got.extend(chunked.process(&x[334..]));
        assert_eq!(got, expected);

        let mut iir = IirFilter::new(&[0.1, 0.2, 0.1], &[1.0, -0.9, 0.3]).unwrap();
        let mut iir_chunked = iir.clone();
        let expected = iir.process(&x);
        let mut got = iir_chunked.process(&x[..10]);
        got.extend(iir_chunked.process(&x[10..]));
        assert_eq!(got, expected);
    }

    #[test]
    fn test_reset_clears_history() {
        let x = tone(500.0, FS, 256);
        let mut filter = SosFilter::butterworth_lowpass(5, 15_000.0, FS);
        let first = filter.process(&x);
        filter.reset();
        assert_eq!(filter.process(&x), first);
    }

    #[test]
    fn test_butterworth_lowpass_half_power_at_cutoff() {
        for order in [2, 4, 5] {
            let filter = SosFilter::butterworth_lowpass(order, 15_000.0, FS);
            assert!(filter.is_stable());
            let at_cutoff = filter.response(15_000.0, FS).norm();
            assert!(
                (at_cutoff - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6,
                "order {order}: |H(fc)| = {at_cutoff}"
            );
            assert!((filter.response(0.0, FS).norm() - 1.0).abs() < 1e-9);
        }
        let fifth = SosFilter::butterworth_lowpass(5, 15_000.0, FS);
        assert!(fifth.response(38_000.0, FS).norm() < 0.01);
    }

    #[test]
    fn test_butterworth_highpass_half_power_at_cutoff() {
        let filter = SosFilter::butterworth_highpass(5, 23_000.0, FS);
        assert!(filter.is_stable());
        let at_cutoff = filter.response(23_000.0, FS).norm();
        assert!((at_cutoff - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(filter.response(1_000.0, FS).norm() < 1e-5);
    }

    #[test]
    fn test_bandpass_passes_subcarrier_band() {
        let mut filter = SosFilter::butterworth_bandpass(5, 23_000.0, 53_000.0, FS);
        assert!(filter.is_stable());
        assert!((filter.response(38_000.0, FS).norm() - 1.0).abs() < 0.01);
        assert!(filter.response(1_000.0, FS).norm() < 1e-4);
        assert!(filter.response(90_000.0, FS).norm() < 1e-3);

        let n = 19_200;
        let passed = filter.process(&tone(38_000.0, FS, n));
        filter.reset();
        let blocked = filter.process(&tone(5_000.0, FS, n));
        assert!(rms(&passed[n / 2..]) > 0.69);
        assert!(rms(&blocked[n / 2..]) < 0.01);
    }

    #[test]
    fn test_peak_filter_unity_zero_phase_at_center() {
        let peak = Biquad::peak(FS, 19_000.0, 30.0);
        assert!(peak.is_stable());
        let h = peak.response(19_000.0, FS);
        assert!((h.norm() - 1.0).abs() < 1e-9);
        assert!(h.arg().abs() < 1e-9);
        assert!(peak.response(0.0, FS).norm() < 1e-12);
        assert!(peak.response(15_000.0, FS).norm() < 0.1);
    }

    #[test]
    fn test_stability_check() {
        assert!(poles_inside_unit_circle(&[1.0, -0.5]));
        assert!(!poles_inside_unit_circle(&[1.0, -1.5]));
        assert!(!poles_inside_unit_circle(&[1.0, 0.0, -1.0]));
        assert!(IirFilter::new(&[1.0], &[1.0, -1.8, 0.81]).unwrap().is_stable());
        assert!(!IirFilter::new(&[1.0], &[1.0, -2.0, 1.1]).unwrap().is_stable());
    }

    #[test]
    fn test_group_delay_of_pure_delay() {
        let delay = SosFilter::new(vec![Biquad::from_coeffs(
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
        )]);
        assert!((delay.group_delay(10_000.0, FS) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_input() {
        let mut filter = SosFilter::butterworth_lowpass(5, 15_000.0, FS);
        assert!(filter.process(&[]).is_empty());
    }
}
