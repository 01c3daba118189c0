//! Shared statistical primitives used by the analysis stages.
//!
//! Everything here operates on plain `f64` slices already extracted from
//! the dataset. Distribution tail probabilities come from `statrs`; the
//! stages themselves stay free of distribution plumbing.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

use super::errors::{AnalyzerError, AnalyzerResult};

/// Arithmetic mean. Empty input is the caller's error to handle.
pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample variance (n-1 denominator). Requires n >= 2.
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    ss / (values.len() - 1) as f64
}

/// Sample standard deviation.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Standard error of the mean.
pub(crate) fn standard_error(values: &[f64]) -> f64 {
    sample_std(values) / (values.len() as f64).sqrt()
}

/// Upper-tail probability of the Student's t distribution.
fn t_sf(t: f64, df: f64) -> AnalyzerResult<f64> {
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| AnalyzerError::degenerate(format!("t distribution with df={df}: {e}")))?;
    Ok((1.0 - dist.cdf(t)).clamp(0.0, 1.0))
}

/// Upper-tail probability of the standard normal distribution.
pub(crate) fn normal_sf(z: f64) -> f64 {
    // Normal::new only fails for non-finite parameters.
    let dist = Normal::new(0.0, 1.0).expect("standard normal is well-defined");
    (1.0 - dist.cdf(z)).clamp(0.0, 1.0)
}

/// Upper-tail probability of the chi-squared distribution.
fn chi2_sf(stat: f64, df: f64) -> AnalyzerResult<f64> {
    let dist = ChiSquared::new(df)
        .map_err(|e| AnalyzerError::degenerate(format!("chi-squared with df={df}: {e}")))?;
    Ok((1.0 - dist.cdf(stat)).clamp(0.0, 1.0))
}

/// Result of a two-sample pooled-variance t-test.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TwoSampleT {
    pub t_statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: u64,
}

/// Two-sample independent t-test with pooled variance (equal-variance
/// assumption), first sample minus second.
///
/// Both samples need at least 2 observations. Zero pooled variance is not
/// an error: identical means give t=0 (p=1), differing means give an
/// infinite statistic (p=0).
pub(crate) fn pooled_t_test(first: &[f64], second: &[f64]) -> AnalyzerResult<TwoSampleT> {
    let (n1, n2) = (first.len(), second.len());
    if n1 < 2 || n2 < 2 {
        return Err(AnalyzerError::insufficient_data(format!(
            "t-test requires at least 2 observations per group (got {n1} and {n2})"
        )));
    }

    let df = (n1 + n2 - 2) as f64;
    let pooled_variance = ((n1 - 1) as f64 * sample_variance(first)
        + (n2 - 1) as f64 * sample_variance(second))
        / df;
    let se = (pooled_variance * (1.0 / n1 as f64 + 1.0 / n2 as f64)).sqrt();
    let diff = mean(first) - mean(second);

    if se == 0.0 {
        let (t, p) = if diff == 0.0 {
            (0.0, 1.0)
        } else {
            (diff.signum() * f64::INFINITY, 0.0)
        };
        return Ok(TwoSampleT {
            t_statistic: t,
            p_value: p,
            degrees_of_freedom: df as u64,
        });
    }

    let t = diff / se;
    let p = (2.0 * t_sf(t.abs(), df)?).clamp(0.0, 1.0);
    Ok(TwoSampleT {
        t_statistic: t,
        p_value: p,
        degrees_of_freedom: df as u64,
    })
}

/// Assigns midranks (average rank for ties) to the given values.
pub(crate) fn midranks(values: &[f64]) -> Vec<f64> {
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < indexed.len() {
        let mut j = i;
        while j < indexed.len() && indexed[j].1 == indexed[i].1 {
            j += 1;
        }
        // Average rank across the tied run, 1-based.
        let avg_rank = (i + j) as f64 / 2.0 + 0.5;
        for k in i..j {
            ranks[indexed[k].0] = avg_rank;
        }
        i = j;
    }
    ranks
}

/// Result of a two-sided Mann-Whitney U test.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MannWhitney {
    pub u_statistic: f64,
    pub p_value: f64,
}

/// Two-sided Mann-Whitney U test, U reported for the first sample.
///
/// The p-value uses the normal approximation with midrank tie correction
/// and a 0.5 continuity correction; no exact small-sample enumeration is
/// attempted.
pub(crate) fn mann_whitney_u(first: &[f64], second: &[f64]) -> AnalyzerResult<MannWhitney> {
    let (n1, n2) = (first.len() as f64, second.len() as f64);
    if first.is_empty() || second.is_empty() {
        return Err(AnalyzerError::insufficient_data(
            "Mann-Whitney U requires non-empty groups",
        ));
    }

    let mut combined = Vec::with_capacity(first.len() + second.len());
    combined.extend_from_slice(first);
    combined.extend_from_slice(second);
    let ranks = midranks(&combined);

    let r1: f64 = ranks[..first.len()].iter().sum();
    let u1 = r1 - n1 * (n1 + 1.0) / 2.0;

    let n = n1 + n2;
    let mu = n1 * n2 / 2.0;

    // Tie correction over rank runs.
    let mut sorted: Vec<f64> = combined.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let t = (j - i) as f64;
        tie_term += t * t * t - t;
        i = j;
    }

    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance <= 0.0 {
        // Every observation tied: no evidence either way.
        return Ok(MannWhitney {
            u_statistic: u1,
            p_value: 1.0,
        });
    }

    let z = ((u1 - mu).abs() - 0.5).max(0.0) / variance.sqrt();
    let p = (2.0 * normal_sf(z)).clamp(0.0, 1.0);
    Ok(MannWhitney {
        u_statistic: u1,
        p_value: p,
    })
}

/// Result of a chi-squared test of independence.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChiSquareTest {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: u64,
}

/// Pearson chi-squared test of independence over a contingency table of
/// counts (rows x columns), without continuity correction.
pub(crate) fn chi_square_independence(table: &[Vec<u64>]) -> AnalyzerResult<ChiSquareTest> {
    let r = table.len();
    let c = table.first().map(|row| row.len()).unwrap_or(0);
    if r < 2 || c < 2 {
        return Err(AnalyzerError::insufficient_data(
            "contingency table must be at least 2x2",
        ));
    }

    let mut row_sums = vec![0.0; r];
    let mut col_sums = vec![0.0; c];
    let mut total = 0.0;
    for (i, row) in table.iter().enumerate() {
        for (j, &count) in row.iter().enumerate() {
            row_sums[i] += count as f64;
            col_sums[j] += count as f64;
            total += count as f64;
        }
    }
    if total == 0.0 {
        return Err(AnalyzerError::insufficient_data(
            "contingency table has no observations",
        ));
    }

    let mut statistic = 0.0;
    for i in 0..r {
        for j in 0..c {
            let expected = row_sums[i] * col_sums[j] / total;
            if expected <= 0.0 {
                continue;
            }
            let observed = table[i][j] as f64;
            let d = observed - expected;
            statistic += d * d / expected;
        }
    }

    let df = ((r - 1) * (c - 1)) as f64;
    let p_value = chi2_sf(statistic, df)?;
    Ok(ChiSquareTest {
        statistic,
        p_value,
        degrees_of_freedom: df as u64,
    })
}
