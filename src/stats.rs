use crate::error::Insufficiency;
use crate::sources::{FeeEntry, TimeSeriesPoint};

/// Periods between the latest point and the baseline of the percent change.
pub const LOOKBACK_PERIODS: usize = 30;

pub const DEFAULT_EXCLUDED_FEE_ID: &str = "hermez";

pub fn latest_tvl(series: &[TimeSeriesPoint]) -> Result<f64, Insufficiency> {
    let last = series.last().ok_or(Insufficiency::EmptySeries)?;
    finite(last.value(), "latest TVL")
}

/// Change of the latest value against the one `lookback` periods earlier, in percent.
pub fn percent_change(series: &[TimeSeriesPoint], lookback: usize) -> Result<f64, Insufficiency> {
    let required = lookback + 1;
    if series.len() < required {
        return Err(Insufficiency::SeriesTooShort {
            required,
            actual: series.len(),
        });
    }

    let latest_idx = series.len() - 1;
    let latest = finite(series[latest_idx].value(), "latest TVL")?;
    let baseline = finite(series[latest_idx - lookback].value(), "baseline TVL")?;
    if baseline == 0.0 {
        return Err(Insufficiency::UnusableBaseline { baseline });
    }

    finite((latest - baseline) / baseline * 100.0, "percent change")
}

/// Latest TVL together with its change over `lookback` periods. The pair fails as a whole.
pub fn tvl_with_change(
    series: &[TimeSeriesPoint],
    lookback: usize,
) -> Result<(f64, f64), Insufficiency> {
    let latest = latest_tvl(series)?;
    let change = percent_change(series, lookback)?;
    Ok((latest, change))
}

pub fn average_fee(entries: &[FeeEntry], excluded_id: &str) -> Result<f64, Insufficiency> {
    let (sum, count) = entries
        .iter()
        .filter(|entry| entry.id != excluded_id)
        .fold((0.0, 0_u32), |(sum, count), entry| {
            (sum + entry.fee, count + 1)
        });
    if count == 0 {
        return Err(Insufficiency::EmptyFeeSet {
            excluded: excluded_id.to_string(),
        });
    }

    finite(sum / f64::from(count), "average fee")
}

fn finite(value: f64, field: &'static str) -> Result<f64, Insufficiency> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Insufficiency::NonFinite { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::format_percent_change;
    use crate::sources::Timestamp;

    fn series_from(values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(day, value)| {
                let timestamp = Timestamp::Unix(i64::try_from(day).unwrap() * 86_400);
                TimeSeriesPoint(timestamp, *value, 0.0)
            })
            .collect()
    }

    fn fee(id: &str, fee: f64) -> FeeEntry {
        FeeEntry {
            id: id.to_string(),
            fee,
        }
    }

    #[test]
    fn latest_tvl_reads_last_point() {
        let series = series_from(&[1.0, 2.0, 3.5]);
        assert!((latest_tvl(&series).unwrap() - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn latest_tvl_rejects_empty_series() {
        assert_eq!(latest_tvl(&[]), Err(Insufficiency::EmptySeries));
    }

    #[test]
    fn percent_change_over_lookback_window() {
        let mut values = vec![100.0];
        values.extend(std::iter::repeat_n(120.0, 29));
        values.push(150.0);
        let series = series_from(&values);
        assert_eq!(series.len(), 31);

        let change = percent_change(&series, LOOKBACK_PERIODS).unwrap();
        assert!((change - 50.0).abs() < 1e-9);
        assert_eq!(format_percent_change(change), "+50.00%");
    }

    #[test]
    fn percent_change_uses_point_thirty_periods_back_not_first() {
        let mut values = vec![1.0; 10];
        values.push(200.0);
        values.extend(std::iter::repeat_n(7.0, 29));
        values.push(100.0);
        let series = series_from(&values);

        let change = percent_change(&series, LOOKBACK_PERIODS).unwrap();
        assert!((change + 50.0).abs() < 1e-9);
        assert_eq!(format_percent_change(change), "-50.00%");
    }

    #[test]
    fn percent_change_requires_lookback_plus_one_points() {
        let series = series_from(&[10.0; 30]);
        assert_eq!(
            percent_change(&series, LOOKBACK_PERIODS),
            Err(Insufficiency::SeriesTooShort {
                required: 31,
                actual: 30
            })
        );
        assert_eq!(
            percent_change(&[], LOOKBACK_PERIODS),
            Err(Insufficiency::SeriesTooShort {
                required: 31,
                actual: 0
            })
        );
    }

    #[test]
    fn percent_change_rejects_zero_baseline() {
        let mut values = vec![0.0];
        values.extend(std::iter::repeat_n(5.0, 30));
        let series = series_from(&values);
        assert_eq!(
            percent_change(&series, LOOKBACK_PERIODS),
            Err(Insufficiency::UnusableBaseline { baseline: 0.0 })
        );
    }

    #[test]
    fn unchanged_series_has_no_plus_sign() {
        let series = series_from(&[42.0; 31]);
        let change = percent_change(&series, LOOKBACK_PERIODS).unwrap();
        assert_eq!(format_percent_change(change), "0.00%");
    }

    #[test]
    fn tvl_with_change_fails_as_a_pair_on_short_series() {
        let series = series_from(&[10.0, 20.0, 30.0]);
        assert_eq!(
            tvl_with_change(&series, LOOKBACK_PERIODS),
            Err(Insufficiency::SeriesTooShort {
                required: 31,
                actual: 3
            })
        );
        assert_eq!(
            tvl_with_change(&[], LOOKBACK_PERIODS),
            Err(Insufficiency::EmptySeries)
        );

        let flat = series_from(&[20.0; 31]);
        let (latest, change) = tvl_with_change(&flat, LOOKBACK_PERIODS).unwrap();
        assert!((latest - 20.0).abs() < f64::EPSILON);
        assert!(change.abs() < f64::EPSILON);
    }

    #[test]
    fn average_fee_skips_excluded_id() {
        let entries = [fee("a", 1.0), fee("hermez", 100.0), fee("b", 3.0)];
        let average = average_fee(&entries, DEFAULT_EXCLUDED_FEE_ID).unwrap();
        assert!((average - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn average_fee_of_empty_filtered_set_is_an_error() {
        let entries = [fee("hermez", 100.0)];
        assert_eq!(
            average_fee(&entries, "hermez"),
            Err(Insufficiency::EmptyFeeSet {
                excluded: "hermez".to_string()
            })
        );
        assert!(average_fee(&[], "hermez").is_err());
    }
}
