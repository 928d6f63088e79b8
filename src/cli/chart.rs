use super::ui;
use crate::core::config::AppConfig;
use crate::core::transform::chart_rows;
use crate::core::{ApiResponse, ChartRow, Denominator, TransformParams};
use anyhow::{Context, Result, bail};
use comfy_table::Cell;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChartOptions {
    pub params: TransformParams,
    pub json: bool,
}

pub fn run(config: &AppConfig, response: &ApiResponse, options: &ChartOptions) -> Result<()> {
    if !response.success {
        bail!(
            "Failed to load series: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    let asset_keys = config.asset_keys();
    let rows = chart_rows(response.rows(), &asset_keys, options.params);

    if options.json {
        let json = serde_json::to_string_pretty(&rows).context("Failed to serialize chart rows")?;
        println!("{json}");
    } else {
        println!(
            "{}",
            display_chart(&rows, &asset_keys, options.params, response.is_fallback)
        );
    }
    Ok(())
}

fn format_value(value: f64) -> String {
    if value.abs() < 10.0 {
        format!("{value:.4}")
    } else {
        format!("{value:.2}")
    }
}

fn title(params: &TransformParams) -> String {
    let unit = match params.denominator {
        Denominator::Usd => "Priced in USD".to_string(),
        Denominator::Gold => "Priced in ounces of gold".to_string(),
        Denominator::Houses => "Priced in Case-Shiller home index units".to_string(),
        Denominator::Pce => "Priced in end-of-period dollars (PCE)".to_string(),
    };
    let indexed = if params.indexed {
        ", indexed to 100"
    } else {
        ""
    };
    format!("{unit}{indexed} [{}]", params.range)
}

/// Renders chart rows as a table, one column per asset.
pub fn display_chart(
    rows: &[ChartRow],
    asset_keys: &[String],
    params: TransformParams,
    is_fallback: bool,
) -> String {
    let mut table = ui::new_styled_table();

    let mut header = vec![ui::header_cell("Month")];
    header.extend(asset_keys.iter().map(|k| ui::header_cell(k)));
    table.set_header(header);

    for row in rows {
        let mut cells = vec![Cell::new(row.date.to_string())];
        cells.extend(
            asset_keys
                .iter()
                .map(|k| ui::format_optional_cell(row.get(k), format_value)),
        );
        table.add_row(cells);
    }

    let mut output = String::new();
    if is_fallback {
        output.push_str(&ui::style_text(
            "Live data unavailable: showing synthetic placeholder values",
            ui::StyleType::Warning,
        ));
        output.push_str("\n\n");
    }
    output.push_str(&ui::style_text(&title(&params), ui::StyleType::Title));
    output.push_str("\n\n");
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n{}",
        ui::style_text(&format!("{} months", rows.len()), ui::StyleType::Subtle)
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MergedRow, MonthKey, TimeRange};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn row(month: u32, sp500: f64, gold: Option<f64>) -> ChartRow {
        let mut values = BTreeMap::new();
        values.insert("SP500".to_string(), Some(sp500));
        values.insert("GOLD".to_string(), gold);
        ChartRow {
            date: MonthKey::new(2024, month).unwrap(),
            values,
        }
    }

    #[test]
    fn test_display_chart_lists_every_month_and_asset() {
        let rows = vec![row(1, 4700.5, Some(2050.0)), row(2, 4900.25, None)];
        let keys = vec!["SP500".to_string(), "GOLD".to_string()];
        let output = display_chart(&rows, &keys, TransformParams::default(), false);

        assert!(output.contains("Priced in USD [all]"));
        assert!(output.contains("2024-01"));
        assert!(output.contains("2024-02"));
        assert!(output.contains("4700.50"));
        assert!(output.contains("N/A"));
        assert!(output.contains("2 months"));
        assert!(!output.contains("synthetic"));
    }

    #[test]
    fn test_display_chart_flags_fallback_data() {
        let params = TransformParams {
            denominator: Denominator::Gold,
            range: TimeRange::Months(12),
            indexed: true,
        };
        let output = display_chart(&[row(1, 2.345678, Some(1.0))], &["SP500".to_string()], params, true);
        assert!(output.contains("synthetic placeholder"));
        assert!(output.contains("ounces of gold, indexed to 100 [12M]"));
        assert!(output.contains("2.3457"));
    }

    #[test]
    fn test_run_rejects_failed_response() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let response = ApiResponse::failure(&anyhow::anyhow!("boom"), now);
        let err = run(&AppConfig::default(), &response, &ChartOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to load series: boom");
    }

    #[test]
    fn test_run_renders_successful_response() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut values = BTreeMap::new();
        values.insert("SP500".to_string(), Some(100.0));
        let data = vec![MergedRow {
            date: MonthKey::new(2023, 12).unwrap(),
            values,
        }];
        let response = ApiResponse::success(data, BTreeMap::new(), now);
        let options = ChartOptions {
            json: true,
            ..Default::default()
        };
        assert!(run(&AppConfig::default(), &response, &options).is_ok());
    }
}
