//! Chart generation for the ledger.
//!
//! Charts are built as ECharts configurations with `charming` and handed to
//! the UI as JSON. Values are formatted with ECharts string templates only,
//! so the options stay plain JSON:
//! - **Member totals**: a bar per household member
//! - **Monthly totals**: household spending per month
//! - **Monthly member totals**: monthly spending stacked by member

use charming::{
    Chart,
    component::{Axis, Grid, Legend, Title},
    element::{
        AxisLabel, AxisPointer, AxisPointerType, AxisType, Emphasis, EmphasisFocus, ItemStyle,
        Tooltip, Trigger,
    },
    series::bar,
};

use crate::{
    ExpenseRecord, LedgerConfig,
    aggregation::{
        ChartPoint, order_by_members, sum_by_month, sum_by_month_and_name, sum_by_name,
        to_chart_series,
    },
};

/// Total spending per member, in the configured member order.
pub fn member_totals_chart(records: &[ExpenseRecord], config: &LedgerConfig) -> Chart {
    let series = order_by_members(to_chart_series(&sum_by_name(records)), &config.members);
    let (labels, values) = split_series(&series);

    let mut chart = base_chart("Spending by member", "All records");
    chart = chart.x_axis(Axis::new().type_(AxisType::Category).data(labels));

    // One series per member so each bar keeps the member's color.
    for (index, point) in series.iter().enumerate() {
        let mut data = vec![0.0; values.len()];
        data[index] = point.value;

        chart = chart.series(
            bar::Bar::new()
                .name(point.label.as_str())
                .stack("Members")
                .item_style(ItemStyle::new().color(config.color_for(&point.label).as_str()))
                .data(data),
        );
    }

    chart
}

/// Household spending per month, oldest month first.
pub fn monthly_totals_chart(records: &[ExpenseRecord]) -> Chart {
    let series = to_chart_series(&sum_by_month(records));
    let (labels, values) = split_series(&series);

    base_chart("Monthly spending", "All members")
        .x_axis(Axis::new().type_(AxisType::Category).data(labels))
        .series(bar::Bar::new().name("Total").data(values))
}

/// Monthly spending stacked by member.
///
/// Members without records in a month contribute zero to that month.
pub fn monthly_member_chart(records: &[ExpenseRecord], config: &LedgerConfig) -> Chart {
    let by_month = sum_by_month_and_name(records);
    let labels: Vec<String> = by_month.keys().cloned().collect();
    let members = order_by_members(to_chart_series(&sum_by_name(records)), &config.members);

    let mut chart = base_chart("Monthly spending", "Grouped by member")
        .legend(Legend::new().left(250).top("1%"))
        .x_axis(Axis::new().type_(AxisType::Category).data(labels));

    for member in members {
        let data: Vec<f64> = by_month
            .values()
            .map(|totals| totals.get(&member.label).copied().unwrap_or(0.0))
            .collect();

        chart = chart.series(
            bar::Bar::new()
                .name(member.label.as_str())
                .stack("Members")
                .emphasis(Emphasis::new().focus(EmphasisFocus::Series))
                .item_style(ItemStyle::new().color(config.color_for(&member.label).as_str()))
                .data(data),
        );
    }

    chart
}

const YEN_LABEL: &str = "{value}円";

fn base_chart(title: &str, subtitle: &str) -> Chart {
    Chart::new()
        .title(Title::new().text(title).subtext(subtitle).left(20).top("1%"))
        .tooltip(axis_tooltip())
        .grid(
            Grid::new()
                .left("3%")
                .right("4%")
                .bottom("3%")
                .top(90)
                .contain_label(true),
        )
        .y_axis(
            Axis::new()
                .type_(AxisType::Value)
                .axis_label(AxisLabel::new().formatter(YEN_LABEL)),
        )
}

fn split_series(series: &[ChartPoint]) -> (Vec<String>, Vec<f64>) {
    series
        .iter()
        .map(|point| (point.label.clone(), point.value))
        .unzip()
}

/// Creates a tooltip that highlights the hovered category.
fn axis_tooltip() -> Tooltip {
    Tooltip::new()
        .trigger(Trigger::Axis)
        .axis_pointer(AxisPointer::new().type_(AxisPointerType::Shadow))
}

#[cfg(test)]
mod tests {
    use crate::{ExpenseRecord, LedgerConfig, RecordId};

    use super::{member_totals_chart, monthly_member_chart, monthly_totals_chart};

    fn create_test_record(id: &str, name: &str, date: &str, amount: f64) -> ExpenseRecord {
        ExpenseRecord::from_draft(
            RecordId::new(id),
            ExpenseRecord::build(name, date, "食費", amount),
        )
    }

    fn get_test_records() -> Vec<ExpenseRecord> {
        vec![
            create_test_record("1", "ママ", "2024-01-05", 1000.0),
            create_test_record("2", "パパ", "2024-01-20", 500.0),
            create_test_record("3", "ママ", "2024-02-03", 2000.0),
        ]
    }

    #[test]
    fn member_chart_lists_members_in_configured_order() {
        let chart = member_totals_chart(&get_test_records(), &LedgerConfig::default());
        let json = chart.to_string();

        let mama = json.find("\"ママ\"").unwrap();
        let papa = json.find("\"パパ\"").unwrap();
        assert!(mama < papa, "ママ should come before パパ in {json}");
        assert!(!json.contains("はやと"));
    }

    #[test]
    fn member_chart_uses_member_colors() {
        let chart = member_totals_chart(&get_test_records(), &LedgerConfig::default());
        let json = chart.to_string();

        assert!(json.contains("#8884d8"));
        assert!(json.contains("#82ca9d"));
    }

    #[test]
    fn monthly_chart_labels_months_in_order() {
        let chart = monthly_totals_chart(&get_test_records());
        let json = chart.to_string();

        let january = json.find("\"2024-01\"").unwrap();
        let february = json.find("\"2024-02\"").unwrap();
        assert!(january < february);
        assert!(json.contains("1500"));
    }

    #[test]
    fn monthly_member_chart_has_series_per_member() {
        let chart = monthly_member_chart(&get_test_records(), &LedgerConfig::default());
        let json = chart.to_string();

        assert!(json.contains("\"ママ\""));
        assert!(json.contains("\"パパ\""));
        assert!(json.contains("\"Members\""));
        assert!(!json.contains("いちか"));
    }

    #[test]
    fn charts_serialize_as_plain_json() {
        let records = get_test_records();
        let config = LedgerConfig::default();

        for chart in [
            member_totals_chart(&records, &config),
            monthly_totals_chart(&records),
            monthly_member_chart(&records, &config),
        ] {
            let text = chart.to_string();
            let options: serde_json::Value = serde_json::from_str(&text)
                .unwrap_or_else(|error| panic!("invalid JSON ({error}): {text}"));

            assert_eq!(options["yAxis"]["axisLabel"]["formatter"], "{value}円");
            assert!(!text.contains("function"));
        }
    }

    #[test]
    fn empty_records_give_empty_charts() {
        let chart = monthly_member_chart(&[], &LedgerConfig::default());

        assert!(chart.to_string().contains("Monthly spending"));
    }
}
