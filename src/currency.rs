//! Yen formatting for amounts shown to people.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};

/// Format a yen amount with thousands separators, e.g. `1,234円`.
///
/// Yen has no minor unit, so fractions are rounded away. Totals tainted by a
/// non-numeric amount are shown as `-`.
pub fn format_yen(amount: f64) -> String {
    static FMT: OnceLock<Formatter> = OnceLock::new();

    if !amount.is_finite() {
        return "-".to_owned();
    }

    let rounded = amount.round();
    if rounded == 0.0 {
        // numfmt renders zero as "0" without the suffix
        return "0円".to_owned();
    }

    let fmt = FMT.get_or_init(|| {
        Formatter::new()
            .separator(',')
            .unwrap_or_else(|_| Formatter::new())
            .precision(Precision::Decimals(0))
    });

    let sign = if rounded < 0.0 { "-" } else { "" };

    format!("{sign}{}円", fmt.fmt_string(rounded.abs()))
}
