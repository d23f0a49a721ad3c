use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const MAX_SIGNIFICANT_DIGITS: i32 = 3;
const MIN_SIGNIFICANT_DIGITS: i32 = 2;
const MAX_FRACTION_DIGITS: i32 = 8;
const COMPACT_STEP: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Locale {
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "de-DE")]
    DeDe,
    #[serde(rename = "fr-FR")]
    FrFr,
    #[serde(rename = "es-ES")]
    EsEs,
    #[serde(rename = "ru-RU")]
    RuRu,
}

struct CurrencyStyle {
    decimal_separator: char,
    group_separator: char,
    /// Index 0 is the unscaled form, then thousands, millions, billions, trillions.
    suffixes: [&'static str; 5],
    symbol: &'static str,
    symbol_first: bool,
}

const EN_STYLE: CurrencyStyle = CurrencyStyle {
    decimal_separator: '.',
    group_separator: ',',
    suffixes: ["", "K", "M", "B", "T"],
    symbol: "$",
    symbol_first: true,
};

const DE_STYLE: CurrencyStyle = CurrencyStyle {
    decimal_separator: ',',
    group_separator: '.',
    suffixes: ["", "\u{a0}Tsd.", "\u{a0}Mio.", "\u{a0}Mrd.", "\u{a0}Bio."],
    symbol: "$",
    symbol_first: false,
};

const FR_STYLE: CurrencyStyle = CurrencyStyle {
    decimal_separator: ',',
    group_separator: '\u{202f}',
    suffixes: ["", "\u{a0}k", "\u{a0}M", "\u{a0}Md", "\u{a0}Bn"],
    symbol: "$US",
    symbol_first: false,
};

const ES_STYLE: CurrencyStyle = CurrencyStyle {
    decimal_separator: ',',
    group_separator: '.',
    suffixes: ["", "\u{a0}mil", "\u{a0}M", "\u{a0}mil\u{a0}M", "\u{a0}B"],
    symbol: "US$",
    symbol_first: false,
};

const RU_STYLE: CurrencyStyle = CurrencyStyle {
    decimal_separator: ',',
    group_separator: '\u{a0}',
    suffixes: [
        "",
        "\u{a0}тыс.",
        "\u{a0}млн",
        "\u{a0}млрд",
        "\u{a0}трлн",
    ],
    symbol: "$",
    symbol_first: false,
};

impl Locale {
    pub const ALL: [Self; 5] = [Self::EnUs, Self::DeDe, Self::FrFr, Self::EsEs, Self::RuRu];

    pub const fn tag(self) -> &'static str {
        match self {
            Self::EnUs => "en-US",
            Self::DeDe => "de-DE",
            Self::FrFr => "fr-FR",
            Self::EsEs => "es-ES",
            Self::RuRu => "ru-RU",
        }
    }

    const fn currency_style(self) -> &'static CurrencyStyle {
        match self {
            Self::EnUs => &EN_STYLE,
            Self::DeDe => &DE_STYLE,
            Self::FrFr => &FR_STYLE,
            Self::EsEs => &ES_STYLE,
            Self::RuRu => &RU_STYLE,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown locale `{0}` (supported: {tags})", tags = supported_tags())]
pub struct UnknownLocale(pub String);

fn supported_tags() -> String {
    Locale::ALL
        .iter()
        .map(|locale| locale.tag())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for Locale {
    type Err = UnknownLocale;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let key = input.trim().to_lowercase().replace('_', "-");
        locale_aliases()
            .get(key.as_str())
            .copied()
            .ok_or_else(|| UnknownLocale(input.trim().to_string()))
    }
}

fn locale_aliases() -> &'static FxHashMap<&'static str, Locale> {
    static LOCALE_ALIASES: OnceLock<FxHashMap<&'static str, Locale>> = OnceLock::new();
    LOCALE_ALIASES.get_or_init(|| {
        [
            ("en", Locale::EnUs),
            ("en-us", Locale::EnUs),
            ("en-gb", Locale::EnUs),
            ("english", Locale::EnUs),
            ("de", Locale::DeDe),
            ("de-de", Locale::DeDe),
            ("de-at", Locale::DeDe),
            ("deutsch", Locale::DeDe),
            ("fr", Locale::FrFr),
            ("fr-fr", Locale::FrFr),
            ("français", Locale::FrFr),
            ("es", Locale::EsEs),
            ("es-es", Locale::EsEs),
            ("español", Locale::EsEs),
            ("ru", Locale::RuRu),
            ("ru-ru", Locale::RuRu),
            ("русский", Locale::RuRu),
        ]
        .into_iter()
        .collect()
    })
}

/// Formats a USD amount in compact notation (`$12.3B`, `1,5\u{a0}Mio.\u{a0}$`)
/// keeping between two and three significant digits.
pub fn format_compact_currency(value: f64, locale: Locale) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let style = locale.currency_style();
    let magnitude = value.abs();
    let last_scale = style.suffixes.len() - 1;

    let mut scale = 0;
    while scale < last_scale && magnitude >= COMPACT_STEP.powi(scale_exponent(scale + 1)) {
        scale += 1;
    }
    let mut digits = significant_digits(magnitude / COMPACT_STEP.powi(scale_exponent(scale)));
    if digits.rounded >= COMPACT_STEP && scale < last_scale {
        scale += 1;
        digits = significant_digits(magnitude / COMPACT_STEP.powi(scale_exponent(scale)));
    }

    let number = localize_digits(&digits.text, style);
    let sign = if value < 0.0 && digits.rounded > 0.0 {
        "-"
    } else {
        ""
    };
    let suffix = style.suffixes[scale];
    if style.symbol_first {
        format!("{sign}{}{number}{suffix}", style.symbol)
    } else {
        format!("{sign}{number}{suffix}\u{a0}{}", style.symbol)
    }
}

/// Swaps in the locale's decimal separator and groups integer digits past the largest suffix.
fn localize_digits(text: &str, style: &CurrencyStyle) -> String {
    let (integer, fraction) = text.split_once('.').unwrap_or((text, ""));
    let mut out = String::with_capacity(text.len() + integer.len() / 3);
    for (idx, digit) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            out.push(style.group_separator);
        }
        out.push(digit);
    }
    if !fraction.is_empty() {
        out.push(style.decimal_separator);
        out.push_str(fraction);
    }
    out
}

fn scale_exponent(scale: usize) -> i32 {
    i32::try_from(scale).unwrap_or(i32::MAX)
}

struct SignificantDigits {
    rounded: f64,
    text: String,
}

fn significant_digits(mantissa: f64) -> SignificantDigits {
    // Anything that rounds to zero at the finest displayed fraction is shown as zero.
    if mantissa < 0.5 * 10_f64.powi(-MAX_FRACTION_DIGITS) {
        return SignificantDigits {
            rounded: 0.0,
            text: "0.0".to_string(),
        };
    }

    let exponent = decimal_exponent(mantissa);
    let wanted = (MAX_SIGNIFICANT_DIGITS - 1 - exponent).max(0);
    let mut decimals = wanted.min(MAX_FRACTION_DIGITS);
    let mut rounded = round_to(mantissa, decimals);
    let rounded_exponent = decimal_exponent(rounded);
    if rounded_exponent > exponent && decimals == wanted && decimals > 0 {
        decimals -= 1;
        rounded = round_to(mantissa, decimals);
    }

    let min_decimals = (MIN_SIGNIFICANT_DIGITS - 1 - rounded_exponent).clamp(0, decimals);
    let precision = usize::try_from(decimals).unwrap_or_default();
    let mut text = format!("{rounded:.precision$}");
    let mut fraction_len = decimals;
    while fraction_len > min_decimals && text.ends_with('0') {
        text.pop();
        fraction_len -= 1;
    }
    if text.ends_with('.') {
        text.pop();
    }

    SignificantDigits { rounded, text }
}

#[allow(clippy::cast_possible_truncation)]
fn decimal_exponent(value: f64) -> i32 {
    value.abs().log10().floor() as i32
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Renders a percentage with two decimals, prefixing `+` only for strictly positive values.
pub fn format_percent_change(value: f64) -> String {
    if value > 0.0 {
        format!("+{value:.2}%")
    } else {
        format!("{value:.2}%")
    }
}
