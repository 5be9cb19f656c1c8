use std::fmt;
use std::str::FromStr;

use crate::naming::{NamingConvention, is_line_reserved, sanitize};
use crate::protocol::{LineType, MetricId, Statistic};

/// Maps a meter identity to the name written on the wire.
///
/// The mapper receives the naming convention of the configured flavor so it can apply it.
pub type NameMapper = std::sync::Arc<dyn Fn(&MetricId, NamingConvention) -> String + Send + Sync>;

/// A single line to render, with its value already formatted.
#[derive(Clone, Copy, Debug)]
pub struct Line<'a> {
    /// The identity of the meter.
    pub id: &'a MetricId,
    /// The role of this line within the meter's snapshot.
    pub statistic: Option<Statistic>,
    /// The formatted value.
    pub value: &'a str,
    /// The unit suffix.
    pub line_type: LineType,
}

/// Renders lines in the syntax of one StatsD dialect.
pub trait FlavorFormat: Send + Sync {
    /// The naming convention applied to names and tag keys.
    fn naming_convention(&self) -> NamingConvention;

    /// Renders a line, using `mapper` instead of the default name if given.
    fn render(&self, line: &Line<'_>, mapper: Option<&NameMapper>) -> String;
}

/// An error returned when parsing an unknown [`Flavor`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown statsd flavor '{0}', expected one of etsy, datadog, telegraf, sysdig")]
pub struct ParseFlavorError(String);

/// The StatsD dialect lines are written in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Flavor {
    /// Hierarchical names without tags.
    ///
    /// ```text
    /// myCounter.myTag.val.statistic.count:2|c
    /// ```
    Etsy,
    /// Tags appended after `|#`.
    ///
    /// ```text
    /// my.counter:2|c|#statistic:count,my.tag:val
    /// ```
    #[default]
    Datadog,
    /// InfluxDB line style tags appended to the name.
    ///
    /// ```text
    /// my_counter,statistic=count,my_tag=val:2|c
    /// ```
    Telegraf,
    /// Tags appended to the name after `#`.
    ///
    /// ```text
    /// my.counter#statistic=count,my.tag=val:2|c
    /// ```
    Sysdig,
}

impl Flavor {
    /// All supported flavors.
    pub const ALL: [Flavor; 4] = [Self::Etsy, Self::Datadog, Self::Telegraf, Self::Sysdig];

    /// Returns the lowercase name of this flavor.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Etsy => "etsy",
            Self::Datadog => "datadog",
            Self::Telegraf => "telegraf",
            Self::Sysdig => "sysdig",
        }
    }

    /// Returns the rendering strategy of this flavor.
    pub fn format(&self) -> &'static dyn FlavorFormat {
        match self {
            Self::Etsy => &EtsyFormat,
            Self::Datadog => &DatadogFormat,
            Self::Telegraf => &TelegrafFormat,
            Self::Sysdig => &SysdigFormat,
        }
    }

    /// Returns the default naming convention of this flavor.
    pub fn naming_convention(&self) -> NamingConvention {
        self.format().naming_convention()
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flavor {
    type Err = ParseFlavorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "etsy" => Self::Etsy,
            "datadog" => Self::Datadog,
            "telegraf" => Self::Telegraf,
            "sysdig" => Self::Sysdig,
            _ => return Err(ParseFlavorError(s.to_owned())),
        })
    }
}

tally_common::impl_str_serde!(Flavor, "a statsd flavor");

/// Converts and sanitizes tags, with the statistic as the first entry.
fn tag_entries(
    line: &Line<'_>,
    convention: NamingConvention,
    reserved: fn(char) -> bool,
    separator: char,
) -> Vec<String> {
    let statistic = line
        .statistic
        .map(|s| (s.tag_key().to_owned(), s.tag_value()));

    statistic
        .into_iter()
        .chain(line.id.tags().iter().cloned())
        .map(|(key, value)| {
            (
                sanitize(&convention.tag_key(&key), reserved),
                sanitize(&convention.tag_value(&value), reserved),
            )
        })
        .map(|(key, value)| format!("{key}{separator}{value}"))
        .collect()
}

fn base_name(line: &Line<'_>, convention: NamingConvention, mapper: Option<&NameMapper>) -> String {
    match mapper {
        Some(mapper) => mapper(line.id, convention),
        None => convention.name(line.id.name()),
    }
}

#[derive(Debug)]
struct EtsyFormat;

impl EtsyFormat {
    fn is_reserved(c: char) -> bool {
        is_line_reserved(c)
    }

    /// Tag keys and values become single segments of the hierarchy.
    fn is_segment_reserved(c: char) -> bool {
        Self::is_reserved(c) || matches!(c, '.' | ' ')
    }

    fn hierarchical_name(
        id: &MetricId,
        statistic: Option<Statistic>,
        convention: NamingConvention,
    ) -> String {
        let mut name = sanitize(&convention.name(id.name()), Self::is_reserved);

        for (key, value) in id.tags() {
            name.push('.');
            name.push_str(&sanitize(&convention.tag_key(key), Self::is_segment_reserved));
            name.push('.');
            name.push_str(&sanitize(
                &convention.tag_value(value),
                Self::is_segment_reserved,
            ));
        }

        // Bucket boundaries keep their decimal point.
        if let Some(statistic) = statistic {
            name.push('.');
            name.push_str(statistic.tag_key());
            name.push('.');
            name.push_str(&statistic.tag_value());
        }

        name
    }
}

impl FlavorFormat for EtsyFormat {
    fn naming_convention(&self) -> NamingConvention {
        NamingConvention::CamelCase
    }

    fn render(&self, line: &Line<'_>, mapper: Option<&NameMapper>) -> String {
        let convention = self.naming_convention();

        let name = match mapper {
            Some(mapper) => {
                let id = match line.statistic {
                    Some(statistic) => line
                        .id
                        .clone()
                        .with_tag(statistic.tag_key(), statistic.tag_value()),
                    None => line.id.clone(),
                };
                sanitize(&mapper(&id, convention), Self::is_reserved)
            }
            None => Self::hierarchical_name(line.id, line.statistic, convention),
        };

        format!("{name}:{}|{}", line.value, line.line_type)
    }
}

#[derive(Debug)]
struct DatadogFormat;

impl DatadogFormat {
    fn is_reserved(c: char) -> bool {
        is_line_reserved(c) || matches!(c, ',' | '#')
    }
}

impl FlavorFormat for DatadogFormat {
    fn naming_convention(&self) -> NamingConvention {
        NamingConvention::Dot
    }

    fn render(&self, line: &Line<'_>, mapper: Option<&NameMapper>) -> String {
        let convention = self.naming_convention();
        let name = sanitize(&base_name(line, convention, mapper), Self::is_reserved);
        let tags = tag_entries(line, convention, Self::is_reserved, ':');

        let mut result = format!("{name}:{}|{}", line.value, line.line_type);
        if !tags.is_empty() {
            result.push_str("|#");
            result.push_str(&tags.join(","));
        }

        result
    }
}

#[derive(Debug)]
struct TelegrafFormat;

impl TelegrafFormat {
    fn is_reserved(c: char) -> bool {
        is_line_reserved(c) || matches!(c, ',' | '=' | ' ')
    }
}

impl FlavorFormat for TelegrafFormat {
    fn naming_convention(&self) -> NamingConvention {
        NamingConvention::SnakeCase
    }

    fn render(&self, line: &Line<'_>, mapper: Option<&NameMapper>) -> String {
        let convention = self.naming_convention();
        let mut result = sanitize(&base_name(line, convention, mapper), Self::is_reserved);

        for tag in tag_entries(line, convention, Self::is_reserved, '=') {
            result.push(',');
            result.push_str(&tag);
        }

        result.push(':');
        result.push_str(line.value);
        result.push('|');
        result.push_str(line.line_type.as_str());
        result
    }
}

#[derive(Debug)]
struct SysdigFormat;

impl SysdigFormat {
    fn is_reserved(c: char) -> bool {
        is_line_reserved(c) || matches!(c, ',' | '=' | ' ' | '#')
    }
}

impl FlavorFormat for SysdigFormat {
    fn naming_convention(&self) -> NamingConvention {
        NamingConvention::Dot
    }

    fn render(&self, line: &Line<'_>, mapper: Option<&NameMapper>) -> String {
        let convention = self.naming_convention();
        let mut result = sanitize(&base_name(line, convention, mapper), Self::is_reserved);

        let tags = tag_entries(line, convention, Self::is_reserved, '=');
        if !tags.is_empty() {
            result.push('#');
            result.push_str(&tags.join(","));
        }

        result.push(':');
        result.push_str(line.value);
        result.push('|');
        result.push_str(line.line_type.as_str());
        result
    }
}
