//! Human-readable presentation of collected measurements.

use std::fmt::{self, Write as _};

use crate::profiled::{CallArgs, CallKind};
use crate::stats::Stats;

/// Width of the quoted callable name in the compact line format.
const NAME_COLUMN_WIDTH: usize = 30;

/// Formats a byte quantity using binary units.
///
/// Values below one kibibyte print without decimals; larger values carry two.
///
/// ```
/// use usage_tracker::format_size;
///
/// assert_eq!(format_size(10.0), "10B");
/// assert_eq!(format_size(1024.0 * 1024.0), "1.00MB");
/// ```
#[must_use]
pub fn format_size(bytes: f64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    let mut value = bytes;
    let mut unit = 0;

    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{value:.0}B")
    } else {
        format!("{value:.2}{}", UNITS[unit])
    }
}

/// The resource usage attributed to one invocation of a tracked callable.
#[derive(Clone, Debug)]
pub struct Measurement {
    name: String,
    args: CallArgs,
    call_kind: CallKind,
    stats: Stats,
    io_supported: bool,
}

impl Measurement {
    pub(crate) fn new(
        name: String,
        args: CallArgs,
        call_kind: CallKind,
        stats: Stats,
        io_supported: bool,
    ) -> Self {
        Self {
            name,
            args,
            call_kind,
            stats,
            io_supported,
        }
    }

    /// Name of the tracked callable.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resource usage statistics of this invocation.
    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Whether the platform accounted for I/O during this invocation.
    #[must_use]
    pub fn io_supported(&self) -> bool {
        self.io_supported
    }

    /// The callable name, quoted and shortened to the compact column width.
    fn display_name(&self) -> String {
        // Two characters of the column go to the quotes.
        if self.name.chars().count() > NAME_COLUMN_WIDTH - 2 {
            let head: String = self.name.chars().take(NAME_COLUMN_WIDTH - 5).collect();
            format!("'{head}...'")
        } else {
            format!("'{}'", self.name)
        }
    }

    /// The itemized multi-line rendering used in verbose mode.
    #[must_use]
    pub fn verbose_to_string(&self) -> String {
        let mut out = String::new();

        // Writing to a String cannot fail.
        _ = writeln!(out, "***** Usage of {} *****", self.display_name());

        let shown_args = self.args.for_display(self.call_kind);
        if !shown_args.is_empty() {
            _ = writeln!(out, "Called with: {shown_args}");
        }

        _ = writeln!(out, "Maximum CPU usage: {:.2}%", self.stats.cpu_max());
        _ = writeln!(out, "Average CPU usage: {:.2}%", self.stats.cpu_avg());
        _ = writeln!(out, "Average memory usage: {:.2}%", self.stats.mem_avg());
        _ = writeln!(
            out,
            "Average RSS: {}",
            format_size(self.stats.rss_avg() as f64)
        );
        _ = writeln!(
            out,
            "Maximum RSS: {}",
            format_size(self.stats.rss_max() as f64)
        );
        _ = writeln!(
            out,
            "Average VMS: {}",
            format_size(self.stats.vms_avg() as f64)
        );
        _ = writeln!(
            out,
            "Maximum VMS: {}",
            format_size(self.stats.vms_max() as f64)
        );

        if self.io_supported {
            _ = writeln!(
                out,
                "IO reads: {} operations, {}",
                self.stats.read_count(),
                format_size(self.stats.read_bytes() as f64)
            );
            _ = writeln!(
                out,
                "IO writes: {} operations, {}",
                self.stats.write_count(),
                format_size(self.stats.write_bytes() as f64)
            );
        }

        _ = write!(out, "***** End of usage *****");

        out
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Function {:<width$} {:>8} avg of memory {:>8.2}% avg of CPU",
            self.display_name(),
            format_size(self.stats.rss_avg() as f64),
            self.stats.cpu_avg(),
            width = NAME_COLUMN_WIDTH,
        )?;

        if self.io_supported {
            write!(
                f,
                " {:>8} IO reads {:>8} IO writes",
                format_size(self.stats.read_bytes() as f64),
                format_size(self.stats.write_bytes() as f64),
            )?;
        }

        Ok(())
    }
}

/// A report of all measurements a session has recorded.
///
/// You can obtain an instance via `Session::to_report()`.
#[derive(Clone, Debug, Default)]
pub struct Report {
    measurements: Vec<Measurement>,
}

impl Report {
    pub(crate) fn new(measurements: Vec<Measurement>) -> Self {
        Self { measurements }
    }

    /// Whether anything has been recorded in this report.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// The recorded measurements, in recording order.
    #[must_use]
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Appends another report's measurements to this one.
    pub fn merge(&mut self, other: Report) {
        self.measurements.extend(other.measurements);
    }

    /// Prints the report to standard output.
    #[cfg_attr(test, mutants::skip)] // Too annoying to test stdout output.
    pub fn print_to_stdout(&self) {
        println!("{self}");
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for measurement in &self.measurements {
            writeln!(f, "{measurement}")?;
        }

        Ok(())
    }
}
