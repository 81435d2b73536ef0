use std::fmt::Display;

use clap::{error::ErrorKind, CommandFactory, Parser};

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program accepts raw complex baseband samples as interleaved signed 16-bit (i16) I/Q pairs, at the given sampling --rate, demodulates narrowband FM, and writes squelch-gated 8 kHz audio in signed 16-bit format to standard output.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program accepts raw complex baseband samples as interleaved signed 16-bit (i16) I/Q pairs, at the given sampling --rate, demodulates narrowband FM, and writes squelch-gated audio in signed 16-bit format at the output rate (default 8000 Hz) to standard output.

You can pipe in a channelized capture with sox or feed it live from an SDR front end:

    rtl_fm_helper --iq 154.875M -s 50000 \
        | nbfmdec -r 50000 \
        | pacat --channels 1 --format s16ne --rate 8000

Decoder state transitions (call start, continuation, end) are logged to standard error; raise -v to see them.
"#;

const ADVANCED: &str = "Advanced Demodulator Options";

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print nothing but the audio samples
    #[arg(short, long)]
    pub quiet: bool,

    /// Sampling rate (Hz)
    ///
    /// Set to the channelized sample rate of your I/Q source. It
    /// must be at least twice the channel bandwidth.
    #[arg(short, long, default_value_t = 50_000)]
    pub rate: u32,

    /// Input file (or "-" for stdin)
    ///
    /// The input must be interleaved two-channel (I then Q), signed
    /// 16-bit native-endian at --rate.
    #[arg(long, default_value_t = STDIN_FILE.to_string())]
    pub file: String,

    /// FM channel bandwidth (Hz)
    #[arg(long, default_value_t = 12_500.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub bandwidth: f64,

    /// Audio output rate (Hz)
    #[arg(long, default_value_t = 8_000.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub audio_rate: f64,

    /// Squelch power estimator decay (0.0 < ALPHA <= 1.0)
    #[arg(long, default_value_t = 0.0001)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub squelch_alpha: f64,

    /// Squelch open threshold (dB)
    #[arg(long, default_value_t = -78.0, allow_hyphen_values = true)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub squelch_threshold: f64,

    /// Squelch attack/decay ramp (samples)
    #[arg(long, default_value_t = 4)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub squelch_ramp: u32,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file == STDIN_FILE
    }
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
