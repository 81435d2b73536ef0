use std::io;

use anyhow::{anyhow, Context};
use byteorder::{NativeEndian, ReadBytesExt};
use clap::Parser;
use log::{info, LevelFilter};

use trunkrx::{DecoderEvent, DecoderStateBus, NbfmDecoder, SourceEvent};

mod app;
mod cli;

use cli::{Args, CliError};

fn main() {
    match nbfmdec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn nbfmdec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    // create the channel bus and decoder
    let bus = DecoderStateBus::new();
    bus.subscribe(|event| {
        if let DecoderEvent::State(state) = event {
            info!("{}", state);
        }
    });

    let mut decoder = NbfmDecoder::builder()
        .with_channel_bandwidth(args.bandwidth)
        .with_output_sample_rate(args.audio_rate)
        .with_squelch(args.squelch_alpha, args.squelch_threshold, args.squelch_ramp)
        .build(&bus);

    // the pipeline builds its filters from the source rate
    decoder
        .process_source_event(&SourceEvent::SampleRateChange {
            sample_rate: args.rate as f64,
        })
        .context("unsupported sample rate")?;

    // file setup: locks stdin in case we need it
    let stdin = io::stdin();
    let stdin_handle = stdin.lock();
    let mut inbuf = file_setup(&args, stdin_handle)?;

    // processing: read interleaved i16 I/Q from the input source
    app::run(
        &mut decoder,
        std::iter::from_fn(|| inbuf.read_i16::<NativeEndian>().ok()),
    )?;

    Ok(())
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("trunkrx", log_filter)
            .filter_module("nbfmdec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn file_setup<'stdin>(
    args: &Args,
    stdin: std::io::StdinLock<'stdin>,
) -> Result<Box<dyn io::BufRead + 'stdin>, anyhow::Error> {
    if args.input_is_stdin() {
        info!("NBFM decoder reading standard input");
        if !is_terminal(&std::io::stdin()) {
            Ok(Box::new(io::BufReader::new(stdin)))
        } else {
            Err(anyhow!(
                "cowardly refusing to read I/Q samples from a terminal.

Pipe a source of raw complex baseband samples from an SDR front end
or a recording into this program."
            ))
        }
    } else {
        info!("NBFM decoder reading file: \"{}\"", &args.file);
        Ok(Box::new(io::BufReader::new(
            std::fs::File::open(&args.file)
                .with_context(|| format!("Unable to open --file \"{}\"", args.file))?,
        )))
    }
}

#[cfg(not(target_os = "windows"))]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::fd::AsRawFd,
{
    terminal_size::terminal_size_using_fd(stream.as_raw_fd()).is_some()
}

#[cfg(target_os = "windows")]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::windows::io::AsRawHandle,
{
    terminal_size::terminal_size_using_handle(stream.as_raw_handle()).is_some()
}
