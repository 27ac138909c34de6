//! A CLI tool for transcoding a DICOM file
//! to another transfer syntax.
use clap::Parser;
use fragstream_object::open_file;
use fragstream_pixeldata::{TranscodeOptions, Transcoder};
use fragstream_transfer_syntax_registry::{entries, TransferSyntax, TransferSyntaxRegistry};
use snafu::{OptionExt, Report, Whatever};
use std::path::PathBuf;
use tracing::{info, warn, Level};

/// Exit code for when an error emerged while reading the DICOM file.
const ERROR_READ: i32 = -2;
/// Exit code for when an error emerged while transcoding the file.
const ERROR_TRANSCODE: i32 = -3;
/// Exit code for when an error emerged while writing the file.
const ERROR_WRITE: i32 = -4;
/// Exit code for any other error.
const ERROR_OTHER: i32 = -128;

/// Transcode a DICOM file
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    file: PathBuf,
    /// The output file (default is to change the extension to .new.dcm)
    #[clap(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// The encoding quality (from 0 to 100)
    #[clap(long = "quality")]
    quality: Option<u8>,
    /// The desired compression ratio, for lossy encodings
    #[clap(long = "ratio", conflicts_with = "quality")]
    ratio: Option<f32>,

    /// Target transfer syntax
    #[clap(flatten)]
    target_ts: TargetTransferSyntax,

    /// Fail instead of falling back to another encoding
    #[clap(long)]
    no_fallback: bool,

    /// Retain the original implementation class UID and version name
    #[clap(long)]
    retain_implementation: bool,

    /// Verbose mode
    #[clap(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Specifier for the target transfer syntax
#[derive(Debug, Parser)]
#[group(required = true, multiple = false, id = "transfer_syntax")]
struct TargetTransferSyntax {
    /// Transcode to the Transfer Syntax indicated by UID
    #[clap(long = "ts")]
    ts: Option<String>,

    /// Transcode to Explicit VR Little Endian
    #[clap(long = "expl-vr-le")]
    explicit_vr_le: bool,

    /// Transcode to Implicit VR Little Endian
    #[clap(long = "impl-vr-le")]
    implicit_vr_le: bool,

    /// Transcode to JPEG baseline (8-bit)
    #[cfg(feature = "jpeg")]
    #[clap(long = "jpeg-baseline")]
    jpeg_baseline: bool,

    /// Transcode to RLE lossless
    #[cfg(feature = "rle")]
    #[clap(long = "rle-lossless")]
    rle_lossless: bool,
}

impl TargetTransferSyntax {
    fn resolve(&self) -> Result<&'static TransferSyntax, Whatever> {
        match self {
            // none specified
            TargetTransferSyntax {
                ts: None,
                explicit_vr_le: false,
                implicit_vr_le: false,
                #[cfg(feature = "jpeg")]
                    jpeg_baseline: false,
                #[cfg(feature = "rle")]
                    rle_lossless: false,
            } => snafu::whatever!("No target transfer syntax specified"),
            // explicit VR little endian
            TargetTransferSyntax {
                explicit_vr_le: true,
                ..
            } => Ok(&entries::EXPLICIT_VR_LITTLE_ENDIAN),
            // implicit VR little endian
            TargetTransferSyntax {
                implicit_vr_le: true,
                ..
            } => Ok(&entries::IMPLICIT_VR_LITTLE_ENDIAN),
            // JPEG baseline
            #[cfg(feature = "jpeg")]
            TargetTransferSyntax {
                jpeg_baseline: true,
                ..
            } => TransferSyntaxRegistry
                .get(entries::JPEG_BASELINE.uid())
                .whatever_context("Missing specifier for JPEG Baseline (8-bit)"),
            // RLE lossless
            #[cfg(feature = "rle")]
            TargetTransferSyntax {
                rle_lossless: true,
                ..
            } => TransferSyntaxRegistry
                .get(entries::RLE_LOSSLESS.uid())
                .whatever_context("Missing specifier for RLE Lossless"),
            TargetTransferSyntax { ts: Some(ts), .. } => TransferSyntaxRegistry
                .get(ts)
                .whatever_context("Unknown transfer syntax"),
        }
    }
}

fn main() {
    run().unwrap_or_else(|e| {
        eprintln!("{}", Report::from_error(e));
        std::process::exit(ERROR_OTHER);
    });
}

fn run() -> Result<(), Whatever> {
    let App {
        file,
        output,
        quality,
        ratio,
        target_ts,
        no_fallback,
        retain_implementation,
        verbose,
    } = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
            .finish(),
    )
    .unwrap_or_else(|e| {
        eprintln!("{}", snafu::Report::from_error(e));
    });

    let output = output.unwrap_or_else(|| {
        let mut file = file.clone();
        file.set_extension("new.dcm");
        file
    });

    let obj = open_file(&file).unwrap_or_else(|e| {
        eprintln!("{}", Report::from_error(e));
        std::process::exit(ERROR_READ);
    });

    // lookup transfer syntax
    let ts = target_ts.resolve()?;

    let mut options = TranscodeOptions::new().retain_implementation(retain_implementation);
    if let Some(quality) = quality {
        options = options.quality(quality);
    }
    if let Some(ratio) = ratio {
        options = options.compression_ratio(ratio);
    }
    if no_fallback {
        options = options.fallbacks([]);
    }

    let deferred = Transcoder::new(&obj, ts)
        .with_options(options)
        .prepare()
        .unwrap_or_else(|e| {
            eprintln!("{}", Report::from_error(e));
            std::process::exit(ERROR_TRANSCODE);
        });

    // write to file
    let report = deferred.write_file(&output, None).unwrap_or_else(|e| {
        eprintln!("{}", Report::from_error(e));
        std::process::exit(ERROR_WRITE);
    });

    for adjustment in &report.adjustments {
        warn!("{}", adjustment);
    }
    info!(
        "Written {} in {}",
        output.display(),
        TransferSyntaxRegistry
            .get(report.transfer_syntax)
            .map(|ts| ts.name())
            .unwrap_or(report.transfer_syntax)
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::App;
    use clap::{CommandFactory, Parser};

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }

    #[test]
    fn encoding_flags() {
        let app = App::try_parse_from(["dicom-transcode", "in.dcm", "--expl-vr-le", "--quality", "90"])
            .unwrap();
        assert_eq!(app.quality, Some(90));

        // no such encoder setting
        let args = ["dicom-transcode", "in.dcm", "--expl-vr-le", "--effort", "10"];
        assert!(App::try_parse_from(args).is_err());

        let args = ["dicom-transcode", "in.dcm", "--expl-vr-le", "--quality", "90", "--ratio", "5"];
        assert!(App::try_parse_from(args).is_err());
    }
}
