use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueHint};

use peakquant::export::DirectoryExporter;
use peakquant::text;
use peakquant::{FitConfig, Gesture, InteractionController, MixtureFitter, Outcome};

/// Estimate and fit the Gaussian peaks of a lane profile
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// The two column profile to read
    #[arg(default_value = "test/data/lane.txt", value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// The directory to append export.csv and areas.csv to
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Fit a constant baseline under the peaks
    #[arg(short, long)]
    baseline: bool,

    /// Fit one width shared by every peak
    #[arg(short, long)]
    shared_width: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let signal = text::read_signal_file(&args.input)?;
    println!("Read {} points spanning {:?}", signal.len(), signal.domain());

    let name = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "trace".to_string());
    let fitter = MixtureFitter::new(FitConfig::default().fit_baseline(args.baseline));
    let mut session = InteractionController::new(name, signal).fitter(fitter);

    if let Outcome::Estimated(report) = session.handle(Gesture::Estimate)? {
        println!("Estimated {} peaks", report.created.len());
    }
    if args.shared_width {
        session.handle(Gesture::ToggleWidthLock)?;
    }

    let start = Instant::now();
    if let Outcome::Fitted(diagnostics) = session.handle(Gesture::Fit)? {
        println!(
            "Fitting took milliseconds {}",
            (Instant::now() - start).as_millis()
        );
        println!("{diagnostics}");
    }
    println!("{}", session.peak_table());

    if let Some(output) = args.output {
        let mut exporter = DirectoryExporter::new(&output);
        session.export(&mut exporter)?;
        println!("Exported to {}", output.display());
    }
    Ok(())
}
