//! # timegraph - Headless Entry Point
//!
//! Runs one synthetic capture through a [`CaptureSession`], then prints the
//! session state, the sorted track list, core count, instrumented hit counts
//! and the sampling hotspots. `--export` writes the timers as a Chrome trace.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use timegraph::capture::{CaptureData, CaptureSession, CaptureState, SyntheticTransport};
use timegraph::cli::Args;
use timegraph::config::TimeGraphConfig;
use timegraph::context::TimelineContext;
use timegraph::export::ChromeTraceExporter;
use timegraph::time_graph::TimeGraph;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

const START_TIMEOUT: Duration = Duration::from_secs(10);
const TOP_FUNCTIONS: usize = 10;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run() -> Result<()> {
    let args = Args::parse();
    let synthetic = args.synthetic_config();
    let options = args.session_options(synthetic.pid);
    let config = TimeGraphConfig::default();
    let context = TimelineContext::new();

    let transport = Arc::new(SyntheticTransport::new(synthetic));
    let mut session = CaptureSession::new(transport, options, context.clone());
    session.init().context("Failed to initialize capture session")?;

    if !args.quiet {
        println!("timegraph v{}", env!("CARGO_PKG_VERSION"));
        if let Some(process) = session.process() {
            println!("target: {} (pid {})", process.name, process.pid);
        }
        println!("instrumented: {} functions", session.selected_functions().len());
    }

    session.start_capture().context("Failed to start capture")?;
    let state = session.wait_until_capturing(START_TIMEOUT);
    if state == CaptureState::Capturing {
        if args.duration > 0 {
            std::thread::sleep(Duration::from_millis(args.duration));
        }
        session.stop_capture();
    } else {
        session.cancel();
    }

    let state = session.finish();
    println!("state: {state}");
    if state != CaptureState::Completed {
        bail!("capture did not complete ({state})");
    }
    let Some(capture) = session.capture_data() else {
        bail!("capture completed without data");
    };

    let mut graph = TimeGraph::new(config.clone(), context.clone());
    if let Some(filter) = &args.filter {
        graph.set_thread_filter(filter.clone());
    }
    graph.update_capture_range();
    graph.sort_tracks();

    print_tracks(&graph);
    print_top_functions(&graph, capture);
    print_hotspots(capture);

    if let Some(path) = &args.export {
        ChromeTraceExporter::from_capture(&context, capture, config.ticks_per_microsecond)
            .export_to_file(path)
            .with_context(|| format!("Failed to export trace to {}", path.display()))?;
        println!("saved: {}", path.display());
    }

    info!("Done");
    Ok(())
}

fn print_tracks(graph: &TimeGraph) {
    let store = graph.store();
    let strings = &graph.context().strings;
    let process_name = store.process_name();

    println!("\ntracks ({} timers, {} cores):", store.num_timers(), store.num_cores());
    for key in graph.sorted_tracks() {
        if let Some(track) = store.track(*key) {
            println!(
                "  {:<32} {:>8} timers",
                track.label(strings, store.num_cores(), &process_name),
                track.num_timers()
            );
        }
    }
}

fn print_top_functions(graph: &TimeGraph, capture: &CaptureData) {
    let top = graph.store().top_functions(TOP_FUNCTIONS);
    if top.is_empty() {
        return;
    }

    println!("\ninstrumented calls:");
    for (address, hits) in top {
        let name = capture.selected_function(address).map_or_else(|| format!("{address:#x}"), |f| f.pretty_name.clone());
        match capture.function_stats(address) {
            Some(stats) => println!(
                "  {name:<24} {hits:>8} calls  avg {:>8} ticks  max {:>8} ticks",
                stats.average_ticks(),
                stats.max_ticks
            ),
            None => println!("  {name:<24} {hits:>8} calls"),
        }
    }
}

fn print_hotspots(capture: &CaptureData) {
    let Some(summary) = capture.sampling_report.as_ref().and_then(|r| r.summary()) else {
        return;
    };

    println!("\nhotspots ({} samples):", summary.num_samples);
    for function in summary.functions.iter().take(TOP_FUNCTIONS) {
        println!(
            "  {:<24} excl {:>5.1}%  incl {:>5.1}%",
            function.name, function.exclusive_percent, function.inclusive_percent
        );
    }
}
