//! Example: Dub many files in parallel
//!
//! Usage:
//!   cargo run --release --example dub_batch -- [--jobs N] [--json] <job.json>...
//!
//! Each job file is a dub manifest (see `dub_file`) with two extra keys,
//! `original` and `output`, naming the input media and the WAV to write.
//! Jobs run on a dedicated rayon pool; segments inside a job are prepared in
//! parallel too when `parallel_stretch` is on.

use base64::Engine;
use dubline_dsp::{
    composite_with_report, decode_container, ingest_speech, write_wav, CompositeReport, DubConfig,
    DubSegment,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::time::Instant;

#[derive(Deserialize)]
struct SegmentEntry {
    #[serde(flatten)]
    segment: DubSegment,
    audio_base64: Option<String>,
    audio_path: Option<String>,
}

#[derive(Deserialize)]
struct Job {
    original: String,
    output: String,
    #[serde(default)]
    config: DubConfig,
    segments: Vec<SegmentEntry>,
}

#[derive(Serialize)]
struct JobOut {
    job: String,
    ok: bool,
    error: Option<String>,
    elapsed_ms: f64,
    speech_failures: usize,
    report: Option<CompositeReport>,
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .saturating_sub(1)
        .max(1)
}

fn load_speech(entry: &SegmentEntry, config: &DubConfig) -> Result<Option<dubline_dsp::AudioBuffer>, String> {
    let bytes = if let Some(text) = &entry.audio_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map_err(|e| e.to_string())?
    } else if let Some(path) = &entry.audio_path {
        std::fs::read(path).map_err(|e| e.to_string())?
    } else {
        return Ok(None);
    };
    ingest_speech(&bytes, config).map(Some).map_err(|e| e.to_string())
}

fn run_job(path: &str) -> Result<(CompositeReport, usize), Box<dyn std::error::Error + Send + Sync>> {
    let job: Job = serde_json::from_reader(File::open(path)?)?;
    let original = decode_container(&std::fs::read(&job.original)?)?;

    let mut failures = 0;
    let mut segments = Vec::with_capacity(job.segments.len());
    for entry in &job.segments {
        let mut segment = entry.segment.clone();
        match load_speech(entry, &job.config) {
            Ok(Some(audio)) => segment.attach_audio(audio),
            Ok(None) => {}
            Err(e) => {
                log::warn!("{}: segment {} has no audio ({})", path, segment.id, e);
                failures += 1;
            }
        }
        segments.push(segment);
    }

    let (master, report) = composite_with_report(&original, &segments, &job.config)?;
    write_wav(&master, BufWriter::new(File::create(&job.output)?))?;
    Ok((report, failures))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut jobs = default_jobs();
    let mut json = false;
    let mut paths: Vec<String> = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--jobs" => {
                let n = args.next().ok_or("--jobs needs a value")?;
                jobs = n.parse::<usize>()?.max(1);
            }
            "--json" => json = true,
            _ => paths.push(arg),
        }
    }

    if paths.is_empty() {
        eprintln!("Usage: dub_batch [--jobs N] [--json] <job.json>...");
        std::process::exit(2);
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let start = Instant::now();

    let results: Vec<JobOut> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let t0 = Instant::now();
                let outcome = run_job(path);
                let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
                match outcome {
                    Ok((report, speech_failures)) => JobOut {
                        job: path.clone(),
                        ok: true,
                        error: None,
                        elapsed_ms,
                        speech_failures,
                        report: Some(report),
                    },
                    Err(e) => JobOut {
                        job: path.clone(),
                        ok: false,
                        error: Some(e.to_string()),
                        elapsed_ms,
                        speech_failures: 0,
                        report: None,
                    },
                }
            })
            .collect()
    });

    for item in &results {
        if json {
            println!("{}", serde_json::to_string(item)?);
        } else if let Some(report) = &item.report {
            println!(
                "{}: {} placed, {} stretched, {} skipped, {} silent ({:.1} ms)",
                item.job,
                report.placements.len(),
                report.stretched_count(),
                report.skipped.len(),
                report.silent_segments.len(),
                item.elapsed_ms
            );
        } else {
            println!("{}: FAILED ({})", item.job, item.error.as_deref().unwrap_or("unknown"));
        }
    }

    let ok = results.iter().filter(|r| r.ok).count();
    let mut times: Vec<f64> = results.iter().filter(|r| r.ok).map(|r| r.elapsed_ms).collect();
    times.sort_by(|a, b| a.total_cmp(b));
    let median = times.get(times.len() / 2).copied().unwrap_or(0.0);

    eprintln!(
        "Done: {}/{} jobs in {:.2}s on {} threads (median {:.1} ms/job)",
        ok,
        results.len(),
        start.elapsed().as_secs_f64(),
        jobs,
        median
    );

    Ok(())
}
