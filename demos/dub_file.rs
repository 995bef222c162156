//! Example: Dub a single file
//!
//! Usage:
//!   cargo run --release --example dub_file -- <original> <manifest.json> <out.wav>
//!
//! The manifest is a JSON object:
//!
//! ```json
//! {
//!   "config": { "background_volume": 0.1 },
//!   "segments": [
//!     { "id": 1, "start_seconds": 2.0, "end_seconds": 4.0,
//!       "source_text": "Hello", "translated_text": "Hola",
//!       "audio_base64": "..." }
//!   ]
//! }
//! ```
//!
//! Each segment may carry `audio_base64` (raw 24 kHz PCM16) or `audio_path`
//! (any file). Segments whose audio fails to decode are dubbed as silence.

use dubline_dsp::{
    composite_with_report, decode_container, ingest_speech, write_wav, DubConfig, DubSegment,
};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::io::BufWriter;

#[derive(Deserialize)]
struct SegmentEntry {
    #[serde(flatten)]
    segment: DubSegment,
    audio_base64: Option<String>,
    audio_path: Option<String>,
}

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    config: DubConfig,
    segments: Vec<SegmentEntry>,
}

fn load_speech(entry: &SegmentEntry) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    use base64::Engine;
    if let Some(text) = &entry.audio_base64 {
        return Ok(Some(
            base64::engine::general_purpose::STANDARD.decode(text.trim())?,
        ));
    }
    if let Some(path) = &entry.audio_path {
        return Ok(Some(std::fs::read(path)?));
    }
    Ok(None)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 3 {
        eprintln!("Usage: dub_file <original> <manifest.json> <out.wav>");
        std::process::exit(2);
    }

    let original = decode_container(&std::fs::read(&args[0])?)?;
    let manifest: Manifest = serde_json::from_reader(File::open(&args[1])?)?;
    let config = manifest.config;

    let mut segments = Vec::with_capacity(manifest.segments.len());
    for entry in manifest.segments {
        let speech = load_speech(&entry)
            .map_err(|e| e.to_string())
            .and_then(|bytes| match bytes {
                Some(bytes) => ingest_speech(&bytes, &config).map(Some).map_err(|e| e.to_string()),
                None => Ok(None),
            });
        let mut segment = entry.segment;
        match speech {
            Ok(Some(audio)) => segment.attach_audio(audio),
            Ok(None) => {}
            Err(e) => eprintln!("Segment {}: no audio ({})", segment.id, e),
        }
        segments.push(segment);
    }

    let (master, report) = composite_with_report(&original, &segments, &config)?;
    write_wav(&master, BufWriter::new(File::create(&args[2])?))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!(
        "Wrote {} ({:.2}s, {} placed, {} stretched)",
        args[2],
        master.duration_seconds(),
        report.placements.len(),
        report.stretched_count()
    );

    Ok(())
}
