// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replay a file-access trace through the eviction engine.
//!
//! Demonstrates:
//! 1. Loading an `EngineConfig` from JSON (or using a 100-byte demo cache)
//! 2. Replaying `path,O` / `path,R,size` events
//! 3. Printing tier contents and the hit rate
//! 4. Dumping captured metrics
//! 5. Clean background evictor shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example trace_replay -- [trace.txt] [config.json]
//! ```
//!
//! Without a trace file, a small built-in trace is replayed.

use std::sync::Arc;

use evict_engine::{trace, CacheEngine, EngineConfig};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

const DEMO_TRACE: &str = "\
# path,event[,size]
/cache/a,O
/cache/a,R,30
/cache/b,O
/cache/b,R,20
/cache/a,O
/cache/c,O
/cache/c,R,25
/cache/d,O
/cache/d,R,20
/cache/a,O
/cache/e,O
/cache/e,R,15
";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evict_engine=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let mut args = std::env::args().skip(1);
    let trace_path = args.next();
    let config = match args.next() {
        Some(path) => EngineConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => EngineConfig {
            cache_size: 100,
            ..Default::default()
        },
    };

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║              evict-engine: Trace Replay                       ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");
    println!("📦 Config: {:?}\n", config);

    let engine = Arc::new(CacheEngine::new(config)?);
    let evictor = engine.start_background_evictor();

    let stats = match trace_path.as_deref() {
        Some(path) => {
            println!("▶️  Replaying {}", path);
            trace::replay_file(&engine, path)?
        }
        None => {
            println!("▶️  Replaying built-in demo trace");
            trace::replay(&engine, DEMO_TRACE.as_bytes())?
        }
    };
    println!(
        "   opens={} reads={} skipped={} freed={} bytes\n",
        stats.opens, stats.reads, stats.skipped, stats.freed_bytes
    );

    println!("🗂️  Cache contents (next victim first):");
    for (tier, entry) in engine.snapshot() {
        println!(
            "   {:<14} {:<30} size={:<10} accesses={}",
            tier.to_string(),
            entry.path(),
            entry.size(),
            entry.access_count()
        );
    }

    let cache = engine.stats();
    println!(
        "\n📊 {} / {} bytes resident ({:.1}%), overflow={}",
        cache.resident_bytes(),
        cache.cache_size,
        cache.fill_rate() * 100.0,
        cache.overflow
    );
    match engine.hit_rate() {
        Some(rate) => println!("   hit rate: {:.3}", rate),
        None => println!("   hit rate: n/a (no accesses)"),
    }
    println!("   invariants hold: {}\n", engine.check_invariants());

    println!("📈 Metrics:");
    dump_metrics(&snapshotter);

    if let Some(evictor) = evictor {
        evictor.shutdown().await;
    }
    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_, key) = composite_key.into_parts();
            let labels: Vec<_> = key
                .labels()
                .map(|l| format!("{}={}", l.key(), l.value()))
                .collect();
            let label_str = if labels.is_empty() {
                String::new()
            } else {
                format!("{{{}}}", labels.join(","))
            };
            let rendered = match value {
                DebugValue::Counter(v) => v.to_string(),
                DebugValue::Gauge(v) => format!("{:.3}", v.into_inner()),
                DebugValue::Histogram(samples) => {
                    let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                    format!("count={} sum={:.6}", samples.len(), sum)
                }
            };
            format!("{}{} = {}", key.name(), label_str, rendered)
        })
        .collect();
    lines.sort();

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}
