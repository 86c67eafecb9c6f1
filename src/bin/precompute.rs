//! Warm the word-document store from a fixture bundle.
//!
//! For each requested word (default: every word in the fixture) builds and
//! persists all seven category trees, reporting per-category tree stats,
//! artifact sizes, model-call totals, and cache counters.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use wordchain::encoding::encode_tree;
use wordchain::env_config;
use wordchain::fixture::FixtureBundle;
use wordchain::service::ScoringService;
use wordchain::store::FsDocumentStore;

struct Args {
    fixture: PathBuf,
    data_dir: Option<PathBuf>,
    words: Vec<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut fixture = PathBuf::from("data/fixtures/demo.json");
    let mut data_dir = None;
    let mut words = Vec::new();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--fixture" => {
                i += 1;
                if i < args.len() {
                    fixture = PathBuf::from(&args[i]);
                }
            }
            "--data-dir" => {
                i += 1;
                if i < args.len() {
                    data_dir = Some(PathBuf::from(&args[i]));
                }
            }
            "--help" | "-h" => {
                println!("Usage: precompute [--fixture PATH] [--data-dir DIR] [WORD...]");
                println!();
                println!("Options:");
                println!("  --fixture PATH  Fixture bundle (default: data/fixtures/demo.json)");
                println!("  --data-dir DIR  Word-document directory (default: WORDCHAIN_DATA_DIR)");
                println!("  WORD...         Words to prepare (default: every fixture word)");
                std::process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
            word => words.push(word.to_lowercase()),
        }
        i += 1;
    }
    Args {
        fixture,
        data_dir,
        words,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = parse_args();

    println!("Wordchain precompute tool");
    let bundle = match FixtureBundle::load(&args.fixture) {
        Ok(bundle) => bundle,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };
    let fixture = match bundle.assemble() {
        Ok(fixture) => fixture,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };
    println!(
        "Fixture: {} ({} pieces, {} words, {} rows)",
        args.fixture.display(),
        bundle.pieces.len(),
        bundle.words.len(),
        bundle.rows.len()
    );

    let data_dir = args.data_dir.unwrap_or_else(env_config::data_dir);
    let store = match FsDocumentStore::new(&data_dir) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("Opening {}: {}", data_dir.display(), err);
            std::process::exit(1);
        }
    };
    println!("Data directory: {}", data_dir.display());

    let config = env_config::service_config_from_env();
    let service = ScoringService::new(
        fixture.model,
        fixture.tokenizer,
        fixture.lexicon,
        Arc::new(store),
        config,
    );

    let mut words = if args.words.is_empty() {
        bundle.words.keys().cloned().collect::<Vec<_>>()
    } else {
        args.words
    };
    words.sort();

    let start_time = Instant::now();
    let mut built = 0usize;
    let mut failed = 0usize;
    for word in &words {
        println!();
        println!("Preparing {:?}...", word);
        let word_start = Instant::now();
        for (category, outcome) in service.prepare_word(word).await {
            match outcome {
                Ok(tree) => {
                    built += 1;
                    if tree.is_empty() {
                        println!("  {}  empty", category);
                        continue;
                    }
                    let artifact_bytes = encode_tree(&tree).map(|b| b.len()).unwrap_or(0);
                    println!(
                        "  {}  {:>2} sequences  {:>2} nodes  {:>2} entries  depth {}  {:>4} bytes",
                        category,
                        tree.valid_sequences.len(),
                        tree.node_count(),
                        tree.entry_count(),
                        tree.max_depth(),
                        artifact_bytes
                    );
                }
                Err(err) => {
                    failed += 1;
                    println!("  {}  FAILED: {}", category, err);
                }
            }
        }
        println!(
            "  done in {:.2} ms",
            word_start.elapsed().as_secs_f64() * 1000.0
        );
    }

    let stats = service.cache_stats();
    println!();
    println!(
        "Prepared {} words ({} trees, {} failures) in {:.2} ms",
        words.len(),
        built,
        failed,
        start_time.elapsed().as_secs_f64() * 1000.0
    );
    println!("Model calls: {}", service.model().call_count());
    println!(
        "Cache: {} hits, {} misses, {} evictions, {} resident",
        stats.hits, stats.misses, stats.evictions, stats.resident
    );

    if failed > 0 {
        std::process::exit(1);
    }
}
