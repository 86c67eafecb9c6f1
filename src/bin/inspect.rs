//! Inspect a stored word document.
//!
//! Decodes every category artifact in the word's document and prints tree
//! stats plus the creativity breakdown of each compiled candidate sequence.
//! With `--fixture`, sequences are decoded back to surface words through the
//! fixture tokenizer.

use std::path::{Path, PathBuf};

use wordchain::encoding::decode_tree_hex;
use wordchain::env_config;
use wordchain::fixture::FixtureBundle;
use wordchain::scoring::score_conditionals;
use wordchain::store::{value_at, word_key, DocumentStore, FsDocumentStore};
use wordchain::token::{PieceTokenizer, Tokenizer};
use wordchain::types::Category;

struct Args {
    fixture: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    word: String,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut fixture = None;
    let mut data_dir = None;
    let mut word = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--fixture" => {
                i += 1;
                if i < args.len() {
                    fixture = Some(PathBuf::from(&args[i]));
                }
            }
            "--data-dir" => {
                i += 1;
                if i < args.len() {
                    data_dir = Some(PathBuf::from(&args[i]));
                }
            }
            "--help" | "-h" => {
                println!("Usage: inspect [--fixture PATH] [--data-dir DIR] WORD");
                println!();
                println!("Options:");
                println!("  --fixture PATH  Decode token sequences through this fixture's pieces");
                println!("  --data-dir DIR  Word-document directory (default: WORDCHAIN_DATA_DIR)");
                std::process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
            w => word = Some(w.to_lowercase()),
        }
        i += 1;
    }
    let Some(word) = word else {
        eprintln!("Missing WORD argument (try --help)");
        std::process::exit(1);
    };
    Args {
        fixture,
        data_dir,
        word,
    }
}

fn load_tokenizer(path: &Path) -> PieceTokenizer {
    let bundle = match FixtureBundle::load(path) {
        Ok(bundle) => bundle,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };
    PieceTokenizer::new(bundle.pieces)
}

fn main() {
    env_logger::init();
    let args = parse_args();
    let tokenizer = args.fixture.as_deref().map(load_tokenizer);

    let data_dir = args.data_dir.unwrap_or_else(env_config::data_dir);
    let store = match FsDocumentStore::new(&data_dir) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("Opening {}: {}", data_dir.display(), err);
            std::process::exit(1);
        }
    };

    let key = word_key(&args.word);
    let doc = match store.document(&key) {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            println!("No document for {:?} in {}", args.word, data_dir.display());
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("Reading document {}: {}", key, err);
            std::process::exit(1);
        }
    };

    let frequency = value_at(&doc, "frequency")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    println!("Word document {:?} (frequency {})", args.word, frequency);

    for category in Category::ALL {
        let path = format!("{}.tree", category.document_path());
        let Some(value) = value_at(&doc, &path) else {
            println!("\n{}  not built", category);
            continue;
        };
        let Some(hex) = value.as_str() else {
            println!("\n{}  malformed field (not a string)", category);
            continue;
        };
        let tree = match decode_tree_hex(hex) {
            Ok(tree) => tree,
            Err(err) => {
                println!("\n{}  corrupt: {}", category, err);
                continue;
            }
        };
        if tree.is_empty() {
            println!("\n{}  empty", category);
            continue;
        }
        println!(
            "\n{}  {} sequences  {} nodes  {} entries  depth {}  ({} hex chars)",
            category,
            tree.valid_sequences.len(),
            tree.node_count(),
            tree.entry_count(),
            tree.max_depth(),
            hex.len()
        );
        for sequence in &tree.valid_sequences {
            let Ok(conditionals) = tree.resolve(sequence) else {
                continue;
            };
            let breakdown = score_conditionals(conditionals);
            let label = match &tokenizer {
                Some(tok) => tok
                    .decode(sequence)
                    .map(|w| format!("{:?}", w))
                    .unwrap_or_else(|_| format!("{:?}", sequence)),
                None => format!("{:?}", sequence),
            };
            let probs: Vec<String> = breakdown
                .conditionals
                .iter()
                .map(|p| format!("{:.3}", p))
                .collect();
            println!(
                "    {:<10} p=[{}]  rms {:.4}  raw {:.4}  score {:.4}",
                label,
                probs.join(", "),
                breakdown.rms,
                breakdown.raw_creativity,
                breakdown.final_score
            );
        }
    }
}
