use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use evsim::precompute::{split_key, table_file_name, SplitTable};
use evsim::{build_rule_tag, compute_all_actions_ev, Rank, Rules, SearchConfig, SplitSource};
use evsim_drivers::{init_tracing, load_config, DEFAULT_CONFIG_PATH};

#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// Player's first card (A, 2-9, T/J/Q/K)
    p1: String,

    /// Player's second card
    p2: String,

    /// Dealer up-card
    dealer: String,

    /// The path of the config file
    #[arg(short, long, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    /// Directory holding the precompute files
    #[arg(long, default_value_t = String::from("assets/precompute"))]
    precompute_dir: String,

    /// Search the split EV in-process instead of reading the table
    #[arg(long)]
    live_split: bool,
}

/// Looks the pair up in the finalized table for this rule set. A
/// missing file or key is reported as pending rather than an error;
/// the generator may simply not have gotten to it yet.
fn precomputed_split(
    first: Rank,
    dealer_up: Rank,
    rules: &Rules,
    precompute_dir: &Path,
) -> SplitSource {
    let tag = build_rule_tag(rules);
    let key = split_key(first, dealer_up);
    let path = precompute_dir.join(table_file_name(&tag));

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => {
            println!(
                "SPLIT pending: no table {} (run split_precompute, or pass --live-split)",
                path.display()
            );
            return SplitSource::Unavailable;
        }
    };
    let table = SplitTable::from_json_str(&content).expect("Corrupt table file");
    match table.get(&key) {
        Some(ev) => SplitSource::Precomputed(ev),
        None => {
            println!("SPLIT pending: key {} missing from {}", key, path.display());
            SplitSource::Unavailable
        }
    }
}

fn main() {
    init_tracing();
    let args = CommandLineArgs::parse();
    let config = load_config(&args.config);
    let rules = config.rules.normalize();
    let search: SearchConfig = (&config.search).into();

    let p1 = Rank::parse(&args.p1).expect("Invalid first card");
    let p2 = Rank::parse(&args.p2).expect("Invalid second card");
    let dealer_up = Rank::parse(&args.dealer).expect("Invalid dealer up-card");

    let split = if args.live_split {
        SplitSource::Compute
    } else if p1 == p2 {
        precomputed_split(p1, dealer_up, &rules, &PathBuf::from(&args.precompute_dir))
    } else {
        SplitSource::Unavailable
    };

    let evs = compute_all_actions_ev(p1, p2, dealer_up, &rules, &search, split)
        .expect("EV computation failed");

    println!("{},{} vs {}  [{}]", p1, p2, dealer_up, build_rule_tag(&rules));
    let best = evs.best();
    for (action, value) in evs.entries() {
        let marker = match best {
            Some((best_action, _)) if best_action == action => " *",
            _ => "",
        };
        println!("{:<9} {:>+8.3}%{}", action.to_string(), value * 100.0, marker);
    }
}
