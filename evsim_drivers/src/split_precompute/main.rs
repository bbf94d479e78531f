use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use strum::IntoEnumIterator;

use evsim::precompute::{
    expected_keys, ndjson_file_name, split_key, table_file_name, SplitRecord, SplitTable,
};
use evsim::{build_rule_tag, compute_split_ev, EvMemo, Rank, RawRules, SearchConfig};
use evsim_drivers::{init_tracing, load_config, DEFAULT_CONFIG_PATH};

#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// The path of the config file
    #[arg(short, long, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    /// Directory holding the precompute files
    #[arg(long, default_value_t = String::from("assets/precompute"))]
    out_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute split EVs incrementally into an NDJSON file, skipping
    /// keys already present so an interrupted run resumes where it
    /// stopped
    Generate(RuleFlags),
    /// Fold an NDJSON file into the finished JSON lookup table
    Finalize {
        /// Rule tag of the run; derived from the config when omitted
        tag: Option<String>,
    },
    /// Check a finished table for completeness
    Validate {
        /// Rule tag of the table; derived from the config when omitted
        tag: Option<String>,
    },
}

/// Rule overrides applied on top of the config file.
#[derive(Debug, Args)]
struct RuleFlags {
    #[arg(long)]
    hit_soft17: Option<bool>,
    #[arg(long)]
    double_after_split: Option<bool>,
    #[arg(long)]
    resplit_aces: Option<bool>,
    #[arg(long)]
    double_rule: Option<String>,
    #[arg(long)]
    peek: Option<bool>,
    #[arg(long)]
    surrender: Option<String>,
    #[arg(long)]
    decks: Option<u8>,
}

impl RuleFlags {
    fn merge_into(&self, mut raw: RawRules) -> RawRules {
        if self.hit_soft17.is_some() {
            raw.hit_soft17 = self.hit_soft17;
        }
        if self.double_after_split.is_some() {
            raw.double_after_split = self.double_after_split;
        }
        if self.resplit_aces.is_some() {
            raw.resplit_aces = self.resplit_aces;
        }
        if self.double_rule.is_some() {
            raw.double_rule = self.double_rule.clone();
        }
        if self.peek.is_some() {
            raw.peek = self.peek;
        }
        if self.surrender.is_some() {
            raw.surrender = self.surrender.clone();
        }
        if self.decks.is_some() {
            raw.decks = self.decks;
        }
        raw
    }
}

fn load_done_keys(path: &Path) -> BTreeSet<String> {
    if !path.exists() {
        return BTreeSet::new();
    }
    let content = fs::read_to_string(path).expect("Cannot read the NDJSON file");
    let table = SplitTable::from_ndjson(&content).expect("Corrupt NDJSON file");
    table.keys()
}

fn generate(rules: &evsim::Rules, search: &SearchConfig, out_dir: &Path) {
    let tag = build_rule_tag(rules);
    fs::create_dir_all(out_dir).expect("Cannot create the output directory");
    let ndjson_path = out_dir.join(ndjson_file_name(&tag));

    let done = load_done_keys(&ndjson_path);
    let total = expected_keys().len();
    tracing::info!(%tag, total, done = done.len(), file = %ndjson_path.display(), "generating");

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&ndjson_path)
        .expect("Cannot open the NDJSON file for appending");

    let start = Instant::now();
    let mut computed = 0usize;
    let mut processed = done.len();

    for pair in Rank::iter() {
        let mut memo = EvMemo::new(search);
        for up in Rank::iter() {
            let key = split_key(pair, up);
            if done.contains(&key) {
                continue;
            }
            tracing::info!(%key, "computing split key");
            let key_start = Instant::now();
            let ev = compute_split_ev(pair, pair, up, rules, search, &mut memo)
                .expect("Split EV computation failed");

            let record = SplitRecord::new(pair, up, ev);
            let line = serde_json::to_string(&record).expect("Cannot encode the record");
            writeln!(file, "{}", line).expect("Cannot append to the NDJSON file");
            file.flush().expect("Cannot flush the NDJSON file");

            computed += 1;
            processed += 1;
            tracing::info!(
                %key,
                ev = record.v,
                elapsed_s = key_start.elapsed().as_secs_f64(),
                progress = %format!("{}/{} ({:.1}%)", processed, total, 100.0 * processed as f64 / total as f64),
                "finished split key"
            );
        }
    }

    tracing::info!(
        computed,
        skipped = done.len(),
        elapsed_s = start.elapsed().as_secs_f64(),
        "generation pass complete"
    );
    if processed == total {
        tracing::info!(%tag, "all keys present; run finalize to emit the JSON table");
    }
}

fn finalize(tag: &str, out_dir: &Path) {
    let ndjson_path = out_dir.join(ndjson_file_name(tag));
    let json_path = out_dir.join(table_file_name(tag));

    let content = fs::read_to_string(&ndjson_path).expect("Cannot read the NDJSON file");
    let table = SplitTable::from_ndjson(&content).expect("Corrupt NDJSON file");
    let rendered = table.to_json_string().expect("Cannot encode the table");

    // Write-then-rename so readers never observe a half-written table.
    let tmp_path = json_path.with_extension("json.tmp");
    fs::write(&tmp_path, rendered).expect("Cannot write the temporary table file");
    fs::rename(&tmp_path, &json_path).expect("Cannot move the table file into place");
    tracing::info!(entries = table.len(), file = %json_path.display(), "finalized");
}

fn validate(tag: &str, out_dir: &Path) {
    let json_path = out_dir.join(table_file_name(tag));
    let content = fs::read_to_string(&json_path).expect("Cannot read the table file");
    let table = SplitTable::from_json_str(&content).expect("Corrupt table file");
    match table.validate() {
        Ok(()) => tracing::info!(%tag, "validated"),
        Err(error) => {
            tracing::error!(%tag, %error, "validation failed");
            std::process::exit(1);
        }
    }
}

fn main() {
    init_tracing();
    let args = CommandLineArgs::parse();
    let config = load_config(&args.config);
    let out_dir = PathBuf::from(&args.out_dir);

    match &args.command {
        Command::Generate(flags) => {
            let rules = flags.merge_into(config.rules.clone()).normalize();
            let search: SearchConfig = (&config.search).into();
            generate(&rules, &search, &out_dir);
        }
        Command::Finalize { tag } => {
            let tag = tag
                .clone()
                .unwrap_or_else(|| build_rule_tag(&config.rules.normalize()));
            finalize(&tag, &out_dir);
        }
        Command::Validate { tag } => {
            let tag = tag
                .clone()
                .unwrap_or_else(|| build_rule_tag(&config.rules.normalize()));
            validate(&tag, &out_dir);
        }
    }
}
