use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use clap::Parser;
use quad_hash::Config;
use quad_hash::FnOps;
use quad_hash::HashTable;
use quad_hash::InsertError;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    #[arg(short = 'l', long = "max_load_factor", default_value_t = 0.75)]
    max_load_factor: f64,

    /// Erase every n-th value after filling, 0 to skip
    #[arg(short = 'e', long = "erase_every", default_value_t = 3)]
    erase_every: usize,
}

fn hash_u64(value: &u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashTable with target capacity: {}",
        args.target_capacity
    );

    let config = Config::default()
        .with_initial_capacity(args.target_capacity)
        .with_max_load_factor(args.max_load_factor)
        .with_min_load_factor(args.max_load_factor / 4.0);
    let ops = FnOps::new(hash_u64, |v: &u64| *v, |a: &u64, b: &u64| a == b, drop);
    let mut table = match HashTable::with_config(ops, config) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    let initial_capacity = table.capacity();
    println!("Actual capacity: {}", initial_capacity);
    println!("Filling table with u64 values...");

    let mut num_duplicates = 0;
    // One short of the grow threshold, so the table is shown at its fullest.
    let num_values = table
        .config()
        .grow_threshold(initial_capacity)
        .saturating_sub(1);
    for i in 0..num_values {
        let value = i as u64;
        match table.try_insert(&value) {
            Ok(()) => {}
            Err(InsertError::Duplicate) => num_duplicates += 1,
            Err(err) => panic!("Failed to insert {}: {}", value, err),
        }
    }

    println!("Inserted {} values into table", table.len());
    println!(
        "Capacity after filling: {} (started at {})",
        table.capacity(),
        initial_capacity
    );
    println!("Final load factor: {:.2}%", table.load_factor() * 100.0);

    table.probe_histogram().print();
    table.debug_stats().print();

    if args.erase_every > 0 {
        let erased = (0..num_values as u64)
            .step_by(args.erase_every)
            .filter(|value| table.erase(value))
            .count();
        println!("Erased {} values", erased);
        println!("Load factor after erasing: {:.2}%", table.load_factor() * 100.0);

        table.probe_histogram().print();
        table.debug_stats().print();
    }

    println!("Number of duplicate inserts: {}", num_duplicates);
}
