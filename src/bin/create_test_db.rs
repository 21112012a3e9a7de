use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use time::{Duration, OffsetDateTime};

use spendbook::{Expense, Store, Timestamp, create_expense, get_all_categories, initialize};

/// A utility for creating a test database for spendbook.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// How many days of expenses to generate, counting back from today.
    #[arg(
        long,
        default_value_t = 90,
        value_parser = clap::value_parser!(i64).range(0..=MAX_DAYS),
    )]
    days: i64,
}

/// Ten years of sample data.
const MAX_DAYS: i64 = 3650;

const SAMPLE_NOTES: [Option<&str>; 4] = [None, Some("Weekly shop"), None, Some("Split with Alex")];

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let store = Store::open(output_path)?;

    initialize(&store)?;

    println!("Creating test expenses...");

    let categories = get_all_categories(&store)?;
    if categories.is_empty() {
        eprintln!("The database has no categories to file expenses under!");
        exit(1);
    }

    let today = OffsetDateTime::now_utc().replace_time(time::macros::time!(12:00));
    let mut count = 0;

    // Dropping the connection before COMMIT rolls the whole fill back.
    store.execute("BEGIN;", [])?;

    for day in 0..args.days {
        let date = Timestamp::new(today - Duration::days(day))?;
        // One to three expenses a day, cycling through the categories.
        for slot in 0..(day % 3 + 1) {
            let index = (day + slot) as usize;
            let category = &categories[index % categories.len()];
            let amount = 5.0 + ((day * 7 + slot * 13) % 120) as f64 + 0.25 * (slot as f64);
            let notes = SAMPLE_NOTES[index % SAMPLE_NOTES.len()];

            create_expense(Expense::build(amount, category.id, date).notes(notes), &store)?;
            count += 1;
        }
    }

    store.execute("COMMIT;", [])?;

    println!("Created {count} expenses across {} categories", categories.len());
    println!("Success!");

    Ok(())
}
