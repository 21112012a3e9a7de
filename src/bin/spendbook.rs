use std::{error::Error, path::PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use spendbook::{
    AppState, Category, CategoryId, CategoryName, CategoryTotal, DEFAULT_DB_PATH, DateRange,
    Expense, ExpenseId, Store, Timestamp, initialize, month_range, previous_month_range,
};

/// Record expenses and see where the money went.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db_path: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List, add or delete categories.
    #[command(subcommand)]
    Categories(CategoryCommand),

    /// List, add, update or delete expenses.
    #[command(subcommand)]
    Expenses(ExpenseCommand),

    /// Show how much was spent in each category, this month by default.
    Totals {
        /// Start of the window (inclusive), e.g. 2025-01-01T00:00:00Z.
        #[arg(long, requires = "to")]
        from: Option<Timestamp>,

        /// End of the window (exclusive).
        #[arg(long, requires = "from")]
        to: Option<Timestamp>,

        /// Show last month instead of this month.
        #[arg(long, conflicts_with_all = ["from", "to"])]
        last_month: bool,
    },

    /// Compare this month with last month and show the latest expenses.
    Summary {
        /// How many recent expenses to show.
        #[arg(long, default_value_t = 5)]
        recent: usize,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    /// List all categories.
    List,

    /// Add a category.
    Add {
        /// A unique name.
        name: String,

        /// A hex color, e.g. "#FF6B6B".
        color: String,
    },

    /// Delete a category together with all of its expenses.
    Delete { id: CategoryId },
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    /// List expenses, newest first.
    List {
        /// Only show expenses on or after this time.
        #[arg(long, requires = "to")]
        from: Option<Timestamp>,

        /// Only show expenses before this time.
        #[arg(long, requires = "from")]
        to: Option<Timestamp>,
    },

    /// Record an expense.
    Add {
        amount: f64,

        category_id: CategoryId,

        /// When the money was spent, defaults to now.
        #[arg(long)]
        date: Option<Timestamp>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Replace every field of an expense.
    Update {
        id: ExpenseId,

        amount: f64,

        category_id: CategoryId,

        #[arg(long)]
        date: Timestamp,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete an expense.
    Delete { id: ExpenseId },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();

    let args = Args::parse();

    let store = Store::open(&args.db_path)?;
    initialize(&store)?;

    let mut state = AppState::new(store);
    state.reload().await?;

    match args.command {
        Command::Categories(command) => run_category_command(command, &mut state, args.json).await,
        Command::Expenses(command) => run_expense_command(command, &mut state, args.json).await,
        Command::Totals {
            from,
            to,
            last_month,
        } => {
            let now = OffsetDateTime::now_utc();
            let range = match (from, to) {
                (Some(from), Some(to)) => DateRange::new(from, to)?,
                _ if last_month => previous_month_range(now)?,
                _ => month_range(now)?,
            };

            let totals = state.category_totals(range).await?;
            print_totals(&range, &totals, args.json)
        }
        Command::Summary { recent } => print_summary(&state, recent, args.json),
    }
}

async fn run_category_command(
    command: CategoryCommand,
    state: &mut AppState,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    match command {
        CategoryCommand::List => print_categories(&state.categories, json),
        CategoryCommand::Add { name, color } => {
            let category = state
                .add_category(CategoryName::new(&name)?, &color)
                .await?;
            print_categories(std::slice::from_ref(&category), json)
        }
        CategoryCommand::Delete { id } => {
            state.delete_category(id).await?;
            println!("Deleted category {id}");
            Ok(())
        }
    }
}

async fn run_expense_command(
    command: ExpenseCommand,
    state: &mut AppState,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    match command {
        ExpenseCommand::List { from, to } => {
            let expenses = match (from, to) {
                (Some(from), Some(to)) => {
                    state
                        .expenses_in_range(DateRange::new(from, to)?)
                        .await?
                }
                _ => state.expenses.clone(),
            };

            print_expenses(&expenses, &state.categories, json)
        }
        ExpenseCommand::Add {
            amount,
            category_id,
            date,
            notes,
        } => {
            let date = date.unwrap_or_else(Timestamp::now);
            let expense = state
                .add_expense(Expense::build(amount, category_id, date).notes(notes.as_deref()))
                .await?;

            print_expenses(std::slice::from_ref(&expense), &state.categories, json)
        }
        ExpenseCommand::Update {
            id,
            amount,
            category_id,
            date,
            notes,
        } => {
            state
                .update_expense(
                    id,
                    Expense::build(amount, category_id, date).notes(notes.as_deref()),
                )
                .await?;
            println!("Updated expense {id}");
            Ok(())
        }
        ExpenseCommand::Delete { id } => {
            state.delete_expense(id).await?;
            println!("Deleted expense {id}");
            Ok(())
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_categories(categories: &[Category], json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        return print_json(&categories);
    }

    for category in categories {
        println!("{:>4}  {:<20} {}", category.id, category.name, category.color);
    }

    Ok(())
}

fn print_expenses(
    expenses: &[Expense],
    categories: &[Category],
    json: bool,
) -> Result<(), Box<dyn Error>> {
    if json {
        return print_json(&expenses);
    }

    for expense in expenses {
        let category_name = categories
            .iter()
            .find(|category| category.id == expense.category_id)
            .map_or("?", |category| category.name.as_ref());

        println!(
            "{:>4}  {}  {:>10.2}  {:<15} {}",
            expense.id,
            expense.date,
            expense.amount,
            category_name,
            expense.notes.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

fn print_totals(
    range: &DateRange,
    totals: &[CategoryTotal],
    json: bool,
) -> Result<(), Box<dyn Error>> {
    if json {
        return print_json(&totals);
    }

    println!("Spending in {range}");
    for total in totals {
        println!("  {:<20} {:>10.2}", total.category_name, total.total);
    }
    let sum: f64 = totals.iter().map(|total| total.total).sum();
    println!("  {:<20} {:>10.2}", "Total", sum);

    Ok(())
}

#[derive(Serialize)]
struct Summary<'a> {
    this_month_total: f64,
    last_month_total: f64,
    this_month: &'a [CategoryTotal],
    recent_expenses: &'a [Expense],
}

fn print_summary(state: &AppState, recent: usize, json: bool) -> Result<(), Box<dyn Error>> {
    let summary = Summary {
        this_month_total: state.this_month_total(),
        last_month_total: state.last_month_total(),
        this_month: &state.this_month,
        recent_expenses: state.recent_expenses(recent),
    };

    if json {
        return print_json(&summary);
    }

    println!("This month: {:.2}", summary.this_month_total);
    println!("Last month: {:.2}", summary.last_month_total);
    println!();
    for total in summary.this_month.iter().filter(|total| total.total > 0.0) {
        println!("  {:<20} {:>10.2}", total.category_name, total.total);
    }
    println!();
    println!("Recent expenses:");
    print_expenses(summary.recent_expenses, &state.categories, false)
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_log).init();
}
