//! Bookworm - Library Management command line client
//!
//! Thin front end over the client services: every subcommand maps to one
//! service operation and prints its outcome.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookworm::{
    config::AppConfig,
    models::{reservation::ReservationQuery, user::Session},
    services::catalog::{CatalogQuery, SortKey},
    AppError, AppState,
};

#[derive(Parser, Debug)]
#[command(name = "bookworm", version, about = "Bookworm library client", arg_required_else_help = true)]
struct Cli {
    /// Account email used to sign in
    #[arg(long, global = true, env = "BOOKWORM_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, global = true, env = "BOOKWORM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse the catalogue
    Books {
        /// Restrict to a genre (repeatable)
        #[arg(long = "genre")]
        genres: Vec<String>,
        #[arg(long)]
        available: bool,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "title")]
        sort: SortKey,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show a book with its copies and active reservations
    Book { book_id: i32 },
    /// Type-ahead search on the backend
    Suggest { text: String },
    /// Reserve a copy
    Reserve {
        book_id: i32,
        copy_id: i32,
        /// Borrower email (defaults to the signed-in account)
        #[arg(long = "for")]
        borrower: Option<String>,
        /// Start date, yyyy-MM-dd (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Extend a reservation's due date
    Extend { book_id: i32, reservation_id: i32 },
    /// Mark a reserved copy as returned
    Return { book_id: i32, copy_id: i32 },
    /// List reservations
    Reservations {
        #[arg(long = "book")]
        book_id: Option<i32>,
        #[arg(long)]
        returned: Option<bool>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// List member accounts
    Users {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show the signed-in account
    Whoami,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    init_tracing(&config);

    tracing::debug!("Bookworm client v{} using {}", env!("CARGO_PKG_VERSION"), config.api.base_url);

    let state = AppState::new(config)?;
    let json = cli.json;

    if let Err(e) = run(&state, cli).await {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": e.kind().to_string(), "message": e.message() })
            );
        } else {
            eprintln!("error ({}): {}", e.kind(), e.message());
        }
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bookworm={}", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn sign_in(state: &AppState, cli: &Cli) -> Result<Session, AppError> {
    match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => state.services.auth.sign_in(email, password).await,
        _ => Err(AppError::Authentication(
            "Sign-in required: pass --email and --password (or BOOKWORM_EMAIL / BOOKWORM_PASSWORD)".to_string(),
        )),
    }
}

fn print<T: Serialize + std::fmt::Debug>(json: bool, value: &T) -> Result<(), AppError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{:#?}", value);
    }
    Ok(())
}

async fn run(state: &AppState, cli: Cli) -> Result<(), AppError> {
    let services = &state.services;
    let json = cli.json;

    match &cli.command {
        Command::Books {
            genres,
            available,
            search,
            sort,
            page,
        } => {
            services.catalog.reload().await?;
            let query = CatalogQuery {
                genres: genres.iter().cloned().collect::<BTreeSet<_>>(),
                available_only: *available,
                search_text: search.clone(),
                sort: *sort,
                page: *page,
            };
            let page = services.catalog.browse(&query).await;
            if json {
                print(json, &page)?;
            } else {
                for book in &page.items {
                    println!(
                        "{:>5}  {:<40} {:<25} {:<15} {}",
                        book.book_id,
                        book.title,
                        book.author_name,
                        book.genre_name,
                        if book.is_available { "available" } else { "reserved" }
                    );
                }
                println!("page {}/{} ({} books)", page.page, page.total_pages, page.total);
            }
        }
        Command::Book { book_id } => {
            let desk = services.reservations.open_book(*book_id).await?;
            let book = desk.book().await;
            let active = desk.list_active_reservations(*book_id).await;
            if json {
                print(json, &serde_json::json!({ "book": book, "active_reservations": active }))?;
            } else {
                println!("{} by {} (ISBN {}, {})", book.title, book.author_name, book.isbn, book.genre_name);
                for copy in &book.copies {
                    match active.iter().find(|r| r.copy == copy.copy_id) {
                        Some(r) => println!(
                            "  copy {:>5}  reserved by {} until {} (reservation {})",
                            copy.copy_id, r.user_email, r.due_date, r.reservation_id
                        ),
                        None if copy.is_available => println!("  copy {:>5}  available", copy.copy_id),
                        None => println!("  copy {:>5}  unavailable", copy.copy_id),
                    }
                }
            }
            desk.close().await;
        }
        Command::Suggest { text } => {
            let books = services.catalog.suggest(text).await?;
            print(json, &books)?;
        }
        Command::Reserve {
            book_id,
            copy_id,
            borrower,
            date,
        } => {
            let session = sign_in(state, &cli).await?;
            let borrower = borrower.clone().unwrap_or_else(|| session.user.email.clone());
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());

            let desk = services.reservations.open_book(*book_id).await?;
            let reservation = desk.reserve(&session, *book_id, *copy_id, &borrower, date).await?;
            print(json, &reservation)?;
        }
        Command::Extend {
            book_id,
            reservation_id,
        } => {
            let session = sign_in(state, &cli).await?;
            let desk = services.reservations.open_book(*book_id).await?;
            let due = desk.extend_due_date(&session, *reservation_id).await?;
            print(json, &serde_json::json!({ "reservation_id": reservation_id, "due_date": due }))?;
        }
        Command::Return { book_id, copy_id } => {
            let session = sign_in(state, &cli).await?;
            let desk = services.reservations.open_book(*book_id).await?;
            let copy = desk.mark_returned(&session, *book_id, *copy_id).await?;
            print(json, &copy)?;
        }
        Command::Reservations {
            book_id,
            returned,
            page,
        } => {
            let session = sign_in(state, &cli).await?;
            let query = ReservationQuery {
                book_id: *book_id,
                returned: *returned,
            };
            let page = services.reservations.overview(&session, &query, *page).await?;
            if json {
                print(json, &page)?;
            } else {
                for row in &page.items {
                    let r = &row.reservation;
                    println!(
                        "{:>5}  {:<30} copy {:>5}  {:<30} {} -> {}  {}",
                        r.reservation_id, r.book_title, r.copy, r.user_email, r.start_date, r.due_date, row.status
                    );
                }
                println!("page {}/{} ({} reservations)", page.page, page.total_pages, page.total);
            }
        }
        Command::Users { page } => {
            let session = sign_in(state, &cli).await?;
            let page = services.users.page(&session, *page).await?;
            print(json, &page)?;
        }
        Command::Whoami => {
            sign_in(state, &cli).await?;
            let user = services.auth.me().await?;
            print(json, &user)?;
        }
    }

    Ok(())
}
