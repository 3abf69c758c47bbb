use anyhow::Result;
use clap::Parser;
use sagepixel_core::*;
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

const SUGGESTIONS: &[&str] = &[
    "Nature", "City", "Animals", "Space", "Ocean", "Mountains", "Flowers", "Cars",
    "Architecture", "Food", "Art", "Technology", "People", "Travel", "Music",
];

#[derive(Parser)]
#[command(author, version, about = "Browse and save Pexels wallpapers from the terminal")]
struct Cli {
    /// Search query to start with (curated feed when omitted)
    #[arg(short, long)]
    query: Option<String>,

    /// Photos fetched per page
    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    per_page: u32,
}

struct SageCliApp {
    feed: FeedController,
    fetcher: Box<dyn FetchPhotos>,
    config: Config,
}

impl SageCliApp {
    fn new(per_page: u32) -> Result<Self> {
        let client_config = ClientConfig::from_env()?.with_per_page(per_page);
        let config = Config::new()?;

        Ok(SageCliApp {
            feed: FeedController::new(),
            fetcher: Box::new(PexelsClient::new(client_config)),
            config,
        })
    }

    /// Runs due fetches to completion, waiting out a pending debounce.
    fn pump(&mut self) {
        loop {
            if let Some(request) = self.feed.poll(Instant::now()) {
                let result = self.fetcher.fetch_page(&request.query, request.page);
                self.feed.complete(&request, result);
                continue;
            }
            if self.feed.debounce_pending() {
                thread::sleep(Duration::from_millis(25));
                continue;
            }
            break;
        }
    }

    fn show_menu(&self) {
        println!("\n=== SagePixel - Wallpaper Browser ===");
        let query = self.feed.debounced_query();
        if query.is_empty() {
            println!("Curated feed");
        } else {
            println!("Search: \"{}\"", query);
        }

        if self.feed.phase() == Phase::Error {
            println!(
                "Error: {}",
                self.feed.error_message().unwrap_or("request failed")
            );
        }

        for (index, photo) in self.feed.items().iter().enumerate() {
            println!("{:3}. {}", index + 1, photo.title);
        }
        println!(
            "Showing {} of {} wallpapers{}",
            self.feed.displayed_count(),
            self.feed.total_count(),
            if self.feed.is_exhausted() { " (end of results)" } else { "" }
        );
        println!();

        println!("0. Saved wallpapers");
        println!("1. Search");
        println!("2. Suggestions");
        if self.feed.is_exhausted() {
            println!("3. Load more (unavailable - end of results)");
        } else {
            println!("3. Load more");
        }
        println!("4. Refresh");
        if self.feed.phase() == Phase::Error {
            println!("5. Retry last request");
        }
        println!("v N. View wallpaper N | d N. Download wallpaper N");
        println!("q. Quit");
        print!("\nSelect an option: ");
        io::stdout().flush().unwrap();
    }

    fn run(&mut self) -> Result<()> {
        loop {
            self.show_menu();

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            let input = input.trim();
            let (cmd, arg) = match input.split_once(' ') {
                Some((cmd, arg)) => (cmd, arg.trim()),
                None => (input, ""),
            };

            match cmd {
                "0" => self.show_saved(),
                "1" => {
                    let text = if arg.is_empty() {
                        prompt("Search wallpapers: ")?
                    } else {
                        arg.to_string()
                    };
                    self.feed.set_query_text(&text, Instant::now());
                    self.pump();
                }
                "2" => self.pick_suggestion()?,
                "3" => {
                    if self.feed.is_exhausted() {
                        println!("Nothing more to load.");
                    } else {
                        self.feed.load_more();
                        self.pump();
                    }
                }
                "4" => {
                    self.feed.refresh();
                    self.pump();
                }
                "5" => {
                    self.feed.retry();
                    self.pump();
                }
                "v" => self.view_photo(arg),
                "d" => self.download(arg),
                "q" => {
                    println!("Exiting SagePixel...");
                    break;
                }
                _ => println!("Invalid option."),
            }
        }

        Ok(())
    }

    fn pick_suggestion(&mut self) -> Result<()> {
        for (index, suggestion) in SUGGESTIONS.iter().enumerate() {
            println!("{:2}. {}", index + 1, suggestion);
        }
        let choice = prompt("Pick a suggestion: ")?;
        match choice.parse::<usize>() {
            Ok(n) if n >= 1 && n <= SUGGESTIONS.len() => {
                self.feed.select_suggestion(SUGGESTIONS[n - 1]);
                self.pump();
            }
            _ => println!("Invalid suggestion."),
        }
        Ok(())
    }

    fn photo_at(&self, arg: &str) -> Option<Photo> {
        let index = arg.parse::<usize>().ok()?;
        self.feed.items().get(index.checked_sub(1)?).cloned()
    }

    fn view_photo(&self, arg: &str) {
        match self.photo_at(arg) {
            Some(photo) => {
                println!("\n{}", photo.title);
                println!("Provider: {}", photo.provider);
                println!("Original: {}", photo.src.original);
                println!("Medium:   {}", photo.src.medium);
                println!("Small:    {}", photo.src.small);
            }
            None => println!("No wallpaper at that position."),
        }
    }

    fn download(&self, arg: &str) {
        match self.photo_at(arg) {
            Some(photo) => match download_photo(&photo, &self.config) {
                Ok(path) => println!("Saved to {}", path.display()),
                Err(e) => eprintln!("Failed to download: {}", e),
            },
            None => println!("No wallpaper at that position."),
        }
    }

    fn show_saved(&self) {
        match list_downloads(&self.config) {
            Ok(records) if records.is_empty() => println!("No saved wallpapers yet."),
            Ok(records) => {
                for record in records {
                    println!("{}  ({})", record.filename, record.title);
                }
            }
            Err(e) => eprintln!("Failed to read saved wallpapers: {}", e),
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn main() -> Result<()> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).
    let cli = Cli::parse();

    let mut app = SageCliApp::new(cli.per_page)?;
    if let Some(query) = cli.query {
        app.feed.select_suggestion(&query);
    }
    app.pump();

    let report = app.feed.splash_report();
    if report.images_loaded {
        println!("SagePixel ready: {} wallpapers loaded", report.total_images);
    }

    app.run()
}
