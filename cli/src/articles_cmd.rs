//! `riskboard articles` - walk the article list page by page.

use clap::Parser;
use owo_colors::OwoColorize;
use riskboard_sync::ListQuery;
use riskboard_sync::LoadMode;
use riskboard_sync::PageOutcome;
use riskboard_sync::PageState;
use std::path::Path;

#[derive(Debug, Parser)]
pub struct ArticlesArgs {
    /// Selection key
    pub key: String,

    /// Maximum number of pages to load
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Extra list filter, repeatable (NAME=VALUE)
    #[arg(long = "filter", value_name = "NAME=VALUE", value_parser = crate::parse_filter)]
    pub filters: Vec<(String, String)>,

    /// Output the final list state as JSON
    #[arg(long)]
    pub json: bool,
}

impl ArticlesArgs {
    fn query(&self) -> ListQuery {
        self.filters
            .iter()
            .fold(ListQuery::new(self.key.as_str()), |query, (name, value)| {
                query.filter(name.as_str(), value.as_str())
            })
    }
}

pub async fn run_articles(config_path: Option<&Path>, args: ArticlesArgs) -> i32 {
    let engine = match crate::load_engine(config_path) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red());
            return 2;
        }
    };

    let query = args.query();
    let mut mode = LoadMode::Reset;
    for page in 1..=args.pages {
        match engine.load_page(&query, mode).await {
            PageOutcome::Loaded(state) => {
                tracing::debug!(page, items = state.items.len(), total = state.total, "page loaded");
                if !state.has_more {
                    break;
                }
            }
            PageOutcome::Failed(_)
            | PageOutcome::Skipped(_)
            | PageOutcome::Superseded
            | PageOutcome::Cancelled => break,
        }
        mode = LoadMode::More;
    }

    let state = engine.page_state();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&state).unwrap_or_default());
    } else {
        print_human_page(&state);
    }

    if state.error.is_some() { 2 } else { 0 }
}

fn print_human_page(state: &PageState) {
    println!(
        "\n {} {} of {}\n",
        "Articles".bold(),
        state.items.len(),
        state.total
    );
    for (index, article) in state.items.iter().enumerate() {
        let outlet = article.outlet.as_deref().unwrap_or("-");
        let date = article.date.as_deref().unwrap_or("");
        println!("{:>4}. {} {} {}", index + 1, article.title, outlet.dimmed(), date.dimmed());
    }
    println!();

    if let Some(error) = &state.error {
        println!("{} [{}] {}", "ERROR".red(), error.code, error.message);
    } else if state.has_more {
        println!("More available (use --pages to load further)");
    } else {
        println!("{}", "End of list".green());
    }
}
