use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "rateboard")]
#[command(about = "Terminal client for the rateboard rating daemon", long_about = None)]
struct Cli {
    /// Base URL of the rating daemon
    #[arg(long, env = "RATEBOARD_SERVER_URL", default_value = "http://localhost:3000")]
    server: String,

    /// Where the identity cookie and rated flags are kept
    #[arg(long)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all teachers with their current averages
    Show,
    /// Submit a rating for one teacher
    Rate {
        /// Teacher index from the list shown by `show`
        #[arg(long)]
        teacher: i64,
        /// Rating between 1 and 10
        #[arg(long)]
        rating: i64,
    },
    /// Clear every stored rating
    Reset,
}

/// The client's own copy of the fixed teacher list. Index is position.
fn teachers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Ms Anuradha Singh", "DBMS"),
        ("Mr Krishna", "Software Engineering"),
        ("Mr Anurag Tripathi", "Computer Graphic"),
        ("Mr Ramu Padey", "Operation Research"),
    ]
}

/// Per-client state standing in for the browser cookie jar and the
/// local-storage rated flags.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientState {
    user_id: Option<String>,
    rated: Vec<i64>,
}

impl ClientState {
    fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse state file {}", path.display()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchedRecord {
    ratings: Vec<i64>,
    rating_count: i64,
    average_rating: f64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let state_path = cli.state_file.clone().unwrap_or_else(default_state_path);
    let mut state = ClientState::load(&state_path)?;
    let client = reqwest::blocking::Client::new();

    match cli.command {
        Commands::Show => {
            let cache = fetch_ratings(&client, &cli.server)?;
            render(&cache, &state);
        }
        Commands::Rate { teacher, rating } => {
            submit_rating(&client, &cli.server, &state_path, &mut state, teacher, rating)?;
        }
        Commands::Reset => {
            reset_ratings(&client, &cli.server, &state_path, &mut state)?;
        }
    }

    Ok(())
}

fn default_state_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rateboard.json")
}

fn fetch_ratings(
    client: &reqwest::blocking::Client,
    server: &str,
) -> anyhow::Result<BTreeMap<String, FetchedRecord>> {
    let response = client
        .get(format!("{server}/api/get-ratings"))
        .send()
        .context("Failed to fetch ratings. Please try again.")?;
    if !response.status().is_success() {
        bail!("Failed to fetch ratings. Please try again.");
    }
    response
        .json()
        .context("Failed to fetch ratings. Please try again.")
}

fn render(cache: &BTreeMap<String, FetchedRecord>, state: &ClientState) {
    for (index, (name, subject)) in teachers().into_iter().enumerate() {
        let record = cache.get(&index.to_string());
        let average = match record {
            Some(r) if !r.ratings.is_empty() => format!("{:.2}", r.average_rating),
            _ => "No ratings yet".to_string(),
        };
        let count = record.map(|r| r.rating_count).unwrap_or(0);

        println!("[{index}] {name}");
        println!("    Subject: {subject}");
        println!("    Average Rating: {average}");
        println!("    Number of Ratings: {count}");
        if state.rated.contains(&(index as i64)) {
            println!("    You already rated this teacher from this client.");
        }
        println!();
    }
}

fn submit_rating(
    client: &reqwest::blocking::Client,
    server: &str,
    state_path: &Path,
    state: &mut ClientState,
    teacher: i64,
    rating: i64,
) -> anyhow::Result<()> {
    // Defense in depth only; the server re-validates both bounds.
    if !(1..=10).contains(&rating) {
        bail!("Please enter a valid rating between 1 and 10.");
    }
    if teacher < 0 || teacher as usize >= teachers().len() {
        bail!("Unknown teacher index {teacher}.");
    }
    if state.rated.contains(&teacher) {
        println!("You already rated this teacher from this client.");
        return Ok(());
    }

    let mut request = client
        .post(format!("{server}/api/save-rating"))
        .json(&serde_json::json!({ "teacherIndex": teacher, "rating": rating }));
    if let Some(user_id) = &state.user_id {
        request = request.header("Cookie", format!("userId={user_id}"));
    }
    let response = request
        .send()
        .context("Failed to save rating. Please try again.")?;

    // The daemon issues the identity cookie on first contact, even when the
    // submission itself is rejected. Keep whatever it handed out.
    if let Some(user_id) = set_cookie_user_id(&response) {
        state.user_id = Some(user_id);
        save_state(state, state_path)?;
    }

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .context("Failed to save rating. Please try again.")?;

    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("Failed to save rating. Please try again.");
        bail!("{message}");
    }

    state.rated.push(teacher);
    save_state(state, state_path)?;
    println!("Rating saved.");

    // Re-render from fetched state rather than trusting the local cache.
    let cache = fetch_ratings(client, server)?;
    render(&cache, state);
    Ok(())
}

fn reset_ratings(
    client: &reqwest::blocking::Client,
    server: &str,
    state_path: &Path,
    state: &mut ClientState,
) -> anyhow::Result<()> {
    let response = client
        .post(format!("{server}/api/reset-ratings"))
        .send()
        .context("Failed to reset ratings. Please try again.")?;
    if !response.status().is_success() {
        bail!("Failed to reset ratings. Please try again.");
    }
    let body: serde_json::Value = response
        .json()
        .context("Failed to reset ratings. Please try again.")?;
    let message = body
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("All ratings have been reset.");

    state.rated.clear();
    save_state(state, state_path)?;
    println!("{message}");
    Ok(())
}

fn set_cookie_user_id(response: &reqwest::blocking::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            let rest = v.strip_prefix("userId=")?;
            let value = rest.split(';').next()?.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
}

fn save_state(state: &ClientState, path: &Path) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(state)?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write state file {}", path.display()))
}
