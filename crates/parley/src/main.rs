//! A terminal client that runs multi-agent deliberations and renders
//! them as they stream in.

#[macro_use]
extern crate tracing;

use std::collections::HashSet;
use std::env;
use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use parley::ClientBuilder;
use parley::model::{
    ApiKeys, StreamEvent, is_arbiter_participant, is_user_participant,
};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let api_keys = ApiKeys {
        openai: env::var("OPENAI_API_KEY").ok(),
        gemini: env::var("GEMINI_API_KEY").ok(),
        deepseek: env::var("DEEPSEEK_API_KEY").ok(),
    };
    if api_keys == ApiKeys::default() {
        eprintln!(
            "No provider API keys are set; the backend will fall back to \
             local models."
        );
    }
    let max_rounds = env::var("PARLEY_MAX_ROUNDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3);
    let show_reasoning = env::var("PARLEY_SHOW_REASONING")
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut builder = ClientBuilder::new()
        .with_api_keys(api_keys)
        .with_max_rounds(max_rounds)
        .with_show_reasoning(show_reasoning)
        .on_event({
            let event_tx = event_tx.clone();
            move |event, state| {
                event_tx
                    .send((event.clone(), state.current_round()))
                    .ok();
            }
        });
    if let Ok(base_url) = env::var("PARLEY_BASE_URL") {
        builder = builder.with_base_url(base_url);
    }
    let mut session = builder.build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut renderer = Renderer::new(show_reasoning);

    loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let question = line.trim().to_owned();
        if question.is_empty() {
            continue;
        }

        if let Err(err) = session.submit(&question).await {
            eprintln!(
                "{}",
                format!("Failed to start deliberation: {err}").red()
            );
            continue;
        }

        renderer.begin();
        let mut run_task = tokio::spawn(async move {
            let mut session = session;
            session.run().await;
            session
        });

        let mut round = 1u32;
        let mut progress_bar: Option<ProgressBar> = None;
        loop {
            // Create a new progress bar if it has been finished.
            progress_bar
                .get_or_insert_with(|| {
                    let progress_bar = ProgressBar::new_spinner();
                    progress_bar.set_style(progress_style.clone());
                    progress_bar.set_message(format!(
                        "Agents deliberating (round {round})..."
                    ));
                    progress_bar
                })
                .inc(1);

            let sleep = sleep(Duration::from_millis(100));
            let received = select! {
                received = event_rx.recv() => received,
                finished = &mut run_task => {
                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    // Render whatever arrived between the last event and
                    // the session finishing.
                    while let Ok((event, _)) = event_rx.try_recv() {
                        renderer.render(&event);
                    }
                    session = finished.expect("the session task panicked");
                    break;
                }
                _ = sleep => {
                    continue;
                }
            };

            // Finish the progress bar before printing anything else.
            if let Some(progress_bar) = progress_bar.take() {
                progress_bar.finish_and_clear();
            }

            if let Some((event, new_round)) = received {
                round = new_round;
                renderer.render(&event);
            }
        }
        println!();
    }
}

/// Prints stream events as they arrive, one message block per
/// `(participant, round)` key.
struct Renderer {
    show_reasoning: bool,
    streaming_key: Option<(String, u32)>,
    streamed: HashSet<(String, u32)>,
}

impl Renderer {
    fn new(show_reasoning: bool) -> Self {
        Self {
            show_reasoning,
            streaming_key: None,
            streamed: HashSet::new(),
        }
    }

    fn begin(&mut self) {
        self.streaming_key = None;
        self.streamed.clear();
    }

    fn visible(&self, agent: &str) -> bool {
        self.show_reasoning
            || is_user_participant(agent)
            || is_arbiter_participant(agent)
    }

    fn render(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Token {
                agent,
                content,
                round,
            } => {
                if !self.visible(agent) {
                    return;
                }
                let key = (agent.clone(), *round);
                if self.streaming_key.as_ref() != Some(&key) {
                    self.print_header(agent, *round);
                    self.streaming_key = Some(key.clone());
                    self.streamed.insert(key);
                }
                print!("{content}");
                std::io::stdout().flush().ok();
            }
            StreamEvent::Message {
                agent,
                content,
                round,
            } => {
                if !self.visible(agent) {
                    return;
                }
                let key = (agent.clone(), *round);
                if self.streamed.contains(&key) {
                    // Already rendered token by token; just terminate
                    // the line.
                    if self.streaming_key.as_ref() == Some(&key) {
                        println!();
                        self.streaming_key = None;
                    }
                    return;
                }
                self.print_header(agent, *round);
                println!("{content}");
                self.streaming_key = None;
                self.streamed.insert(key);
            }
            // The round is already shown by the spinner.
            StreamEvent::RoundUpdate { .. } => {}
            StreamEvent::Final { .. } => {
                self.end_streaming_line();
                println!(
                    "{}",
                    format!("{BAR_CHAR}deliberation complete")
                        .bright_black()
                );
            }
            StreamEvent::Error { message } => {
                self.end_streaming_line();
                let message = message
                    .as_deref()
                    .unwrap_or("unspecified backend error");
                println!(
                    "{}",
                    format!("{BAR_CHAR}backend error: {message}").red()
                );
            }
        }
    }

    fn print_header(&mut self, agent: &str, round: u32) {
        self.end_streaming_line();
        if is_arbiter_participant(agent) {
            println!(
                "\n{}{}",
                BAR_CHAR.bright_magenta(),
                format!("{agent} · final answer").bright_white().bold()
            );
        } else {
            println!(
                "\n{}{}",
                BAR_CHAR.bright_cyan(),
                format!("{agent} · round {round}").bright_white()
            );
        }
    }

    fn end_streaming_line(&mut self) {
        if self.streaming_key.take().is_some() {
            println!();
        }
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
