//! Queue Tester CLI Tool
//!
//! Runs the party queue service in-process and drives it with simulated
//! participants.
//!
//! Usage:
//!   cargo run --bin queue-tester -- --help
//!   cargo run --bin queue-tester simulate --participants 40 --size 4
//!   cargo run --bin queue-tester scenario --name squad-mixed
//!   cargo run --bin queue-tester run-all-scenarios

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use party_queue::config::AppConfig;
use party_queue::events::MockEventPublisher;
use party_queue::queue::QueueStores;
use party_queue::service::AppState;
use party_queue::types::{GroupKind, MatchFormed, ParticipantId, QueueSize};

#[derive(Parser)]
#[command(name = "queue-tester")]
#[command(about = "In-process load simulator for the party-queue matchmaking queue")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Drain cooldown used by the simulated service
    #[arg(long, default_value = "20")]
    cooldown_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect participants, form parties and queue every leader
    Simulate {
        /// Number of simulated participants
        #[arg(short, long, default_value = "40")]
        participants: u64,
        /// Target match size (2 or 4)
        #[arg(short, long, default_value = "4")]
        size: usize,
        /// Largest party to form before queueing
        #[arg(short, long, default_value = "3")]
        max_party: usize,
    },
    /// Run a predefined scenario
    Scenario {
        /// Scenario name (duo-solos, squad-mixed, squad-pairs)
        #[arg(short, long)]
        name: String,
    },
    /// Run all predefined scenarios
    RunAllScenarios,
}

/// A scenario lists the party sizes to queue and the matches expected
struct Scenario {
    name: &'static str,
    size: QueueSize,
    parties: Vec<usize>,
    expected_matches: u64,
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "duo-solos",
            size: QueueSize::Duo,
            parties: vec![1, 1, 1, 1, 1],
            expected_matches: 2,
        },
        Scenario {
            name: "squad-mixed",
            size: QueueSize::Squad,
            parties: vec![2, 3, 1, 1],
            expected_matches: 1,
        },
        Scenario {
            name: "squad-pairs",
            size: QueueSize::Squad,
            parties: vec![3, 3, 1, 1],
            expected_matches: 2,
        },
    ]
}

fn find_scenario(name: &str) -> Option<Scenario> {
    scenarios()
        .into_iter()
        .find(|scenario| scenario.name == name.to_lowercase())
}

struct Harness {
    app: Arc<AppState>,
    publisher: Arc<MockEventPublisher>,
    next_id: ParticipantId,
}

impl Harness {
    fn new(cooldown_ms: u64) -> Result<Self> {
        let mut config = AppConfig::default();
        config.queue.drain_cooldown_ms = cooldown_ms;

        let publisher = Arc::new(MockEventPublisher::new());
        let app = AppState::with_components(config, QueueStores::in_memory(), publisher.clone())?;

        Ok(Self {
            app: Arc::new(app),
            publisher,
            next_id: 1,
        })
    }

    /// Connect `size` participants and merge them into one party.
    /// Returns the leader.
    fn form_party(&mut self, size: usize) -> Result<ParticipantId> {
        let api = self.app.api();
        let leader = self.next_id;
        for id in leader..leader + size as u64 {
            if !api.connect(id) {
                anyhow::bail!("failed to connect participant {}", id);
            }
            if id != leader && !api.request_join_group(GroupKind::Party, id, leader, None) {
                anyhow::bail!("participant {} could not join party {}", id, leader);
            }
        }
        self.next_id += size as u64;
        Ok(leader)
    }

    /// Queue every leader, then keep draining until a pass forms nothing
    async fn queue_and_settle(&self, leaders: &[ParticipantId], size: QueueSize) -> Result<()> {
        let api = self.app.api();
        for leader in leaders {
            if !api.enqueue_for_match(*leader, size.target()).await {
                anyhow::bail!("failed to queue leader {}", leader);
            }
        }

        let queue = self.app.queue();
        let cooldown = queue.options().drain_cooldown;
        loop {
            tokio::time::sleep(cooldown + Duration::from_millis(5)).await;
            match queue.trigger_drain(size).await {
                Some(outcome) if outcome.formed().is_some() => continue,
                Some(_) => break,
                None => continue,
            }
        }
        Ok(())
    }

    fn matches(&self) -> Vec<MatchFormed> {
        self.publisher.get_published_events()
    }
}

fn print_matches(matches: &[MatchFormed]) {
    for (i, formed) in matches.iter().enumerate() {
        println!(
            "  Match {}: {} (leader {}, parties {:?}, members {:?}{})",
            i + 1,
            formed.match_id,
            formed.leader,
            formed.party_leaders,
            formed.members,
            if formed.under_filled {
                ", under-filled"
            } else {
                ""
            }
        );
    }
}

async fn run_scenario(scenario: &Scenario, cooldown_ms: u64) -> Result<bool> {
    let mut harness = Harness::new(cooldown_ms)?;
    let leaders = scenario
        .parties
        .iter()
        .map(|size| harness.form_party(*size))
        .collect::<Result<Vec<_>>>()?;

    harness.queue_and_settle(&leaders, scenario.size).await?;

    let formed = harness.app.metrics().matches_formed();
    print_matches(&harness.matches());
    Ok(formed == scenario.expected_matches)
}

async fn simulate(
    participants: u64,
    size: QueueSize,
    max_party: usize,
    cooldown_ms: u64,
) -> Result<()> {
    let mut harness = Harness::new(cooldown_ms)?;
    let pattern = [1usize, 2, 1, 3];
    let cap = max_party.clamp(1, size.target());

    let started = Instant::now();
    let mut leaders = Vec::new();
    let mut remaining = participants as usize;
    for party_size in pattern.iter().cycle() {
        if remaining == 0 {
            break;
        }
        let party_size = (*party_size).min(cap).min(remaining);
        leaders.push(harness.form_party(party_size)?);
        remaining -= party_size;
    }
    println!(
        "👥 Connected {} participants in {} parties",
        participants,
        leaders.len()
    );

    harness.queue_and_settle(&leaders, size).await?;

    let stats = harness.app.stats().await?;
    let matches = harness.matches();
    let matched: usize = matches.iter().map(|formed| formed.members.len()).sum();

    println!("📊 Simulation results:");
    println!("  Matches formed: {}", stats.matches_formed);
    println!("  Participants matched: {}", matched);
    println!("  Parties still queued: {}", stats.queued_parties);
    println!("  Active matches: {}", stats.active_matches);
    println!("  Elapsed: {}ms", started.elapsed().as_millis());
    print_matches(&matches);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            participants,
            size,
            max_party,
        } => {
            let size = QueueSize::try_from(size)?;
            println!(
                "🧪 Simulating {} participants queueing for matches of {}",
                participants, size
            );
            simulate(participants, size, max_party, cli.cooldown_ms).await?;
        }

        Commands::Scenario { name } => {
            let Some(scenario) = find_scenario(&name) else {
                eprintln!(
                    "❌ Unknown scenario '{}'. Available: duo-solos, squad-mixed, squad-pairs",
                    name
                );
                std::process::exit(1);
            };

            println!("🧪 Running scenario: {}", scenario.name);
            if run_scenario(&scenario, cli.cooldown_ms).await? {
                println!("✅ Scenario completed successfully!");
            } else {
                println!("❌ Scenario formed an unexpected number of matches.");
                std::process::exit(1);
            }
        }

        Commands::RunAllScenarios => {
            let mut passed = 0;
            let mut failed = 0;

            println!("🧪 Running all test scenarios...\n");

            for scenario in scenarios() {
                println!("Running '{}' scenario...", scenario.name);
                match run_scenario(&scenario, cli.cooldown_ms).await {
                    Ok(true) => {
                        println!("✅ PASSED");
                        passed += 1;
                    }
                    Ok(false) => {
                        println!("❌ FAILED (unexpected match count)");
                        failed += 1;
                    }
                    Err(e) => {
                        println!("❌ FAILED ({})", e);
                        failed += 1;
                    }
                }
            }

            println!("\n📊 Results: {} passed, {} failed", passed, failed);
            if failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
