//! Plaza command-line driver
//!
//! Reads and edits the shared wallet and plays single rounds of each game
//! from the command line.

use clap::{Parser, Subcommand, ValueEnum};
use plaza::{
    config::ConfigLoader,
    errors::{PlazaError, PlazaResult, RoundError},
    games::{
        blackjack::Turn,
        crash::{CrashTick, RiskTier},
        mines::Reveal,
        roulette::{OutsideBet, RouletteBet, SpinFrame},
        slots::{PaylineMode, SpinProgress},
    },
    Plaza, RoundRecord,
};
use rand::seq::SliceRandom;
use std::{path::PathBuf, time::Duration};

/// Plaza wallet and casino CLI
#[derive(Parser)]
#[command(name = "plaza")]
#[command(about = "Shared wallet and fair-payout casino games")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the wallet balance
    Balance,

    /// Restore the default balance
    Reset,

    /// Overwrite the balance
    Set {
        /// New balance; negative or unreadable input becomes 0
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Show recently settled rounds
    History {
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Cursor printed by a previous page
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Spin the roulette wheel
    Roulette {
        /// Amount placed on each bet
        #[arg(short, long)]
        bet: u64,

        /// Straight bet on a number 0-36
        #[arg(short, long)]
        number: Option<u8>,

        /// Outside bet
        #[arg(short, long, value_enum)]
        outside: Option<OutsideArg>,
    },

    /// Reveal tiles on the mines grid, then cash out
    Mines {
        #[arg(short, long)]
        bet: u64,

        /// Mines hidden on the grid
        #[arg(short, long)]
        mines: Option<u8>,

        /// Safe tiles to reveal before cashing out
        #[arg(short, long, default_value = "3")]
        picks: u8,
    },

    /// Drop balls down the peg board
    Plinko {
        /// Bet per ball
        #[arg(short, long)]
        bet: u64,

        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Start column 0-12
        #[arg(short, long, default_value = "6")]
        column: usize,
    },

    /// Play one hand of blackjack
    Blackjack {
        #[arg(short, long)]
        bet: u64,

        /// Hit while the hand totals less than this
        #[arg(short, long, default_value = "17")]
        stand_on: u8,
    },

    /// Spin the reels
    Slots {
        #[arg(short, long)]
        bet: u64,

        #[arg(short, long, value_enum, default_value = "middle")]
        mode: ModeArg,
    },

    /// Ride the crash curve
    Crash {
        #[arg(short, long)]
        bet: u64,

        #[arg(short, long, value_enum, default_value = "medium")]
        risk: RiskArg,

        /// Cash out once the readout reaches this multiplier
        #[arg(short = 'x', long, default_value = "2.0")]
        cash_out_at: f64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutsideArg {
    Red,
    Black,
    Even,
    Odd,
    Low,
    High,
}

impl From<OutsideArg> for OutsideBet {
    fn from(arg: OutsideArg) -> Self {
        match arg {
            OutsideArg::Red => OutsideBet::Red,
            OutsideArg::Black => OutsideBet::Black,
            OutsideArg::Even => OutsideBet::Even,
            OutsideArg::Odd => OutsideBet::Odd,
            OutsideArg::Low => OutsideBet::Low,
            OutsideArg::High => OutsideBet::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Middle,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum RiskArg {
    Low,
    Medium,
    High,
}

impl From<RiskArg> for RiskTier {
    fn from(arg: RiskArg) -> Self {
        match arg {
            RiskArg::Low => RiskTier::Low,
            RiskArg::Medium => RiskTier::Medium,
            RiskArg::High => RiskTier::High,
        }
    }
}

const CRASH_TICK: Duration = Duration::from_millis(50);

fn main() -> PlazaResult<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "plaza=debug" } else { "plaza=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;
    let plaza = Plaza::open(config)?;

    let result = run(&plaza, cli.command);
    match result {
        Err(PlazaError::Round(e)) => {
            // Rejections are messages for the player, not failures
            println!("{}", user_message(&e));
            Ok(())
        }
        other => other,
    }
}

fn run(plaza: &Plaza, command: Commands) -> PlazaResult<()> {
    match command {
        Commands::Balance => {
            println!("Balance: {} sh", plaza.wallet().balance()?);
        }
        Commands::Reset => {
            println!("Balance reset to {} sh", plaza.wallet().reset()?);
        }
        Commands::Set { value } => {
            let value = parse_balance(&value);
            plaza.wallet().set(value)?;
            println!("Balance set to {} sh", value);
        }
        Commands::History { limit, cursor } => show_history(plaza, limit, cursor.as_deref())?,
        Commands::Roulette { bet, number, outside } => play_roulette(plaza, bet, number, outside)?,
        Commands::Mines { bet, mines, picks } => play_mines(plaza, bet, mines, picks)?,
        Commands::Plinko { bet, count, column } => play_plinko(plaza, bet, count, column)?,
        Commands::Blackjack { bet, stand_on } => play_blackjack(plaza, bet, stand_on)?,
        Commands::Slots { bet, mode } => play_slots(plaza, bet, mode)?,
        Commands::Crash {
            bet,
            risk,
            cash_out_at,
        } => play_crash(plaza, bet, risk.into(), cash_out_at)?,
    }
    Ok(())
}

/// Balance edits accept anything: garbage and negatives become 0, fractions floor
fn parse_balance(input: &str) -> u64 {
    match input.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.floor().min(u64::MAX as f64) as u64,
        _ => 0,
    }
}

fn user_message(error: &RoundError) -> String {
    match error {
        RoundError::InsufficientFunds { .. } => "Not enough balance.".to_string(),
        other => other.to_string(),
    }
}

fn print_round(plaza: &Plaza, record: &RoundRecord) -> PlazaResult<()> {
    println!(
        "{} round {}: stake {} sh, payout {} sh ({:?})",
        record.game, record.round_id, record.stake, record.payout, record.outcome
    );
    println!("  seed {} (commitment {})", record.fairness.seed, record.fairness.commitment);
    println!("  balance {} sh", plaza.wallet().balance()?);
    Ok(())
}

fn show_history(plaza: &Plaza, limit: usize, cursor: Option<&str>) -> PlazaResult<()> {
    let Some(journal) = plaza.journal() else {
        println!("No journal configured");
        return Ok(());
    };

    let limit = limit.min(plaza.config().storage.history_limit);
    let (records, next) = journal.recent(cursor, limit)?;
    if records.is_empty() {
        println!("No rounds yet");
    }
    for record in &records {
        println!(
            "{}  {:<9} stake {:>6}  payout {:>7}  {:?}",
            record.settled_at.format("%Y-%m-%d %H:%M:%S"),
            record.game.to_string(),
            record.stake,
            record.payout,
            record.outcome
        );
    }
    if let Some(next) = next {
        println!("More: --cursor {}", next);
    }

    let stats = journal.load_stats()?;
    println!(
        "{} rounds, {} sh staked, {} sh paid out",
        stats.rounds, stats.total_staked, stats.total_paid_out
    );
    Ok(())
}

fn play_roulette(plaza: &Plaza, bet: u64, number: Option<u8>, outside: Option<OutsideArg>) -> PlazaResult<()> {
    let mut bets = Vec::new();
    if let Some(kind) = outside {
        bets.push(RouletteBet::Outside {
            kind: kind.into(),
            amount: bet,
        });
    }
    if let Some(number) = number {
        bets.push(RouletteBet::Straight { number, amount: bet });
    }
    if bets.is_empty() {
        return Err(RoundError::InvalidInput("Choose a number or an outside bet".to_string()).into());
    }

    let mut game = plaza.roulette();
    let spin = game.spin(bets)?;
    println!("Spinning… ({} frames)", spin.frames);

    let record = loop {
        if let SpinFrame::Stopped(record) = game.advance_frame()? {
            break record;
        }
    };
    if let plaza::games::RoundDetail::Roulette { pocket, color, .. } = &record.detail {
        println!("Landed on {} {}", pocket, color);
    }
    print_round(plaza, &record)
}

fn play_mines(plaza: &Plaza, bet: u64, mines: Option<u8>, picks: u8) -> PlazaResult<()> {
    let mut game = plaza.mines();
    let mines = mines.unwrap_or(plaza.config().mines.default_mines);
    game.start(bet, mines)?;

    let mut tiles: Vec<u8> = (0..game.tiles()).collect();
    tiles.shuffle(&mut rand::thread_rng());

    for tile in tiles {
        match game.reveal(tile)? {
            Reveal::Mine(record) => {
                println!("Tile {}: mine!", tile);
                return print_round(plaza, &record);
            }
            Reveal::Safe {
                picks: so_far,
                multiplier,
                cash_out_value,
            } => {
                println!("Tile {}: safe ({:.2}×, cash out {} sh)", tile, multiplier, cash_out_value);
                if so_far >= picks || so_far == game.tiles() - mines {
                    break;
                }
            }
            Reveal::AlreadyRevealed => {}
        }
    }

    let record = game.cash_out()?;
    print_round(plaza, &record)
}

fn play_plinko(plaza: &Plaza, bet: u64, count: u32, column: usize) -> PlazaResult<()> {
    let mut game = plaza.plinko();
    game.drop_balls(bet, count, column)?;
    println!("Dropping {}…", count);

    while game.balls_in_flight() > 0 {
        for record in game.advance_frame()? {
            if let plaza::games::RoundDetail::Plinko { slot, multiplier_tenths, .. } = record.detail {
                println!(
                    "Landed in {} → {}×  |  +{} sh",
                    slot,
                    multiplier_tenths as f64 / 10.0,
                    record.payout
                );
            }
        }
    }
    println!("Balance {} sh", plaza.wallet().balance()?);
    Ok(())
}

fn play_blackjack(plaza: &Plaza, bet: u64, stand_on: u8) -> PlazaResult<()> {
    let mut game = plaza.blackjack();
    let mut turn = game.deal(bet)?;

    let record = loop {
        match turn {
            Turn::Over(record) => break record,
            Turn::Player { total } if total < stand_on => {
                println!("Hit on {}", total);
                turn = game.hit()?;
            }
            Turn::Player { total } => {
                println!("Stand on {}", total);
                break game.stand()?;
            }
        }
    };

    if let plaza::games::RoundDetail::Blackjack {
        player,
        dealer,
        player_total,
        dealer_total,
        outcome,
    } = &record.detail
    {
        let show = |cards: &[plaza::games::cards::Card]| {
            cards.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
        };
        println!("Player {} ({})", show(player), player_total);
        println!("Dealer {} ({})", show(dealer), dealer_total);
        println!("Result: {}", outcome);
    }
    print_round(plaza, &record)
}

fn play_slots(plaza: &Plaza, bet: u64, mode: ModeArg) -> PlazaResult<()> {
    let mode = match mode {
        ModeArg::Middle => PaylineMode::Middle,
        ModeArg::All => PaylineMode::All,
    };

    let mut game = plaza.slots();
    let stops = game.spin(bet, mode)?;
    let mut last = Duration::ZERO;
    let mut record = None;
    for stop in stops {
        if let SpinProgress::Done(done) = game.advance(stop - last)? {
            record = Some(done);
        }
        last = stop;
    }
    let record = match record {
        Some(record) => record,
        None => game.finish()?,
    };

    if let plaza::games::RoundDetail::Slots { grid, wins, .. } = &record.detail {
        for row in grid {
            println!("{} {} {}", row[0], row[1], row[2]);
        }
        for win in wins {
            println!("Row {}: {}× {} → {}×", win.row, win.matched, win.symbol, win.multiplier);
        }
    }
    print_round(plaza, &record)
}

fn play_crash(plaza: &Plaza, bet: u64, risk: RiskTier, target: f64) -> PlazaResult<()> {
    let mut game = plaza.crash();
    game.start(bet, risk)?;
    let target_hundredths = (target * 100.0).round() as u64;

    loop {
        match game.advance(CRASH_TICK)? {
            CrashTick::Rising {
                readout_hundredths, ..
            } if readout_hundredths >= target_hundredths => {
                let record = game.cash_out()?;
                println!("Cashed out at {:.2}×", readout_hundredths as f64 / 100.0);
                return print_round(plaza, &record);
            }
            CrashTick::Rising { .. } => {}
            CrashTick::Crashed(record) => {
                if let plaza::games::RoundDetail::Crash { crash_point, .. } = record.detail {
                    println!("Busted at {:.2}×", crash_point);
                }
                return print_round(plaza, &record);
            }
        }
    }
}
