//! Claimward CLI — `claimward` command.
//!
//! Operator tooling for a claimward database: schema setup, claim-block
//! balances, inactive users, user groups, claim worlds, and trust changes.
//! Every command runs as the console, which bypasses claim permissions.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use claimward::actions::{self, ClaimBlockOperation, Message, MessageSink};
use claimward::storage::schema::CURRENT_SCHEMA_VERSION;
use claimward::{Actor, ClaimContext, ClaimId, Gateway, Settings, User, World};

// ── CLI structure ─────────────────────────────────────────────────────────────

/// Claimward CLI — inspect and administer claim data shared by a server
/// network.
#[derive(Parser, Debug)]
#[command(
    name = "claimward",
    about = "Claimward CLI",
    version,
    long_about = "claimward — Claimward CLI\n\nInspect and administer the claim-block ledger, user groups,\nclaim worlds, and claim trust stored in a claimward database."
)]
struct Cli {
    /// Settings file (defaults apply if it does not exist)
    #[arg(long, short, global = true, default_value = "claimward.toml")]
    config: PathBuf,

    /// Database file (overrides the settings file)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Server name (overrides the settings file)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or migrate the database schema
    Init,

    /// Show the stored schema version
    Schema,

    /// Show or change a user's claim-block balance
    Blocks {
        /// User name or UUID
        user: String,

        /// show, add, remove or set
        #[arg(default_value = "show")]
        operation: String,

        /// Amount for add, remove and set
        #[arg(allow_hyphen_values = true)]
        amount: Option<i64>,
    },

    /// Query user records
    Users {
        #[command(subcommand)]
        subcommand: UserCommands,
    },

    /// Query user groups
    Groups {
        #[command(subcommand)]
        subcommand: GroupCommands,
    },

    /// Query claim worlds
    Worlds {
        #[command(subcommand)]
        subcommand: WorldCommands,
    },

    /// Grant a trust level in a claim
    Trust {
        /// World name
        world: String,

        /// Claim id
        claim: u64,

        /// User name, UUID, or prefixed group name
        identifier: String,

        /// Trust level alias or id (e.g. containertrust)
        level: String,
    },

    /// Remove trust from a claim
    Untrust {
        /// World name
        world: String,

        /// Claim id
        claim: u64,

        /// User name, UUID, or prefixed group name
        identifier: String,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// Show one user's record
    Show {
        /// User name or UUID
        user: String,
    },
    /// List users who have not logged in for a number of days
    Inactive {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
enum GroupCommands {
    /// List the groups a user owns
    List {
        /// Owner name or UUID
        owner: String,
    },
}

#[derive(Subcommand, Debug)]
enum WorldCommands {
    /// List claim worlds of this server, or of every server with --all
    List {
        #[arg(long)]
        all: bool,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = run(cli);

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    let context = ClaimContext::builder(settings)
        .build()
        .context("failed to open claim storage")?;
    let json = cli.json;
    let verbose = cli.verbose;

    match cli.command {
        Commands::Init => cmd_init(&context, verbose),
        Commands::Schema => cmd_schema(&context, json),
        Commands::Blocks {
            user,
            operation,
            amount,
        } => cmd_blocks(&context, &user, &operation, amount),
        Commands::Users { subcommand } => match subcommand {
            UserCommands::Show { user } => cmd_user_show(&context, &user, json),
            UserCommands::Inactive { days } => cmd_users_inactive(&context, days, json),
        },
        Commands::Groups { subcommand } => match subcommand {
            GroupCommands::List { owner } => cmd_groups_list(&context, &owner, json),
        },
        Commands::Worlds { subcommand } => match subcommand {
            WorldCommands::List { all } => cmd_worlds_list(&context, all, json, verbose),
        },
        Commands::Trust {
            world,
            claim,
            identifier,
            level,
        } => {
            let world = find_world(&context, &world)?;
            let sink = PrintSink::default();
            actions::trust(
                &context,
                &console(),
                &identifier,
                &world,
                ClaimId(claim),
                &level,
                &sink,
            );
            sink.finish()
        }
        Commands::Untrust {
            world,
            claim,
            identifier,
        } => {
            let world = find_world(&context, &world)?;
            let sink = PrintSink::default();
            actions::untrust(
                &context,
                &console(),
                &identifier,
                &world,
                ClaimId(claim),
                &sink,
            );
            sink.finish()
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    if let Some(database) = &cli.database {
        settings.database.file = database.clone();
    }
    if let Some(server) = &cli.server {
        settings.server_name = server.clone();
    }
    log::debug!(
        "Server {} using database {}",
        settings.server_name,
        settings.database.file.display()
    );
    Ok(settings)
}

fn console() -> Actor {
    Actor::operator(User::new(Uuid::nil(), "console"))
}

/// Resolve a user by UUID or by last known name.
fn find_user(gateway: &Gateway, identifier: &str) -> Result<User> {
    if let Ok(uuid) = Uuid::parse_str(identifier) {
        return Ok(gateway
            .get_user(&uuid)
            .map(|saved| saved.user)
            .unwrap_or_else(|| User::new(uuid, identifier)));
    }
    gateway
        .get_user_by_name(identifier)
        .map(|saved| saved.user)
        .ok_or_else(|| anyhow!("no user named '{identifier}'"))
}

fn find_world(context: &ClaimContext, name: &str) -> Result<World> {
    context
        .claim_worlds()
        .worlds()
        .into_iter()
        .find(|world| world.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            anyhow!(
                "no claim world named '{name}' on server {}",
                context.settings().server_name
            )
        })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Prints action outcomes and remembers whether any failed.
#[derive(Default)]
struct PrintSink {
    failure: std::cell::RefCell<Option<String>>,
}

impl PrintSink {
    fn finish(self) -> Result<()> {
        match self.failure.into_inner() {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(()),
        }
    }
}

impl MessageSink for PrintSink {
    fn send(&self, message: Message) {
        match message {
            Message::Failed { reason } => *self.failure.borrow_mut() = Some(reason),
            other => println!("{other}"),
        }
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `claimward init`
fn cmd_init(context: &ClaimContext, verbose: bool) -> Result<()> {
    let version = context
        .gateway()
        .schema_version()
        .ok_or_else(|| anyhow!("schema version missing after initialization"))?;
    println!(
        "Database ready at {} (schema version {version})",
        context.settings().database.file.display()
    );
    if verbose {
        println!("  Server:       {}", context.settings().server_name);
        println!("  Claim worlds: {}", context.claim_worlds().worlds().len());
        println!("  User groups:  {}", context.groups().all_groups().len());
    }
    Ok(())
}

/// `claimward schema`
fn cmd_schema(context: &ClaimContext, json: bool) -> Result<()> {
    let stored = context.gateway().schema_version();
    if json {
        return print_json(&serde_json::json!({
            "stored": stored,
            "current": CURRENT_SCHEMA_VERSION,
        }));
    }
    match stored {
        Some(version) => println!("Schema version: {version} (current: {CURRENT_SCHEMA_VERSION})"),
        None => println!("Schema version: unknown (current: {CURRENT_SCHEMA_VERSION})"),
    }
    Ok(())
}

/// `claimward blocks <user> [show|add|remove|set] [amount]`
fn cmd_blocks(
    context: &ClaimContext,
    user: &str,
    operation: &str,
    amount: Option<i64>,
) -> Result<()> {
    let operation: ClaimBlockOperation = operation.parse()?;
    let target = find_user(context.gateway(), user)?;
    let sink = PrintSink::default();
    actions::claim_blocks(context, &console(), &target, operation, amount, &sink);
    sink.finish()
}

/// `claimward users show <user>`
fn cmd_user_show(context: &ClaimContext, user: &str, json: bool) -> Result<()> {
    let target = find_user(context.gateway(), user)?;
    let saved = context
        .ledger()
        .saved_user(&target.uuid)
        .ok_or_else(|| anyhow!("{} has never joined", target.name))?;
    if json {
        return print_json(&saved);
    }
    println!("User: {}", saved.user.name);
    println!("  UUID:         {}", saved.user.uuid);
    println!("  Claim blocks: {}", saved.claim_blocks);
    println!("  Hours played: {}", saved.hours_played);
    println!(
        "  Last login:   {}",
        saved.last_login.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

/// `claimward users inactive --days N`
fn cmd_users_inactive(context: &ClaimContext, days: u32, json: bool) -> Result<()> {
    let users = context.gateway().get_inactive_users(days);
    if json {
        return print_json(&users);
    }
    println!("Inactive for {days}+ days ({}):", users.len());
    if users.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    println!("  {:<38} {:<18} {:>8}  LAST LOGIN", "UUID", "NAME", "BLOCKS");
    println!("  {}", "-".repeat(88));
    for saved in &users {
        println!(
            "  {:<38} {:<18} {:>8}  {}",
            saved.user.uuid,
            saved.user.name,
            saved.claim_blocks,
            saved.last_login.format("%Y-%m-%d")
        );
    }
    Ok(())
}

/// `claimward groups list <owner>`
fn cmd_groups_list(context: &ClaimContext, owner: &str, json: bool) -> Result<()> {
    let owner = find_user(context.gateway(), owner)?;
    let groups = context.gateway().get_user_groups(&owner.uuid);
    if json {
        return print_json(&groups);
    }
    println!("Groups owned by {} ({}):", owner.name, groups.len());
    if groups.is_empty() {
        println!("  (none)");
    }
    for group in &groups {
        let members: Vec<&str> = group.members.iter().map(|m| m.name.as_str()).collect();
        println!("  {:<20} {}", group.name, members.join(", "));
    }
    Ok(())
}

/// `claimward worlds list [--all]`
fn cmd_worlds_list(context: &ClaimContext, all: bool, json: bool, verbose: bool) -> Result<()> {
    let mut rows: Vec<(String, World, i64, usize)> = if all {
        context
            .gateway()
            .get_all_claim_worlds()
            .context("failed to read claim worlds")?
            .into_iter()
            .map(|(server_world, claim_world)| {
                (
                    server_world.server,
                    server_world.world,
                    claim_world.id(),
                    claim_world.claim_count(),
                )
            })
            .collect()
    } else {
        let server = context.settings().server_name.clone();
        context
            .claim_worlds()
            .worlds()
            .into_iter()
            .filter_map(|world| {
                context
                    .claim_worlds()
                    .read(&world, |cw| (cw.id(), cw.claim_count()))
                    .map(|(id, count)| (server.clone(), world, id, count))
            })
            .collect()
    };
    rows.sort_by_key(|(_, _, id, _)| *id);

    if json {
        let values: Vec<serde_json::Value> = rows
            .iter()
            .map(|(server, world, id, count)| {
                serde_json::json!({
                    "id": id,
                    "server": server,
                    "world": world,
                    "claims": count,
                })
            })
            .collect();
        return print_json(&values);
    }

    println!("Claim worlds ({}):", rows.len());
    if rows.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    println!("  {:>5}  {:<16} {:<20} CLAIMS", "ID", "SERVER", "WORLD");
    println!("  {}", "-".repeat(56));
    for (server, world, id, count) in &rows {
        println!("  {id:>5}  {server:<16} {:<20} {count}", world.name);
        if verbose {
            println!("         {} ({})", world.uuid, world.environment);
        }
    }
    Ok(())
}
